use std::path::PathBuf;
use std::process::ExitStatus;

use linked_hash_map::LinkedHashMap;

use crate::error::Error;
use crate::{Result, Run, SimEnvironment};

/// Named group of runs sharing a single population.
///
/// Runs are kept in insertion order, which is also the order in which
/// [`run_batch`] executes them. Replacing an existing run keeps its
/// original position.
///
/// [`run_batch`]: #method.run_batch
#[derive(Debug, Clone)]
pub struct Experiment {
    /// Name of the population the runs start from
    population: String,
    model_name: String,
    model_type: String,
    runs: LinkedHashMap<String, Run>,
}

impl Experiment {
    pub fn new(population: &str, model_name: &str, model_type: &str) -> Self {
        Self {
            population: population.to_string(),
            model_name: model_name.to_string(),
            model_type: model_type.to_string(),
            runs: LinkedHashMap::new(),
        }
    }

    pub fn population(&self) -> &str {
        &self.population
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    pub fn model_type(&self) -> &str {
        &self.model_type
    }

    pub fn runs(&self) -> &LinkedHashMap<String, Run> {
        &self.runs
    }

    /// Creates a new run or replaces an existing one with the same name.
    ///
    /// Nothing is registered if the run can't be created.
    pub fn set_run<P: Into<PathBuf>>(&mut self, name: &str, starting_state: P, steps: u32) -> Result<()> {
        let run = Run::new(
            name,
            starting_state,
            steps,
            &self.model_name,
            &self.model_type,
        )?;
        match self.runs.get_mut(name) {
            Some(existing) => *existing = run,
            None => {
                self.runs.insert(name.to_string(), run);
            }
        }
        Ok(())
    }

    pub fn get_run(&self, name: &str) -> Result<&Run> {
        self.runs
            .get(name)
            .ok_or_else(|| Error::UndefinedRun(name.to_string()))
    }

    pub fn del_run(&mut self, name: &str) -> Result<Run> {
        self.runs
            .remove(name)
            .ok_or_else(|| Error::UndefinedRun(name.to_string()))
    }

    /// Executes a single run.
    pub fn run(&self, name: &str, env: &SimEnvironment) -> Result<ExitStatus> {
        self.get_run(name)?.run(env)
    }

    /// Executes all runs one after another, in insertion order.
    ///
    /// A run exiting with a failure status doesn't stop the batch, the
    /// statuses are returned for inspection by the caller.
    pub fn run_batch(&self, env: &SimEnvironment) -> Result<Vec<(String, ExitStatus)>> {
        let mut statuses = Vec::with_capacity(self.runs.len());
        for (name, run) in self.runs.iter() {
            let status = run.run(env)?;
            statuses.push((name.clone(), status));
        }
        Ok(statuses)
    }
}

#[cfg(test)]
fn state_file(dir: &std::path::Path) -> PathBuf {
    let path = dir.join("0.xml");
    std::fs::write(&path, "<states/>").unwrap();
    path
}

#[test]
fn set_run_overwrites() {
    let tmp = tempfile::tempdir().unwrap();
    let state = state_file(tmp.path());
    let mut exp = Experiment::new("pop", "m", "xmml");
    exp.set_run("a", &state, 5).unwrap();
    exp.set_run("b", &state, 1).unwrap();
    exp.set_run("a", &state, 10).unwrap();

    assert_eq!(exp.runs().len(), 2);
    assert_eq!(exp.get_run("a").unwrap().steps(), 10);
    let names: Vec<&String> = exp.runs().keys().collect();
    assert_eq!(names, vec!["a", "b"]);
}

#[test]
fn set_run_with_missing_state_registers_nothing() {
    let tmp = tempfile::tempdir().unwrap();
    let mut exp = Experiment::new("pop", "m", "xmml");
    let res = exp.set_run("a", tmp.path().join("missing.xml"), 5);
    assert!(matches!(res, Err(Error::FileNotFound(_))));
    assert!(exp.runs().is_empty());
}

#[test]
fn run_undefined() {
    let tmp = tempfile::tempdir().unwrap();
    let exp = Experiment::new("pop", "m", "xmml");
    assert!(matches!(exp.get_run("nope"), Err(Error::UndefinedRun(_))));

    #[cfg(unix)]
    {
        let (toolchain, models) = crate::env::testing::fake_env(tmp.path(), "m", "xmml");
        let env = SimEnvironment::new(toolchain, models).unwrap();
        assert!(matches!(exp.run("nope", &env), Err(Error::UndefinedRun(_))));
    }
}

#[cfg(unix)]
#[test]
fn run_batch_empty_is_noop() {
    let tmp = tempfile::tempdir().unwrap();
    let (toolchain, models) = crate::env::testing::fake_env(tmp.path(), "m", "xmml");
    let env = SimEnvironment::new(toolchain, models).unwrap();
    let exp = Experiment::new("pop", "m", "xmml");
    assert!(exp.run_batch(&env).unwrap().is_empty());
}

#[cfg(unix)]
#[test]
fn run_batch_continues_after_failure() {
    let tmp = tempfile::tempdir().unwrap();
    let (toolchain, models) = crate::env::testing::fake_env(tmp.path(), "m", "xmml");
    crate::env::testing::write_script(
        &models.join("xmml/m/main"),
        "echo \"$1\" >> calls.log\n[ \"$1\" -ne 2 ]",
    );
    let env = SimEnvironment::new(toolchain, &models).unwrap();
    let state = state_file(tmp.path());
    let mut exp = Experiment::new("pop", "m", "xmml");
    exp.set_run("one", &state, 1).unwrap();
    exp.set_run("two", &state, 2).unwrap();
    exp.set_run("three", &state, 3).unwrap();

    let statuses = exp.run_batch(&env).unwrap();
    let summary: Vec<(&str, bool)> = statuses
        .iter()
        .map(|(n, s)| (n.as_str(), s.success()))
        .collect();
    assert_eq!(summary, vec![("one", true), ("two", false), ("three", true)]);

    let log = std::fs::read_to_string(models.join("xmml/m/calls.log")).unwrap();
    assert_eq!(log, "1\n2\n3\n");
}

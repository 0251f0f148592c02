use std::path::{Path, PathBuf};
use std::process::ExitStatus;

use crate::error::Error;
use crate::{Result, SimEnvironment};

/// Single simulator invocation: model, starting state and step count.
///
/// Immutable once created. The starting-state file has to exist at the
/// time of creation.
#[derive(Debug, Clone, PartialEq)]
pub struct Run {
    name: String,
    starting_state: PathBuf,
    steps: u32,
    model_name: String,
    model_type: String,
}

impl Run {
    pub fn new<P: Into<PathBuf>>(
        name: &str,
        starting_state: P,
        steps: u32,
        model_name: &str,
        model_type: &str,
    ) -> Result<Self> {
        let starting_state = starting_state.into();
        if !starting_state.exists() {
            return Err(Error::FileNotFound(starting_state));
        }
        Ok(Self {
            name: name.to_string(),
            starting_state,
            steps,
            model_name: model_name.to_string(),
            model_type: model_type.to_string(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn starting_state(&self) -> &Path {
        &self.starting_state
    }

    pub fn steps(&self) -> u32 {
        self.steps
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    pub fn model_type(&self) -> &str {
        &self.model_type
    }

    /// Executes the run within the given environment, returning the raw
    /// exit status of the simulator process.
    pub fn run(&self, env: &SimEnvironment) -> Result<ExitStatus> {
        info!("starting run: {}", self.name);
        let status = env.run(
            &self.model_name,
            &self.model_type,
            &self.starting_state,
            self.steps,
        )?;
        if status.success() {
            info!("run {} finished", self.name);
        } else {
            warn!("run {} finished with {}", self.name, status);
        }
        Ok(status)
    }
}

#[test]
fn run_requires_starting_state() {
    let tmp = tempfile::tempdir().unwrap();
    let missing = tmp.path().join("0.xml");
    match Run::new("r", &missing, 5, "m", "xmml") {
        Err(Error::FileNotFound(p)) => assert_eq!(p, missing),
        other => panic!("unexpected result: {:?}", other),
    }

    std::fs::write(&missing, "<states/>").unwrap();
    let run = Run::new("r", &missing, 5, "m", "xmml").unwrap();
    assert_eq!(run.steps(), 5);
    assert_eq!(run.starting_state(), missing.as_path());
}

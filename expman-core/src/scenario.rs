//! Scenario, a single population together with the experiments run
//! against it.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};

use linked_hash_map::{Entry, LinkedHashMap};

use crate::error::Error;
use crate::persist;
use crate::population::InitForm;
use crate::util;
use crate::{Config, Experiment, Population, Result, SimEnvironment};
use crate::{INIT_STATE_FILE, POPULATION_DEF_FILE, POPULATION_FILE, SCENARIO_DIR_PREFIX};

/// Where the scenario's population came from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PopulationOrigin {
    /// Restored from the population file found in the scenario directory
    Restored,
    /// Freshly created from the model's base definition, then persisted
    Created,
}

/// One population instance plus the experiments run against it.
///
/// # Scenario directory
///
/// Each scenario gets a dedicated directory named after it,
/// `<scenarios_dir>/scenario-<name>`, containing the persisted population
/// (`pop.bin`) and the starting-state file (`0.xml`). Creating a scenario
/// with a name that was used before restores the population persisted
/// back then.
#[derive(Debug)]
pub struct Scenario {
    name: String,
    desc: String,
    model_name: String,
    model_type: String,
    dir: PathBuf,
    compress: bool,
    population: Population,
    origin: PopulationOrigin,
    experiments: LinkedHashMap<String, Experiment>,
}

impl Scenario {
    /// Creates a new scenario, restoring its population if one was
    /// persisted before, or creating it from the model's base population
    /// definition otherwise.
    pub fn new(
        name: &str,
        model_name: &str,
        model_type: &str,
        desc: &str,
        config: &Config,
    ) -> Result<Self> {
        if name.is_empty() || name.contains(|c: char| c == '/' || c == '\\') || name == ".." {
            return Err(Error::Configuration(format!(
                "invalid scenario name: \"{}\"",
                name
            )));
        }
        let dir = config
            .scenarios_dir
            .join(format!("{}{}", SCENARIO_DIR_PREFIX, name));
        util::ensure_dir(&dir)?;

        let pop_path = dir.join(POPULATION_FILE);
        let (population, origin) = if pop_path.is_file() {
            info!("restoring population for scenario {}", name);
            let pop: Population = persist::restore(&pop_path)?;
            (pop, PopulationOrigin::Restored)
        } else {
            let def_path = util::model_path(&config.models_dir, model_name, model_type)
                .join(POPULATION_DEF_FILE);
            info!(
                "creating population for scenario {} from {}",
                name,
                def_path.display()
            );
            let pop = Population::from_def_at(name, &def_path)?;
            persist::persist(&pop, &pop_path, config.compress)?;
            (pop, PopulationOrigin::Created)
        };

        Ok(Self {
            name: name.to_string(),
            desc: desc.to_string(),
            model_name: model_name.to_string(),
            model_type: model_type.to_string(),
            dir,
            compress: config.compress,
            population,
            origin,
            experiments: LinkedHashMap::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn desc(&self) -> &str {
        &self.desc
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    pub fn model_type(&self) -> &str {
        &self.model_type
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn population_path(&self) -> PathBuf {
        self.dir.join(POPULATION_FILE)
    }

    /// Path to the starting-state file shared by all the runs of this
    /// scenario.
    pub fn init_state_path(&self) -> PathBuf {
        self.dir.join(INIT_STATE_FILE)
    }

    pub fn population(&self) -> &Population {
        &self.population
    }

    pub fn origin(&self) -> PopulationOrigin {
        self.origin
    }

    /// Checks whether the population was created or restored and is
    /// persisted in the scenario directory.
    pub fn is_ready(&self) -> bool {
        self.population_path().is_file()
    }

    /// Checks whether the starting-state file was created.
    pub fn has_init_state(&self) -> bool {
        self.init_state_path().is_file()
    }

    /// Applies the edit to a copy of the population and, if it succeeds,
    /// replaces the population with the copy and persists it.
    pub fn edit_population_with<F>(&mut self, edit: F) -> Result<()>
    where
        F: FnOnce(&mut Population) -> Result<()>,
    {
        let mut pop = self.population.clone();
        edit(&mut pop)?;
        persist::persist(&pop, &self.population_path(), self.compress)?;
        self.population = pop;
        Ok(())
    }

    /// Sets the per-region agent counts for the given agent types.
    pub fn edit_population_num_agents<I, S>(&mut self, counts: I) -> Result<()>
    where
        I: IntoIterator<Item = (S, u32)>,
        S: AsRef<str>,
    {
        self.edit_population_with(|pop| {
            for (kind, count) in counts {
                pop.set_num_agents(kind.as_ref(), count)?;
            }
            Ok(())
        })
    }

    /// Sets the init forms for the given `(agent type, variable)` pairs.
    pub fn edit_population_init_forms<I, S>(&mut self, forms: I) -> Result<()>
    where
        I: IntoIterator<Item = (S, S, InitForm)>,
        S: AsRef<str>,
    {
        self.edit_population_with(|pop| {
            for (kind, var, form) in forms {
                pop.set_init_form(kind.as_ref(), var.as_ref(), form)?;
            }
            Ok(())
        })
    }

    /// Opens the scenario directory with an external population editor,
    /// blocking until it exits. The population is then restored from the
    /// scenario directory to pick up the editor's changes.
    pub fn edit_population(&mut self, editor: &str) -> Result<ExitStatus> {
        let mut parts = editor.split_whitespace();
        let program = parts
            .next()
            .ok_or_else(|| Error::Configuration("empty editor command".to_string()))?;
        info!("starting population editor '{}' for {}", editor, self.dir.display());
        let status = Command::new(program)
            .args(parts)
            .arg(&self.dir)
            .status()?;
        if !status.success() {
            warn!("population editor finished with {}", status);
        }
        self.population = persist::restore(&self.population_path())?;
        Ok(status)
    }

    /// Regenerates the population and writes its starting state to the
    /// scenario directory.
    ///
    /// Runs bound to the scenario all start from this file, so it has to be
    /// created before any of them can be set up.
    pub fn create_init_state(&mut self) -> Result<PathBuf> {
        self.population.recreate()?;
        let path = self.init_state_path();
        let mut writer = BufWriter::new(File::create(&path)?);
        self.population.write_xml(&mut writer)?;
        writer.flush()?;
        info!(
            "created starting state for scenario {} at {}",
            self.name,
            path.display()
        );
        Ok(path)
    }

    pub fn experiments(&self) -> &LinkedHashMap<String, Experiment> {
        &self.experiments
    }

    /// Adds a new empty experiment, replacing any existing experiment with
    /// the same name.
    pub fn add_experiment(&mut self, name: &str) -> &mut Experiment {
        let exp = Experiment::new(self.population.name(), &self.model_name, &self.model_type);
        self.set_experiment(name, exp)
    }

    pub fn set_experiment(&mut self, name: &str, exp: Experiment) -> &mut Experiment {
        match self.experiments.entry(name.to_string()) {
            Entry::Occupied(mut e) => {
                e.insert(exp);
                e.into_mut()
            }
            Entry::Vacant(e) => e.insert(exp),
        }
    }

    pub fn del_experiment(&mut self, name: &str) -> Result<Experiment> {
        let known = self.experiments.keys().cloned().collect::<Vec<_>>();
        self.experiments
            .remove(name)
            .ok_or_else(|| Error::undefined_key("experiment", name, &known))
    }

    pub fn get_experiment(&self, name: &str) -> Result<&Experiment> {
        self.experiments
            .get(name)
            .ok_or_else(|| Error::undefined_key("experiment", name, self.experiments.keys()))
    }

    pub fn get_experiment_mut(&mut self, name: &str) -> Result<&mut Experiment> {
        let known = self.experiments.keys().cloned().collect::<Vec<_>>();
        self.experiments
            .get_mut(name)
            .ok_or_else(|| Error::undefined_key("experiment", name, &known))
    }

    /// Binds a new run of the given experiment to the scenario's current
    /// starting state.
    pub fn set_experiment_run(&mut self, exp_name: &str, run_name: &str, steps: u32) -> Result<()> {
        let init_state = self.init_state_path();
        self.get_experiment_mut(exp_name)?
            .set_run(run_name, init_state, steps)
    }

    /// Executes all runs of the given experiment.
    pub fn run_experiment(
        &self,
        exp_name: &str,
        env: &SimEnvironment,
    ) -> Result<Vec<(String, ExitStatus)>> {
        self.get_experiment(exp_name)?.run_batch(env)
    }

    /// Human-readable listing of the scenario's experiments and runs.
    pub fn summary(&self) -> String {
        let mut out = format!("Scenario '{}' : {}\n", self.name, self.desc);
        out.push_str("  Experiments:\n");
        for (exp_name, exp) in self.experiments.iter() {
            out.push_str(&format!("    {} : ", exp_name));
            for (run_name, run) in exp.runs().iter() {
                out.push_str(&format!("{} ({} steps) ", run_name, run.steps()));
            }
            out.push('\n');
        }
        out
    }
}

#[cfg(test)]
pub(crate) fn test_config(root: &Path) -> Config {
    let models_dir = root.join("models");
    let mdir = models_dir.join("xmml").join("bielefeld");
    std::fs::create_dir_all(&mdir).unwrap();
    std::fs::write(
        mdir.join(POPULATION_DEF_FILE),
        toml::to_string(&crate::population::test_def()).unwrap(),
    )
    .unwrap();
    Config {
        models_dir,
        scenarios_dir: root.join("scenarios"),
        ..Config::default()
    }
}

#[test]
fn scenario_creates_then_restores() {
    let tmp = tempfile::tempdir().unwrap();
    let config = test_config(tmp.path());

    let mut first = Scenario::new("s1", "bielefeld", "xmml", "first", &config).unwrap();
    assert_eq!(first.origin(), PopulationOrigin::Created);
    assert!(first.is_ready());
    assert!(first.dir().ends_with("scenario-s1"));
    first
        .edit_population_num_agents(vec![("Household", 42)])
        .unwrap();
    let edited = first.population().clone();
    drop(first);

    let second = Scenario::new("s1", "bielefeld", "xmml", "second", &config).unwrap();
    assert_eq!(second.origin(), PopulationOrigin::Restored);
    assert_eq!(second.population(), &edited);
    assert_eq!(second.population().agent("Household").unwrap().count, 42);
}

#[test]
fn scenario_failed_edit_keeps_population() {
    let tmp = tempfile::tempdir().unwrap();
    let config = test_config(tmp.path());
    let mut sce = Scenario::new("s", "bielefeld", "xmml", "", &config).unwrap();
    let before = sce.population().clone();
    let res = sce.edit_population_num_agents(vec![("Household", 1), ("Nope", 2)]);
    assert!(matches!(res, Err(Error::UndefinedKey { .. })));
    assert_eq!(sce.population(), &before);

    sce.edit_population_init_forms(vec![("Firm", "employees", InitForm::Const("3".to_string()))])
        .unwrap();
    let restored: Population = persist::restore(&sce.population_path()).unwrap();
    assert_eq!(
        restored.agent("Firm").unwrap().vars.get("employees"),
        Some(&InitForm::Const("3".to_string()))
    );
}

#[test]
fn scenario_missing_model_definition() {
    let tmp = tempfile::tempdir().unwrap();
    let config = test_config(tmp.path());
    let res = Scenario::new("s", "unknown", "xmml", "", &config);
    assert!(matches!(res, Err(Error::FileNotFound(_))));
}

#[test]
fn scenario_rejects_path_like_names() {
    let tmp = tempfile::tempdir().unwrap();
    let config = test_config(tmp.path());
    assert!(Scenario::new("a/b", "bielefeld", "xmml", "", &config).is_err());
    assert!(Scenario::new("", "bielefeld", "xmml", "", &config).is_err());
}

#[test]
fn scenario_init_state_and_runs() {
    let tmp = tempfile::tempdir().unwrap();
    let config = test_config(tmp.path());
    let mut sce = Scenario::new("s", "bielefeld", "xmml", "desc", &config).unwrap();
    sce.add_experiment("exp");

    // no starting state yet
    assert!(matches!(
        sce.set_experiment_run("exp", "r", 5),
        Err(Error::FileNotFound(_))
    ));
    assert!(!sce.has_init_state());

    let path = sce.create_init_state().unwrap();
    assert_eq!(path, sce.init_state_path());
    let doc = std::fs::read_to_string(&path).unwrap();
    assert!(doc.starts_with("<states>"));
    assert_eq!(doc.matches("<xagent>").count(), 8);

    sce.set_experiment_run("exp", "r", 5).unwrap();
    assert!(matches!(
        sce.set_experiment_run("nexp", "r", 5),
        Err(Error::UndefinedKey { .. })
    ));
    assert_eq!(sce.summary(), "Scenario 's' : desc\n  Experiments:\n    exp : r (5 steps) \n");

    // re-adding replaces the experiment
    sce.add_experiment("exp");
    assert!(sce.get_experiment("exp").unwrap().runs().is_empty());
    assert!(sce.del_experiment("exp").is_ok());
    assert!(sce.get_experiment("exp").is_err());
}

#[cfg(unix)]
#[test]
fn scenario_edit_population_restores_after_editor() {
    let tmp = tempfile::tempdir().unwrap();
    let config = test_config(tmp.path());
    let mut sce = Scenario::new("s", "bielefeld", "xmml", "", &config).unwrap();

    // editor replacing the persisted population with an edited copy
    let mut edited = sce.population().clone();
    edited.set_num_agents("Firm", 9).unwrap();
    let staged = tmp.path().join("staged.bin");
    persist::persist(&edited, &staged, false).unwrap();
    let editor = tmp.path().join("editor");
    crate::env::testing::write_script(
        &editor,
        &format!("cp {} \"$1/{}\"", staged.display(), POPULATION_FILE),
    );

    let status = sce.edit_population(&editor.to_string_lossy()).unwrap();
    assert!(status.success());
    assert_eq!(sce.population().agent("Firm").unwrap().count, 9);
}

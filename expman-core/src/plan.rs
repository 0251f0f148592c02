//! Plans, declarative descriptions of a whole specification.
//!
//! # Example
//!
//! ```toml
//! [plan]
//! model = "bielefeld"
//! type = "xmml"
//!
//! [scenarios.bie-testscenario]
//! desc = "test scenario"
//! regions = 2
//!
//! [scenarios.bie-testscenario.agents]
//! Household = 200
//!
//! [scenarios.bie-testscenario.forms]
//! "Household.wealth" = "uniform(0, 500)"
//!
//! [scenarios.bie-testscenario.experiments.testexp]
//! testrun = 5
//! longrun = 500
//! ```

use std::path::{Path, PathBuf};
use std::process::ExitStatus;

use linked_hash_map::LinkedHashMap;

use crate::error::Error;
use crate::population::InitForm;
use crate::util;
use crate::{Config, Result, SimEnvironment, Specification, DEFAULT_MODEL_TYPE};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    pub plan: PlanHeader,
    #[serde(default)]
    pub scenarios: LinkedHashMap<String, ScenarioPlan>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanHeader {
    pub model: String,
    #[serde(rename = "type", default = "default_model_type")]
    pub model_type: String,
    /// Overrides the configured scenarios directory
    #[serde(default)]
    pub scenarios_dir: Option<PathBuf>,
}

fn default_model_type() -> String {
    DEFAULT_MODEL_TYPE.to_string()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScenarioPlan {
    #[serde(default)]
    pub desc: String,
    #[serde(default)]
    pub regions: Option<u32>,
    /// Agents per region, by agent type
    #[serde(default)]
    pub agents: LinkedHashMap<String, u32>,
    /// Init forms, keyed by `<agent type>.<variable>`
    #[serde(default)]
    pub forms: LinkedHashMap<String, InitForm>,
    /// Step counts of the runs, by experiment and run name
    #[serde(default)]
    pub experiments: LinkedHashMap<String, LinkedHashMap<String, u32>>,
}

/// Outcome of a single run executed as part of a plan.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub scenario: String,
    pub experiment: String,
    pub run: String,
    pub status: ExitStatus,
}

impl Plan {
    pub fn from_path(path: &Path) -> Result<Self> {
        util::deser_struct_from_path(path)
    }

    /// Builds the specification described by the plan.
    ///
    /// Every scenario is created or restored, gets the plan's population
    /// edits applied, and has its starting state created before the runs
    /// are bound to it.
    pub fn build(&self, mut config: Config) -> Result<Specification> {
        if let Some(dir) = &self.plan.scenarios_dir {
            config.scenarios_dir = dir.clone();
        }
        let mut spec = Specification::new(&self.plan.model, &self.plan.model_type, config);
        for (name, sce_plan) in self.scenarios.iter() {
            let forms = sce_plan
                .forms
                .iter()
                .map(|(key, form)| -> Result<(String, String, InitForm)> {
                    let (kind, var) = split_form_key(key)?;
                    Ok((kind.to_string(), var.to_string(), form.clone()))
                })
                .collect::<Result<Vec<_>>>()?;

            let scenario = spec.add_scenario(name, &sce_plan.desc)?;
            if let Some(regions) = sce_plan.regions {
                scenario.edit_population_with(|pop| pop.set_num_regions(regions))?;
            }
            if !sce_plan.agents.is_empty() {
                scenario.edit_population_num_agents(
                    sce_plan.agents.iter().map(|(k, c)| (k.as_str(), *c)),
                )?;
            }
            if !forms.is_empty() {
                scenario.edit_population_init_forms(forms)?;
            }
            scenario.create_init_state()?;

            for (exp_name, runs) in sce_plan.experiments.iter() {
                scenario.add_experiment(exp_name);
                for (run_name, steps) in runs.iter() {
                    scenario.set_experiment_run(exp_name, run_name, *steps)?;
                }
            }
        }
        Ok(spec)
    }

    /// Executes every experiment of every scenario of the specification,
    /// in declaration order.
    pub fn execute(spec: &Specification, env: &SimEnvironment) -> Result<Vec<RunReport>> {
        let mut reports = Vec::new();
        for (sce_name, scenario) in spec.scenarios().iter() {
            for exp_name in scenario.experiments().keys() {
                for (run, status) in scenario.run_experiment(exp_name, env)? {
                    reports.push(RunReport {
                        scenario: sce_name.clone(),
                        experiment: exp_name.clone(),
                        run,
                        status,
                    });
                }
            }
        }
        Ok(reports)
    }
}

fn split_form_key(key: &str) -> Result<(&str, &str)> {
    let mut split = key.splitn(2, '.');
    match (split.next(), split.next()) {
        (Some(kind), Some(var)) if !kind.is_empty() && !var.is_empty() => Ok((kind, var)),
        _ => Err(Error::Configuration(format!(
            "init form key has to be \"<agent type>.<variable>\", got \"{}\"",
            key
        ))),
    }
}

#[cfg(test)]
const TEST_PLAN: &str = r#"
[plan]
model = "bielefeld"

[scenarios.first]
desc = "first scenario"
regions = 1

[scenarios.first.agents]
Household = 2

[scenarios.first.forms]
"Firm.employees" = "uniform_int(1, 3)"

[scenarios.first.experiments.exp]
short = 5
long = 50

[scenarios.second.experiments.other]
only = 1
"#;

#[test]
fn plan_parses_in_order() {
    let plan: Plan = toml::from_str(TEST_PLAN).unwrap();
    assert_eq!(plan.plan.model_type, DEFAULT_MODEL_TYPE);
    let names: Vec<&String> = plan.scenarios.keys().collect();
    assert_eq!(names, vec!["first", "second"]);
    let runs: Vec<(&String, &u32)> = plan
        .scenarios
        .get("first")
        .and_then(|s| s.experiments.get("exp"))
        .unwrap()
        .iter()
        .collect();
    assert_eq!(runs, vec![(&"short".to_string(), &5), (&"long".to_string(), &50)]);
}

#[test]
fn plan_builds_specification() {
    let tmp = tempfile::tempdir().unwrap();
    let config = crate::scenario::test_config(tmp.path());
    let plan: Plan = toml::from_str(TEST_PLAN).unwrap();
    let spec = plan.build(config).unwrap();

    let first = spec.get_scenario("first").unwrap();
    assert!(first.has_init_state());
    assert_eq!(first.population().num_regions(), 1);
    assert_eq!(first.population().agent("Household").unwrap().count, 2);
    assert_eq!(
        first.population().agent("Firm").unwrap().vars.get("employees"),
        Some(&InitForm::UniformInt(1, 3))
    );
    let run = first.get_experiment("exp").unwrap().get_run("long").unwrap();
    assert_eq!(run.steps(), 50);
    assert_eq!(run.starting_state(), first.init_state_path().as_path());

    let summary = spec.summary();
    assert!(summary.contains("short (5 steps) long (50 steps)"));
    assert!(summary.contains("    other : only (1 steps) "));
}

#[test]
fn plan_rejects_bad_form_key() {
    assert!(split_form_key("Household").is_err());
    assert!(split_form_key(".x").is_err());
    assert_eq!(split_form_key("A.b.c").unwrap(), ("A", "b.c"));
}

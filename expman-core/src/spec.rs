//! Top-level container for the scenarios of a single model.

use std::path::PathBuf;

use linked_hash_map::{Entry, LinkedHashMap};

use crate::error::Error;
use crate::{Config, Result, Scenario};

/// Named scenarios of a single model.
#[derive(Debug)]
pub struct Specification {
    model_name: String,
    model_type: String,
    config: Config,
    scenarios: LinkedHashMap<String, Scenario>,
}

impl Specification {
    pub fn new(model_name: &str, model_type: &str, config: Config) -> Self {
        Self {
            model_name: model_name.to_string(),
            model_type: model_type.to_string(),
            config,
            scenarios: LinkedHashMap::new(),
        }
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    pub fn model_type(&self) -> &str {
        &self.model_type
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn scenarios(&self) -> &LinkedHashMap<String, Scenario> {
        &self.scenarios
    }

    /// Creates a scenario and registers it, replacing any previously
    /// registered scenario with the same name.
    ///
    /// This creates the scenario directory, and creates or restores its
    /// population.
    pub fn add_scenario(&mut self, name: &str, desc: &str) -> Result<&mut Scenario> {
        let scenario = Scenario::new(
            name,
            &self.model_name,
            &self.model_type,
            desc,
            &self.config,
        )?;
        Ok(self.set_scenario(name, scenario))
    }

    pub fn set_scenario(&mut self, name: &str, scenario: Scenario) -> &mut Scenario {
        match self.scenarios.entry(name.to_string()) {
            Entry::Occupied(mut e) => {
                e.insert(scenario);
                e.into_mut()
            }
            Entry::Vacant(e) => e.insert(scenario),
        }
    }

    pub fn del_scenario(&mut self, name: &str) -> Result<Scenario> {
        let known = self.scenarios.keys().cloned().collect::<Vec<_>>();
        self.scenarios
            .remove(name)
            .ok_or_else(|| Error::undefined_key("scenario", name, &known))
    }

    pub fn get_scenario(&self, name: &str) -> Result<&Scenario> {
        self.scenarios
            .get(name)
            .ok_or_else(|| Error::undefined_key("scenario", name, self.scenarios.keys()))
    }

    pub fn get_scenario_mut(&mut self, name: &str) -> Result<&mut Scenario> {
        let known = self.scenarios.keys().cloned().collect::<Vec<_>>();
        self.scenarios
            .get_mut(name)
            .ok_or_else(|| Error::undefined_key("scenario", name, &known))
    }

    /// Creates the starting-state file for the named scenario.
    pub fn prepare_scenario(&mut self, name: &str) -> Result<PathBuf> {
        self.get_scenario_mut(name)?.create_init_state()
    }

    /// Human-readable report listing every scenario with its experiments
    /// and their runs.
    pub fn summary(&self) -> String {
        let mut out = format!(
            "Specification Model: {} ({})\n",
            self.model_name, self.model_type
        );
        out.push_str("Scenarios:\n");
        for scenario in self.scenarios.values() {
            out.push_str(&scenario.summary());
        }
        out
    }
}

#[test]
fn spec_scenarios() {
    let tmp = tempfile::tempdir().unwrap();
    let config = crate::scenario::test_config(tmp.path());
    let mut spec = Specification::new("bielefeld", "xmml", config);
    spec.add_scenario("a", "first").unwrap();
    spec.add_scenario("b", "second").unwrap();
    assert_eq!(spec.get_scenario("a").unwrap().desc(), "first");

    match spec.get_scenario("c") {
        Err(Error::UndefinedKey { kind, name, .. }) => {
            assert_eq!(kind, "scenario");
            assert_eq!(name, "c");
        }
        other => panic!("unexpected result: {:?}", other.map(|s| s.name().to_string())),
    }

    spec.del_scenario("a").unwrap();
    assert!(spec.del_scenario("a").is_err());
    assert_eq!(
        spec.summary(),
        "Specification Model: bielefeld (xmml)\nScenarios:\n\
         Scenario 'b' : second\n  Experiments:\n"
    );
}

#[test]
fn spec_prepare_scenario() {
    let tmp = tempfile::tempdir().unwrap();
    let config = crate::scenario::test_config(tmp.path());
    let mut spec = Specification::new("bielefeld", "xmml", config);
    spec.add_scenario("a", "").unwrap();
    let path = spec.prepare_scenario("a").unwrap();
    assert!(path.is_file());
    assert!(spec.prepare_scenario("x").is_err());
}

//! Specification, scenario, experiment and run lifecycle, driven against a
//! fake model executable.

#![cfg(unix)]

extern crate expman_core as expman;

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use expman::scenario::PopulationOrigin;
use expman::{Config, Error, SimEnvironment, Specification};

const POPULATION_DEF: &str = r#"
[population]
regions = 1

[agents.Household]
count = 4
[agents.Household.vars]
id = "seq"
wealth = "uniform(0, 100)"

[agents.Firm]
count = 1
[agents.Firm.vars]
id = "seq(100)"
"#;

fn write_script(path: &Path, body: &str) {
    fs::write(path, format!("#!/bin/sh\n{}\n", body)).unwrap();
    let mut perms = fs::metadata(path).unwrap().permissions();
    perms.set_mode(0o755);
    fs::set_permissions(path, perms).unwrap();
}

/// Sets up toolchain, model and scenarios directories under `root`.
fn setup(root: &Path) -> (Config, PathBuf) {
    let toolchain_dir = root.join("xparser");
    fs::create_dir_all(&toolchain_dir).unwrap();
    write_script(&toolchain_dir.join("xparser"), "exit 0");

    let models_dir = root.join("models");
    let mdir = models_dir.join("xmml").join("bielefeld");
    fs::create_dir_all(&mdir).unwrap();
    fs::write(mdir.join(expman::POPULATION_DEF_FILE), POPULATION_DEF).unwrap();
    write_script(&mdir.join("main"), "echo \"$1 $2\" >> calls.log");

    let config = Config {
        toolchain_dir,
        models_dir,
        scenarios_dir: root.join("scenarios"),
        ..Config::default()
    };
    (config, mdir.join("calls.log"))
}

#[test]
fn end_to_end() {
    let tmp = tempfile::tempdir().unwrap();
    let (config, calls_log) = setup(tmp.path());
    let env = SimEnvironment::from_config(&config).unwrap();
    assert!(env.check_model("bielefeld", "xmml").is_ok());

    let mut spec = Specification::new("bielefeld", "xmml", config);
    let scenario = spec
        .add_scenario("bie-testscenario", "test scenario")
        .unwrap();
    assert!(scenario.is_ready());
    scenario.create_init_state().unwrap();
    scenario.add_experiment("testexp");
    scenario.set_experiment_run("testexp", "testrun", 5).unwrap();
    let statuses = scenario.run_experiment("testexp", &env).unwrap();
    assert_eq!(statuses.len(), 1);
    assert!(statuses[0].1.success());

    let init_state = fs::canonicalize(scenario.init_state_path()).unwrap();
    let calls = fs::read_to_string(&calls_log).unwrap();
    assert_eq!(calls, format!("5 {}\n", init_state.display()));

    let summary = spec.summary();
    assert!(summary.starts_with("Specification Model: bielefeld (xmml)\n"));
    assert!(summary.contains("Scenario 'bie-testscenario' : test scenario"));
    assert!(summary.contains("testrun (5 steps)"));
}

#[test]
fn population_survives_specification() {
    let tmp = tempfile::tempdir().unwrap();
    let (config, _) = setup(tmp.path());

    let population = {
        let mut spec = Specification::new("bielefeld", "xmml", config.clone());
        let scenario = spec.add_scenario("persisted", "").unwrap();
        assert_eq!(scenario.origin(), PopulationOrigin::Created);
        scenario
            .edit_population_num_agents(vec![("Household", 11)])
            .unwrap();
        scenario.population().clone()
    };

    let mut spec = Specification::new("bielefeld", "xmml", config);
    let scenario = spec.add_scenario("persisted", "").unwrap();
    assert_eq!(scenario.origin(), PopulationOrigin::Restored);
    assert_eq!(scenario.population(), &population);

    // a differently named scenario starts from the base definition
    let other = spec.add_scenario("fresh", "").unwrap();
    assert_eq!(other.origin(), PopulationOrigin::Created);
    assert_eq!(other.population().agent("Household").unwrap().count, 4);
}

#[test]
fn missing_model_executable_fails_run() {
    let tmp = tempfile::tempdir().unwrap();
    let (config, _) = setup(tmp.path());
    let env = SimEnvironment::from_config(&config).unwrap();
    fs::remove_file(config.models_dir.join("xmml/bielefeld/main")).unwrap();

    let mut spec = Specification::new("bielefeld", "xmml", config);
    let scenario = spec.add_scenario("s", "").unwrap();
    scenario.create_init_state().unwrap();
    scenario.add_experiment("exp");
    scenario.set_experiment_run("exp", "r", 1).unwrap();
    assert!(matches!(
        scenario.run_experiment("exp", &env),
        Err(Error::ModelNotFound(_))
    ));
}

//! Application definition.

extern crate simplelog;

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Error, Result};
use clap::{App, AppSettings, Arg, ArgMatches, SubCommand};
use colored::*;

use expman::persist;
use expman::scenario::PopulationOrigin;
use expman::{Config, InitForm, Plan, Population, Scenario, SimEnvironment};

use crate::edit;
use crate::init;

pub const VERSION: &'static str = env!("CARGO_PKG_VERSION");
pub const AUTHORS: &'static str = env!("CARGO_PKG_AUTHORS");

const DEFAULT_VERBOSITY: &str = "info";

pub fn app<'a, 'b>() -> App<'a, 'b> {
    let app = App::new("expman")
        .setting(AppSettings::SubcommandRequiredElseHelp)
        .version(VERSION)
        .author(AUTHORS)
        .about("Manage scenarios, experiments and runs of agent-based simulation models.")
        .arg(Arg::with_name("verbosity")
            .long("verbosity")
            .short("v")
            .takes_value(true)
            .default_value(DEFAULT_VERBOSITY)
            .value_name("verb")
            .global(true)
            .help("Set the verbosity of the log output"))
        .arg(Arg::with_name("config")
            .long("config")
            .short("c")
            .takes_value(true)
            .default_value(expman::CONFIG_FILE)
            .value_name("path")
            .global(true)
            .help("Path to the configuration file"))

        // new subcommand
        .subcommand(SubCommand::with_name("new")
            .display_order(10)
            .about("Create new plan or model definition from a template")
            .arg(Arg::with_name("path")
                .required(true)
                .value_name("path"))
            .arg(Arg::with_name("template")
                .possible_values(&["plan", "config", "model"])
                .takes_value(true)
                .default_value("plan")
                .help("Init with a template")
                .long("template")
                .short("t")))

        // check subcommand
        .subcommand(SubCommand::with_name("check")
            .display_order(11)
            .about("Check that the toolchain and a model are ready for execution")
            .arg(Arg::with_name("model")
                .required(true)
                .value_name("model"))
            .arg(Arg::with_name("type")
                .long("type")
                .short("t")
                .takes_value(true)
                .default_value(expman::DEFAULT_MODEL_TYPE)
                .help("Model type")))

        // scenario subcommand
        .subcommand(SubCommand::with_name("scenario")
            .display_order(20)
            .about("Create or restore a scenario and edit its population")
            .arg(Arg::with_name("name")
                .required(true)
                .value_name("name"))
            .arg(Arg::with_name("model")
                .required(true)
                .long("model")
                .short("m")
                .takes_value(true)
                .help("Model the scenario population is created for"))
            .arg(Arg::with_name("type")
                .long("type")
                .short("t")
                .takes_value(true)
                .default_value(expman::DEFAULT_MODEL_TYPE)
                .help("Model type"))
            .arg(Arg::with_name("desc")
                .long("desc")
                .short("d")
                .takes_value(true)
                .default_value("No description")
                .help("Scenario description"))
            .arg(Arg::with_name("regions")
                .long("regions")
                .takes_value(true)
                .value_name("count")
                .help("Set the number of regions"))
            .arg(Arg::with_name("agents")
                .long("agents")
                .short("a")
                .takes_value(true)
                .multiple(true)
                .number_of_values(1)
                .value_name("type=count")
                .help("Set the number of agents of a type in each region"))
            .arg(Arg::with_name("form")
                .long("form")
                .short("f")
                .takes_value(true)
                .multiple(true)
                .number_of_values(1)
                .value_name("type.var=form")
                .help("Set the init form of an agent variable, e.g. Household.wealth=uniform(0,100)"))
            .arg(Arg::with_name("interactive")
                .long("interactive")
                .short("i")
                .help("Edit agent counts and init forms interactively"))
            .arg(Arg::with_name("edit")
                .long("edit")
                .short("e")
                .help("Open the scenario with the external population editor"))
            .arg(Arg::with_name("editor")
                .long("editor")
                .takes_value(true)
                .value_name("command")
                .help("Population editor command (overrides the configured one)"))
            .arg(Arg::with_name("init-state")
                .long("init-state")
                .help("Create the starting-state file")))

        // plan subcommand
        .subcommand(SubCommand::with_name("plan")
            .display_order(21)
            .about("Build the specification described by a plan file and run its experiments")
            .arg(Arg::with_name("path")
                .required(true)
                .value_name("plan-path"))
            .arg(Arg::with_name("dry")
                .long("dry")
                .help("Only prepare scenarios and bind runs, don't execute them")))

        // instantiate subcommand
        .subcommand(SubCommand::with_name("instantiate")
            .display_order(30)
            .about("Write the starting state of a persisted population")
            .arg(Arg::with_name("popfile")
                .value_name("popfile")
                .help("Path to the persisted population"))
            .arg(Arg::with_name("statefile")
                .value_name("0.xml")
                .help("Path to the starting-state file to write")));

    app
}

pub fn app_matches() -> ArgMatches<'static> {
    app().get_matches()
}

/// Runs based on specified subcommand.
pub fn start(matches: ArgMatches) -> Result<()> {
    match matches.subcommand() {
        ("new", Some(m)) => start_new(m),
        ("check", Some(m)) => start_check(m),
        ("scenario", Some(m)) => start_scenario(m),
        ("plan", Some(m)) => start_plan(m),
        ("instantiate", Some(m)) => start_instantiate(m),
        _ => Ok(()),
    }
}

fn start_new(matches: &ArgMatches) -> Result<()> {
    setup_log_verbosity(matches)?;
    let path = matches
        .value_of("path")
        .ok_or(Error::msg("path must be provided"))?;
    let template = matches.value_of("template").unwrap_or("plan");
    init::init_at_path(template, path)
}

fn start_check(matches: &ArgMatches) -> Result<()> {
    setup_log_verbosity(matches)?;
    let config = load_config(matches)?;
    let model = matches
        .value_of("model")
        .ok_or(Error::msg("model name must be provided"))?;
    let model_type = matches
        .value_of("type")
        .unwrap_or(expman::DEFAULT_MODEL_TYPE);

    let env = SimEnvironment::from_config(&config)?;
    env.check_model(model, model_type)?;
    println!(
        "model {} ({}) at {} is ready for execution",
        model,
        model_type,
        env.model_path(model, model_type).display()
    );
    Ok(())
}

fn start_scenario(matches: &ArgMatches) -> Result<()> {
    setup_log_verbosity(matches)?;
    let config = load_config(matches)?;
    let name = matches
        .value_of("name")
        .ok_or(Error::msg("scenario name must be provided"))?;
    let model = matches
        .value_of("model")
        .ok_or(Error::msg("model name must be provided"))?;
    let model_type = matches
        .value_of("type")
        .unwrap_or(expman::DEFAULT_MODEL_TYPE);
    let desc = matches.value_of("desc").unwrap_or("No description");

    debug!("scenarios directory: {}", config.scenarios_dir.display());
    let mut scenario = Scenario::new(name, model, model_type, desc, &config)?;
    match scenario.origin() {
        PopulationOrigin::Restored => println!("Restored population of scenario '{}'", name),
        PopulationOrigin::Created => println!("Created population of scenario '{}'", name),
    }

    if let Some(regions) = matches.value_of("regions") {
        let regions = regions.parse::<u32>()?;
        scenario.edit_population_with(|pop| pop.set_num_regions(regions))?;
    }
    if let Some(values) = matches.values_of("agents") {
        let mut counts = Vec::new();
        for value in values {
            let (kind, count) = split_assignment(value, '=')?;
            counts.push((kind.to_string(), count.parse::<u32>()?));
        }
        scenario.edit_population_num_agents(counts)?;
    }
    if let Some(values) = matches.values_of("form") {
        let mut forms = Vec::new();
        for value in values {
            let (key, expr) = split_assignment(value, '=')?;
            let (kind, var) = split_assignment(key, '.')?;
            forms.push((kind.to_string(), var.to_string(), expr.parse::<InitForm>()?));
        }
        scenario.edit_population_init_forms(forms)?;
    }
    if matches.is_present("interactive") {
        let counts = edit::read_num_agents(scenario.population())?;
        scenario.edit_population_num_agents(counts)?;
        let forms = edit::read_init_forms(scenario.population())?;
        scenario.edit_population_init_forms(forms)?;
    }
    if matches.is_present("edit") {
        let editor = matches
            .value_of("editor")
            .map(|e| e.to_string())
            .or(config.editor.clone())
            .ok_or(Error::msg(
                "no population editor configured, use `--editor` or set `editor` in the config file",
            ))?;
        scenario.edit_population(&editor)?;
    }
    if matches.is_present("init-state") {
        let path = scenario.create_init_state()?;
        println!("Starting state created at {}", path.display());
    }

    print!("{}", scenario.summary());
    print_population(scenario.population());
    Ok(())
}

fn start_plan(matches: &ArgMatches) -> Result<()> {
    setup_log_verbosity(matches)?;
    let config = load_config(matches)?;
    let path = matches
        .value_of("path")
        .ok_or(Error::msg("plan path must be provided"))?;

    let plan = Plan::from_path(Path::new(path))?;
    info!("loaded plan for model {} ({})", plan.plan.model, plan.plan.model_type);
    let spec = plan.build(config.clone())?;
    println!("{}", spec.summary());
    if matches.is_present("dry") {
        return Ok(());
    }

    let env = SimEnvironment::from_config(&config)?;
    let reports = Plan::execute(&spec, &env)?;
    for report in &reports {
        let outcome = if report.status.success() {
            "ok".green()
        } else {
            format!("failed ({})", report.status).red()
        };
        println!(
            "{}/{}/{}: {}",
            report.scenario, report.experiment, report.run, outcome
        );
    }
    Ok(())
}

/// Restores a persisted population and writes its starting state, using
/// the population's own region count.
fn start_instantiate(matches: &ArgMatches) -> Result<()> {
    setup_log_verbosity(matches)?;
    let (pop_path, state_path) = match (matches.value_of("popfile"), matches.value_of("statefile")) {
        (Some(p), Some(s)) => (PathBuf::from(p), PathBuf::from(s)),
        _ => {
            println!("{}", matches.usage());
            return Ok(());
        }
    };

    let pop: Population = persist::restore(&pop_path)?;
    let regions = pop.num_regions();
    let mut writer = BufWriter::new(File::create(&state_path)?);
    pop.instantiate(regions, &mut writer)?;
    writer.flush()?;
    println!(
        "Population successfully created in {}",
        state_path.display()
    );
    Ok(())
}

fn load_config(matches: &ArgMatches) -> Result<Config> {
    let path = matches.value_of("config").unwrap_or(expman::CONFIG_FILE);
    Ok(Config::load_or_default(Path::new(path))?)
}

/// Splits `key<sep>value`, requiring both sides to be non-empty.
fn split_assignment(s: &str, sep: char) -> Result<(&str, &str)> {
    let mut split = s.splitn(2, sep);
    match (split.next(), split.next()) {
        (Some(k), Some(v)) if !k.trim().is_empty() && !v.trim().is_empty() => {
            Ok((k.trim(), v.trim()))
        }
        _ => Err(Error::msg(format!(
            "expected \"<key>{}<value>\", got \"{}\"",
            sep, s
        ))),
    }
}

fn print_population(pop: &Population) {
    println!(
        "\n\
         Population '{}' ({} region(s), seed {})\n\
         -----------------------------------------",
        pop.name(),
        pop.num_regions(),
        pop.seed()
    );
    for (kind, spec) in pop.agents().iter() {
        println!("{} : {} per region", kind, spec.count);
        for (var, form) in spec.vars.iter() {
            println!("    {} = {}", var, form);
        }
    }
}

/// Maps a verbosity name or number to a log level filter.
fn level_filter(verbosity: &str) -> Result<simplelog::LevelFilter> {
    use self::simplelog::LevelFilter;
    let level = match verbosity {
        "0" | "none" | "off" => LevelFilter::Off,
        "1" | "error" => LevelFilter::Error,
        "2" | "warn" => LevelFilter::Warn,
        "3" | "info" => LevelFilter::Info,
        "4" | "debug" => LevelFilter::Debug,
        "5" | "trace" => LevelFilter::Trace,
        _ => {
            return Err(Error::msg(format!(
                "unknown verbosity \"{}\", use one of none|error|warn|info|debug|trace or 0..5",
                verbosity
            )))
        }
    };
    Ok(level)
}

fn setup_log_verbosity(matches: &ArgMatches) -> Result<()> {
    use self::simplelog::{ConfigBuilder, LevelFilter, TermLogger, TerminalMode};
    let level = level_filter(matches.value_of("verbosity").unwrap_or(DEFAULT_VERBOSITY))?;
    let logger_conf = ConfigBuilder::new()
        .set_time_level(LevelFilter::Debug)
        .set_thread_level(LevelFilter::Off)
        .set_target_level(LevelFilter::Trace)
        .build();
    // a logger may already be installed, e.g. when running tests
    if TermLogger::init(level, logger_conf, TerminalMode::Mixed).is_err() {
        debug!("logger already set up, keeping it");
    }
    Ok(())
}

#[test]
fn assignments() {
    assert_eq!(split_assignment("Household=10", '=').unwrap(), ("Household", "10"));
    assert_eq!(
        split_assignment("Household.wealth = uniform(0, 1)", '=').unwrap(),
        ("Household.wealth", "uniform(0, 1)")
    );
    assert!(split_assignment("Household", '=').is_err());
    assert!(split_assignment("=3", '=').is_err());
}

#[test]
fn app_parses_repeated_edits() {
    let matches = app()
        .get_matches_from_safe(vec![
            "expman", "scenario", "s", "-m", "bielefeld", "-a", "Household=1", "-a", "Firm=2",
        ])
        .unwrap();
    let m = matches.subcommand_matches("scenario").unwrap();
    let agents: Vec<&str> = m.values_of("agents").unwrap().collect();
    assert_eq!(agents, vec!["Household=1", "Firm=2"]);
    assert_eq!(m.value_of("type"), Some("xmml"));
}

#[test]
fn verbosity_levels() {
    use self::simplelog::LevelFilter;
    assert_eq!(level_filter(DEFAULT_VERBOSITY).unwrap(), LevelFilter::Info);
    assert_eq!(level_filter("0").unwrap(), LevelFilter::Off);
    assert_eq!(level_filter("trace").unwrap(), LevelFilter::Trace);
    assert!(level_filter("loud").is_err());
}

#[cfg(test)]
const TEST_POPULATION_DEF: &str = r#"
[population]
regions = 3
seed = 11

[agents.Household]
count = 2
[agents.Household.vars]
id = "seq"
region_id = "region"
"#;

#[test]
fn instantiate_without_args_prints_usage() {
    let tmp = tempfile::tempdir().unwrap();
    let pop_path = tmp.path().join("pop.bin");
    let pop_arg = pop_path.to_str().unwrap();
    for args in vec![
        vec!["expman", "instantiate"],
        vec!["expman", "instantiate", pop_arg],
    ] {
        let matches = app().get_matches_from_safe(args).unwrap();
        assert!(start(matches).is_ok());
    }
    assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 0);
}

#[test]
fn instantiate_writes_state_with_stored_regions() {
    let tmp = tempfile::tempdir().unwrap();
    let def_path = tmp.path().join(expman::POPULATION_DEF_FILE);
    std::fs::write(&def_path, TEST_POPULATION_DEF).unwrap();
    let pop = Population::from_def_at("test", &def_path).unwrap();
    let pop_path = tmp.path().join(expman::POPULATION_FILE);
    persist::persist(&pop, &pop_path, false).unwrap();

    let state_path = tmp.path().join(expman::INIT_STATE_FILE);
    let matches = app()
        .get_matches_from_safe(vec![
            "expman",
            "instantiate",
            pop_path.to_str().unwrap(),
            state_path.to_str().unwrap(),
        ])
        .unwrap();
    start(matches).unwrap();

    let doc = std::fs::read_to_string(&state_path).unwrap();
    assert!(doc.contains("<num_regions>3</num_regions>"));
    assert_eq!(doc.matches("<xagent>").count(), 3 * 2);
    assert!(doc.contains("<region_id>3</region_id>"));
    assert!(doc.contains("<id>6</id>"));
}

#[test]
fn instantiate_missing_popfile_fails() {
    let tmp = tempfile::tempdir().unwrap();
    let matches = app()
        .get_matches_from_safe(vec![
            "expman",
            "instantiate",
            tmp.path().join("nope.bin").to_str().unwrap(),
            tmp.path().join("0.xml").to_str().unwrap(),
        ])
        .unwrap();
    assert!(start(matches).is_err());
    assert!(!tmp.path().join("0.xml").exists());
}

//! This library implements experiment management for agent-based
//! simulation models.
//!
//! Programming interface is centered around the [`Specification`]
//! structure, which groups named [`Scenario`]s for a single model. Each
//! scenario owns exactly one [`Population`], persisted to a dedicated
//! directory so that it survives between process invocations. Scenarios
//! hold [`Experiment`]s, which in turn hold [`Run`]s: single invocations
//! of the model's compiled simulator with a starting-state file and a
//! step count.
//!
//! # Simulation environment
//!
//! Simulators are executed out-of-process. The [`SimEnvironment`] checks
//! that the toolchain and a given model's executable are present, and
//! spawns the executable. It is passed explicitly to every operation that
//! executes runs.
//!
//! # Example
//!
//! ```ignore
//! use expman_core::{Config, SimEnvironment, Specification};
//!
//! let config = Config::default();
//! let env = SimEnvironment::from_config(&config)?;
//! let mut spec = Specification::new("bielefeld", "xmml", config);
//! let scenario = spec.add_scenario("bie-testscenario", "test scenario")?;
//! scenario.create_init_state()?;
//! scenario.add_experiment("testexp");
//! scenario.set_experiment_run("testexp", "testrun", 5)?;
//! scenario.run_experiment("testexp", &env)?;
//! println!("{}", spec.summary());
//! ```
//!
//! [`Specification`]: spec/struct.Specification.html
//! [`Scenario`]: scenario/struct.Scenario.html
//! [`Population`]: population/struct.Population.html
//! [`Experiment`]: experiment/struct.Experiment.html
//! [`Run`]: run/struct.Run.html
//! [`SimEnvironment`]: env/struct.SimEnvironment.html

#[macro_use]
extern crate serde;
#[macro_use]
extern crate log;

// reexports
pub use config::Config;
pub use env::SimEnvironment;
pub use error::{Error, Result};
pub use experiment::Experiment;
pub use plan::Plan;
pub use population::{InitForm, Population};
pub use run::Run;
pub use scenario::Scenario;
pub use spec::Specification;

pub mod config;
pub mod env;
pub mod error;
pub mod experiment;
pub mod persist;
pub mod plan;
pub mod population;
pub mod run;
pub mod scenario;
pub mod spec;

mod util;

pub const VERSION: &'static str = env!("CARGO_PKG_VERSION");

/// Model type used when none is specified.
pub const DEFAULT_MODEL_TYPE: &str = "xmml";

/// Default name of the configuration file.
pub const CONFIG_FILE: &str = "expman.toml";

/// Default toolchain directory.
pub const DEFAULT_TOOLCHAIN_DIR: &str = "xparser";
/// Default toolchain executable, only checked for existence.
pub const DEFAULT_TOOLCHAIN_EXEC: &str = "xparser";
/// Default models root directory.
pub const DEFAULT_MODELS_DIR: &str = "testdata/models";

/// Name of the compiled model executable within the model directory.
pub const MODEL_EXEC_NAME: &str = "main";
/// Name of the base population definition file within the model directory.
pub const POPULATION_DEF_FILE: &str = "population.toml";

/// Prefix of the per-scenario directory name.
pub const SCENARIO_DIR_PREFIX: &str = "scenario-";
/// Name of the persisted population file within the scenario directory.
pub const POPULATION_FILE: &str = "pop.bin";
/// Name of the starting-state file within the scenario directory.
pub const INIT_STATE_FILE: &str = "0.xml";

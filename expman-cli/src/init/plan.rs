use std::collections::HashMap;

pub fn template_files(name: &str) -> HashMap<String, String> {
    let mut map = HashMap::new();
    map.insert(
        "plan.toml".to_string(),
        format!(
            r##"# Experiment plan, run with `expman plan plan.toml`

[plan]
# model name, looked up at <models_dir>/<type>/<name>
model = "{name}"
type = "xmml"
# scenario directories are created here (optional, overrides the config)
#scenarios_dir = "scenarios"

[scenarios.baseline]
desc = "Baseline population"
regions = 2

# agents per region, by agent type
[scenarios.baseline.agents]
Household = 100

# init forms, by "<agent type>.<variable>"
[scenarios.baseline.forms]
"Household.wealth" = "uniform(0, 1000)"

# runs of an experiment, by run name, with their number of steps
[scenarios.baseline.experiments.calibration]
short = 10
long = 240
"##,
            name = name
        ),
    );
    map.extend(config_template_files());
    map
}

pub fn config_template_files() -> HashMap<String, String> {
    let mut map = HashMap::new();
    map.insert(
        expman::CONFIG_FILE.to_string(),
        r##"# directory holding the toolchain executable
toolchain_dir = "xparser"
toolchain_exec = "xparser"
# models are found at <models_dir>/<type>/<name>
models_dir = "models"
scenarios_dir = "scenarios"
# compress persisted populations
compress = true
# external population editor, invoked with the scenario directory
#editor = "popgui"
"##
        .to_string(),
    );
    map
}

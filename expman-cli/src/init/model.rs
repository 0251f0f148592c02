use std::collections::HashMap;

pub fn template_files(name: &str) -> HashMap<String, String> {
    let mut map = HashMap::new();
    map.insert(
        expman::POPULATION_DEF_FILE.to_string(),
        format!(
            r##"# Base population of the {name} model.
#
# Init forms:
#   "42"                 constant value
#   "uniform(a, b)"      uniform real in [a, b]
#   "uniform_int(a, b)"  uniform integer in [a, b]
#   "seq" / "seq(n)"     running number per agent type, from 1 or n
#   "region"             1-based index of the agent's region

[population]
regions = 2
seed = 1

[agents.Household]
count = 10
[agents.Household.vars]
id = "seq"
region_id = "region"
wealth = "uniform(0, 100)"

[agents.Firm]
count = 2
[agents.Firm.vars]
id = "seq(1000)"
region_id = "region"
employees = "uniform_int(1, 20)"
"##,
            name = name
        ),
    );
    map
}

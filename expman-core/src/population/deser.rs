//! Structs used for deserializing base population definition files.
//!
//! ```toml
//! [population]
//! regions = 2
//! seed = 42
//!
//! [agents.Household]
//! count = 100
//! [agents.Household.vars]
//! id = "seq"
//! region_id = "region"
//! wealth = "uniform(0, 1000)"
//! ```

use linked_hash_map::LinkedHashMap;

use super::InitForm;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PopulationDef {
    #[serde(default)]
    pub population: PopulationSection,
    #[serde(default)]
    pub agents: LinkedHashMap<String, AgentDef>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PopulationSection {
    pub regions: u32,
    pub seed: u64,
}

impl Default for PopulationSection {
    fn default() -> Self {
        Self {
            regions: 1,
            seed: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentDef {
    /// Number of agents placed in each region
    #[serde(default)]
    pub count: u32,
    #[serde(default)]
    pub vars: LinkedHashMap<String, InitForm>,
}

//! Agent populations, created from a model's base population definition
//! and turned into starting-state files.

mod deser;
mod form;
mod xml;

pub use self::deser::{AgentDef, PopulationDef, PopulationSection};
pub use self::form::InitForm;

use std::io::Write;
use std::path::{Path, PathBuf};

use linked_hash_map::LinkedHashMap;
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::error::Error;
use crate::persist::Persist;
use crate::util;
use crate::Result;

/// Definition of a single agent type within the population.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSpec {
    /// Number of agents placed in each region
    pub count: u32,
    /// Init forms of the agent variables, in declaration order
    pub vars: LinkedHashMap<String, InitForm>,
}

/// Single generated agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agent {
    pub kind: String,
    pub region: u32,
    pub vars: Vec<(String, String)>,
}

/// Set of agents and their initial attributes.
///
/// Agent types keep the order of the definition file, which is also the
/// order agents are written in the starting-state document. Generation is
/// deterministic for a given seed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Population {
    name: String,
    source: PathBuf,
    num_regions: u32,
    seed: u64,
    agents: LinkedHashMap<String, AgentSpec>,
    instances: Vec<Agent>,
}

impl Persist for Population {
    const KIND: &'static str = "population";
}

impl Population {
    /// Creates a new population from the definition file at the given path.
    pub fn from_def_at(name: &str, path: &Path) -> Result<Self> {
        let def: PopulationDef = util::deser_struct_from_path(path)?;
        Self::from_def(name, def, path.to_path_buf())
    }

    /// Creates a new population from a deserialized definition.
    pub fn from_def(name: &str, def: PopulationDef, source: PathBuf) -> Result<Self> {
        if def.population.regions == 0 {
            return Err(Error::Configuration(format!(
                "population definition {} must declare at least one region",
                source.display()
            )));
        }
        let mut agents = LinkedHashMap::new();
        for (kind, agent_def) in def.agents {
            for (var, form) in agent_def.vars.iter() {
                if !xml::is_valid_name(var) {
                    return Err(Error::Configuration(format!(
                        "agent variable \"{}\" of {} is not a valid XML element name",
                        var, kind
                    )));
                }
                form.validate()?;
            }
            agents.insert(
                kind,
                AgentSpec {
                    count: agent_def.count,
                    vars: agent_def.vars,
                },
            );
        }
        Ok(Self {
            name: name.to_string(),
            source,
            num_regions: def.population.regions,
            seed: def.population.seed,
            agents,
            instances: Vec::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Path to the definition file the population was created from.
    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn num_regions(&self) -> u32 {
        self.num_regions
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn agents(&self) -> &LinkedHashMap<String, AgentSpec> {
        &self.agents
    }

    pub fn agent(&self, kind: &str) -> Result<&AgentSpec> {
        self.agents
            .get(kind)
            .ok_or_else(|| Error::undefined_key("agent type", kind, self.agents.keys()))
    }

    /// Agents generated with the last call to `recreate`.
    pub fn instances(&self) -> &[Agent] {
        &self.instances
    }

    /// Sets the number of agents of the given type placed in each region.
    pub fn set_num_agents(&mut self, kind: &str, count: u32) -> Result<()> {
        let known = self.agents.keys().cloned().collect::<Vec<_>>();
        let spec = self
            .agents
            .get_mut(kind)
            .ok_or_else(|| Error::undefined_key("agent type", kind, &known))?;
        spec.count = count;
        Ok(())
    }

    /// Sets the init form of an existing agent variable.
    pub fn set_init_form(&mut self, kind: &str, var: &str, form: InitForm) -> Result<()> {
        form.validate()?;
        let known = self.agents.keys().cloned().collect::<Vec<_>>();
        let spec = self
            .agents
            .get_mut(kind)
            .ok_or_else(|| Error::undefined_key("agent type", kind, &known))?;
        match spec.vars.get_mut(var) {
            Some(f) => {
                *f = form;
                Ok(())
            }
            None => Err(Error::undefined_key(
                "agent variable",
                var,
                spec.vars.keys(),
            )),
        }
    }

    pub fn set_num_regions(&mut self, regions: u32) -> Result<()> {
        if regions == 0 {
            return Err(Error::Configuration(
                "number of regions must be at least one".to_string(),
            ));
        }
        self.num_regions = regions;
        Ok(())
    }

    pub fn set_seed(&mut self, seed: u64) {
        self.seed = seed;
    }

    /// Regenerates the agents using the current definition.
    pub fn recreate(&mut self) -> Result<()> {
        self.instances = self.generate(self.num_regions)?;
        debug!(
            "recreated population {}: {} agents in {} region(s)",
            self.name,
            self.instances.len(),
            self.num_regions
        );
        Ok(())
    }

    /// Generates agents for the given number of regions, without storing
    /// them.
    pub fn generate(&self, regions: u32) -> Result<Vec<Agent>> {
        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut agents = Vec::new();
        for (kind, spec) in self.agents.iter() {
            let mut index: u64 = 0;
            for region in 1..=regions {
                for _ in 0..spec.count {
                    let vars = spec
                        .vars
                        .iter()
                        .map(|(var, form)| -> Result<(String, String)> {
                            Ok((var.clone(), form.generate(&mut rng, region, index)?))
                        })
                        .collect::<Result<Vec<_>>>()?;
                    agents.push(Agent {
                        kind: kind.clone(),
                        region,
                        vars,
                    });
                    index += 1;
                }
            }
        }
        Ok(agents)
    }

    /// Writes the starting-state form of the currently generated agents.
    pub fn write_xml<W: Write>(&self, out: &mut W) -> Result<()> {
        xml::write_states(out, self.num_regions, &self.instances)?;
        Ok(())
    }

    /// Returns the starting-state form of the currently generated agents.
    pub fn to_xml(&self) -> Result<String> {
        let mut buf = Vec::new();
        self.write_xml(&mut buf)?;
        String::from_utf8(buf).map_err(|e| Error::Io(e.to_string()))
    }

    /// Generates agents for the given number of regions and writes them out
    /// as a starting state.
    ///
    /// The region count is taken from the caller, not from the population,
    /// so the same persisted population can be instantiated for different
    /// region setups.
    pub fn instantiate<W: Write>(&self, regions: u32, out: &mut W) -> Result<()> {
        if regions == 0 {
            return Err(Error::Configuration(
                "number of regions must be at least one".to_string(),
            ));
        }
        let agents = self.generate(regions)?;
        xml::write_states(out, regions, &agents)?;
        Ok(())
    }
}

#[cfg(test)]
pub(crate) fn test_def() -> PopulationDef {
    let def = r#"
[population]
regions = 2
seed = 7

[agents.Household]
count = 3
[agents.Household.vars]
id = "seq"
region_id = "region"
wealth = "uniform(0, 100)"

[agents.Firm]
count = 1
[agents.Firm.vars]
id = "seq(1000)"
employees = "10"
"#;
    toml::from_str(def).unwrap()
}

#[test]
fn from_def_keeps_declaration_order() {
    let pop = Population::from_def("p", test_def(), PathBuf::from("population.toml")).unwrap();
    let kinds: Vec<&String> = pop.agents().keys().collect();
    assert_eq!(kinds, vec!["Household", "Firm"]);
    let vars: Vec<&String> = pop.agent("Household").unwrap().vars.keys().collect();
    assert_eq!(vars, vec!["id", "region_id", "wealth"]);
    assert_eq!(pop.num_regions(), 2);
    assert!(pop.instances().is_empty());
}

#[test]
fn recreate_generates_per_region() {
    let mut pop = Population::from_def("p", test_def(), PathBuf::new()).unwrap();
    pop.recreate().unwrap();
    assert_eq!(pop.instances().len(), 3 * 2 + 2);

    let households: Vec<&Agent> = pop
        .instances()
        .iter()
        .filter(|a| a.kind == "Household")
        .collect();
    let ids: Vec<&str> = households.iter().map(|a| a.vars[0].1.as_str()).collect();
    assert_eq!(ids, vec!["1", "2", "3", "4", "5", "6"]);
    assert_eq!(households[3].region, 2);
    assert_eq!(households[3].vars[1].1, "2");

    let firm_ids: Vec<&str> = pop
        .instances()
        .iter()
        .filter(|a| a.kind == "Firm")
        .map(|a| a.vars[0].1.as_str())
        .collect();
    assert_eq!(firm_ids, vec!["1000", "1001"]);
}

#[test]
fn recreate_is_deterministic() {
    let mut a = Population::from_def("p", test_def(), PathBuf::new()).unwrap();
    let mut b = a.clone();
    a.recreate().unwrap();
    b.recreate().unwrap();
    assert_eq!(a.instances(), b.instances());
    b.set_seed(8);
    b.recreate().unwrap();
    assert_ne!(a.instances(), b.instances());
}

#[test]
fn edits_unknown_keys_fail() {
    let mut pop = Population::from_def("p", test_def(), PathBuf::new()).unwrap();
    assert!(pop.set_num_agents("Household", 10).is_ok());
    assert_eq!(pop.agent("Household").unwrap().count, 10);
    match pop.set_num_agents("Housheold", 1) {
        Err(Error::UndefinedKey { suggestion, .. }) => {
            assert_eq!(suggestion, Some("Household".to_string()))
        }
        other => panic!("unexpected result: {:?}", other),
    }
    assert!(pop
        .set_init_form("Firm", "employees", InitForm::UniformInt(1, 50))
        .is_ok());
    assert!(matches!(
        pop.set_init_form("Firm", "salary", InitForm::Region),
        Err(Error::UndefinedKey { .. })
    ));
    assert!(pop.set_num_regions(0).is_err());
}

#[test]
fn instantiate_uses_given_region_count() {
    let pop = Population::from_def("p", test_def(), PathBuf::new()).unwrap();
    let mut buf = Vec::new();
    pop.instantiate(3, &mut buf).unwrap();
    let doc = String::from_utf8(buf).unwrap();
    assert!(doc.contains("<num_regions>3</num_regions>"));
    assert_eq!(doc.matches("<xagent>").count(), 3 * 3 + 3);
    // stored definition is left untouched
    assert_eq!(pop.num_regions(), 2);
}

#[test]
fn seq_overflow_fails_recreate() {
    let mut pop = Population::from_def("p", test_def(), PathBuf::new()).unwrap();
    pop.set_init_form("Household", "id", InitForm::Seq(i64::MAX))
        .unwrap();
    assert!(matches!(pop.recreate(), Err(Error::InvalidInitForm(_))));
    assert!(pop.instances().is_empty());
    assert!(pop.instantiate(1, &mut Vec::<u8>::new()).is_err());
}

#[test]
fn from_def_rejects_bad_var_names() {
    for name in &["net worth", "a<b", "1st", ""] {
        let mut def = test_def();
        if let Some(firm) = def.agents.get_mut("Firm") {
            firm.vars.insert(name.to_string(), InitForm::Region);
        }
        assert!(
            matches!(
                Population::from_def("p", def, PathBuf::new()),
                Err(Error::Configuration(_))
            ),
            "expected failure for {:?}",
            name
        );
    }
}

#[test]
fn odd_literal_survives_persistence() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("pop.bin");
    let mut pop = Population::from_def("p", test_def(), PathBuf::new()).unwrap();
    let form: InitForm = "a,b(c".parse().unwrap();
    pop.set_init_form("Firm", "employees", form).unwrap();
    crate::persist::persist(&pop, &path, false).unwrap();
    let restored: Population = crate::persist::restore(&path).unwrap();
    assert_eq!(restored, pop);
    assert_eq!(
        restored.agent("Firm").unwrap().vars.get("employees"),
        Some(&InitForm::Const("a,b(c".to_string()))
    );
}

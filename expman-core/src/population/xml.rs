//! Starting-state file writer.
//!
//! The starting state is the iteration zero XML document read by the
//! compiled model executables:
//!
//! ```xml
//! <states>
//! <itno>0</itno>
//! <environment>
//! <num_regions>2</num_regions>
//! </environment>
//! <xagent>
//! <name>Household</name>
//! <id>1</id>
//! </xagent>
//! </states>
//! ```

use std::io::{self, Write};

use super::Agent;

/// Writes the starting-state document for the given agents.
pub fn write_states<W: Write>(out: &mut W, regions: u32, agents: &[Agent]) -> io::Result<()> {
    writeln!(out, "<states>")?;
    writeln!(out, "<itno>0</itno>")?;
    writeln!(out, "<environment>")?;
    writeln!(out, "<num_regions>{}</num_regions>", regions)?;
    writeln!(out, "</environment>")?;
    for agent in agents {
        writeln!(out, "<xagent>")?;
        writeln!(out, "<name>{}</name>", escape(&agent.kind))?;
        for (var, value) in &agent.vars {
            writeln!(out, "<{var}>{}</{var}>", escape(value), var = var)?;
        }
        writeln!(out, "</xagent>")?;
    }
    writeln!(out, "</states>")?;
    Ok(())
}

/// Checks whether the name can be used as an element name, which is how
/// agent variables are written.
pub fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' => (),
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || c == '_' || c == '-' || c == '.')
}

fn escape(s: &str) -> String {
    let mut escaped = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

#[test]
fn states_document() {
    let agents = vec![Agent {
        kind: "Firm".to_string(),
        region: 1,
        vars: vec![
            ("id".to_string(), "1".to_string()),
            ("label".to_string(), "a<b".to_string()),
        ],
    }];
    let mut buf = Vec::new();
    write_states(&mut buf, 1, &agents).unwrap();
    let doc = String::from_utf8(buf).unwrap();
    assert_eq!(
        doc,
        "<states>\n<itno>0</itno>\n<environment>\n<num_regions>1</num_regions>\n\
         </environment>\n<xagent>\n<name>Firm</name>\n<id>1</id>\n\
         <label>a&lt;b</label>\n</xagent>\n</states>\n"
    );
}

#[test]
fn element_names() {
    for name in &["id", "region_id", "_x", "net-worth", "v2.1"] {
        assert!(is_valid_name(name), "{}", name);
    }
    for name in &["", "net worth", "a<b", "1st", "-x", "a&b"] {
        assert!(!is_valid_name(name), "{}", name);
    }
}

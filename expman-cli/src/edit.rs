//! Interactive population edits.
//!
//! Each prompt shows the current value. Empty input keeps it, end of input
//! (ctrl-d) or an interrupt stops asking and returns the edits collected
//! so far.

use anyhow::Result;
use linefeed::{Interface, ReadResult};

use expman::{InitForm, Population};

/// Asks for the per-region agent count of each agent type.
pub fn read_num_agents(pop: &Population) -> Result<Vec<(String, u32)>> {
    let interface = Interface::new("expman-agents")?;
    let mut edits = Vec::new();
    println!("Agents per region (empty keeps the current count):");
    for (kind, spec) in pop.agents().iter() {
        let prompt = format!("{} [{}]: ", kind, spec.count);
        loop {
            let line = match read(&interface, &prompt)? {
                Some(l) => l,
                None => return Ok(edits),
            };
            if line.is_empty() {
                break;
            }
            match line.parse::<u32>() {
                Ok(count) => {
                    edits.push((kind.clone(), count));
                    break;
                }
                Err(e) => println!("invalid count \"{}\": {}", line, e),
            }
        }
    }
    Ok(edits)
}

/// Asks for the init form of each variable of each agent type.
pub fn read_init_forms(pop: &Population) -> Result<Vec<(String, String, InitForm)>> {
    let interface = Interface::new("expman-forms")?;
    let mut edits = Vec::new();
    println!("Init forms (empty keeps the current form):");
    for (kind, spec) in pop.agents().iter() {
        for (var, form) in spec.vars.iter() {
            let prompt = format!("{}.{} [{}]: ", kind, var, form);
            loop {
                let line = match read(&interface, &prompt)? {
                    Some(l) => l,
                    None => return Ok(edits),
                };
                if line.is_empty() {
                    break;
                }
                match line.parse::<InitForm>() {
                    Ok(new_form) => {
                        edits.push((kind.clone(), var.clone(), new_form));
                        break;
                    }
                    Err(e) => println!("{}", e),
                }
            }
        }
    }
    Ok(edits)
}

/// Reads one trimmed line, `None` once the user is done.
fn read<T: linefeed::Terminal>(interface: &Interface<T>, prompt: &str) -> Result<Option<String>> {
    interface.set_prompt(prompt)?;
    match interface.read_line()? {
        ReadResult::Input(line) => Ok(Some(line.trim().to_string())),
        ReadResult::Eof | ReadResult::Signal(_) => {
            debug!("interactive edit stopped");
            Ok(None)
        }
    }
}

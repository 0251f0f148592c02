//! Initialize plans and model definitions based on templates.

pub mod model;
pub mod plan;

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use anyhow::{Error, Result};

/// Creates a new directory at `path_str` filled with the files of the
/// given template.
pub fn init_at_path(template_str: &str, path_str: &str) -> Result<()> {
    println!(
        "Initiating new {template} at: {path}",
        template = template_str,
        path = path_str
    );

    // get the file stem as the name
    let path = Path::new(path_str);
    let name = path
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or(Error::msg(format!("Invalid path: {}", path_str)))?;

    // test if directory doesn't already exist at path
    if path.exists() {
        return Err(Error::msg(format!(
            "Can't initialize {template}, directory already exists ({path}). Try another path.",
            template = template_str,
            path = path_str
        )));
    }

    let template_files = collect_template_files(template_str, name).ok_or(Error::msg(format!(
        "Failed getting template files for template \"{}\"",
        template_str
    )))?;

    fs::create_dir_all(path)?;
    create_template_files(path, template_files)?;

    Ok(())
}

// Create actual files from the template file content
fn create_template_files(path: &Path, files: HashMap<String, String>) -> Result<()> {
    for (name, content) in files {
        let file_full_path = path.join(&name);
        if let Some(parent) = file_full_path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&file_full_path, content).map_err(|e| {
            Error::msg(format!(
                "Failed to create template file \"{}\": {}",
                file_full_path.display(),
                e
            ))
        })?;
        debug!("created {}", file_full_path.display());
    }
    Ok(())
}

fn collect_template_files(template_str: &str, name: &str) -> Option<HashMap<String, String>> {
    match template_str {
        "plan" => Some(plan::template_files(name)),
        "config" => Some(plan::config_template_files()),
        "model" => Some(model::template_files(name)),
        _ => None,
    }
}

#[test]
fn init_refuses_existing_dir() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().to_str().unwrap();
    assert!(init_at_path("plan", path).is_err());
}

#[test]
fn init_plan_template() {
    let tmp = tempfile::tempdir().unwrap();
    let target = tmp.path().join("bielefeld_study");
    init_at_path("plan", target.to_str().unwrap()).unwrap();

    let plan = expman::Plan::from_path(&target.join("plan.toml")).unwrap();
    assert_eq!(plan.plan.model, "bielefeld_study");
    assert!(!plan.scenarios.is_empty());
    let config = expman::Config::from_path(&target.join(expman::CONFIG_FILE)).unwrap();
    assert_eq!(config.models_dir, Path::new("models"));
}

#[test]
fn init_model_template() {
    let tmp = tempfile::tempdir().unwrap();
    let target = tmp.path().join("island");
    init_at_path("model", target.to_str().unwrap()).unwrap();

    let pop = expman::Population::from_def_at("island", &target.join(expman::POPULATION_DEF_FILE))
        .unwrap();
    assert_eq!(pop.num_regions(), 2);
    assert!(pop.agent("Household").is_ok());
    assert!(init_at_path("unknown", tmp.path().join("x").to_str().unwrap()).is_err());
}

//! Contains a collection of useful utility functions.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::error::Error;
use crate::Result;

/// Minimum normalized similarity for a known key to be suggested.
const SUGGESTION_THRESHOLD: f64 = 0.7;

/// Create a static deser object from given path using serde.
///
/// Format is selected based on the file extension.
pub fn deser_struct_from_path<T>(file_path: &Path) -> Result<T>
where
    for<'de> T: serde::Deserialize<'de>,
{
    let bytes = fs::read(file_path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => Error::FileNotFound(file_path.to_path_buf()),
        _ => Error::from(e),
    })?;
    let ext = file_path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("");
    let d: T = match ext {
        "toml" => toml::from_slice(&bytes)?,
        #[cfg(feature = "yaml")]
        "yaml" | "yml" => serde_yaml::from_slice(&bytes)?,
        _ => return Err(Error::UnsupportedExtension(ext.to_string())),
    };
    Ok(d)
}

/// Makes sure a directory exists at the given path, creating it together
/// with any missing parents.
///
/// An already existing directory is not an error. An existing file or
/// other non-directory object at the path is.
pub fn ensure_dir(path: &Path) -> Result<()> {
    if path.is_dir() {
        return Ok(());
    }
    if path.exists() {
        return Err(Error::NotADirectory(path.to_path_buf()));
    }
    match fs::create_dir_all(path) {
        Ok(_) => Ok(()),
        // lost a race with someone else creating the same directory
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists && path.is_dir() => Ok(()),
        Err(e) => {
            error!("failed creating directory {}: {}", path.display(), e);
            Err(Error::from(e))
        }
    }
}

/// Path to the model directory: `<models_dir>/<model_type>/<model_name>`.
pub fn model_path(models_dir: &Path, model_name: &str, model_type: &str) -> PathBuf {
    models_dir.join(model_type).join(model_name)
}

/// Finds the known key most similar to `name`, if any is similar enough.
pub fn closest_match<'a, I>(name: &str, known: I) -> Option<String>
where
    I: IntoIterator<Item = &'a String>,
{
    known
        .into_iter()
        .map(|k| (strsim::normalized_levenshtein(name, k), k))
        .filter(|(score, _)| *score >= SUGGESTION_THRESHOLD)
        .max_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(_, k)| k.clone())
}

#[test]
fn ensure_dir_is_idempotent() {
    let tmp = tempfile::tempdir().unwrap();
    let dir = tmp.path().join("a").join("b");
    assert!(ensure_dir(&dir).is_ok());
    assert!(dir.is_dir());
    assert!(ensure_dir(&dir).is_ok());
}

#[test]
fn ensure_dir_rejects_file() {
    let tmp = tempfile::tempdir().unwrap();
    let file = tmp.path().join("taken");
    fs::write(&file, b"x").unwrap();
    match ensure_dir(&file) {
        Err(Error::NotADirectory(p)) => assert_eq!(p, file),
        other => panic!("unexpected result: {:?}", other),
    }
}

#[test]
fn closest_match_suggests_similar_key() {
    let known = vec!["testexp".to_string(), "other".to_string()];
    assert_eq!(closest_match("testexq", &known), Some("testexp".to_string()));
    assert_eq!(closest_match("zzz", &known), None);
}

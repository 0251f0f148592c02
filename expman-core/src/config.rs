//! Configuration of the directories and tools used for managing
//! experiments.

use std::path::{Path, PathBuf};

use crate::error::Error;
use crate::util;
use crate::{Result, DEFAULT_MODELS_DIR, DEFAULT_TOOLCHAIN_DIR, DEFAULT_TOOLCHAIN_EXEC};

/// Configuration, usually read from an `expman.toml` file.
///
/// # Example
///
/// ```toml
/// toolchain_dir = "xparser"
/// models_dir = "testdata/models"
/// scenarios_dir = "scenarios"
/// compress = true
/// editor = "popgui"
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory holding the model toolchain
    pub toolchain_dir: PathBuf,
    /// Toolchain executable, checked for existence within `toolchain_dir`
    pub toolchain_exec: String,
    /// Root directory of the models, laid out as `<type>/<name>`
    pub models_dir: PathBuf,
    /// Directory in which per-scenario directories are created
    pub scenarios_dir: PathBuf,
    /// Compress persisted populations
    pub compress: bool,
    /// External population editor command
    pub editor: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            toolchain_dir: PathBuf::from(DEFAULT_TOOLCHAIN_DIR),
            toolchain_exec: DEFAULT_TOOLCHAIN_EXEC.to_string(),
            models_dir: PathBuf::from(DEFAULT_MODELS_DIR),
            scenarios_dir: PathBuf::from("."),
            compress: false,
            editor: None,
        }
    }
}

impl Config {
    /// Reads the configuration from a file at the given path.
    pub fn from_path(path: &Path) -> Result<Self> {
        util::deser_struct_from_path(path)
    }

    /// Reads the configuration from a file at the given path, falling back
    /// to the default configuration if the file doesn't exist.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        match Self::from_path(path) {
            Ok(c) => {
                info!("loaded config from {}", path.display());
                Ok(c)
            }
            Err(Error::FileNotFound(_)) => {
                info!(
                    "config file {} doesn't exist, using default settings",
                    path.display()
                );
                Ok(Self::default())
            }
            Err(e) => Err(e),
        }
    }
}

#[test]
fn config_partial_file_uses_defaults() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("expman.toml");
    std::fs::write(&path, "models_dir = \"models\"\ncompress = true\n").unwrap();
    let config = Config::from_path(&path).unwrap();
    assert_eq!(config.models_dir, PathBuf::from("models"));
    assert!(config.compress);
    assert_eq!(config.toolchain_dir, PathBuf::from(DEFAULT_TOOLCHAIN_DIR));
    assert_eq!(config.editor, None);
}

#[test]
fn config_missing_file_is_default() {
    let tmp = tempfile::tempdir().unwrap();
    let config = Config::load_or_default(&tmp.path().join("nope.toml")).unwrap();
    assert_eq!(config, Config::default());
}

#[test]
fn config_malformed_file_fails() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("expman.toml");
    std::fs::write(&path, "compress = \"maybe\"\n").unwrap();
    assert!(matches!(
        Config::load_or_default(&path),
        Err(Error::TomlDeser(_))
    ));
}

//! Error types.

use std::io;
use std::path::PathBuf;

pub type Result<T> = core::result::Result<T, Error>;

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

/// Crate-wide error type.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("io error: {0}")]
    Io(String),

    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("model not found: {0}")]
    ModelNotFound(String),
    #[error("file not found: {}", .0.display())]
    FileNotFound(PathBuf),
    #[error("path exists but is not a directory: {}", .0.display())]
    NotADirectory(PathBuf),

    #[error("no such run defined: {0}")]
    UndefinedRun(String),
    #[error("no such {kind} defined: {name}{}", did_you_mean(.suggestion))]
    UndefinedKey {
        kind: &'static str,
        name: String,
        suggestion: Option<String>,
    },

    #[error("invalid init form: {0}")]
    InvalidInitForm(String),

    #[cfg(feature = "yaml")]
    #[error("yaml deserialization error: {0}")]
    YamlDeser(#[from] serde_yaml::Error),
    #[error("toml deserialization error: {0}")]
    TomlDeser(#[from] toml::de::Error),
    #[error("unsupported file extension: {0}")]
    UnsupportedExtension(String),
    #[error("semver req parse error")]
    SemverReqParse(#[from] semver::ReqParseError),
    #[error("semver error")]
    Semver(#[from] semver::SemVerError),

    #[cfg(feature = "lz4")]
    #[error("failed decompressing payload: {0}")]
    Decompression(String),
    #[error("failed reading persisted file: {0}")]
    FailedReadingEnvelope(String),
    #[error("failed creating persisted file: {0}")]
    FailedCreatingEnvelope(String),
    #[error("unexpected payload: expected {expected}, found {found}")]
    UnexpectedPayload { expected: String, found: String },
    #[error("unsupported format version: found {found}, supported {supported}")]
    UnsupportedFormatVersion { found: String, supported: String },
}

impl Error {
    /// Creates an undefined key error, suggesting the closest of the
    /// known keys if any of them is similar enough.
    pub fn undefined_key<'a, I>(kind: &'static str, name: &str, known: I) -> Self
    where
        I: IntoIterator<Item = &'a String>,
    {
        Error::UndefinedKey {
            kind,
            name: name.to_string(),
            suggestion: crate::util::closest_match(name, known),
        }
    }
}

fn did_you_mean(suggestion: &Option<String>) -> String {
    match suggestion {
        Some(s) => format!(" (did you mean \"{}\"?)", s),
        None => String::new(),
    }
}

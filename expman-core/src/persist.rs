//! Generic persistence of objects to the file system.
//!
//! Objects are stored inside a versioned envelope. The envelope header
//! names the kind of the stored object and the version of the format it
//! was written with, which allows detecting stale or foreign files before
//! attempting to decode the payload.

use std::fs;
use std::io;
use std::path::Path;

use chrono::{DateTime, Utc};
use semver::{Version, VersionReq};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::Error;
use crate::Result;

/// Version of the envelope format written by this library.
pub const FORMAT_VERSION: &str = "0.1.0";
/// Requirement that an envelope's format version has to meet to be read.
pub const SUPPORTED_FORMAT: &str = "^0.1";

/// Object that can be persisted to and restored from a file.
pub trait Persist: Serialize + DeserializeOwned {
    /// Tag identifying the kind of the stored object.
    const KIND: &'static str;
}

/// Metadata stored in front of every persisted object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Header {
    pub kind: String,
    pub version: String,
    pub created: DateTime<Utc>,
    pub compressed: bool,
}

#[derive(Serialize, Deserialize)]
struct Envelope {
    header: Header,
    payload: Vec<u8>,
}

/// Serializes the object into envelope bytes.
pub fn to_bytes<T: Persist>(obj: &T, compress: bool) -> Result<Vec<u8>> {
    let mut payload =
        bincode::serialize(obj).map_err(|e| Error::FailedCreatingEnvelope(e.to_string()))?;
    let mut compressed = false;
    if compress {
        #[cfg(feature = "lz4")]
        {
            payload = lz4::block::compress(&payload, None, true)?;
            compressed = true;
        }
        #[cfg(not(feature = "lz4"))]
        warn!("compression requested but lz4 feature is not enabled, storing uncompressed");
    }
    let envelope = Envelope {
        header: Header {
            kind: T::KIND.to_string(),
            version: FORMAT_VERSION.to_string(),
            created: Utc::now(),
            compressed,
        },
        payload,
    };
    bincode::serialize(&envelope).map_err(|e| Error::FailedCreatingEnvelope(e.to_string()))
}

/// Deserializes the object from envelope bytes, validating the header.
pub fn from_bytes<T: Persist>(bytes: &[u8]) -> Result<T> {
    let envelope: Envelope =
        bincode::deserialize(bytes).map_err(|e| Error::FailedReadingEnvelope(e.to_string()))?;
    check_header::<T>(&envelope.header)?;

    if envelope.header.compressed {
        #[cfg(feature = "lz4")]
        {
            let data = lz4::block::decompress(&envelope.payload, None)
                .map_err(|e| Error::Decompression(e.to_string()))?;
            return bincode::deserialize(&data)
                .map_err(|e| Error::FailedReadingEnvelope(e.to_string()));
        }
        #[cfg(not(feature = "lz4"))]
        return Err(Error::FailedReadingEnvelope(
            "payload is compressed but lz4 feature is not enabled".to_string(),
        ));
    }
    bincode::deserialize(&envelope.payload).map_err(|e| Error::FailedReadingEnvelope(e.to_string()))
}

/// Writes the object to a file at the given path, replacing any previous
/// content.
pub fn persist<T: Persist>(obj: &T, path: &Path, compress: bool) -> Result<()> {
    let bytes = to_bytes(obj, compress)?;
    fs::write(path, bytes)?;
    debug!("persisted {} to {}", T::KIND, path.display());
    Ok(())
}

/// Reads an object back from a file at the given path.
pub fn restore<T: Persist>(path: &Path) -> Result<T> {
    let bytes = read(path)?;
    let obj = from_bytes(&bytes)?;
    debug!("restored {} from {}", T::KIND, path.display());
    Ok(obj)
}

/// Reads only the header of a persisted file.
pub fn read_header(path: &Path) -> Result<Header> {
    let bytes = read(path)?;
    let envelope: Envelope =
        bincode::deserialize(&bytes).map_err(|e| Error::FailedReadingEnvelope(e.to_string()))?;
    Ok(envelope.header)
}

fn read(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => Error::FileNotFound(path.to_path_buf()),
        _ => Error::from(e),
    })
}

fn check_header<T: Persist>(header: &Header) -> Result<()> {
    if header.kind != T::KIND {
        return Err(Error::UnexpectedPayload {
            expected: T::KIND.to_string(),
            found: header.kind.clone(),
        });
    }
    let version = Version::parse(&header.version)?;
    let req = VersionReq::parse(SUPPORTED_FORMAT)?;
    if !req.matches(&version) {
        return Err(Error::UnsupportedFormatVersion {
            found: header.version.clone(),
            supported: SUPPORTED_FORMAT.to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
#[derive(Debug, PartialEq, Serialize, Deserialize)]
struct Dummy {
    name: String,
    values: Vec<u32>,
}

#[cfg(test)]
impl Persist for Dummy {
    const KIND: &'static str = "dummy";
}

#[cfg(test)]
#[derive(Debug, Serialize, Deserialize)]
struct Other {
    x: u8,
}

#[cfg(test)]
impl Persist for Other {
    const KIND: &'static str = "other";
}

#[test]
fn persist_restore_file() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("dummy.bin");
    let dummy = Dummy {
        name: "d".to_string(),
        values: vec![1, 2, 3],
    };
    persist(&dummy, &path, false).unwrap();
    let restored: Dummy = restore(&path).unwrap();
    assert_eq!(restored, dummy);

    let header = read_header(&path).unwrap();
    assert_eq!(header.kind, "dummy");
    assert_eq!(header.version, FORMAT_VERSION);
    assert!(!header.compressed);
}

#[cfg(feature = "lz4")]
#[test]
fn persist_restore_compressed() {
    let dummy = Dummy {
        name: "compressed".to_string(),
        values: vec![7; 512],
    };
    let bytes = to_bytes(&dummy, true).unwrap();
    let restored: Dummy = from_bytes(&bytes).unwrap();
    assert_eq!(restored, dummy);
}

#[test]
fn restore_rejects_other_kind() {
    let bytes = to_bytes(&Other { x: 1 }, false).unwrap();
    match from_bytes::<Dummy>(&bytes) {
        Err(Error::UnexpectedPayload { expected, found }) => {
            assert_eq!(expected, "dummy");
            assert_eq!(found, "other");
        }
        other => panic!("unexpected result: {:?}", other),
    }
}

#[test]
fn restore_rejects_newer_format() {
    let envelope = Envelope {
        header: Header {
            kind: Dummy::KIND.to_string(),
            version: "1.0.0".to_string(),
            created: Utc::now(),
            compressed: false,
        },
        payload: Vec::new(),
    };
    let bytes = bincode::serialize(&envelope).unwrap();
    match from_bytes::<Dummy>(&bytes) {
        Err(Error::UnsupportedFormatVersion { found, .. }) => assert_eq!(found, "1.0.0"),
        other => panic!("unexpected result: {:?}", other),
    }
}

#[test]
fn restore_missing_file() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("missing.bin");
    match restore::<Dummy>(&path) {
        Err(Error::FileNotFound(p)) => assert_eq!(p, path),
        other => panic!("unexpected result: {:?}", other),
    }
}

#[test]
fn restore_garbage() {
    assert!(matches!(
        from_bytes::<Dummy>(&[1, 2, 3]),
        Err(Error::FailedReadingEnvelope(_))
    ));
}

//! JSON persistence for stage documents.
//!
//! Every stage document is an envelope `{"metadata": {...}, "<key>": [...]}`.
//! Writes are atomic (temp file + rename) and report a SHA-256 checksum.

use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::{debug, instrument};

use supportbridge_shared::{Result, SupportBridgeError};

/// A written stage output.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct OutputFile {
    pub path: PathBuf,
    /// Number of records in the envelope.
    pub count: usize,
    pub size_bytes: usize,
    pub sha256: String,
}

// ---------------------------------------------------------------------------
// Reading
// ---------------------------------------------------------------------------

/// Read the `key` list of a stage document.
///
/// A bare top-level array is accepted as the list itself. A missing file is
/// [`SupportBridgeError::MissingInput`]; anything that is not valid JSON of
/// the expected shape is a parse error.
#[instrument(skip_all, fields(path = %path.display(), key = %key))]
pub fn read_collection<T: DeserializeOwned>(path: &Path, key: &str) -> Result<Vec<T>> {
    if !path.exists() {
        return Err(SupportBridgeError::MissingInput {
            path: path.to_path_buf(),
        });
    }

    let content = std::fs::read_to_string(path).map_err(|e| SupportBridgeError::io(path, e))?;
    let document: Value = serde_json::from_str(&content).map_err(|e| {
        SupportBridgeError::parse(format!("{} is not valid JSON: {e}", path.display()))
    })?;

    let items = match document {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove(key) {
            Some(Value::Array(items)) => items,
            Some(Value::Null) | None => Vec::new(),
            Some(_) => {
                return Err(SupportBridgeError::parse(format!(
                    "{}: '{key}' is not a list",
                    path.display()
                )));
            }
        },
        _ => {
            return Err(SupportBridgeError::parse(format!(
                "{}: expected an object with a '{key}' list",
                path.display()
            )));
        }
    };

    let records = serde_json::from_value::<Vec<T>>(Value::Array(items)).map_err(|e| {
        SupportBridgeError::parse(format!("{}: malformed '{key}' record: {e}", path.display()))
    })?;

    debug!(count = records.len(), "read collection");
    Ok(records)
}

// ---------------------------------------------------------------------------
// Writing
// ---------------------------------------------------------------------------

/// Envelope serialized with `metadata` first, then the record list.
struct Envelope<'a, T> {
    metadata: &'a Value,
    key: &'a str,
    items: &'a [T],
}

impl<T: Serialize> Serialize for Envelope<'_, T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(2))?;
        map.serialize_entry("metadata", self.metadata)?;
        map.serialize_entry(self.key, self.items)?;
        map.end()
    }
}

/// Write `{metadata, <key>: items}` atomically to `path`.
#[instrument(skip_all, fields(path = %path.display(), key = %key, count = items.len()))]
pub fn write_collection<T: Serialize>(
    path: &Path,
    key: &str,
    metadata: &Value,
    items: &[T],
) -> Result<OutputFile> {
    let envelope = Envelope {
        metadata,
        key,
        items,
    };
    let json = serde_json::to_string_pretty(&envelope).map_err(|e| {
        SupportBridgeError::validation(format!("JSON serialization failed: {e}"))
    })?;

    write_atomic(path, &json)?;

    let mut hasher = Sha256::new();
    hasher.update(json.as_bytes());
    let sha256 = format!("{:x}", hasher.finalize());

    debug!(size = json.len(), "wrote collection");

    Ok(OutputFile {
        path: path.to_path_buf(),
        count: items.len(),
        size_bytes: json.len(),
        sha256,
    })
}

/// Write any serializable document atomically as pretty JSON.
pub fn write_json<T: Serialize>(path: &Path, data: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(data).map_err(|e| {
        SupportBridgeError::validation(format!("JSON serialization failed: {e}"))
    })?;
    write_atomic(path, &json)
}

/// Write to a sibling temp file, then rename over the target.
fn write_atomic(path: &Path, content: &str) -> Result<()> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(parent).map_err(|e| SupportBridgeError::io(parent, e))?;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output.json".to_string());
    let temp = parent.join(format!(".{file_name}.tmp"));

    std::fs::write(&temp, content).map_err(|e| SupportBridgeError::io(&temp, e))?;
    std::fs::rename(&temp, path).map_err(|e| SupportBridgeError::io(path, e))?;
    Ok(())
}

use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use crate::error::{ClientError, Result};

/// On-disk store of invocation payloads, one JSON document per file.
#[derive(Debug, Clone)]
pub struct RequestStore {
    dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq, PartialOrd, Ord)]
pub struct StoredRequest {
    pub name: String,
}

impl RequestStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// List the store's `*.json` files. Creates the directory on first
    /// use so a fresh checkout starts with an empty list.
    pub fn list(&self) -> Result<Vec<StoredRequest>> {
        if !self.dir.exists() {
            std::fs::create_dir_all(&self.dir)
                .map_err(|e| ClientError::internal(format!("cannot create request dir: {e}")))?;
        }
        let entries = std::fs::read_dir(&self.dir)
            .map_err(|e| ClientError::internal(format!("cannot read request dir: {e}")))?;
        let mut files: Vec<StoredRequest> = entries
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| entry.file_name().into_string().ok())
            .filter(|name| name.ends_with(".json"))
            .map(|name| StoredRequest { name })
            .collect();
        files.sort();
        Ok(files)
    }

    /// Read one stored payload by bare file name.
    pub fn read(&self, name: &str) -> Result<Value> {
        validate_name(name)?;
        let path = self.dir.join(name);
        if !path.exists() {
            return Err(ClientError::not_found(format!(
                "Request file not found: {name}"
            )));
        }
        let raw = std::fs::read_to_string(&path)
            .map_err(|e| ClientError::internal(format!("cannot read {name}: {e}")))?;
        serde_json::from_str(&raw).map_err(|e| {
            warn!(file = %name, error = %e, "stored request is not valid JSON");
            ClientError::bad_request(e.to_string())
        })
    }
}

/// Names must be bare file names; anything that could traverse out of
/// the store directory is rejected.
fn validate_name(name: &str) -> Result<()> {
    if name.is_empty()
        || name.contains('/')
        || name.contains('\\')
        || name.contains("..")
        || name.starts_with('.')
    {
        return Err(ClientError::bad_request(format!(
            "Invalid request file name: {name}"
        )));
    }
    Ok(())
}

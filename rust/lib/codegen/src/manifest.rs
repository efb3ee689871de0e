//! Content-hash manifest for tracked regeneration.
//!
//! Maps every file the engine wrote to the SHA-256 of what it wrote. A file
//! whose current hash still matches was not edited by hand and may be
//! regenerated.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use sha2::{Digest, Sha256};
use tracing::debug;

use crate::error::GenError;

pub fn content_hash(content: &[u8]) -> String {
    hex::encode(Sha256::digest(content))
}

pub struct HashManifest {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, String>>,
}

impl HashManifest {
    /// Load from `path`; a missing file is an empty manifest.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, GenError> {
        let path = path.into();
        let entries = match std::fs::read(&path) {
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| GenError::Parse {
                path: path.clone(),
                message: e.to_string(),
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(GenError::io(&path, e)),
        };
        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    fn key(file: &Path) -> String {
        file.to_string_lossy().into_owned()
    }

    /// The file exists and its content is exactly what was last recorded.
    pub fn is_pristine(&self, file: &Path) -> Result<bool, GenError> {
        let current = match std::fs::read(file) {
            Ok(bytes) => content_hash(&bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(GenError::io(file, e)),
        };
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        Ok(entries.get(&Self::key(file)) == Some(&current))
    }

    /// Record the hash of `content` for `file` and persist the manifest.
    pub fn record(&self, file: &Path, content: &[u8]) -> Result<(), GenError> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.insert(Self::key(file), content_hash(content));

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| GenError::io(parent, e))?;
            }
        }
        let json = serde_json::to_vec_pretty(&*entries)
            .map_err(|e| GenError::io(&self.path, e.into()))?;
        std::fs::write(&self.path, json).map_err(|e| GenError::io(&self.path, e))?;
        debug!(file = %file.display(), "recorded content hash");
        Ok(())
    }
}

// src/store/file.rs
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::debug;

use super::RecordStore;
use crate::error::{AnalysisError, Result};

/// One JSON file per record under `root/<owner>/<key>.json`.
///
/// Owner and key are escaped so neither can leave its directory. Writes go to
/// a temporary file first and are renamed into place.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new<P: Into<PathBuf>>(root: P) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|e| io_error(&root, e))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path(&self, owner: &str, key: &str) -> PathBuf {
        self.root
            .join(escape(owner))
            .join(format!("{}.json", escape(key)))
    }
}

/// Keep `[A-Za-z0-9_-]`, percent-escape every other byte.
fn escape(component: &str) -> String {
    let mut out = String::with_capacity(component.len());
    for byte in component.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'_' || byte == b'-' {
            out.push(byte as char);
        } else {
            out.push_str(&format!("%{:02X}", byte));
        }
    }
    if out.is_empty() {
        out.push_str("%00");
    }
    out
}

fn io_error(path: &Path, e: std::io::Error) -> AnalysisError {
    AnalysisError::Persistence(format!("{}: {}", path.display(), e))
}

impl RecordStore for FileStore {
    fn put(&self, owner: &str, key: &str, payload: &str) -> Result<()> {
        let path = self.path(owner, key);
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).map_err(|e| io_error(dir, e))?;
        }
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, payload).map_err(|e| io_error(&tmp, e))?;
        fs::rename(&tmp, &path).map_err(|e| io_error(&path, e))?;
        debug!(path = %path.display(), bytes = payload.len(), "record written");
        Ok(())
    }

    fn get(&self, owner: &str, key: &str) -> Result<Option<String>> {
        let path = self.path(owner, key);
        match fs::read_to_string(&path) {
            Ok(payload) => Ok(Some(payload)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(io_error(&path, e)),
        }
    }

    fn delete(&self, owner: &str, key: &str) -> Result<bool> {
        let path = self.path(owner, key);
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(io_error(&path, e)),
        }
    }
}

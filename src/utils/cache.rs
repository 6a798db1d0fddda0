// src/utils/cache.rs
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use gdal::Dataset;
use parking_lot::Mutex;
use tracing::debug;

use crate::error::{AnalysisError, Result};

/// Thread-safe cache of open GDAL datasets, keyed by path.
///
/// A dataset is not `Sync`, so each one sits behind its own lock; the map lock
/// is only held while looking up or inserting.
#[derive(Default)]
pub struct RasterCache {
    datasets: Mutex<HashMap<PathBuf, Arc<Mutex<Dataset>>>>,
}

impl RasterCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_dataset<P: AsRef<Path>>(&self, path: P) -> Result<Arc<Mutex<Dataset>>> {
        let path_buf = path.as_ref().to_path_buf();
        let mut cache = self.datasets.lock();

        if let Some(dataset) = cache.get(&path_buf) {
            return Ok(Arc::clone(dataset));
        }

        // Not in cache, open and add it
        let dataset = Dataset::open(&path_buf).map_err(|e| {
            AnalysisError::SourceUnavailable(format!("opening {}: {}", path_buf.display(), e))
        })?;
        debug!(path = %path_buf.display(), "opened dataset");
        let dataset = Arc::new(Mutex::new(dataset));
        cache.insert(path_buf, Arc::clone(&dataset));

        Ok(dataset)
    }

    pub fn clear(&self) {
        self.datasets.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.datasets.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.datasets.lock().is_empty()
    }
}

// In-memory cache of normalized datasets keyed by source path and mtime
use crate::model::{Dataset, LoadError};
use crate::pipeline::load_dataset;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;
use tracing::{debug, info};

struct CacheEntry {
    modified: Option<SystemTime>,
    dataset: Arc<Dataset>,
    loaded_at: DateTime<Utc>,
}

/// Memoizes `load_dataset` per source. A source whose modification time
/// changed is a different key and is loaded again; `reload` forces it.
pub struct DatasetCache {
    entries: HashMap<PathBuf, CacheEntry>,
    loader: fn(&Path) -> Result<Dataset, LoadError>,
}

impl DatasetCache {
    pub fn new() -> Self {
        Self::with_loader(load_dataset)
    }

    pub fn with_loader(loader: fn(&Path) -> Result<Dataset, LoadError>) -> Self {
        Self {
            entries: HashMap::new(),
            loader,
        }
    }

    fn modified(path: &Path) -> Option<SystemTime> {
        fs::metadata(path).and_then(|m| m.modified()).ok()
    }

    /// Returns the cached dataset for `path`, loading it on a miss.
    pub fn get_or_load(&mut self, path: &Path) -> Result<Arc<Dataset>, LoadError> {
        let modified = Self::modified(path);
        if let Some(entry) = self.entries.get(path) {
            if entry.modified == modified {
                debug!("Cache hit for {}", path.display());
                return Ok(Arc::clone(&entry.dataset));
            }
            debug!("Source {} changed since it was cached", path.display());
        }
        self.load(path, modified)
    }

    /// Drops any cached copy and loads `path` again.
    pub fn reload(&mut self, path: &Path) -> Result<Arc<Dataset>, LoadError> {
        self.invalidate(path);
        self.load(path, Self::modified(path))
    }

    /// Forgets `path`; returns whether it was cached.
    pub fn invalidate(&mut self, path: &Path) -> bool {
        self.entries.remove(path).is_some()
    }

    pub fn loaded_at(&self, path: &Path) -> Option<DateTime<Utc>> {
        self.entries.get(path).map(|e| e.loaded_at)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn load(&mut self, path: &Path, modified: Option<SystemTime>) -> Result<Arc<Dataset>, LoadError> {
        let dataset = Arc::new((self.loader)(path)?);
        info!("Data loaded successfully from: {}", path.display());
        self.entries.insert(
            path.to_path_buf(),
            CacheEntry {
                modified,
                dataset: Arc::clone(&dataset),
                loaded_at: Utc::now(),
            },
        );
        Ok(dataset)
    }
}

impl Default for DatasetCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_csv(file: &tempfile::NamedTempFile, body: &str) {
        fs::write(file.path(), body).unwrap();
    }

    #[test]
    fn second_lookup_is_served_from_cache() {
        let file = tempfile::NamedTempFile::new().unwrap();
        write_csv(&file, "make,model\nKia,Rio\n");
        let mut cache = DatasetCache::new();

        let first = cache.get_or_load(file.path()).unwrap();
        let second = cache.get_or_load(file.path()).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);
        assert!(cache.loaded_at(file.path()).is_some());
    }

    #[test]
    fn reload_reads_the_source_again() {
        let file = tempfile::NamedTempFile::new().unwrap();
        write_csv(&file, "make,model\nKia,Rio\n");
        let mut cache = DatasetCache::new();
        let first = cache.get_or_load(file.path()).unwrap();
        assert_eq!(first.len(), 1);

        write_csv(&file, "make,model\nKia,Rio\nKia,Soul\n");
        let reloaded = cache.reload(file.path()).unwrap();
        assert_eq!(reloaded.len(), 2);
        assert!(!Arc::ptr_eq(&first, &reloaded));
    }

    #[test]
    fn invalidate_forgets_entry() {
        let file = tempfile::NamedTempFile::new().unwrap();
        write_csv(&file, "make\nKia\n");
        let mut cache = DatasetCache::new();
        cache.get_or_load(file.path()).unwrap();
        assert!(cache.invalidate(file.path()));
        assert!(!cache.invalidate(file.path()));
        assert!(cache.is_empty());
    }

    #[test]
    fn load_errors_are_not_cached() {
        let mut cache = DatasetCache::new();
        let missing = Path::new("/no/such/cars.csv");
        assert!(cache.get_or_load(missing).is_err());
        assert!(cache.is_empty());
    }

    #[test]
    fn custom_loader_runs_once_per_key() {
        use crate::model::{ColumnKind, Schema};
        use std::sync::atomic::{AtomicUsize, Ordering};

        static CALLS: AtomicUsize = AtomicUsize::new(0);
        fn counting_loader(_: &Path) -> Result<Dataset, LoadError> {
            CALLS.fetch_add(1, Ordering::SeqCst);
            let schema = Arc::new(Schema::new(vec!["make".into()], vec![ColumnKind::Categorical]));
            Ok(Dataset::new(schema, Vec::new()))
        }

        let mut cache = DatasetCache::with_loader(counting_loader);
        let path = Path::new("virtual.csv");
        cache.get_or_load(path).unwrap();
        cache.get_or_load(path).unwrap();
        assert_eq!(CALLS.load(Ordering::SeqCst), 1);
        cache.reload(path).unwrap();
        assert_eq!(CALLS.load(Ordering::SeqCst), 2);
    }
}

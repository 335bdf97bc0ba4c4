use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use super::loader::{self, DataSource, DatasetSettings, LoadError};
use super::model::SalesTable;

/// Identifies one cached load of the bundled dataset.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LoadKey {
    pub path: PathBuf,
    pub sheet_name: String,
}

impl LoadKey {
    pub fn from_settings(settings: &DatasetSettings) -> Self {
        LoadKey {
            path: settings.default_path.clone(),
            sheet_name: settings.sheet_name.clone(),
        }
    }
}

#[derive(Debug)]
struct CacheEntry {
    table: Arc<SalesTable>,
    /// File modification time observed when the entry was loaded.
    modified: Option<SystemTime>,
}

/// Keeps parsed default datasets in memory so repeated loads share one table.
///
/// Entries never expire on their own. An entry is reloaded when the file's
/// modification time no longer matches, or dropped with [`invalidate`] /
/// [`clear`]. Uploaded files bypass the cache.
///
/// [`invalidate`]: DatasetCache::invalidate
/// [`clear`]: DatasetCache::clear
#[derive(Debug, Default)]
pub struct DatasetCache {
    entries: HashMap<LoadKey, CacheEntry>,
}

impl DatasetCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load `source`, reusing a cached table for the default dataset.
    pub fn load(
        &mut self,
        source: &DataSource,
        settings: &DatasetSettings,
    ) -> Result<Arc<SalesTable>, LoadError> {
        match source {
            DataSource::Default => self.load_default(settings),
            DataSource::Upload { .. } => loader::load(source, settings).map(Arc::new),
        }
    }

    fn load_default(&mut self, settings: &DatasetSettings) -> Result<Arc<SalesTable>, LoadError> {
        let key = LoadKey::from_settings(settings);
        let modified = modified_time(&key.path);

        if let Some(entry) = self.entries.get(&key) {
            if entry.modified == modified {
                log::debug!("dataset cache hit for {}", key.path.display());
                return Ok(Arc::clone(&entry.table));
            }
            log::debug!("{} changed on disk, reloading", key.path.display());
        }

        let table = Arc::new(loader::load_path(&key.path, &key.sheet_name)?);
        self.entries.insert(
            key,
            CacheEntry {
                table: Arc::clone(&table),
                modified,
            },
        );
        Ok(table)
    }

    /// Drop one entry. Returns whether it was present.
    pub fn invalidate(&mut self, key: &LoadKey) -> bool {
        self.entries.remove(key).is_some()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn contains(&self, key: &LoadKey) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn modified_time(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|m| m.modified()).ok()
}

use std::collections::{HashMap, HashSet};

use attachsync_core::{StorageError, StorageRoot};
use tracing::debug;

use super::ports::DestinationStore;

/// Upper bound on entries requested per folder listing.
pub const FOLDER_LISTING_LIMIT: u32 = 1000;

/// Names already present in destination folders, listed once per folder and
/// kept for the rest of the run.
#[derive(Debug)]
pub struct ExistenceCache {
    root: StorageRoot,
    max_entries: u32,
    folders: HashMap<String, HashSet<String>>,
    missing: HashSet<String>,
}

impl ExistenceCache {
    pub fn new(root: StorageRoot) -> Self {
        Self::with_limit(root, FOLDER_LISTING_LIMIT)
    }

    pub fn with_limit(root: StorageRoot, max_entries: u32) -> Self {
        Self {
            root,
            max_entries,
            folders: HashMap::new(),
            missing: HashSet::new(),
        }
    }

    pub async fn exists<D: DestinationStore>(
        &mut self,
        store: &D,
        folder: &str,
        name: &str,
    ) -> Result<bool, StorageError> {
        Ok(self.list_folder(store, folder).await?.contains(name))
    }

    /// True when the listing of `folder` found no such folder and nothing
    /// has been stored there since.
    pub fn is_missing(&self, folder: &str) -> bool {
        self.missing.contains(folder)
    }

    /// Marks `name` as present in `folder` after it has been stored.
    ///
    /// A folder that was never listed is left untouched so its first lookup
    /// still reflects the remote listing.
    pub fn record(&mut self, folder: &str, name: &str) {
        if let Some(names) = self.folders.get_mut(folder) {
            names.insert(name.to_string());
            self.missing.remove(folder);
        }
    }

    #[cfg(test)]
    pub(crate) fn cached_folders(&self) -> usize {
        self.folders.len()
    }

    async fn list_folder<D: DestinationStore>(
        &mut self,
        store: &D,
        folder: &str,
    ) -> Result<&HashSet<String>, StorageError> {
        if !self.folders.contains_key(folder) {
            let names = match store.list_folder(self.root, folder, self.max_entries).await? {
                Some(names) => names,
                None => {
                    self.missing.insert(folder.to_string());
                    Vec::new()
                }
            };
            debug!(folder, entries = names.len(), "listed destination folder");
            self.folders
                .insert(folder.to_string(), names.into_iter().collect());
        }
        Ok(&self.folders[folder])
    }
}

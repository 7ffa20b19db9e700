//! Lookup caches
//!
//! [`AccountIndex`] lives for the whole process: it is filled once and then
//! read only. [`ContainerMachineCache`] lives for one run and fills per key.

use super::{DirectoryLookup, Machine};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, OnceLock};

/// Lower-cased names of every account in the directory
#[derive(Debug, Default)]
pub struct AccountIndex {
    names: OnceLock<HashSet<String>>,
}

impl AccountIndex {
    pub fn new() -> Self {
        Self::default()
    }

    fn names(&self, directory: &dyn DirectoryLookup) -> &HashSet<String> {
        self.names.get_or_init(|| {
            directory
                .all_known_account_names()
                .into_iter()
                .map(|name| name.to_lowercase())
                .collect()
        })
    }

    /// Concurrent first calls block until the single load has finished
    pub fn contains(&self, directory: &dyn DirectoryLookup, name: &str) -> bool {
        self.names(directory).contains(&name.to_lowercase())
    }

    pub fn is_loaded(&self) -> bool {
        self.names.get().is_some()
    }

    pub fn len(&self, directory: &dyn DirectoryLookup) -> usize {
        self.names(directory).len()
    }
}

type Slot = Arc<OnceLock<Vec<Machine>>>;

/// Container to machines, memoized per `(domain, container)`
#[derive(Debug, Default)]
pub struct ContainerMachineCache {
    entries: Mutex<HashMap<(String, String), Slot>>,
}

impl ContainerMachineCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, container_id: &str, domain_id: &str) -> Slot {
        let mut entries = self.entries.lock().unwrap_or_else(|p| p.into_inner());
        entries
            .entry((domain_id.to_string(), container_id.to_lowercase()))
            .or_default()
            .clone()
    }

    /// Misses on the same key collapse into one fetch; other keys never wait on it
    pub fn machines(
        &self,
        directory: &dyn DirectoryLookup,
        container_id: &str,
        domain_id: &str,
    ) -> Vec<Machine> {
        self.slot(container_id, domain_id)
            .get_or_init(|| directory.machines_in_container(container_id, domain_id))
            .clone()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|p| p.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.entries.lock().unwrap_or_else(|p| p.into_inner()).clear();
    }
}

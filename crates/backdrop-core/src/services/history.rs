//! 最近使用记录

use crate::models::HistoryEntry;
use crate::vault::Vault;

/// Maximum number of remembered uploads.
pub const HISTORY_LIMIT: usize = 5;

/// Most-recent-first list of uploads, unique by path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HistoryList {
    entries: Vec<HistoryEntry>,
}

impl HistoryList {
    pub fn new(entries: Vec<HistoryEntry>) -> Self {
        let mut list = Self::default();
        // oldest first so the original order survives dedupe
        for entry in entries.into_iter().rev() {
            list.prepend(entry);
        }
        list
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub fn get(&self, index: usize) -> Option<&HistoryEntry> {
        self.entries.get(index)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Put `entry` at the front. An existing entry with the same path is
    /// moved rather than duplicated.
    pub fn prepend(&mut self, entry: HistoryEntry) {
        self.entries.retain(|e| e.path != entry.path);
        self.entries.insert(0, entry);
    }

    /// Keep the `limit` newest entries and return the evicted ones.
    pub fn trim(&mut self, limit: usize) -> Vec<HistoryEntry> {
        if self.entries.len() <= limit {
            return Vec::new();
        }
        self.entries.split_off(limit)
    }

    /// Drop entries whose file no longer exists. Returns how many went.
    pub fn prune_missing(&mut self, vault: &dyn Vault) -> usize {
        let before = self.entries.len();
        self.entries.retain(|e| vault.exists(&e.path));
        before - self.entries.len()
    }
}

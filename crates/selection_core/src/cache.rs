use std::collections::HashMap;

use shared::domain::OptionId;

use crate::OptionItem;

/// Memoized option lists keyed by `(level, parent selection)`. A `None`
/// parent key is the root level's single key. Entries survive selection
/// changes so that switching back to an earlier parent reuses the cached
/// child list without another fetch.
#[derive(Debug, Default)]
pub(crate) struct LevelCache {
    entries: HashMap<(usize, Option<OptionId>), CacheEntry>,
}

#[derive(Debug)]
pub(crate) struct CacheEntry {
    pub options: Vec<OptionItem>,
    pub token: u64,
    stale: bool,
}

impl LevelCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, level: usize, parent: Option<OptionId>) -> Option<&CacheEntry> {
        self.entries.get(&(level, parent))
    }

    /// Like `get`, but treats invalidated entries as misses.
    pub fn get_fresh(&self, level: usize, parent: Option<OptionId>) -> Option<&CacheEntry> {
        self.get(level, parent).filter(|entry| !entry.stale)
    }

    pub fn put(&mut self, level: usize, parent: Option<OptionId>, options: Vec<OptionItem>, token: u64) {
        self.entries.insert(
            (level, parent),
            CacheEntry {
                options,
                token,
                stale: false,
            },
        );
    }

    /// Marks an entry stale without deleting it. The next load for this
    /// key goes back to the option source.
    pub fn invalidate(&mut self, level: usize, parent: Option<OptionId>) {
        if let Some(entry) = self.entries.get_mut(&(level, parent)) {
            entry.stale = true;
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

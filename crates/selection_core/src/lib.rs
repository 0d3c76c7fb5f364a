use std::sync::Arc;

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use shared::domain::OptionId;
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, warn};

pub mod aggregate;
mod cache;
pub mod error;

use cache::LevelCache;
pub use error::SelectionError;

/// One selectable item at a level. `fields` carries whatever extra payload
/// the backend returned; the controller never looks inside it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionItem {
    pub id: OptionId,
    pub label: String,
    #[serde(default)]
    pub fields: serde_json::Value,
}

impl OptionItem {
    pub fn new(id: i64, label: impl Into<String>) -> Self {
        Self {
            id: OptionId(id),
            label: label.into(),
            fields: serde_json::Value::Null,
        }
    }

    pub fn with_fields(mut self, fields: serde_json::Value) -> Self {
        self.fields = fields;
        self
    }
}

/// One tier in a parent-dependent selection hierarchy. `parent` is the
/// index of the level this one depends on and must refer to an earlier
/// position in the chain.
#[derive(Debug, Clone)]
pub struct LevelDef {
    pub name: String,
    pub parent: Option<usize>,
}

impl LevelDef {
    pub fn root(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent: None,
        }
    }

    pub fn child_of(name: impl Into<String>, parent: usize) -> Self {
        Self {
            name: name.into(),
            parent: Some(parent),
        }
    }
}

/// Supplies the option list for a level given its parent selection
/// (`None` for a root level). An empty list is a valid answer and is
/// distinct from failure.
#[async_trait]
pub trait OptionSource: Send + Sync {
    async fn fetch_options(
        &self,
        level: usize,
        parent: Option<OptionId>,
    ) -> Result<Vec<OptionItem>>;
}

#[derive(Debug, Clone)]
pub enum ChainEvent {
    SelectionChanged {
        level: usize,
        selection: Option<OptionId>,
    },
    LevelLoading {
        level: usize,
    },
    LevelLoaded {
        level: usize,
        option_count: usize,
    },
    LevelLoadFailed {
        level: usize,
        message: String,
    },
}

#[derive(Debug, Default)]
struct LevelState {
    selection: Option<OptionId>,
    token: u64,
    loading: bool,
    last_error: Option<String>,
}

struct ChainState {
    levels: Vec<LevelState>,
    cache: LevelCache,
}

/// Controller for a chain of dependent selection levels. Holds the current
/// selection per level, the per-parent-key option cache, and the fetch
/// generation counters that guard against out-of-order responses.
///
/// One instance per on-screen chain; independent chains on the same screen
/// get independent controllers.
pub struct SelectionChain {
    source: Arc<dyn OptionSource>,
    levels: Vec<LevelDef>,
    children: Vec<Vec<usize>>,
    inner: Mutex<ChainState>,
    events: broadcast::Sender<ChainEvent>,
}

impl SelectionChain {
    pub fn new(levels: Vec<LevelDef>, source: Arc<dyn OptionSource>) -> Result<Arc<Self>> {
        if levels.is_empty() {
            bail!("selection chain requires at least one level");
        }
        let mut children = vec![Vec::new(); levels.len()];
        for (index, level) in levels.iter().enumerate() {
            if let Some(parent) = level.parent {
                if parent >= index {
                    bail!(
                        "level {index} ({}) must depend on an earlier level, got parent {parent}",
                        level.name
                    );
                }
                children[parent].push(index);
            }
        }

        let (events, _) = broadcast::channel(64);
        let level_count = levels.len();
        Ok(Arc::new(Self {
            source,
            levels,
            children,
            inner: Mutex::new(ChainState {
                levels: (0..level_count).map(|_| LevelState::default()).collect(),
                cache: LevelCache::new(),
            }),
            events,
        }))
    }

    pub fn level_count(&self) -> usize {
        self.levels.len()
    }

    pub fn level_name(&self, level: usize) -> &str {
        self.assert_level(level);
        &self.levels[level].name
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<ChainEvent> {
        self.events.subscribe()
    }

    /// Loads every root level. Call once after construction; `reset` calls
    /// it again after clearing.
    pub async fn init(&self) -> Result<(), SelectionError> {
        let mut first_error = None;
        for (index, level) in self.levels.iter().enumerate() {
            if level.parent.is_none() {
                if let Err(err) = self.load_level(index).await {
                    first_error.get_or_insert(err);
                }
            }
        }
        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Sets the selection at `level`. A `Some` id must be present in the
    /// level's currently loaded options; `None` (unselected) is always
    /// legal. Every descendant selection is cleared, and each immediate
    /// child that became eligible is loaded before this returns; a child
    /// load failure surfaces here while the new selection stays applied.
    pub async fn select(
        &self,
        level: usize,
        option: Option<OptionId>,
    ) -> Result<(), SelectionError> {
        self.assert_level(level);

        let children_to_load = {
            let mut state = self.inner.lock().await;
            if state.levels[level].selection == option {
                return Ok(());
            }

            if let Some(id) = option {
                let loaded = self
                    .eligible_parent_key(&state, level)
                    .and_then(|key| state.cache.get_fresh(level, key));
                let known = loaded
                    .map(|entry| entry.options.iter().any(|item| item.id == id))
                    .unwrap_or(false);
                if !known {
                    return Err(SelectionError::InvalidSelection {
                        level,
                        option: id.0,
                    });
                }
            }

            state.levels[level].selection = option;
            let _ = self.events.send(ChainEvent::SelectionChanged {
                level,
                selection: option,
            });

            for index in self.descendants(level) {
                let descendant = &mut state.levels[index];
                // Bumping the token turns any in-flight fetch for the old
                // parent into a stale response.
                descendant.token += 1;
                descendant.loading = false;
                descendant.last_error = None;
                if descendant.selection.take().is_some() {
                    let _ = self.events.send(ChainEvent::SelectionChanged {
                        level: index,
                        selection: None,
                    });
                }
            }

            let mut to_load = Vec::new();
            if option.is_some() {
                for &child in &self.children[level] {
                    if state.cache.get_fresh(child, option).is_none() {
                        to_load.push(child);
                    }
                }
            }
            to_load
        };

        let mut first_error = None;
        for child in children_to_load {
            if let Err(err) = self.load_level(child).await {
                first_error.get_or_insert(err);
            }
        }
        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    pub async fn selection(&self, level: usize) -> Option<OptionId> {
        self.assert_level(level);
        self.inner.lock().await.levels[level].selection
    }

    /// Cached options for the level under its parent's current selection.
    /// Empty while the parent is unselected, the entry is missing, or a
    /// fetch is still pending.
    pub async fn eligible_options(&self, level: usize) -> Vec<OptionItem> {
        self.assert_level(level);
        let state = self.inner.lock().await;
        let Some(key) = self.eligible_parent_key(&state, level) else {
            return Vec::new();
        };
        state
            .cache
            .get_fresh(level, key)
            .map(|entry| entry.options.clone())
            .unwrap_or_default()
    }

    /// Read-only cache view for the rendering layer, keyed explicitly.
    pub async fn cached_options(
        &self,
        level: usize,
        parent: Option<OptionId>,
    ) -> Option<Vec<OptionItem>> {
        self.assert_level(level);
        let state = self.inner.lock().await;
        state
            .cache
            .get_fresh(level, parent)
            .map(|entry| entry.options.clone())
    }

    pub async fn is_loading(&self, level: usize) -> bool {
        self.assert_level(level);
        self.inner.lock().await.levels[level].loading
    }

    pub async fn last_error(&self, level: usize) -> Option<String> {
        self.assert_level(level);
        self.inner.lock().await.levels[level].last_error.clone()
    }

    /// Clears all selections and all cached options, then reloads the root
    /// levels.
    pub async fn reset(&self) -> Result<(), SelectionError> {
        {
            let mut state = self.inner.lock().await;
            state.cache.clear();
            for index in 0..state.levels.len() {
                let level = &mut state.levels[index];
                level.token += 1;
                level.loading = false;
                level.last_error = None;
                if level.selection.take().is_some() {
                    let _ = self.events.send(ChainEvent::SelectionChanged {
                        level: index,
                        selection: None,
                    });
                }
            }
        }
        self.init().await
    }

    /// Marks the cache entry for `(level, parent)` stale. Called by the
    /// view layer after a create/delete on the entity backing that level.
    /// If the key is the one currently in view, the options are refetched
    /// immediately.
    ///
    /// The level's current selection is kept even when the refreshed list
    /// no longer contains it; only an explicit `select` or a parent
    /// change clears it.
    pub async fn invalidate(
        &self,
        level: usize,
        parent: Option<OptionId>,
    ) -> Result<(), SelectionError> {
        self.assert_level(level);
        let refetch = {
            let mut state = self.inner.lock().await;
            state.cache.invalidate(level, parent);
            self.eligible_parent_key(&state, level) == Some(parent)
        };
        if refetch {
            self.load_level(level).await
        } else {
            Ok(())
        }
    }

    /// Re-issues the fetch for a level that previously failed to load.
    pub async fn retry(&self, level: usize) -> Result<(), SelectionError> {
        self.assert_level(level);
        self.load_level(level).await
    }

    /// Fetches the option list for `level` under its current parent
    /// selection. The state lock is released across the await, so newer
    /// `select` calls can invalidate this fetch's token while it is in
    /// flight; a completed fetch whose token no longer matches is dropped
    /// without touching cache or selection.
    async fn load_level(&self, level: usize) -> Result<(), SelectionError> {
        let (token, parent_key) = {
            let mut state = self.inner.lock().await;
            let Some(parent_key) = self.eligible_parent_key(&state, level) else {
                // Parent was cleared in the meantime; nothing to load.
                return Ok(());
            };
            let entry = &mut state.levels[level];
            entry.token += 1;
            entry.loading = true;
            entry.last_error = None;
            (entry.token, parent_key)
        };
        let _ = self.events.send(ChainEvent::LevelLoading { level });
        debug!(
            "chain: fetch level={} ({}) parent={:?} token={}",
            level,
            self.level_name(level),
            parent_key,
            token
        );

        let fetched = self.source.fetch_options(level, parent_key).await;

        let mut state = self.inner.lock().await;
        if state.levels[level].token != token {
            debug!(
                "chain: discarding stale response level={} token={} current={}",
                level, token, state.levels[level].token
            );
            return Ok(());
        }

        match fetched {
            Ok(options) => {
                let option_count = options.len();
                state.cache.put(level, parent_key, options, token);
                state.levels[level].loading = false;
                let _ = self.events.send(ChainEvent::LevelLoaded {
                    level,
                    option_count,
                });
                Ok(())
            }
            Err(source) => {
                state.levels[level].loading = false;
                state.levels[level].last_error = Some(source.to_string());
                warn!("chain: level {level} load failed: {source:#}");
                let _ = self.events.send(ChainEvent::LevelLoadFailed {
                    level,
                    message: source.to_string(),
                });
                Err(SelectionError::LevelLoadFailed { level, source })
            }
        }
    }

    fn assert_level(&self, level: usize) {
        assert!(
            level < self.levels.len(),
            "level index {level} out of range for chain of {} levels",
            self.levels.len()
        );
    }

    /// The cache key a level is currently served under: `Some(None)` for a
    /// root, `Some(Some(id))` when the parent is selected, `None` when the
    /// level is not eligible at all.
    fn eligible_parent_key(&self, state: &ChainState, level: usize) -> Option<Option<OptionId>> {
        match self.levels[level].parent {
            None => Some(None),
            Some(parent) => state.levels[parent].selection.map(Some),
        }
    }

    fn descendants(&self, level: usize) -> Vec<usize> {
        let mut out = Vec::new();
        let mut stack = self.children[level].clone();
        while let Some(next) = stack.pop() {
            stack.extend(self.children[next].iter().copied());
            out.push(next);
        }
        out.sort_unstable();
        out
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;

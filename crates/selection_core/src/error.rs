use thiserror::Error;

#[derive(Debug, Error)]
pub enum SelectionError {
    /// The caller asked for an option id that is not in the level's
    /// currently loaded option set. State is left unchanged.
    #[error("option {option} is not among the loaded options for level {level}")]
    InvalidSelection { level: usize, option: i64 },

    /// The option source failed while loading a level. The level stays
    /// in the not-loaded state and can be retried.
    #[error("failed to load options for level {level}: {source}")]
    LevelLoadFailed {
        level: usize,
        #[source]
        source: anyhow::Error,
    },
}

impl SelectionError {
    pub fn level(&self) -> usize {
        match self {
            SelectionError::InvalidSelection { level, .. } => *level,
            SelectionError::LevelLoadFailed { level, .. } => *level,
        }
    }
}

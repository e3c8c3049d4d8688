//! Kit repository error types

use std::path::PathBuf;

use thiserror::Error;

use crate::db::DatabaseError;

#[derive(Debug, Error)]
pub enum KitError {
    /// an operation ran on a repository that was never bound to a database
    #[error("kit repository is not connected to a database")]
    NotConnected,

    /// failure reported by the document store, passed through as is
    #[error(transparent)]
    Database(#[from] DatabaseError),

    /// a record carries neither `kit.name` nor a top-level `name`
    #[error("kit record #{index} has no name")]
    MissingName { index: usize },

    /// a default kit file could not be turned into records
    #[error("invalid default kits in {path}: {reason}")]
    InvalidDefaults { path: PathBuf, reason: String },

    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl KitError {
    pub fn is_not_connected(&self) -> bool {
        matches!(self, KitError::NotConnected)
    }
}

pub type KitResult<T> = Result<T, KitError>;

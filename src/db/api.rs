//! Database API - the connection handle callers pass around.

use std::path::{Path, PathBuf};

use tempfile::TempDir;
use thiserror::Error;
use tracing::debug;

use super::collection::Collection;
use crate::storage::{
    CollectionName, CommitInfo, GitRepository, GitSignature, InvalidNameError, RepositoryStats,
    StorageError,
};

/// Result type for database operations.
pub type DatabaseResult<T> = Result<T, DatabaseError>;

/// Database errors.
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("invalid collection name: {0}")]
    InvalidName(#[from] InvalidNameError),

    #[error("invalid document: {0}")]
    InvalidDocument(String),

    #[error("database not found: {0}")]
    NotFound(PathBuf),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Database configuration options.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Path to the database directory.
    pub path: PathBuf,
    /// Create if doesn't exist.
    pub create_if_missing: bool,
    /// Author of the commits this handle writes.
    pub signature: GitSignature,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(".kitdb"),
            create_if_missing: true,
            signature: GitSignature::kitdb(),
        }
    }
}

impl DatabaseConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    pub fn create_if_missing(mut self, value: bool) -> Self {
        self.create_if_missing = value;
        self
    }

    pub fn signature(mut self, signature: GitSignature) -> Self {
        self.signature = signature;
        self
    }
}

/// The main database handle.
pub struct Database {
    config: DatabaseConfig,
    repo: GitRepository,
    /// keeps a throwaway database alive for the lifetime of the handle
    _temp_dir: Option<TempDir>,
}

impl Database {
    /// Open or create a database at the given path.
    pub fn open(path: impl AsRef<Path>) -> DatabaseResult<Self> {
        Self::open_with_config(DatabaseConfig::new(path.as_ref()))
    }

    pub fn open_with_config(config: DatabaseConfig) -> DatabaseResult<Self> {
        let repo = if config.create_if_missing {
            GitRepository::open_or_init(&config.path)?
        } else if config.path.exists() {
            GitRepository::open(&config.path)?
        } else {
            return Err(DatabaseError::NotFound(config.path.clone()));
        };
        let repo = repo.with_signature(config.signature.clone())?;

        debug!(path = %config.path.display(), "database open");
        Ok(Self {
            config,
            repo,
            _temp_dir: None,
        })
    }

    /// Create a database in a temporary directory, removed on drop.
    pub fn temporary() -> DatabaseResult<Self> {
        let dir = TempDir::new()?;
        let mut db = Self::open(dir.path())?;
        db._temp_dir = Some(dir);
        Ok(db)
    }

    /// Handle to a named collection. The collection appears on first write.
    pub fn collection(&self, name: &str) -> DatabaseResult<Collection> {
        let name = CollectionName::new(name)?;
        Ok(Collection::new(name, self.repo.clone()))
    }

    /// Names of the collections holding at least one document.
    pub fn collections(&self) -> DatabaseResult<Vec<String>> {
        let head = self.repo.head()?;
        Ok(self
            .repo
            .list_collections(head)?
            .into_iter()
            .map(CollectionName::into_string)
            .collect())
    }

    /// Commit history of the database, newest first.
    pub fn history(&self, limit: Option<usize>) -> DatabaseResult<Vec<CommitInfo>> {
        let head = self.repo.head()?;
        Ok(self.repo.history(head, limit)?)
    }

    pub fn stats(&self) -> DatabaseResult<RepositoryStats> {
        let head = self.repo.head()?;
        Ok(self.repo.stats(head)?)
    }

    pub fn path(&self) -> &Path {
        &self.config.path
    }

    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database").field("config", &self.config).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{Filter, WriteModel};
    use serde_json::json;

    #[test]
    fn test_open_database() {
        let dir = TempDir::new().unwrap();
        let db = Database::open(dir.path()).unwrap();
        assert!(db.collections().unwrap().is_empty());
        assert_eq!(db.path(), dir.path());
        assert_eq!(db.history(None).unwrap().len(), 1);
    }

    #[test]
    fn test_open_missing_without_create() {
        let dir = TempDir::new().unwrap();
        let config = DatabaseConfig::new(dir.path().join("missing")).create_if_missing(false);
        let result = Database::open_with_config(config);
        assert!(matches!(result, Err(DatabaseError::NotFound(_))));
    }

    #[test]
    fn test_reopen_keeps_documents() {
        let dir = TempDir::new().unwrap();
        {
            let db = Database::open(dir.path()).unwrap();
            let kits = db.collection("kits").unwrap();
            let set = [("kit".to_string(), json!({"name": "chess"}))].into_iter().collect();
            kits.bulk_write(vec![WriteModel::upsert_one(Filter::eq("name", "chess"), set)])
                .unwrap();
        }

        let db = Database::open(dir.path()).unwrap();
        assert_eq!(db.collections().unwrap(), vec!["kits".to_string()]);
        assert_eq!(db.collection("kits").unwrap().count().unwrap(), 1);
        assert_eq!(db.stats().unwrap().total_documents, 1);
    }

    #[test]
    fn test_invalid_collection_name() {
        let db = Database::temporary().unwrap();
        assert!(matches!(db.collection("bad/name"), Err(DatabaseError::InvalidName(_))));
        assert!(matches!(db.collection("_meta"), Err(DatabaseError::InvalidName(_))));
    }

    #[test]
    fn test_signature_from_config() {
        let dir = TempDir::new().unwrap();
        let config = DatabaseConfig::new(dir.path()).signature(GitSignature::new("Loader", "loader@localhost"));
        let db = Database::open_with_config(config).unwrap();
        let kits = db.collection("kits").unwrap();
        let set = [("kit".to_string(), json!({"name": "go"}))].into_iter().collect();
        kits.bulk_write(vec![WriteModel::upsert_one(Filter::eq("name", "go"), set)])
            .unwrap();

        let latest = &db.history(Some(1)).unwrap()[0];
        assert_eq!(latest.author_name, "Loader");
        assert!(latest.summary().starts_with("[UPSERT] kits"));
    }
}

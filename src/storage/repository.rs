//! Core Git repository wrapper.
//!
//! This is the central component of the storage layer. It wraps
//! `git2::Repository` with thread-safe access and provides the document
//! operations the database handle is built on.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use git2::Repository;
use parking_lot::RwLock;
use tracing::{debug, info};

use crate::storage::blob::{self, Document};
use crate::storage::commit::{self, CommitBuilder, CommitInfo};
use crate::storage::error::{StorageError, StorageResult};
use crate::storage::refs::RefManager;
use crate::storage::tree::{TreeHandle, TreeMutator};
use crate::storage::types::{BranchName, CollectionName, CommitId, DocumentKey, GitSignature};

/// The main Git repository wrapper.
///
/// Clone this to share across threads - it uses Arc internally.
#[derive(Clone)]
pub struct GitRepository {
    inner: Arc<GitRepositoryInner>,
}

struct GitRepositoryInner {
    repo: RwLock<Repository>,
    path: PathBuf,
    signature: GitSignature,
}

/// Documents staged by a writer, committed together.
#[derive(Debug, Clone)]
pub struct WriteBatch {
    pub documents: Vec<Document>,
    pub message: String,
}

impl GitRepository {
    fn from_parts(repo: Repository, path: &Path, signature: GitSignature) -> Self {
        Self {
            inner: Arc::new(GitRepositoryInner {
                repo: RwLock::new(repo),
                path: path.to_path_buf(),
                signature,
            }),
        }
    }

    /// Open an existing repository.
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let path = path.as_ref();
        let repo = Repository::open(path).map_err(|_| StorageError::NotInitialized(path.to_path_buf()))?;
        debug!(path = %path.display(), "opened document repository");
        Ok(Self::from_parts(repo, path, GitSignature::kitdb()))
    }

    /// Initialize a new repository with an initial commit on `main`.
    pub fn init(path: impl AsRef<Path>) -> StorageResult<Self> {
        let path = path.as_ref();
        let repo = Repository::init(path)?;
        let storage = Self::from_parts(repo, path, GitSignature::kitdb());

        storage.with_repo_mut(|repo| {
            let commit_id = commit::create_initial_commit(repo, &storage.inner.signature)?;
            RefManager::init_main_branch(repo, commit_id)?;
            Ok(())
        })?;

        info!(path = %path.display(), "initialized document repository");
        Ok(storage)
    }

    pub fn open_or_init(path: impl AsRef<Path>) -> StorageResult<Self> {
        let path = path.as_ref();
        if path.join(".git").exists() {
            Self::open(path)
        } else {
            Self::init(path)
        }
    }

    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    pub fn signature(&self) -> &GitSignature {
        &self.inner.signature
    }

    /// Set the signature for future commits.
    ///
    /// Only possible before the handle has been cloned.
    pub fn with_signature(mut self, signature: GitSignature) -> StorageResult<Self> {
        let inner = Arc::get_mut(&mut self.inner)
            .ok_or_else(|| StorageError::Internal("cannot modify shared repository".to_string()))?;
        inner.signature = signature;
        Ok(self)
    }

    /// Execute a function with read access to the repository.
    pub fn with_repo<F, T>(&self, f: F) -> StorageResult<T>
    where
        F: FnOnce(&Repository) -> StorageResult<T>,
    {
        let repo = self.inner.repo.read();
        f(&repo)
    }

    /// Execute a function with exclusive access to the repository.
    pub fn with_repo_mut<F, T>(&self, f: F) -> StorageResult<T>
    where
        F: FnOnce(&Repository) -> StorageResult<T>,
    {
        let repo = self.inner.repo.write();
        f(&repo)
    }

    // ==================== Commits ====================

    /// Get the current HEAD commit (tip of main).
    pub fn head(&self) -> StorageResult<CommitId> {
        self.with_repo(RefManager::head_commit)
    }

    pub fn get_commit(&self, id: CommitId) -> StorageResult<CommitInfo> {
        self.with_repo(|repo| commit::get_commit(repo, id))
    }

    /// Commit history starting at `from`, newest first.
    pub fn history(&self, from: CommitId, limit: Option<usize>) -> StorageResult<Vec<CommitInfo>> {
        self.with_repo(|repo| {
            let iter = commit::history(repo, from)?;
            match limit {
                Some(n) => iter.take(n).collect(),
                None => iter.collect(),
            }
        })
    }

    // ==================== Collections ====================

    pub fn list_collections(&self, at: CommitId) -> StorageResult<Vec<CollectionName>> {
        self.with_repo(|repo| Ok(commit::get_tree_at_commit(repo, at)?.list_collections()))
    }

    pub fn collection_exists(&self, collection: &CollectionName, at: CommitId) -> StorageResult<bool> {
        self.with_repo(|repo| Ok(commit::get_tree_at_commit(repo, at)?.collection_exists(collection)))
    }

    // ==================== Documents ====================

    pub fn read_document(
        &self,
        collection: &CollectionName,
        key: &DocumentKey,
        at: CommitId,
    ) -> StorageResult<Option<Document>> {
        self.with_repo(|repo| {
            let tree = commit::get_tree_at_commit(repo, at)?;
            let blob_id = match tree.get_document_blob_id(repo, collection, key)? {
                Some(id) => id,
                None => return Ok(None),
            };
            let bytes = blob::read_blob(repo, blob_id)?;
            Ok(Some(blob::deserialize_document(&bytes, key)?))
        })
    }

    /// Read every document of a collection, in key order.
    ///
    /// Reads all documents into memory.
    pub fn scan_collection(&self, collection: &CollectionName, at: CommitId) -> StorageResult<Vec<Document>> {
        self.with_repo(|repo| {
            let tree = commit::get_tree_at_commit(repo, at)?;
            load_documents(repo, &tree, collection)
        })
    }

    /// Read-modify-write a collection as one commit.
    ///
    /// `f` receives the documents at the current head and returns the batch
    /// to commit (if any) plus a value handed back to the caller. The whole
    /// step holds the repository write lock, and `main` is advanced with
    /// compare-and-swap against the head that was read.
    pub fn write_collection<F, T>(&self, collection: &CollectionName, f: F) -> StorageResult<T>
    where
        F: FnOnce(Vec<Document>) -> StorageResult<(Option<WriteBatch>, T)>,
    {
        self.with_repo_mut(|repo| {
            let head = RefManager::head_commit(repo)?;
            let tree = commit::get_tree_at_commit(repo, head)?;
            let current = load_documents(repo, &tree, collection)?;

            let (batch, output) = f(current)?;
            let batch = match batch {
                Some(b) if !b.documents.is_empty() => b,
                _ => return Ok(output),
            };

            let mut mutator = TreeMutator::from_tree(repo, &tree)?;
            for doc in &batch.documents {
                let blob_id = blob::write_blob(repo, doc)?;
                mutator.put_document(collection, &doc.key, blob_id)?;
            }
            let new_tree_id = mutator.write()?;

            let new_head = CommitBuilder::new(repo)
                .tree(new_tree_id)
                .parent(head)
                .message(batch.message.as_str())
                .signature(self.inner.signature.clone())
                .commit()?;

            RefManager::update_branch_if_unchanged(repo, &BranchName::main(), head, new_head)?;

            info!(
                collection = %collection,
                documents = batch.documents.len(),
                commit = %new_head.short(),
                "committed write batch"
            );
            Ok(output)
        })
    }

    // ==================== Utility ====================

    pub fn stats(&self, at: CommitId) -> StorageResult<RepositoryStats> {
        self.with_repo(|repo| {
            let tree = commit::get_tree_at_commit(repo, at)?;
            let collections = tree.list_collections();
            let mut total_documents = 0;
            for collection in &collections {
                total_documents += tree.list_documents(repo, collection)?.len();
            }
            Ok(RepositoryStats {
                collection_count: collections.len(),
                total_documents,
            })
        })
    }
}

fn load_documents(
    repo: &Repository,
    tree: &TreeHandle<'_>,
    collection: &CollectionName,
) -> StorageResult<Vec<Document>> {
    let entries = tree.list_documents(repo, collection)?;
    let mut docs = Vec::with_capacity(entries.len());
    for (key, blob_id) in entries {
        let bytes = blob::read_blob(repo, blob_id)?;
        docs.push(blob::deserialize_document(&bytes, &key)?);
    }
    Ok(docs)
}

/// Statistics about the repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryStats {
    pub collection_count: usize,
    pub total_documents: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn setup() -> (TempDir, GitRepository) {
        let dir = TempDir::new().unwrap();
        let repo = GitRepository::init(dir.path()).unwrap();
        (dir, repo)
    }

    fn kits() -> CollectionName {
        CollectionName::new("kits").unwrap()
    }

    fn insert(repo: &GitRepository, value: serde_json::Value) -> DocumentKey {
        let key = DocumentKey::generate();
        let doc = Document::from_value(key.clone(), value).unwrap();
        repo.write_collection(&kits(), |_| {
            Ok((
                Some(WriteBatch {
                    documents: vec![doc],
                    message: "insert".to_string(),
                }),
                (),
            ))
        })
        .unwrap();
        key
    }

    #[test]
    fn test_init_and_open() {
        let dir = TempDir::new().unwrap();

        let repo = GitRepository::init(dir.path()).unwrap();
        let head1 = repo.head().unwrap();
        drop(repo);

        let repo = GitRepository::open(dir.path()).unwrap();
        assert_eq!(repo.head().unwrap(), head1);
    }

    #[test]
    fn test_init_creates_only_main() {
        let dir = TempDir::new().unwrap();
        let repo = GitRepository::init(dir.path()).unwrap();
        let head = repo.head().unwrap();

        let raw = Repository::open(dir.path()).unwrap();
        let branches: Vec<String> = raw
            .branches(Some(git2::BranchType::Local))
            .unwrap()
            .map(|b| b.unwrap().0.name().unwrap().unwrap().to_string())
            .collect();
        assert_eq!(branches, vec!["main".to_string()]);
        assert_eq!(raw.head().unwrap().name(), Some("refs/heads/main"));
        assert_eq!(raw.head().unwrap().target(), Some(head.raw()));
    }

    #[test]
    fn test_open_or_init() {
        let dir = TempDir::new().unwrap();

        let repo1 = GitRepository::open_or_init(dir.path()).unwrap();
        let head1 = repo1.head().unwrap();
        drop(repo1);

        let repo2 = GitRepository::open_or_init(dir.path()).unwrap();
        assert_eq!(repo2.head().unwrap(), head1);
    }

    #[test]
    fn test_open_missing_fails() {
        let dir = TempDir::new().unwrap();
        let result = GitRepository::open(dir.path().join("nope"));
        assert!(matches!(result, Err(StorageError::NotInitialized(_))));
    }

    #[test]
    fn test_write_and_read_document() {
        let (_dir, repo) = setup();
        let key = insert(&repo, json!({"name": "chess"}));
        let head = repo.head().unwrap();

        let doc = repo.read_document(&kits(), &key, head).unwrap().unwrap();
        assert_eq!(doc.get("name"), Some(&json!("chess")));
        assert!(repo.collection_exists(&kits(), head).unwrap());
        assert_eq!(repo.list_collections(head).unwrap(), vec![kits()]);

        let missing = DocumentKey::new("missing").unwrap();
        assert!(repo.read_document(&kits(), &missing, head).unwrap().is_none());
    }

    #[test]
    fn test_scan_collection() {
        let (_dir, repo) = setup();
        for i in 0..3 {
            insert(&repo, json!({ "value": i }));
        }
        let head = repo.head().unwrap();

        let docs = repo.scan_collection(&kits(), head).unwrap();
        assert_eq!(docs.len(), 3);

        let other = CollectionName::new("other").unwrap();
        assert!(repo.scan_collection(&other, head).unwrap().is_empty());
    }

    #[test]
    fn test_empty_batch_makes_no_commit() {
        let (_dir, repo) = setup();
        let before = repo.head().unwrap();

        let seen = repo
            .write_collection(&kits(), |docs| Ok((None, docs.len())))
            .unwrap();

        assert_eq!(seen, 0);
        assert_eq!(repo.head().unwrap(), before);
    }

    #[test]
    fn test_failed_batch_leaves_head() {
        let (_dir, repo) = setup();
        let before = repo.head().unwrap();

        let result: StorageResult<()> = repo.write_collection(&kits(), |_| {
            Err(StorageError::InvalidDocument("rejected".to_string()))
        });

        assert!(result.is_err());
        assert_eq!(repo.head().unwrap(), before);
    }

    #[test]
    fn test_history_and_stats() {
        let (_dir, repo) = setup();
        insert(&repo, json!({"name": "a"}));
        insert(&repo, json!({"name": "b"}));
        let head = repo.head().unwrap();

        let history = repo.history(head, Some(10)).unwrap();
        assert_eq!(history.len(), 3);
        assert_eq!(history[0].id, head);

        let limited = repo.history(head, Some(1)).unwrap();
        assert_eq!(limited.len(), 1);

        let stats = repo.stats(head).unwrap();
        assert_eq!(stats.collection_count, 1);
        assert_eq!(stats.total_documents, 2);
    }

    #[test]
    fn test_with_signature() {
        let dir = TempDir::new().unwrap();
        let repo = GitRepository::init(dir.path())
            .unwrap()
            .with_signature(GitSignature::new("Loader", "loader@localhost"))
            .unwrap();
        insert(&repo, json!({"name": "a"}));

        let info = repo.get_commit(repo.head().unwrap()).unwrap();
        assert_eq!(info.author_name, "Loader");

        let shared = repo.clone();
        assert!(repo.with_signature(GitSignature::kitdb()).is_err());
        drop(shared);
    }
}

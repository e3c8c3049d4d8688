//! tree operations for collection management.
//!
//! in Git, a tree is a directory. In KitDB:
//! - the root tree contains one directory per collection plus `_meta`
//! - each collection directory contains document blobs (`{key}.json`)
//!
//! Collections are created implicitly by their first document write, the
//! same way a document store creates a collection on first insert.

use std::collections::HashMap;

use git2::{FileMode, ObjectType, Repository, Tree, TreeBuilder as Git2TreeBuilder};

use crate::storage::error::{StorageError, StorageResult};
use crate::storage::types::{BlobId, CollectionName, DocumentKey, DocumentPath, TreeId};

/// name of the metadata directory written into every fresh repository
pub(crate) const META_DIR: &str = "_meta";

/// A read only snapshot of the root tree at a specific commit
#[derive(Debug)]
pub struct TreeHandle<'repo> {
    tree: Tree<'repo>,
}

impl<'repo> TreeHandle<'repo> {
    pub(crate) fn new(tree: Tree<'repo>) -> Self {
        Self { tree }
    }

    pub(crate) fn inner(&self) -> &Tree<'repo> {
        &self.tree
    }

    /// list all collections (top-level directories, metadata excluded)
    pub fn list_collections(&self) -> Vec<CollectionName> {
        self.tree
            .iter()
            .filter_map(|entry| {
                if entry.kind() != Some(ObjectType::Tree) {
                    return None;
                }
                let name = entry.name()?;
                if name.starts_with('_') {
                    return None;
                }
                CollectionName::new(name).ok()
            })
            .collect()
    }

    pub fn collection_exists(&self, collection: &CollectionName) -> bool {
        self.tree
            .get_name(collection.as_str())
            .map(|entry| entry.kind() == Some(ObjectType::Tree))
            .unwrap_or(false)
    }

    fn collection_tree(
        &self,
        repo: &'repo Repository,
        collection: &CollectionName,
    ) -> StorageResult<Option<Tree<'repo>>> {
        match self.tree.get_name(collection.as_str()) {
            Some(entry) => {
                if entry.kind() != Some(ObjectType::Tree) {
                    return Err(StorageError::UnexpectedEntryType {
                        path: collection.as_str().into(),
                        expected: "tree (directory)".to_string(),
                        found: format!("{:?}", entry.kind()),
                    });
                }
                Ok(Some(repo.find_tree(entry.id())?))
            }
            None => Ok(None),
        }
    }

    /// list document keys with their blob ids, in tree (key) order
    ///
    /// a collection that was never written lists as empty
    pub fn list_documents(
        &self,
        repo: &'repo Repository,
        collection: &CollectionName,
    ) -> StorageResult<Vec<(DocumentKey, BlobId)>> {
        let tree = match self.collection_tree(repo, collection)? {
            Some(t) => t,
            None => return Ok(Vec::new()),
        };

        let entries = tree
            .iter()
            .filter_map(|entry| {
                if entry.kind() != Some(ObjectType::Blob) {
                    return None;
                }
                let key = entry.name()?.strip_suffix(".json")?;
                let key = DocumentKey::new(key).ok()?;
                Some((key, BlobId::new(entry.id())))
            })
            .collect();

        Ok(entries)
    }

    /// get the blob ID for a specific document
    pub fn get_document_blob_id(
        &self,
        repo: &'repo Repository,
        collection: &CollectionName,
        key: &DocumentKey,
    ) -> StorageResult<Option<BlobId>> {
        let tree = match self.collection_tree(repo, collection)? {
            Some(t) => t,
            None => return Ok(None),
        };

        let entry = match tree.get_name(&key.file_name()) {
            Some(entry) => (entry.kind(), entry.id()),
            None => return Ok(None),
        };

        match entry {
            (Some(ObjectType::Blob), id) => Ok(Some(BlobId::new(id))),
            (kind, _) => Err(StorageError::UnexpectedEntryType {
                path: DocumentPath::new(collection.clone(), key.clone()).to_path_buf(),
                expected: "blob (file)".to_string(),
                found: format!("{:?}", kind),
            }),
        }
    }
}

/// a mutable tree builder for making changes
///
/// changes accumulate per collection and produce a new root tree on
/// `write`; the original tree is not modified
///
/// ```ignore
/// let mut mutator = TreeMutator::from_tree(repo, &tree)?;
/// mutator.put_document(&kits, &key, blob_id)?;
/// let new_tree_id = mutator.write()?;
/// ```
pub struct TreeMutator<'repo> {
    repo: &'repo Repository,
    root_builder: Git2TreeBuilder<'repo>,
    /// collection -> builder, for collections touched by this mutator
    modified: HashMap<String, Git2TreeBuilder<'repo>>,
    /// tree ids of collections present in the original root
    original: HashMap<String, git2::Oid>,
}

impl<'repo> TreeMutator<'repo> {
    pub fn from_tree(repo: &'repo Repository, tree: &TreeHandle<'_>) -> StorageResult<Self> {
        let root_builder = repo.treebuilder(Some(tree.inner()))?;

        let mut original = HashMap::new();
        for entry in tree.inner().iter() {
            if entry.kind() == Some(ObjectType::Tree) {
                if let Some(name) = entry.name() {
                    original.insert(name.to_string(), entry.id());
                }
            }
        }

        Ok(Self {
            repo,
            root_builder,
            modified: HashMap::new(),
            original,
        })
    }

    pub fn empty(repo: &'repo Repository) -> StorageResult<Self> {
        Ok(Self {
            repo,
            root_builder: repo.treebuilder(None)?,
            modified: HashMap::new(),
            original: HashMap::new(),
        })
    }

    fn collection_builder(&mut self, collection: &str) -> StorageResult<&mut Git2TreeBuilder<'repo>> {
        if !self.modified.contains_key(collection) {
            let builder = match self.original.get(collection) {
                Some(id) => {
                    let tree = self.repo.find_tree(*id)?;
                    self.repo.treebuilder(Some(&tree))?
                }
                None => self.repo.treebuilder(None)?,
            };
            self.modified.insert(collection.to_string(), builder);
        }
        self.modified
            .get_mut(collection)
            .ok_or_else(|| StorageError::Internal(format!("no builder for collection {}", collection)))
    }

    /// insert or replace a document blob, creating the collection if needed
    pub fn put_document(
        &mut self,
        collection: &CollectionName,
        key: &DocumentKey,
        blob_id: BlobId,
    ) -> StorageResult<()> {
        let builder = self.collection_builder(collection.as_str())?;
        builder.insert(key.file_name(), blob_id.raw(), FileMode::Blob.into())?;
        Ok(())
    }

    /// write all changes and return the new root tree ID
    pub fn write(mut self) -> StorageResult<TreeId> {
        for (name, builder) in self.modified {
            let tree_id = builder.write()?;
            self.root_builder.insert(name.as_str(), tree_id, FileMode::Tree.into())?;
        }

        let root_id = self.root_builder.write()?;
        Ok(TreeId::new(root_id))
    }
}

/// create the root tree of a fresh repository (an empty `_meta` directory)
pub fn create_initial_tree(repo: &Repository) -> StorageResult<TreeId> {
    let mut mutator = TreeMutator::empty(repo)?;
    let meta_id = repo.treebuilder(None)?.write()?;
    mutator.root_builder.insert(META_DIR, meta_id, FileMode::Tree.into())?;
    mutator.write()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup_repo() -> (TempDir, Repository) {
        let dir = TempDir::new().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        (dir, repo)
    }

    fn handle(repo: &Repository, id: TreeId) -> TreeHandle<'_> {
        TreeHandle::new(repo.find_tree(id.raw()).unwrap())
    }

    #[test]
    fn test_initial_tree_has_no_collections() {
        let (_dir, repo) = setup_repo();
        let tree_id = create_initial_tree(&repo).unwrap();
        let tree = handle(&repo, tree_id);

        assert!(tree.list_collections().is_empty());
        assert!(tree.inner().get_name(META_DIR).is_some());
    }

    #[test]
    fn test_put_document_creates_collection() {
        let (_dir, repo) = setup_repo();
        let tree_id = create_initial_tree(&repo).unwrap();
        let tree = handle(&repo, tree_id);

        let kits = CollectionName::new("kits").unwrap();
        let key = DocumentKey::new("doc1").unwrap();
        let blob_id = BlobId::new(repo.blob(b"{}").unwrap());

        let mut mutator = TreeMutator::from_tree(&repo, &tree).unwrap();
        mutator.put_document(&kits, &key, blob_id).unwrap();
        let tree_id = mutator.write().unwrap();

        let tree = handle(&repo, tree_id);
        assert_eq!(tree.list_collections(), vec![kits.clone()]);
        assert!(tree.collection_exists(&kits));
        assert_eq!(tree.get_document_blob_id(&repo, &kits, &key).unwrap(), Some(blob_id));
    }

    #[test]
    fn test_put_document_replaces_blob() {
        let (_dir, repo) = setup_repo();
        let tree_id = create_initial_tree(&repo).unwrap();
        let kits = CollectionName::new("kits").unwrap();
        let key = DocumentKey::new("doc1").unwrap();
        let first = BlobId::new(repo.blob(b"first").unwrap());
        let second = BlobId::new(repo.blob(b"second").unwrap());

        let tree = handle(&repo, tree_id);
        let mut mutator = TreeMutator::from_tree(&repo, &tree).unwrap();
        mutator.put_document(&kits, &key, first).unwrap();
        let tree_id = mutator.write().unwrap();

        let tree = handle(&repo, tree_id);
        let mut mutator = TreeMutator::from_tree(&repo, &tree).unwrap();
        mutator.put_document(&kits, &key, second).unwrap();
        let tree_id = mutator.write().unwrap();

        let tree = handle(&repo, tree_id);
        let docs = tree.list_documents(&repo, &kits).unwrap();
        assert_eq!(docs, vec![(key, second)]);
    }

    #[test]
    fn test_missing_collection_lists_empty() {
        let (_dir, repo) = setup_repo();
        let tree_id = create_initial_tree(&repo).unwrap();
        let tree = handle(&repo, tree_id);

        let kits = CollectionName::new("kits").unwrap();
        let key = DocumentKey::new("doc1").unwrap();
        assert!(tree.list_documents(&repo, &kits).unwrap().is_empty());
        assert_eq!(tree.get_document_blob_id(&repo, &kits, &key).unwrap(), None);
    }

    #[test]
    fn test_document_lookup_in_existing_collection() {
        let (_dir, repo) = setup_repo();
        let blob = repo.blob(b"{}").unwrap();

        let mut nested = repo.treebuilder(None).unwrap();
        nested.insert("inner.json", blob, 0o100644).unwrap();
        let nested_id = nested.write().unwrap();

        let mut coll = repo.treebuilder(None).unwrap();
        coll.insert("doc1.json", blob, 0o100644).unwrap();
        coll.insert("dir1.json", nested_id, 0o040000).unwrap();
        let coll_id = coll.write().unwrap();

        let mut root = repo.treebuilder(None).unwrap();
        root.insert("kits", coll_id, 0o040000).unwrap();
        let tree = handle(&repo, TreeId::new(root.write().unwrap()));

        let kits = CollectionName::new("kits").unwrap();
        let found = tree
            .get_document_blob_id(&repo, &kits, &DocumentKey::new("doc1").unwrap())
            .unwrap();
        assert_eq!(found, Some(BlobId::new(blob)));

        let missing = tree
            .get_document_blob_id(&repo, &kits, &DocumentKey::new("doc2").unwrap())
            .unwrap();
        assert_eq!(missing, None);

        let dir = tree.get_document_blob_id(&repo, &kits, &DocumentKey::new("dir1").unwrap());
        assert!(matches!(dir, Err(StorageError::UnexpectedEntryType { .. })));
    }
}

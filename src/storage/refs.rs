//! Branch and reference management.
//!
//! All documents live on `main`. Writers build a commit on top of the head
//! they read and then move `main` with compare-and-swap, so two writers that
//! raced on the same head cannot silently drop each other's batch.

use git2::Repository;

use crate::storage::error::{StorageError, StorageResult};
use crate::storage::types::{BranchName, CommitId};

/// Manages Git references (branches).
pub struct RefManager;

impl RefManager {
    /// Resolve a branch name to its current commit ID.
    pub fn resolve_branch(repo: &Repository, branch: &BranchName) -> StorageResult<CommitId> {
        let reference = repo
            .find_reference(&branch.as_ref_path())
            .map_err(|_| StorageError::RefNotFound(branch.to_string()))?;

        let commit = reference
            .peel_to_commit()
            .map_err(|_| StorageError::RefNotFound(branch.to_string()))?;

        Ok(CommitId::new(commit.id()))
    }

    /// Get the current HEAD commit (the main branch).
    pub fn head_commit(repo: &Repository) -> StorageResult<CommitId> {
        let head = repo.head().map_err(|e| {
            if e.code() == git2::ErrorCode::UnbornBranch {
                StorageError::EmptyRepository
            } else {
                StorageError::Git(e)
            }
        })?;

        let commit = head.peel_to_commit()?;
        Ok(CommitId::new(commit.id()))
    }

    pub fn branch_exists(repo: &Repository, branch: &BranchName) -> bool {
        repo.find_reference(&branch.as_ref_path()).is_ok()
    }

    pub fn create_branch(repo: &Repository, branch: &BranchName, target: CommitId) -> StorageResult<()> {
        let commit = repo.find_commit(target.raw())?;
        repo.branch(branch.as_str(), &commit, false)?;
        Ok(())
    }

    /// Force a branch to point to a new commit.
    pub fn update_branch(repo: &Repository, branch: &BranchName, target: CommitId) -> StorageResult<()> {
        let mut reference = repo
            .find_reference(&branch.as_ref_path())
            .map_err(|_| StorageError::RefNotFound(branch.to_string()))?;

        reference.set_target(target.raw(), &format!("update branch to {}", target.short()))?;
        Ok(())
    }

    /// Update a branch only if it still points to the expected commit.
    pub fn update_branch_if_unchanged(
        repo: &Repository,
        branch: &BranchName,
        expected: CommitId,
        new_target: CommitId,
    ) -> StorageResult<()> {
        let current = Self::resolve_branch(repo, branch)?;

        if current != expected {
            return Err(StorageError::ConcurrentModification {
                branch: branch.to_string(),
            });
        }

        Self::update_branch(repo, branch, new_target)
    }

    /// Create `main` at the initial commit and point HEAD at it.
    pub fn init_main_branch(repo: &Repository, initial_commit: CommitId) -> StorageResult<()> {
        let main = BranchName::main();

        if !Self::branch_exists(repo, &main) {
            Self::create_branch(repo, &main, initial_commit)?;
        }

        repo.set_head(&main.as_ref_path())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::tree::create_initial_tree;
    use tempfile::TempDir;

    fn setup_repo_with_commit() -> (TempDir, Repository, CommitId) {
        let dir = TempDir::new().unwrap();
        let repo = Repository::init(dir.path()).unwrap();

        let commit_id = {
            let tree_id = create_initial_tree(&repo).unwrap();
            let tree = repo.find_tree(tree_id.raw()).unwrap();
            let sig = git2::Signature::now("Test", "test@test.com").unwrap();
            let oid = repo
                .commit(None, &sig, &sig, "Initial commit", &tree, &[])
                .unwrap();
            CommitId::new(oid)
        };

        RefManager::init_main_branch(&repo, commit_id).unwrap();
        (dir, repo, commit_id)
    }

    fn child_commit(repo: &Repository, parent: CommitId) -> CommitId {
        let tree_id = create_initial_tree(repo).unwrap();
        let tree = repo.find_tree(tree_id.raw()).unwrap();
        let sig = git2::Signature::now("Test", "test@test.com").unwrap();
        let parent = repo.find_commit(parent.raw()).unwrap();
        let oid = repo
            .commit(None, &sig, &sig, "Child commit", &tree, &[&parent])
            .unwrap();
        CommitId::new(oid)
    }

    #[test]
    fn test_head_follows_main() {
        let (_dir, repo, expected) = setup_repo_with_commit();
        assert_eq!(RefManager::head_commit(&repo).unwrap(), expected);
        assert_eq!(
            RefManager::resolve_branch(&repo, &BranchName::main()).unwrap(),
            expected
        );
    }

    #[test]
    fn test_missing_branch() {
        let (_dir, repo, _) = setup_repo_with_commit();
        let branch = BranchName::new("missing").unwrap();
        assert!(!RefManager::branch_exists(&repo, &branch));
        let result = RefManager::resolve_branch(&repo, &branch);
        assert!(matches!(result, Err(StorageError::RefNotFound(_))));
    }

    #[test]
    fn test_update_branch_if_unchanged() {
        let (_dir, repo, commit1) = setup_repo_with_commit();
        let main = BranchName::main();
        let commit2 = child_commit(&repo, commit1);

        RefManager::update_branch_if_unchanged(&repo, &main, commit1, commit2).unwrap();
        assert_eq!(RefManager::head_commit(&repo).unwrap(), commit2);

        let result = RefManager::update_branch_if_unchanged(&repo, &main, commit1, commit2);
        assert!(matches!(result, Err(StorageError::ConcurrentModification { .. })));
    }
}

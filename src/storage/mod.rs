//! storage layer for KitDB
//!
//! A Git-backed JSON document store. The database handle above it uses this
//! API and never touches git2 directly.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     GitRepository                           │
//! │       (collections, documents, write batches, history)      │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!        ┌─────────────────────┼─────────────────────┐
//!        │                     │                     │
//!        ▼                     ▼                     ▼
//!  ┌─────────────┐       ┌─────────────┐       ┌─────────────┐
//!  │    tree     │       │    blob     │       │    refs     │
//!  │(collections)│       │ (documents) │       │   (main)    │
//!  └─────────────┘       └─────────────┘       └─────────────┘
//!         │                     │                     │
//!         └─────────────────────┼─────────────────────┘
//!                               ▼
//!                        ┌─────────────┐
//!                        │   commit    │
//!                        │  (history)  │
//!                        └─────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use kitdb::storage::{CollectionName, Document, DocumentKey, GitRepository, WriteBatch};
//!
//! let repo = GitRepository::open_or_init("./kitdb")?;
//! let kits = CollectionName::new("kits")?;
//!
//! let doc = Document::from_value(DocumentKey::generate(), json!({"name": "chess"}))?;
//! repo.write_collection(&kits, |_current| {
//!     Ok((Some(WriteBatch { documents: vec![doc], message: "load".into() }), ()))
//! })?;
//!
//! let docs = repo.scan_collection(&kits, repo.head()?)?;
//! ```

mod blob;
mod commit;
mod error;
mod refs;
mod repository;
mod tree;
mod types;

pub use blob::{is_metadata_field, Document, METADATA_FIELDS};
pub use commit::{CommitInfo, CommitMessage};
pub use error::{StorageError, StorageResult};
pub use repository::{GitRepository, RepositoryStats, WriteBatch};
pub use types::{
    BlobId, BranchName, CollectionName, CommitId, DocumentKey, DocumentPath, GitSignature,
    InvalidNameError, TreeId,
};

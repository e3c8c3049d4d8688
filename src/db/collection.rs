//! Collection handle: filtered reads and bulk writes over one collection.

use tracing::{debug, info};

use super::api::{DatabaseError, DatabaseResult};
use super::query::{apply_models, BulkWriteResult, Filter, WriteModel, FIELD_SEPARATOR};
use crate::storage::{
    is_metadata_field, CollectionName, CommitMessage, Document, DocumentKey, GitRepository, WriteBatch,
};

/// A named collection inside a [`super::Database`].
///
/// Cheap to clone; clones share the underlying repository.
#[derive(Clone)]
pub struct Collection {
    name: CollectionName,
    repo: GitRepository,
}

impl Collection {
    pub(crate) fn new(name: CollectionName, repo: GitRepository) -> Self {
        Self { name, repo }
    }

    pub fn name(&self) -> &CollectionName {
        &self.name
    }

    /// First document matching the filter, in scan order.
    pub fn find_one(&self, filter: &Filter) -> DatabaseResult<Option<Document>> {
        let head = self.repo.head()?;
        let found = self
            .repo
            .scan_collection(&self.name, head)?
            .into_iter()
            .find(|doc| filter.matches(doc));
        debug!(collection = %self.name, found = found.is_some(), "find_one");
        Ok(found)
    }

    /// Every document matching the filter, in scan order.
    pub fn find(&self, filter: &Filter) -> DatabaseResult<Vec<Document>> {
        let head = self.repo.head()?;
        let docs: Vec<Document> = self
            .repo
            .scan_collection(&self.name, head)?
            .into_iter()
            .filter(|doc| filter.matches(doc))
            .collect();
        debug!(collection = %self.name, count = docs.len(), "find");
        Ok(docs)
    }

    pub fn find_all(&self) -> DatabaseResult<Vec<Document>> {
        self.find(&Filter::All)
    }

    pub fn count(&self) -> DatabaseResult<usize> {
        Ok(self.find_all()?.len())
    }

    /// Apply the models in order and commit every changed document at once.
    ///
    /// Models are validated before anything is read: set fields must be
    /// top-level names and must not shadow document metadata (`_id`,
    /// `_version`, ...). A batch that changes nothing creates no commit.
    pub fn bulk_write(&self, models: Vec<WriteModel>) -> DatabaseResult<BulkWriteResult> {
        for model in &models {
            if let Some(field) = model.set_fields().find(|f| f.is_empty() || f.contains(FIELD_SEPARATOR)) {
                return Err(DatabaseError::InvalidDocument(format!(
                    "set field '{}' must be a non-empty top-level field name",
                    field
                )));
            }
            if let Some(field) = model.set_fields().find(|f| is_metadata_field(f)) {
                return Err(DatabaseError::InvalidDocument(format!(
                    "set field '{}' is reserved for document metadata",
                    field
                )));
            }
        }

        if models.is_empty() {
            return Ok(BulkWriteResult::default());
        }

        let collection = self.name.clone();
        let result = self.repo.write_collection(&self.name, move |mut docs| {
            let (result, touched) = apply_models(&mut docs, models, DocumentKey::generate);
            let documents: Vec<Document> = touched.into_iter().map(|i| docs[i].clone()).collect();
            let batch = WriteBatch {
                documents,
                message: CommitMessage::bulk_write(collection.as_str(), result.upserted, result.modified),
            };
            Ok((Some(batch), result))
        })?;

        info!(
            collection = %self.name,
            matched = result.matched,
            modified = result.modified,
            upserted = result.upserted,
            "bulk write"
        );
        Ok(result)
    }
}

impl std::fmt::Debug for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collection")
            .field("name", &self.name)
            .field("path", &self.repo.path())
            .finish()
    }
}

//! Blob operations for document storage.
//!
//! Each document is stored as a separate JSON blob, with metadata fields for
//! version tracking kept beside the user fields.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::storage::error::{StorageError, StorageResult};
use crate::storage::types::{BlobId, DocumentKey};

/// a stored document with metadata and user fields
///
/// The internal format stored in Git:
/// ```text
/// {
///   "_id": "01hx...",
///   "_version": 1,
///   "_created_at": "xxxx-xx-xxT00:00:00Z",
///   "_updated_at": "xxxx-xx-xxT00:00:00Z",
///   "name": "chess",
///   "kit": { "name": "chess", "pieces": 32 }
/// }
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    /// must match the file name without the `.json` extension
    pub key: DocumentKey,
    pub version: u64,
    pub created_at: String,
    pub updated_at: String,
    pub fields: BTreeMap<String, Value>,
}

impl Document {
    /// creates a version 1 document stamped with the current time
    pub fn new(key: DocumentKey, fields: BTreeMap<String, Value>) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            key,
            version: 1,
            created_at: now.clone(),
            updated_at: now,
            fields,
        }
    }

    /// create a document from a JSON value, which must be an object
    pub fn from_value(key: DocumentKey, value: Value) -> StorageResult<Self> {
        match value {
            Value::Object(map) => Ok(Self::new(key, map.into_iter().collect())),
            other => Err(StorageError::InvalidDocument(format!(
                "document body must be a JSON object, got {}",
                json_type_name(&other)
            ))),
        }
    }

    /// replace the given top-level fields, leaving the others untouched
    ///
    /// Returns whether any field value actually changed. The version and
    /// update time only move when it did.
    pub fn merge_fields(&mut self, updates: &BTreeMap<String, Value>) -> bool {
        let mut changed = false;
        for (k, v) in updates {
            if self.fields.get(k) != Some(v) {
                self.fields.insert(k.clone(), v.clone());
                changed = true;
            }
        }
        if changed {
            self.version += 1;
            self.updated_at = chrono::Utc::now().to_rfc3339();
        }
        changed
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// user fields as a JSON object (metadata excluded)
    pub fn to_value(&self) -> Value {
        Value::Object(self.fields.clone().into_iter().collect::<Map<String, Value>>())
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// field names taken by document metadata in the stored JSON
pub const METADATA_FIELDS: [&str; 4] = ["_id", "_version", "_created_at", "_updated_at"];

pub fn is_metadata_field(name: &str) -> bool {
    METADATA_FIELDS.contains(&name)
}

#[derive(Serialize, Deserialize)]
struct DocumentJson {
    #[serde(rename = "_id")]
    id: String,
    #[serde(rename = "_version")]
    version: u64,
    #[serde(rename = "_created_at")]
    created_at: String,
    #[serde(rename = "_updated_at")]
    updated_at: String,
    #[serde(flatten)]
    fields: BTreeMap<String, Value>,
}

/// serialize a document to JSON bytes
///
/// BTreeMap keeps key order stable so identical documents hash to the same blob.
pub fn serialize_document(doc: &Document) -> StorageResult<Vec<u8>> {
    if let Some(field) = doc.fields.keys().find(|k| is_metadata_field(k)) {
        return Err(StorageError::InvalidDocument(format!(
            "field '{}' is reserved for document metadata",
            field
        )));
    }

    let json = DocumentJson {
        id: doc.key.as_str().to_string(),
        version: doc.version,
        created_at: doc.created_at.clone(),
        updated_at: doc.updated_at.clone(),
        fields: doc.fields.clone(),
    };

    Ok(serde_json::to_vec_pretty(&json)?)
}

/// deserialize a document, checking the embedded id against the file name
pub fn deserialize_document(bytes: &[u8], expected_key: &DocumentKey) -> StorageResult<Document> {
    let json: DocumentJson = serde_json::from_slice(bytes)?;

    if json.id != expected_key.as_str() {
        return Err(StorageError::CorruptedData {
            path: expected_key.file_name().into(),
            reason: format!(
                "document id mismatch: file name suggests '{}' but content has '{}'",
                expected_key, json.id
            ),
        });
    }

    Ok(Document {
        key: expected_key.clone(),
        version: json.version,
        created_at: json.created_at,
        updated_at: json.updated_at,
        fields: json.fields,
    })
}

/// write a document as a blob, returning its content hash
pub fn write_blob(repo: &git2::Repository, doc: &Document) -> StorageResult<BlobId> {
    let bytes = serialize_document(doc)?;
    let oid = repo.blob(&bytes)?;
    Ok(BlobId::new(oid))
}

pub fn read_blob(repo: &git2::Repository, blob_id: BlobId) -> StorageResult<Vec<u8>> {
    let blob = repo.find_blob(blob_id.raw())?;
    Ok(blob.content().to_vec())
}

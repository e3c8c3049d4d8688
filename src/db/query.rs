//! Query filters and bulk write models.
//!
//! Field paths are dotted (`kit.name`) and walk nested JSON objects.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use crate::storage::Document;

/// separator between the segments of a field path
pub const FIELD_SEPARATOR: char = '.';

/// A document filter.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// matches every document
    All,
    /// field at `path` equals the value
    Eq(String, Value),
    /// every inner filter matches
    And(Vec<Filter>),
}

impl Filter {
    pub fn eq(path: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Eq(path.into(), value.into())
    }

    pub fn and(filters: impl IntoIterator<Item = Filter>) -> Self {
        Filter::And(filters.into_iter().collect())
    }

    pub fn matches(&self, doc: &Document) -> bool {
        match self {
            Filter::All => true,
            Filter::Eq(path, expected) => field_at(&doc.fields, path) == Some(expected),
            Filter::And(filters) => filters.iter().all(|f| f.matches(doc)),
        }
    }

    /// fields an upsert seeds a new document with: every equality in the filter
    fn seed(&self, target: &mut Map<String, Value>) {
        match self {
            Filter::All => {}
            Filter::Eq(path, value) => set_path(target, path, value.clone()),
            Filter::And(filters) => filters.iter().for_each(|f| f.seed(target)),
        }
    }
}

/// resolve a dotted path against a document's top-level fields
pub fn field_at<'a>(fields: &'a BTreeMap<String, Value>, path: &str) -> Option<&'a Value> {
    let mut segments = path.split(FIELD_SEPARATOR);
    let first = segments.next()?;
    segments.try_fold(fields.get(first)?, |value, segment| value.as_object()?.get(segment))
}

/// write `value` at a dotted path, creating intermediate objects
///
/// a non-object value sitting on the path is replaced by an object
pub fn set_path(target: &mut Map<String, Value>, path: &str, value: Value) {
    match path.split_once(FIELD_SEPARATOR) {
        None => {
            target.insert(path.to_string(), value);
        }
        Some((head, rest)) => {
            let entry = target
                .entry(head.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !entry.is_object() {
                *entry = Value::Object(Map::new());
            }
            if let Value::Object(inner) = entry {
                set_path(inner, rest, value);
            }
        }
    }
}

/// One write operation of a bulk write.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteModel {
    /// Replace the `set` fields of the first document matching `filter`.
    ///
    /// With `upsert`, a missing match inserts a new document built from the
    /// filter's equality fields overlaid with `set`.
    UpdateOne {
        filter: Filter,
        set: BTreeMap<String, Value>,
        upsert: bool,
    },
}

impl WriteModel {
    pub fn update_one(filter: Filter, set: BTreeMap<String, Value>) -> Self {
        WriteModel::UpdateOne {
            filter,
            set,
            upsert: false,
        }
    }

    pub fn upsert_one(filter: Filter, set: BTreeMap<String, Value>) -> Self {
        WriteModel::UpdateOne {
            filter,
            set,
            upsert: true,
        }
    }

    /// top-level field names this model writes
    pub(crate) fn set_fields(&self) -> impl Iterator<Item = &str> {
        match self {
            WriteModel::UpdateOne { set, .. } => set.keys().map(String::as_str),
        }
    }
}

/// Counts reported by a bulk write.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BulkWriteResult {
    /// documents matched by a filter
    pub matched: usize,
    /// matched documents whose fields actually changed
    pub modified: usize,
    /// documents inserted by upserts
    pub upserted: usize,
}

impl BulkWriteResult {
    /// whether the bulk write changed anything on disk
    pub fn is_noop(&self) -> bool {
        self.modified == 0 && self.upserted == 0
    }
}

/// Apply models in order to an in-memory collection.
///
/// Later models see the effects of earlier ones. Returns the counts and the
/// indices of documents that must be written.
pub(crate) fn apply_models(
    docs: &mut Vec<Document>,
    models: Vec<WriteModel>,
    mut new_key: impl FnMut() -> crate::storage::DocumentKey,
) -> (BulkWriteResult, Vec<usize>) {
    let mut result = BulkWriteResult::default();
    let mut touched = Vec::new();

    for model in models {
        let WriteModel::UpdateOne { filter, set, upsert } = model;

        match docs.iter().position(|doc| filter.matches(doc)) {
            Some(index) => {
                result.matched += 1;
                if docs[index].merge_fields(&set) {
                    result.modified += 1;
                    if !touched.contains(&index) {
                        touched.push(index);
                    }
                }
            }
            None if upsert => {
                let mut fields = Map::new();
                filter.seed(&mut fields);
                fields.extend(set);
                docs.push(Document::new(new_key(), fields.into_iter().collect()));
                touched.push(docs.len() - 1);
                result.upserted += 1;
            }
            None => {}
        }
    }

    (result, touched)
}

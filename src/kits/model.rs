//! Kit records as loaded and as returned.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A kit as handed to [`super::KitRepository::store_default`].
///
/// `kit` is the opaque payload; it should carry its own `name`. Any other
/// top-level fields are stored beside it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KitRecord {
    pub kit: Value,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl KitRecord {
    pub fn new(kit: Value) -> Self {
        Self {
            kit,
            extra: BTreeMap::new(),
        }
    }

    /// The kit's unique name: `kit.name`, else a top-level `name`.
    pub fn name(&self) -> Option<&str> {
        self.kit
            .get("name")
            .and_then(Value::as_str)
            .or_else(|| self.extra.get("name").and_then(Value::as_str))
    }
}

/// One element of [`super::KitRepository::get_all`]: `{"kit": <payload>}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KitEntry {
    pub kit: Value,
}

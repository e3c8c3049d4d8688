//! Lookup and bulk upsert of kits.

use std::collections::BTreeMap;
use std::path::Path;

use serde_json::Value;
use tracing::{debug, info, warn};

use super::defaults;
use super::error::{KitError, KitResult};
use super::model::{KitEntry, KitRecord};
use crate::db::{BulkWriteResult, Collection, Database, Filter, WriteModel};

/// Field holding a kit's name on its stored document.
const NAME_FIELD: &str = "name";
/// Field holding the kit payload on its stored document.
const KIT_FIELD: &str = "kit";

/// Access to the kit collection of a database.
///
/// A repository starts unbound ([`KitRepository::new`]); every operation
/// fails with [`KitError::NotConnected`] until [`KitRepository::connect`]
/// binds it to a database handle.
///
/// Stored documents look like `{"name": <kit name>, "kit": <payload>}`.
/// The top-level `name` mirrors `kit.name`, which makes it the key both for
/// lookups and for upserts.
#[derive(Debug, Clone, Default)]
pub struct KitRepository {
    kits: Option<Collection>,
}

impl KitRepository {
    /// collection kits are stored in
    pub const COLLECTION: &'static str = "kits";

    pub fn new() -> Self {
        Self::default()
    }

    /// Build a repository already bound to `db`.
    pub fn connected(db: &Database) -> KitResult<Self> {
        let mut repo = Self::new();
        repo.connect(db)?;
        Ok(repo)
    }

    /// Bind to the `kits` collection of `db`, replacing any earlier binding.
    pub fn connect(&mut self, db: &Database) -> KitResult<()> {
        self.connect_to(db, Self::COLLECTION)
    }

    /// Bind to a differently named collection of `db`.
    pub fn connect_to(&mut self, db: &Database, collection: &str) -> KitResult<()> {
        let kits = db.collection(collection)?;
        debug!(path = %db.path().display(), collection, "kit repository connected");
        self.kits = Some(kits);
        Ok(())
    }

    pub fn is_connected(&self) -> bool {
        self.kits.is_some()
    }

    fn kits(&self) -> KitResult<&Collection> {
        self.kits.as_ref().ok_or(KitError::NotConnected)
    }

    /// The payload of the kit called `name`, or `None` when there is none.
    pub fn get(&self, name: &str) -> KitResult<Option<Value>> {
        let doc = self.kits()?.find_one(&Filter::eq(NAME_FIELD, name))?;
        Ok(doc.and_then(|d| d.get(KIT_FIELD).cloned()))
    }

    /// Every stored kit as `{"kit": <payload>}`, in storage scan order.
    pub fn get_all(&self) -> KitResult<Vec<KitEntry>> {
        let docs = self.kits()?.find_all()?;
        let mut entries = Vec::with_capacity(docs.len());
        for doc in docs {
            match doc.get(KIT_FIELD) {
                Some(kit) => entries.push(KitEntry { kit: kit.clone() }),
                None => warn!(key = %doc.key, "skipping document without a kit payload"),
            }
        }
        Ok(entries)
    }

    /// Upsert every record in one bulk write.
    ///
    /// A record whose kit name already exists replaces that document's
    /// fields; otherwise a new document is inserted. Records are checked for
    /// a name before anything is written.
    pub fn store_default(&self, data: &[KitRecord]) -> KitResult<BulkWriteResult> {
        let kits = self.kits()?;

        let models = data
            .iter()
            .enumerate()
            .map(|(index, record)| -> KitResult<WriteModel> {
                let name = record.name().ok_or(KitError::MissingName { index })?;
                Ok(WriteModel::upsert_one(
                    Filter::eq(NAME_FIELD, name),
                    stored_fields(record, name),
                ))
            })
            .collect::<KitResult<Vec<_>>>()?;

        let result = kits.bulk_write(models)?;
        info!(
            records = data.len(),
            inserted = result.upserted,
            updated = result.modified,
            "stored default kits"
        );
        Ok(result)
    }

    /// Read default kits from the JSON files of `dir` and store them.
    pub fn load_defaults(&self, dir: impl AsRef<Path>) -> KitResult<BulkWriteResult> {
        self.kits()?;
        let records = defaults::load_dir(dir)?;
        self.store_default(&records)
    }
}

/// the `$set` body for a record: its extra fields, the payload and the name
fn stored_fields(record: &KitRecord, name: &str) -> BTreeMap<String, Value> {
    let mut fields = record.extra.clone();
    fields.insert(KIT_FIELD.to_string(), record.kit.clone());
    fields.insert(NAME_FIELD.to_string(), Value::String(name.to_string()));
    fields
}

//! High-level database handle.
//!
//! [`Database`] is the connection handle callers obtain once at startup;
//! [`Collection`] exposes filtered reads and bulk upserts over one collection.

mod api;
mod collection;
mod query;

pub use api::{Database, DatabaseConfig, DatabaseError, DatabaseResult};
pub use collection::Collection;
pub use query::{field_at, set_path, BulkWriteResult, Filter, WriteModel, FIELD_SEPARATOR};

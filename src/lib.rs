//! KitDB - kit documents on a Git-backed document store
//!
//! Kits are stored as JSON documents in the `kits` collection of a database
//! whose storage backend is a Git repository: every collection is a
//! directory, every document a JSON file, and every bulk write a commit.
//!
//! # Example
//!
//! ```no_run
//! use kitdb::db::Database;
//! use kitdb::kits::{KitRecord, KitRepository};
//! use serde_json::json;
//!
//! let db = Database::open("./kitdb").unwrap();
//! let kits = KitRepository::connected(&db).unwrap();
//! kits.store_default(&[KitRecord::new(json!({"name": "chess"}))]).unwrap();
//! let _chess = kits.get("chess").unwrap();
//! ```

pub mod db;
pub mod kits;
pub mod storage;

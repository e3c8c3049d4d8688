//! Kit repository.
//!
//! Kits are named, structured configuration documents (a game or toolkit
//! definition). They are written in bulk from a set of defaults and read
//! back one at a time by name or all at once.
//!
//! ```ignore
//! use kitdb::db::Database;
//! use kitdb::kits::{KitRecord, KitRepository};
//!
//! let db = Database::open("./kitdb")?;
//! let kits = KitRepository::connected(&db)?;
//!
//! kits.store_default(&[KitRecord::new(json!({"name": "chess", "pieces": 32}))])?;
//! assert_eq!(kits.get("chess")?, Some(json!({"name": "chess", "pieces": 32})));
//! ```

pub mod defaults;
mod error;
mod model;
mod repository;

pub use error::{KitError, KitResult};
pub use model::{KitEntry, KitRecord};
pub use repository::KitRepository;

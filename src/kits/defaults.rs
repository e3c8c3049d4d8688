//! Default kits shipped as JSON files.
//!
//! A defaults directory holds `*.json` files, read in file-name order. Each
//! file contains either one record (`{"kit": {...}}`) or an array of them.
//! Anything else in the directory is ignored.

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use super::error::{KitError, KitResult};
use super::model::KitRecord;

/// Read every record from the `*.json` files of `dir`.
pub fn load_dir(dir: impl AsRef<Path>) -> KitResult<Vec<KitRecord>> {
    let dir = dir.as_ref();
    let io_err = |source| KitError::Io {
        path: dir.to_path_buf(),
        source,
    };

    let mut files: Vec<PathBuf> = Vec::new();
    for entry in fs::read_dir(dir).map_err(io_err)? {
        let path = entry.map_err(io_err)?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "json") {
            files.push(path);
        } else {
            debug!(path = %path.display(), "ignoring non-kit entry");
        }
    }
    files.sort();

    let mut records = Vec::new();
    for path in files {
        records.extend(load_file(&path)?);
    }
    debug!(dir = %dir.display(), count = records.len(), "loaded default kits");
    Ok(records)
}

/// Read the records of one defaults file.
pub fn load_file(path: &Path) -> KitResult<Vec<KitRecord>> {
    let bytes = fs::read(path).map_err(|source| KitError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let invalid = |reason: String| KitError::InvalidDefaults {
        path: path.to_path_buf(),
        reason,
    };

    let value: Value = serde_json::from_slice(&bytes).map_err(|e| invalid(e.to_string()))?;
    let items = match value {
        Value::Array(items) => items,
        obj @ Value::Object(_) => vec![obj],
        _ => return Err(invalid("expected a kit record or an array of records".to_string())),
    };

    items
        .into_iter()
        .enumerate()
        .map(|(i, item)| serde_json::from_value(item).map_err(|e| invalid(format!("record #{}: {}", i, e))))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn write(dir: &Path, name: &str, value: Value) {
        fs::write(dir.join(name), serde_json::to_vec(&value).unwrap()).unwrap();
    }

    #[test]
    fn test_load_dir_in_file_order() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "b.json", json!([{"kit": {"name": "go"}}, {"kit": {"name": "shogi"}}]));
        write(dir.path(), "a.json", json!({"kit": {"name": "chess"}}));
        fs::write(dir.path().join("README.md"), "not a kit").unwrap();
        fs::create_dir(dir.path().join("nested.json")).unwrap();

        let records = load_dir(dir.path()).unwrap();
        let names: Vec<_> = records.iter().map(|r| r.name().unwrap()).collect();
        assert_eq!(names, vec!["chess", "go", "shogi"]);
    }

    #[test]
    fn test_load_empty_dir() {
        let dir = TempDir::new().unwrap();
        assert!(load_dir(dir.path()).unwrap().is_empty());
    }

    #[test]
    fn test_missing_dir() {
        let dir = TempDir::new().unwrap();
        let result = load_dir(dir.path().join("missing"));
        assert!(matches!(result, Err(KitError::Io { .. })));
    }

    #[test]
    fn test_malformed_files() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("broken.json"), "{ not json").unwrap();
        assert!(matches!(
            load_file(&dir.path().join("broken.json")),
            Err(KitError::InvalidDefaults { .. })
        ));

        write(dir.path(), "scalar.json", json!(42));
        assert!(matches!(
            load_file(&dir.path().join("scalar.json")),
            Err(KitError::InvalidDefaults { .. })
        ));

        write(dir.path(), "nokit.json", json!([{"kit": {"name": "a"}}, {"name": "b"}]));
        match load_file(&dir.path().join("nokit.json")) {
            Err(KitError::InvalidDefaults { reason, .. }) => assert!(reason.starts_with("record #1")),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_repository_loads_defaults() {
        use crate::db::Database;
        use crate::kits::KitRepository;

        let dir = TempDir::new().unwrap();
        write(dir.path(), "board.json", json!([
            {"kit": {"name": "chess", "pieces": 32}},
            {"kit": {"name": "go", "stones": 361}}
        ]));

        let db = Database::temporary().unwrap();
        let repo = KitRepository::connected(&db).unwrap();
        let result = repo.load_defaults(dir.path()).unwrap();
        assert_eq!(result.upserted, 2);
        assert_eq!(repo.get("go").unwrap(), Some(json!({"name": "go", "stones": 361})));

        let again = repo.load_defaults(dir.path()).unwrap();
        assert!(again.is_noop());
        assert_eq!(repo.get_all().unwrap().len(), 2);
    }
}

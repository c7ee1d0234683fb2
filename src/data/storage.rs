use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

/// Write-layer key for locally edited tasks.
pub const TASKS_KEY: &str = "local_tasks";
/// Write-layer key for locally edited agents.
pub const AGENTS_KEY: &str = "local_agents";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Local persisted override store: one JSON file per mutable
/// collection, read wholesale on load and overwritten wholesale on
/// every mutation. Once a collection is non-empty here it supersedes
/// the external snapshot entirely.
#[derive(Debug, Clone)]
pub struct WriteLayer {
    dir: PathBuf,
}

impl WriteLayer {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn ensure_dir(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.dir)
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }

    /// Read a collection back as raw values; each record is validated
    /// by its store. Returns `None` when the file is missing, empty,
    /// or not an array. A file that no longer parses is discarded so
    /// the next load falls back to the external snapshot.
    pub fn load_collection(&self, key: &str) -> Option<Vec<Value>> {
        let path = self.path_for(key);
        let content = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                log::warn!("write layer: failed to read {}: {}", path.display(), e);
                return None;
            }
        };

        match serde_json::from_str::<Value>(&content) {
            Ok(Value::Array(items)) if !items.is_empty() => Some(items),
            Ok(_) => None,
            Err(e) => {
                log::warn!(
                    "write layer: {} no longer parses ({}), discarding",
                    path.display(),
                    e
                );
                discard(&path);
                None
            }
        }
    }

    /// Overwrite a collection in full. No incremental diffing; the
    /// caller logs failures and keeps its in-memory state.
    pub fn save_collection<T: Serialize>(&self, key: &str, items: &[T]) -> Result<(), StorageError> {
        let json = serde_json::to_string_pretty(items)?;
        std::fs::write(self.path_for(key), json)?;
        Ok(())
    }
}

fn discard(path: &Path) {
    if let Err(e) = std::fs::remove_file(path) {
        log::warn!("write layer: failed to remove {}: {}", path.display(), e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn scratch() -> WriteLayer {
        let dir = std::env::temp_dir().join(format!("beacon-storage-{}", Uuid::new_v4()));
        let layer = WriteLayer::new(dir);
        layer.ensure_dir().unwrap();
        layer
    }

    #[test]
    fn roundtrips_a_collection() {
        let layer = scratch();
        layer
            .save_collection("things", &["a".to_string(), "b".to_string()])
            .unwrap();
        let values = layer.load_collection("things").unwrap();
        assert_eq!(values.len(), 2);
        assert_eq!(values[0], Value::String("a".to_string()));
    }

    #[test]
    fn missing_and_empty_read_as_none() {
        let layer = scratch();
        assert!(layer.load_collection("nothing").is_none());

        layer.save_collection::<String>("empty", &[]).unwrap();
        assert!(layer.load_collection("empty").is_none());
    }

    #[test]
    fn corrupt_file_is_discarded() {
        let layer = scratch();
        let path = layer.path_for("broken");
        std::fs::write(&path, "{not json").unwrap();

        assert!(layer.load_collection("broken").is_none());
        assert!(!path.exists()); // next load falls back to the snapshot
    }
}

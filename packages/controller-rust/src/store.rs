//! Atomic JSON-array persistence.
//!
//! Both persisted files (export registry, transaction logs) are single
//! JSON arrays rewritten in full on every mutation. Writes go to a
//! temporary sibling file and are renamed into place so readers never
//! observe a torn file; writes to the same store are serialized so a
//! late writer cannot clobber a newer state.

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::Mutex;

/// Atomic load/save of one JSON-array file.
#[derive(Debug)]
pub struct JsonStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonStore {
    /// Creates a store over the given file path. Nothing is touched on
    /// disk until the first save.
    #[must_use]
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            write_lock: Mutex::new(()),
        }
    }

    /// The file path this store reads and writes.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the persisted array. A missing file is an empty array, not
    /// an error.
    pub async fn load<T: DeserializeOwned>(&self) -> anyhow::Result<Vec<T>> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => {
                return Err(err).with_context(|| format!("reading {}", self.path.display()))
            }
        };
        serde_json::from_slice(&bytes)
            .with_context(|| format!("parsing {}", self.path.display()))
    }

    /// Atomically replaces the persisted array: serialize, write to a
    /// temporary sibling, then rename over the target.
    pub async fn save<T: Serialize>(&self, items: &[T]) -> anyhow::Result<()> {
        let bytes = serde_json::to_vec_pretty(items).context("serializing store contents")?;

        let _guard = self.write_lock.lock().await;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .with_context(|| format!("creating {}", parent.display()))?;
            }
        }

        let tmp_path = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp_path, &bytes)
            .await
            .with_context(|| format!("writing {}", tmp_path.display()))?;
        tokio::fs::rename(&tmp_path, &self.path)
            .await
            .with_context(|| format!("renaming into {}", self.path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};

    use super::*;

    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    struct Row {
        id: String,
        value: u32,
    }

    fn rows() -> Vec<Row> {
        vec![
            Row {
                id: "a".to_string(),
                value: 1,
            },
            Row {
                id: "b".to_string(),
                value: 2,
            },
        ]
    }

    #[tokio::test]
    async fn missing_file_loads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::new(dir.path().join("absent.json"));
        let loaded: Vec<Row> = store.load().await.unwrap();
        assert!(loaded.is_empty());
    }

    #[tokio::test]
    async fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::new(dir.path().join("rows.json"));

        store.save(&rows()).await.unwrap();
        let loaded: Vec<Row> = store.load().await.unwrap();
        assert_eq!(loaded, rows());
    }

    #[tokio::test]
    async fn save_creates_missing_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::new(dir.path().join("nested/deeper/rows.json"));

        store.save(&rows()).await.unwrap();
        let loaded: Vec<Row> = store.load().await.unwrap();
        assert_eq!(loaded.len(), 2);
    }

    #[tokio::test]
    async fn save_replaces_prior_contents() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::new(dir.path().join("rows.json"));

        store.save(&rows()).await.unwrap();
        store
            .save(&[Row {
                id: "c".to_string(),
                value: 3,
            }])
            .await
            .unwrap();

        let loaded: Vec<Row> = store.load().await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].id, "c");
    }

    #[tokio::test]
    async fn save_leaves_no_temporary_file_behind() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::new(dir.path().join("rows.json"));
        store.save(&rows()).await.unwrap();

        let names: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["rows.json".to_string()]);
    }

    #[tokio::test]
    async fn corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rows.json");
        std::fs::write(&path, b"{ not json").unwrap();

        let store = JsonStore::new(path);
        let result: anyhow::Result<Vec<Row>> = store.load().await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn persist_load_persist_is_byte_stable() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::new(dir.path().join("rows.json"));

        store.save(&rows()).await.unwrap();
        let first = std::fs::read(store.path()).unwrap();

        let loaded: Vec<Row> = store.load().await.unwrap();
        store.save(&loaded).await.unwrap();
        let second = std::fs::read(store.path()).unwrap();

        assert_eq!(first, second);
    }
}

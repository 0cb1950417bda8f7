//! JSON configuration document on local disk.
//!
//! Saves go through a temp file in the target directory followed by a
//! rename, so a crash mid-write leaves either the old or the new document,
//! never a truncated one. The temp file is created `0600`, which the renamed
//! document keeps: settings buckets may hold secrets.

use std::io::Write;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use skillgate_core::storage::ConfigDocumentStore;
use skillgate_types::error::StoreError;
use tempfile::NamedTempFile;

#[derive(Debug, Clone)]
pub struct JsonFileDocumentStore {
    path: PathBuf,
}

impl JsonFileDocumentStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn io_err(path: &Path, err: impl std::fmt::Display) -> StoreError {
    StoreError::Io(format!("{}: {err}", path.display()))
}

fn write_atomically(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&parent).map_err(|e| io_err(&parent, e))?;

    let mut tmp = NamedTempFile::new_in(&parent).map_err(|e| io_err(&parent, e))?;
    tmp.write_all(bytes).map_err(|e| io_err(tmp.path(), e))?;
    tmp.as_file().sync_all().map_err(|e| io_err(tmp.path(), e))?;
    tmp.persist(path).map_err(|e| io_err(path, e.error))?;
    Ok(())
}

impl ConfigDocumentStore for JsonFileDocumentStore {
    async fn load(&self) -> Result<Value, StoreError> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %self.path.display(), "no configuration document yet");
                return Ok(Value::Object(Map::new()));
            }
            Err(err) => return Err(io_err(&self.path, err)),
        };

        if content.trim().is_empty() {
            return Ok(Value::Object(Map::new()));
        }

        let doc: Value = serde_json::from_str(&content)
            .map_err(|err| StoreError::Parse(format!("{}: {err}", self.path.display())))?;
        if !doc.is_object() {
            return Err(StoreError::Parse(format!(
                "{}: top level must be a JSON object",
                self.path.display()
            )));
        }
        Ok(doc)
    }

    async fn save(&self, doc: &Value) -> Result<(), StoreError> {
        let mut bytes =
            serde_json::to_vec_pretty(doc).map_err(|err| StoreError::Parse(err.to_string()))?;
        bytes.push(b'\n');

        let path = self.path.clone();
        tokio::task::spawn_blocking(move || write_atomically(&path, &bytes))
            .await
            .map_err(|err| StoreError::Io(format!("write task failed: {err}")))??;

        tracing::debug!(path = %self.path.display(), "configuration document saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    #[tokio::test]
    async fn missing_file_loads_as_empty_object() {
        let dir = tempdir().unwrap();
        let store = JsonFileDocumentStore::new(dir.path().join("skills.json"));
        assert_eq!(store.load().await.unwrap(), json!({}));
    }

    #[tokio::test]
    async fn save_then_load_creates_parent_dirs() {
        let dir = tempdir().unwrap();
        let store = JsonFileDocumentStore::new(dir.path().join("nested").join("skills.json"));
        let doc = json!({ "skills": { "allow": ["s1"], "enabled": ["s1"] }, "theme": "dark" });

        store.save(&doc).await.unwrap();
        assert_eq!(store.load().await.unwrap(), doc);
    }

    #[tokio::test]
    async fn save_replaces_without_leaving_temp_files() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("skills.json");
        let store = JsonFileDocumentStore::new(&path);

        store.save(&json!({ "v": 1 })).await.unwrap();
        store.save(&json!({ "v": 2 })).await.unwrap();

        assert_eq!(store.load().await.unwrap(), json!({ "v": 2 }));
        let entries: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(entries, vec![std::ffi::OsString::from("skills.json")]);
    }

    #[tokio::test]
    async fn failed_save_reports_io_error() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("skills.json");
        std::fs::create_dir(&target).unwrap();
        std::fs::write(target.join("occupied"), "x").unwrap();

        let err = JsonFileDocumentStore::new(&target).save(&json!({ "v": 1 })).await.unwrap_err();
        assert!(matches!(err, StoreError::Io(_)));
        assert!(target.join("occupied").exists());
    }

    #[tokio::test]
    async fn malformed_document_is_parse_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("skills.json");
        std::fs::write(&path, "[1, 2").unwrap();
        let err = JsonFileDocumentStore::new(&path).load().await.unwrap_err();
        assert!(matches!(err, StoreError::Parse(_)));

        std::fs::write(&path, "[1, 2]").unwrap();
        let err = JsonFileDocumentStore::new(&path).load().await.unwrap_err();
        assert!(matches!(err, StoreError::Parse(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn saved_document_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let path = dir.path().join("skills.json");
        JsonFileDocumentStore::new(&path).save(&json!({})).await.unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}

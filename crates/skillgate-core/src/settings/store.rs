//! Per-skill settings buckets inside the configuration document.
//!
//! Each skill owns `settings.<id>` in the document. All writes go through
//! [`SettingsStore::modify`], which serialises read-modify-write cycles of the
//! whole document inside the process so sibling keys are never lost.

use std::sync::Arc;

use serde_json::{Map, Value};
use skillgate_types::error::SkillError;
use skillgate_types::skill::SettingsMeta;
use tokio::sync::Mutex;

use super::mask::{apply_patch_with_mask_handling, mask_sensitive, MaskedSettings};
use crate::storage::ConfigDocumentStore;

/// Top-level key holding every skill's settings bucket.
pub const SETTINGS_KEY: &str = "settings";

fn bucket<'a>(doc: &'a Value, id: &str) -> Option<&'a Value> {
    doc.get(SETTINGS_KEY)?.get(id)
}

fn object_mut<'a>(parent: &'a mut Map<String, Value>, key: &str) -> &'a mut Map<String, Value> {
    let slot = parent
        .entry(key.to_string())
        .or_insert_with(|| Value::Object(Map::new()));
    if !slot.is_object() {
        *slot = Value::Object(Map::new());
    }
    match slot {
        Value::Object(map) => map,
        _ => unreachable!("slot was just replaced by an object"),
    }
}

fn root_object(doc: &mut Value) -> &mut Map<String, Value> {
    if !doc.is_object() {
        *doc = Value::Object(Map::new());
    }
    match doc {
        Value::Object(map) => map,
        _ => unreachable!("document root was just replaced by an object"),
    }
}

fn sensitive_paths(meta: Option<&SettingsMeta>) -> &[String] {
    meta.map(|m| m.sensitive_paths.as_slice()).unwrap_or(&[])
}

/// Settings service over a [`ConfigDocumentStore`].
pub struct SettingsStore<D> {
    doc: Arc<D>,
    write_lock: Mutex<()>,
}

impl<D: ConfigDocumentStore> SettingsStore<D> {
    pub fn new(doc: Arc<D>) -> Self {
        Self {
            doc,
            write_lock: Mutex::new(()),
        }
    }

    /// Load the whole document.
    pub async fn load_document(&self) -> Result<Value, SkillError> {
        Ok(self.doc.load().await?)
    }

    /// Read-modify-write the whole document under the write lock.
    ///
    /// A failed save surfaces as `PersistFailed`; the stored document is then
    /// whatever it was before the call. Returns the document that was written.
    pub async fn modify<F>(&self, f: F) -> Result<Value, SkillError>
    where
        F: FnOnce(&mut Value) -> Result<(), SkillError> + Send,
    {
        let _guard = self.write_lock.lock().await;
        let mut doc = self.doc.load().await?;
        f(&mut doc)?;
        self.doc
            .save(&doc)
            .await
            .map_err(|e| SkillError::PersistFailed(e.to_string()))?;
        Ok(doc)
    }

    /// Raw settings of a skill; `{}` when no bucket exists.
    pub async fn read(&self, id: &str) -> Result<Value, SkillError> {
        let doc = self.doc.load().await?;
        Ok(bucket(&doc, id)
            .cloned()
            .unwrap_or_else(|| Value::Object(Map::new())))
    }

    /// Settings with sensitive values replaced by the mask sentinel.
    pub async fn read_masked(
        &self,
        id: &str,
        meta: Option<&SettingsMeta>,
    ) -> Result<MaskedSettings, SkillError> {
        let settings = self.read(id).await?;
        Ok(mask_sensitive(&settings, sensitive_paths(meta)))
    }

    /// Apply a mask-aware patch to a skill's bucket and return the masked result.
    pub async fn update(
        &self,
        id: &str,
        patch: &Value,
        meta: Option<&SettingsMeta>,
    ) -> Result<MaskedSettings, SkillError> {
        if !patch.is_object() {
            return Err(SkillError::BadParams(
                "settings patch must be a JSON object".to_string(),
            ));
        }
        let paths = sensitive_paths(meta);

        let doc = self
            .modify(|doc| {
                let existing = bucket(doc, id)
                    .cloned()
                    .unwrap_or_else(|| Value::Object(Map::new()));
                let next = apply_patch_with_mask_handling(&existing, patch, paths);
                object_mut(root_object(doc), SETTINGS_KEY).insert(id.to_string(), next);
                Ok(())
            })
            .await?;

        tracing::info!(skill = %id, "settings updated");
        let written = bucket(&doc, id).cloned().unwrap_or(Value::Null);
        Ok(mask_sensitive(&written, paths))
    }

    /// Write declared defaults into a skill's bucket if it has none yet.
    ///
    /// A bucket that exists, even an empty one, is never touched. Returns
    /// true when defaults were written.
    pub async fn bootstrap_defaults(
        &self,
        id: &str,
        meta: Option<&SettingsMeta>,
    ) -> Result<bool, SkillError> {
        // Reading first lazily creates the backing document.
        let doc = self.doc.load().await?;

        let Some(defaults) = meta.map(|m| &m.defaults).filter(|d| !d.is_empty()) else {
            return Ok(false);
        };
        if bucket(&doc, id).is_some() {
            return Ok(false);
        }

        let mut wrote = false;
        self.modify(|doc| {
            // Re-check under the write lock.
            if bucket(doc, id).is_none() {
                object_mut(root_object(doc), SETTINGS_KEY)
                    .insert(id.to_string(), Value::Object(defaults.clone()));
                wrote = true;
            }
            Ok(())
        })
        .await?;

        if wrote {
            tracing::debug!(skill = %id, keys = defaults.len(), "settings defaults written");
        }
        Ok(wrote)
    }
}

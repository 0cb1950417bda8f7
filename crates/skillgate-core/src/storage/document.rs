//! Configuration document storage port.
//!
//! The whole document is one JSON tree: the `skills` section plus one settings
//! bucket per skill under `settings.<id>`, and whatever sibling keys other
//! parts of the runtime keep there. Callers always read-modify-write the
//! entire tree. The file-backed implementation lives in skillgate-infra.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::RwLock;

use serde_json::{Map, Value};
use skillgate_types::error::StoreError;

/// Durable storage for the configuration document.
///
/// Uses RPITIT (native async fn in traits, Rust 2024 edition).
pub trait ConfigDocumentStore: Send + Sync {
    /// Load the full document. A store with nothing written yet returns `{}`.
    fn load(&self) -> impl std::future::Future<Output = Result<Value, StoreError>> + Send;

    /// Replace the full document.
    fn save(&self, doc: &Value) -> impl std::future::Future<Output = Result<(), StoreError>> + Send;
}

/// In-memory document, used by tests and by embedders with no durable storage.
#[derive(Debug)]
pub struct MemoryDocumentStore {
    doc: RwLock<Value>,
    fail_saves: AtomicBool,
    saves: AtomicUsize,
}

impl Default for MemoryDocumentStore {
    fn default() -> Self {
        Self::new(Value::Object(Map::new()))
    }
}

impl MemoryDocumentStore {
    pub fn new(doc: Value) -> Self {
        Self {
            doc: RwLock::new(doc),
            fail_saves: AtomicBool::new(false),
            saves: AtomicUsize::new(0),
        }
    }

    /// Make every subsequent `save` fail with an I/O error.
    pub fn set_fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    /// Number of successful saves so far.
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    /// Snapshot of the current document.
    pub fn snapshot(&self) -> Value {
        self.doc.read().expect("document lock poisoned").clone()
    }
}

impl ConfigDocumentStore for MemoryDocumentStore {
    async fn load(&self) -> Result<Value, StoreError> {
        Ok(self.snapshot())
    }

    async fn save(&self, doc: &Value) -> Result<(), StoreError> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(StoreError::Io("simulated write failure".to_string()));
        }
        *self.doc.write().expect("document lock poisoned") = doc.clone();
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

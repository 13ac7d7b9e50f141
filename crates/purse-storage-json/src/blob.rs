use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex,
};

use async_trait::async_trait;
use purse_core::{
    Collection, CoreError, KeyValueStore, LocalStore, Result, StoreBackend,
};
use serde_json::{Map, Value};
use tracing::debug;

/// Fallback [`LocalStore`] keeping every collection in one JSON document
/// stored under a single key-value entry.
///
/// The document maps collection names to arrays of records. Each call reads
/// the whole document and each mutation rewrites it. Records are kept in key
/// order so `get_all` matches the embedded backend.
pub struct BlobStore {
    key_value: Arc<dyn KeyValueStore>,
    document_key: String,
    ready: AtomicBool,
    write_lock: Mutex<()>,
}

impl BlobStore {
    pub fn new(key_value: Arc<dyn KeyValueStore>, document_key: impl Into<String>) -> Self {
        Self {
            key_value,
            document_key: document_key.into(),
            ready: AtomicBool::new(false),
            write_lock: Mutex::new(()),
        }
    }

    pub fn document_key(&self) -> &str {
        &self.document_key
    }

    fn ensure_ready(&self, collection: Collection) -> Result<()> {
        if self.ready.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(CoreError::StoreNotInitialized { collection })
        }
    }

    fn load_document(&self, collection: Collection) -> Result<Map<String, Value>> {
        let Some(raw) = self.key_value.get_item(&self.document_key)? else {
            return Ok(Map::new());
        };
        match serde_json::from_str::<Value>(&raw) {
            Ok(Value::Object(document)) => Ok(document),
            Ok(_) => Err(CoreError::storage(collection, "blob document is not an object")),
            Err(err) => Err(CoreError::storage(
                collection,
                format!("blob document is unreadable: {err}"),
            )),
        }
    }

    fn records(&self, collection: Collection) -> Result<Vec<Value>> {
        self.ensure_ready(collection)?;
        let mut document = self.load_document(collection)?;
        take_records(&mut document, collection)
    }

    /// Read-modify-write of one collection under the write lock.
    fn mutate<F>(&self, collection: Collection, apply: F) -> Result<()>
    where
        F: FnOnce(&mut Vec<Value>) -> Result<()>,
    {
        self.ensure_ready(collection)?;
        let _guard = self
            .write_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut document = self.load_document(collection)?;
        let mut records = take_records(&mut document, collection)?;
        apply(&mut records)?;
        records.sort_by(|a, b| {
            let key = collection.key_field();
            a.get(key)
                .and_then(Value::as_str)
                .cmp(&b.get(key).and_then(Value::as_str))
        });
        document.insert(collection.as_str().to_string(), Value::Array(records));
        let raw = serde_json::to_string(&Value::Object(document))?;
        self.key_value.set_item(&self.document_key, &raw)
    }
}

fn take_records(document: &mut Map<String, Value>, collection: Collection) -> Result<Vec<Value>> {
    match document.remove(collection.as_str()) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(records)) => Ok(records),
        Some(_) => Err(CoreError::storage(
            collection,
            "collection entry in blob document is not an array",
        )),
    }
}

fn position(records: &[Value], collection: Collection, key: &str) -> Option<usize> {
    records.iter().position(|record| {
        record.get(collection.key_field()).and_then(Value::as_str) == Some(key)
    })
}

#[async_trait]
impl LocalStore for BlobStore {
    fn backend(&self) -> StoreBackend {
        StoreBackend::Blob
    }

    async fn init(&self) -> Result<()> {
        self.ready.store(true, Ordering::SeqCst);
        debug!(key = %self.document_key, "blob store ready");
        Ok(())
    }

    async fn get(&self, collection: Collection, key: &str) -> Result<Option<Value>> {
        let mut records = self.records(collection)?;
        Ok(position(&records, collection, key).map(|index| records.swap_remove(index)))
    }

    async fn get_all(&self, collection: Collection) -> Result<Vec<Value>> {
        self.records(collection)
    }

    async fn add(&self, collection: Collection, record: Value) -> Result<()> {
        let key = collection.record_key(&record)?;
        self.mutate(collection, |records| {
            if position(records, collection, &key).is_some() {
                return Err(CoreError::DuplicateKey { collection, key });
            }
            records.push(record);
            Ok(())
        })
    }

    async fn put(&self, collection: Collection, record: Value) -> Result<()> {
        let key = collection.record_key(&record)?;
        self.mutate(collection, |records| {
            match position(records, collection, &key) {
                Some(index) => records[index] = record,
                None => records.push(record),
            }
            Ok(())
        })
    }

    async fn delete(&self, collection: Collection, key: &str) -> Result<()> {
        self.mutate(collection, |records| {
            records.retain(|record| {
                record.get(collection.key_field()).and_then(Value::as_str) != Some(key)
            });
            Ok(())
        })
    }

    async fn clear(&self, collection: Collection) -> Result<()> {
        self.mutate(collection, |records| {
            records.clear();
            Ok(())
        })
    }
}

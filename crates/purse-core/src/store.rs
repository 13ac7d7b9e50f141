use std::fmt;

use async_trait::async_trait;
use chrono::NaiveDate;
use purse_domain::{Budget, Category, LocalTransaction, Receipt, Settings, TransactionKind};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

use crate::error::{CoreError, Result};

/// Named record sets held by a local store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Collection {
    Transactions,
    Categories,
    Budgets,
    Receipts,
    Settings,
}

impl Collection {
    pub const ALL: [Collection; 5] = [
        Collection::Transactions,
        Collection::Categories,
        Collection::Budgets,
        Collection::Receipts,
        Collection::Settings,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Collection::Transactions => "transactions",
            Collection::Categories => "categories",
            Collection::Budgets => "budgets",
            Collection::Receipts => "receipts",
            Collection::Settings => "settings",
        }
    }

    /// Field holding the record key. Settings are keyed by `key`, the rest by `id`.
    pub fn key_field(self) -> &'static str {
        match self {
            Collection::Settings => "key",
            _ => "id",
        }
    }

    /// Extracts the record key, rejecting records without a string key.
    pub fn record_key(self, record: &Value) -> Result<String> {
        record
            .get(self.key_field())
            .and_then(Value::as_str)
            .filter(|key| !key.is_empty())
            .map(str::to_owned)
            .ok_or(CoreError::MissingKey {
                collection: self,
                field: self.key_field(),
            })
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which local backend answered the capability probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    /// Structured embedded database with per-collection tables.
    Embedded,
    /// Single JSON document kept in the key-value store.
    Blob,
}

impl fmt::Display for StoreBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreBackend::Embedded => f.write_str("embedded"),
            StoreBackend::Blob => f.write_str("blob"),
        }
    }
}

/// Range/category/kind filter over the transactions collection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionFilter {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub category: Option<String>,
    pub kind: Option<TransactionKind>,
}

impl TransactionFilter {
    pub fn between(from: NaiveDate, to: NaiveDate) -> Self {
        Self {
            from: Some(from),
            to: Some(to),
            ..Self::default()
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_kind(mut self, kind: TransactionKind) -> Self {
        self.kind = Some(kind);
        self
    }

    /// Matches a raw transaction record. Bounds are inclusive.
    pub fn matches(&self, record: &Value) -> bool {
        let date = record
            .get("date")
            .and_then(Value::as_str)
            .and_then(|raw| NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok());
        if self.from.is_some() || self.to.is_some() {
            let Some(date) = date else {
                return false;
            };
            if self.from.map_or(false, |from| date < from) || self.to.map_or(false, |to| date > to)
            {
                return false;
            }
        }
        if let Some(category) = &self.category {
            if record.get("category").and_then(Value::as_str) != Some(category.as_str()) {
                return false;
            }
        }
        if let Some(kind) = self.kind {
            if record.get("type").and_then(Value::as_str) != Some(kind.as_str()) {
                return false;
            }
        }
        true
    }
}

/// Orders transaction records by date, then id.
pub fn sort_by_date(records: &mut [Value]) {
    fn sort_key(record: &Value) -> (&str, &str) {
        (
            record.get("date").and_then(Value::as_str).unwrap_or_default(),
            record.get("id").and_then(Value::as_str).unwrap_or_default(),
        )
    }
    records.sort_by(|a, b| sort_key(a).cmp(&sort_key(b)));
}

/// Local persistence capability. Every backend must behave identically:
/// `add` rejects existing keys, `put` upserts, `get_all` returns records in
/// key order, and every call before `init` fails with
/// [`CoreError::StoreNotInitialized`].
#[async_trait]
pub trait LocalStore: Send + Sync {
    fn backend(&self) -> StoreBackend;

    /// Opens the store and creates missing collections. Idempotent.
    async fn init(&self) -> Result<()>;

    async fn get(&self, collection: Collection, key: &str) -> Result<Option<Value>>;

    async fn get_all(&self, collection: Collection) -> Result<Vec<Value>>;

    async fn add(&self, collection: Collection, record: Value) -> Result<()>;

    async fn put(&self, collection: Collection, record: Value) -> Result<()>;

    /// Removes a record. Deleting a missing key is not an error.
    async fn delete(&self, collection: Collection, key: &str) -> Result<()>;

    async fn clear(&self, collection: Collection) -> Result<()>;

    /// Transactions matching `filter`, ordered by date then id.
    async fn query_transactions(&self, filter: &TransactionFilter) -> Result<Vec<Value>> {
        let mut records: Vec<Value> = self
            .get_all(Collection::Transactions)
            .await?
            .into_iter()
            .filter(|record| filter.matches(record))
            .collect();
        sort_by_date(&mut records);
        Ok(records)
    }
}

/// Synchronous string key-value capability. Holds the legacy document and the
/// blob fallback document.
pub trait KeyValueStore: Send + Sync {
    fn get_item(&self, key: &str) -> Result<Option<String>>;
    fn set_item(&self, key: &str, value: &str) -> Result<()>;
    fn remove_item(&self, key: &str) -> Result<()>;
}

/// Typed record bound to the collection it lives in.
pub trait Record: Serialize + DeserializeOwned + Send + Sync + 'static {
    const COLLECTION: Collection;
}

impl Record for LocalTransaction {
    const COLLECTION: Collection = Collection::Transactions;
}

impl Record for Category {
    const COLLECTION: Collection = Collection::Categories;
}

impl Record for Budget {
    const COLLECTION: Collection = Collection::Budgets;
}

impl Record for Receipt {
    const COLLECTION: Collection = Collection::Receipts;
}

impl Record for Settings {
    const COLLECTION: Collection = Collection::Settings;
}

pub fn encode_record<T: Record>(record: &T) -> Result<Value> {
    serde_json::to_value(record)
        .map_err(|err| CoreError::storage(T::COLLECTION, format!("cannot encode record: {err}")))
}

pub fn decode_record<T: Record>(value: Value) -> Result<T> {
    serde_json::from_value(value)
        .map_err(|err| CoreError::storage(T::COLLECTION, format!("cannot decode record: {err}")))
}

/// Typed helpers over any [`LocalStore`].
#[async_trait]
pub trait LocalStoreExt: LocalStore {
    async fn get_record<T: Record>(&self, key: &str) -> Result<Option<T>> {
        match self.get(T::COLLECTION, key).await? {
            Some(value) => decode_record(value).map(Some),
            None => Ok(None),
        }
    }

    async fn all_records<T: Record>(&self) -> Result<Vec<T>> {
        self.get_all(T::COLLECTION)
            .await?
            .into_iter()
            .map(decode_record)
            .collect()
    }

    async fn add_record<T: Record>(&self, record: &T) -> Result<()> {
        let value = encode_record(record)?;
        self.add(T::COLLECTION, value).await
    }

    async fn put_record<T: Record>(&self, record: &T) -> Result<()> {
        let value = encode_record(record)?;
        self.put(T::COLLECTION, value).await
    }
}

impl<S: LocalStore + ?Sized> LocalStoreExt for S {}

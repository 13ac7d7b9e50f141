//! purse-storage-sqlite
//!
//! Embedded [`LocalStore`] on SQLite. One table per collection, each record
//! kept as its JSON document keyed by `id` (or `key` for settings). The
//! transactions table also carries indexed `date`, `category` and `type`
//! columns for range queries.

use std::{
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicBool, Ordering},
        Mutex, MutexGuard,
    },
};

use async_trait::async_trait;
use purse_core::{Collection, CoreError, LocalStore, Result, StoreBackend, TransactionFilter};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension};
use serde_json::Value;
use tracing::{debug, info};

const SCHEMA_VERSION: i64 = 1;

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS transactions(
        id TEXT PRIMARY KEY,
        date TEXT,
        category TEXT,
        type TEXT,
        data TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_transactions_date ON transactions(date);
    CREATE INDEX IF NOT EXISTS idx_transactions_category ON transactions(category);
    CREATE INDEX IF NOT EXISTS idx_transactions_type ON transactions(type);

    CREATE TABLE IF NOT EXISTS categories(
        id TEXT PRIMARY KEY,
        data TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS budgets(
        id TEXT PRIMARY KEY,
        data TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS receipts(
        id TEXT PRIMARY KEY,
        data TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS settings(
        key TEXT PRIMARY KEY,
        data TEXT NOT NULL
    );
"#;

pub struct SqliteStore {
    path: Option<PathBuf>,
    conn: Mutex<Connection>,
    ready: AtomicBool,
}

impl SqliteStore {
    /// Opens (or creates) the database file. Fails when the embedded
    /// database is unusable at `path`, which callers treat as the capability
    /// probe.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path).map_err(|err| open_error(&err))?;
        probe(&conn)?;
        Ok(Self {
            path: Some(path.to_path_buf()),
            conn: Mutex::new(conn),
            ready: AtomicBool::new(false),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|err| open_error(&err))?;
        probe(&conn)?;
        Ok(Self {
            path: None,
            conn: Mutex::new(conn),
            ready: AtomicBool::new(false),
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn connection(&self, collection: Collection) -> Result<MutexGuard<'_, Connection>> {
        if !self.ready.load(Ordering::SeqCst) {
            return Err(CoreError::StoreNotInitialized { collection });
        }
        Ok(self
            .conn
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()))
    }
}

fn probe(conn: &Connection) -> Result<()> {
    conn.query_row("SELECT count(*) FROM sqlite_master", [], |row| row.get::<_, i64>(0))
        .map(|_| ())
        .map_err(|err| open_error(&err))
}

fn open_error(err: &rusqlite::Error) -> CoreError {
    CoreError::Io(std::io::Error::new(
        std::io::ErrorKind::Other,
        format!("embedded database unavailable: {err}"),
    ))
}

fn table(collection: Collection) -> &'static str {
    collection.as_str()
}

fn storage_error(collection: Collection, err: rusqlite::Error) -> CoreError {
    CoreError::storage(collection, err.to_string())
}

fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(failure, _) if failure.code == ErrorCode::ConstraintViolation
    )
}

fn decode(collection: Collection, raw: &str) -> Result<Value> {
    serde_json::from_str(raw)
        .map_err(|err| CoreError::storage(collection, format!("corrupt row: {err}")))
}

/// Values for the indexed transaction columns.
fn transaction_columns(record: &Value) -> (Option<String>, Option<String>, Option<String>) {
    let text = |field: &str| record.get(field).and_then(Value::as_str).map(str::to_owned);
    (text("date"), text("category"), text("type"))
}

fn write(
    conn: &Connection,
    collection: Collection,
    key: &str,
    record: &Value,
    replace: bool,
) -> Result<()> {
    let verb = if replace { "INSERT OR REPLACE" } else { "INSERT" };
    let data = serde_json::to_string(record)?;
    let result = match collection {
        Collection::Transactions => {
            let (date, category, kind) = transaction_columns(record);
            conn.execute(
                &format!(
                    "{verb} INTO transactions(id, date, category, type, data) VALUES (?1, ?2, ?3, ?4, ?5)"
                ),
                params![key, date, category, kind, data],
            )
        }
        other => conn.execute(
            &format!(
                "{verb} INTO {}({}, data) VALUES (?1, ?2)",
                table(other),
                other.key_field()
            ),
            params![key, data],
        ),
    };
    match result {
        Ok(_) => Ok(()),
        Err(err) if !replace && is_constraint_violation(&err) => Err(CoreError::DuplicateKey {
            collection,
            key: key.to_string(),
        }),
        Err(err) => Err(storage_error(collection, err)),
    }
}

fn select_data(
    conn: &Connection,
    collection: Collection,
    sql: &str,
    params: impl rusqlite::Params,
) -> Result<Vec<Value>> {
    let mut stmt = conn
        .prepare(sql)
        .map_err(|err| storage_error(collection, err))?;
    let rows = stmt
        .query_map(params, |row| row.get::<_, String>(0))
        .map_err(|err| storage_error(collection, err))?;
    let mut records = Vec::new();
    for row in rows {
        let raw = row.map_err(|err| storage_error(collection, err))?;
        records.push(decode(collection, &raw)?);
    }
    Ok(records)
}

#[async_trait]
impl LocalStore for SqliteStore {
    fn backend(&self) -> StoreBackend {
        StoreBackend::Embedded
    }

    async fn init(&self) -> Result<()> {
        let conn = self
            .conn
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let version: i64 = conn
            .query_row("PRAGMA user_version", [], |row| row.get(0))
            .map_err(|err| storage_error(Collection::Transactions, err))?;
        conn.execute_batch(SCHEMA)
            .map_err(|err| storage_error(Collection::Transactions, err))?;
        if version < SCHEMA_VERSION {
            conn.execute_batch(&format!("PRAGMA user_version = {SCHEMA_VERSION};"))
                .map_err(|err| storage_error(Collection::Transactions, err))?;
            info!(from = version, to = SCHEMA_VERSION, "embedded schema upgraded");
        }
        self.ready.store(true, Ordering::SeqCst);
        debug!(path = ?self.path, "embedded store ready");
        Ok(())
    }

    async fn get(&self, collection: Collection, key: &str) -> Result<Option<Value>> {
        let conn = self.connection(collection)?;
        let raw: Option<String> = conn
            .query_row(
                &format!(
                    "SELECT data FROM {} WHERE {} = ?1",
                    table(collection),
                    collection.key_field()
                ),
                params![key],
                |row| row.get(0),
            )
            .optional()
            .map_err(|err| storage_error(collection, err))?;
        raw.map(|raw| decode(collection, &raw)).transpose()
    }

    async fn get_all(&self, collection: Collection) -> Result<Vec<Value>> {
        let conn = self.connection(collection)?;
        select_data(
            &conn,
            collection,
            &format!(
                "SELECT data FROM {} ORDER BY {}",
                table(collection),
                collection.key_field()
            ),
            [],
        )
    }

    async fn add(&self, collection: Collection, record: Value) -> Result<()> {
        let key = collection.record_key(&record)?;
        let conn = self.connection(collection)?;
        write(&conn, collection, &key, &record, false)
    }

    async fn put(&self, collection: Collection, record: Value) -> Result<()> {
        let key = collection.record_key(&record)?;
        let conn = self.connection(collection)?;
        write(&conn, collection, &key, &record, true)
    }

    async fn delete(&self, collection: Collection, key: &str) -> Result<()> {
        let conn = self.connection(collection)?;
        conn.execute(
            &format!(
                "DELETE FROM {} WHERE {} = ?1",
                table(collection),
                collection.key_field()
            ),
            params![key],
        )
        .map_err(|err| storage_error(collection, err))?;
        Ok(())
    }

    async fn clear(&self, collection: Collection) -> Result<()> {
        let conn = self.connection(collection)?;
        conn.execute(&format!("DELETE FROM {}", table(collection)), [])
            .map_err(|err| storage_error(collection, err))?;
        Ok(())
    }

    async fn query_transactions(&self, filter: &TransactionFilter) -> Result<Vec<Value>> {
        let collection = Collection::Transactions;
        let conn = self.connection(collection)?;
        let from = filter.from.map(|date| date.format("%Y-%m-%d").to_string());
        let to = filter.to.map(|date| date.format("%Y-%m-%d").to_string());
        let kind = filter.kind.map(|kind| kind.as_str());
        select_data(
            &conn,
            collection,
            "SELECT data FROM transactions
             WHERE (?1 IS NULL OR date >= ?1)
               AND (?2 IS NULL OR date <= ?2)
               AND (?3 IS NULL OR category = ?3)
               AND (?4 IS NULL OR type = ?4)
             ORDER BY date, id",
            params![from, to, filter.category, kind],
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn init_stamps_the_schema_version() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.init().await.unwrap();
        store.init().await.unwrap();
        let conn = store.conn.lock().unwrap();
        let version: i64 = conn
            .query_row("PRAGMA user_version", [], |row| row.get(0))
            .unwrap();
        assert_eq!(version, SCHEMA_VERSION);
    }

    #[tokio::test]
    async fn indexed_columns_follow_puts() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.init().await.unwrap();
        store
            .put(
                Collection::Transactions,
                json!({ "id": "t1", "date": "2024-01-01", "category": "food", "type": "expense" }),
            )
            .await
            .unwrap();
        store
            .put(
                Collection::Transactions,
                json!({ "id": "t1", "date": "2024-02-01", "category": "bills", "type": "expense" }),
            )
            .await
            .unwrap();

        let conn = store.conn.lock().unwrap();
        let (date, category): (String, String) = conn
            .query_row(
                "SELECT date, category FROM transactions WHERE id = 't1'",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .unwrap();
        assert_eq!(date, "2024-02-01");
        assert_eq!(category, "bills");
    }
}

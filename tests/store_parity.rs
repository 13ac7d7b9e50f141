//! Both local backends must be interchangeable: every case below runs against
//! the embedded database and the blob store.

mod common;

use std::sync::Arc;

use common::{date, temp_config};
use purse::{open_local_store, BackendChoice};
use purse_core::{Collection, CoreError, LocalStore, StoreBackend, TransactionFilter};
use purse_domain::TransactionKind;
use serde_json::{json, Value};

async fn ready_store(backend: BackendChoice) -> Arc<dyn LocalStore> {
    let store = unready_store(backend);
    store.init().await.expect("init store");
    store
}

fn unready_store(backend: BackendChoice) -> Arc<dyn LocalStore> {
    open_local_store(&temp_config(backend))
        .expect("open local store")
        .local
}

fn ids(records: &[Value]) -> Vec<&str> {
    records
        .iter()
        .filter_map(|record| record.get("id").and_then(Value::as_str))
        .collect()
}

fn tx(id: &str, on: &str, category: &str, kind: &str) -> Value {
    json!({
        "id": id,
        "amount": 10,
        "type": kind,
        "category": category,
        "date": on,
        "timestamp": "2024-01-01T00:00:00Z"
    })
}

async fn add_rejects_existing_key(store: Arc<dyn LocalStore>) {
    store
        .add(Collection::Categories, json!({"id": "food", "name": "Food"}))
        .await
        .expect("first add");
    let err = store
        .add(Collection::Categories, json!({"id": "food", "name": "Again"}))
        .await
        .expect_err("duplicate add");
    assert!(matches!(err, CoreError::DuplicateKey { ref key, .. } if key == "food"));

    let kept = store
        .get(Collection::Categories, "food")
        .await
        .expect("get")
        .expect("record present");
    assert_eq!(kept["name"], "Food");
}

async fn put_upserts(store: Arc<dyn LocalStore>) {
    store
        .put(Collection::Budgets, json!({"id": "b1", "amount": 100}))
        .await
        .expect("insert");
    store
        .put(Collection::Budgets, json!({"id": "b1", "amount": 250}))
        .await
        .expect("replace");

    let all = store.get_all(Collection::Budgets).await.expect("get_all");
    assert_eq!(all.len(), 1);
    assert_eq!(all[0]["amount"], 250);
}

async fn get_all_is_key_ordered(store: Arc<dyn LocalStore>) {
    for id in ["c", "a", "b"] {
        store
            .add(Collection::Receipts, json!({"id": id, "image": "AAAA"}))
            .await
            .expect("add receipt");
    }
    let all = store.get_all(Collection::Receipts).await.expect("get_all");
    assert_eq!(ids(&all), vec!["a", "b", "c"]);
}

async fn delete_and_clear(store: Arc<dyn LocalStore>) {
    store
        .add(Collection::Transactions, tx("t1", "2024-01-05", "food", "expense"))
        .await
        .expect("add");
    store
        .delete(Collection::Transactions, "missing")
        .await
        .expect("deleting a missing key is fine");
    store
        .delete(Collection::Transactions, "t1")
        .await
        .expect("delete");
    assert!(store
        .get(Collection::Transactions, "t1")
        .await
        .expect("get")
        .is_none());

    store
        .add(Collection::Transactions, tx("t2", "2024-01-06", "food", "expense"))
        .await
        .expect("add");
    store
        .put(Collection::Settings, json!({"key": "main", "currency": "USD"}))
        .await
        .expect("settings");
    store.clear(Collection::Transactions).await.expect("clear");

    assert!(store
        .get_all(Collection::Transactions)
        .await
        .expect("get_all")
        .is_empty());
    assert!(store
        .get(Collection::Settings, "main")
        .await
        .expect("get settings")
        .is_some());
}

async fn records_need_their_key(store: Arc<dyn LocalStore>) {
    let err = store
        .add(Collection::Settings, json!({"id": "main"}))
        .await
        .expect_err("settings are keyed by `key`");
    assert!(matches!(
        err,
        CoreError::MissingKey {
            collection: Collection::Settings,
            field: "key"
        }
    ));
}

async fn query_filters_and_orders(store: Arc<dyn LocalStore>) {
    for record in [
        tx("t3", "2024-02-01", "food", "expense"),
        tx("t1", "2024-01-10", "food", "expense"),
        tx("t2", "2024-01-10", "rent", "expense"),
        tx("t0", "2024-01-31", "salary", "income"),
        tx("t4", "2023-12-31", "food", "expense"),
    ] {
        store
            .add(Collection::Transactions, record)
            .await
            .expect("add transaction");
    }

    let january = TransactionFilter::between(date(2024, 1, 1), date(2024, 1, 31));
    let found = store.query_transactions(&january).await.expect("query");
    assert_eq!(ids(&found), vec!["t1", "t2", "t0"]);

    let food = january.clone().with_category("food");
    let found = store.query_transactions(&food).await.expect("query");
    assert_eq!(ids(&found), vec!["t1"]);

    let income = TransactionFilter::default().with_kind(TransactionKind::Income);
    let found = store.query_transactions(&income).await.expect("query");
    assert_eq!(ids(&found), vec!["t0"]);
}

macro_rules! parity_tests {
    ($($name:ident => $body:ident),* $(,)?) => {
        mod embedded {
            use super::*;
            $(
                #[tokio::test]
                async fn $name() {
                    let store = ready_store(BackendChoice::Embedded).await;
                    assert_eq!(store.backend(), StoreBackend::Embedded);
                    super::$body(store).await;
                }
            )*
        }

        mod blob {
            use super::*;
            $(
                #[tokio::test]
                async fn $name() {
                    let store = ready_store(BackendChoice::Blob).await;
                    assert_eq!(store.backend(), StoreBackend::Blob);
                    super::$body(store).await;
                }
            )*
        }
    };
}

parity_tests! {
    add_rejects_existing_key => add_rejects_existing_key,
    put_upserts => put_upserts,
    get_all_is_key_ordered => get_all_is_key_ordered,
    delete_and_clear => delete_and_clear,
    records_need_their_key => records_need_their_key,
    query_filters_and_orders => query_filters_and_orders,
}

#[tokio::test]
async fn every_backend_refuses_calls_before_init() {
    for backend in [BackendChoice::Embedded, BackendChoice::Blob] {
        let store = unready_store(backend);
        let err = store
            .get_all(Collection::Transactions)
            .await
            .expect_err("store not initialized");
        assert!(matches!(
            err,
            CoreError::StoreNotInitialized {
                collection: Collection::Transactions
            }
        ));
    }
}

#[tokio::test]
async fn auto_prefers_the_embedded_database() {
    let store = ready_store(BackendChoice::Auto).await;
    assert_eq!(store.backend(), StoreBackend::Embedded);
}

#[tokio::test]
async fn auto_falls_back_to_the_blob_store() {
    let mut config = temp_config(BackendChoice::Auto);
    let data_dir = config.resolve_data_dir();
    // The database would live under a plain file, so it cannot be created.
    std::fs::create_dir_all(&data_dir).expect("create data dir");
    std::fs::write(data_dir.join("blocked"), b"not a directory").expect("create blocker");
    config.storage.database_file = "blocked/purse.sqlite3".into();

    let stores = open_local_store(&config).expect("open local store");
    assert_eq!(stores.local.backend(), StoreBackend::Blob);

    let explicit = {
        config.storage.backend = BackendChoice::Embedded;
        open_local_store(&config)
    };
    assert!(explicit.is_err());
}

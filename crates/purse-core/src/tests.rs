use std::{
    collections::{BTreeMap, HashMap},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
};

use async_trait::async_trait;
use chrono::NaiveDate;
use purse_domain::{
    Frequency, Identity, LocalTransaction, RecurringStatus, Transaction, TransactionDraft,
    TransactionKind,
};
use rust_decimal_macros::dec;
use serde_json::{json, Value};

use crate::{
    CoreError, FixedClock, KeyValueStore, LocalStore, LocalStoreExt, MemoryRemoteStore,
    MigrationOutcome, MigrationService, Purse, PurseOptions, RecurrenceService, RemotePath,
    RestoreOutcome, RestoreService, Session, SkipReason, StoreBackend, SyncService,
    TransactionService, Collection, NoticeLevel,
};

/// Minimal embedded-like store used to exercise services in isolation.
#[derive(Default)]
struct TableStore {
    ready: AtomicBool,
    rows: Mutex<BTreeMap<(Collection, String), Value>>,
}

impl TableStore {
    fn ready() -> Arc<Self> {
        let store = Self::default();
        store.ready.store(true, Ordering::SeqCst);
        Arc::new(store)
    }

    fn check(&self, collection: Collection) -> crate::Result<()> {
        if self.ready.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(CoreError::StoreNotInitialized { collection })
        }
    }
}

#[async_trait]
impl LocalStore for TableStore {
    fn backend(&self) -> StoreBackend {
        StoreBackend::Embedded
    }

    async fn init(&self) -> crate::Result<()> {
        self.ready.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn get(&self, collection: Collection, key: &str) -> crate::Result<Option<Value>> {
        self.check(collection)?;
        let rows = self.rows.lock().unwrap();
        Ok(rows.get(&(collection, key.to_string())).cloned())
    }

    async fn get_all(&self, collection: Collection) -> crate::Result<Vec<Value>> {
        self.check(collection)?;
        let rows = self.rows.lock().unwrap();
        Ok(rows
            .iter()
            .filter(|((c, _), _)| *c == collection)
            .map(|(_, v)| v.clone())
            .collect())
    }

    async fn add(&self, collection: Collection, record: Value) -> crate::Result<()> {
        self.check(collection)?;
        let key = collection.record_key(&record)?;
        let mut rows = self.rows.lock().unwrap();
        if rows.contains_key(&(collection, key.clone())) {
            return Err(CoreError::DuplicateKey { collection, key });
        }
        rows.insert((collection, key), record);
        Ok(())
    }

    async fn put(&self, collection: Collection, record: Value) -> crate::Result<()> {
        self.check(collection)?;
        let key = collection.record_key(&record)?;
        self.rows.lock().unwrap().insert((collection, key), record);
        Ok(())
    }

    async fn delete(&self, collection: Collection, key: &str) -> crate::Result<()> {
        self.check(collection)?;
        self.rows.lock().unwrap().remove(&(collection, key.to_string()));
        Ok(())
    }

    async fn clear(&self, collection: Collection) -> crate::Result<()> {
        self.check(collection)?;
        self.rows.lock().unwrap().retain(|(c, _), _| *c != collection);
        Ok(())
    }
}

#[derive(Default)]
struct MapKeyValue(Mutex<HashMap<String, String>>);

impl KeyValueStore for MapKeyValue {
    fn get_item(&self, key: &str) -> crate::Result<Option<String>> {
        Ok(self.0.lock().unwrap().get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> crate::Result<()> {
        self.0.lock().unwrap().insert(key.into(), value.into());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> crate::Result<()> {
        self.0.lock().unwrap().remove(key);
        Ok(())
    }
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn expense(id: &str, on: NaiveDate) -> Transaction {
    let draft = TransactionDraft::new(dec!(50), TransactionKind::Expense, "food", on).with_id(id);
    TransactionService::build(draft, None, on.and_hms_opt(9, 0, 0).unwrap().and_utc()).unwrap()
}

fn alice() -> Identity {
    Identity::new("alice")
}

#[tokio::test]
async fn guest_saves_stay_local_without_pending_flag() {
    let local = TableStore::ready();
    let remote = Arc::new(MemoryRemoteStore::new());
    let sync = SyncService::new(local.clone(), remote.clone());

    let outcome = sync
        .save(&Session::guest(true), expense("t1", date(2024, 1, 5)))
        .await
        .unwrap();

    assert!(!outcome.transaction.needs_sync);
    assert!(remote.write_log().is_empty());
    let stored = local.get(Collection::Transactions, "t1").await.unwrap().unwrap();
    assert!(stored.get("needsSync").is_none());
}

#[tokio::test]
async fn failed_remote_write_keeps_the_record_pending_until_reconciled() {
    let local = TableStore::ready();
    let remote = Arc::new(MemoryRemoteStore::new());
    let sync = SyncService::new(local.clone(), remote.clone());
    let session = Session::signed_in(alice(), true);
    let path = RemotePath::transaction("alice", "t1");
    remote.fail_writes_to(&path);

    let outcome = sync
        .save(&session, expense("t1", date(2024, 1, 5)))
        .await
        .unwrap();
    assert!(outcome.transaction.needs_sync);
    assert_eq!(outcome.notice.unwrap().level, NoticeLevel::Warning);

    remote.clear_failures();
    remote.clear_write_log();
    let report = sync.sync_offline_transactions(&session).await.unwrap();
    assert_eq!(report.synced, vec!["t1".to_string()]);
    assert_eq!(remote.write_log(), vec![path.clone()]);
    assert!(remote.snapshot(&path).unwrap().get("needsSync").is_none());

    let again = sync.sync_offline_transactions(&session).await.unwrap();
    assert_eq!(again.attempted, 0);
    assert_eq!(remote.write_log().len(), 1);
}

#[tokio::test]
async fn offline_saves_make_no_remote_attempt() {
    let local = TableStore::ready();
    let remote = Arc::new(MemoryRemoteStore::new());
    let sync = SyncService::new(local, remote.clone());
    let session = Session::signed_in(alice(), false);

    let outcome = sync
        .save(&session, expense("t1", date(2024, 1, 5)))
        .await
        .unwrap();
    assert!(outcome.transaction.needs_sync);
    assert!(remote.write_log().is_empty());

    let report = sync.sync_offline_transactions(&session).await.unwrap();
    assert_eq!(report.skipped, Some(SkipReason::Offline));
}

#[tokio::test]
async fn restore_replaces_local_transactions_with_the_remote_set() {
    let local = TableStore::ready();
    let remote = Arc::new(MemoryRemoteStore::new());
    let restore = RestoreService::new(local.clone(), remote.clone());
    let session = Session::signed_in(alice(), true);

    local
        .put_record(&LocalTransaction::pending(expense("local-only", date(2024, 1, 1))))
        .await
        .unwrap();
    remote.seed(
        &RemotePath::transaction("alice", "r1"),
        serde_json::to_value(expense("r1", date(2024, 2, 1))).unwrap(),
    );

    let outcome = restore.restore_transactions(&session).await.unwrap();
    assert_eq!(outcome, RestoreOutcome::Restored { count: 1 });
    let ids: Vec<String> = local
        .all_records::<LocalTransaction>()
        .await
        .unwrap()
        .into_iter()
        .map(|record| record.transaction.details().id.clone())
        .collect();
    assert_eq!(ids, vec!["r1".to_string()]);
}

#[tokio::test]
async fn restore_skips_offline_and_keeps_local_data_on_bad_payload() {
    let local = TableStore::ready();
    let remote = Arc::new(MemoryRemoteStore::new());
    let restore = RestoreService::new(local.clone(), remote.clone());
    local
        .put_record(&LocalTransaction::synced(expense("keep", date(2024, 1, 1))))
        .await
        .unwrap();

    let offline = restore
        .restore_transactions(&Session::signed_in(alice(), false))
        .await
        .unwrap();
    let RestoreOutcome::Skipped { notice: Some(notice) } = &offline else {
        panic!("expected an offline skip, got {offline:?}");
    };
    assert_eq!(notice.message, "Offline mode: Using local data.");

    remote.seed(&RemotePath::transaction("alice", "bad"), json!({ "id": "bad" }));
    let err = restore
        .restore_transactions(&Session::signed_in(alice(), true))
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::RemoteRestoreFailed(_)));
    assert!(local.get(Collection::Transactions, "keep").await.unwrap().is_some());
}

#[tokio::test]
async fn recurring_generation_is_idempotent_per_day() {
    let local = TableStore::ready();
    let draft = TransactionDraft::new(dec!(950), TransactionKind::Expense, "bills", date(2024, 1, 31))
        .with_id("rent")
        .with_frequency(Frequency::Monthly);
    let template = TransactionService::build(draft, None, chrono::Utc::now()).unwrap();
    local
        .put_record(&LocalTransaction::synced(template))
        .await
        .unwrap();

    let recurrence = RecurrenceService::new(local.clone());
    let today = date(2024, 4, 15);
    let now = today.and_hms_opt(8, 0, 0).unwrap().and_utc();

    let first = recurrence.process_due(today, now, false).await.unwrap();
    let dates: Vec<NaiveDate> = first
        .created
        .iter()
        .map(|record| record.transaction.details().date)
        .collect();
    assert_eq!(dates, vec![date(2024, 2, 29), date(2024, 3, 31)]);

    let template = local
        .get_record::<LocalTransaction>("rent")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        template.transaction.template().unwrap().next_due_date,
        Some(date(2024, 4, 30))
    );

    let second = recurrence.process_due(today, now, false).await.unwrap();
    assert!(second.created.is_empty());
    assert_eq!(local.get_all(Collection::Transactions).await.unwrap().len(), 3);
}

#[tokio::test]
async fn paused_templates_generate_nothing() {
    let local = TableStore::ready();
    let draft = TransactionDraft::new(dec!(9.99), TransactionKind::Expense, "entertainment", date(2024, 1, 1))
        .with_id("stream")
        .with_frequency(Frequency::Weekly);
    let template = TransactionService::build(draft, None, chrono::Utc::now()).unwrap();
    let paused = RecurrenceService::set_status(template, RecurringStatus::Paused).unwrap();
    local.put_record(&LocalTransaction::synced(paused)).await.unwrap();

    let run = RecurrenceService::new(local)
        .process_due(date(2024, 3, 1), chrono::Utc::now(), false)
        .await
        .unwrap();
    assert!(run.created.is_empty());
}

#[tokio::test]
async fn migration_moves_the_legacy_document_and_removes_the_key() {
    let local = TableStore::ready();
    let kv = Arc::new(MapKeyValue::default());
    kv.set_item(
        "budgetTrackerData",
        &json!({
            "transactions": [
                { "id": "t1", "amount": 10, "type": "expense", "category": "food", "date": "2023-12-01" }
            ],
            "categories": [
                { "id": "food", "name": "Food", "icon": "🍕", "color": "#FF6B6B", "type": "expense" }
            ],
            "budgets": [],
            "settings": { "theme": "dark" }
        })
        .to_string(),
    )
    .unwrap();

    let migration = MigrationService::new(local.clone(), kv.clone(), "budgetTrackerData");
    let outcome = migration.run().await;
    assert_eq!(
        outcome,
        MigrationOutcome::Migrated {
            transactions: 1,
            categories: 1,
            budgets: 0
        }
    );
    assert!(kv.get_item("budgetTrackerData").unwrap().is_none());
    assert_eq!(
        local.get(Collection::Settings, "main").await.unwrap().unwrap()["theme"],
        "dark"
    );

    assert_eq!(migration.run().await, MigrationOutcome::NothingToMigrate);
}

#[tokio::test]
async fn migration_retry_after_partial_insert_keeps_the_legacy_key() {
    let local = TableStore::ready();
    let kv = Arc::new(MapKeyValue::default());
    kv.set_item(
        "budgetTrackerData",
        r#"{"transactions": [{"id": "t1", "amount": 10, "type": "expense", "category": "food", "date": "2023-12-01"}], "categories": [], "budgets": []}"#,
    )
    .unwrap();
    local
        .put(
            Collection::Transactions,
            json!({ "id": "t1", "amount": 10, "type": "expense", "category": "food", "date": "2023-12-01" }),
        )
        .await
        .unwrap();

    let outcome = MigrationService::new(local, kv.clone(), "budgetTrackerData")
        .run()
        .await;
    let MigrationOutcome::Failed { reason } = &outcome else {
        panic!("expected failure, got {outcome:?}");
    };
    assert!(reason.contains("already exists"));
    assert!(kv.get_item("budgetTrackerData").unwrap().is_some());
}

#[tokio::test]
async fn operations_before_init_fail_with_store_not_initialized() {
    let local = Arc::new(TableStore::default());
    let err = local.get_all(Collection::Budgets).await.unwrap_err();
    assert!(matches!(
        err,
        CoreError::StoreNotInitialized {
            collection: Collection::Budgets
        }
    ));
}

#[tokio::test]
async fn deleting_a_referenced_category_is_refused() {
    let local = TableStore::ready();
    let mut purse = Purse::new(
        local.clone(),
        Arc::new(MemoryRemoteStore::new()),
        Arc::new(MapKeyValue::default()),
        Arc::new(FixedClock::on(date(2024, 1, 10))),
        PurseOptions::default(),
        Session::guest(true),
    );
    purse.start().await.unwrap();
    assert_eq!(purse.state().categories.len(), 7);

    purse
        .save_transaction(TransactionDraft::new(dec!(4), TransactionKind::Expense, "food", date(2024, 1, 9)))
        .await
        .unwrap();
    purse
        .save_budget(purse_domain::Budget::new("transport", dec!(100), Default::default()))
        .await
        .unwrap();

    let err = purse.delete_category("food").await.unwrap_err();
    assert!(matches!(err, CoreError::CategoryInUse(id) if id == "food"));

    let removed = purse.delete_category("transport").await.unwrap();
    assert_eq!(removed.len(), 1);
    assert!(purse.state().budgets.is_empty());
    assert!(purse.state().category("transport").is_none());
}

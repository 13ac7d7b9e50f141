#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use purse::{open_local_store, BackendChoice, Config, LocalStores};
use purse_core::{FixedClock, MemoryRemoteStore, Purse, PurseOptions, Session};
use purse_domain::{TransactionDraft, TransactionKind};
use rust_decimal_macros::dec;
use tempfile::TempDir;

/// Holds TempDir guards so temporary folders live for the duration of the test run.
static TEST_DIRS: Lazy<Mutex<Vec<TempDir>>> = Lazy::new(|| Mutex::new(Vec::new()));

/// Config rooted in a fresh temporary directory.
pub fn temp_config(backend: BackendChoice) -> Config {
    let temp = TempDir::new().expect("create temp dir");
    let mut config = Config::default();
    config.data_dir = Some(temp.path().to_path_buf());
    config.storage.backend = backend;
    TEST_DIRS.lock().expect("lock temp dir registry").push(temp);
    config
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

pub fn expense(id: &str, category: &str, on: NaiveDate) -> TransactionDraft {
    TransactionDraft::new(dec!(50), TransactionKind::Expense, category, on).with_id(id)
}

/// A purse, its stores and the in-memory remote it talks to.
pub struct Harness {
    pub purse: Purse,
    pub stores: LocalStores,
    pub remote: Arc<MemoryRemoteStore>,
}

pub fn harness(config: &Config, session: Session, today: NaiveDate) -> Harness {
    let stores = open_local_store(config).expect("open local store");
    let remote = Arc::new(MemoryRemoteStore::new());
    let purse = Purse::new(
        stores.local.clone(),
        remote.clone(),
        stores.key_value.clone(),
        Arc::new(FixedClock::on(today)),
        PurseOptions {
            legacy_key: config.storage.legacy_key.clone(),
            fallback_key: config.storage.fallback_key.clone(),
        },
        session,
    );
    Harness {
        purse,
        stores,
        remote,
    }
}

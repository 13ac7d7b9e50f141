//! One-shot migration of the legacy single-document store into the embedded
//! backend.

use std::sync::Arc;

use futures::future::try_join_all;
use purse_domain::{Budget, Category, LocalTransaction, Settings};
use serde::Deserialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::{
    error::{CoreError, Result},
    session::Notice,
    store::{encode_record, Collection, KeyValueStore, LocalStore, StoreBackend},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MigrationOutcome {
    /// The blob backend keeps using the key-value store; nothing to move.
    NotApplicable,
    NothingToMigrate,
    Migrated {
        transactions: usize,
        categories: usize,
        budgets: usize,
    },
    /// The legacy document is kept so the user can export it by hand.
    Failed { reason: String },
}

impl MigrationOutcome {
    pub fn notice(&self) -> Option<Notice> {
        match self {
            Self::Migrated { .. } => Some(Notice::success("Data migration successful!")),
            Self::Failed { .. } => Some(Notice::error(
                "Could not migrate old data. Please export it and import it manually.",
            )),
            Self::NotApplicable | Self::NothingToMigrate => None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct LegacyDocument {
    #[serde(default)]
    transactions: Vec<Value>,
    #[serde(default)]
    categories: Vec<Value>,
    #[serde(default)]
    budgets: Vec<Value>,
    #[serde(default)]
    settings: Value,
}

/// Typed and re-encoded legacy records, ready to insert.
struct LegacyBatch {
    records: Vec<(Collection, Value)>,
    settings: Value,
    transactions: usize,
    categories: usize,
    budgets: usize,
}

pub struct MigrationService {
    local: Arc<dyn LocalStore>,
    legacy: Arc<dyn KeyValueStore>,
    legacy_key: String,
}

impl MigrationService {
    pub fn new(
        local: Arc<dyn LocalStore>,
        legacy: Arc<dyn KeyValueStore>,
        legacy_key: impl Into<String>,
    ) -> Self {
        Self {
            local,
            legacy,
            legacy_key: legacy_key.into(),
        }
    }

    /// Moves the legacy document into the embedded store. Never fatal: any
    /// failure is reported in the outcome and the legacy key is left in place.
    pub async fn run(&self) -> MigrationOutcome {
        if self.local.backend() != StoreBackend::Embedded {
            return MigrationOutcome::NotApplicable;
        }
        match self.migrate().await {
            Ok(Some(outcome)) => outcome,
            Ok(None) => MigrationOutcome::NothingToMigrate,
            Err(err) => {
                warn!(key = %self.legacy_key, error = %err, "legacy migration failed");
                MigrationOutcome::Failed {
                    reason: err.to_string(),
                }
            }
        }
    }

    async fn migrate(&self) -> Result<Option<MigrationOutcome>> {
        let Some(raw) = self.legacy.get_item(&self.legacy_key)? else {
            return Ok(None);
        };
        info!(key = %self.legacy_key, "migrating legacy data");

        let batch = decode_legacy(&raw)?;
        let adds = batch
            .records
            .iter()
            .map(|(collection, record)| self.local.add(*collection, record.clone()));
        futures::try_join!(
            try_join_all(adds),
            self.local.put(Collection::Settings, batch.settings.clone())
        )?;

        self.legacy.remove_item(&self.legacy_key)?;
        info!(
            transactions = batch.transactions,
            categories = batch.categories,
            budgets = batch.budgets,
            "legacy data migrated"
        );
        Ok(Some(MigrationOutcome::Migrated {
            transactions: batch.transactions,
            categories: batch.categories,
            budgets: batch.budgets,
        }))
    }
}

/// Decodes and validates the whole document before anything is written.
fn decode_legacy(raw: &str) -> Result<LegacyBatch> {
    let document: LegacyDocument = serde_json::from_str(raw)
        .map_err(|err| CoreError::MigrationFailed(format!("unreadable legacy document: {err}")))?;

    let mut records = Vec::new();
    for value in document.transactions.iter() {
        let record: LocalTransaction = serde_json::from_value(value.clone())
            .map_err(|err| CoreError::MigrationFailed(format!("legacy transaction: {err}")))?;
        records.push((Collection::Transactions, encode_record(&record)?));
    }
    for value in document.categories.iter() {
        let record: Category = serde_json::from_value(value.clone())
            .map_err(|err| CoreError::MigrationFailed(format!("legacy category: {err}")))?;
        records.push((Collection::Categories, encode_record(&record)?));
    }
    for value in document.budgets.iter() {
        let record: Budget = serde_json::from_value(value.clone())
            .map_err(|err| CoreError::MigrationFailed(format!("legacy budget: {err}")))?;
        records.push((Collection::Budgets, encode_record(&record)?));
    }
    let settings = Settings::from_partial(document.settings)
        .map_err(|err| CoreError::MigrationFailed(format!("legacy settings: {err}")))?;

    Ok(LegacyBatch {
        records,
        settings: encode_record(&settings)?,
        transactions: document.transactions.len(),
        categories: document.categories.len(),
        budgets: document.budgets.len(),
    })
}

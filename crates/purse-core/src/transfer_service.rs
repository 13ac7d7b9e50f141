//! JSON export envelope and replace-all import.

use std::{collections::HashSet, sync::Arc};

use chrono::{DateTime, Utc};
use futures::future::try_join_all;
use purse_domain::{Budget, Category, Identifiable, LocalTransaction, Settings, Transaction};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use crate::{
    error::{CoreError, Result},
    store::{Collection, LocalStore, LocalStoreExt},
};

pub const EXPORT_VERSION: &str = "1.5.0";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportEnvelope {
    pub export_date: DateTime<Utc>,
    pub version: String,
    pub data: ExportData,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportData {
    pub transactions: Vec<Transaction>,
    pub categories: Vec<Category>,
    pub budgets: Vec<Budget>,
    pub settings: Settings,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportSummary {
    pub transactions: usize,
    pub categories: usize,
    pub budgets: usize,
}

pub struct TransferService {
    local: Arc<dyn LocalStore>,
}

impl TransferService {
    pub fn new(local: Arc<dyn LocalStore>) -> Self {
        Self { local }
    }

    pub async fn export(&self, now: DateTime<Utc>) -> Result<ExportEnvelope> {
        let (transactions, categories, budgets, settings) = futures::try_join!(
            self.local.all_records::<LocalTransaction>(),
            self.local.all_records::<Category>(),
            self.local.all_records::<Budget>(),
            self.local.get_record::<Settings>(Settings::KEY),
        )?;
        Ok(ExportEnvelope {
            export_date: now,
            version: EXPORT_VERSION.to_string(),
            data: ExportData {
                transactions: transactions.into_iter().map(|t| t.transaction).collect(),
                categories,
                budgets,
                settings: settings.unwrap_or_default(),
            },
        })
    }

    pub async fn export_json(&self, now: DateTime<Utc>) -> Result<String> {
        let envelope = self.export(now).await?;
        Ok(serde_json::to_string_pretty(&envelope)?)
    }

    /// Replaces transactions, categories and budgets with the payload and puts
    /// its settings. The whole payload is validated first; a rejected payload
    /// leaves the store untouched.
    pub async fn import_json(&self, raw: &str, mark_pending: bool) -> Result<ImportSummary> {
        let payload = parse_import(raw)?;

        let transactions: Vec<LocalTransaction> = payload
            .transactions
            .into_iter()
            .map(|transaction| LocalTransaction {
                transaction,
                needs_sync: mark_pending,
            })
            .collect();

        futures::try_join!(
            self.local.clear(Collection::Transactions),
            self.local.clear(Collection::Categories),
            self.local.clear(Collection::Budgets),
        )?;
        futures::try_join!(
            try_join_all(transactions.iter().map(|t| self.local.add_record(t))),
            try_join_all(payload.categories.iter().map(|c| self.local.add_record(c))),
            try_join_all(payload.budgets.iter().map(|b| self.local.add_record(b))),
            self.local.put_record(&payload.settings),
        )?;

        let summary = ImportSummary {
            transactions: transactions.len(),
            categories: payload.categories.len(),
            budgets: payload.budgets.len(),
        };
        info!(?summary, "import applied");
        Ok(summary)
    }
}

struct ImportPayload {
    transactions: Vec<Transaction>,
    categories: Vec<Category>,
    budgets: Vec<Budget>,
    settings: Settings,
}

fn parse_import(raw: &str) -> Result<ImportPayload> {
    let document: Value = serde_json::from_str(raw)
        .map_err(|err| CoreError::InvalidImport(format!("not a JSON document: {err}")))?;
    let data = document
        .get("data")
        .ok_or_else(|| CoreError::InvalidImport("missing `data`".into()))?;

    let transactions: Vec<Transaction> = required_array(data, "transactions")?;
    let categories: Vec<Category> = required_array(data, "categories")?;
    let budgets: Vec<Budget> = match data.get("budgets") {
        None | Some(Value::Null) => Vec::new(),
        Some(_) => required_array(data, "budgets")?,
    };
    let settings = Settings::from_partial(data.get("settings").cloned().unwrap_or(Value::Null))
        .map_err(|err| CoreError::InvalidImport(format!("invalid `settings`: {err}")))?;

    unique_ids("transactions", transactions.iter().map(|record| record.id()))?;
    unique_ids("categories", categories.iter().map(|record| record.id()))?;
    unique_ids("budgets", budgets.iter().map(|record| record.id()))?;

    Ok(ImportPayload {
        transactions,
        categories,
        budgets,
        settings,
    })
}

fn required_array<T: serde::de::DeserializeOwned>(data: &Value, field: &str) -> Result<Vec<T>> {
    let value = data
        .get(field)
        .filter(|value| value.is_array())
        .ok_or_else(|| CoreError::InvalidImport(format!("missing `data.{field}` array")))?;
    serde_json::from_value(value.clone())
        .map_err(|err| CoreError::InvalidImport(format!("invalid `{field}`: {err}")))
}

fn unique_ids<'a>(field: &str, ids: impl Iterator<Item = &'a str>) -> Result<()> {
    let mut seen = HashSet::new();
    for id in ids {
        if !seen.insert(id) {
            return Err(CoreError::InvalidImport(format!(
                "duplicate id `{id}` in `{field}`"
            )));
        }
    }
    Ok(())
}

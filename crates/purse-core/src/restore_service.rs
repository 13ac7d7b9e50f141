//! Replaces the local transactions with the signed-in user's remote copy.

use std::sync::Arc;

use futures::future::try_join_all;
use purse_domain::{LocalTransaction, Transaction};
use serde_json::Value;
use tracing::{info, warn};

use crate::{
    error::{CoreError, Result},
    remote::{RemotePath, RemoteStore},
    session::{Notice, Session},
    store::{Collection, LocalStore, LocalStoreExt},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestoreOutcome {
    /// The remote held transactions; the local collection now mirrors them.
    Restored { count: usize },
    /// The remote held nothing; the local collection was emptied.
    ClearedEmpty,
    /// Nothing was touched.
    Skipped { notice: Option<Notice> },
    /// Pending local records would have been overwritten; restore postponed.
    Deferred { pending: usize },
}

impl RestoreOutcome {
    pub fn replaced_local(&self) -> bool {
        matches!(self, Self::Restored { .. } | Self::ClearedEmpty)
    }
}

pub struct RestoreService {
    local: Arc<dyn LocalStore>,
    remote: Arc<dyn RemoteStore>,
}

impl RestoreService {
    pub fn new(local: Arc<dyn LocalStore>, remote: Arc<dyn RemoteStore>) -> Self {
        Self { local, remote }
    }

    /// Full replace: local transactions become exactly the remote set.
    ///
    /// Signed-out sessions are a silent no-op; offline sessions skip with an
    /// informational notice. The remote payload is decoded before anything is
    /// cleared, so a bad payload leaves local data untouched.
    pub async fn restore_transactions(&self, session: &Session) -> Result<RestoreOutcome> {
        let Some(identity) = session.identity.as_ref() else {
            return Ok(RestoreOutcome::Skipped { notice: None });
        };
        if !session.online {
            return Ok(RestoreOutcome::Skipped {
                notice: Some(Notice::info("Offline mode: Using local data.")),
            });
        }

        let path = RemotePath::transactions(&identity.uid);
        let payload = self
            .remote
            .get(&path)
            .await
            .map_err(|err| CoreError::RemoteRestoreFailed(err.to_string()))?;
        let transactions = decode_remote(payload)?;

        self.local.clear(Collection::Transactions).await?;
        if transactions.is_empty() {
            info!(uid = %identity.uid, "remote holds no transactions, local copy cleared");
            return Ok(RestoreOutcome::ClearedEmpty);
        }

        let records: Vec<LocalTransaction> = transactions
            .into_iter()
            .map(LocalTransaction::synced)
            .collect();
        try_join_all(records.iter().map(|record| self.local.put_record(record))).await?;

        info!(uid = %identity.uid, count = records.len(), "transactions restored from remote");
        Ok(RestoreOutcome::Restored {
            count: records.len(),
        })
    }
}

/// Accepts either an id-keyed object or a sparse array of records.
fn decode_remote(payload: Option<Value>) -> Result<Vec<Transaction>> {
    let children: Vec<Value> = match payload {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Object(map)) => map.into_iter().map(|(_, value)| value).collect(),
        Some(Value::Array(items)) => items.into_iter().filter(|v| !v.is_null()).collect(),
        Some(other) => {
            return Err(CoreError::RemoteRestoreFailed(format!(
                "expected a collection of transactions, found {other}"
            )))
        }
    };

    children
        .into_iter()
        .map(|value| {
            serde_json::from_value::<Transaction>(value).map_err(|err| {
                warn!(error = %err, "remote transaction could not be decoded");
                CoreError::RemoteRestoreFailed(format!("invalid remote transaction: {err}"))
            })
        })
        .collect()
}

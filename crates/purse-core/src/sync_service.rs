//! Write path for transactions and the pending-sync reconciliation pass.

use std::sync::Arc;

use purse_domain::{Identifiable, Identity, LocalTransaction, Transaction, UserProfile};
use tracing::{debug, info, warn};

use crate::{
    error::{CoreError, Result},
    remote::{RemotePath, RemoteStore},
    session::{Notice, Session},
    store::{LocalStore, LocalStoreExt},
};

/// Result of saving a transaction: what was stored locally plus the notice to show.
#[derive(Debug, Clone, PartialEq)]
pub struct SaveOutcome {
    pub transaction: LocalTransaction,
    pub notice: Option<Notice>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    SignedOut,
    Offline,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncFailure {
    pub id: String,
    pub reason: String,
}

/// Summary of one reconciliation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub skipped: Option<SkipReason>,
    pub attempted: usize,
    pub synced: Vec<String>,
    pub failed: Vec<SyncFailure>,
}

impl SyncReport {
    fn skipped(reason: SkipReason) -> Self {
        Self {
            skipped: Some(reason),
            ..Self::default()
        }
    }

    pub fn ran(&self) -> bool {
        self.skipped.is_none()
    }

    /// Records still flagged after the pass.
    pub fn remaining(&self) -> usize {
        self.attempted - self.synced.len()
    }

    pub fn notice(&self) -> Option<Notice> {
        if self.synced.is_empty() {
            return None;
        }
        Some(Notice::success(format!(
            "Synced {} offline transaction{}",
            self.synced.len(),
            if self.synced.len() == 1 { "" } else { "s" }
        )))
    }
}

pub struct SyncService {
    local: Arc<dyn LocalStore>,
    remote: Arc<dyn RemoteStore>,
}

impl SyncService {
    pub fn new(local: Arc<dyn LocalStore>, remote: Arc<dyn RemoteStore>) -> Self {
        Self { local, remote }
    }

    /// Persists a transaction, mirroring it remotely when a signed-in session is online.
    ///
    /// The local write always happens. A remote failure or an offline session
    /// leaves the record flagged for the next reconciliation pass. Guest
    /// sessions never touch the remote store.
    pub async fn save(&self, session: &Session, transaction: Transaction) -> Result<SaveOutcome> {
        let (local, notice) = match &session.identity {
            None => (LocalTransaction::synced(transaction), None),
            Some(identity) if session.online => match self.push(identity, &transaction).await {
                Ok(()) => (
                    LocalTransaction::synced(transaction),
                    Some(Notice::success("Transaction saved and synced")),
                ),
                Err(err) => {
                    warn!(id = transaction.id(), error = %err, "remote write failed, keeping transaction pending");
                    (
                        LocalTransaction::pending(transaction),
                        Some(Notice::warning(
                            "Transaction saved locally, will sync when connection is restored",
                        )),
                    )
                }
            },
            Some(_) => (
                LocalTransaction::pending(transaction),
                Some(Notice::info("You're offline. Transaction saved locally.")),
            ),
        };

        self.local.put_record(&local).await?;
        debug!(id = local.id(), needs_sync = local.needs_sync, "transaction saved");
        Ok(SaveOutcome {
            transaction: local,
            notice,
        })
    }

    /// Writes a transaction to `users/{uid}/transactions/{id}` without the pending marker.
    pub async fn push(&self, identity: &Identity, transaction: &Transaction) -> Result<()> {
        let path = RemotePath::transaction(&identity.uid, transaction.id());
        let payload = serde_json::to_value(transaction)?;
        self.remote
            .set(&path, payload)
            .await
            .map_err(|source| CoreError::RemoteWriteFailed {
                path: path.to_string(),
                source,
            })
    }

    /// Best-effort removal of a transaction's remote copy.
    pub async fn remove(&self, identity: &Identity, transaction_id: &str) -> Result<()> {
        let path = RemotePath::transaction(&identity.uid, transaction_id);
        self.remote
            .remove(&path)
            .await
            .map_err(|source| CoreError::RemoteWriteFailed {
                path: path.to_string(),
                source,
            })
    }

    pub async fn save_profile(&self, profile: &UserProfile) -> Result<()> {
        let path = RemotePath::profile(&profile.uid);
        let payload = serde_json::to_value(profile)?;
        self.remote
            .set(&path, payload)
            .await
            .map_err(|source| CoreError::RemoteWriteFailed {
                path: path.to_string(),
                source,
            })
    }

    /// Pushes every flagged transaction, one at a time, and clears the flag on
    /// each success. Failures stay flagged and do not stop the pass.
    pub async fn sync_offline_transactions(&self, session: &Session) -> Result<SyncReport> {
        let Some(identity) = session.identity.as_ref() else {
            return Ok(SyncReport::skipped(SkipReason::SignedOut));
        };
        if !session.online {
            return Ok(SyncReport::skipped(SkipReason::Offline));
        }

        let pending: Vec<LocalTransaction> = self
            .local
            .all_records::<LocalTransaction>()
            .await?
            .into_iter()
            .filter(|record| record.needs_sync)
            .collect();

        let mut report = SyncReport {
            attempted: pending.len(),
            ..SyncReport::default()
        };

        for record in pending {
            let id = record.id().to_owned();
            if let Err(err) = self.push(identity, &record.transaction).await {
                warn!(id = %id, error = %err, "pending transaction not synced");
                report.failed.push(SyncFailure {
                    id,
                    reason: err.to_string(),
                });
                continue;
            }
            let synced = LocalTransaction::synced(record.transaction);
            match self.local.put_record(&synced).await {
                Ok(()) => report.synced.push(id),
                Err(err) => {
                    warn!(id = %id, error = %err, "synced transaction could not be unflagged locally");
                    report.failed.push(SyncFailure {
                        id,
                        reason: err.to_string(),
                    });
                }
            }
        }

        if report.attempted > 0 {
            info!(
                synced = report.synced.len(),
                failed = report.failed.len(),
                "offline transactions reconciled"
            );
        }
        Ok(report)
    }
}

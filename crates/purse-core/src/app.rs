//! The coordinator the application talks to.
//!
//! [`Purse`] owns the capabilities (local store, remote store, key-value
//! store, clock), the session, and the in-memory [`AppState`] mirror. Every
//! operation writes through the local store first and refreshes the mirror
//! from what was persisted.

use std::sync::Arc;

use purse_domain::{
    Budget, Category, Identity, LocalTransaction, RecurringStatus, Settings,
    Transaction, TransactionDraft,
};
use tracing::{error, info, warn};

use crate::{
    category_service::CategoryService,
    error::{CoreError, Result},
    migration_service::{MigrationOutcome, MigrationService},
    recurrence_service::RecurrenceService,
    remote::RemoteStore,
    restore_service::{RestoreOutcome, RestoreService},
    session::{Notice, Session},
    state::AppState,
    store::{Collection, KeyValueStore, LocalStore, LocalStoreExt, StoreBackend},
    sync_service::{SaveOutcome, SyncReport, SyncService},
    time::Clock,
    transaction_service::{ReceiptChange, TransactionService},
    transfer_service::{ImportSummary, TransferService},
};

/// Key-value keys used outside the local store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurseOptions {
    pub legacy_key: String,
    pub fallback_key: String,
}

impl Default for PurseOptions {
    fn default() -> Self {
        Self {
            legacy_key: "budgetTrackerData".into(),
            fallback_key: "budgetTrackerData_fallback".into(),
        }
    }
}

/// Everything that happened during [`Purse::start`].
#[derive(Debug, Clone, PartialEq)]
pub struct StartupReport {
    pub backend: StoreBackend,
    pub migration: MigrationOutcome,
    pub sync: SyncReport,
    pub restore: RestoreOutcome,
    pub recurring_created: usize,
    pub default_categories_created: usize,
    pub notices: Vec<Notice>,
}

/// Result of a sign-in or sign-out.
#[derive(Debug, Clone, PartialEq)]
pub struct IdentityChange {
    pub adopted: usize,
    /// Unsynced transactions of the previous account dropped from this device.
    pub discarded: usize,
    pub sync: SyncReport,
    pub restore: RestoreOutcome,
    pub notices: Vec<Notice>,
}

pub struct Purse {
    local: Arc<dyn LocalStore>,
    key_value: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    options: PurseOptions,
    session: Session,
    state: AppState,
    sync: SyncService,
    restore: RestoreService,
    migration: MigrationService,
    recurrence: RecurrenceService,
    transactions: TransactionService,
    categories: CategoryService,
    transfer: TransferService,
}

impl Purse {
    pub fn new(
        local: Arc<dyn LocalStore>,
        remote: Arc<dyn RemoteStore>,
        key_value: Arc<dyn KeyValueStore>,
        clock: Arc<dyn Clock>,
        options: PurseOptions,
        session: Session,
    ) -> Self {
        Self {
            sync: SyncService::new(local.clone(), remote.clone()),
            restore: RestoreService::new(local.clone(), remote),
            migration: MigrationService::new(
                local.clone(),
                key_value.clone(),
                options.legacy_key.clone(),
            ),
            recurrence: RecurrenceService::new(local.clone()),
            transactions: TransactionService::new(local.clone()),
            categories: CategoryService::new(local.clone()),
            transfer: TransferService::new(local.clone()),
            local,
            key_value,
            clock,
            options,
            session,
            state: AppState::default(),
        }
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn backend(&self) -> StoreBackend {
        self.local.backend()
    }

    pub fn local_store(&self) -> &Arc<dyn LocalStore> {
        &self.local
    }

    /// Startup sequence: init, migrate, reconcile, restore, load, recurring.
    ///
    /// Only a failing local store init is fatal. Restore runs only when the
    /// reconciliation pass leaves no pending record behind.
    pub async fn start(&mut self) -> Result<StartupReport> {
        if let Err(err) = self.local.init().await {
            error!(backend = %self.local.backend(), error = %err, "local store failed to open");
            return Err(err);
        }
        let mut notices = Vec::new();

        let migration = self.migration.run().await;
        notices.extend(migration.notice());

        let (sync, restore) = self.reconcile_then_restore(&mut notices).await?;
        self.reload().await?;

        let default_categories_created = self.categories.ensure_defaults().await?;
        if default_categories_created > 0 {
            self.reload().await?;
        }

        let recurring_created = self.process_recurring(&mut notices).await?;

        info!(
            backend = %self.local.backend(),
            transactions = self.state.transactions.len(),
            pending = self.state.pending_sync_count(),
            "data layer ready"
        );
        Ok(StartupReport {
            backend: self.local.backend(),
            migration,
            sync,
            restore,
            recurring_created,
            default_categories_created,
            notices,
        })
    }

    pub async fn reload(&mut self) -> Result<()> {
        self.state = AppState::load(self.local.as_ref()).await?;
        Ok(())
    }

    async fn reconcile_then_restore(
        &mut self,
        notices: &mut Vec<Notice>,
    ) -> Result<(SyncReport, RestoreOutcome)> {
        let sync = self.sync.sync_offline_transactions(&self.session).await?;
        notices.extend(sync.notice());

        if sync.ran() && sync.remaining() > 0 {
            warn!(pending = sync.remaining(), "restore deferred, pending transactions remain");
            notices.push(Notice::warning(
                "Some transactions have not synced yet. Cloud data will be loaded after they sync.",
            ));
            return Ok((
                sync.clone(),
                RestoreOutcome::Deferred {
                    pending: sync.remaining(),
                },
            ));
        }

        let restore = match self.restore.restore_transactions(&self.session).await {
            Ok(outcome) => outcome,
            Err(err @ CoreError::RemoteRestoreFailed(_)) => {
                warn!(error = %err, "restore failed, keeping local data");
                notices.push(Notice::warning("Could not load cloud data. Using local data."));
                RestoreOutcome::Skipped { notice: None }
            }
            Err(err) => return Err(err),
        };
        if let RestoreOutcome::Skipped {
            notice: Some(notice),
        } = &restore
        {
            notices.push(notice.clone());
        }
        Ok((sync, restore))
    }

    async fn process_recurring(&mut self, notices: &mut Vec<Notice>) -> Result<usize> {
        let mark_pending = self.session.is_signed_in();
        let run = self
            .recurrence
            .process_due(self.clock.today(), self.clock.now(), mark_pending)
            .await?;
        let created = run.created_count();
        if created == 0 {
            return Ok(0);
        }
        notices.push(Notice::info(format!(
            "{created} recurring transaction(s) were added."
        )));
        if self.session.remote_identity().is_some() {
            let report = self.sync.sync_offline_transactions(&self.session).await?;
            notices.extend(report.notice());
        }
        self.reload().await?;
        Ok(created)
    }

    /// Runs the recurring generation pass outside of startup.
    pub async fn process_recurring_transactions(&mut self) -> Result<(usize, Vec<Notice>)> {
        let mut notices = Vec::new();
        let created = self.process_recurring(&mut notices).await?;
        Ok((created, notices))
    }

    pub async fn save_transaction(&mut self, draft: TransactionDraft) -> Result<SaveOutcome> {
        self.save_transaction_with_receipt(draft, ReceiptChange::Keep)
            .await
    }

    /// Saves a draft, applying a receipt change first. The stored receipt id
    /// wins over whatever the draft carries.
    pub async fn save_transaction_with_receipt(
        &mut self,
        mut draft: TransactionDraft,
        receipt: ReceiptChange,
    ) -> Result<SaveOutcome> {
        draft.validate()?;
        let existing = match &draft.id {
            Some(id) => self.stored_transaction(id).await?,
            None => None,
        };
        let current_receipt = existing
            .as_ref()
            .and_then(|record| record.transaction.receipt_id().map(str::to_owned))
            .or(draft.receipt_id.take());
        draft.receipt_id = self
            .transactions
            .apply_receipt(receipt, current_receipt)
            .await?;

        let transaction = TransactionService::build(
            draft,
            existing.as_ref().map(|record| &record.transaction),
            self.clock.now(),
        )?;
        self.persist(transaction).await
    }

    pub async fn attach_receipt(
        &mut self,
        draft: TransactionDraft,
        image: Vec<u8>,
    ) -> Result<SaveOutcome> {
        self.save_transaction_with_receipt(draft, ReceiptChange::Replace(image))
            .await
    }

    pub async fn remove_receipt(&mut self, draft: TransactionDraft) -> Result<SaveOutcome> {
        self.save_transaction_with_receipt(draft, ReceiptChange::Remove)
            .await
    }

    pub async fn receipt_image(&self, receipt_id: &str) -> Result<Option<Vec<u8>>> {
        Ok(self
            .transactions
            .receipt(receipt_id)
            .await?
            .map(|receipt| receipt.image))
    }

    /// Deletes a concrete transaction with its receipt. Templates are stopped
    /// instead, leaving a historical entry.
    pub async fn delete_transaction(&mut self, id: &str) -> Result<Option<Notice>> {
        let record = self
            .stored_transaction(id)
            .await?
            .ok_or_else(|| CoreError::TransactionNotFound(id.to_string()))?;
        if record.transaction.is_template() {
            return Ok(self.stop_recurring(id).await?.notice);
        }

        self.transactions.delete_local(&record.transaction).await?;
        self.state.remove_transaction(id);
        info!(id, "transaction deleted");

        let Some(identity) = self.session.identity.clone() else {
            return Ok(None);
        };
        if !self.session.online {
            return Ok(Some(Notice::warning(
                "Deleted on this device. The cloud copy will remain until you're back online.",
            )));
        }
        match self.sync.remove(&identity, id).await {
            Ok(()) => Ok(Some(Notice::success("Transaction deleted"))),
            Err(err) => {
                warn!(id, error = %err, "remote copy not removed");
                Ok(Some(Notice::warning(
                    "Deleted on this device, but the cloud copy could not be removed.",
                )))
            }
        }
    }

    pub async fn pause_recurring(&mut self, id: &str) -> Result<SaveOutcome> {
        let record = self.require_transaction(id).await?;
        let paused = RecurrenceService::set_status(record.transaction, RecurringStatus::Paused)?;
        self.persist(paused).await
    }

    pub async fn resume_recurring(&mut self, id: &str) -> Result<SaveOutcome> {
        let record = self.require_transaction(id).await?;
        let resumed = RecurrenceService::set_status(record.transaction, RecurringStatus::Active)?;
        self.persist(resumed).await
    }

    pub async fn stop_recurring(&mut self, id: &str) -> Result<SaveOutcome> {
        let record = self.require_transaction(id).await?;
        let stopped = RecurrenceService::stop(record.transaction)?;
        self.persist(stopped).await
    }

    pub async fn ensure_default_categories(&mut self) -> Result<usize> {
        let created = self.categories.ensure_defaults().await?;
        if created > 0 {
            self.state.categories = self.local.all_records::<Category>().await?;
        }
        Ok(created)
    }

    pub async fn save_category(&mut self, category: Category) -> Result<()> {
        self.categories.save(&category).await?;
        self.state.upsert_category(category);
        Ok(())
    }

    /// Returns the ids of the budgets removed alongside the category.
    pub async fn delete_category(&mut self, id: &str) -> Result<Vec<String>> {
        let removed = self.categories.delete(id).await?;
        self.state.categories.retain(|category| category.id != id);
        self.state
            .budgets
            .retain(|budget| !removed.contains(&budget.id));
        Ok(removed)
    }

    pub async fn save_budget(&mut self, budget: Budget) -> Result<()> {
        self.categories.save_budget(&budget).await?;
        self.state.upsert_budget(budget);
        Ok(())
    }

    pub async fn delete_budget(&mut self, id: &str) -> Result<()> {
        self.categories.delete_budget(id).await?;
        self.state.budgets.retain(|budget| budget.id != id);
        Ok(())
    }

    /// Read-modify-write of the settings singleton.
    pub async fn update_settings<F>(&mut self, update: F) -> Result<Settings>
    where
        F: FnOnce(&mut Settings),
    {
        let mut settings = self
            .local
            .get_record::<Settings>(Settings::KEY)
            .await?
            .unwrap_or_default();
        update(&mut settings);
        settings.key = Settings::KEY.to_string();
        self.local.put_record(&settings).await?;
        self.state.settings = settings.clone();
        Ok(settings)
    }

    /// Explicit restore: local transactions become exactly the remote set,
    /// pending records included.
    pub async fn restore_from_remote(&mut self) -> Result<RestoreOutcome> {
        let outcome = self.restore.restore_transactions(&self.session).await?;
        if outcome.replaced_local() {
            self.reload().await?;
        }
        Ok(outcome)
    }

    pub async fn export_json(&self) -> Result<String> {
        self.transfer.export_json(self.clock.now()).await
    }

    /// Imported transactions are flagged for sync when signed in so the
    /// remote copy follows the import.
    pub async fn import_json(&mut self, raw: &str) -> Result<ImportSummary> {
        let summary = self
            .transfer
            .import_json(raw, self.session.is_signed_in())
            .await?;
        self.reload().await?;
        Ok(summary)
    }

    pub async fn clear_all_data(&mut self) -> Result<()> {
        futures::future::try_join_all(
            Collection::ALL
                .iter()
                .map(|collection| self.local.clear(*collection)),
        )
        .await?;
        self.key_value.remove_item(&self.options.fallback_key)?;
        info!("all local data cleared");
        self.reload().await
    }

    /// Sign-in adopts guest transactions into the account, writes the
    /// profile snapshot, then reconciles and restores. Sign-out, or a switch
    /// to another account, first releases the local transactions of the
    /// account being left.
    pub async fn on_identity_changed(&mut self, identity: Option<Identity>) -> Result<IdentityChange> {
        let previous = self.session.identity.clone();
        let mut notices = Vec::new();

        let same_account = match (&previous, &identity) {
            (Some(before), Some(after)) => before.uid == after.uid,
            _ => false,
        };
        let (sync, discarded) = if previous.is_some() && !same_account {
            self.release_local_transactions(&mut notices).await?
        } else {
            (SyncReport::default(), 0)
        };

        self.session.identity = identity;
        let Some(identity) = self.session.identity.clone() else {
            info!("signed out");
            self.reload().await?;
            return Ok(IdentityChange {
                adopted: 0,
                discarded,
                sync,
                restore: RestoreOutcome::Skipped { notice: None },
                notices,
            });
        };
        info!(uid = %identity.uid, "signed in");

        let adopted = if same_account {
            0
        } else {
            self.adopt_local_transactions().await?
        };

        if self.session.online {
            if let Err(err) = self.sync.save_profile(&identity.profile(self.clock.now())).await {
                warn!(uid = %identity.uid, error = %err, "profile snapshot not written");
                notices.push(Notice::warning("Could not update your profile."));
            }
        }

        let (sync, restore) = self.reconcile_then_restore(&mut notices).await?;
        self.reload().await?;
        Ok(IdentityChange {
            adopted,
            discarded,
            sync,
            restore,
            notices,
        })
    }

    /// Pushes what the departing account still has pending, then removes its
    /// transactions and receipts from this device. Returns the reconciliation
    /// report and how many unsynced transactions were dropped.
    async fn release_local_transactions(
        &mut self,
        notices: &mut Vec<Notice>,
    ) -> Result<(SyncReport, usize)> {
        let report = self.sync.sync_offline_transactions(&self.session).await?;
        notices.extend(report.notice());

        let dropped = self
            .local
            .all_records::<LocalTransaction>()
            .await?
            .iter()
            .filter(|record| record.needs_sync)
            .count();
        futures::future::try_join(
            self.local.clear(Collection::Transactions),
            self.local.clear(Collection::Receipts),
        )
        .await?;

        if dropped > 0 {
            warn!(dropped, "unsynced transactions removed with the previous account");
            notices.push(Notice::warning(format!(
                "{dropped} unsynced transaction(s) were removed from this device."
            )));
        }
        info!("local transactions of the previous account released");
        Ok((report, dropped))
    }

    /// Flags the guest transactions for sync so the new account uploads them.
    /// Only guest data is local at this point: leaving an account releases it.
    async fn adopt_local_transactions(&mut self) -> Result<usize> {
        let records = self.local.all_records::<LocalTransaction>().await?;
        let adopt: Vec<LocalTransaction> = records
            .into_iter()
            .filter(|record| !record.needs_sync)
            .map(|record| LocalTransaction::pending(record.transaction))
            .collect();
        futures::future::try_join_all(adopt.iter().map(|record| self.local.put_record(record)))
            .await?;
        if !adopt.is_empty() {
            info!(count = adopt.len(), "local transactions adopted into the account");
        }
        Ok(adopt.len())
    }

    /// Records the new connectivity; coming back online runs reconciliation.
    pub async fn on_connectivity_changed(&mut self, online: bool) -> Result<Option<SyncReport>> {
        let was_online = self.session.online;
        self.session.online = online;
        if online && !was_online {
            return self.on_connectivity_restored().await.map(Some);
        }
        Ok(None)
    }

    pub async fn on_connectivity_restored(&mut self) -> Result<SyncReport> {
        self.session.online = true;
        let report = self.sync.sync_offline_transactions(&self.session).await?;
        if !report.synced.is_empty() {
            self.reload().await?;
        }
        Ok(report)
    }

    async fn persist(&mut self, transaction: Transaction) -> Result<SaveOutcome> {
        let outcome = self.sync.save(&self.session, transaction).await?;
        self.state.upsert_transaction(outcome.transaction.clone());
        Ok(outcome)
    }

    async fn stored_transaction(&self, id: &str) -> Result<Option<LocalTransaction>> {
        self.local.get_record::<LocalTransaction>(id).await
    }

    async fn require_transaction(&self, id: &str) -> Result<LocalTransaction> {
        self.stored_transaction(id)
            .await?
            .ok_or_else(|| CoreError::TransactionNotFound(id.to_string()))
    }
}

impl std::fmt::Debug for Purse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Purse")
            .field("backend", &self.local.backend())
            .field("session", &self.session)
            .field("transactions", &self.state.transactions.len())
            .finish()
    }
}

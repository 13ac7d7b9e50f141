use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use futures::future::try_join_all;
use purse_domain::{LocalTransaction, RecurringStatus, Transaction};
use tracing::{debug, info};

use crate::{
    error::{CoreError, Result},
    store::{LocalStore, LocalStoreExt},
};

/// Records written by one generation pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecurrenceRun {
    pub created: Vec<LocalTransaction>,
    pub advanced: Vec<LocalTransaction>,
}

impl RecurrenceRun {
    pub fn created_count(&self) -> usize {
        self.created.len()
    }
}

pub struct RecurrenceService {
    local: Arc<dyn LocalStore>,
}

impl RecurrenceService {
    pub fn new(local: Arc<dyn LocalStore>) -> Self {
        Self { local }
    }

    /// Materializes every occurrence due on or before `today` for each active
    /// template, then persists the advanced templates once all instances are
    /// written.
    ///
    /// With `mark_pending`, new instances and advanced templates are stored
    /// flagged so a reconciliation pass pushes them.
    pub async fn process_due(
        &self,
        today: NaiveDate,
        now: DateTime<Utc>,
        mark_pending: bool,
    ) -> Result<RecurrenceRun> {
        let stored = self.local.all_records::<LocalTransaction>().await?;
        let mut run = RecurrenceRun::default();

        for record in stored {
            let LocalTransaction {
                transaction: Transaction::Recurring(mut template),
                needs_sync,
            } = record
            else {
                continue;
            };
            if !template.is_active() {
                continue;
            }

            let mut generated = 0usize;
            while let Some(due) = template.due_on_or_before(today) {
                let instance = Transaction::Concrete(template.instantiate(due, now));
                run.created.push(stamp(instance, mark_pending));
                template.advance_from(due);
                generated += 1;
            }
            if generated > 0 {
                debug!(template = template.details.id.as_str(), generated, "recurring template advanced");
                run.advanced.push(LocalTransaction {
                    transaction: Transaction::Recurring(template),
                    needs_sync: needs_sync || mark_pending,
                });
            }
        }

        try_join_all(run.created.iter().map(|record| self.local.add_record(record))).await?;
        try_join_all(run.advanced.iter().map(|record| self.local.put_record(record))).await?;

        if !run.created.is_empty() {
            info!(
                created = run.created.len(),
                templates = run.advanced.len(),
                "recurring transactions generated"
            );
        }
        Ok(run)
    }

    /// Sets the status of a template. Pausing freezes the cursor; resuming
    /// does not backfill anything the paused period skipped.
    pub fn set_status(transaction: Transaction, status: RecurringStatus) -> Result<Transaction> {
        match transaction {
            Transaction::Recurring(mut template) => {
                template.status = status;
                Ok(Transaction::Recurring(template))
            }
            Transaction::Concrete(details) => Err(CoreError::NotARecurringTemplate(details.id)),
        }
    }

    /// Turns a template into an ordinary historical transaction.
    pub fn stop(transaction: Transaction) -> Result<Transaction> {
        match transaction {
            Transaction::Recurring(template) => Ok(Transaction::Concrete(template.stop())),
            Transaction::Concrete(details) => Err(CoreError::NotARecurringTemplate(details.id)),
        }
    }
}

fn stamp(transaction: Transaction, pending: bool) -> LocalTransaction {
    if pending {
        LocalTransaction::pending(transaction)
    } else {
        LocalTransaction::synced(transaction)
    }
}

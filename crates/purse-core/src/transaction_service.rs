use std::sync::Arc;

use chrono::{DateTime, Utc};
use purse_domain::{
    Receipt, RecurringStatus, RecurringTemplate, Transaction, TransactionDraft,
};
use tracing::debug;

use crate::{
    error::Result,
    store::{Collection, LocalStore, LocalStoreExt},
};

/// What to do with a transaction's receipt when it is saved.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ReceiptChange {
    #[default]
    Keep,
    Replace(Vec<u8>),
    Remove,
}

pub struct TransactionService {
    local: Arc<dyn LocalStore>,
}

impl TransactionService {
    pub fn new(local: Arc<dyn LocalStore>) -> Self {
        Self { local }
    }

    /// Turns a draft into a concrete transaction or a template.
    ///
    /// A new template is anchored on its own date and starts active. Editing
    /// an existing template keeps its anchor and status; `nextDueDate` is
    /// always recomputed from the draft's date.
    pub fn build(
        draft: TransactionDraft,
        existing: Option<&Transaction>,
        now: DateTime<Utc>,
    ) -> Result<Transaction> {
        draft.validate()?;
        let (details, frequency) = draft.into_details(now);
        let Some(frequency) = frequency else {
            return Ok(Transaction::Concrete(details));
        };
        let (anchor, status) = existing
            .and_then(Transaction::template)
            .map(|template| (template.original_date, template.status))
            .unwrap_or((details.date, RecurringStatus::Active));
        Ok(Transaction::Recurring(RecurringTemplate::with_anchor(
            details, frequency, anchor, status,
        )))
    }

    /// Applies a receipt change and returns the receipt id the transaction
    /// should carry. A replaced or removed receipt is deleted.
    pub async fn apply_receipt(
        &self,
        change: ReceiptChange,
        current: Option<String>,
    ) -> Result<Option<String>> {
        match change {
            ReceiptChange::Keep => Ok(current),
            ReceiptChange::Remove => {
                if let Some(old) = current {
                    self.local.delete(Collection::Receipts, &old).await?;
                }
                Ok(None)
            }
            ReceiptChange::Replace(image) => {
                let receipt = Receipt::new(image);
                self.local.put_record(&receipt).await?;
                if let Some(old) = current {
                    self.local.delete(Collection::Receipts, &old).await?;
                }
                debug!(receipt = receipt.id.as_str(), "receipt stored");
                Ok(Some(receipt.id))
            }
        }
    }

    pub async fn receipt(&self, receipt_id: &str) -> Result<Option<Receipt>> {
        self.local.get_record::<Receipt>(receipt_id).await
    }

    /// Removes a transaction and its receipt from the local store.
    pub async fn delete_local(&self, transaction: &Transaction) -> Result<()> {
        if let Some(receipt_id) = transaction.receipt_id() {
            self.local.delete(Collection::Receipts, receipt_id).await?;
        }
        self.local
            .delete(Collection::Transactions, &transaction.details().id)
            .await
    }
}

//! Transactions: concrete ledger entries and recurring templates.
//!
//! Both variants share [`TransactionDetails`]. On the wire they are a single
//! camelCase object; a template is recognised by `isRecurring: true` and
//! carries `frequency`, `originalDate`, `nextDueDate` and `recurringStatus`.
//! The transient `needsSync` marker only exists on [`LocalTransaction`], the
//! form kept in the local store, and is never part of a remote payload.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{
    common::{new_record_id, Identifiable, RecordError, TransactionKind},
    recurrence::{Frequency, RecurringStatus, FREQUENCY_NONE},
};

/// Fields common to concrete transactions and recurring templates.
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionDetails {
    pub id: String,
    pub description: String,
    pub amount: Decimal,
    pub kind: TransactionKind,
    pub category: String,
    pub date: NaiveDate,
    pub timestamp: DateTime<Utc>,
    pub notes: String,
    pub location: String,
    pub receipt_id: Option<String>,
}

/// A recurring definition. Generates concrete instances; never itself a
/// spendable ledger entry.
#[derive(Debug, Clone, PartialEq)]
pub struct RecurringTemplate {
    pub details: TransactionDetails,
    pub frequency: Frequency,
    pub original_date: NaiveDate,
    pub next_due_date: Option<NaiveDate>,
    pub status: RecurringStatus,
}

impl RecurringTemplate {
    /// Creates an active template anchored on its own date.
    pub fn new(details: TransactionDetails, frequency: Frequency) -> Self {
        let original_date = details.date;
        Self::with_anchor(details, frequency, original_date, RecurringStatus::Active)
    }

    /// Creates a template with an explicit anchor; `nextDueDate` is computed
    /// from the template's own date.
    pub fn with_anchor(
        details: TransactionDetails,
        frequency: Frequency,
        original_date: NaiveDate,
        status: RecurringStatus,
    ) -> Self {
        let next_due_date = frequency.next_due_date(details.date, original_date);
        Self {
            details,
            frequency,
            original_date,
            next_due_date,
            status,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == RecurringStatus::Active
    }

    /// Returns the pending occurrence date when it is due on or before `today`.
    pub fn due_on_or_before(&self, today: NaiveDate) -> Option<NaiveDate> {
        self.next_due_date.filter(|due| *due <= today)
    }

    /// Builds the concrete instance for `date`, with a fresh id and timestamp.
    pub fn instantiate(&self, date: NaiveDate, now: DateTime<Utc>) -> TransactionDetails {
        TransactionDetails {
            id: new_record_id(),
            date,
            timestamp: now,
            ..self.details.clone()
        }
    }

    /// Moves the cursor past `generated`, the occurrence just materialized.
    pub fn advance_from(&mut self, generated: NaiveDate) {
        self.next_due_date = self.frequency.next_due_date(generated, self.original_date);
    }

    /// Strips every recurring field, leaving a historical transaction.
    pub fn stop(self) -> TransactionDetails {
        self.details
    }
}

/// A transaction as seen by the ledger and the remote store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "TransactionRecord", into = "TransactionRecord")]
pub enum Transaction {
    Concrete(TransactionDetails),
    Recurring(RecurringTemplate),
}

impl Transaction {
    pub fn details(&self) -> &TransactionDetails {
        match self {
            Transaction::Concrete(details) => details,
            Transaction::Recurring(template) => &template.details,
        }
    }

    pub fn details_mut(&mut self) -> &mut TransactionDetails {
        match self {
            Transaction::Concrete(details) => details,
            Transaction::Recurring(template) => &mut template.details,
        }
    }

    pub fn template(&self) -> Option<&RecurringTemplate> {
        match self {
            Transaction::Recurring(template) => Some(template),
            Transaction::Concrete(_) => None,
        }
    }

    pub fn is_template(&self) -> bool {
        matches!(self, Transaction::Recurring(_))
    }

    pub fn category(&self) -> &str {
        &self.details().category
    }

    pub fn receipt_id(&self) -> Option<&str> {
        self.details().receipt_id.as_deref()
    }
}

impl Identifiable for Transaction {
    fn id(&self) -> &str {
        &self.details().id
    }
}

/// The locally stored form of a transaction, with its pending-sync marker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "TransactionRecord", into = "TransactionRecord")]
pub struct LocalTransaction {
    pub transaction: Transaction,
    pub needs_sync: bool,
}

impl LocalTransaction {
    pub fn synced(transaction: Transaction) -> Self {
        Self {
            transaction,
            needs_sync: false,
        }
    }

    pub fn pending(transaction: Transaction) -> Self {
        Self {
            transaction,
            needs_sync: true,
        }
    }
}

impl Identifiable for LocalTransaction {
    fn id(&self) -> &str {
        self.transaction.id()
    }
}

/// Flat wire representation shared by the local store, the remote store, the
/// legacy document and the export envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRecord {
    pub id: String,
    #[serde(default)]
    pub description: String,
    pub amount: Decimal,
    #[serde(rename = "type")]
    pub kind: TransactionKind,
    pub category: String,
    pub date: NaiveDate,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub location: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receipt_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_recurring: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_due_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recurring_status: Option<RecurringStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub needs_sync: Option<bool>,
}

impl TransactionRecord {
    fn from_details(details: TransactionDetails) -> Self {
        Self {
            id: details.id,
            description: details.description,
            amount: details.amount,
            kind: details.kind,
            category: details.category,
            date: details.date,
            timestamp: details.timestamp,
            notes: details.notes,
            location: details.location,
            receipt_id: details.receipt_id,
            is_recurring: None,
            frequency: None,
            original_date: None,
            next_due_date: None,
            recurring_status: None,
            needs_sync: None,
        }
    }

    fn split_details(self) -> (TransactionDetails, RecurringFields) {
        let details = TransactionDetails {
            id: self.id,
            description: self.description,
            amount: self.amount,
            kind: self.kind,
            category: self.category,
            date: self.date,
            timestamp: self.timestamp,
            notes: self.notes,
            location: self.location,
            receipt_id: self.receipt_id.filter(|id| !id.is_empty()),
        };
        let fields = RecurringFields {
            is_recurring: self.is_recurring.unwrap_or(false),
            frequency: self.frequency,
            original_date: self.original_date,
            next_due_date: self.next_due_date,
            status: self.recurring_status,
        };
        (details, fields)
    }
}

struct RecurringFields {
    is_recurring: bool,
    frequency: Option<String>,
    original_date: Option<NaiveDate>,
    next_due_date: Option<NaiveDate>,
    status: Option<RecurringStatus>,
}

impl TryFrom<TransactionRecord> for Transaction {
    type Error = RecordError;

    fn try_from(record: TransactionRecord) -> Result<Self, Self::Error> {
        let (details, fields) = record.split_details();
        if details.amount <= Decimal::ZERO {
            return Err(RecordError::new(details.id, "amount must be positive"));
        }
        if !fields.is_recurring {
            return Ok(Transaction::Concrete(details));
        }
        let frequency = match fields.frequency.as_deref() {
            None | Some(FREQUENCY_NONE) => {
                return Err(RecordError::new(
                    details.id,
                    "recurring template without a frequency",
                ))
            }
            Some(raw) => raw
                .parse::<Frequency>()
                .map_err(|reason| RecordError::new(details.id.clone(), reason))?,
        };
        let original_date = fields.original_date.unwrap_or(details.date);
        Ok(Transaction::Recurring(RecurringTemplate {
            details,
            frequency,
            original_date,
            next_due_date: fields.next_due_date,
            status: fields.status.unwrap_or_default(),
        }))
    }
}

impl From<Transaction> for TransactionRecord {
    fn from(transaction: Transaction) -> Self {
        match transaction {
            Transaction::Concrete(details) => TransactionRecord::from_details(details),
            Transaction::Recurring(template) => {
                let mut record = TransactionRecord::from_details(template.details);
                record.is_recurring = Some(true);
                record.frequency = Some(template.frequency.as_str().to_string());
                record.original_date = Some(template.original_date);
                record.next_due_date = template.next_due_date;
                record.recurring_status = Some(template.status);
                record
            }
        }
    }
}

impl TryFrom<TransactionRecord> for LocalTransaction {
    type Error = RecordError;

    fn try_from(mut record: TransactionRecord) -> Result<Self, Self::Error> {
        let needs_sync = record.needs_sync.take().unwrap_or(false);
        Ok(Self {
            transaction: Transaction::try_from(record)?,
            needs_sync,
        })
    }
}

impl From<LocalTransaction> for TransactionRecord {
    fn from(local: LocalTransaction) -> Self {
        let mut record = TransactionRecord::from(local.transaction);
        if local.needs_sync {
            record.needs_sync = Some(true);
        }
        record
    }
}

/// User input for creating or editing a transaction.
///
/// `frequency: None` yields a concrete transaction, any cadence a template.
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionDraft {
    pub id: Option<String>,
    pub description: String,
    pub amount: Decimal,
    pub kind: TransactionKind,
    pub category: String,
    pub date: NaiveDate,
    pub notes: String,
    pub location: String,
    pub receipt_id: Option<String>,
    pub frequency: Option<Frequency>,
}

impl TransactionDraft {
    pub fn new(
        amount: Decimal,
        kind: TransactionKind,
        category: impl Into<String>,
        date: NaiveDate,
    ) -> Self {
        Self {
            id: None,
            description: String::new(),
            amount,
            kind,
            category: category.into(),
            date,
            notes: String::new(),
            location: String::new(),
            receipt_id: None,
            frequency: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_frequency(mut self, frequency: Frequency) -> Self {
        self.frequency = Some(frequency);
        self
    }

    /// Rejects drafts that could never be stored.
    pub fn validate(&self) -> Result<(), RecordError> {
        let id = self.id.clone().unwrap_or_default();
        if self.amount <= Decimal::ZERO {
            return Err(RecordError::new(id, "amount must be positive"));
        }
        if self.category.trim().is_empty() {
            return Err(RecordError::new(id, "category is required"));
        }
        Ok(())
    }

    /// Resolves the shared fields, assigning an id when the draft has none.
    pub fn into_details(self, now: DateTime<Utc>) -> (TransactionDetails, Option<Frequency>) {
        let details = TransactionDetails {
            id: self.id.unwrap_or_else(new_record_id),
            description: self.description,
            amount: self.amount,
            kind: self.kind,
            category: self.category,
            date: self.date,
            timestamp: now,
            notes: self.notes,
            location: self.location,
            receipt_id: self.receipt_id,
        };
        (details, self.frequency)
    }
}

//! Shared traits, identifiers and enums for the data model.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Exposes the stable storage key of a record.
pub trait Identifiable {
    fn id(&self) -> &str;
}

/// Generates a fresh opaque record identifier. Identifiers are never reused.
pub fn new_record_id() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Raised when a wire-format record cannot be turned into a domain value.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("invalid record `{id}`: {reason}")]
pub struct RecordError {
    pub id: String,
    pub reason: String,
}

impl RecordError {
    pub fn new(id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
/// Direction of money flow for transactions and categories.
pub enum TransactionKind {
    Income,
    Expense,
}

impl TransactionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            TransactionKind::Income => "income",
            TransactionKind::Expense => "expense",
        }
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

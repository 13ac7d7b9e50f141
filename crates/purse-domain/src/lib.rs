//! purse-domain
//!
//! Pure data model for the purse data layer (transactions, recurring templates,
//! categories, budgets, settings, receipts, identities).
//! No I/O, no storage, no network. Only data types, their wire format and the
//! date arithmetic used by recurring templates.

pub mod budget;
pub mod category;
pub mod common;
pub mod identity;
pub mod receipt;
pub mod recurrence;
pub mod settings;
pub mod transaction;

pub use budget::*;
pub use category::*;
pub use common::*;
pub use identity::*;
pub use receipt::*;
pub use recurrence::*;
pub use settings::*;
pub use transaction::*;

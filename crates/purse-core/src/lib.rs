//! purse-core
//!
//! Offline-first data layer services: the local/remote/key-value capabilities,
//! the sync write path and reconciliation, restore, legacy migration,
//! recurring generation, import/export, and the [`Purse`] coordinator.
//! Depends on purse-domain. No concrete storage or network code lives here.

pub mod app;
pub mod category_service;
pub mod error;
pub mod migration_service;
pub mod recurrence_service;
pub mod remote;
pub mod restore_service;
pub mod session;
pub mod state;
pub mod store;
pub mod sync_service;
pub mod time;
pub mod transaction_service;
pub mod transfer_service;

pub use app::*;
pub use category_service::*;
pub use error::{CoreError, Result};
pub use migration_service::*;
pub use recurrence_service::*;
pub use remote::*;
pub use restore_service::*;
pub use session::*;
pub use state::*;
pub use store::*;
pub use sync_service::*;
pub use time::*;
pub use transaction_service::*;
pub use transfer_service::*;

#[cfg(test)]
mod tests;

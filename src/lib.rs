#![doc(test(attr(deny(warnings))))]

//! Purse is an offline-first data layer for a personal finance tracker.
//!
//! The workspace crates carry the pieces: `purse-domain` holds the data
//! model, `purse-core` the services and the [`Purse`] coordinator, the
//! storage crates the two local backends and `purse-remote` the remote
//! document store client. This crate wires them together from a [`Config`].

pub mod bootstrap;
pub mod errors;
pub mod utils;

pub use bootstrap::{build_purse, open_local_store, open_remote_store, LocalStores};
pub use errors::PurseError;
pub use purse_config::{BackendChoice, Config, ConfigManager};
pub use purse_core::Purse;

use std::sync::Once;

static INIT_TRACING: Once = Once::new();

/// Initializes global tracing with the default filter and emits a startup log.
pub fn init() {
    init_with_filter(&Config::default_log_filter());
}

/// Like [`init`], with the directive taken from [`Config::log_filter`].
pub fn init_with_filter(filter: &str) {
    INIT_TRACING.call_once(|| {
        utils::init_tracing(filter);
        tracing::info!("Purse tracing initialized.");
    });
}

//! purse-remote
//!
//! [`RemoteStore`](purse_core::RemoteStore) over a hierarchical JSON document
//! database's REST interface (`{base}/{path}.json`).

pub mod client;
pub mod error;

pub use client::HttpRemoteStore;
pub use error::{HttpRemoteError, RetryClass};

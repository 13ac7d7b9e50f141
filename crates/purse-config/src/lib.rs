//! purse-config
//!
//! Runtime configuration for the data layer: where local data lives, which
//! local backend to use, the remote endpoint and the log filter.

pub mod error;
pub mod manager;
pub mod model;

pub use error::ConfigError;
pub use manager::ConfigManager;
pub use model::{BackendChoice, Config, RemoteConfig, StorageConfig};

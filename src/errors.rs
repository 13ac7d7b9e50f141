use purse_config::ConfigError;
use purse_core::CoreError;
use purse_remote::HttpRemoteError;
use thiserror::Error;

/// Failures while assembling a [`Purse`](purse_core::Purse) from configuration.
#[derive(Debug, Error)]
pub enum PurseError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Core(#[from] CoreError),
    #[error("Remote client error: {0}")]
    Remote(#[from] HttpRemoteError),
    #[error("No remote database url configured")]
    RemoteNotConfigured,
}

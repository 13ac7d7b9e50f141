//! Assembles the capabilities a [`Purse`] needs from a [`Config`].

use std::sync::Arc;

use purse_config::{BackendChoice, Config};
use purse_core::{
    KeyValueStore, LocalStore, Purse, PurseOptions, RemoteStore, Session, SystemClock,
};
use purse_remote::HttpRemoteStore;
use purse_storage_json::{BlobStore, FileKeyValueStore};
use purse_storage_sqlite::SqliteStore;
use tracing::{info, warn};

use crate::errors::PurseError;

/// The local store chosen for this run plus the key-value store it sits next to.
#[derive(Clone)]
pub struct LocalStores {
    pub local: Arc<dyn LocalStore>,
    pub key_value: Arc<dyn KeyValueStore>,
}

/// Opens the key-value directory and the local backend.
///
/// `auto` probes the embedded database and falls back to the blob store over
/// the key-value directory when it cannot be opened. An explicit `embedded`
/// choice surfaces the open failure instead.
pub fn open_local_store(config: &Config) -> Result<LocalStores, PurseError> {
    let key_value: Arc<dyn KeyValueStore> =
        Arc::new(FileKeyValueStore::new(config.key_value_dir())?);

    let local: Arc<dyn LocalStore> = match config.storage.backend {
        BackendChoice::Embedded => Arc::new(SqliteStore::open(&config.database_path())?),
        BackendChoice::Blob => blob_store(config, &key_value),
        BackendChoice::Auto => match SqliteStore::open(&config.database_path()) {
            Ok(store) => Arc::new(store),
            Err(err) => {
                warn!(error = %err, "embedded database unavailable, using blob store");
                blob_store(config, &key_value)
            }
        },
    };

    info!(backend = %local.backend(), "local store opened");
    Ok(LocalStores { local, key_value })
}

fn blob_store(config: &Config, key_value: &Arc<dyn KeyValueStore>) -> Arc<dyn LocalStore> {
    Arc::new(BlobStore::new(
        key_value.clone(),
        config.storage.fallback_key.clone(),
    ))
}

/// HTTP client for the configured remote database.
pub fn open_remote_store(config: &Config) -> Result<Arc<HttpRemoteStore>, PurseError> {
    let url = config
        .remote
        .database_url
        .as_deref()
        .ok_or(PurseError::RemoteNotConfigured)?;
    Ok(Arc::new(HttpRemoteStore::with_timeout(
        url,
        config.remote.timeout(),
    )?))
}

/// Builds an unstarted [`Purse`] on the configured local backend, the
/// system clock and the given remote store.
pub fn build_purse(
    config: &Config,
    remote: Arc<dyn RemoteStore>,
    session: Session,
) -> Result<Purse, PurseError> {
    let LocalStores { local, key_value } = open_local_store(config)?;
    let options = PurseOptions {
        legacy_key: config.storage.legacy_key.clone(),
        fallback_key: config.storage.fallback_key.clone(),
    };
    Ok(Purse::new(
        local,
        remote,
        key_value,
        Arc::new(SystemClock),
        options,
        session,
    ))
}

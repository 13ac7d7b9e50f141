use serde::{de::Deserializer, Deserialize, Serialize};
use std::{fmt, path::PathBuf, time::Duration};

const APP_DIR: &str = "purse";

/// Data layer configuration. Every field has a default so partial files load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    /// Root for the database file and the key-value directory. Defaults to
    /// the platform data directory.
    pub data_dir: Option<PathBuf>,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub remote: RemoteConfig,
    #[serde(default = "Config::default_log_filter")]
    pub log_filter: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: None,
            storage: StorageConfig::default(),
            remote: RemoteConfig::default(),
            log_filter: Self::default_log_filter(),
        }
    }
}

impl Config {
    pub fn default_log_filter() -> String {
        "purse=info".into()
    }

    pub fn resolve_data_dir(&self) -> PathBuf {
        if let Some(path) = &self.data_dir {
            return path.clone();
        }

        let base = dirs::data_local_dir()
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| PathBuf::from("."));

        base.join(APP_DIR)
    }

    pub fn database_path(&self) -> PathBuf {
        self.resolve_data_dir().join(&self.storage.database_file)
    }

    pub fn key_value_dir(&self) -> PathBuf {
        self.resolve_data_dir().join(&self.storage.key_value_dir)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: BackendChoice,
    #[serde(default = "StorageConfig::default_database_file")]
    pub database_file: String,
    #[serde(default = "StorageConfig::default_key_value_dir")]
    pub key_value_dir: String,
    #[serde(default = "StorageConfig::default_legacy_key")]
    pub legacy_key: String,
    #[serde(default = "StorageConfig::default_fallback_key")]
    pub fallback_key: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: BackendChoice::default(),
            database_file: Self::default_database_file(),
            key_value_dir: Self::default_key_value_dir(),
            legacy_key: Self::default_legacy_key(),
            fallback_key: Self::default_fallback_key(),
        }
    }
}

impl StorageConfig {
    pub fn default_database_file() -> String {
        "purse.sqlite3".into()
    }

    pub fn default_key_value_dir() -> String {
        "kv".into()
    }

    pub fn default_legacy_key() -> String {
        "budgetTrackerData".into()
    }

    pub fn default_fallback_key() -> String {
        "budgetTrackerData_fallback".into()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_url: Option<String>,
    #[serde(default = "RemoteConfig::default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            timeout_secs: Self::default_timeout_secs(),
        }
    }
}

impl RemoteConfig {
    pub fn default_timeout_secs() -> u64 {
        30
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

/// Which local backend to open. `Auto` probes the embedded database first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BackendChoice {
    #[default]
    Auto,
    Embedded,
    Blob,
}

impl BackendChoice {
    pub fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "embedded" | "sqlite" => BackendChoice::Embedded,
            "blob" | "fallback" => BackendChoice::Blob,
            _ => BackendChoice::Auto,
        }
    }
}

impl fmt::Display for BackendChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            BackendChoice::Auto => "auto",
            BackendChoice::Embedded => "embedded",
            BackendChoice::Blob => "blob",
        };
        f.write_str(label)
    }
}

impl<'de> Deserialize<'de> for BackendChoice {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Option::<String>::deserialize(deserializer)?;
        Ok(value
            .map(|v| BackendChoice::from_str(&v))
            .unwrap_or_default())
    }
}

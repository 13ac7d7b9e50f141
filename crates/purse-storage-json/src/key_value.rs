use std::{
    collections::HashMap,
    fs::{self, File},
    io::{ErrorKind, Write},
    path::{Path, PathBuf},
    sync::Mutex,
};

use purse_core::{CoreError, KeyValueStore};

const VALUE_EXTENSION: &str = "json";
const TMP_SUFFIX: &str = "tmp";

/// One file per key under a directory. Writes go to a temp file first and
/// are renamed into place.
#[derive(Debug, Clone)]
pub struct FileKeyValueStore {
    root: PathBuf,
}

impl FileKeyValueStore {
    pub fn new(root: PathBuf) -> Result<Self, CoreError> {
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn value_path(&self, key: &str) -> PathBuf {
        self.root
            .join(format!("{}.{}", canonical_key(key), VALUE_EXTENSION))
    }
}

impl KeyValueStore for FileKeyValueStore {
    fn get_item(&self, key: &str) -> Result<Option<String>, CoreError> {
        match fs::read_to_string(self.value_path(key)) {
            Ok(value) => Ok(Some(value)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(key_value_error(key, err)),
        }
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), CoreError> {
        let path = self.value_path(key);
        let tmp = tmp_path(&path);
        write_atomic(&tmp, value).map_err(|err| key_value_error(key, err))?;
        fs::rename(&tmp, &path).map_err(|err| key_value_error(key, err))?;
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), CoreError> {
        match fs::remove_file(self.value_path(key)) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(key_value_error(key, err)),
        }
    }
}

/// Process-local key-value store.
#[derive(Debug, Default)]
pub struct MemoryKeyValueStore {
    items: Mutex<HashMap<String, String>>,
}

impl MemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn items(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.items
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl KeyValueStore for MemoryKeyValueStore {
    fn get_item(&self, key: &str) -> Result<Option<String>, CoreError> {
        Ok(self.items().get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), CoreError> {
        self.items().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), CoreError> {
        self.items().remove(key);
        Ok(())
    }
}

fn key_value_error(key: &str, err: std::io::Error) -> CoreError {
    CoreError::KeyValue {
        key: key.to_string(),
        message: err.to_string(),
    }
}

fn canonical_key(key: &str) -> String {
    let sanitized: String = key
        .trim()
        .chars()
        .map(|c| match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '_' | '-' => c,
            _ => '_',
        })
        .collect();
    if sanitized.trim_matches('_').is_empty() {
        "value".into()
    } else {
        sanitized
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut tmp = path.to_path_buf();
    let ext = match path.extension().and_then(|ext| ext.to_str()) {
        Some(existing) => format!("{}.{}", existing, TMP_SUFFIX),
        None => TMP_SUFFIX.to_string(),
    };
    tmp.set_extension(ext);
    tmp
}

fn write_atomic(path: &Path, data: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = File::create(path)?;
    file.write_all(data.as_bytes())?;
    file.flush()?;
    file.sync_all()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_map_to_safe_file_names() {
        assert_eq!(canonical_key("budgetTrackerData_fallback"), "budgetTrackerData_fallback");
        assert_eq!(canonical_key("../etc/passwd"), "___etc_passwd");
        assert_eq!(canonical_key("  "), "value");
    }

    #[test]
    fn tmp_path_appends_suffix() {
        let tmp = tmp_path(Path::new("/data/kv/main.json"));
        assert_eq!(tmp, PathBuf::from("/data/kv/main.json.tmp"));
    }
}

//! Remote document store capability.
//!
//! Paths are hierarchical and per user: `users/{uid}/profile` and
//! `users/{uid}/transactions/{transactionId}`. Writes overwrite by path.

use std::{
    collections::HashSet,
    fmt,
    sync::{
        atomic::{AtomicBool, Ordering},
        Mutex, MutexGuard,
    },
};

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RemotePath(String);

impl RemotePath {
    pub fn profile(uid: &str) -> Self {
        Self(format!("users/{uid}/profile"))
    }

    pub fn transactions(uid: &str) -> Self {
        Self(format!("users/{uid}/transactions"))
    }

    pub fn transaction(uid: &str, transaction_id: &str) -> Self {
        Self(format!("users/{uid}/transactions/{transaction_id}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/').filter(|segment| !segment.is_empty())
    }
}

impl fmt::Display for RemotePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RemoteError {
    #[error("remote unavailable: {0}")]
    Unavailable(String),
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    #[error("remote rejected the request: {0}")]
    Rejected(String),
    #[error("unexpected remote payload: {0}")]
    Payload(String),
}

#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Overwrites the value at `path`.
    async fn set(&self, path: &RemotePath, value: Value) -> Result<(), RemoteError>;

    /// Reads the subtree at `path`; `None` when nothing is stored there.
    async fn get(&self, path: &RemotePath) -> Result<Option<Value>, RemoteError>;

    /// Removes the subtree at `path`. Removing a missing path succeeds.
    async fn remove(&self, path: &RemotePath) -> Result<(), RemoteError>;
}

/// In-process remote store with a write log and failure injection.
#[derive(Debug, Default)]
pub struct MemoryRemoteStore {
    root: Mutex<Map<String, Value>>,
    writes: Mutex<Vec<RemotePath>>,
    failing: Mutex<HashSet<String>>,
    outage: AtomicBool,
}

impl MemoryRemoteStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every call fail with [`RemoteError::Unavailable`] until lifted.
    pub fn set_outage(&self, outage: bool) {
        self.outage.store(outage, Ordering::SeqCst);
    }

    /// Makes writes to `path` fail with [`RemoteError::Rejected`].
    pub fn fail_writes_to(&self, path: &RemotePath) {
        lock(&self.failing).insert(path.as_str().to_owned());
    }

    pub fn clear_failures(&self) {
        lock(&self.failing).clear();
    }

    /// Every attempted write, successful or not, in call order.
    pub fn write_log(&self) -> Vec<RemotePath> {
        lock(&self.writes).clone()
    }

    pub fn clear_write_log(&self) {
        lock(&self.writes).clear();
    }

    /// Reads a subtree bypassing outages and failure injection.
    pub fn snapshot(&self, path: &RemotePath) -> Option<Value> {
        let root = lock(&self.root);
        lookup(&root, path).cloned()
    }

    /// Stores a subtree without touching the write log.
    pub fn seed(&self, path: &RemotePath, value: Value) {
        let mut root = lock(&self.root);
        insert(&mut root, path, value);
    }

    fn check_outage(&self) -> Result<(), RemoteError> {
        if self.outage.load(Ordering::SeqCst) {
            return Err(RemoteError::Unavailable("network unreachable".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteStore for MemoryRemoteStore {
    async fn set(&self, path: &RemotePath, value: Value) -> Result<(), RemoteError> {
        lock(&self.writes).push(path.clone());
        self.check_outage()?;
        if lock(&self.failing).contains(path.as_str()) {
            return Err(RemoteError::Rejected(format!("write to {path} refused")));
        }
        insert(&mut lock(&self.root), path, value);
        Ok(())
    }

    async fn get(&self, path: &RemotePath) -> Result<Option<Value>, RemoteError> {
        self.check_outage()?;
        Ok(lookup(&lock(&self.root), path).cloned())
    }

    async fn remove(&self, path: &RemotePath) -> Result<(), RemoteError> {
        self.check_outage()?;
        let mut root = lock(&self.root);
        let segments: Vec<&str> = path.segments().collect();
        let Some((last, parents)) = segments.split_last() else {
            root.clear();
            return Ok(());
        };
        let mut node = &mut *root;
        for segment in parents {
            match node.get_mut(*segment) {
                Some(Value::Object(child)) => node = child,
                _ => return Ok(()),
            }
        }
        node.remove(*last);
        Ok(())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn lookup<'a>(root: &'a Map<String, Value>, path: &RemotePath) -> Option<&'a Value> {
    let mut segments = path.segments();
    let first = segments.next()?;
    let mut node = root.get(first)?;
    for segment in segments {
        node = node.as_object()?.get(segment)?;
    }
    Some(node)
}

fn insert(root: &mut Map<String, Value>, path: &RemotePath, value: Value) {
    let segments: Vec<&str> = path.segments().collect();
    let Some((last, parents)) = segments.split_last() else {
        return;
    };
    let mut node = root;
    for segment in parents {
        let child = node
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if !child.is_object() {
            *child = Value::Object(Map::new());
        }
        node = match child {
            Value::Object(map) => map,
            _ => return,
        };
    }
    node.insert(last.to_string(), value);
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn paths_follow_the_per_user_layout() {
        assert_eq!(RemotePath::profile("u1").as_str(), "users/u1/profile");
        assert_eq!(
            RemotePath::transaction("u1", "t9").as_str(),
            "users/u1/transactions/t9"
        );
    }

    #[tokio::test]
    async fn children_are_visible_from_the_parent_path() {
        let remote = MemoryRemoteStore::new();
        remote
            .set(&RemotePath::transaction("u1", "a"), json!({ "id": "a" }))
            .await
            .unwrap();
        remote
            .set(&RemotePath::transaction("u1", "b"), json!({ "id": "b" }))
            .await
            .unwrap();

        let all = remote.get(&RemotePath::transactions("u1")).await.unwrap().unwrap();
        assert_eq!(all.as_object().unwrap().len(), 2);
        assert!(remote.get(&RemotePath::transactions("u2")).await.unwrap().is_none());

        remote.remove(&RemotePath::transaction("u1", "a")).await.unwrap();
        let all = remote.get(&RemotePath::transactions("u1")).await.unwrap().unwrap();
        assert_eq!(all, json!({ "b": { "id": "b" } }));
    }

    #[tokio::test]
    async fn injected_failures_are_logged_and_reported() {
        let remote = MemoryRemoteStore::new();
        let path = RemotePath::transaction("u1", "x");
        remote.fail_writes_to(&path);

        let err = remote.set(&path, json!({})).await.unwrap_err();
        assert!(matches!(err, RemoteError::Rejected(_)));
        assert_eq!(remote.write_log(), vec![path.clone()]);
        assert!(remote.snapshot(&path).is_none());

        remote.set_outage(true);
        let err = remote.get(&path).await.unwrap_err();
        assert!(matches!(err, RemoteError::Unavailable(_)));
    }
}

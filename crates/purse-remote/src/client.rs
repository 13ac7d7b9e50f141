use std::{
    sync::{RwLock, RwLockReadGuard},
    time::Duration,
};

use async_trait::async_trait;
use purse_core::{RemoteError, RemotePath, RemoteStore};
use reqwest::StatusCode;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::HttpRemoteError;

const DEFAULT_TIMEOUT_SECS: u64 = 30;
const MAX_LOG_BODY_CHARS: usize = 512;

/// REST client for the remote document database.
///
/// Every path maps to `{base_url}/{path}.json`; the signed-in user's ID token
/// is sent as the `auth` query parameter.
#[derive(Debug)]
pub struct HttpRemoteStore {
    client: reqwest::Client,
    base_url: String,
    auth_token: RwLock<Option<String>>,
}

impl HttpRemoteStore {
    pub fn new(base_url: &str) -> Result<Self, HttpRemoteError> {
        Self::with_timeout(base_url, Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self, HttpRemoteError> {
        let base_url = base_url.trim().trim_end_matches('/');
        if base_url.is_empty() {
            return Err(HttpRemoteError::Config("remote database url is empty".into()));
        }
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.to_string(),
            auth_token: RwLock::new(None),
        })
    }

    pub fn set_auth_token(&self, token: Option<String>) {
        let mut slot = self
            .auth_token
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *slot = token;
    }

    fn token(&self) -> RwLockReadGuard<'_, Option<String>> {
        self.auth_token
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn url_for(&self, path: &RemotePath) -> String {
        let encoded: Vec<String> = path
            .segments()
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect();
        let mut url = format!("{}/{}.json", self.base_url, encoded.join("/"));
        if let Some(token) = self.token().as_deref() {
            url.push_str("?auth=");
            url.push_str(&urlencoding::encode(token));
        }
        url
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, HttpRemoteError> {
        let status = response.status();
        if status.is_success() {
            debug!(%status, "remote response");
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        let mut preview = body.chars().take(MAX_LOG_BODY_CHARS).collect::<String>();
        if body.chars().count() > MAX_LOG_BODY_CHARS {
            preview.push_str("...");
        }
        warn!(%status, body = %preview, "remote request failed");
        Err(HttpRemoteError::api(status.as_u16(), error_message(status, &body)))
    }

    async fn put_value(&self, path: &RemotePath, value: &Value) -> Result<(), HttpRemoteError> {
        let response = self.client.put(self.url_for(path)).json(value).send().await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn get_value(&self, path: &RemotePath) -> Result<Option<Value>, HttpRemoteError> {
        let response = self.client.get(self.url_for(path)).send().await?;
        let response = Self::check(response).await?;
        let body = response.text().await?;
        let value: Value = serde_json::from_str(&body)?;
        Ok((!value.is_null()).then_some(value))
    }

    async fn delete_value(&self, path: &RemotePath) -> Result<(), HttpRemoteError> {
        let response = self.client.delete(self.url_for(path)).send().await?;
        Self::check(response).await?;
        Ok(())
    }
}

/// Pulls the `error` field out of a JSON error body when there is one.
fn error_message(status: StatusCode, body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|value| value.get("error").and_then(Value::as_str).map(str::to_owned))
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("request failed")
                .to_string()
        })
}

#[async_trait]
impl RemoteStore for HttpRemoteStore {
    async fn set(&self, path: &RemotePath, value: Value) -> Result<(), RemoteError> {
        debug!(%path, "remote set");
        self.put_value(path, &value).await.map_err(RemoteError::from)
    }

    async fn get(&self, path: &RemotePath) -> Result<Option<Value>, RemoteError> {
        debug!(%path, "remote get");
        self.get_value(path).await.map_err(RemoteError::from)
    }

    async fn remove(&self, path: &RemotePath) -> Result<(), RemoteError> {
        debug!(%path, "remote remove");
        self.delete_value(path).await.map_err(RemoteError::from)
    }
}

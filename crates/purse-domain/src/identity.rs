//! Signed-in identity handed to the data layer by the authentication layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The current signed-in user. Absent for guest sessions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub uid: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub photo_url: Option<String>,
}

impl Identity {
    pub fn new(uid: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            email: None,
            display_name: None,
            photo_url: None,
        }
    }

    pub fn profile(&self, last_login: DateTime<Utc>) -> UserProfile {
        UserProfile {
            uid: self.uid.clone(),
            email: self.email.clone(),
            display_name: self.display_name.clone(),
            photo_url: self.photo_url.clone(),
            last_login,
        }
    }
}

/// Profile snapshot written to the remote store on sign-in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub uid: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
    #[serde(rename = "photoURL")]
    pub photo_url: Option<String>,
    pub last_login: DateTime<Utc>,
}

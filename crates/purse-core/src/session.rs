//! Signed-in state, connectivity and the user-facing notices produced by the
//! data layer.

use std::fmt;

use purse_domain::Identity;

/// What the data layer knows about the current user and the network.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub identity: Option<Identity>,
    pub online: bool,
}

impl Session {
    pub fn guest(online: bool) -> Self {
        Self {
            identity: None,
            online,
        }
    }

    pub fn signed_in(identity: Identity, online: bool) -> Self {
        Self {
            identity: Some(identity),
            online,
        }
    }

    pub fn is_signed_in(&self) -> bool {
        self.identity.is_some()
    }

    /// The identity to talk to the remote store as, if the remote is usable now.
    pub fn remote_identity(&self) -> Option<&Identity> {
        self.identity.as_ref().filter(|_| self.online)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// Short message meant for the person using the app.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn info(message: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Info, message)
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Success, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Warning, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Error, message)
    }

    fn new(level: NoticeLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
        }
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

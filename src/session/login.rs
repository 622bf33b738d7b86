//! Placeholder login policy: one shared credential pair and a protocol version

use crate::config::Config;

#[derive(Debug, Clone)]
pub struct LoginPolicy {
    version: String,
    username: String,
    password: String,
}

/// Result of a login attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginOutcome {
    Accepted,
    VersionMismatch,
    InvalidCredentials,
}

impl LoginPolicy {
    pub fn new(
        version: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            version: version.into(),
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.app_version.clone(),
            config.login_username.clone(),
            config.login_password.clone(),
        )
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn check_credentials(&self, username: &str, password: &str) -> bool {
        username == self.username && password == self.password
    }

    /// Version is checked first; a client on the wrong version never gets to
    /// the credential check.
    pub fn evaluate(&self, username: &str, password: &str, version: &str) -> LoginOutcome {
        if version != self.version {
            LoginOutcome::VersionMismatch
        } else if !self.check_credentials(username, password) {
            LoginOutcome::InvalidCredentials
        } else {
            LoginOutcome::Accepted
        }
    }
}

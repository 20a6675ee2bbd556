//! Where the portal login comes from

use crate::config::CredentialsConfig;
use std::fmt;

/// A portal username and password
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn password(&self) -> &str {
        &self.password
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Supplies credentials at the start of a run
pub trait CredentialSource: Send + Sync {
    /// Returns None when nothing usable is stored
    fn load_credentials(&self) -> Option<Credentials>;
}

/// Reads credentials from two environment variables
#[derive(Debug, Clone)]
pub struct EnvCredentials {
    username_var: String,
    password_var: String,
}

impl EnvCredentials {
    pub fn new(username_var: impl Into<String>, password_var: impl Into<String>) -> Self {
        Self {
            username_var: username_var.into(),
            password_var: password_var.into(),
        }
    }

    pub fn from_config(config: &CredentialsConfig) -> Self {
        Self::new(&config.username_env, &config.password_env)
    }
}

impl CredentialSource for EnvCredentials {
    fn load_credentials(&self) -> Option<Credentials> {
        let username = std::env::var(&self.username_var).ok()?;
        let password = std::env::var(&self.password_var).ok()?;
        if username.trim().is_empty() || password.is_empty() {
            return None;
        }
        Some(Credentials::new(username.trim(), password))
    }
}

/// Fixed credentials (or none), for embedding and tests
#[derive(Debug, Clone, Default)]
pub struct StaticCredentials(Option<Credentials>);

impl StaticCredentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self(Some(Credentials::new(username, password)))
    }

    pub fn none() -> Self {
        Self(None)
    }
}

impl CredentialSource for StaticCredentials {
    fn load_credentials(&self) -> Option<Credentials> {
        self.0.clone()
    }
}

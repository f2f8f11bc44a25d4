//! vCenter credentials and per-target resolution.

use crate::config::VcenterConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A vCenter user/password pair.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    #[serde(default)]
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***REDACTED***")
            .finish()
    }
}

/// Resolves the credentials to use for a probe target.
pub trait CredentialProvider: Send + Sync {
    /// Return the credentials for `target`, or `None` when the target is unknown.
    fn resolve(&self, target: &str) -> Option<Credentials>;
}

/// One credential pair for every target.
#[derive(Debug, Clone)]
pub struct StaticCredentials(Credentials);

impl StaticCredentials {
    pub fn new(credentials: Credentials) -> Self {
        Self(credentials)
    }
}

impl CredentialProvider for StaticCredentials {
    fn resolve(&self, _target: &str) -> Option<Credentials> {
        Some(self.0.clone())
    }
}

/// Per-target credentials with an optional process-wide fallback.
///
/// Lookup tries the full target (`host:port`) first, then the bare host.
/// Target keys compare case-insensitively, since host names do and the
/// config loader lowercases keys read from files.
#[derive(Debug, Clone, Default)]
pub struct TargetCredentials {
    targets: HashMap<String, Credentials>,
    fallback: Option<Credentials>,
}

impl TargetCredentials {
    pub fn new(targets: HashMap<String, Credentials>, fallback: Option<Credentials>) -> Self {
        let targets = targets
            .into_iter()
            .map(|(target, creds)| (target.to_ascii_lowercase(), creds))
            .collect();
        Self { targets, fallback }
    }
}

impl From<&VcenterConfig> for TargetCredentials {
    fn from(config: &VcenterConfig) -> Self {
        let fallback = (!config.username.is_empty())
            .then(|| Credentials::new(&config.username, &config.password));
        Self::new(config.targets.clone(), fallback)
    }
}

impl CredentialProvider for TargetCredentials {
    fn resolve(&self, target: &str) -> Option<Credentials> {
        let target = target.to_ascii_lowercase();
        if let Some(creds) = self.targets.get(&target) {
            return Some(creds.clone());
        }

        let host = crate::prober::split_host(&target);
        self.targets
            .get(host)
            .or(self.fallback.as_ref())
            .cloned()
    }
}

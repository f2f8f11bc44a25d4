//! Configuration management for the VMware exporter.
//!
//! Supports loading configuration from:
//! - TOML configuration files
//! - Environment variables (with `VMWARE_EXPORTER__` prefix)
//! - The flat `HOST`, `PORT`, `VCENTER_USER` and `VCENTER_PASS` variables
//!   used by earlier deployments of the exporter

use crate::credentials::Credentials;
use crate::error::{Result, VcenterError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

/// vCenter connection settings shared by every probe.
#[derive(Clone, Serialize, Deserialize)]
pub struct VcenterConfig {
    /// Default user applied to targets without an entry in `targets`
    #[serde(default)]
    pub username: String,

    /// Default password applied to targets without an entry in `targets`
    #[serde(default)]
    pub password: String,

    /// Per-target credential overrides, keyed by the probe `target` value
    #[serde(default)]
    pub targets: HashMap<String, Credentials>,

    /// Port used when the probe target does not carry one
    #[serde(default = "default_port")]
    pub port: u16,

    /// URL scheme for the vCenter REST API
    #[serde(default = "default_scheme")]
    pub scheme: String,

    /// Verify TLS certificates (vCenter appliances usually run self-signed)
    #[serde(default = "default_verify_tls")]
    pub verify_tls: bool,

    /// Timeout for a single vCenter API call, in seconds
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// Deadline for a whole probe, in seconds
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_seconds: u64,
}

impl VcenterConfig {
    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_seconds)
    }
}

impl std::fmt::Debug for VcenterConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VcenterConfig")
            .field("username", &self.username)
            .field("password", &"***REDACTED***")
            .field("targets", &self.targets)
            .field("port", &self.port)
            .field("scheme", &self.scheme)
            .field("verify_tls", &self.verify_tls)
            .field("timeout_seconds", &self.timeout_seconds)
            .field("probe_timeout_seconds", &self.probe_timeout_seconds)
            .finish()
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Text,
    Json,
}

/// Exporter specific settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExporterConfig {
    /// Address to listen on for the probe endpoint
    #[serde(default = "default_listen_address")]
    pub listen_address: String,
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Log line format
    #[serde(default = "default_log_format")]
    pub log_format: LogFormat,
}

/// Main configuration structure for the VMware exporter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// vCenter configuration
    #[serde(default = "default_vcenter")]
    pub vcenter: VcenterConfig,

    /// Exporter server configuration
    #[serde(default = "default_exporter")]
    pub exporter: ExporterConfig,
}

fn default_port() -> u16 {
    443
}

fn default_scheme() -> String {
    "https".to_string()
}

fn default_verify_tls() -> bool {
    false
}

fn default_timeout() -> u64 {
    10
}

fn default_probe_timeout() -> u64 {
    30
}

fn default_listen_host() -> &'static str {
    "0.0.0.0"
}

fn default_listen_port() -> u16 {
    9141
}

fn default_listen_address() -> String {
    format!("{}:{}", default_listen_host(), default_listen_port())
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> LogFormat {
    LogFormat::Text
}

fn default_vcenter() -> VcenterConfig {
    VcenterConfig {
        username: String::new(),
        password: String::new(),
        targets: HashMap::new(),
        port: default_port(),
        scheme: default_scheme(),
        verify_tls: default_verify_tls(),
        timeout_seconds: default_timeout(),
        probe_timeout_seconds: default_probe_timeout(),
    }
}

fn default_exporter() -> ExporterConfig {
    ExporterConfig {
        listen_address: default_listen_address(),
        log_level: default_log_level(),
        log_format: default_log_format(),
    }
}

impl Settings {
    /// Load configuration from a file and environment variables.
    ///
    /// # Arguments
    ///
    /// * `config_path` - Optional path to configuration file
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use vmware_exporter::config::Settings;
    ///
    /// let settings = Settings::load(Some("config/default.toml")).unwrap();
    /// ```
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let mut builder = config::Config::builder();

        // Add config file if provided
        if let Some(path) = config_path {
            if Path::new(path).exists() {
                builder = builder.add_source(config::File::with_name(path));
            }
        }

        // Add environment variables with VMWARE_EXPORTER__ prefix
        builder = builder.add_source(
            config::Environment::with_prefix("VMWARE_EXPORTER")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        for (key, value) in legacy_overrides(|name| std::env::var(name).ok()) {
            builder = builder.set_override(key, value)?;
        }

        let config = builder.build()?;
        let settings: Settings = config.try_deserialize()?;

        settings.validate()?;
        Ok(settings)
    }

    /// Validate configuration settings.
    fn validate(&self) -> Result<()> {
        let vcenter = &self.vcenter;

        if vcenter.scheme != "https" && vcenter.scheme != "http" {
            return Err(config_error(format!(
                "Unsupported vCenter scheme '{}'",
                vcenter.scheme
            )));
        }

        if vcenter.timeout_seconds == 0 || vcenter.probe_timeout_seconds == 0 {
            return Err(config_error("vCenter timeouts must be greater than zero"));
        }

        if vcenter.probe_timeout_seconds < vcenter.timeout_seconds {
            return Err(config_error(
                "Probe timeout cannot be shorter than the per-call timeout",
            ));
        }

        if vcenter.username.is_empty() && vcenter.targets.is_empty() {
            return Err(config_error("vCenter credentials are required"));
        }

        Ok(())
    }
}

fn config_error(msg: impl Into<String>) -> VcenterError {
    VcenterError::Config(config::ConfigError::Message(msg.into()))
}

/// Map the flat variable names of earlier deployments onto settings keys.
fn legacy_overrides(lookup: impl Fn(&str) -> Option<String>) -> Vec<(&'static str, String)> {
    let mut overrides = Vec::new();

    if let Some(user) = lookup("VCENTER_USER") {
        overrides.push(("vcenter.username", user));
    }
    if let Some(pass) = lookup("VCENTER_PASS") {
        overrides.push(("vcenter.password", pass));
    }

    let host = lookup("HOST");
    let port = lookup("PORT");
    if host.is_some() || port.is_some() {
        let host = host.unwrap_or_else(|| default_listen_host().to_string());
        let port = port.unwrap_or_else(|| default_listen_port().to_string());
        let address = if host.contains(':') {
            format!("[{}]:{}", host, port)
        } else {
            format!("{}:{}", host, port)
        };
        overrides.push(("exporter.listen_address", address));
    }

    overrides
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            vcenter: default_vcenter(),
            exporter: default_exporter(),
        }
    }
}

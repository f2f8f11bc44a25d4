//! vCenter REST API client.
//!
//! This module provides the session-based client used by a probe to
//! authenticate against vCenter, read datacenter, datastore and host
//! inventory, and release the session again.

use crate::config::VcenterConfig;
use crate::credentials::Credentials;
use crate::error::{Result, VcenterError};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Header carrying the session token on authenticated calls.
pub const SESSION_HEADER: &str = "vmware-api-session-id";

const SESSION_PATH: &str = "/api/session";

/// Value of `power_state` for a running host.
pub const POWERED_ON: &str = "POWERED_ON";

/// Value of `connection_state` for a host reachable by vCenter.
pub const CONNECTED: &str = "CONNECTED";

/// Opaque vCenter session identifier.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionToken(String);

impl SessionToken {
    /// Build a token from a raw `POST /api/session` body.
    ///
    /// vCenter returns the identifier as a JSON string, so surrounding
    /// whitespace and quote characters are stripped.
    pub fn from_body(body: &str) -> Result<Self> {
        let token = body.trim().trim_matches('"');
        if token.is_empty() {
            return Err(VcenterError::Auth("empty session token".to_string()));
        }
        Ok(Self(token.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SessionToken(***REDACTED***)")
    }
}

/// Missing fields and explicit `null`s both decode to the type's default.
fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Datacenter summary from `GET /api/vcenter/datacenter`.
#[derive(Debug, Clone, Deserialize)]
pub struct Datacenter {
    /// Display name
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    /// Managed object identifier (e.g. "datacenter-3")
    #[serde(default, deserialize_with = "null_as_default")]
    pub datacenter: String,
}

/// Datastore summary from `GET /api/vcenter/datastore`.
#[derive(Debug, Clone, Deserialize)]
pub struct Datastore {
    /// Managed object identifier
    #[serde(default, deserialize_with = "null_as_default")]
    pub datastore: String,
    /// Display name
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    /// Filesystem type (VMFS, NFS, VSAN, ...)
    #[serde(rename = "type", default, deserialize_with = "null_as_default")]
    pub datastore_type: String,
    /// Free space in bytes
    #[serde(default, deserialize_with = "null_as_default")]
    pub free_space: u64,
    /// Capacity in bytes
    #[serde(default, deserialize_with = "null_as_default")]
    pub capacity: u64,
}

/// ESXi host summary from `GET /api/vcenter/host`.
#[derive(Debug, Clone, Deserialize)]
pub struct Host {
    /// Managed object identifier
    #[serde(default, deserialize_with = "null_as_default")]
    pub host: String,
    /// Display name
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    /// CONNECTED, DISCONNECTED or NOT_RESPONDING
    #[serde(default, deserialize_with = "null_as_default")]
    pub connection_state: String,
    /// POWERED_ON, POWERED_OFF or STANDBY
    #[serde(default, deserialize_with = "null_as_default")]
    pub power_state: String,
}

impl Host {
    pub fn is_powered_on(&self) -> bool {
        self.power_state == POWERED_ON
    }

    pub fn is_connected(&self) -> bool {
        self.connection_state == CONNECTED
    }
}

/// Operations a probe performs against one vCenter.
#[async_trait]
pub trait VcenterApi: Send + Sync {
    /// Create a session. Succeeds only on `201 Created`.
    async fn authenticate(&self, credentials: &Credentials) -> Result<SessionToken>;

    /// List datacenters matching `datacenter`.
    async fn get_datacenter(&self, token: &SessionToken, datacenter: &str)
        -> Result<Vec<Datacenter>>;

    /// List datastores in `datacenter`.
    async fn get_datastores(&self, token: &SessionToken, datacenter: &str)
        -> Result<Vec<Datastore>>;

    /// List hosts in `datacenter`.
    async fn get_hosts(&self, token: &SessionToken, datacenter: &str) -> Result<Vec<Host>>;

    /// Delete the session. Failures are logged and swallowed.
    async fn logout(&self, token: &SessionToken);
}

/// vCenter API client backed by `reqwest`.
#[derive(Clone)]
pub struct VcenterClient {
    client: Client,
    endpoint: String,
}

impl VcenterClient {
    /// Create a new vCenter API client.
    ///
    /// # Arguments
    ///
    /// * `endpoint` - Base URL of the vCenter, e.g. "https://vc.example.com:443"
    /// * `timeout` - Timeout applied to every call
    /// * `verify_tls` - Whether to verify the server certificate
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use std::time::Duration;
    /// use vmware_exporter::client::VcenterClient;
    ///
    /// let client = VcenterClient::new("https://vc.example.com:443", Duration::from_secs(10), false).unwrap();
    /// ```
    pub fn new(endpoint: impl Into<String>, timeout: Duration, verify_tls: bool) -> Result<Self> {
        // Idle connections are never kept, so each call closes its own connection.
        let client = Client::builder()
            .timeout(timeout)
            .danger_accept_invalid_certs(!verify_tls)
            .pool_max_idle_per_host(0)
            .build()?;

        let endpoint = endpoint.into().trim_end_matches('/').to_string();

        Ok(Self { client, endpoint })
    }

    async fn get_list<T: DeserializeOwned>(
        &self,
        token: &SessionToken,
        resource: &str,
        datacenter: &str,
    ) -> Result<Vec<T>> {
        let url = format!("{}/api/vcenter/{}", self.endpoint, resource);
        debug!("Fetching {} for datacenter {} from: {}", resource, datacenter, url);

        let response = self
            .client
            .get(&url)
            .query(&[("datacenters", datacenter)])
            .header(SESSION_HEADER, token.as_str())
            .send()
            .await?;

        if response.status() != StatusCode::OK {
            warn!("Failed to get {}: {}", resource, response.status());
            return Err(VcenterError::Status {
                status: response.status().as_u16(),
            });
        }

        let body = response.text().await?;
        debug!("Raw {} response: {} bytes", resource, body.len());

        serde_json::from_str(&body).map_err(|e| {
            VcenterError::Decode(format!(
                "{}: {}. Body preview: {}",
                resource,
                e,
                preview(&body)
            ))
        })
    }
}

#[async_trait]
impl VcenterApi for VcenterClient {
    async fn authenticate(&self, credentials: &Credentials) -> Result<SessionToken> {
        let url = format!("{}{}", self.endpoint, SESSION_PATH);
        debug!("Creating session as {} at: {}", credentials.username, url);

        let response = self
            .client
            .post(&url)
            .basic_auth(&credentials.username, Some(&credentials.password))
            .send()
            .await?;

        if response.status() != StatusCode::CREATED {
            warn!("Failed to create session: {}", response.status());
            return Err(VcenterError::Status {
                status: response.status().as_u16(),
            });
        }

        let body = response.text().await?;
        SessionToken::from_body(&body)
    }

    async fn get_datacenter(
        &self,
        token: &SessionToken,
        datacenter: &str,
    ) -> Result<Vec<Datacenter>> {
        self.get_list(token, "datacenter", datacenter).await
    }

    async fn get_datastores(
        &self,
        token: &SessionToken,
        datacenter: &str,
    ) -> Result<Vec<Datastore>> {
        self.get_list(token, "datastore", datacenter).await
    }

    async fn get_hosts(&self, token: &SessionToken, datacenter: &str) -> Result<Vec<Host>> {
        self.get_list(token, "host", datacenter).await
    }

    async fn logout(&self, token: &SessionToken) {
        let url = format!("{}{}", self.endpoint, SESSION_PATH);
        debug!("Deleting session at: {}", url);

        match self
            .client
            .delete(&url)
            .header(SESSION_HEADER, token.as_str())
            .send()
            .await
        {
            Ok(response) if response.status() == StatusCode::OK => {}
            Ok(response) => warn!("Logout returned unexpected status: {}", response.status()),
            Err(e) => warn!("Logout failed: {}", e),
        }
    }
}

fn preview(body: &str) -> &str {
    match body.char_indices().nth(200) {
        Some((idx, _)) => &body[..idx],
        None => body,
    }
}

/// Builds a fresh API client for each probed vCenter.
pub trait ApiConnector: Send + Sync {
    fn connect(&self, host: &str, port: u16) -> Result<Arc<dyn VcenterApi>>;
}

/// Connector producing [`VcenterClient`]s from the shared vCenter settings.
#[derive(Debug, Clone)]
pub struct HttpConnector {
    scheme: String,
    timeout: Duration,
    verify_tls: bool,
}

impl HttpConnector {
    pub fn new(config: &VcenterConfig) -> Self {
        Self {
            scheme: config.scheme.clone(),
            timeout: config.call_timeout(),
            verify_tls: config.verify_tls,
        }
    }

    /// Base URL for `host:port`, bracketing IPv6 literals.
    pub fn endpoint(&self, host: &str, port: u16) -> String {
        if host.contains(':') {
            format!("{}://[{}]:{}", self.scheme, host, port)
        } else {
            format!("{}://{}:{}", self.scheme, host, port)
        }
    }
}

impl ApiConnector for HttpConnector {
    fn connect(&self, host: &str, port: u16) -> Result<Arc<dyn VcenterApi>> {
        let client = VcenterClient::new(self.endpoint(host, port), self.timeout, self.verify_tls)?;
        Ok(Arc::new(client))
    }
}

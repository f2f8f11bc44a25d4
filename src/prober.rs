//! Probe orchestration.
//!
//! A probe authenticates against one vCenter, resolves the requested
//! datacenter, reads its datastores and hosts, and turns them into a
//! [`ProbeMetrics`] set. Once a session exists it is released on every exit
//! path.

use crate::client::{ApiConnector, Datacenter, Datastore, Host, SessionToken, VcenterApi};
use crate::credentials::{CredentialProvider, Credentials};
use crate::error::{Result, VcenterError};
use crate::metrics::ProbeMetrics;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Query parameters of a `/probe` request.
#[derive(Debug, Clone, Default)]
pub struct ProbeQuery {
    pub target: Option<String>,
    pub dc: Option<String>,
}

impl ProbeQuery {
    pub fn new(target: impl Into<String>, dc: impl Into<String>) -> Self {
        Self {
            target: Some(target.into()),
            dc: Some(dc.into()),
        }
    }

    /// Build a query from raw `(name, value)` pairs.
    ///
    /// A repeated parameter keeps its first value. Unknown parameters are ignored.
    pub fn from_pairs(pairs: impl IntoIterator<Item = (String, String)>) -> Self {
        let mut query = Self::default();
        for (name, value) in pairs {
            let slot = match name.as_str() {
                "target" => &mut query.target,
                "dc" => &mut query.dc,
                _ => continue,
            };
            if slot.is_none() {
                *slot = Some(value);
            }
        }
        query
    }
}

/// Fully resolved probe target.
#[derive(Debug, Clone)]
pub struct ProbeTarget {
    pub host: String,
    pub port: u16,
    pub datacenter: String,
    pub credentials: Credentials,
}

/// Builds and runs probes for incoming scrape requests.
pub struct Prober {
    connector: Arc<dyn ApiConnector>,
    credentials: Arc<dyn CredentialProvider>,
    default_port: u16,
    deadline: Duration,
}

impl Prober {
    pub fn new(
        connector: Arc<dyn ApiConnector>,
        credentials: Arc<dyn CredentialProvider>,
        default_port: u16,
        deadline: Duration,
    ) -> Self {
        Self {
            connector,
            credentials,
            default_port,
            deadline,
        }
    }

    /// Validate the query and resolve it into a [`ProbeTarget`].
    ///
    /// No network activity happens here.
    pub fn resolve(&self, query: &ProbeQuery) -> Result<ProbeTarget> {
        let target = non_empty(query.target.as_deref()).ok_or(VcenterError::MissingTarget)?;
        let dc = non_empty(query.dc.as_deref()).ok_or(VcenterError::MissingDatacenter)?;

        let (host, port) = parse_target(target, self.default_port)?;
        let credentials = self
            .credentials
            .resolve(target)
            .ok_or_else(|| VcenterError::NoCredentials(target.to_string()))?;

        Ok(ProbeTarget {
            host,
            port,
            datacenter: dc.to_string(),
            credentials,
        })
    }

    /// Run a complete probe for `query`.
    pub async fn probe(&self, query: &ProbeQuery) -> Result<ProbeMetrics> {
        let target = self.resolve(query)?;
        let api = self.connector.connect(&target.host, target.port)?;
        run_probe(api, &target, self.deadline).await
    }
}

/// Run the authenticate, fetch, logout sequence against `api`.
///
/// Datastore and host inventory are only mapped into metrics once every
/// fetch has succeeded.
pub async fn run_probe(
    api: Arc<dyn VcenterApi>,
    target: &ProbeTarget,
    deadline: Duration,
) -> Result<ProbeMetrics> {
    let session = Session::open(api, &target.credentials).await?;

    let fetched = tokio::time::timeout(deadline, fetch_inventory(&session, &target.datacenter))
        .await
        .unwrap_or(Err(VcenterError::Timeout(deadline)));

    session.release().await;

    let (datacenter, datastores, hosts) = fetched?;

    let metrics = ProbeMetrics::new()?;
    for ds in &datastores {
        metrics.record_datastore(&datacenter.name, ds);
    }
    for host in &hosts {
        metrics.record_host(&datacenter.name, host);
    }

    debug!(
        datacenter = %datacenter.name,
        datastores = datastores.len(),
        hosts = hosts.len(),
        "Collected vCenter inventory"
    );

    Ok(metrics)
}

async fn fetch_inventory(
    session: &Session,
    dc: &str,
) -> Result<(Datacenter, Vec<Datastore>, Vec<Host>)> {
    let token = session.token()?;

    let datacenters = session.api.get_datacenter(token, dc).await?;
    let datacenter = single_datacenter(dc, datacenters)?;
    debug!("Resolved datacenter {} ({})", datacenter.name, datacenter.datacenter);

    let datastores = session.api.get_datastores(token, dc).await?;
    let hosts = session.api.get_hosts(token, dc).await?;

    Ok((datacenter, datastores, hosts))
}

fn single_datacenter(dc: &str, mut datacenters: Vec<Datacenter>) -> Result<Datacenter> {
    match datacenters.len() {
        0 => Err(VcenterError::DatacenterNotFound(dc.to_string())),
        1 => Ok(datacenters.remove(0)),
        count => Err(VcenterError::AmbiguousDatacenter {
            name: dc.to_string(),
            count,
        }),
    }
}

/// An authenticated vCenter session owned by a single probe.
///
/// [`Session::release`] logs out. If the session is dropped without being
/// released (the probe future was cancelled), logout is spawned onto the
/// current runtime instead.
struct Session {
    api: Arc<dyn VcenterApi>,
    token: Option<SessionToken>,
}

impl Session {
    async fn open(api: Arc<dyn VcenterApi>, credentials: &Credentials) -> Result<Self> {
        let token = api.authenticate(credentials).await?;
        Ok(Self {
            api,
            token: Some(token),
        })
    }

    fn token(&self) -> Result<&SessionToken> {
        self.token
            .as_ref()
            .ok_or_else(|| VcenterError::Auth("session already released".to_string()))
    }

    async fn release(mut self) {
        if let Some(token) = self.token.take() {
            self.api.logout(&token).await;
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        let Some(token) = self.token.take() else {
            return;
        };

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let api = Arc::clone(&self.api);
                handle.spawn(async move { api.logout(&token).await });
            }
            Err(_) => warn!("Dropping vCenter session outside a runtime; logout skipped"),
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

/// Split a probe target into host and port.
///
/// Accepts `host`, `host:port`, a bare IPv6 literal, and `[v6]:port`.
pub fn parse_target(target: &str, default_port: u16) -> Result<(String, u16)> {
    let invalid = || VcenterError::InvalidTarget(target.to_string());

    let (host, port) = if let Some(rest) = target.strip_prefix('[') {
        let (host, tail) = rest.split_once(']').ok_or_else(invalid)?;
        match tail {
            "" => (host, None),
            _ => (host, Some(tail.strip_prefix(':').ok_or_else(invalid)?)),
        }
    } else {
        match target.split_once(':') {
            Some((host, port)) if !port.contains(':') => (host, Some(port)),
            // More than one colon without brackets: a bare IPv6 literal.
            Some(_) => (target, None),
            None => (target, None),
        }
    };

    if host.is_empty() {
        return Err(invalid());
    }

    let port = match port {
        Some(p) => p.parse::<u16>().ok().filter(|p| *p != 0).ok_or_else(invalid)?,
        None => default_port,
    };

    Ok((host.to_string(), port))
}

/// Host part of a probe target, ignoring any port.
pub(crate) fn split_host(target: &str) -> &str {
    if let Some(rest) = target.strip_prefix('[') {
        return rest.split_once(']').map_or(target, |(host, _)| host);
    }
    match target.split_once(':') {
        Some((host, port)) if !port.contains(':') => host,
        _ => target,
    }
}

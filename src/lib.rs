//! # VMware Exporter
//!
//! A Prometheus multi-target exporter for VMware vCenter.
//!
//! ## Overview
//!
//! Every scrape of `/probe?target=<vcenter>&dc=<datacenter>` runs one
//! independent probe:
//!
//! 1. create a vCenter REST session
//! 2. resolve the requested datacenter
//! 3. read its datastores and ESXi hosts
//! 4. release the session
//!
//! and answers with datastore capacity/free space and host power/connection
//! gauges labelled with the datacenter name. Nothing is cached between
//! scrapes.
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use vmware_exporter::{
//!     client::HttpConnector, config::Settings, credentials::TargetCredentials,
//!     prober::Prober, server::start_server,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Load configuration
//!     let settings = Settings::load(Some("config/default.toml"))?;
//!
//!     let prober = Prober::new(
//!         Arc::new(HttpConnector::new(&settings.vcenter)),
//!         Arc::new(TargetCredentials::from(&settings.vcenter)),
//!         settings.vcenter.port,
//!         settings.vcenter.probe_timeout(),
//!     );
//!
//!     // Start HTTP server
//!     start_server(&settings.exporter.listen_address, prober).await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Configuration
//!
//! The exporter can be configured via:
//! - TOML configuration file
//! - Environment variables (with `VMWARE_EXPORTER__` prefix)
//! - `HOST`, `PORT`, `VCENTER_USER` and `VCENTER_PASS`
//! - Command-line arguments
//!
//! See [`config::Settings`] for details.
//!
//! ## Modules
//!
//! - [`client`] - vCenter REST API client
//! - [`config`] - Configuration management
//! - [`credentials`] - Per-target credential resolution
//! - [`error`] - Error types and handling
//! - [`metrics`] - Prometheus metrics definitions
//! - [`prober`] - Probe orchestration
//! - [`server`] - HTTP server exposing the probe endpoint

pub mod client;
pub mod config;
pub mod credentials;
pub mod error;
pub mod metrics;
pub mod prober;
pub mod server;

pub use error::{Result, VcenterError};

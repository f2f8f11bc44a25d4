//! Prometheus metrics definitions.
//!
//! [`ProbeMetrics`] holds the gauges for a single probe in a registry of its
//! own, so series from one target never leak into the response for another.
//! [`ExporterMetrics`] describes the exporter process itself.

use crate::client::{Datastore, Host};
use crate::error::{Result, VcenterError};
use prometheus::{
    Encoder, GaugeVec, Histogram, HistogramOpts, IntCounterVec, Opts, Registry, TextEncoder,
};
use std::time::Duration;
use tracing::debug;

const NAMESPACE: &str = "vmware";

const DATASTORE_LABELS: &[&str] = &["dc_name", "ds_name", "ds_type"];
const HOST_LABELS: &[&str] = &["dc_name", "host_name"];

/// Gauges produced by one probe.
#[derive(Debug)]
pub struct ProbeMetrics {
    registry: Registry,

    // Datastore metrics
    datastore_capacity_size: GaugeVec,
    datastore_free_size: GaugeVec,

    // Host metrics
    host_power_state: GaugeVec,
    host_connection_state: GaugeVec,
}

impl ProbeMetrics {
    /// Create a fresh registry with all probe gauge families registered.
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let datastore_capacity_size = gauge_vec(
            &registry,
            "datastore_capacity_size",
            "Maximum capacity",
            DATASTORE_LABELS,
        )?;
        let datastore_free_size =
            gauge_vec(&registry, "datastore_free_size", "Free space", DATASTORE_LABELS)?;
        let host_power_state = gauge_vec(
            &registry,
            "host_power_state",
            "ESXi Host power status",
            HOST_LABELS,
        )?;
        let host_connection_state = gauge_vec(
            &registry,
            "host_connection_state",
            "ESXi Host connection status",
            HOST_LABELS,
        )?;

        Ok(Self {
            registry,
            datastore_capacity_size,
            datastore_free_size,
            host_power_state,
            host_connection_state,
        })
    }

    /// Write the capacity and free-space samples for a datastore.
    pub fn record_datastore(&self, datacenter: &str, ds: &Datastore) {
        let labels = [datacenter, ds.name.as_str(), ds.datastore_type.as_str()];
        self.datastore_capacity_size
            .with_label_values(&labels)
            .set(ds.capacity as f64);
        self.datastore_free_size
            .with_label_values(&labels)
            .set(ds.free_space as f64);
    }

    /// Write the power and connection samples for a host.
    pub fn record_host(&self, datacenter: &str, host: &Host) {
        let labels = [datacenter, host.name.as_str()];
        self.host_power_state
            .with_label_values(&labels)
            .set(flag(host.is_powered_on()));
        self.host_connection_state
            .with_label_values(&labels)
            .set(flag(host.is_connected()));
    }

    /// Encode metrics in Prometheus text format.
    pub fn encode(&self) -> Result<String> {
        encode_registry(&self.registry)
    }
}

/// Self-metrics of the exporter process, shared across probes.
pub struct ExporterMetrics {
    registry: Registry,
    probes_total: IntCounterVec,
    probe_duration_seconds: Histogram,
}

impl ExporterMetrics {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let probes_total = IntCounterVec::new(
            Opts::new("probes_total", "Number of probes run, by result")
                .namespace(NAMESPACE)
                .subsystem("exporter"),
            &["result"],
        )?;
        registry.register(Box::new(probes_total.clone()))?;

        let probe_duration_seconds = Histogram::with_opts(
            HistogramOpts::new("probe_duration_seconds", "Duration of probes in seconds")
                .namespace(NAMESPACE)
                .subsystem("exporter")
                .buckets(vec![0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 20.0, 30.0, 60.0]),
        )?;
        registry.register(Box::new(probe_duration_seconds.clone()))?;

        #[cfg(target_os = "linux")]
        registry.register(Box::new(
            prometheus::process_collector::ProcessCollector::for_self(),
        ))?;

        Ok(Self {
            registry,
            probes_total,
            probe_duration_seconds,
        })
    }

    /// Record the outcome of a finished probe.
    pub fn observe(&self, success: bool, elapsed: Duration) {
        let result = if success { "success" } else { "failure" };
        self.probes_total.with_label_values(&[result]).inc();
        self.probe_duration_seconds.observe(elapsed.as_secs_f64());
    }

    pub fn encode(&self) -> Result<String> {
        encode_registry(&self.registry)
    }
}

fn gauge_vec(registry: &Registry, name: &str, help: &str, labels: &[&str]) -> Result<GaugeVec> {
    let gauge = GaugeVec::new(Opts::new(name, help).namespace(NAMESPACE), labels)?;
    registry.register(Box::new(gauge.clone()))?;
    Ok(gauge)
}

fn flag(on: bool) -> f64 {
    if on {
        1.0
    } else {
        0.0
    }
}

fn encode_registry(registry: &Registry) -> Result<String> {
    let encoder = TextEncoder::new();
    let metric_families = registry.gather();
    debug!("Encoding {} metric families", metric_families.len());

    let mut buffer = Vec::with_capacity(4096);
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| VcenterError::Metrics(e.to_string()))?;

    String::from_utf8(buffer).map_err(|e| VcenterError::Metrics(e.to_string()))
}

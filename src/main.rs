use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use vmware_exporter::{
    client::HttpConnector,
    config::{LogFormat, Settings},
    credentials::TargetCredentials,
    prober::Prober,
    server::start_server,
};

/// VMware Exporter - Prometheus multi-target exporter for VMware vCenter
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE", env = "VMWARE_EXPORTER_CONFIG")]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Pick up a local .env before anything reads the environment
    let dotenv = dotenvy::dotenv();

    // Parse command-line arguments
    let args = Args::parse();

    // Load configuration
    let settings = Settings::load(args.config.as_deref())?;

    // Initialize logging
    init_logging(&settings.exporter.log_level, settings.exporter.log_format)?;

    if let Ok(path) = dotenv {
        info!("Loaded environment from {}", path.display());
    }

    info!(
        binding_address = %settings.exporter.listen_address,
        "Starting VMware Exporter"
    );
    info!("vCenter settings: {:?}", settings.vcenter);

    let connector = HttpConnector::new(&settings.vcenter);
    let credentials = TargetCredentials::from(&settings.vcenter);
    let prober = Prober::new(
        Arc::new(connector),
        Arc::new(credentials),
        settings.vcenter.port,
        settings.vcenter.probe_timeout(),
    );

    // Start HTTP server
    if let Err(e) = start_server(&settings.exporter.listen_address, prober).await {
        error!("Server error: {}", e);
        return Err(e.into());
    }

    Ok(())
}

/// Initialize structured logging with tracing.
fn init_logging(log_level: &str, format: LogFormat) -> Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let registry = tracing_subscriber::registry().with(env_filter);

    match format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()?,
        LogFormat::Text => registry
            .with(tracing_subscriber::fmt::layer())
            .try_init()?,
    }

    Ok(())
}

//! NextGCore UDM (Unified Data Management)
//!
//! Serves Nudm-UEAU: de-conceals SUCIs with the configured home network
//! keys and generates authentication vectors from the subscription data
//! held by the UDR.

use anyhow::{Context, Result};
use clap::Parser;
use nextgcore_udmd::{udm_sbi_request_handler, SbiUdrClient, UdmConfig, UeauService};
use ogs_sbi::{SbiServer, SbiServerConfig};
use std::sync::Arc;
use tokio::sync::Notify;

/// NextGCore UDM - Unified Data Management
#[derive(Parser, Debug)]
#[command(name = "nextgcore-udmd")]
#[command(author = "NextGCore")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "5G Core Unified Data Management", long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short = 'c', long, default_value = "/etc/nextgcore/udm.yaml")]
    config: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'e', long, default_value = "info")]
    log_level: String,

    /// Disable color output
    #[arg(short = 'm', long)]
    no_color: bool,

    /// SBI server address (overrides udm.sbi.addr)
    #[arg(long)]
    sbi_addr: Option<String>,

    /// SBI server port (overrides udm.sbi.port)
    #[arg(long)]
    sbi_port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args);

    log::info!("NextGCore UDM v{} starting...", env!("CARGO_PKG_VERSION"));

    let config = load_config(&args)?;
    let profiles = config
        .suci_profiles()
        .context("Invalid home network key configuration")?;
    log::info!("{} home network key(s) loaded", profiles.len());

    let udr = Arc::new(SbiUdrClient::new(config.udr.client_config()));
    log::info!("UDR at {}:{}", config.udr.host, config.udr.port);
    let service = Arc::new(UeauService::new(profiles, udr));

    let shutdown = Arc::new(Notify::new());
    setup_signal_handlers(shutdown.clone())?;

    let sbi_addr = args.sbi_addr.as_deref().unwrap_or(&config.sbi.addr);
    let sbi_port = args.sbi_port.unwrap_or(config.sbi.port);
    let sbi_config = SbiServerConfig::with_host_port(sbi_addr, sbi_port)
        .with_context(|| format!("Invalid SBI address {}:{}", sbi_addr, sbi_port))?;
    let sbi_server = SbiServer::new(sbi_config);

    let handler_service = service.clone();
    let local_addr = sbi_server
        .start(move |request| udm_sbi_request_handler(handler_service.clone(), request))
        .await
        .context("Failed to start SBI server")?;

    log::info!("SBI HTTP/2 server listening on {}", local_addr);
    log::info!("NextGCore UDM ready");

    shutdown.notified().await;

    log::info!("Shutting down...");
    sbi_server
        .stop()
        .await
        .context("Failed to stop SBI server")?;
    log::info!("NextGCore UDM stopped");
    Ok(())
}

/// Load the configuration file, falling back to defaults when it is absent
fn load_config(args: &Args) -> Result<UdmConfig> {
    if std::path::Path::new(&args.config).exists() {
        log::info!("Loading configuration from {}", args.config);
        UdmConfig::load(&args.config)
            .with_context(|| format!("Failed to load configuration {}", args.config))
    } else {
        log::warn!("Configuration file not found: {}, using defaults", args.config);
        Ok(UdmConfig::default())
    }
}

/// Initialize logging from `-e`, refined per module by `RUST_LOG`
fn init_logging(args: &Args) {
    let level = args
        .log_level
        .parse::<log::LevelFilter>()
        .unwrap_or(log::LevelFilter::Info);

    let mut builder = env_logger::Builder::new();
    builder.filter_level(level).format_timestamp_millis();
    builder.parse_default_env();
    if args.no_color {
        builder.write_style(env_logger::WriteStyle::Never);
    }
    builder.init();
}

/// Set up signal handlers for graceful shutdown
fn setup_signal_handlers(shutdown: Arc<Notify>) -> Result<()> {
    ctrlc::set_handler(move || {
        log::info!("Received shutdown signal");
        shutdown.notify_one();
    })
    .context("Failed to set Ctrl+C handler")?;

    Ok(())
}

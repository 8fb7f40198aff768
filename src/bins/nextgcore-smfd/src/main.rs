//! NextGCore SMF (Session Management Function)
//!
//! Runs the UPF peer lifecycle on N4:
//! - PFCP server socket
//! - Heartbeat supervision of associated UPFs
//! - Association probing of unassociated UPFs

use anyhow::{Context, Result};
use clap::Parser;
use nextgcore_smfd::{
    AssociationProber, HeartbeatSupervisor, N4Handler, N4MsgStats, PfcpPath, PfcpSender,
    SmfConfig,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// NextGCore SMF - Session Management Function
#[derive(Parser, Debug)]
#[command(name = "nextgcore-smfd")]
#[command(author = "NextGCore")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "5G Core Session Management Function", long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short = 'c', long, default_value = "/etc/nextgcore/smf.yaml")]
    config: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'e', long, default_value = "info")]
    log_level: String,

    /// Disable color output
    #[arg(short = 'm', long)]
    no_color: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args)?;

    log::info!("NextGCore SMF v{} starting...", env!("CARGO_PKG_VERSION"));

    let shutdown = Arc::new(AtomicBool::new(false));
    setup_signal_handlers(shutdown.clone())?;

    let config = load_config(&args.config)?;
    let registry = config
        .user_plane_information()
        .context("Invalid UPF configuration")?;
    log::info!("{} UPF(s) configured", registry.len());

    let path = Arc::new(
        PfcpPath::bind(config.pfcp_addr(), config.node_id())
            .await
            .with_context(|| format!("Failed to open PFCP server on {}", config.pfcp_addr()))?,
    );
    let stats = Arc::new(N4MsgStats::new());
    let sender: Arc<dyn PfcpSender> = path.clone();
    let smf_id = config.smf.instance_id.clone();

    let tasks = vec![
        tokio::spawn(
            N4Handler::new(
                registry.clone(),
                stats.clone(),
                smf_id.clone(),
                path.recovery_time_stamp(),
            )
            .run(path.clone()),
        ),
        tokio::spawn(
            HeartbeatSupervisor::new(registry.clone(), sender.clone(), stats.clone(), smf_id.clone())
                .with_interval(config.heartbeat_interval())
                .with_max_retry(config.smf.heartbeat.max_retry)
                .run(),
        ),
        tokio::spawn(
            AssociationProber::new(registry.clone(), sender, stats.clone(), smf_id)
                .with_interval(config.probe_interval())
                .run(),
        ),
    ];

    log::info!("NextGCore SMF ready");

    run_event_loop_async(shutdown).await?;

    log::info!("Shutting down...");

    for task in tasks {
        task.abort();
    }

    for (key, count) in stats.snapshot() {
        log::debug!("{:?}: {}", key, count);
    }

    log::info!("NextGCore SMF stopped");
    Ok(())
}

/// Load the configuration file, or the defaults when it does not exist
fn load_config(path: &str) -> Result<SmfConfig> {
    if std::path::Path::new(path).exists() {
        log::info!("Loading configuration from {}", path);
        SmfConfig::from_file(path).with_context(|| format!("Failed to load {}", path))
    } else {
        log::warn!("Configuration file not found: {} (using defaults)", path);
        Ok(SmfConfig::default())
    }
}

/// Initialize logging
fn init_logging(args: &Args) -> Result<()> {
    let mut builder = env_logger::Builder::new();

    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => log::LevelFilter::Trace,
        "debug" => log::LevelFilter::Debug,
        "info" => log::LevelFilter::Info,
        "warn" => log::LevelFilter::Warn,
        "error" => log::LevelFilter::Error,
        _ => log::LevelFilter::Info,
    };
    builder.filter_level(level);
    builder.format_timestamp_millis();

    if args.no_color {
        builder.write_style(env_logger::WriteStyle::Never);
    }

    builder.init();

    Ok(())
}

/// Set up signal handlers for graceful shutdown
fn setup_signal_handlers(shutdown: Arc<AtomicBool>) -> Result<()> {
    ctrlc::set_handler(move || {
        log::info!("Received shutdown signal");
        shutdown.store(true, Ordering::SeqCst);
    })
    .context("Failed to set Ctrl+C handler")?;

    Ok(())
}

async fn run_event_loop_async(shutdown: Arc<AtomicBool>) -> Result<()> {
    log::debug!("Entering async main event loop");

    let mut interval = tokio::time::interval(Duration::from_millis(100));

    while !shutdown.load(Ordering::SeqCst) {
        interval.tick().await;
    }

    log::debug!("Exiting async main event loop");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_default() {
        let args = Args::parse_from(["nextgcore-smfd"]);
        assert_eq!(args.config, "/etc/nextgcore/smf.yaml");
        assert_eq!(args.log_level, "info");
        assert!(!args.no_color);
    }

    #[test]
    fn test_args_custom() {
        let args = Args::parse_from(["nextgcore-smfd", "-c", "/custom/smf.yaml", "-e", "debug", "-m"]);
        assert_eq!(args.config, "/custom/smf.yaml");
        assert_eq!(args.log_level, "debug");
        assert!(args.no_color);
    }

    #[tokio::test(start_paused = true)]
    async fn test_event_loop_stops_on_shutdown_flag() {
        let shutdown = Arc::new(AtomicBool::new(false));
        let event_loop = tokio::spawn(run_event_loop_async(shutdown.clone()));

        tokio::time::sleep(Duration::from_millis(350)).await;
        assert!(!event_loop.is_finished());

        shutdown.store(true, Ordering::SeqCst);
        tokio::time::timeout(Duration::from_secs(1), event_loop)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
    }

    #[test]
    fn test_load_config_missing_file() {
        let config = load_config("/nonexistent/smf.yaml").unwrap();
        assert_eq!(config, SmfConfig::default());
    }
}

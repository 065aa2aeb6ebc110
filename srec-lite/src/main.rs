mod cli;

use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use srec_lite::config::AppConfig;
use srec_lite::config::dirs::prepare_config_dir;
use srec_lite::logging::init_logging;
use srec_lite::services::ServiceContainer;
use srec_lite::utils::fs::dir_exists;

use crate::cli::Args;

#[tokio::main]
async fn main() -> ExitCode {
    print_banner();

    dotenvy::dotenv().ok();
    let args = Args::parse();

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

#[allow(clippy::println_empty_string)]
fn print_banner() {
    println!("==================================================================");
    println!("srec-lite v{}", env!("CARGO_PKG_VERSION"));
    println!("Records every listed source while it is live");
    println!("Licensed under {}", env!("CARGO_PKG_LICENSE"));
    println!("==================================================================");
    println!("");
}

async fn run(args: Args) -> anyhow::Result<()> {
    if !dir_exists(&args.output_dir) {
        anyhow::bail!(
            "Output directory does not exist: {}",
            args.output_dir.display()
        );
    }

    let config_dir = prepare_config_dir(args.config_dir.clone())?;
    let logging = init_logging(&config_dir.join("logs"), args.verbose)?;

    let mut config = AppConfig::load(&config_dir)?;
    args.apply_overrides(&mut config);

    let container = ServiceContainer::from_config(&config, &config_dir, &args.output_dir)
        .context("Failed to start")?;
    info!(
        config_dir = %config_dir.display(),
        sources = %config.sources_path(&config_dir).display(),
        interval_secs = config.poll_interval_secs,
        "Configuration loaded"
    );

    let token = container.cancellation_token();
    logging.start_retention_cleanup(token.clone());
    tokio::spawn(shutdown_on_signal(token));

    container.run().await;
    Ok(())
}

/// Cancel `token` on Ctrl+C or SIGTERM.
async fn shutdown_on_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
        _ = token.cancelled() => return,
    }

    info!("Shutdown signal received, finishing recordings");
    token.cancel();
}

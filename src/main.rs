use anyhow::Result;
use clap::Parser;
use reword::cli::Cli;
use reword::instance;
use reword::{Config, RewordApp};
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "reword=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if !instance::is_sole_instance()? {
        anyhow::bail!("Another instance of reword is already running");
    }

    let cli = Cli::parse();
    let config = Config::resolve(cli)?;

    info!("🚀 reword starting up!");
    info!("   Model: {}", config.model);
    info!("   Hotkey: {}", config.hotkey);
    info!(
        "   Capture: {} attempt(s), {} ms settle",
        config.capture.attempts, config.capture.settle_ms
    );

    let app = RewordApp::new(config)?;

    // Set up signal handling
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();

    tokio::spawn(async move {
        let ctrl_c = signal::ctrl_c();
        let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to set up SIGTERM handler");

        tokio::select! {
            _ = ctrl_c => {
                info!("Received SIGINT (Ctrl+C)");
            }
            _ = sigterm.recv() => {
                info!("Received SIGTERM");
            }
        }

        let _ = shutdown_tx.send(());
    });

    // Runs until the shutdown signal, then waits for any in-flight cycle.
    app.run(shutdown_rx).await
}

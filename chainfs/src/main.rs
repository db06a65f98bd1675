use anyhow::Context;
use chainfs::cli::Args;
use chainfs::config::Config;
use chainfs::server::{serve, shutdown_signal};
use clap::Parser;
use libchainfs::FileSystemManager;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let config = Config::resolve(&args)?;

    let fs = FileSystemManager::open_file(&config.disk, config.total_size)
        .await
        .with_context(|| format!("Failed to open container {}", config.disk.display()))?;
    let fs = Arc::new(fs);
    info!(
        disk = %config.disk.display(),
        capacity = fs.geometry().capacity,
        free = fs.free_blocks().await,
        "container ready"
    );

    let listener = TcpListener::bind(config.addr())
        .await
        .with_context(|| format!("Failed to bind {}", config.addr()))?;
    info!("listening on {}", listener.local_addr()?);

    serve(listener, fs.clone(), config.max_line_length, shutdown_signal()).await;

    fs.sync().await.context("Failed to flush container")?;
    info!("container flushed");
    Ok(())
}

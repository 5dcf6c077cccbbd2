use anyhow::Context;
use clap::Parser;
use dotrelay_domain::CliOverrides;
use dotrelay_infrastructure::dns::{
    ensure_crypto_provider, AnswerCache, Dispatcher, FrontEndSettings, UdpFrontEnd,
};
use std::sync::Arc;
use tokio::signal;
use tracing::info;

mod bootstrap;

#[derive(Parser)]
#[command(name = "dotrelay")]
#[command(version)]
#[command(
    about = "UDP to DNS-over-TLS forwarding proxy with answer racing and a self-refreshing cache"
)]
struct Cli {
    /// Configuration file path
    #[arg(short = 'c', long, value_name = "FILE")]
    config: Option<String>,

    /// DNS listen port
    #[arg(short = 'p', long)]
    port: Option<u16>,

    /// Bind address
    #[arg(short = 'b', long)]
    bind: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let cli_overrides = CliOverrides {
        port: cli.port,
        bind_address: cli.bind.clone(),
        log_level: cli.log_level.clone(),
    };
    let config = bootstrap::load_config(cli.config.as_deref(), cli_overrides)?;

    bootstrap::init_logging(&config);
    info!("Starting dotrelay v{}", env!("CARGO_PKG_VERSION"));
    bootstrap::config::log_config(cli.config.as_deref(), &config);

    ensure_crypto_provider();

    let subnet = bootstrap::build_subnet_policy(&config).await?;
    let pool = bootstrap::build_resolver_pool(&config, subnet)
        .await
        .context("No usable upstream resolver")?;

    let settings = FrontEndSettings {
        bind: config.server.socket_addr()?,
        channel_capacity: config.server.channel_capacity,
        refresh_interval: config.dns.cache_refresh_interval(),
    };
    let cache = Arc::new(AnswerCache::new());
    let (mut front_end, channels) = UdpFrontEnd::new(settings, cache);

    let dispatcher = Dispatcher::spawn(Arc::new(pool), channels.requests, channels.responses);
    front_end.start().await?;

    wait_for_shutdown().await?;

    front_end.stop_read().await?;
    dispatcher.stop().await;
    front_end.stop_write().await?;

    info!("Server shutdown complete");
    Ok(())
}

async fn wait_for_shutdown() -> anyhow::Result<()> {
    #[cfg(unix)]
    {
        let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())
            .context("Failed to register SIGTERM handler")?;
        let mut sigint = signal::unix::signal(signal::unix::SignalKind::interrupt())
            .context("Failed to register SIGINT handler")?;

        tokio::select! {
            _ = sigterm.recv() => {
                info!("Received SIGTERM");
            }
            _ = sigint.recv() => {
                info!("Received SIGINT");
            }
        }
    }

    #[cfg(not(unix))]
    {
        signal::ctrl_c()
            .await
            .context("Failed to listen for Ctrl+C")?;
        info!("Received Ctrl+C");
    }

    Ok(())
}

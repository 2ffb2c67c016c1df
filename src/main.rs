// ABOUTME: Entry point for the spool binary.
// ABOUTME: Parses CLI arguments, initializes tracing, and runs cache maintenance commands.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use spool_core::{CacheConfig, UploadTransport};
use spool_uploader::{CacheCoordinator, HttpTransport, reject_captive_portal, spawn_periodic_drain};

#[derive(Parser, Debug)]
#[command(name = "spool")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Journal directory (overrides SPOOL_CACHE_DIR)
    #[arg(long, global = true)]
    cache_dir: Option<PathBuf>,

    /// Treat 2xx HTML responses as failed deliveries
    #[arg(long, global = true)]
    strict: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print cache status as JSON
    Status,
    /// Add a payload to the cache
    Enqueue {
        destination: String,
        body: String,
        /// Try to deliver right away instead of only caching
        #[arg(long)]
        send: bool,
    },
    /// Replay cached payloads until the cache is empty or a delivery fails
    Drain,
    /// Retry cached payloads on a fixed period until interrupted
    Watch {
        #[arg(long, default_value_t = 30)]
        period_secs: u64,
    },
    /// Delete every cached payload
    Clear,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new("spool=info,spool_store=info,spool_uploader=info")
            }),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = CacheConfig::from_env().context("invalid spool configuration")?;
    if let Some(dir) = cli.cache_dir {
        config.cache_dir = dir;
    }

    let mut transport = HttpTransport::new(&config).context("failed to build http transport")?;
    if cli.strict {
        transport = transport.with_response_check(reject_captive_portal());
    }
    let transport: Arc<dyn UploadTransport> = Arc::new(transport);

    let cache = CacheCoordinator::open(&config, transport);
    tracing::info!(
        dir = %config.cache_dir.display(),
        backend = %cache.backend_kind().await,
        "spool cache opened"
    );

    match cli.command {
        Command::Status => print_status(&cache).await?,
        Command::Enqueue {
            destination,
            body,
            send,
        } => {
            if send {
                let delivered = cache.handle(&destination, &body).await;
                tracing::info!(delivered, destination = %destination, "payload handled");
            } else if !cache.cache(&destination, &body).await {
                anyhow::bail!("payload for {} was not cached", destination);
            }
        }
        Command::Drain => {
            cache.drain().await;
            print_status(&cache).await?;
        }
        Command::Watch { period_secs } => {
            let task = spawn_periodic_drain(cache.clone(), Duration::from_secs(period_secs.max(1)));
            tokio::signal::ctrl_c()
                .await
                .context("failed to listen for ctrl-c")?;
            task.abort();
            tracing::info!("stopping periodic drain");
        }
        Command::Clear => cache.clear().await,
    }

    cache.close().await;
    Ok(())
}

async fn print_status(cache: &CacheCoordinator) -> anyhow::Result<()> {
    let status = cache.status().await;
    println!("{}", serde_json::to_string_pretty(&status)?);
    Ok(())
}

//! Loyalty Server Entry Point
//!
//! Usage:
//!   loyalty-server                         - in-memory store, port 8080
//!   loyalty-server --data-dir ./data       - persistent sled store
//!   loyalty-server --seed                  - seed badges and challenges on boot

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use loyalty_api::{run_server, ApiConfig};
use loyalty_engine::AdminOps;
use loyalty_store::{LoyaltyStore, MemoryStore, SledStore};

#[derive(Parser)]
#[command(name = "loyalty-server")]
#[command(about = "E-commerce gamification and loyalty engine")]
#[command(version)]
struct Cli {
    /// Host to bind to
    #[arg(short = 'H', long, default_value = "0.0.0.0")]
    host: String,

    /// Port to listen on
    #[arg(short, long, default_value = "8080")]
    port: u16,

    /// Sled data directory; omit for the in-memory store
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Seed the badge catalog and current challenge periods on boot
    #[arg(long)]
    seed: bool,

    /// Disable permissive CORS
    #[arg(long)]
    no_cors: bool,
}

#[tokio::main]
async fn main() {
    init_logging();
    let cli = Cli::parse();

    let store: Arc<dyn LoyaltyStore> = match &cli.data_dir {
        Some(path) => match SledStore::open(path) {
            Ok(store) => {
                tracing::info!(path = %path.display(), "using sled store");
                Arc::new(store)
            }
            Err(e) => {
                eprintln!("failed to open data directory {}: {e}", path.display());
                std::process::exit(1);
            }
        },
        None => {
            tracing::info!("using in-memory store");
            Arc::new(MemoryStore::new())
        }
    };

    if cli.seed {
        if let Err(e) = seed(store.clone()).await {
            eprintln!("seeding failed: {e}");
            std::process::exit(1);
        }
    }

    let config = ApiConfig {
        host: cli.host,
        port: cli.port,
        enable_cors: !cli.no_cors,
    };
    if let Err(e) = run_server(&config, store).await {
        eprintln!("server error: {e}");
        std::process::exit(1);
    }
}

/// Seed the badge catalog and generate challenge definitions for the
/// current day and week. Idempotent across restarts.
async fn seed(store: Arc<dyn LoyaltyStore>) -> loyalty_core::LoyaltyResult<()> {
    let admin = AdminOps::new(store);
    let now = chrono::Utc::now();
    admin.init_badges().await?;
    admin.generate_daily(now).await?;
    admin.generate_weekly(now).await?;
    Ok(())
}

fn init_logging() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "loyalty_api=info,loyalty_engine=info,loyalty_store=info,tower_http=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

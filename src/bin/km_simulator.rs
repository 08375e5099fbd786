//! QKD key manager simulator.
//!
//! Serves the key manager API over a local key inventory so QuMail clients
//! can run without QKD hardware. Keys are random bytes from the OS CSPRNG.

use std::error::Error;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use qumail_core::config::InventoryConfig;
use qumail_core::keyservice::server;
use qumail_core::KeyInventory;

#[derive(Parser, Debug)]
#[command(name = "km-simulator")]
#[command(version, about, long_about = None)]
struct Args {
    /// Listen address
    #[arg(short, long, env = "QUMAIL_KM_BIND", default_value = "0.0.0.0:8001")]
    bind: SocketAddr,

    /// Inventory snapshot file
    #[arg(short, long, env = "QUMAIL_INVENTORY_PATH", default_value = "keys_persistence.json")]
    db: PathBuf,

    /// Keep keys in memory only
    #[arg(long)]
    memory: bool,

    /// Key length in bytes
    #[arg(long, env = "QUMAIL_KEY_LEN", default_value_t = 1024)]
    key_len: usize,

    /// Advertised key supply before any key is issued
    #[arg(long, env = "QUMAIL_KEY_BUDGET", default_value_t = 4289)]
    budget: i64,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, env = "QUMAIL_LOG_LEVEL", default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(true).init();

    let config = InventoryConfig {
        key_len: args.key_len,
        initial_budget: args.budget,
        path: None,
    };
    let inventory = if args.memory {
        KeyInventory::in_memory(&config)
    } else {
        KeyInventory::open_file(&args.db, &config)?
    };

    let app = server::router(Arc::new(inventory));
    let listener = tokio::net::TcpListener::bind(args.bind).await?;
    log::info!("Key manager simulator {} listening on {}", qumail_core::VERSION, args.bind);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            log::info!("Shutting down");
        })
        .await?;
    Ok(())
}

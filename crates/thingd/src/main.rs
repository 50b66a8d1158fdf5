//! thingd Server
//!
//! IoT thing registry with telemetry, liveness and takeout over HTTP.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use thing_runtime::{InMemoryTimeSeriesStore, RedbTimeSeriesStore, TimeSeriesStore};
use thing_types::TypeRegistry;

use thingd::config::{DEFAULT_CONFIG_FILE, LogConfig, Settings, StoreBackend};
use thingd::{provision, shutdown};
use thingd::server::{AppState, create_router};

/// thingd IoT Thing Registry
#[derive(Parser, Debug)]
#[command(name = "thingd")]
#[command(about = "IoT thing registry server", long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Server host address (overrides the config file)
    #[arg(long)]
    host: Option<String>,

    /// Server port (overrides the config file)
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut settings = Settings::load(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;
    if let Some(host) = args.host {
        settings.server.host = host;
    }
    if let Some(port) = args.port {
        settings.server.port = port;
    }

    init_tracing(&settings.log);
    info!("Starting thingd v{}", env!("CARGO_PKG_VERSION"));

    // Type registry, seeded with the connectivity status type
    let registry = TypeRegistry::new_shared(settings.connectivity.clone());
    if let Some(path) = &settings.types.path {
        provision::load_types(path, &registry)
            .await
            .with_context(|| format!("Failed to provision types from {}", path.display()))?;
    }
    info!(
        "Connectivity indicator: {} (online when \"{}\")",
        settings.connectivity.type_id, settings.connectivity.online_value
    );

    let store: Arc<dyn TimeSeriesStore> = match settings.store.backend {
        StoreBackend::Memory => {
            info!("Using in-memory value store");
            Arc::new(InMemoryTimeSeriesStore::new())
        }
        StoreBackend::Redb => {
            info!("Using redb value store at {}", settings.store.path.display());
            Arc::new(RedbTimeSeriesStore::open(&settings.store.path)?)
        }
    };

    if settings.auth.tokens.is_empty() {
        warn!("No auth tokens configured; every API request will be rejected");
    }

    let state = AppState::new(registry, store, settings.auth.tokens.clone());
    let app = create_router(state);

    // Start server
    let addr: SocketAddr = settings.bind_addr().parse()?;
    let listener = TcpListener::bind(addr).await?;
    info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown::shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

/// `RUST_LOG` wins over the configured filter
fn init_tracing(log: &LogConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log.filter));
    let registry = tracing_subscriber::registry().with(filter);

    if log.json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

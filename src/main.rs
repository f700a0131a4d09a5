//! Tronbyt Cloud - device pairing and account backend
//!
//! Serves the pairing API used by Tronbyt firmware during setup and the
//! account/API-key surface used by the dashboard. Persistent state lives
//! in an external record store (PostgREST-compatible); session validation
//! is delegated to the store's auth service.

use anyhow::Result;
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, warn, Level};
use tracing_subscriber::EnvFilter;

use tronbyt_auth::RestSessionVerifier;
use tronbyt_core::Settings;
use tronbyt_server::{create_router, AppState};
use tronbyt_store::{RecordStore, RestStore};

/// Tronbyt Cloud - device pairing and account backend
#[derive(Parser, Debug)]
#[command(name = "tronbyt")]
#[command(version, about, long_about = None)]
struct Args {
    /// Server port
    #[arg(short, long, default_value = "8000", env = "TRONBYT_PORT")]
    port: u16,

    /// Record store base URL
    #[arg(long, default_value = "", env = "STORE_URL")]
    store_url: String,

    /// Record store publishable key (session verification)
    #[arg(long, default_value = "", env = "STORE_ANON_KEY")]
    store_anon_key: String,

    /// Record store service-role key (table access)
    #[arg(long, default_value = "", env = "STORE_SERVICE_KEY")]
    store_service_key: String,

    /// Pairing token validity in minutes
    #[arg(long, default_value = "30", env = "TRONBYT_TOKEN_VALIDITY_MINUTES")]
    token_validity_minutes: i64,

    /// Rate limit: requests per minute per client
    #[arg(long, default_value = "60", env = "TRONBYT_RATE_LIMIT_REQUESTS")]
    rate_limit_requests: u32,

    /// Rate limit: burst allowance per client
    #[arg(long, default_value = "10", env = "TRONBYT_RATE_LIMIT_BURST")]
    rate_limit_burst: u32,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .compact()
        .with_env_filter(EnvFilter::from_default_env().add_directive(log_level.into()))
        .finish();
    tracing::subscriber::set_global_default(subscriber).ok();

    info!("Tronbyt Cloud v{}", env!("CARGO_PKG_VERSION"));

    let settings = Settings::new()
        .with_port(args.port)
        .with_store_url(args.store_url)
        .with_anon_key(args.store_anon_key)
        .with_service_key(args.store_service_key)
        .with_token_validity_minutes(args.token_validity_minutes)
        .with_rate_limit(args.rate_limit_requests, args.rate_limit_burst);
    settings.validate()?;

    info!("Connecting to record store at {}", settings.store_url);
    let store: Arc<dyn RecordStore> = Arc::new(RestStore::new(
        &settings.store_url,
        &settings.store_service_key,
    )?);

    if settings.store_anon_key.is_empty() {
        warn!("No publishable key configured; session verification will fail");
    }
    let sessions = Arc::new(RestSessionVerifier::new(
        &settings.store_url,
        &settings.store_anon_key,
        store.clone(),
    )?);

    let port = settings.port;
    let validity = settings.token_validity_minutes;
    let state = Arc::new(AppState::new(settings, store, sessions));
    let router = create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("Listening on {}", addr);
    info!("Pairing tokens valid for {} minutes", validity);

    let shutdown = async {
        tokio::signal::ctrl_c().await.ok();
        info!("Shutting down...");
    };

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown)
    .await?;

    info!("Goodbye!");
    Ok(())
}

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use dotenv::dotenv;
use tokio::net::TcpListener;
use tower_http::cors::{CorsLayer, Any};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{self, TraceLayer};
use tracing::{Level, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod router;

use shared_config::{AppConfig, StoreBackend};
use shared_database::{ClinicStore, InMemoryClinicStore, SupabaseClinicStore};
use shared_utils::{ClinicState, SystemClock};

fn build_store(config: &AppConfig) -> Arc<dyn ClinicStore> {
    match config.store_backend {
        StoreBackend::Supabase => {
            info!("Using Supabase store at {}", config.supabase_url);
            Arc::new(SupabaseClinicStore::new(config))
        }
        StoreBackend::Memory => {
            warn!("Using in-memory store; data is lost on restart");
            Arc::new(InMemoryClinicStore::new())
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Loading Env Vars
    dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting clinic queue API server");

    // Load configuration
    let config = AppConfig::from_env();
    let port = config.port;
    let request_timeout = Duration::from_secs(config.request_timeout_seconds);

    // Set up CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Create shared state
    let store = build_store(&config);
    let state = Arc::new(ClinicState::new(config, store, Arc::new(SystemClock)));

    // Build the application router
    let app = router::create_router(state)
        .layer(TimeoutLayer::new(request_timeout))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(trace::DefaultMakeSpan::new()
                    .level(Level::INFO))
                .on_response(trace::DefaultOnResponse::new()
                    .level(Level::INFO)),
        )
        .layer(cors);

    // Run the server
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("Listening on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

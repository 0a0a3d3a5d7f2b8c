//! Wedding Gift Registry Backend
//!
//! REST backend for a wedding gift registry: guests reserve gifts or contribute
//! to an open-amount gift, the couple manages the catalog and payment details.

mod api;
mod auth;
mod config;
mod db;
mod errors;
mod models;
mod registry;
mod workflow;

use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use config::Config;
use db::Store;
use registry::RegistryService;
use workflow::AdminConsole;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub registry: RegistryService,
    pub admin: AdminConsole,
    pub config: Arc<Config>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::from_env();

    // Initialize logging
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let subscriber = tracing_subscriber::registry().with(env_filter);
    if config.log_json {
        subscriber.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        subscriber.with(tracing_subscriber::fmt::layer()).init();
    }

    tracing::info!("Starting Gift Registry Backend");
    tracing::info!("Database path: {:?}", config.db_path);
    tracing::info!("Bind address: {}", config.bind_addr);

    if config.api_psk.is_none() {
        tracing::warn!("No admin PSK configured (REGISTRY_API_PSK). Admin routes are open!");
    }

    // Initialize the backing store
    let pool = db::init_database(&config.db_path).await?;
    let store = Store::new(pool);
    let registry = RegistryService::new(store.clone());

    // Seeds an empty store on first run
    let gifts = registry.fetch_all().await;
    tracing::info!("Catalog ready with {} gifts", gifts.len());

    let admin = AdminConsole::new(registry.clone());
    admin.load().await;
    admin.attach();

    let state = AppState {
        registry,
        admin: admin.clone(),
        config: Arc::new(config.clone()),
    };

    // Build router
    let app = create_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Shutting down");
    admin.detach();
    store.close().await;

    Ok(())
}

/// Resolves on Ctrl+C.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}

/// Create the application router with all routes.
pub fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Clone PSK for the auth layer
    let psk = state.config.api_psk.clone();

    // Guest routes
    let public_routes = Router::new()
        .route("/gifts", get(api::list_gifts))
        .route("/gifts/stream", get(api::stream_gifts))
        .route("/gifts/{id}/reserve", post(api::reserve_gift))
        .route("/categories", get(api::list_categories))
        .route("/config", get(api::get_config));

    // Admin routes
    let admin_routes = Router::new()
        .route(
            "/gifts",
            get(api::admin_list_gifts)
                .put(api::replace_gifts)
                .post(api::create_gift),
        )
        .route(
            "/gifts/{id}",
            put(api::update_gift).delete(api::delete_gift),
        )
        .route("/config/pix-key", put(api::save_pix_key))
        .route("/config/qrcode", put(api::save_qrcode))
        .route("/summary", get(api::get_summary))
        .route(
            "/reset",
            post(api::request_reset).delete(api::cancel_reset),
        )
        .route("/reset/confirm", post(api::confirm_reset))
        // Apply PSK auth middleware
        .layer(middleware::from_fn(move |req, next| {
            auth::psk_auth_layer(psk.clone(), req, next)
        }));

    // Health check (no auth required)
    let health_routes = Router::new().route("/health", get(health_check));

    Router::new()
        .nest("/api", public_routes.nest("/admin", admin_routes))
        .merge(health_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}

/// Health check endpoint.
async fn health_check() -> &'static str {
    "OK"
}

#[cfg(test)]
mod tests;

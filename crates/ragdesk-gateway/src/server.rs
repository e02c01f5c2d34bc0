//! Axum router and listener.

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::http::{HeaderValue, Method};
use axum::routing::{get, post};
use axum::{Router, middleware};
use ragdesk_agent::ServiceContext;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::{auth, routes};

/// Shared state for the gateway server.
#[derive(Clone)]
pub struct AppState {
    pub ctx: Arc<ServiceContext>,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(ctx: Arc<ServiceContext>) -> Self {
        Self {
            ctx,
            start_time: Instant::now(),
        }
    }
}

/// CORS for browser front-ends. `RAGDESK_CORS_ORIGINS` narrows the allowed
/// origins to a comma-separated list.
fn cors_layer() -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any)
        .max_age(Duration::from_secs(3600));
    match std::env::var("RAGDESK_CORS_ORIGINS") {
        Ok(list) => cors.allow_origin(
            list.split(',')
                .filter_map(|origin| origin.trim().parse::<HeaderValue>().ok())
                .collect::<Vec<_>>(),
        ),
        Err(_) => cors.allow_origin(Any),
    }
}

/// Every route except `/health` requires Basic credentials.
pub fn build_router(state: AppState) -> Router {
    let shared = Arc::new(state);

    let protected = Router::new()
        .route("/login", get(routes::login))
        .route("/test", get(routes::login))
        .route("/chat", post(routes::chat))
        .route("/upload", post(routes::upload))
        .route("/api/v1/stats", get(routes::stats))
        .route("/api/v1/reindex", post(routes::reindex))
        .route_layer(middleware::from_fn_with_state(shared.clone(), auth::require_user));

    Router::new()
        .route("/health", get(routes::health_check))
        .merge(protected)
        .layer(cors_layer())
        .layer(TraceLayer::new_for_http())
        .with_state(shared)
}

/// Start the HTTP server.
pub async fn start(ctx: Arc<ServiceContext>) -> anyhow::Result<()> {
    let gateway = ctx.config.gateway.clone();
    let addr = format!("{}:{}", gateway.host, gateway.port);

    tracing::info!(
        "🚀 RagDesk gateway on http://{addr} ({} users, {} vectors, datasets: {:?})",
        ctx.users.len(),
        ctx.store.count()?,
        ctx.datasets.departments()
    );

    let app = build_router(AppState::new(ctx));
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

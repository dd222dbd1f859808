//! Axum router construction for the query API.

use std::sync::Arc;

use axum::Router;
use axum::middleware;
use axum::routing::get;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;

/// Build the query router.
///
/// Every `/api` route sits behind [`handlers::reject_when_draining`];
/// `/health` stays reachable so load balancers can see the drain.
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/rank/{entity_id}", get(handlers::get_rank))
        .route("/api/top", get(handlers::get_top))
        .route("/api/activity/top", get(handlers::get_activity_top))
        .route("/api/stats", get(handlers::get_stats))
        .route("/api/dead-letters", get(handlers::list_dead_letters))
        .route_layer(middleware::from_fn_with_state(
            Arc::clone(&state),
            handlers::reject_when_draining,
        ))
        .route("/health", get(handlers::health))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

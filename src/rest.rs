//! Thin HTTP surface over the aggregation pipeline.
//!
//! One endpoint per exposed operation, nothing else: the pipeline is
//! the product, this is just how a browser reaches it. Shelf-level
//! upstream failures map to 502 with a diagnostic message; per-book
//! failures are already folded into the normal result body.

use crate::aggregate::Aggregator;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

/// Build the axum Router with all endpoints.
pub fn router(aggregator: Arc<Aggregator>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/api/v1/shelf", get(handle_shelf))
        .route("/api/v1/availability", get(handle_availability))
        .layer(cors)
        .with_state(aggregator)
}

/// Start the HTTP server on the given port.
pub async fn start(port: u16, aggregator: Arc<Aggregator>) -> anyhow::Result<()> {
    let app = router(aggregator);
    let addr = std::net::SocketAddr::from(([127, 0, 0, 1], port));
    tracing::info!("listening on http://{addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

#[derive(Deserialize)]
struct UserParams {
    #[serde(default)]
    user_id: String,
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

/// `GET /api/v1/shelf?user_id=<id>` — just the parsed shelf.
async fn handle_shelf(
    State(aggregator): State<Arc<Aggregator>>,
    Query(params): Query<UserParams>,
) -> impl IntoResponse {
    if params.user_id.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "missing user_id query parameter");
    }
    match aggregator.fetch_shelf(&params.user_id).await {
        Ok(books) => (StatusCode::OK, Json(serde_json::json!({ "books": books }))),
        Err(e) => error_response(StatusCode::BAD_GATEWAY, &e.to_string()),
    }
}

/// `GET /api/v1/availability?user_id=<id>` — the full pipeline.
async fn handle_availability(
    State(aggregator): State<Arc<Aggregator>>,
    Query(params): Query<UserParams>,
) -> impl IntoResponse {
    if params.user_id.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "missing user_id query parameter");
    }
    match aggregator.aggregate(&params.user_id).await {
        Ok(results) => (
            StatusCode::OK,
            Json(serde_json::json!({ "results": results })),
        ),
        Err(e) => error_response(StatusCode::BAD_GATEWAY, &e.to_string()),
    }
}

fn error_response(status: StatusCode, message: &str) -> (StatusCode, Json<serde_json::Value>) {
    (status, Json(serde_json::json!({ "error": message })))
}

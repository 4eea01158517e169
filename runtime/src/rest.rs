// Copyright 2026 Pricescout Contributors
// SPDX-License-Identifier: Apache-2.0

//! HTTP REST API for the scrape service.
//!
//! `GET /health` and `POST /scrape`. Admission problems (malformed body)
//! are rejected here, before any tracker entry exists; everything else
//! becomes a JSON envelope from the dispatcher.

use crate::dispatcher::Dispatcher;
use crate::envelope::{HealthResponse, ScrapeRequest, ScrapeResponse};
use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use std::future::Future;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// State shared by every handler.
pub struct AppState {
    pub dispatcher: Dispatcher,
    pub service_name: String,
}

/// Request rejected at the HTTP edge.
#[derive(Debug, thiserror::Error)]
pub enum AdmissionError {
    #[error("malformed request body: {0}")]
    MalformedBody(#[from] serde_json::Error),
}

impl IntoResponse for AdmissionError {
    fn into_response(self) -> Response {
        tracing::warn!("rejected request: {self}");
        (StatusCode::BAD_REQUEST, "Bad request").into_response()
    }
}

/// Build the axum Router with all REST endpoints.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/scrape", post(scrape))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Serve on `addr` until `shutdown` resolves, then drain open connections.
pub async fn serve<F>(addr: &str, state: Arc<AppState>, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("REST API listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse::now(&state.service_name))
}

/// The body is taken raw so that any decode failure, including a missing
/// or wrong content type, maps to a plain 400.
async fn scrape(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<ScrapeResponse>, AdmissionError> {
    let request: ScrapeRequest = serde_json::from_slice(&body)?;
    let result = state.dispatcher.handle(&request).await;
    Ok(Json(ScrapeResponse::from(&result)))
}

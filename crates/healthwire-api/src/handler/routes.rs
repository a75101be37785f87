//! Route handlers

use axum::{
    body::Body,
    extract::{Query, State},
    http::{header, HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;

use healthwire_core::{HealthReport, TelemetryError};

use super::AppState;
use crate::error::ApiError;
use crate::service::{Credentials, IngestRequest, IngestionPipeline};

#[derive(Debug, Serialize)]
pub struct AcceptedResponse {
    pub status: &'static str,
}

#[derive(Debug, Serialize)]
pub struct LivenessResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
}

/// Every `minutes` value in the query string, in order
fn minutes_params(pairs: &[(String, String)]) -> Vec<&str> {
    pairs
        .iter()
        .filter(|(name, _)| name == "minutes")
        .map(|(_, value)| value.as_str())
        .collect()
}

fn declared_length(headers: &HeaderMap) -> Option<usize> {
    headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<usize>().ok())
}

/// Any method on /telemetry/ingest
pub async fn ingest(
    State(state): State<Arc<AppState>>,
    method: Method,
    headers: HeaderMap,
    body: Body,
) -> Response {
    let start = Instant::now();
    let result = ingest_inner(&state, &method, &headers, body).await;
    let elapsed = start.elapsed().as_secs_f64();

    match result {
        Ok(()) => {
            state.metrics.record_ingest("accepted", elapsed);
            (
                StatusCode::ACCEPTED,
                Json(AcceptedResponse { status: "accepted" }),
            )
                .into_response()
        }
        Err(err) => {
            let outcome = err.error_code().to_ascii_lowercase();
            state.metrics.record_ingest(&outcome, elapsed);
            err.into_response()
        }
    }
}

async fn ingest_inner(
    state: &AppState,
    method: &Method,
    headers: &HeaderMap,
    body: Body,
) -> Result<(), ApiError> {
    IngestionPipeline::ensure_method(method)?;

    let limit = state.server.max_body_bytes;
    if declared_length(headers).is_some_and(|len| len > limit) {
        return Err(TelemetryError::PayloadTooLarge { limit }.into());
    }
    let body = axum::body::to_bytes(body, limit)
        .await
        .map_err(|_| TelemetryError::PayloadTooLarge { limit })?;

    let request = IngestRequest {
        method,
        credentials: Credentials::from_headers(headers),
        body: &body,
    };
    state.ingestion.ingest(request, Utc::now()).await?;
    Ok(())
}

/// GET /telemetry/health
pub async fn health_report(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Result<Json<HealthReport>, ApiError> {
    let credentials = Credentials::from_headers(&headers);
    let result = state
        .health
        .query(credentials.api_key, &minutes_params(&pairs), Utc::now())
        .await;

    match result {
        Ok(report) => {
            state.metrics.record_health_query(report.status.as_str());
            Ok(Json(report))
        }
        Err(err) => {
            state.metrics.record_health_query("error");
            Err(err.into())
        }
    }
}

/// Non-GET methods on /telemetry/health
pub async fn get_only() -> ApiError {
    ApiError(TelemetryError::MethodNotAllowed { allow: "GET" })
}

/// GET /health
pub async fn liveness() -> Json<LivenessResponse> {
    Json(LivenessResponse {
        status: "ok",
        service: "healthwire",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// GET /metrics
pub async fn metrics(State(state): State<Arc<AppState>>) -> Result<Response, ApiError> {
    let text = state
        .metrics
        .encode_text()
        .map_err(|e| TelemetryError::internal(e.to_string()))?;
    Ok((
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        text,
    )
        .into_response())
}

//! Synchronous fallback endpoint.
//!
//! One-shot request/response ingestion for devices that cannot hold a
//! persistent connection open. Shares the validator, resolver, and
//! coordinator with the streaming path. Each section of the payload is
//! validated and dispatched independently, so a malformed section never
//! fails the whole request: the response enumerates, per section,
//! whether it was stored, skipped, or errored.

use crate::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use guardian_ingest::{parse_section, AckBody};
use guardian_types::{DataKind, DeviceIdentity};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

/// Per-section outcome in the fallback response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SectionOutcome {
    /// Section present and persisted.
    Stored { result: AckBody },
    /// Section absent from the request.
    Skipped,
    /// Section present but failed validation or storage.
    Error { message: String },
}

/// `POST /api/ingest` response body: one outcome per section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestResponse {
    pub screen_time: SectionOutcome,
    pub location: SectionOutcome,
    pub site_access: SectionOutcome,
}

/// `POST /api/ingest` — body `{child_hash, screen_time_info?,
/// location_info?, site_access_info?}`.
///
/// The credential is resolved once per request. Sections then succeed
/// or fail independently; the response is always 200 once the
/// credential resolves, even when every present section errored.
pub(crate) async fn api_ingest(State(state): State<AppState>, body: String) -> Response {
    let Ok(payload) = serde_json::from_str::<Value>(&body) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "invalid JSON"})),
        )
            .into_response();
    };
    let Some(child_hash) = payload.get("child_hash").and_then(Value::as_str) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "child_hash required"})),
        )
            .into_response();
    };

    let identity = match state.resolver.resolve(child_hash).await {
        Ok(identity) => identity,
        Err(e) => {
            return (StatusCode::NOT_FOUND, Json(json!({"error": e.to_string()}))).into_response();
        }
    };

    debug!(device = %identity, "fallback ingest request");
    let response = IngestResponse {
        screen_time: run_section(
            &state,
            &identity,
            payload.get("screen_time_info"),
            DataKind::ScreenTime,
        )
        .await,
        location: run_section(
            &state,
            &identity,
            payload.get("location_info"),
            DataKind::Location,
        )
        .await,
        site_access: run_section(
            &state,
            &identity,
            payload.get("site_access_info"),
            DataKind::SiteAccess,
        )
        .await,
    };

    (StatusCode::OK, Json(response)).into_response()
}

/// Validates and dispatches one optional section.
async fn run_section(
    state: &AppState,
    identity: &DeviceIdentity,
    section: Option<&Value>,
    kind: DataKind,
) -> SectionOutcome {
    let Some(data) = section.filter(|v| !v.is_null()) else {
        return SectionOutcome::Skipped;
    };
    let message = match parse_section(kind, data) {
        Ok(message) => message,
        Err(e) => {
            return SectionOutcome::Error {
                message: e.to_string(),
            };
        }
    };
    match state.coordinator.dispatch(identity, message).await {
        Ok(ack) => SectionOutcome::Stored { result: ack.result },
        Err(e) => SectionOutcome::Error {
            message: e.to_string(),
        },
    }
}

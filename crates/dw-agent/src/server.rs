//! HTTP surface of the agent.
//!
//! The scanner drives the snapshot protocol over a small JSON API:
//!
//! - `PUT  /self-changes` registers a suppression prefix
//! - `POST /snapshot/begin` freezes a generation
//! - `POST /snapshot/page` serves one page of the open generation
//! - `POST /snapshot/commit` acknowledges a fully read generation
//! - `POST /snapshot/abandon` releases a generation for re-delivery
//! - `GET  /stats` reports counters and set sizes
//!
//! Protocol misuse maps to `409 Conflict` with a JSON error body; `Busy`
//! additionally marks itself retryable so a polling scanner can back off
//! without inspecting the message.

use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use camino::Utf8PathBuf;
use dw_core::{ChangeKind, ChangeRecord, Cursor, GenerationId};
use dw_tracker::{ChangeTracker, Page, ProtocolError, StatsSnapshot};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Builds the agent router over a shared tracker handle.
pub fn router(tracker: ChangeTracker) -> Router {
    Router::new()
        .route("/self-changes", put(register_self_change))
        .route("/snapshot/begin", post(begin_snapshot))
        .route("/snapshot/page", post(get_page))
        .route("/snapshot/commit", post(commit))
        .route("/snapshot/abandon", post(abandon))
        .route("/stats", get(stats))
        .with_state(tracker)
}

// =============================================================================
// WIRE TYPES
// =============================================================================

/// A change record on the wire.
///
/// The in-memory record carries a monotonic timestamp that is meaningless
/// outside the process, so only path and kind are exposed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireRecord {
    /// Affected path.
    pub path: Utf8PathBuf,

    /// Net-effect change kind.
    pub kind: ChangeKind,
}

impl From<ChangeRecord> for WireRecord {
    fn from(record: ChangeRecord) -> Self {
        Self {
            path: record.path,
            kind: record.kind,
        }
    }
}

/// Request body for `PUT /self-changes`.
#[derive(Debug, Deserialize)]
pub struct RegisterSelfChangeRequest {
    /// Path prefix to suppress.
    pub path: Utf8PathBuf,

    /// Suppression TTL in seconds; the configured default when omitted.
    #[serde(default)]
    pub ttl_secs: Option<u64>,
}

/// Response body for `POST /snapshot/begin`.
#[derive(Debug, Serialize, Deserialize)]
pub struct BeginResponse {
    /// The frozen generation.
    pub generation: GenerationId,

    /// Cursor positioned at the first record.
    pub cursor: Cursor,
}

/// Request body for `POST /snapshot/page`.
#[derive(Debug, Deserialize)]
pub struct PageRequest {
    /// Cursor from `begin` or the previous page.
    pub cursor: Cursor,

    /// Requested page size; the configured default when omitted, clamped
    /// to the configured maximum either way.
    #[serde(default)]
    pub page_size: Option<usize>,
}

/// Response body for `POST /snapshot/page`.
#[derive(Debug, Serialize, Deserialize)]
pub struct PageResponse {
    /// Records in stable order.
    pub records: Vec<WireRecord>,

    /// Cursor for the next page.
    pub next_cursor: Cursor,

    /// Overflow flag captured at freeze time.
    pub overflow: bool,

    /// `true` once the generation is exhausted.
    pub done: bool,
}

impl From<Page> for PageResponse {
    fn from(page: Page) -> Self {
        Self {
            records: page.records.into_iter().map(WireRecord::from).collect(),
            next_cursor: page.next_cursor,
            overflow: page.overflow,
            done: page.done,
        }
    }
}

/// Request body for `POST /snapshot/commit` and `POST /snapshot/abandon`.
#[derive(Debug, Deserialize)]
pub struct GenerationRequest {
    /// The generation being acknowledged or released.
    pub generation: GenerationId,
}

/// JSON error body for protocol failures.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Human-readable description.
    pub error: String,

    /// `true` when the caller should simply retry later.
    pub retryable: bool,
}

/// Wrapper making [`ProtocolError`] an axum response.
#[derive(Debug)]
pub struct ApiError(pub ProtocolError);

impl From<ProtocolError> for ApiError {
    fn from(error: ProtocolError) -> Self {
        Self(error)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.0.to_string(),
            retryable: self.0.is_retryable(),
        };
        (StatusCode::CONFLICT, Json(body)).into_response()
    }
}

// =============================================================================
// HANDLERS
// =============================================================================

/// `PUT /self-changes`
async fn register_self_change(
    State(tracker): State<ChangeTracker>,
    Json(request): Json<RegisterSelfChangeRequest>,
) -> StatusCode {
    debug!(path = %request.path, ttl_secs = ?request.ttl_secs, "self-change registration");
    tracker.register_self_change(request.path, request.ttl_secs.map(Duration::from_secs));
    StatusCode::NO_CONTENT
}

/// `POST /snapshot/begin`
async fn begin_snapshot(
    State(tracker): State<ChangeTracker>,
) -> Result<Json<BeginResponse>, ApiError> {
    let start = tracker.begin_snapshot()?;
    Ok(Json(BeginResponse {
        generation: start.generation,
        cursor: start.cursor,
    }))
}

/// `POST /snapshot/page`
async fn get_page(
    State(tracker): State<ChangeTracker>,
    Json(request): Json<PageRequest>,
) -> Result<Json<PageResponse>, ApiError> {
    let page = tracker.get_page(request.cursor, request.page_size)?;
    Ok(Json(PageResponse::from(page)))
}

/// `POST /snapshot/commit`
async fn commit(
    State(tracker): State<ChangeTracker>,
    Json(request): Json<GenerationRequest>,
) -> Result<StatusCode, ApiError> {
    tracker.commit(request.generation)?;
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /snapshot/abandon`
async fn abandon(
    State(tracker): State<ChangeTracker>,
    Json(request): Json<GenerationRequest>,
) -> StatusCode {
    tracker.abandon(request.generation);
    StatusCode::NO_CONTENT
}

/// `GET /stats`
async fn stats(State(tracker): State<ChangeTracker>) -> Json<StatsSnapshot> {
    Json(tracker.stats())
}

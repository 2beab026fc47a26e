use std::io;
use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use futures::TryStreamExt;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tapr_changer::{Changer, Location, StatusMap};
use tapr_protocol::{
    ErrorKind, HealthResponse, PushLogRequest, PushPrepareRequest, PushPrepareResponse,
    PushResponse,
};
use tapr_types::Tx;
use tokio_util::io::StreamReader;
use tracing::warn;

use crate::error::ServerError;
use crate::push::IoServer;

/// Shared state for every handler.
#[derive(Clone)]
pub struct AppState {
    pub io: IoServer,
    pub changer: Option<Arc<dyn Changer>>,
}

impl AppState {
    pub fn new(io: IoServer) -> Self {
        Self { io, changer: None }
    }

    pub fn with_changer(mut self, changer: Arc<dyn Changer>) -> Self {
        self.changer = Some(changer);
        self
    }

    fn changer(&self) -> Result<&Arc<dyn Changer>, ServerError> {
        self.changer.as_ref().ok_or(ServerError::NoChanger)
    }
}

/// A [`ServerError`] rendered as an HTTP response with a JSON wire error.
#[derive(Debug)]
pub struct ApiError(pub ServerError);

impl From<ServerError> for ApiError {
    fn from(err: ServerError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let wire = self.0.to_wire();
        let status = match wire.kind {
            ErrorKind::Invalid => StatusCode::BAD_REQUEST,
            ErrorKind::Exist | ErrorKind::Busy => StatusCode::CONFLICT,
            ErrorKind::NotExist => StatusCode::NOT_FOUND,
            ErrorKind::Permission => StatusCode::FORBIDDEN,
            ErrorKind::Timeout => StatusCode::GATEWAY_TIMEOUT,
            ErrorKind::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
            ErrorKind::Io | ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            warn!(error = %self.0, "request failed");
        }
        (status, Json(wire)).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

/// Health check handler.
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::default())
}

/// Info handler.
pub async fn info_handler(State(state): State<AppState>) -> Json<serde_json::Value> {
    let store = state.io.store();
    Json(json!({
        "name": "tapr-server",
        "version": env!("CARGO_PKG_VERSION"),
        "protocol_version": tapr_protocol::PROTOCOL_VERSION,
        "store": {
            "name": store.name(),
            "backend": store.backend(),
        },
        "active_transactions": state.io.table().len(),
        "changer": state.changer.is_some(),
    }))
}

pub async fn push_prepare_handler(
    State(state): State<AppState>,
    Json(req): Json<PushPrepareRequest>,
) -> ApiResult<Json<PushPrepareResponse>> {
    Ok(Json(state.io.push_prepare(&req).await?))
}

/// Streams the request body into a push transaction.
///
/// The push runs on its own task so that it always reaches its cleanup: if
/// the client goes away, this future is dropped, the guard cancels the
/// push, and the task evicts and closes the transaction.
pub async fn push_handler(State(state): State<AppState>, body: Body) -> ApiResult<Json<PushResponse>> {
    let stream = body.into_data_stream().map_err(io::Error::other);
    let reader = StreamReader::new(stream);

    let cancel = state.io.shutdown_token().child_token();
    let _guard = cancel.clone().drop_guard();

    let io = state.io.clone();
    let response = tokio::spawn(async move { io.push(reader, cancel).await })
        .await
        .map_err(|e| ServerError::Internal(format!("push task failed: {e}")))??;

    Ok(Json(response))
}

/// Newline-delimited JSON heartbeats until the client disconnects or the
/// server shuts down.
pub async fn push_log_handler(State(state): State<AppState>, Path(tx): Path<String>) -> ApiResult<Response> {
    let tx = Tx::from_hex(&tx).map_err(|e| ServerError::InvalidRequest(format!("bad transaction id: {e}")))?;

    let cancel = state.io.shutdown_token().child_token();
    let rx = state.io.push_log(&PushLogRequest { tx }, cancel.clone());
    let guard = cancel.drop_guard();

    let lines = futures::stream::unfold((rx, guard), |(mut rx, guard)| async move {
        let entry = rx.recv().await?;
        let mut line = serde_json::to_vec(&entry).ok()?;
        line.push(b'\n');
        Some((Ok::<_, io::Error>(Bytes::from(line)), (rx, guard)))
    });

    Ok(([(header::CONTENT_TYPE, "application/x-ndjson")], Body::from_stream(lines)).into_response())
}

/// Source and optional destination of a changer move.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MoveRequest {
    pub src: Location,
    #[serde(default)]
    pub dst: Option<Location>,
}

pub async fn changer_status_handler(State(state): State<AppState>) -> ApiResult<Json<StatusMap>> {
    let status = state.changer()?.status().await.map_err(ServerError::from)?;
    Ok(Json(status))
}

pub async fn changer_transfer_handler(
    State(state): State<AppState>,
    Json(req): Json<MoveRequest>,
) -> ApiResult<StatusCode> {
    let dst = req
        .dst
        .ok_or_else(|| ServerError::InvalidRequest("transfer requires a destination".into()))?;
    state
        .changer()?
        .transfer(req.src, dst)
        .await
        .map_err(ServerError::from)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn changer_load_handler(
    State(state): State<AppState>,
    Json(req): Json<MoveRequest>,
) -> ApiResult<StatusCode> {
    state.changer()?.load(req.src, req.dst).await.map_err(ServerError::from)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn changer_unload_handler(
    State(state): State<AppState>,
    Json(req): Json<MoveRequest>,
) -> ApiResult<StatusCode> {
    state.changer()?.unload(req.src, req.dst).await.map_err(ServerError::from)?;
    Ok(StatusCode::NO_CONTENT)
}

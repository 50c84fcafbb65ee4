/*!
Directory REST API

- `GET  /health`        liveness check
- `GET  /servers`       every host, in registration order, with its topic
- `GET  /servers/{id}`  one host or 404
- `POST /servers`       register a host: 201 with the stored entry, 400 when
                        the body does not decode or a required field is
                        empty, 409 when the id is already taken
*/

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use hoststat_core::{HostId, HostRecord, HostView};
use std::future::Future;
use tokio::net::TcpListener;
use tracing::warn;

use crate::directory::{Directory, DirectoryError};

#[derive(Clone)]
pub struct AppState {
    pub directory: Directory,
}

pub fn build_router(directory: Directory) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/servers", get(list_servers).post(register_server))
        .route("/servers/{id}", get(get_server))
        .with_state(AppState { directory })
}

/// Serves the API on `listener` until `shutdown` resolves.
pub async fn serve<F>(listener: TcpListener, directory: Directory, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    axum::serve(listener, build_router(directory))
        .with_graceful_shutdown(shutdown)
        .await
}

pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl From<DirectoryError> for ApiError {
    fn from(err: DirectoryError) -> Self {
        let status = match err {
            DirectoryError::Invalid(_) => StatusCode::BAD_REQUEST,
            DirectoryError::Duplicate(_) => StatusCode::CONFLICT,
        };
        Self::new(status, err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(serde_json::json!({ "error": self.message }))).into_response()
    }
}

// GET /servers
async fn list_servers(State(app): State<AppState>) -> Json<Vec<HostView>> {
    Json(app.directory.views())
}

// GET /servers/{id}
async fn get_server(
    State(app): State<AppState>,
    Path(id): Path<HostId>,
) -> Result<Json<HostView>, ApiError> {
    app.directory
        .view(id)
        .map(Json)
        .ok_or_else(|| ApiError::new(StatusCode::NOT_FOUND, format!("host {id} not found")))
}

// POST /servers
async fn register_server(
    State(app): State<AppState>,
    body: Result<Json<HostRecord>, JsonRejection>,
) -> Result<(StatusCode, Json<HostView>), ApiError> {
    // axum answers 422 for well-formed JSON of the wrong shape; every decode
    // failure is a 400 here.
    let Json(candidate) = body.map_err(|rejection| {
        warn!("rejected registration body: {}", rejection.body_text());
        ApiError::new(StatusCode::BAD_REQUEST, rejection.body_text())
    })?;

    let stored = app.directory.register(candidate).map_err(|e| {
        warn!("registration refused: {e}");
        ApiError::from(e)
    })?;
    Ok((StatusCode::CREATED, Json(app.directory.view_of(stored))))
}

//! HTTP binding of the request handlers.

use crate::error::{ServerError, ServerResult};
use crate::server::SyncServer;
use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::Value;
use std::sync::Arc;
use std::time::SystemTime;
use tracing::{debug, error, info};
use verstream_protocol::{
    CreateUserResponse, ErrorBody, LogRecord, LoginRequest, LoginResponse, StreamQuery,
};

type Shared = Arc<SyncServer>;

/// Builds the HTTP API router.
///
/// | route | handler |
/// |---|---|
/// | `POST /ping` | 204 |
/// | `POST /google-login` | [`LoginResponse`] |
/// | `POST /users` | [`CreateUserResponse`] |
/// | `GET /users/{user_id}/stream?start=` | JSON array of records |
/// | `POST /users/{user_id}/stream` | 204 |
pub fn router(server: Shared) -> Router {
    Router::new()
        .route("/ping", post(ping))
        .route("/google-login", post(login))
        .route("/users", post(create_user))
        .route("/users/{user_id}/stream", post(append_stream).get(read_stream))
        .with_state(server)
}

/// Binds the configured address and serves the API until the process exits.
pub async fn serve(server: Shared) -> ServerResult<()> {
    let listener = tokio::net::TcpListener::bind(server.config().bind_addr).await?;
    info!(addr = %listener.local_addr()?, "listening");
    axum::serve(listener, router(server)).await?;
    Ok(())
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if self.is_server_error() {
            error!(error = %self, "request failed");
        } else {
            debug!(error = %self, status = status.as_u16(), "request rejected");
        }
        (status, Json(ErrorBody::new(self.to_string()))).into_response()
    }
}

fn authorization(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}

/// Runs a handler that may touch the disk off the async workers.
async fn blocking<T, F>(f: F) -> ServerResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> ServerResult<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ServerError::Internal(e.to_string()))?
}

async fn ping(State(server): State<Shared>) -> ServerResult<StatusCode> {
    server.handler().handle_ping()?;
    Ok(StatusCode::NO_CONTENT)
}

async fn login(
    State(server): State<Shared>,
    body: Bytes,
) -> ServerResult<Json<LoginResponse>> {
    let request: LoginRequest = serde_json::from_slice(&body)
        .map_err(|e| ServerError::InvalidRequest(e.to_string()))?;
    let response = blocking(move || server.handler().handle_login(request, SystemTime::now())).await?;
    Ok(Json(response))
}

async fn create_user(
    State(server): State<Shared>,
    headers: HeaderMap,
) -> ServerResult<Json<CreateUserResponse>> {
    let auth = authorization(&headers);
    let response = blocking(move || {
        server
            .handler()
            .handle_create_user(auth.as_deref(), SystemTime::now())
    })
    .await?;
    Ok(Json(response))
}

async fn read_stream(
    State(server): State<Shared>,
    Path(user_id): Path<String>,
    Query(query): Query<StreamQuery>,
    headers: HeaderMap,
) -> ServerResult<Json<Vec<LogRecord>>> {
    let auth = authorization(&headers);
    let records = blocking(move || {
        server
            .handler()
            .handle_read(auth.as_deref(), &user_id, query.start, SystemTime::now())
    })
    .await?;
    Ok(Json(records))
}

async fn append_stream(
    State(server): State<Shared>,
    Path(user_id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> ServerResult<StatusCode> {
    let auth = authorization(&headers);
    let body: Value = serde_json::from_slice(&body)
        .map_err(|e| ServerError::InvalidRequest(e.to_string()))?;
    blocking(move || {
        server
            .handler()
            .handle_append(auth.as_deref(), &user_id, body, SystemTime::now())
    })
    .await?;
    Ok(StatusCode::NO_CONTENT)
}

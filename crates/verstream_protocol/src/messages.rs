//! Request and response bodies of the HTTP API.

use serde::{Deserialize, Serialize};

/// Header prefix of session-authenticated requests.
pub const BEARER_PREFIX: &str = "Bearer ";

/// Body of `POST /google-login`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginRequest {
    /// Token issued by the identity provider.
    pub bearer: String,
}

/// Response of `POST /google-login`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    /// New session token.
    pub session_id: String,
    /// The user bound to the identity, if one exists yet.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

/// Response of `POST /users`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserResponse {
    /// Id of the created user.
    pub user_id: String,
}

/// Body of every error response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Human-readable message.
    pub error: String,
}

impl ErrorBody {
    /// Creates an error body.
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

/// Query string of `GET /users/{id}/stream`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamQuery {
    /// First version to return.
    #[serde(default)]
    pub start: i64,
}

/// Path of a user's stream resource.
pub fn stream_path(user_id: &str) -> String {
    format!("/users/{user_id}/stream")
}

/// Extracts the token from an `Authorization` header value.
pub fn bearer_token(header: &str) -> Option<&str> {
    header
        .strip_prefix(BEARER_PREFIX)
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Formats an `Authorization` header value.
pub fn bearer_header(token: &str) -> String {
    format!("{BEARER_PREFIX}{token}")
}

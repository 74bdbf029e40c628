use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

/// Failures surfaced by the client API.
///
/// Each variant carries everything its JSON body needs; the axum layer
/// renders them uniformly through `IntoResponse`.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    /// Neither discovery endpoint of the probed base produced a usable
    /// document. Carries every URL tried and the last failure seen.
    #[error("Discovery failed for {base}")]
    DiscoveryFailed {
        base: String,
        tried: Vec<String>,
        last_err: String,
    },

    #[error("{0}")]
    Internal(String),
}

impl ClientError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::DiscoveryFailed { .. } => StatusCode::BAD_GATEWAY,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ClientError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = match &self {
            Self::DiscoveryFailed {
                tried, last_err, ..
            } => json!({
                "error": self.to_string(),
                "tried": tried,
                "lastErr": last_err,
            }),
            _ => json!({ "error": self.to_string() }),
        };
        (status, Json(body)).into_response()
    }
}

impl From<anyhow::Error> for ClientError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(format!("{err:#}"))
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;

//! Error taxonomy for the flow engine (§7, §10.2).
//!
//! A single `thiserror`-derived enum carries every failure mode this crate
//! produces, from HTTP-boundary validation through persistence and node
//! execution. It implements `IntoResponse` so axum handlers can return
//! `Result<T, EngineError>` directly, the same shape as the teacher's
//! `PlatformError`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("validation failed: {message}")]
    Validation { message: String },

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("conflict: {message}")]
    Conflict { message: String },

    #[error("external API error ({status}): {message}")]
    ExternalApi { status: u16, message: String },

    #[error("runtime guard tripped: {message}")]
    RuntimeGuard { message: String },

    #[error(transparent)]
    Database(#[from] mongodb::error::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("bson serialization error: {0}")]
    BsonSerialization(#[from] bson::ser::Error),

    #[error("bson deserialization error: {0}")]
    BsonDeserialization(#[from] bson::de::Error),
}

impl EngineError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation { message: message.into() }
    }

    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound { entity, id: id.into() }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict { message: message.into() }
    }

    pub fn external_api(status: u16, message: impl Into<String>) -> Self {
        Self::ExternalApi { status, message: message.into() }
    }

    pub fn runtime_guard(message: impl Into<String>) -> Self {
        Self::RuntimeGuard { message: message.into() }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation { .. } => StatusCode::BAD_REQUEST,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::Conflict { .. } => StatusCode::CONFLICT,
            Self::ExternalApi { .. } => StatusCode::BAD_GATEWAY,
            Self::RuntimeGuard { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Database(_) | Self::Serialization(_) | Self::BsonSerialization(_)
            | Self::BsonDeserialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl IntoResponse for EngineError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error = match &self {
            Self::Validation { .. } => "validation_error",
            Self::NotFound { .. } => "not_found",
            Self::Conflict { .. } => "conflict",
            Self::ExternalApi { .. } => "external_api_error",
            Self::RuntimeGuard { .. } => "runtime_guard",
            Self::Database(_) => "database_error",
            Self::Serialization(_) | Self::BsonSerialization(_) | Self::BsonDeserialization(_) => {
                "serialization_error"
            }
        };
        let body = ErrorResponse {
            error: error.to_string(),
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;

/// Detects a MongoDB duplicate-key write error (code 11000), the signal
/// used to re-read on a concurrent insert race (§4.6, C6).
pub fn is_duplicate_key_error(error: &mongodb::error::Error) -> bool {
    if let mongodb::error::ErrorKind::Write(mongodb::error::WriteFailure::WriteError(write_error)) =
        error.kind.as_ref()
    {
        write_error.code == 11000
    } else {
        false
    }
}

/// Errors raised while walking a session's nodes (§4.5, §7). Converted to
/// `EngineError` at the HTTP boundary; the webhook path instead logs and
/// marks the session `Errored` without propagating further (§7).
#[derive(Debug, thiserror::Error)]
pub enum ExecutorError {
    #[error("node data validation failed: {0}")]
    NodeValidation(String),

    #[error("send failed (status {status}): {message}")]
    SendFailed { status: u16, message: String },

    #[error("runtime guard: {0}")]
    RuntimeGuard(String),

    #[error("referenced node or edge missing: {0}")]
    MissingReference(String),

    #[error(transparent)]
    Engine(#[from] EngineError),
}

impl From<ExecutorError> for EngineError {
    fn from(err: ExecutorError) -> Self {
        match err {
            ExecutorError::NodeValidation(message) => EngineError::Validation { message },
            ExecutorError::SendFailed { status, message } => {
                EngineError::ExternalApi { status, message }
            }
            ExecutorError::RuntimeGuard(message) => EngineError::RuntimeGuard { message },
            ExecutorError::MissingReference(message) => {
                EngineError::NotFound { entity: "node", id: message }
            }
            ExecutorError::Engine(e) => e,
        }
    }
}

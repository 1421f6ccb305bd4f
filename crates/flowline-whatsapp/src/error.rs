//! Outbound send error taxonomy (§4.4, §7 "External-API").

#[derive(Debug, thiserror::Error)]
pub enum SendError {
    #[error("recipient phone has no digits after normalization")]
    InvalidPhone,

    #[error("invalid send request: {0}")]
    Validation(#[from] crate::payload::PayloadError),

    /// Distinguished so callers can surface the fixed reconnection prompt
    /// (§4.4, §7 "Meta access token expired").
    #[error("Meta access token expired")]
    AccessTokenExpired,

    #[error("Meta returned {status}: {message}")]
    Http { status: u16, message: String },

    #[error("allow-list enrollment failed: {reason}")]
    AllowListEnrollmentFailed { reason: String },

    #[error("request to Meta timed out")]
    Timeout,

    #[error("request to Meta failed: {0}")]
    Transport(String),
}

impl SendError {
    /// HTTP status this error should surface as at an API boundary, per
    /// the builder's own status on non-2xx Meta responses, 504 on
    /// timeout, and 502 for transport-level failures.
    pub fn status_code(&self) -> u16 {
        match self {
            SendError::InvalidPhone | SendError::Validation(_) => 400,
            SendError::AccessTokenExpired => 401,
            SendError::Http { status, .. } => *status,
            SendError::AllowListEnrollmentFailed { .. } => 400,
            SendError::Timeout => 504,
            SendError::Transport(_) => 502,
        }
    }
}

use std::fmt;

use thiserror::Error;

/// Shown to users whenever an answer could not be produced. Internal detail
/// stays in the logs.
pub const GENERIC_ANSWER_FAILURE: &str =
    "I couldn’t fetch an answer right now. Please try again later.";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ServiceKind {
    Answer,
    Feedback,
}

impl fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Answer => f.write_str("answer service"),
            Self::Feedback => f.write_str("feedback service"),
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ServiceError {
    #[error("{service} request failed: {message}")]
    Transport { service: ServiceKind, message: String },
    #[error("{service} returned HTTP {status}: {body}")]
    Status { service: ServiceKind, status: u16, body: String },
    #[error("{service} response could not be decoded: {message}")]
    Decode { service: ServiceKind, message: String },
}

impl ServiceError {
    /// Stable label for the `error_class` log field.
    pub fn error_class(&self) -> &'static str {
        match self {
            Self::Transport { .. } => "transport",
            Self::Status { .. } => "http_status",
            Self::Decode { .. } => "decode",
        }
    }
}

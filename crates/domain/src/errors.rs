//! Error types used throughout lrsync

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::impl_wire_name_conversions;

/// Classified reason a request to the record store did not succeed.
///
/// `TimedOut` and `TransportUnavailable` are transient: queued statements
/// that hit them stay queued and are retried silently. Every other kind is
/// permanent and is surfaced to queue observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RequestErrorKind {
    /// Malformed request; it was never sent.
    InvalidArgument,
    /// Credentials were rejected.
    Unauthorized,
    /// The resource does not exist.
    NotFound,
    /// No response arrived before the request timeout.
    TimedOut,
    /// The store refused the write because of a conflicting resource.
    Conflict,
    /// A conditional header did not match.
    PreconditionFailed,
    /// The store answered with a 5xx status.
    ServerError,
    /// The network was unreachable or the connection dropped.
    TransportUnavailable,
}

impl_wire_name_conversions!(RequestErrorKind {
    InvalidArgument => "invalid_argument",
    Unauthorized => "unauthorized",
    NotFound => "not_found",
    TimedOut => "timed_out",
    Conflict => "conflict",
    PreconditionFailed => "precondition_failed",
    ServerError => "server_error",
    TransportUnavailable => "transport_unavailable",
});

impl RequestErrorKind {
    /// True for failures the queue retries without telling anyone.
    pub const fn is_transient(self) -> bool {
        matches!(self, Self::TimedOut | Self::TransportUnavailable)
    }

    /// Map an HTTP status the caller considers a failure to an error kind.
    pub const fn from_status(status: u16) -> Self {
        match status {
            401 | 403 => Self::Unauthorized,
            404 => Self::NotFound,
            408 => Self::TimedOut,
            409 => Self::Conflict,
            412 => Self::PreconditionFailed,
            500..=599 => Self::ServerError,
            _ => Self::InvalidArgument,
        }
    }

    /// Fixed, user-presentable message for this kind.
    pub const fn friendly_message(self) -> &'static str {
        match self {
            Self::InvalidArgument => "The request contained invalid information.",
            Self::Unauthorized => "The server rejected the supplied credentials.",
            Self::NotFound => "The requested resource could not be found.",
            Self::TimedOut => "The request timed out before the server responded.",
            Self::Conflict => "The resource conflicts with one that already exists.",
            Self::PreconditionFailed => "The resource changed since it was last retrieved.",
            Self::ServerError => "The server encountered an error.",
            Self::TransportUnavailable => "The server could not be reached.",
        }
    }
}

/// A failed request with its classification.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("{kind}: {message}")]
pub struct RequestError {
    pub kind: RequestErrorKind,
    /// HTTP status when the failure came from a response.
    pub status: Option<u16>,
    pub message: String,
}

impl RequestError {
    pub fn new(kind: RequestErrorKind, message: impl Into<String>) -> Self {
        Self { kind, status: None, message: message.into() }
    }

    /// Build an error from a failing HTTP response.
    ///
    /// With `friendly` set, the server's message is replaced by the fixed
    /// message for the classified kind.
    pub fn from_response(status: u16, server_message: &str, friendly: bool) -> Self {
        let kind = RequestErrorKind::from_status(status);
        let message = if friendly || server_message.trim().is_empty() {
            kind.friendly_message().to_string()
        } else {
            server_message.trim().to_string()
        };
        Self { kind, status: Some(status), message }
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(RequestErrorKind::InvalidArgument, message)
    }

    pub fn timed_out(message: impl Into<String>) -> Self {
        Self::new(RequestErrorKind::TimedOut, message)
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(RequestErrorKind::TransportUnavailable, message)
    }

    pub const fn is_transient(&self) -> bool {
        self.kind.is_transient()
    }
}

/// Main error type for lrsync
#[derive(Error, Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "message")]
pub enum LrsError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Request failed: {0}")]
    Request(RequestError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<RequestError> for LrsError {
    fn from(value: RequestError) -> Self {
        Self::Request(value)
    }
}

impl From<serde_json::Error> for LrsError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization(value.to_string())
    }
}

/// Result type alias for lrsync operations
pub type Result<T> = std::result::Result<T, LrsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_kinds_are_timeouts_and_transport() {
        assert!(RequestErrorKind::TimedOut.is_transient());
        assert!(RequestErrorKind::TransportUnavailable.is_transient());
        assert!(!RequestErrorKind::ServerError.is_transient());
        assert!(!RequestErrorKind::Conflict.is_transient());
        assert!(!RequestErrorKind::InvalidArgument.is_transient());
    }

    #[test]
    fn status_mapping() {
        assert_eq!(RequestErrorKind::from_status(400), RequestErrorKind::InvalidArgument);
        assert_eq!(RequestErrorKind::from_status(401), RequestErrorKind::Unauthorized);
        assert_eq!(RequestErrorKind::from_status(403), RequestErrorKind::Unauthorized);
        assert_eq!(RequestErrorKind::from_status(404), RequestErrorKind::NotFound);
        assert_eq!(RequestErrorKind::from_status(408), RequestErrorKind::TimedOut);
        assert_eq!(RequestErrorKind::from_status(409), RequestErrorKind::Conflict);
        assert_eq!(RequestErrorKind::from_status(412), RequestErrorKind::PreconditionFailed);
        assert_eq!(RequestErrorKind::from_status(418), RequestErrorKind::InvalidArgument);
        assert_eq!(RequestErrorKind::from_status(503), RequestErrorKind::ServerError);
    }

    #[test]
    fn response_errors_keep_server_message_unless_friendly() {
        let raw = RequestError::from_response(400, "  statement missing verb \n", false);
        assert_eq!(raw.message, "statement missing verb");
        assert_eq!(raw.status, Some(400));

        let nice = RequestError::from_response(400, "statement missing verb", true);
        assert_eq!(nice.message, RequestErrorKind::InvalidArgument.friendly_message());
    }

    #[test]
    fn empty_server_message_falls_back_to_friendly() {
        let err = RequestError::from_response(500, "", false);
        assert_eq!(err.kind, RequestErrorKind::ServerError);
        assert_eq!(err.message, "The server encountered an error.");
    }

    #[test]
    fn display_includes_kind() {
        let err = RequestError::timed_out("no response after 30s");
        assert_eq!(err.to_string(), "timed_out: no response after 30s");
    }
}

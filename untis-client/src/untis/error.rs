//! WebUntis client error types.

use crate::domain::TimetableQuery;

/// JSON-RPC error code the service answers a login with wrong credentials with.
pub const BAD_CREDENTIALS_CODE: i64 = -8504;

/// Errors from talking to WebUntis.
///
/// Errors are `Clone` so that every caller waiting on the same cached fetch
/// can receive the failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UntisError {
    /// Network failure or non-success HTTP status.
    #[error("{method}: transport error: {message}")]
    Transport {
        method: String,
        status: Option<u16>,
        message: String,
    },

    /// The response did not have the expected shape.
    #[error("{method}: unexpected response: {message}")]
    Protocol { method: String, message: String },

    /// The service reported an error object.
    #[error("{method}: remote error {code}: {message}")]
    Remote {
        method: String,
        code: i64,
        message: String,
    },

    /// A weekly timetable payload was not usable as a whole.
    #[error("invalid timetable data for {query}: {reason}")]
    InvalidTimetable {
        query: TimetableQuery,
        reason: String,
    },

    /// The operation needs a logged-in session.
    #[error("{method}: not logged in")]
    NotLoggedIn { method: String },

    /// The session the operation started in ended before it finished.
    #[error("{method}: session ended while the request was running")]
    SessionChanged { method: String },
}

impl UntisError {
    pub(crate) fn transport(method: &str, err: reqwest::Error) -> Self {
        UntisError::Transport {
            method: method.to_string(),
            status: err.status().map(|s| s.as_u16()),
            message: err.to_string(),
        }
    }

    pub(crate) fn protocol(method: &str, message: impl Into<String>) -> Self {
        UntisError::Protocol {
            method: method.to_string(),
            message: message.into(),
        }
    }

    /// Whether this is the service rejecting a login's credentials.
    pub fn is_bad_credentials(&self) -> bool {
        match self {
            UntisError::Remote { code, message, .. } => {
                *code == BAD_CREDENTIALS_CODE || message.contains("bad credentials")
            }
            _ => false,
        }
    }

    /// Name of the operation that failed, where one applies.
    pub fn method(&self) -> Option<&str> {
        match self {
            UntisError::Transport { method, .. }
            | UntisError::Protocol { method, .. }
            | UntisError::Remote { method, .. }
            | UntisError::NotLoggedIn { method }
            | UntisError::SessionChanged { method } => Some(method),
            UntisError::InvalidTimetable { .. } => None,
        }
    }
}

/// Session client error types.
///
/// Refresh failures are bucketed by these variants, not by message text:
/// `RefreshTooFrequent` and `NetworkFailure` are transient (the session
/// survives and a retry is rescheduled); everything else is fatal and ends
/// the session.

use std::error::Error as StdError;
use std::fmt;

/// A bearer token whose payload segment could not be read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeError(pub String);

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Token payload could not be decoded: {}", self.0)
    }
}

impl StdError for DecodeError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// No persisted token to work with.
    NoToken,
    /// A refresh was attempted within the minimum interval; no request was
    /// sent. Transient.
    RefreshTooFrequent,
    /// The request never produced a server verdict. Transient.
    NetworkFailure(String),
    /// The server rejected the token (invalid, expired, or revoked subject).
    /// Fatal: ends the session.
    Unauthorized(String),
    /// The server rejected the request for another reason; carries the
    /// server-provided message for display.
    Rejected { status: u16, message: String },
    /// The token payload could not be read.
    Decode(DecodeError),
}

impl SessionError {
    /// Transient failures keep the session alive and reschedule; fatal ones
    /// force a logout.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            SessionError::RefreshTooFrequent | SessionError::NetworkFailure(_)
        )
    }

    /// The message a login form should display.
    pub fn display_message(&self) -> String {
        match self {
            SessionError::Rejected { message, .. } => message.clone(),
            SessionError::Unauthorized(message) => message.clone(),
            SessionError::NetworkFailure(_) => "Could not reach the server".to_string(),
            _ => "Authentication failed".to_string(),
        }
    }
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::NoToken => write!(f, "No token available"),
            SessionError::RefreshTooFrequent => write!(f, "Refresh attempt too frequent"),
            SessionError::NetworkFailure(msg) => write!(f, "Network failure: {}", msg),
            SessionError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            SessionError::Rejected { status, message } => {
                write!(f, "Request rejected ({}): {}", status, message)
            }
            SessionError::Decode(e) => write!(f, "{}", e),
        }
    }
}

impl StdError for SessionError {}

impl From<DecodeError> for SessionError {
    fn from(err: DecodeError) -> Self {
        SessionError::Decode(err)
    }
}

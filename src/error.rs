//! Error types for spark notifications.

use thiserror::Error;

/// Failures while turning a credential reference into a bearer token.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CredentialError {
    /// No credential reference was configured, or the store has nothing under it
    #[error("No credentials found")]
    Missing,

    /// The credential exists but is not a bare secret
    #[error("Invalid credential type; only use 'Secret text' (token)")]
    InvalidType,

    /// The secret resolved to an empty string
    #[error("Token cannot be null")]
    EmptySecret,
}

/// A message that cannot be sent as built.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MessageError {
    #[error("Message cannot be null")]
    EmptyBody,

    #[error("Invalid spaceId; see help message")]
    EmptyTargetId,

    #[error("Unknown message type '{0}'; expected one of: text, markdown, html")]
    UnknownFormat(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown build result '{0}'; expected one of: SUCCESS, FAILURE, ABORTED, UNSTABLE")]
pub struct UnknownBuildResult(pub String);

/// Errors raised while delivering a single message.
///
/// A non-200 response is not an error here; the status is handed back to the
/// caller.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The server never produced a response (refused, reset, timed out)
    #[error("spark server did not provide a response: {0}")]
    Transport(#[source] reqwest::Error),

    /// The message could not be built
    #[error(transparent)]
    InvalidMessage(#[from] MessageError),

    /// Anything else that went wrong while sending
    #[error("{0}")]
    Unexpected(String),
}

impl From<reqwest::Error> for DispatchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_connect() || err.is_timeout() || err.is_request() {
            Self::Transport(err)
        } else {
            Self::Unexpected(err.to_string())
        }
    }
}

/// The notification step itself failed.
///
/// Only produced when the caller opted into failing on the first
/// notification error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StepFailure {
    #[error("{0}")]
    Aborted(String),
}

use std::fmt;

/// Why an encoded session token was rejected.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InvalidReason {
    /// The cookie value is not valid percent-encoding.
    Escape,
    /// The payload does not split into exactly `<id>.<signature>`.
    Structure,
    /// The identifier segment is not valid base64 or not UTF-8.
    Encoding,
    /// The signature does not match the identifier.
    Signature,
}

impl InvalidReason {
    /// Whether the token itself was readable and only failed verification.
    ///
    /// The manager treats these as "no session" instead of an error.
    pub const fn is_recoverable(self) -> bool {
        matches!(self, Self::Structure | Self::Signature)
    }
}

impl fmt::Display for InvalidReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Escape => "bad percent-encoding",
            Self::Structure => "expected two dot-separated parts",
            Self::Encoding => "identifier is not valid base64 text",
            Self::Signature => "signature mismatch",
        };
        f.write_str(text)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("invalid session id: {0}")]
    InvalidIdentifier(InvalidReason),
    #[error("session backend failure: {0}")]
    Backend(String),
    #[error("session payload serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("invalid session configuration: {0}")]
    Config(String),
    #[error("session backend is closed")]
    Closed,
}

impl SessionError {
    /// Returns the rejection reason when this is an identifier error.
    pub fn invalid_reason(&self) -> Option<InvalidReason> {
        match self {
            Self::InvalidIdentifier(reason) => Some(*reason),
            _ => None,
        }
    }
}

pub type SessionResult<T> = Result<T, SessionError>;

pub(crate) fn config_error(message: impl Into<String>) -> SessionError {
    SessionError::Config(message.into())
}

#[cfg(feature = "redis")]
pub(crate) fn redis_error(err: redis::RedisError) -> SessionError {
    SessionError::Backend(err.to_string())
}

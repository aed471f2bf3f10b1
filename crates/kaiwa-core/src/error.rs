//! Error taxonomy for the client engine.
//!
//! Every failure the engine can surface maps to one of these variants. Each
//! variant has a stable machine-readable kind string so callers can render
//! `{kind, message}` pairs however they like — the engine never formats
//! user-facing copy.

use thiserror::Error;

/// Errors surfaced by the chat client engine.
///
/// The engine resolves `Unauthenticated` locally exactly once (refresh and
/// retry); every other variant propagates to the caller untouched. Retrying
/// a failed page fetch or send is a caller decision — idempotency keys make
/// such retries safe.
#[derive(Debug, Error)]
pub enum Error {
    /// No credentials, invalid credentials, or an expired session that a
    /// refresh did not recover.
    #[error("not authenticated")]
    Unauthenticated,

    /// The server rejected a pagination cursor as malformed or expired.
    /// Never silently remapped to a first-page fetch.
    #[error("invalid pagination cursor")]
    InvalidCursor,

    /// Transport-level failure before any response arrived.
    #[error("network error: {0}")]
    Network(String),

    /// Non-2xx response with a body, or a 2xx body that failed to decode.
    #[error("server error ({status}): {message}")]
    Server { status: u16, message: String },

    /// An explicit `error` frame or a mid-stream transport break.
    #[error("stream error: {0}")]
    Stream(String),

    /// Caller-initiated abort. Not a failure.
    #[error("cancelled")]
    Cancelled,

    /// Configuration or credential-file problem (missing home dir, bad TOML,
    /// unwritable credentials file).
    #[error("config error: {0}")]
    Config(String),
}

impl Error {
    /// Stable kind string for this error.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Unauthenticated => "unauthenticated",
            Error::InvalidCursor => "invalid_cursor",
            Error::Network(_) => "network",
            Error::Server { .. } => "server",
            Error::Stream(_) => "stream",
            Error::Cancelled => "cancelled",
            Error::Config(_) => "config",
        }
    }

    /// Build a `Network` error from any displayable cause.
    pub fn network(cause: impl std::fmt::Display) -> Self {
        Error::Network(cause.to_string())
    }

    /// Build a `Stream` error from any displayable cause.
    pub fn stream(cause: impl std::fmt::Display) -> Self {
        Error::Stream(cause.to_string())
    }

    /// Build a `Config` error from any displayable cause.
    pub fn config(cause: impl std::fmt::Display) -> Self {
        Error::Config(cause.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_strings_are_stable() {
        assert_eq!(Error::Unauthenticated.kind(), "unauthenticated");
        assert_eq!(Error::InvalidCursor.kind(), "invalid_cursor");
        assert_eq!(Error::network("refused").kind(), "network");
        assert_eq!(
            Error::Server {
                status: 500,
                message: "boom".into()
            }
            .kind(),
            "server"
        );
        assert_eq!(Error::stream("eof").kind(), "stream");
        assert_eq!(Error::Cancelled.kind(), "cancelled");
    }

    #[test]
    fn test_display_includes_detail() {
        let err = Error::Server {
            status: 502,
            message: "bad gateway".into(),
        };
        assert_eq!(err.to_string(), "server error (502): bad gateway");
    }
}

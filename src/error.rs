//! Error types

/// Result type for session operations
pub type SessionResult<T> = Result<T, SessionError>;

/// Errors that can happen while configuring or handling sessions
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The manager or provider configuration is malformed. Raised while building
    /// the [`SessionManager`](crate::SessionManager), and fatal at startup.
    #[error("Invalid session configuration: {0}")]
    Config(String),
    /// No provider was registered under the requested name
    #[error("Unknown session provider {0:?}")]
    UnknownProvider(String),
    /// The operating system's random source couldn't supply enough bytes
    /// for a new session ID
    #[error("Could not read from the system CSPRNG: {0}")]
    Generation(Box<dyn std::error::Error + Send + Sync>),
    /// The session was destroyed earlier in the request
    #[error("No active session")]
    NoSession,
    /// The session ID isn't usable by the provider (e.g. not a hex string)
    #[error("Invalid session ID")]
    InvalidId,
    /// An encoded cookie session failed its integrity check
    #[error("Session cookie failed authentication")]
    Authentication,
    /// An encoded cookie session is older than the allowed max age
    #[error("Session cookie expired")]
    Expired,
    /// Error serializing or deserializing the session data
    #[error("Failed to serialize/deserialize session: {0}")]
    Serialization(#[from] serde_json::Error),
    /// I/O error from a file-backed provider
    #[error("Session I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// A generic error from the storage backend. This error type can be
    /// used when implementing a custom session provider.
    #[error("Storage backend error: {0}")]
    Backend(Box<dyn std::error::Error + Send + Sync>),

    #[cfg(feature = "redis_fred")]
    #[error("fred.rs client error: {0}")]
    RedisFredError(#[from] fred::error::Error),
}

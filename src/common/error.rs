//! Error types for the codec engine

use thiserror::Error;

/// Engine error type
///
/// Every dialect parser returns one of these instead of panicking; the
/// ingestion pipeline counts them by [`Error::kind`] and moves on.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("malformed scheme: {0}")]
    MalformedScheme(String),

    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),

    #[error("invalid server or port: {0}")]
    InvalidServerOrPort(String),

    #[error("invalid credential format: {0}")]
    InvalidCredential(String),

    #[error("missing required security field: {0}")]
    MissingSecurityField(String),

    #[error("decode failure: {0}")]
    Decode(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    pub fn malformed_scheme<S: Into<String>>(msg: S) -> Self {
        Error::MalformedScheme(msg.into())
    }

    pub fn unsupported_scheme<S: Into<String>>(msg: S) -> Self {
        Error::UnsupportedScheme(msg.into())
    }

    pub fn server_port<S: Into<String>>(msg: S) -> Self {
        Error::InvalidServerOrPort(msg.into())
    }

    pub fn credential<S: Into<String>>(msg: S) -> Self {
        Error::InvalidCredential(msg.into())
    }

    pub fn security<S: Into<String>>(msg: S) -> Self {
        Error::MissingSecurityField(msg.into())
    }

    pub fn decode<S: Into<String>>(msg: S) -> Self {
        Error::Decode(msg.into())
    }

    pub fn config<S: Into<String>>(msg: S) -> Self {
        Error::Config(msg.into())
    }

    /// Stable failure-kind label, used for ingestion statistics
    pub fn kind(&self) -> &'static str {
        match self {
            Error::MalformedScheme(_) => "malformed-scheme",
            Error::UnsupportedScheme(_) => "unsupported-scheme",
            Error::InvalidServerOrPort(_) => "invalid-server-or-port",
            Error::InvalidCredential(_) => "invalid-credential",
            Error::MissingSecurityField(_) => "missing-security-field",
            Error::Decode(_) => "decode-failure",
            Error::Config(_) => "config-error",
        }
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(e: serde_yaml::Error) -> Self {
        Error::Config(e.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Decode(e.to_string())
    }
}

/// Result type alias using our Error
pub type Result<T> = std::result::Result<T, Error>;

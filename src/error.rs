//! Error types for the lineage client
//!
//! Construction problems (bad URL, unknown transport) and delivery problems
//! (network failure, non-success status) are surfaced as [`Error`]. Problems
//! loading the optional configuration file are never surfaced; see
//! [`crate::config::Config::load`].

/// Result alias used throughout the library
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The value handed to emit is not a run event
    #[error("emit only accepts run events: {0}")]
    Usage(String),

    #[error("invalid url '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("transport section has no 'type'")]
    MissingTransportType,

    #[error("unknown transport type '{0}'")]
    UnknownTransport(String),

    #[error("invalid '{kind}' transport config: {reason}")]
    TransportConfig { kind: String, reason: String },

    #[error("invalid '{kind}' filter: {reason}")]
    InvalidFilter { kind: String, reason: String },

    /// The destination answered with a non-success status
    #[error("lineage endpoint {url} returned HTTP {status}: {body}")]
    Delivery { url: String, status: u16, body: String },

    /// The request never completed (DNS, connect, TLS, timeout)
    #[error("failed to reach lineage endpoint {url}: {reason}")]
    Network { url: String, reason: String },

    #[error("failed to serialize event: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// True for errors raised while building a client or transport
    pub fn is_construction(&self) -> bool {
        matches!(
            self,
            Error::InvalidUrl { .. }
                | Error::MissingTransportType
                | Error::UnknownTransport(_)
                | Error::TransportConfig { .. }
                | Error::InvalidFilter { .. }
        )
    }

    /// True for errors raised while delivering an event
    pub fn is_delivery(&self) -> bool {
        matches!(self, Error::Delivery { .. } | Error::Network { .. })
    }
}

use thiserror::Error;

/// Result type alias for broker operations
pub type Result<T, E = BrokerError> = std::result::Result<T, E>;

/// Failure kinds surfaced by validation and synthesis.
///
/// Every outbound call classifies its own failure into the most specific
/// applicable kind; callers branch on the variant and never parse messages.
#[derive(Error, Debug)]
pub enum BrokerError {
    #[error("platform url parameter is mandatory")]
    MissingInput,

    #[error("invalid platform url: {0}")]
    MalformedUrl(String),

    #[error("could not reach instance: {0}")]
    UnreachableInstance(String),

    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("not a valid PeerTube instance: {0}")]
    InvalidInstanceResponse(String),

    #[error("upstream template unavailable: {0}")]
    UpstreamUnavailable(String),
}

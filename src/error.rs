//! Error types for the OAuth redirect gateway.

use thiserror::Error;

/// Result type alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type.
///
/// Variants map directly onto the dispositions in the error-handling
/// design: each one knows enough to pick an HTTP status and body
/// without the caller re-deriving strings.
#[derive(Error, Debug)]
pub enum Error {
    /// `state` query parameter was not valid base64.
    #[error("State not base64 encoded: {0}")]
    StateNotBase64(String),

    /// Decoded `state` bytes did not parse as a `RedirectEnvelope`.
    #[error("Malformed state: {0}")]
    MalformedState(String),

    /// `redirectBackUri` in the envelope did not parse as a URL.
    #[error("Can't parse redirectBackUri: {0}")]
    BadRedirectBackUri(String),

    /// `redirectUri` or `tokenUri` in the envelope did not parse as a URL.
    #[error("Can't parse redirectUri or tokenUri")]
    BadProviderUri,

    /// No tenant registered for `(clientId, tokenUri)`.
    #[error("Unknown (clientId, tokenUri): ({client_id}, {token_uri})")]
    UnknownTenant {
        /// The client id looked up.
        client_id: String,
        /// The token endpoint looked up.
        token_uri: String,
    },

    /// `redirectBackUri` host is not in the tenant's allow-list.
    #[error("Unknown redirectBack host: {0}")]
    UnknownBackHost(String),

    /// `redirectBackUri` scheme violates the tenant's SSL policy.
    #[error("https protocol required for redirect host: {0}")]
    SchemeRequired(String),

    /// Request was missing the query parameters needed to classify it.
    #[error("Bad request, missing code/state")]
    BadRequest,

    /// Configuration document failed to decode.
    #[error("Config decode error: {0}")]
    ConfigDecode(String),

    /// Configuration file could not be read.
    #[error("Config read error: {0}")]
    ConfigRead(#[from] std::io::Error),

    /// The listener failed to bind to the requested port.
    #[error("Bind error on port {port}: {source}")]
    Bind {
        /// The port that failed to bind.
        port: u16,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// The outcome of a provider token POST, expressed as the `err` value
/// that must show up in the fragment-encoded `ResponseTokenError`.
///
/// These never surface as an HTTP status on this server — they are
/// always folded into a 302 redirect. The `Display` impl is only ever
/// written into the fragment payload, never logged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderFailure {
    /// The outbound POST exceeded its deadline.
    Timeout,
    /// The outbound POST failed at the transport layer (DNS, connect, TLS).
    NetworkError,
    /// `tokenUri` was not a valid URL to dispatch to.
    BadUrl(String),
    /// The provider responded with a non-2xx status and no parseable error body.
    BadStatus(u16),
    /// The provider's JSON body could not be decoded.
    DecoderError(String),
}

impl std::fmt::Display for ProviderFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Timeout => write!(f, "Timeout"),
            Self::NetworkError => write!(f, "NetworkError"),
            Self::BadUrl(u) => write!(f, "BadUrl: {u}"),
            Self::BadStatus(code) => write!(f, "BadStatus, code: {code}"),
            Self::DecoderError(e) => write!(f, "Decoder error: {e}"),
        }
    }
}

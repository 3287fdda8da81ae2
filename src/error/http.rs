use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// Stage of an exchange that ran out of time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutPhase {
    Connect,
    Write,
    Read,
    Request,
}

impl fmt::Display for TimeoutPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let phase = match self {
            TimeoutPhase::Connect => "connect",
            TimeoutPhase::Write => "write",
            TimeoutPhase::Read => "read",
            TimeoutPhase::Request => "request",
        };
        f.write_str(phase)
    }
}

/// Reasons a single dispatch produced no response.
///
/// Every variant is counted as a failed request; the request loop never
/// stops because of one.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Invalid method '{method}': {source}")]
    InvalidMethod {
        method: String,
        #[source]
        source: http::method::InvalidMethod,
    },
    #[error("Invalid URL '{url}': {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("Unsupported URL scheme '{scheme}'")]
    UnsupportedScheme { scheme: String },
    #[error("URL '{url}' has no host")]
    MissingHost { url: String },
    #[error("Request target '{target}' contains whitespace or control bytes")]
    InvalidTarget { target: String },
    #[error("Invalid header name '{name}': {source}")]
    InvalidHeaderName {
        name: String,
        #[source]
        source: http::header::InvalidHeaderName,
    },
    #[error("Invalid value for header '{name}': {source}")]
    InvalidHeaderValue {
        name: String,
        #[source]
        source: http::header::InvalidHeaderValue,
    },
    #[error("Failed to resolve '{host}': {source}")]
    Resolve {
        host: String,
        #[source]
        source: std::io::Error,
    },
    #[error("No addresses found for '{host}'")]
    NoAddresses { host: String },
    #[error("Failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Proxy {proxy} refused the tunnel with status {status}")]
    ProxyRejected { proxy: String, status: u16 },
    #[error("TLS handshake with '{host}' failed: {source}")]
    Tls {
        host: String,
        #[source]
        source: tokio_native_tls::native_tls::Error,
    },
    #[error("TLS is unavailable for this client")]
    TlsUnavailable,
    #[error("Dial limiter closed: {source}")]
    DialerClosed {
        #[source]
        source: tokio::sync::AcquireError,
    },
    #[error("Connection I/O failed: {source}")]
    Io {
        #[source]
        source: std::io::Error,
    },
    #[error("Connection closed before the response completed")]
    ConnectionClosed,
    #[error("Malformed response: {reason}")]
    MalformedResponse { reason: String },
    #[error("{phase} timed out after {after:?}")]
    Timeout { phase: TimeoutPhase, after: Duration },
}

impl DispatchError {
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, DispatchError::Timeout { .. })
    }

    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        DispatchError::MalformedResponse {
            reason: reason.into(),
        }
    }
}

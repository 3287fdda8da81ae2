use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::warn;

use crate::config::ClientConfig;
use crate::entropy::Entropy;

use super::dial::Dialer;
use super::dns::CachingResolver;
use super::pool::ConnectionPool;
use super::proxy::ProxySelector;
use super::tls::{TlsPolicy, build_tls_connector};

/// Overall request timeout when `client.timeout` is unset.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(90);
/// Idle pooled connections kept per origin when unset.
pub const DEFAULT_MAX_IDLE_CONNECTIONS: usize = 1000;
/// How long a successful DNS lookup is reused.
pub const DNS_CACHE_DURATION: Duration = Duration::from_secs(3600);
/// Ceiling on concurrent dials per client.
pub const DIAL_CONCURRENCY: usize = 4096;

/// Effective client settings after defaults are applied.
///
/// `timeout` caps a whole exchange and the lifetime of a pooled
/// connection. `write_timeout` bounds dialing (proxy tunnel and TLS
/// handshake included) and writing the request. `read_timeout` bounds
/// reading the full response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSettings {
    pub timeout: Duration,
    pub read_timeout: Duration,
    pub write_timeout: Duration,
    pub idle_timeout: Duration,
    pub max_idle_connections: usize,
    pub tls: TlsPolicy,
    pub proxy_urls: String,
}

impl ClientSettings {
    /// Decodes a job's raw `client` value. Malformed keys fall back to
    /// their defaults and are reported only when `debug` is set.
    #[must_use]
    pub fn resolve(raw: &Value, debug: bool) -> Self {
        let decoded = ClientConfig::decode(raw);
        if debug {
            for err in &decoded.errors {
                warn!("Failed to parse job client, ignoring: {}", err);
            }
        }
        Self::from_config(decoded.config)
    }

    #[must_use]
    pub fn from_config(config: ClientConfig) -> Self {
        let timeout = config.timeout.unwrap_or(DEFAULT_TIMEOUT);
        Self {
            timeout,
            read_timeout: config.read_timeout.unwrap_or(timeout),
            write_timeout: config.write_timeout.unwrap_or(timeout),
            idle_timeout: config.idle_timeout.unwrap_or(timeout),
            max_idle_connections: config
                .max_idle_connections
                .unwrap_or(DEFAULT_MAX_IDLE_CONNECTIONS),
            tls: TlsPolicy::from_config(config.tls_config),
            proxy_urls: config.proxy_urls,
        }
    }
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self::from_config(ClientConfig::default())
    }
}

/// HTTP/1.1 client owned by one job instance.
///
/// Holds the dialer (proxy choice, DNS cache, TLS) and the idle connection
/// pool reused across the job's iterations.
pub struct JobClient {
    pub(super) dialer: Dialer,
    pub(super) pool: ConnectionPool,
    settings: Arc<ClientSettings>,
    proxies: Arc<ProxySelector>,
}

impl fmt::Debug for JobClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobClient")
            .field("settings", &self.settings)
            .field("dialer", &self.dialer)
            .finish_non_exhaustive()
    }
}

impl JobClient {
    #[must_use]
    pub fn settings(&self) -> &ClientSettings {
        &self.settings
    }

    #[must_use]
    pub fn proxies(&self) -> &ProxySelector {
        &self.proxies
    }
}

/// Builds the client for one job. Never fails: unusable settings fall back
/// to defaults and are reported only when `debug` is set.
#[must_use]
pub fn build_client(raw: &Value, debug: bool, entropy: Arc<Entropy>) -> JobClient {
    let settings = ClientSettings::resolve(raw, debug);
    let proxies = Arc::new(ProxySelector::from_template(
        &settings.proxy_urls,
        entropy,
        debug,
    ));
    let dialer = Dialer::new(
        CachingResolver::new(DNS_CACHE_DURATION),
        build_tls_connector(&settings.tls, debug),
        Arc::clone(&proxies),
        DIAL_CONCURRENCY,
        settings.write_timeout,
        debug,
    );
    let pool = ConnectionPool::new(
        settings.max_idle_connections,
        settings.idle_timeout,
        settings.timeout,
    );
    JobClient {
        dialer,
        pool,
        settings: Arc::new(settings),
        proxies,
    }
}

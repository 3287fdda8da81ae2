//! Opens new connections. The route (direct or through a proxy) is picked
//! once per dial, so every request on a connection shares its proxy.
use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::Semaphore;
use tokio_native_tls::TlsConnector;
use tracing::debug;
use url::{Host, Url};

use crate::error::{DispatchError, TimeoutPhase};

use super::dns::CachingResolver;
use super::pool::{Connection, Io};
use super::proxy::{DialStrategy, ProxySelector};
use super::wire::{Origin, Scheme, read_tunnel_reply};

/// Port assumed for a proxy URL without one.
const DEFAULT_PROXY_PORT: u16 = 80;

pub(crate) struct Dialer {
    resolver: CachingResolver,
    tls: Option<TlsConnector>,
    proxies: Arc<ProxySelector>,
    permits: Semaphore,
    connect_timeout: Duration,
    debug: bool,
}

impl fmt::Debug for Dialer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dialer")
            .field("proxies", &self.proxies.len())
            .field("tls", &self.tls.is_some())
            .field("connect_timeout", &self.connect_timeout)
            .finish_non_exhaustive()
    }
}

impl Dialer {
    pub(crate) fn new(
        resolver: CachingResolver,
        tls: Option<TlsConnector>,
        proxies: Arc<ProxySelector>,
        concurrency: usize,
        connect_timeout: Duration,
        debug: bool,
    ) -> Self {
        Self {
            resolver,
            tls,
            proxies,
            permits: Semaphore::new(concurrency),
            connect_timeout,
            debug,
        }
    }

    /// Opens a connection to `origin`, including the proxy tunnel and TLS
    /// handshake, within the connect timeout.
    pub(crate) async fn dial(&self, origin: &Origin) -> Result<Connection, DispatchError> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|source| DispatchError::DialerClosed { source })?;
        let strategy = DialStrategy::choose(&self.proxies);
        if self.debug {
            match &strategy {
                DialStrategy::Direct => debug!("Dialing {} directly", origin.authority()),
                DialStrategy::Tunnel(proxy) => debug!(
                    "Dialing {} through proxy {}",
                    origin.authority(),
                    proxy_authority(proxy).unwrap_or_default()
                ),
            }
        }
        tokio::time::timeout(self.connect_timeout, self.establish(origin, &strategy))
            .await
            .map_err(|_elapsed| DispatchError::Timeout {
                phase: TimeoutPhase::Connect,
                after: self.connect_timeout,
            })?
    }

    async fn establish(
        &self,
        origin: &Origin,
        strategy: &DialStrategy,
    ) -> Result<Connection, DispatchError> {
        let stream = match strategy {
            DialStrategy::Direct => self.connect_tcp(&origin.host, origin.port).await?,
            DialStrategy::Tunnel(proxy) => self.open_tunnel(proxy, origin).await?,
        };
        let io: Box<dyn Io> = match origin.scheme {
            Scheme::Http => Box::new(stream),
            Scheme::Https => {
                let Some(connector) = &self.tls else {
                    return Err(DispatchError::TlsUnavailable);
                };
                let tls = connector
                    .connect(&origin.host, stream)
                    .await
                    .map_err(|source| DispatchError::Tls {
                        host: origin.host.clone(),
                        source,
                    })?;
                Box::new(tls)
            }
        };
        Ok(Connection::new(io))
    }

    async fn connect_tcp(&self, host: &str, port: u16) -> Result<TcpStream, DispatchError> {
        let ips = self
            .resolver
            .lookup(host)
            .await
            .map_err(|source| DispatchError::Resolve {
                host: host.to_owned(),
                source,
            })?;
        let mut last_error = None;
        for ip in ips {
            let addr = SocketAddr::new(ip, port);
            match TcpStream::connect(addr).await {
                Ok(stream) => return Ok(stream),
                Err(source) => last_error = Some((addr, source)),
            }
        }
        Err(last_error.map_or_else(
            || DispatchError::NoAddresses {
                host: host.to_owned(),
            },
            |(addr, source)| DispatchError::Connect {
                addr: addr.to_string(),
                source,
            },
        ))
    }

    /// Connects to `proxy` and asks it to CONNECT to `origin`. Credentials
    /// in the proxy URL are sent to that proxy only.
    async fn open_tunnel(&self, proxy: &Url, origin: &Origin) -> Result<TcpStream, DispatchError> {
        let (proxy_host, proxy_port) = proxy_address(proxy).ok_or_else(|| {
            DispatchError::MissingHost {
                url: proxy.as_str().to_owned(),
            }
        })?;
        let mut stream = self.connect_tcp(&proxy_host, proxy_port).await?;
        stream
            .write_all(&connect_request(origin, proxy))
            .await
            .map_err(|source| DispatchError::Io { source })?;

        let mut reader = BufReader::new(stream);
        let status = read_tunnel_reply(&mut reader).await?;
        if !(200..300).contains(&status) {
            return Err(DispatchError::ProxyRejected {
                proxy: proxy_authority(proxy).unwrap_or_default(),
                status,
            });
        }
        if !reader.buffer().is_empty() {
            return Err(DispatchError::malformed("proxy sent data before the tunnel opened"));
        }
        Ok(reader.into_inner())
    }
}

fn proxy_address(proxy: &Url) -> Option<(String, u16)> {
    let host = match proxy.host()? {
        Host::Domain(domain) => domain.to_owned(),
        Host::Ipv4(ip) => ip.to_string(),
        Host::Ipv6(ip) => ip.to_string(),
    };
    Some((host, proxy.port_or_known_default().unwrap_or(DEFAULT_PROXY_PORT)))
}

fn proxy_authority(proxy: &Url) -> Option<String> {
    let (host, port) = proxy_address(proxy)?;
    Some(if host.contains(':') {
        format!("[{}]:{}", host, port)
    } else {
        format!("{}:{}", host, port)
    })
}

/// `CONNECT` request for `origin`, with Basic credentials when the proxy
/// URL carries user info.
pub(crate) fn connect_request(origin: &Origin, proxy: &Url) -> Vec<u8> {
    let authority = origin.authority();
    let mut request = String::from("CONNECT ");
    request.push_str(&authority);
    request.push_str(" HTTP/1.1\r\nHost: ");
    request.push_str(&authority);
    request.push_str("\r\n");
    if !proxy.username().is_empty() || proxy.password().is_some() {
        let credentials = BASE64_STANDARD.encode(format!(
            "{}:{}",
            proxy.username(),
            proxy.password().unwrap_or_default()
        ));
        request.push_str("Proxy-Authorization: Basic ");
        request.push_str(&credentials);
        request.push_str("\r\n");
    }
    request.push_str("\r\n");
    request.into_bytes()
}

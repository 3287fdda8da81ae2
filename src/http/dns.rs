use std::collections::HashMap;
use std::io;
use std::net::IpAddr;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
struct CachedAddrs {
    addrs: Vec<IpAddr>,
    resolved_at: Instant,
}

/// Resolver that remembers successful lookups for `ttl`.
///
/// Failed lookups are not cached.
#[derive(Debug, Clone)]
pub(crate) struct CachingResolver {
    ttl: Duration,
    cache: Arc<Mutex<HashMap<String, CachedAddrs>>>,
}

impl CachingResolver {
    pub(crate) fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            cache: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub(crate) fn cached(&self, host: &str) -> Option<Vec<IpAddr>> {
        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        let entry = cache.get(host)?;
        if entry.resolved_at.elapsed() < self.ttl {
            return Some(entry.addrs.clone());
        }
        cache.remove(host);
        None
    }

    /// Addresses for `host`. IP literals are returned without a lookup.
    pub(crate) async fn lookup(&self, host: &str) -> io::Result<Vec<IpAddr>> {
        if let Ok(ip) = host.parse::<IpAddr>() {
            return Ok(vec![ip]);
        }
        if let Some(addrs) = self.cached(host) {
            return Ok(addrs);
        }
        let addrs: Vec<IpAddr> = tokio::net::lookup_host((host, 0))
            .await?
            .map(|addr| addr.ip())
            .collect();
        if !addrs.is_empty() {
            let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
            cache.insert(
                host.to_owned(),
                CachedAddrs {
                    addrs: addrs.clone(),
                    resolved_at: Instant::now(),
                },
            );
        }
        Ok(addrs)
    }
}

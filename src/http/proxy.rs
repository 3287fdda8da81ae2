//! Per-connection proxy selection.
//!
//! A job's `proxy_urls` is a template that renders, once at client build
//! time, to a JSON array of proxy URLs. Every new connection draws one entry
//! uniformly at random and tunnels through it with CONNECT; pooled
//! connections keep the route they were dialed with.
use std::sync::Arc;

use url::Url;
use tracing::warn;

use crate::entropy::Entropy;
use crate::template::Template;

#[derive(Debug)]
pub struct ProxySelector {
    urls: Vec<String>,
    entropy: Arc<Entropy>,
}

impl ProxySelector {
    #[must_use]
    pub const fn new(urls: Vec<String>, entropy: Arc<Entropy>) -> Self {
        Self { urls, entropy }
    }

    /// Renders `source` and decodes it as a JSON array of strings.
    ///
    /// An empty source, a template error or a decode error all yield an
    /// empty selector, which always dials directly.
    #[must_use]
    pub fn from_template(source: &str, entropy: Arc<Entropy>, debug: bool) -> Self {
        if source.trim().is_empty() {
            return Self::new(Vec::new(), entropy);
        }
        let rendered = match Template::parse(source) {
            Ok(template) => template.render(None),
            Err(err) => {
                if debug {
                    warn!("Failed to parse proxy_urls template {:?}: {}", source, err);
                }
                String::new()
            }
        };
        let urls = match serde_json::from_str::<Vec<String>>(&rendered) {
            Ok(urls) => urls,
            Err(err) => {
                if debug {
                    warn!("Ignoring proxy list {:?}: {}", rendered, err);
                }
                Vec::new()
            }
        };
        Self::new(urls, entropy)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.urls.len()
    }

    /// One uniform pick, `None` when the list is empty.
    #[must_use]
    pub fn select(&self) -> Option<&str> {
        self.entropy.choose(&self.urls).map(String::as_str)
    }
}

/// How a new connection reaches its target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DialStrategy {
    Direct,
    Tunnel(Url),
}

impl DialStrategy {
    /// Picks a route for the next dial. Picks that do not parse as a URL
    /// with a host dial directly.
    #[must_use]
    pub fn choose(selector: &ProxySelector) -> Self {
        selector
            .select()
            .and_then(|raw| Url::parse(raw).ok())
            .filter(Url::has_host)
            .map_or(DialStrategy::Direct, DialStrategy::Tunnel)
    }

    #[must_use]
    pub fn into_proxy_url(self) -> Option<Url> {
        match self {
            DialStrategy::Direct => None,
            DialStrategy::Tunnel(url) => Some(url),
        }
    }
}

//! HTTP traffic jobs: client construction, request rendering and the
//! per-job request loop.
mod client;
mod dial;
mod dns;
mod job;
mod pool;
mod proxy;
mod request;
mod tls;
mod transport;
mod wire;


pub use client::{
    ClientSettings, DEFAULT_MAX_IDLE_CONNECTIONS, DEFAULT_TIMEOUT, DIAL_CONCURRENCY,
    DNS_CACHE_DURATION, JobClient, build_client,
};
pub use job::{
    HEARTBEAT_INTERVAL, HttpJob, JobEnv, LoopContext, run_http_job, run_request_loop,
};
pub use proxy::{DialStrategy, ProxySelector};
pub use request::{CompiledTemplateSet, RenderedRequest};
pub use tls::TlsPolicy;
pub use transport::Transport;

//! Idle connection reuse for one job client.
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use futures_util::FutureExt;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, BufReader};

use super::wire::Origin;

/// Byte stream a request travels over: plain TCP, a proxy tunnel or TLS.
pub(crate) trait Io: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T> Io for T where T: AsyncRead + AsyncWrite + Send + Unpin {}

/// An open connection plus when it was established.
pub(crate) struct Connection {
    io: BufReader<Box<dyn Io>>,
    established: Instant,
}

impl Connection {
    pub(crate) fn new(io: Box<dyn Io>) -> Self {
        Self {
            io: BufReader::new(io),
            established: Instant::now(),
        }
    }

    pub(crate) const fn io_mut(&mut self) -> &mut BufReader<Box<dyn Io>> {
        &mut self.io
    }

    pub(crate) fn age(&self) -> Duration {
        self.established.elapsed()
    }

    /// False once the peer has closed the connection or sent bytes nobody
    /// asked for. Never waits.
    pub(crate) fn is_open(&mut self) -> bool {
        self.io.fill_buf().now_or_never().is_none()
    }
}

struct IdleConnection {
    connection: Connection,
    idle_since: Instant,
}

/// Idle connections keyed by origin.
///
/// At most `max_idle_per_host` connections are kept per origin. A
/// connection idle for `idle_timeout` or older than `max_lifetime` is
/// closed instead of reused.
pub(crate) struct ConnectionPool {
    idle: Mutex<HashMap<Origin, Vec<IdleConnection>>>,
    max_idle_per_host: usize,
    idle_timeout: Duration,
    max_lifetime: Duration,
}

impl ConnectionPool {
    pub(crate) fn new(
        max_idle_per_host: usize,
        idle_timeout: Duration,
        max_lifetime: Duration,
    ) -> Self {
        Self {
            idle: Mutex::new(HashMap::new()),
            max_idle_per_host,
            idle_timeout,
            max_lifetime,
        }
    }

    /// Most recently returned live connection for `origin`, if any.
    pub(crate) fn checkout(&self, origin: &Origin) -> Option<Connection> {
        let mut idle = self.idle.lock().unwrap_or_else(PoisonError::into_inner);
        let entries = idle.get_mut(origin)?;
        while let Some(entry) = entries.pop() {
            if !self.is_fresh(&entry) {
                continue;
            }
            let mut connection = entry.connection;
            if connection.is_open() {
                return Some(connection);
            }
        }
        None
    }

    /// Parks `connection` for reuse. Returns false when it was closed
    /// instead.
    pub(crate) fn checkin(&self, origin: Origin, connection: Connection) -> bool {
        if self.max_idle_per_host == 0 || connection.age() >= self.max_lifetime {
            return false;
        }
        let mut idle = self.idle.lock().unwrap_or_else(PoisonError::into_inner);
        let entries = idle.entry(origin).or_default();
        entries.retain(|entry| self.is_fresh(entry));
        if entries.len() >= self.max_idle_per_host {
            return false;
        }
        entries.push(IdleConnection {
            connection,
            idle_since: Instant::now(),
        });
        true
    }

    #[cfg(test)]
    pub(crate) fn idle_count(&self, origin: &Origin) -> usize {
        self.idle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(origin)
            .map_or(0, Vec::len)
    }

    fn is_fresh(&self, entry: &IdleConnection) -> bool {
        entry.idle_since.elapsed() < self.idle_timeout
            && entry.connection.age() < self.max_lifetime
    }
}

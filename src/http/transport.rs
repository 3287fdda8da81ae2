use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;

use crate::error::{DispatchError, TimeoutPhase};

use super::client::JobClient;
use super::request::RenderedRequest;
use super::wire::{WireRequest, encode_request, read_response};

/// Sends one rendered request and reports the response status.
///
/// Any response counts, whatever its status. `Err` means no response was
/// obtained.
#[async_trait]
pub trait Transport: Send + Sync {
    /// # Errors
    ///
    /// Returns an error when the request cannot be encoded or no response
    /// arrives.
    async fn dispatch(&self, request: &RenderedRequest) -> Result<u16, DispatchError>;
}

#[async_trait]
impl Transport for JobClient {
    async fn dispatch(&self, request: &RenderedRequest) -> Result<u16, DispatchError> {
        let wire = encode_request(request)?;
        let timeout = self.settings().timeout;
        within(timeout, TimeoutPhase::Request, self.exchange(&wire)).await
    }
}

impl JobClient {
    /// Writes the request on a pooled or freshly dialed connection and
    /// drains the response. The connection goes back to the pool only when
    /// the response was fully framed and the server kept it open.
    async fn exchange(&self, wire: &WireRequest) -> Result<u16, DispatchError> {
        let mut connection = match self.pool.checkout(&wire.origin) {
            Some(connection) => connection,
            None => self.dialer.dial(&wire.origin).await?,
        };
        let settings = self.settings();

        let io = connection.io_mut();
        within(settings.write_timeout, TimeoutPhase::Write, async {
            io.write_all(&wire.bytes)
                .await
                .map_err(|source| DispatchError::Io { source })?;
            io.flush()
                .await
                .map_err(|source| DispatchError::Io { source })
        })
        .await?;
        let summary = within(
            settings.read_timeout,
            TimeoutPhase::Read,
            read_response(connection.io_mut(), wire.head_only),
        )
        .await?;

        if summary.reusable {
            self.pool.checkin(wire.origin.clone(), connection);
        }
        Ok(summary.status)
    }
}

async fn within<F, T>(limit: Duration, phase: TimeoutPhase, future: F) -> Result<T, DispatchError>
where
    F: Future<Output = Result<T, DispatchError>>,
{
    tokio::time::timeout(limit, future)
        .await
        .map_err(|_elapsed| DispatchError::Timeout {
            phase,
            after: limit,
        })?
}

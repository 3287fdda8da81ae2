use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::JobConfig;
use crate::entropy::Entropy;
use crate::error::JobError;
use crate::metrics::{HttpOutcome, MetricsSink, StreamId};
use crate::pacing::Continuation;
use crate::user_agent::random_user_agent;

use super::client::{JobClient, build_client};
use super::request::{CompiledTemplateSet, RenderedRequest};
use super::transport::Transport;

/// Minimum spacing of the "still sending" progress log.
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(1);

/// Shared services handed to every job.
#[derive(Clone)]
pub struct JobEnv {
    pub metrics: Arc<dyn MetricsSink>,
    pub entropy: Arc<Entropy>,
    pub debug: bool,
}

/// What the request loop needs besides templates and transport.
pub struct LoopContext<'ctx> {
    pub metrics: &'ctx dyn MetricsSink,
    pub stream: &'ctx StreamId,
    pub entropy: &'ctx Entropy,
    pub interval: Duration,
    pub debug: bool,
}

/// Rate-limits a progress log without blocking.
#[derive(Debug)]
pub(crate) struct Heartbeat {
    every: Duration,
    next_due: Instant,
}

impl Heartbeat {
    pub(crate) fn new(every: Duration, now: Instant) -> Self {
        Self {
            every,
            next_due: now.checked_add(every).unwrap_or(now),
        }
    }

    /// True at most once per `every`, starting one `every` after creation.
    pub(crate) fn due_at(&mut self, now: Instant) -> bool {
        if now < self.next_due {
            return false;
        }
        self.next_due = now.checked_add(self.every).unwrap_or(now);
        true
    }
}

/// Runs iterations until `continuation` says stop and returns how many ran.
///
/// Each iteration renders a fresh request, dispatches it, records its
/// traffic volume and outcome, then sleeps for `interval`. Dispatch
/// failures are counted and never end the loop.
pub async fn run_request_loop<T, C>(
    templates: &CompiledTemplateSet,
    transport: &T,
    continuation: &mut C,
    ctx: &LoopContext<'_>,
) -> u64
where
    T: Transport + ?Sized,
    C: Continuation + ?Sized,
{
    let mut heartbeat = Heartbeat::new(HEARTBEAT_INTERVAL, Instant::now());
    let mut iterations = 0_u64;
    while continuation.next().await {
        let request = templates.render(random_user_agent(ctx.entropy));
        if heartbeat.due_at(Instant::now()) {
            info!("Sending traffic to {}", templates.path_source());
        }

        let outcome = send_request(transport, &request, ctx.debug).await;
        ctx.metrics.add_traffic(ctx.stream, request.payload_size());
        ctx.metrics
            .inc_http(&request.host(), request.method_label(), outcome);
        iterations = iterations.saturating_add(1);

        tokio::time::sleep(ctx.interval).await;
    }
    iterations
}

async fn send_request<T>(transport: &T, request: &RenderedRequest, debug: bool) -> HttpOutcome
where
    T: Transport + ?Sized,
{
    if debug {
        debug!(
            "{} {} started at {}",
            request.method_label(),
            request.uri,
            Utc::now().timestamp()
        );
    }
    match transport.dispatch(request).await {
        Ok(_status) => HttpOutcome::Success,
        Err(err) => {
            if debug {
                warn!(
                    "Error sending {} {}: {}",
                    request.method_label(),
                    request.uri,
                    err
                );
            }
            HttpOutcome::Fail
        }
    }
}

/// One job instance: compiled templates plus its own client and stream.
pub struct HttpJob {
    templates: CompiledTemplateSet,
    client: JobClient,
    stream: StreamId,
    entropy: Arc<Entropy>,
    metrics: Arc<dyn MetricsSink>,
    interval: Duration,
    debug: bool,
}

impl HttpJob {
    /// Compiles the templates, then builds the client.
    ///
    /// # Errors
    ///
    /// Returns the first template compile error; no client is built then.
    pub fn prepare(config: &JobConfig, env: &JobEnv) -> Result<Self, JobError> {
        let templates = CompiledTemplateSet::from_job(config)?;
        let entropy = Arc::new(env.entropy.fork());
        let client = build_client(&config.client, env.debug, Arc::clone(&entropy));
        Ok(Self {
            templates,
            client,
            stream: StreamId::generate(&entropy),
            entropy,
            metrics: Arc::clone(&env.metrics),
            interval: Duration::from_millis(config.interval_ms),
            debug: env.debug,
        })
    }

    #[must_use]
    pub fn client(&self) -> &JobClient {
        &self.client
    }

    #[must_use]
    pub fn stream(&self) -> &StreamId {
        &self.stream
    }

    pub async fn run<C>(&self, continuation: &mut C) -> u64
    where
        C: Continuation + ?Sized,
    {
        let ctx = LoopContext {
            metrics: self.metrics.as_ref(),
            stream: &self.stream,
            entropy: &self.entropy,
            interval: self.interval,
            debug: self.debug,
        };
        run_request_loop(&self.templates, &self.client, continuation, &ctx).await
    }
}

/// Prepares and runs one HTTP job to completion.
///
/// # Errors
///
/// Fails only when the job's templates do not compile.
pub async fn run_http_job<C>(
    config: &JobConfig,
    env: &JobEnv,
    continuation: &mut C,
) -> Result<u64, JobError>
where
    C: Continuation + ?Sized,
{
    let job = HttpJob::prepare(config, env)?;
    Ok(job.run(continuation).await)
}

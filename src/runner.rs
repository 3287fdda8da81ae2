//! Spawns every configured job instance and waits for them to finish.
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::config::JobsFile;
use crate::error::JobError;
use crate::http::{JobEnv, run_http_job};
use crate::pacing::IterationBudget;
use crate::shutdown::ShutdownSender;

/// How every spawned instance ended.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub finished: usize,
    pub failed: usize,
    pub panicked: usize,
    pub iterations: u64,
}

/// Runs `instances` copies of every job concurrently until each one's
/// budget is spent or shutdown is broadcast.
///
/// A job that fails to start or panics is logged and counted; the others
/// keep running.
pub async fn run_jobs(jobs: &JobsFile, env: &JobEnv, shutdown_tx: &ShutdownSender) -> RunSummary {
    let mut handles: Vec<(String, JoinHandle<Result<u64, JobError>>)> = Vec::new();
    for (index, spec) in jobs.jobs.iter().enumerate() {
        let name = spec.display_name(index);
        info!("Starting job {} with {} instance(s)", name, spec.instances);
        for instance in 0..spec.instances {
            let args = spec.args.clone();
            let env = env.clone();
            let mut budget = IterationBudget::new(args.count, shutdown_tx.subscribe());
            let handle = tokio::spawn(async move { run_http_job(&args, &env, &mut budget).await });
            handles.push((format!("{}#{}", name, instance), handle));
        }
    }

    let mut summary = RunSummary::default();
    for (label, handle) in handles {
        match handle.await {
            Ok(Ok(iterations)) => {
                info!("Job {} finished after {} iterations", label, iterations);
                summary.finished = summary.finished.saturating_add(1);
                summary.iterations = summary.iterations.saturating_add(iterations);
            }
            Ok(Err(err)) => {
                error!("Job {} failed: {}", label, err);
                summary.failed = summary.failed.saturating_add(1);
            }
            Err(join_err) if join_err.is_panic() => {
                error!("{}", JobError::Panicked { name: label });
                summary.panicked = summary.panicked.saturating_add(1);
            }
            Err(join_err) => {
                error!("Job {} was cancelled: {}", label, join_err);
                summary.failed = summary.failed.saturating_add(1);
            }
        }
    }
    summary
}

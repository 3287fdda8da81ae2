use std::sync::Arc;

use clap::Parser;
use tracing::{info, warn};

use trafficgen::args::CliArgs;
use trafficgen::config::load_jobs;
use trafficgen::entropy::Entropy;
use trafficgen::error::AppResult;
use trafficgen::http::JobEnv;
use trafficgen::logger::init_logging;
use trafficgen::metrics::{MetricsRegistry, MetricsSink, spawn_stats_reporter};
use trafficgen::runner::run_jobs;
use trafficgen::shutdown::{setup_signal_shutdown_handler, shutdown_channel};

pub(crate) fn run() -> AppResult<()> {
    let args = CliArgs::parse();

    init_logging(args.verbose);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime.block_on(run_async(args))
}

async fn run_async(args: CliArgs) -> AppResult<()> {
    let jobs = load_jobs(args.config.as_deref())?;
    let entropy = args
        .seed
        .map_or_else(Entropy::from_os, Entropy::from_seed);
    let registry = Arc::new(MetricsRegistry::new());

    let (shutdown_tx, _) = shutdown_channel();
    let signal_handle = setup_signal_shutdown_handler(&shutdown_tx);
    let reporter = spawn_stats_reporter(Arc::clone(&registry), args.report_interval, &shutdown_tx);

    let env = JobEnv {
        metrics: registry as Arc<dyn MetricsSink>,
        entropy: Arc::new(entropy),
        debug: args.verbose,
    };
    let summary = run_jobs(&jobs, &env, &shutdown_tx).await;

    drop(shutdown_tx.send(()));
    signal_handle.await?;
    reporter.await?;

    if summary.failed > 0 || summary.panicked > 0 {
        warn!(
            "{} job instance(s) failed and {} panicked",
            summary.failed, summary.panicked
        );
    }
    info!(
        "All jobs done: {} instance(s) finished, {} iterations",
        summary.finished, summary.iterations
    );
    Ok(())
}

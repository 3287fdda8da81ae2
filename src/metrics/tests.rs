use std::sync::Arc;
use std::time::Duration;

use super::{HttpOutcome, MetricsRegistry, MetricsSink, StreamId, spawn_stats_reporter};
use crate::entropy::Entropy;
use crate::shutdown::shutdown_channel;

#[test]
fn traffic_accumulates_per_stream() -> Result<(), String> {
    let registry = MetricsRegistry::new();
    let first = StreamId::new("first");
    let second = StreamId::new("second");
    registry.add_traffic(&first, 10);
    registry.add_traffic(&first, 5);
    registry.add_traffic(&second, 7);

    if registry.traffic(&first) != 15 || registry.traffic(&second) != 7 {
        return Err("Unexpected per-stream totals".to_owned());
    }
    let snapshot = registry.snapshot();
    if snapshot.bytes != 22 || snapshot.streams != 2 {
        return Err(format!("Unexpected snapshot: {:?}", snapshot));
    }
    Ok(())
}

#[test]
fn http_counters_are_labelled_by_host_method_and_outcome() -> Result<(), String> {
    let registry = MetricsRegistry::new();
    registry.inc_http("example.com", "GET", HttpOutcome::Success);
    registry.inc_http("example.com", "GET", HttpOutcome::Success);
    registry.inc_http("example.com", "POST", HttpOutcome::Fail);
    registry.inc_http("", "GET", HttpOutcome::Fail);

    if registry.http_count("example.com", "GET", HttpOutcome::Success) != 2 {
        return Err("Expected two successful GETs".to_owned());
    }
    if registry.http_count("example.com", "GET", HttpOutcome::Fail) != 0 {
        return Err("Outcome labels must not mix".to_owned());
    }
    let snapshot = registry.snapshot();
    if snapshot.successful_requests != 2 || snapshot.failed_requests != 2 {
        return Err(format!("Unexpected snapshot: {:?}", snapshot));
    }
    if registry.http_counters().len() != 3 {
        return Err("Expected three distinct label sets".to_owned());
    }
    Ok(())
}

#[test]
fn generated_stream_ids_differ() -> Result<(), String> {
    let entropy = Entropy::from_seed(9);
    if StreamId::generate(&entropy) == StreamId::generate(&entropy) {
        return Err("Expected distinct stream ids".to_owned());
    }
    Ok(())
}

#[test]
fn stats_reporter_returns_final_snapshot_on_shutdown() -> Result<(), String> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|err| format!("Failed to build runtime: {}", err))?;
    runtime.block_on(async {
        let registry = Arc::new(MetricsRegistry::new());
        registry.add_traffic(&StreamId::new("s"), 42);
        registry.inc_http("h", "GET", HttpOutcome::Success);

        let (shutdown_tx, _) = shutdown_channel();
        let handle = spawn_stats_reporter(
            Arc::clone(&registry),
            Duration::from_millis(5),
            &shutdown_tx,
        );
        tokio::time::sleep(Duration::from_millis(20)).await;
        shutdown_tx
            .send(())
            .map_err(|err| format!("Failed to send shutdown: {}", err))?;

        let snapshot = tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .map_err(|err| format!("Reporter did not stop: {}", err))?
            .map_err(|err| format!("Reporter join error: {}", err))?;
        if snapshot.bytes != 42 || snapshot.successful_requests != 1 {
            return Err(format!("Unexpected final snapshot: {:?}", snapshot));
        }
        Ok(())
    })
}

#[test]
fn concurrent_writers_are_all_counted() -> Result<(), String> {
    let registry = Arc::new(MetricsRegistry::new());
    let writers: Vec<_> = (0..8)
        .map(|idx| {
            let registry = Arc::clone(&registry);
            std::thread::spawn(move || {
                let stream = StreamId::new(format!("stream-{}", idx));
                for _ in 0..500 {
                    registry.add_traffic(&stream, 2);
                    registry.inc_http("h", "GET", HttpOutcome::Success);
                }
            })
        })
        .collect();
    for writer in writers {
        writer
            .join()
            .map_err(|_panic| "Writer thread panicked".to_owned())?;
    }
    let snapshot = registry.snapshot();
    if snapshot.bytes != 8000 || snapshot.successful_requests != 4000 || snapshot.streams != 8 {
        return Err(format!("Unexpected snapshot: {:?}", snapshot));
    }
    Ok(())
}

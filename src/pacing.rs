//! Iteration gating for the request loop.
use async_trait::async_trait;
use tokio::sync::broadcast::error::TryRecvError;

use crate::shutdown::ShutdownReceiver;

/// Decides, before every iteration, whether the request loop keeps going.
#[async_trait]
pub trait Continuation: Send {
    async fn next(&mut self) -> bool;
}

/// Allows up to `count` iterations (unbounded when unset) and stops for
/// good once shutdown is observed.
#[derive(Debug)]
pub struct IterationBudget {
    remaining: Option<u64>,
    shutdown_rx: ShutdownReceiver,
    stopped: bool,
}

impl IterationBudget {
    /// A `count` of zero means unbounded.
    #[must_use]
    pub fn new(count: Option<u64>, shutdown_rx: ShutdownReceiver) -> Self {
        Self {
            remaining: count.filter(|count| *count > 0),
            shutdown_rx,
            stopped: false,
        }
    }

    #[must_use]
    pub const fn remaining(&self) -> Option<u64> {
        self.remaining
    }

    fn shutdown_requested(&mut self) -> bool {
        match self.shutdown_rx.try_recv() {
            Ok(()) | Err(TryRecvError::Closed | TryRecvError::Lagged(_)) => true,
            Err(TryRecvError::Empty) => false,
        }
    }
}

#[async_trait]
impl Continuation for IterationBudget {
    async fn next(&mut self) -> bool {
        if self.stopped || self.shutdown_requested() {
            self.stopped = true;
            return false;
        }
        if let Some(remaining) = self.remaining.as_mut() {
            if *remaining == 0 {
                self.stopped = true;
                return false;
            }
            *remaining = remaining.saturating_sub(1);
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shutdown::shutdown_channel;

    fn run_async_test<F>(future: F) -> Result<(), String>
    where
        F: std::future::Future<Output = Result<(), String>>,
    {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|err| format!("Failed to build runtime: {}", err))?;
        runtime.block_on(future)
    }

    #[test]
    fn count_limits_iterations() -> Result<(), String> {
        run_async_test(async {
            let (shutdown_tx, _) = shutdown_channel();
            let mut budget = IterationBudget::new(Some(3), shutdown_tx.subscribe());
            let mut allowed = 0_u32;
            while budget.next().await {
                allowed = allowed.saturating_add(1);
                if allowed > 10 {
                    return Err("Budget did not stop".to_owned());
                }
            }
            if allowed != 3 {
                return Err(format!("Expected 3 iterations, got {}", allowed));
            }
            if budget.next().await {
                return Err("A stopped budget must stay stopped".to_owned());
            }
            Ok(())
        })
    }

    #[test]
    fn zero_count_is_unbounded() -> Result<(), String> {
        run_async_test(async {
            let (shutdown_tx, _) = shutdown_channel();
            let mut budget = IterationBudget::new(Some(0), shutdown_tx.subscribe());
            for _ in 0..100 {
                if !budget.next().await {
                    return Err("Zero count must not stop the loop".to_owned());
                }
            }
            if budget.remaining().is_some() {
                return Err("Expected no remaining count".to_owned());
            }
            Ok(())
        })
    }

    #[test]
    fn shutdown_stops_iterations() -> Result<(), String> {
        run_async_test(async {
            let (shutdown_tx, _) = shutdown_channel();
            let mut budget = IterationBudget::new(None, shutdown_tx.subscribe());
            if !budget.next().await {
                return Err("Expected the first iteration to run".to_owned());
            }
            shutdown_tx
                .send(())
                .map_err(|err| format!("Failed to send shutdown: {}", err))?;
            if budget.next().await {
                return Err("Expected shutdown to stop the budget".to_owned());
            }
            Ok(())
        })
    }
}

//! Worker-pool dispatch, time budgets and best-effort cancellation for
//! simulations.

use rayon::prelude::*;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::time::{Duration, Instant};
use tracing::debug;

use crate::error::AnalyticsError;
use crate::AnalyticsResult;

/// Trials evaluated between two budget checks.
pub const TRIAL_BATCH: usize = 1_000;

/// Deadline plus a shared cancellation flag, checked between trial batches.
#[derive(Debug, Clone)]
pub struct Budget {
    started: Instant,
    limit: Option<Duration>,
    cancelled: Arc<AtomicBool>,
}

impl Default for Budget {
    fn default() -> Self {
        Budget::unlimited()
    }
}

impl Budget {
    pub fn unlimited() -> Self {
        Budget {
            started: Instant::now(),
            limit: None,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_timeout_ms(limit_ms: Option<u64>) -> Self {
        Budget {
            limit: limit_ms.map(Duration::from_millis),
            ..Budget::unlimited()
        }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Fails once the caller cancelled or the deadline has passed.
    pub fn check(&self, operation: &str) -> AnalyticsResult<()> {
        if self.is_cancelled() {
            return Err(AnalyticsError::Cancelled {
                operation: operation.to_string(),
            });
        }
        if let Some(limit) = self.limit {
            let elapsed = self.elapsed();
            if elapsed > limit {
                return Err(AnalyticsError::ComputationTimeout {
                    operation: operation.to_string(),
                    elapsed_ms: elapsed.as_millis() as u64,
                    budget_ms: limit.as_millis() as u64,
                });
            }
        }
        Ok(())
    }
}

/// Evaluate `trial(i)` for every `i < n_trials` in parallel, in batches,
/// checking `budget` before each batch. Output order follows trial index.
pub fn run_trials<T, F>(
    n_trials: usize,
    budget: &Budget,
    operation: &str,
    trial: F,
) -> AnalyticsResult<Vec<T>>
where
    T: Send,
    F: Fn(usize) -> AnalyticsResult<T> + Sync,
{
    let mut out = Vec::with_capacity(n_trials);
    let mut start = 0;
    while start < n_trials {
        budget.check(operation)?;
        let end = (start + TRIAL_BATCH).min(n_trials);
        let batch: Vec<T> = (start..end)
            .into_par_iter()
            .map(&trial)
            .collect::<AnalyticsResult<Vec<T>>>()?;
        out.extend(batch);
        start = end;
    }
    budget.check(operation)?;
    debug!(operation, n_trials, threads = rayon::current_num_threads(), "trials complete");
    Ok(out)
}

/// Dedicated thread pool for simulations so request threads never block
/// on CPU-bound work.
pub struct SimulationPool {
    pool: rayon::ThreadPool,
}

impl SimulationPool {
    /// `threads = None` sizes the pool to the available cores.
    pub fn new(threads: Option<usize>) -> AnalyticsResult<Self> {
        let mut builder =
            rayon::ThreadPoolBuilder::new().thread_name(|i| format!("simulation-{i}"));
        if let Some(n) = threads {
            builder = builder.num_threads(n);
        }
        let pool = builder
            .build()
            .map_err(|e| AnalyticsError::validation("threads", e.to_string()))?;
        Ok(SimulationPool { pool })
    }

    pub fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Queue `job` on the pool. The job receives the budget so it can stop
    /// between batches once the handle is cancelled or the deadline passes.
    pub fn submit<T, F>(&self, budget: Budget, job: F) -> SimulationHandle<T>
    where
        T: Send + 'static,
        F: FnOnce(&Budget) -> AnalyticsResult<T> + Send + 'static,
    {
        let (tx, rx) = mpsc::sync_channel(1);
        let handle_budget = budget.clone();
        self.pool.spawn(move || {
            let result = job(&budget);
            // The receiver may be gone if the caller abandoned the request.
            let _ = tx.send(result);
        });
        SimulationHandle {
            rx,
            budget: handle_budget,
        }
    }
}

/// Pending result of a submitted simulation.
pub struct SimulationHandle<T> {
    rx: mpsc::Receiver<AnalyticsResult<T>>,
    budget: Budget,
}

impl<T> SimulationHandle<T> {
    /// Ask the job to stop at its next budget check. No partial result is
    /// produced.
    pub fn cancel(&self) {
        self.budget.cancel();
    }

    /// Block until the job finishes.
    pub fn wait(self) -> AnalyticsResult<T> {
        self.rx.recv().unwrap_or_else(|_| {
            Err(AnalyticsError::Cancelled {
                operation: "simulation worker exited without a result".into(),
            })
        })
    }

    /// Non-blocking poll; `None` while the job is still running.
    pub fn try_result(&self) -> Option<AnalyticsResult<T>> {
        match self.rx.try_recv() {
            Ok(r) => Some(r),
            Err(mpsc::TryRecvError::Empty) => None,
            Err(mpsc::TryRecvError::Disconnected) => Some(Err(AnalyticsError::Cancelled {
                operation: "simulation worker exited without a result".into(),
            })),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_trials_preserves_order() {
        let out = run_trials(2_500, &Budget::unlimited(), "test", |i| Ok(i * 2)).unwrap();
        assert_eq!(out.len(), 2_500);
        assert!(out.iter().enumerate().all(|(i, v)| *v == i * 2));
    }

    #[test]
    fn test_cancelled_budget_stops_before_work() {
        let budget = Budget::unlimited();
        budget.cancel();
        let err = run_trials(10, &budget, "test", |i| Ok(i)).unwrap_err();
        assert!(matches!(err, AnalyticsError::Cancelled { .. }));
    }

    #[test]
    fn test_zero_timeout_expires() {
        let budget = Budget::with_timeout_ms(Some(0));
        std::thread::sleep(Duration::from_millis(2));
        let err = budget.check("test").unwrap_err();
        assert!(matches!(err, AnalyticsError::ComputationTimeout { budget_ms: 0, .. }));
    }

    #[test]
    fn test_trial_error_propagates() {
        let err = run_trials(5, &Budget::unlimited(), "test", |i| {
            if i == 3 {
                Err(AnalyticsError::Numerical("boom".into()))
            } else {
                Ok(i)
            }
        })
        .unwrap_err();
        assert!(matches!(err, AnalyticsError::Numerical(_)));
    }

    #[test]
    fn test_pool_submit_and_wait() {
        let pool = SimulationPool::new(Some(2)).unwrap();
        assert_eq!(pool.threads(), 2);
        let handle = pool.submit(Budget::unlimited(), |b| {
            run_trials(100, b, "sum", |i| Ok(i as u64)).map(|v| v.iter().sum::<u64>())
        });
        assert_eq!(handle.wait().unwrap(), 4_950);
    }

    #[test]
    fn test_pool_cancel() {
        let pool = SimulationPool::new(Some(1)).unwrap();
        let budget = Budget::unlimited();
        budget.cancel();
        let handle = pool.submit(budget, |b| run_trials(10, b, "cancelled", |i| Ok(i)));
        assert!(matches!(handle.wait(), Err(AnalyticsError::Cancelled { .. })));
    }
}

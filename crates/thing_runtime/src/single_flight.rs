//! Single-Flight Job Guard
//!
//! Collapses concurrent requests for the same expensive job into one
//! execution. The first caller under a key starts the job; every caller that
//! arrives while it is running awaits the same shared outcome. Once the job
//! finishes it leaves the registry, so the next call starts fresh.
//!
//! Jobs run on their own task and always run to completion: dropping a
//! caller only detaches that listener.

use std::collections::HashMap;
use std::fmt::Display;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, info, warn};

/// Outcome delivered to every waiter of a failed job
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum JobError<E> {
    /// The operation itself failed
    #[error("{0}")]
    Failed(E),

    /// The job's task panicked or was torn down
    #[error("Job aborted: {0}")]
    Aborted(String),
}

/// A job currently in flight
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobInfo<K> {
    pub key: K,
    pub started_at: DateTime<Utc>,
}

type Outcome<T, E> = Shared<BoxFuture<'static, Result<T, JobError<E>>>>;

struct InFlight<T, E> {
    /// Distinguishes this run from a later one under the same key
    run_id: u64,
    started_at: DateTime<Utc>,
    outcome: Outcome<T, E>,
}

struct Registry<K, T, E> {
    jobs: HashMap<K, InFlight<T, E>>,
    next_run_id: u64,
}

/// Removes a finished run from the registry, including when it panics
struct Deregister<K: Eq + Hash, T, E> {
    registry: Arc<Mutex<Registry<K, T, E>>>,
    key: Option<K>,
    run_id: u64,
}

impl<K: Eq + Hash, T, E> Drop for Deregister<K, T, E> {
    fn drop(&mut self) {
        let Some(key) = self.key.take() else {
            return;
        };
        let mut registry = self.registry.lock();
        if registry.jobs.get(&key).is_some_and(|job| job.run_id == self.run_id) {
            registry.jobs.remove(&key);
        }
    }
}

/// Keyed registry of in-flight jobs
pub struct SingleFlight<K, T, E> {
    registry: Arc<Mutex<Registry<K, T, E>>>,
}

impl<K, T, E> Default for SingleFlight<K, T, E> {
    fn default() -> Self {
        Self {
            registry: Arc::new(Mutex::new(Registry {
                jobs: HashMap::new(),
                next_run_id: 0,
            })),
        }
    }
}

impl<K, T, E> SingleFlight<K, T, E>
where
    K: Eq + Hash + Clone + Display + Send + Sync + 'static,
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `operation` under `key`, or join the run already in flight
    ///
    /// `operation` is only invoked when this call starts the job, and then
    /// on the job's own task, outside the registry lock. The lookup and
    /// insert happen in one critical section, so two callers can never both
    /// start a job for the same key. A job must not await its own key.
    pub async fn run<F, Fut>(&self, key: K, operation: F) -> Result<T, JobError<E>>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        let outcome = {
            let mut registry = self.registry.lock();

            if let Some(job) = registry.jobs.get(&key) {
                debug!(key = %key, "Joining in-flight job");
                job.outcome.clone()
            } else {
                let run_id = registry.next_run_id;
                registry.next_run_id += 1;

                let outcome = self.start(key.clone(), run_id, operation);
                registry.jobs.insert(
                    key,
                    InFlight {
                        run_id,
                        started_at: Utc::now(),
                        outcome: outcome.clone(),
                    },
                );
                outcome
            }
        };

        outcome.await
    }

    /// Spawn the job's task; called with the registry lock held
    fn start<F, Fut>(&self, key: K, run_id: u64, operation: F) -> Outcome<T, E>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        debug!(key = %key, run_id, "Starting job");

        let deregister = Deregister {
            registry: Arc::clone(&self.registry),
            key: Some(key.clone()),
            run_id,
        };

        let handle = tokio::spawn(async move {
            let _deregister = deregister;
            let started = Instant::now();
            let result = operation().await;
            info!(
                key = %key,
                ok = result.is_ok(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Job finished"
            );
            result
        });

        async move {
            match handle.await {
                Ok(result) => result.map_err(JobError::Failed),
                Err(e) => {
                    warn!("Job task aborted: {}", e);
                    Err(JobError::Aborted(e.to_string()))
                }
            }
        }
        .boxed()
        .shared()
    }

    /// Whether a job is currently running under `key`
    pub fn is_running(&self, key: &K) -> bool {
        self.registry.lock().jobs.contains_key(key)
    }

    /// Jobs currently running, oldest first
    pub fn in_flight(&self) -> Vec<JobInfo<K>> {
        let registry = self.registry.lock();
        let mut jobs: Vec<_> = registry
            .jobs
            .iter()
            .map(|(key, job)| (job.run_id, key.clone(), job.started_at))
            .collect();
        jobs.sort_by_key(|(run_id, _, _)| *run_id);
        jobs.into_iter()
            .map(|(_, key, started_at)| JobInfo { key, started_at })
            .collect()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use futures::future::{join, join_all};
    use tokio_test::assert_ok;

    type Guard = SingleFlight<String, u32, String>;

    fn counted(
        calls: &Arc<AtomicUsize>,
        delay: Duration,
        result: Result<u32, String>,
    ) -> impl FnOnce() -> BoxFuture<'static, Result<u32, String>> + Send + use<> {
        let calls = Arc::clone(calls);
        move || {
            calls.fetch_add(1, Ordering::SeqCst);
            async move {
                tokio::time::sleep(delay).await;
                result
            }
            .boxed()
        }
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_execution() {
        let guard = Guard::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let callers = (0..8).map(|i| {
            guard.run(
                "k".to_string(),
                counted(&calls, Duration::from_millis(20), Ok(100 + i)),
            )
        });
        let results = join_all(callers).await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(results.iter().all(|r| *r == Ok(100)));
        assert!(!guard.is_running(&"k".to_string()));
    }

    #[tokio::test]
    async fn test_next_call_after_completion_runs_fresh() {
        let guard = Guard::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let first = guard
            .run("k".to_string(), counted(&calls, Duration::ZERO, Ok(1)))
            .await;
        let second = guard
            .run("k".to_string(), counted(&calls, Duration::ZERO, Ok(2)))
            .await;

        assert_eq!(first, Ok(1));
        assert_eq!(second, Ok(2));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failure_reaches_every_waiter() {
        let guard = Guard::new();
        let calls = Arc::new(AtomicUsize::new(0));

        // `join` polls in argument order, so the failing operation starts first
        let (a, b) = join(
            guard.run(
                "k".to_string(),
                counted(&calls, Duration::from_millis(10), Err("disk full".to_string())),
            ),
            guard.run("k".to_string(), counted(&calls, Duration::ZERO, Ok(7))),
        )
        .await;

        assert_eq!(a, Err(JobError::Failed("disk full".to_string())));
        assert_eq!(b, a);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        // A failed job is cleared like a successful one
        let retry = guard
            .run("k".to_string(), counted(&calls, Duration::ZERO, Ok(7)))
            .await;
        assert_ok!(retry);
    }

    #[tokio::test]
    async fn test_detached_caller_does_not_cancel_job() {
        let guard = Arc::new(Guard::new());
        let calls = Arc::new(AtomicUsize::new(0));

        let impatient = tokio::time::timeout(
            Duration::from_millis(5),
            guard.run(
                "k".to_string(),
                counted(&calls, Duration::from_millis(50), Ok(1)),
            ),
        )
        .await;
        assert!(impatient.is_err());
        assert!(guard.is_running(&"k".to_string()));

        let late = guard
            .run("k".to_string(), counted(&calls, Duration::ZERO, Ok(2)))
            .await;
        assert_eq!(late, Ok(1));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_keys_are_independent() {
        let guard = Guard::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let (a, b) = join(
            guard.run("a".to_string(), counted(&calls, Duration::from_millis(5), Ok(1))),
            guard.run("b".to_string(), counted(&calls, Duration::from_millis(5), Ok(2))),
        )
        .await;

        assert_eq!((a, b), (Ok(1), Ok(2)));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_in_flight_lists_running_jobs() {
        let guard = Arc::new(Guard::new());
        let calls = Arc::new(AtomicUsize::new(0));

        let worker = {
            let guard = Arc::clone(&guard);
            let op = counted(&calls, Duration::from_millis(30), Ok(1));
            tokio::spawn(async move { guard.run("export".to_string(), op).await })
        };

        // Let the spawned caller register its job
        while !guard.is_running(&"export".to_string()) {
            tokio::task::yield_now().await;
        }
        let jobs = guard.in_flight();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].key, "export");

        assert_eq!(worker.await.unwrap(), Ok(1));
        assert!(guard.in_flight().is_empty());
    }

    #[tokio::test]
    async fn test_operation_may_use_the_guard_synchronously() {
        let guard = Arc::new(Guard::new());

        let inner = Arc::clone(&guard);
        let result = tokio::time::timeout(
            Duration::from_secs(5),
            guard.run("outer".to_string(), move || {
                let registered = inner.is_running(&"outer".to_string());
                async move {
                    match registered {
                        true => Ok(1),
                        false => Err("not registered".to_string()),
                    }
                }
            }),
        )
        .await;

        assert_eq!(result.ok(), Some(Ok(1)));
    }

    #[tokio::test]
    async fn test_panicking_job_is_aborted_and_cleared() {
        let guard = Guard::new();

        let result = guard
            .run("k".to_string(), || async { panic!("boom") })
            .await;
        assert!(matches!(result, Err(JobError::Aborted(_))));
        assert!(!guard.is_running(&"k".to_string()));

        let retry = guard.run("k".to_string(), || async { Ok(5) }).await;
        assert_eq!(retry, Ok(5));
    }
}

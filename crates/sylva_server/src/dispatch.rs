//! Hand-off of blocking work to the runtime's blocking pool.

use crate::error::{ServerError, ServerResult};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task;

/// Runs blocking storage work off the request task.
///
/// Each unit acquires a permit from a bounded semaphore and then executes on
/// `spawn_blocking`. The permit moves into the blocking closure, so it is
/// released when the work finishes even if the awaiting caller has gone
/// away; dropping the returned future never aborts dispatched work.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    permits: Arc<Semaphore>,
}

impl Dispatcher {
    /// Creates a dispatcher allowing `max_tasks` concurrent units.
    pub fn new(max_tasks: usize) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(max_tasks.max(1))),
        }
    }

    /// Number of units that could start right now.
    #[must_use]
    pub fn available_permits(&self) -> usize {
        self.permits.available_permits()
    }

    /// Runs `work` on the blocking pool and awaits its result.
    ///
    /// # Errors
    ///
    /// Returns the error of `work`, or `Internal` if the worker panicked or
    /// the pool is shut down.
    pub async fn run<F, T>(&self, op: &'static str, work: F) -> ServerResult<T>
    where
        F: FnOnce() -> ServerResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|_| ServerError::Internal("dispatcher is shut down".into()))?;

        let handle = task::spawn_blocking(move || {
            let _permit = permit;
            work()
        });

        match handle.await {
            Ok(result) => result,
            Err(err) => {
                tracing::error!(op, error = %err, "dispatched task failed");
                Err(ServerError::Internal(format!("{op} failed: {err}")))
            }
        }
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new(16)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn runs_work_and_returns_result() {
        let dispatcher = Dispatcher::new(2);
        let value = dispatcher.run("add", || Ok(40 + 2)).await.unwrap();
        assert_eq!(value, 42);
        assert_eq!(dispatcher.available_permits(), 2);
    }

    #[tokio::test]
    async fn propagates_work_errors() {
        let dispatcher = Dispatcher::new(1);
        let result: ServerResult<()> = dispatcher
            .run("fail", || Err(ServerError::NotFound("x".into())))
            .await;
        assert_eq!(result, Err(ServerError::NotFound("x".into())));
    }

    #[tokio::test]
    async fn panics_become_internal_errors() {
        let dispatcher = Dispatcher::new(1);
        let result: ServerResult<()> = dispatcher.run("boom", || panic!("boom")).await;
        assert!(matches!(result, Err(ServerError::Internal(_))));
        assert_eq!(dispatcher.available_permits(), 1);
    }

    #[tokio::test]
    async fn bounds_concurrency() {
        let dispatcher = Dispatcher::new(2);
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let mut tasks = Vec::new();
        for _ in 0..8 {
            let dispatcher = dispatcher.clone();
            let running = Arc::clone(&running);
            let peak = Arc::clone(&peak);
            tasks.push(tokio::spawn(async move {
                dispatcher
                    .run("sleep", move || {
                        let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                        peak.fetch_max(now, Ordering::SeqCst);
                        std::thread::sleep(Duration::from_millis(20));
                        running.fetch_sub(1, Ordering::SeqCst);
                        Ok(())
                    })
                    .await
            }));
        }
        for task in tasks {
            task.await.unwrap().unwrap();
        }
        assert!(peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn dropped_caller_does_not_abort_work() {
        let dispatcher = Dispatcher::new(1);
        let done = Arc::new(AtomicUsize::new(0));

        let flag = Arc::clone(&done);
        let future = dispatcher.run("slow", move || {
            std::thread::sleep(Duration::from_millis(20));
            flag.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        // Start the work, then abandon the caller.
        let _ = tokio::time::timeout(Duration::from_millis(1), future).await;

        // The permit stays taken until the work finishes.
        let _ = dispatcher.run("wait", || Ok(())).await;
        assert_eq!(done.load(Ordering::SeqCst), 1);
    }
}

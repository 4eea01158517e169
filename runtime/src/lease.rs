//! Exclusive access to the browser automation resource.
//!
//! The driver binds one fixed local port, so at most one automation
//! session may exist system-wide. Callers queue on a single-permit
//! semaphore (FIFO) for at most the lease timeout, then fail with
//! [`ScrapeError::ResourceBusy`] instead of waiting forever.
//!
//! Leased work runs on its own task and owns the lease there. The lease
//! is released only after that task has been dropped, so a session torn
//! down on timeout is gone before the next caller can launch one.

use pricescout_core::{ScoutResult, ScrapeError};
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, warn};

/// Time work gets past its deadline to tear down what it owns before it
/// is aborted.
pub const TEARDOWN_GRACE: Duration = Duration::from_secs(5);

/// Absolute per-request deadline, remembering the budget it came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline {
    at: Instant,
    budget: Duration,
    grace: Duration,
}

impl Deadline {
    pub fn after(budget: Duration) -> Self {
        Self {
            at: Instant::now() + budget,
            budget,
            grace: TEARDOWN_GRACE,
        }
    }

    pub fn with_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    pub fn at(&self) -> Instant {
        self.at
    }

    pub fn exceeded(&self) -> ScrapeError {
        ScrapeError::DeadlineExceeded(self.budget)
    }

    /// Run `fut` in place, dropping it once the deadline passes.
    pub async fn run<F, T>(&self, fut: F) -> ScoutResult<T>
    where
        F: Future<Output = ScoutResult<T>>,
    {
        timeout_at(self.at, fut)
            .await
            .unwrap_or_else(|_| Err(self.exceeded()))
    }

    /// Run `work` on its own task. A panic becomes `Internal`. Work still
    /// running at the deadline plus grace is aborted, and this returns
    /// only after the aborted task has been dropped.
    pub async fn supervise<F, T>(&self, work: F) -> ScoutResult<T>
    where
        F: Future<Output = ScoutResult<T>> + Send + 'static,
        T: Send + 'static,
    {
        let mut task = AbortOnDrop(tokio::spawn(work));
        let joined = match timeout_at(self.at + self.grace, &mut task.0).await {
            Ok(joined) => joined,
            Err(_) => {
                warn!(
                    budget_ms = self.budget.as_millis() as u64,
                    "work outlived its deadline, aborting"
                );
                task.0.abort();
                // Resolves once the task's future has been dropped.
                let _ = (&mut task.0).await;
                return Err(self.exceeded());
            }
        };
        match joined {
            Ok(outcome) => outcome,
            Err(e) if e.is_panic() => Err(ScrapeError::Internal("backend panicked".into())),
            Err(e) => Err(ScrapeError::Internal(format!("backend task failed: {e}"))),
        }
    }
}

/// Aborts the wrapped task when dropped, so a cancelled caller never
/// leaves its work running.
struct AbortOnDrop<T>(JoinHandle<T>);

impl<T> Drop for AbortOnDrop<T> {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Proof of exclusive ownership of the browser resource.
#[derive(Debug)]
pub struct ResourceLease {
    _permit: OwnedSemaphorePermit,
    holders: Arc<AtomicUsize>,
}

impl Drop for ResourceLease {
    fn drop(&mut self) {
        self.holders.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Work bound to the lease it runs under. Fields drop in declaration
/// order, so the work and anything it owns go before the lease.
struct Leased<F> {
    work: Pin<Box<F>>,
    _lease: ResourceLease,
}

impl<F: Future> Future for Leased<F> {
    type Output = F::Output;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.work.as_mut().poll(cx)
    }
}

/// Serializes every invocation that needs the browser resource.
#[derive(Debug, Clone)]
pub struct ResourceSerializer {
    semaphore: Arc<Semaphore>,
    lease_timeout: Duration,
    holders: Arc<AtomicUsize>,
}

impl ResourceSerializer {
    pub fn new(lease_timeout: Duration) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(1)),
            lease_timeout,
            holders: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Leases currently outstanding. Never exceeds one.
    pub fn holders(&self) -> usize {
        self.holders.load(Ordering::SeqCst)
    }

    pub fn is_free(&self) -> bool {
        self.semaphore.available_permits() == 1
    }

    /// Wait for the lease, bounded by both the lease timeout and `deadline`.
    pub async fn acquire(&self, deadline: &Deadline) -> ScoutResult<ResourceLease> {
        let queued_at = Instant::now();
        let bound = deadline.at().min(queued_at + self.lease_timeout);

        match timeout_at(bound, Arc::clone(&self.semaphore).acquire_owned()).await {
            Ok(Ok(permit)) => {
                self.holders.fetch_add(1, Ordering::SeqCst);
                let waited_ms = queued_at.elapsed().as_millis() as u64;
                debug!(waited_ms, "browser lease granted");
                Ok(ResourceLease {
                    _permit: permit,
                    holders: Arc::clone(&self.holders),
                })
            }
            Ok(Err(_closed)) => Err(ScrapeError::Internal("browser lease pool closed".into())),
            Err(_) => Err(ScrapeError::ResourceBusy {
                waited: queued_at.elapsed(),
            }),
        }
    }

    /// Run `work` while holding the lease, supervised by `deadline`. The
    /// lease moves onto the work's task and is released on every exit
    /// path, only once the work has been dropped.
    pub async fn with_exclusive_access<F, Fut, T>(
        &self,
        deadline: Deadline,
        work: F,
    ) -> ScoutResult<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = ScoutResult<T>> + Send + 'static,
        T: Send + 'static,
    {
        let lease = self.acquire(&deadline).await?;
        let leased = Leased {
            work: Box::pin(work()),
            _lease: lease,
        };
        deadline.supervise(leased).await
    }
}

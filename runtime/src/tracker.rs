//! In-flight request bookkeeping.
//!
//! Every admitted request gets an id of the form `REQ_{counter}_{unix}`
//! and an entry that lives until its [`ActiveRequest`] guard drops.

use chrono::{DateTime, Local};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Result of admitting one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Admission {
    pub id: String,
    pub started_at: DateTime<Local>,
    /// Live count including this request, sampled under the same lock.
    pub concurrent: usize,
}

#[derive(Debug, Default)]
struct TrackerInner {
    counter: u64,
    active: HashMap<String, DateTime<Local>>,
}

/// Thread-safe counter and map of in-flight requests.
#[derive(Debug, Default)]
pub struct RequestTracker {
    inner: Mutex<TrackerInner>,
}

impl RequestTracker {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, TrackerInner> {
        // Entries stay consistent even if a holder panicked mid-call.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn admit(&self) -> Admission {
        let started_at = Local::now();
        let mut inner = self.lock();
        inner.counter += 1;
        let id = format!("REQ_{}_{}", inner.counter, started_at.timestamp());
        inner.active.insert(id.clone(), started_at);
        Admission {
            id,
            started_at,
            concurrent: inner.active.len(),
        }
    }

    /// Remove an entry. Returns false if it was not present.
    pub fn release(&self, id: &str) -> bool {
        self.lock().active.remove(id).is_some()
    }

    pub fn active_count(&self) -> usize {
        self.lock().active.len()
    }

    /// Admit a request and tie its release to the returned guard.
    pub fn track(self: &Arc<Self>) -> ActiveRequest {
        let admission = self.admit();
        ActiveRequest {
            tracker: Arc::clone(self),
            admission,
        }
    }
}

/// Scoped tracker entry. Releases on drop, on every exit path.
#[derive(Debug)]
pub struct ActiveRequest {
    tracker: Arc<RequestTracker>,
    admission: Admission,
}

impl ActiveRequest {
    pub fn id(&self) -> &str {
        &self.admission.id
    }

    pub fn concurrent(&self) -> usize {
        self.admission.concurrent
    }

    pub fn started_at(&self) -> DateTime<Local> {
        self.admission.started_at
    }
}

impl Drop for ActiveRequest {
    fn drop(&mut self) {
        self.tracker.release(&self.admission.id);
    }
}

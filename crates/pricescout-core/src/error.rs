//! Error taxonomy shared by every extraction backend.
//!
//! A single field whose selector chain comes up empty is *not* an error:
//! it resolves to the field's sentinel inside the backend and never
//! reaches this type.

use std::time::Duration;

/// Terminal failures of one scrape invocation.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ScrapeError {
    /// The browser resource was not granted before the wait bound elapsed.
    #[error("browser resource busy: no lease within {}ms", .waited.as_millis())]
    ResourceBusy { waited: Duration },

    /// The driver process or its automation session failed to come up.
    #[error("backend startup failed: {0}")]
    BackendStartup(String),

    /// The session opened but the target page could not be loaded.
    #[error("navigation failed: {0}")]
    Navigation(String),

    /// Non-2xx response or unreadable body from a static fetch.
    #[error("upstream error: {0}")]
    Upstream(String),

    /// The per-request deadline elapsed while the backend was running.
    #[error("request deadline of {}ms exceeded", .0.as_millis())]
    DeadlineExceeded(Duration),

    /// The backend task panicked or was torn down unexpectedly.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ScrapeError {
    /// Stable tag for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ResourceBusy { .. } => "resource_busy",
            Self::BackendStartup(_) => "backend_startup",
            Self::Navigation(_) => "navigation",
            Self::Upstream(_) => "upstream",
            Self::DeadlineExceeded(_) => "deadline_exceeded",
            Self::Internal(_) => "internal",
        }
    }
}

/// Convenience result type.
pub type ScoutResult<T> = Result<T, ScrapeError>;

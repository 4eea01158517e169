//! Routes each request to its backend and assembles the terminal result.
//!
//! The dispatcher holds no locks of its own: exclusivity lives in the
//! [`ResourceSerializer`] and bookkeeping in the [`RequestTracker`].

use crate::backend::{BrowserBackend, ChromiumLauncher, ExtractionBackend, StaticFetchBackend};
use crate::config::ServiceConfig;
use crate::envelope::ScrapeRequest;
use crate::lease::{Deadline, ResourceSerializer};
use crate::tracker::RequestTracker;
use chrono::{DateTime, Local};
use pricescout_core::{FieldMap, ScrapeError, Site, SiteProfile};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Method name reported for self-test requests.
pub const SELF_TEST_METHOD: &str = "Service self-test";

/// Shared mutable state, owned explicitly rather than held in globals.
#[derive(Debug, Clone)]
pub struct DispatcherState {
    pub tracker: Arc<RequestTracker>,
    pub serializer: ResourceSerializer,
}

impl DispatcherState {
    pub fn new(lease_timeout: Duration) -> Self {
        Self {
            tracker: Arc::new(RequestTracker::new()),
            serializer: ResourceSerializer::new(lease_timeout),
        }
    }
}

/// What produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultMode {
    SelfTest,
    Extraction(Site),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timing {
    pub request_id: String,
    pub started_at: DateTime<Local>,
    pub finished_at: DateTime<Local>,
    pub duration: Duration,
    pub method: &'static str,
    /// In-flight requests at admission, this one included.
    pub concurrent: usize,
}

/// Terminal value of one request, handed to the envelope assembler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrapeResult {
    pub success: bool,
    pub mode: ResultMode,
    pub fields: Option<FieldMap>,
    pub error: Option<ScrapeError>,
    pub timing: Timing,
}

pub struct Dispatcher {
    state: DispatcherState,
    browser: Arc<dyn ExtractionBackend>,
    fetch: Arc<dyn ExtractionBackend>,
    request_deadline: Duration,
}

impl Dispatcher {
    pub fn new(
        state: DispatcherState,
        browser: Arc<dyn ExtractionBackend>,
        fetch: Arc<dyn ExtractionBackend>,
        request_deadline: Duration,
    ) -> Self {
        Self {
            state,
            browser,
            fetch,
            request_deadline,
        }
    }

    /// Wire the production backends from configuration.
    pub fn from_config(config: &ServiceConfig) -> anyhow::Result<Self> {
        let launcher = ChromiumLauncher::new(
            config.chromium_path.clone(),
            config.driver_port,
            config.browser_profile,
            config.fetch_timeout,
        );
        let browser = BrowserBackend::new(launcher, SiteProfile::flipkart(), config.settle);
        let fetch = StaticFetchBackend::new(SiteProfile::amazon(), config.fetch_timeout)?;
        Ok(Self::new(
            DispatcherState::new(config.lease_timeout),
            Arc::new(browser),
            Arc::new(fetch),
            config.request_deadline,
        ))
    }

    pub fn state(&self) -> &DispatcherState {
        &self.state
    }

    pub fn backend_for(&self, site: Site) -> &Arc<dyn ExtractionBackend> {
        match site {
            Site::Flipkart => &self.browser,
            Site::Amazon => &self.fetch,
        }
    }

    pub async fn handle(&self, request: &ScrapeRequest) -> ScrapeResult {
        let active = self.state.tracker.track();
        let clock = Instant::now();
        let request_id = active.id().to_string();
        info!(
            request_id = %request_id,
            concurrent = active.concurrent(),
            user = request.username.as_deref().unwrap_or("-"),
            chat = request.chat_id.as_deref().unwrap_or("-"),
            "request admitted"
        );

        if request.is_self_test() {
            return ScrapeResult {
                success: true,
                mode: ResultMode::SelfTest,
                fields: None,
                error: None,
                timing: Timing {
                    request_id,
                    started_at: active.started_at(),
                    finished_at: Local::now(),
                    duration: clock.elapsed(),
                    method: SELF_TEST_METHOD,
                    concurrent: active.concurrent(),
                },
            };
        }

        let url = request.target_url().to_string();
        let site = Site::classify(&url);
        let backend = Arc::clone(self.backend_for(site));
        let method = backend.name();
        info!(request_id = %request_id, site = %site, method, "dispatching");

        // Backend work runs on its own task so a panic stays contained.
        let deadline = Deadline::after(self.request_deadline);
        let exclusive = backend.requires_exclusive_resource();
        let work = async move { backend.extract_within(&url, deadline).await };
        let outcome = if exclusive {
            self.state.serializer.with_exclusive_access(deadline, || work).await
        } else {
            deadline.supervise(work).await
        };

        let duration = clock.elapsed();
        let timing = Timing {
            request_id,
            started_at: active.started_at(),
            finished_at: Local::now(),
            duration,
            method,
            concurrent: active.concurrent(),
        };

        match outcome {
            Ok(fields) => {
                info!(
                    request_id = %timing.request_id,
                    found = fields.found_count(),
                    total = fields.len(),
                    duration_ms = duration.as_millis() as u64,
                    "request completed"
                );
                ScrapeResult {
                    success: true,
                    mode: ResultMode::Extraction(site),
                    fields: Some(fields),
                    error: None,
                    timing,
                }
            }
            Err(err) => {
                warn!(
                    request_id = %timing.request_id,
                    kind = err.kind(),
                    duration_ms = duration.as_millis() as u64,
                    "request failed: {err}"
                );
                ScrapeResult {
                    success: false,
                    mode: ResultMode::Extraction(site),
                    fields: None,
                    error: Some(err),
                    timing,
                }
            }
        }
    }
}

//! Extraction backends.
//!
//! Two variants produce a [`FieldMap`] for one URL:
//! - [`BrowserBackend`] drives a live browser session and needs the shared
//!   automation resource, so the dispatcher serializes it.
//! - [`StaticFetchBackend`] issues one HTTP GET and parses the body. It is
//!   stateless and runs with full concurrency.

pub mod browser;
pub mod chromium;
pub mod fetch;

pub use browser::{BrowserBackend, DriverLauncher, DriverSession};
pub use chromium::{find_chromium, BrowserProfile, ChromiumLauncher, ChromiumSession};
pub use fetch::{extract_document, StaticFetchBackend};

use crate::lease::Deadline;
use async_trait::async_trait;
use pricescout_core::{FieldMap, ScoutResult};

/// One way of turning a product URL into a complete field map.
#[async_trait]
pub trait ExtractionBackend: Send + Sync {
    /// Human-readable method name reported in envelope timing.
    fn name(&self) -> &'static str;
    /// Whether invocations must hold the browser resource lease.
    fn requires_exclusive_resource(&self) -> bool;
    /// Extract every contracted field, or fail terminally.
    async fn extract(&self, url: &str) -> ScoutResult<FieldMap>;

    /// [`extract`](Self::extract) bounded by `deadline`. The default drops
    /// the extraction when the deadline passes; backends that own external
    /// processes override this to tear them down before returning.
    async fn extract_within(&self, url: &str, deadline: Deadline) -> ScoutResult<FieldMap> {
        deadline.run(self.extract(url)).await
    }
}

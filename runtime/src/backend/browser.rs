//! Browser automation backend, generic over the driver that provides the
//! live session.

use super::ExtractionBackend;
use crate::lease::{Deadline, TEARDOWN_GRACE};
use anyhow::Result;
use async_trait::async_trait;
use pricescout_core::{
    ElementSnapshot, FieldMap, FieldMapBuilder, FieldSpec, ScoutResult, ScrapeError, SiteProfile,
};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Starts the driver process and opens one automation session against it.
#[async_trait]
pub trait DriverLauncher: Send + Sync {
    type Session: DriverSession;

    async fn launch(&self) -> Result<Self::Session>;
}

/// One open automation session.
///
/// Dropping a session must release the driver process even when
/// [`quit`](Self::quit) was never reached.
#[async_trait]
pub trait DriverSession: Send + Sync {
    async fn navigate(&self, url: &str) -> Result<()>;
    /// Text of the first element matching `locator`, if any.
    async fn find_text(&self, locator: &str) -> Result<Option<String>>;
    /// Id and text of every element matching `locator`.
    async fn find_all(&self, locator: &str) -> Result<Vec<ElementSnapshot>>;
    async fn current_url(&self) -> Result<String>;
    async fn quit(&mut self) -> Result<()>;
}

/// Navigates a live session, waits for the page to settle, then resolves
/// every field of the site profile against the live DOM.
pub struct BrowserBackend<L> {
    launcher: L,
    profile: SiteProfile,
    settle: Duration,
}

impl<L: DriverLauncher> BrowserBackend<L> {
    pub fn new(launcher: L, profile: SiteProfile, settle: Duration) -> Self {
        Self {
            launcher,
            profile,
            settle,
        }
    }

    async fn launch(&self) -> ScoutResult<L::Session> {
        let session = self
            .launcher
            .launch()
            .await
            .map_err(|e| ScrapeError::BackendStartup(format!("{e:#}")))?;
        info!(site = %self.profile.site, "automation session open");
        Ok(session)
    }

    /// Launch, scrape and quit. With a deadline, scraping stops when it
    /// passes and the session is still quit before returning.
    async fn run_session(&self, url: &str, deadline: Option<Deadline>) -> ScoutResult<FieldMap> {
        let session = match deadline {
            Some(deadline) => deadline.run(self.launch()).await?,
            None => self.launch().await?,
        };
        let scrape = self.scrape_open_session(&session, url);
        let outcome = match deadline {
            Some(deadline) => deadline.run(scrape).await,
            None => scrape.await,
        };
        teardown(session).await;
        outcome
    }

    async fn scrape_open_session(&self, session: &L::Session, url: &str) -> ScoutResult<FieldMap> {
        session
            .navigate(url)
            .await
            .map_err(|e| ScrapeError::Navigation(format!("{e:#}")))?;

        tokio::time::sleep(self.settle).await;

        // Redirects can move us; disambiguate against where we landed.
        let page_url = match session.current_url().await {
            Ok(current) if !current.is_empty() => current,
            Ok(_) => url.to_string(),
            Err(e) => {
                debug!("current url unavailable, using request url: {e:#}");
                url.to_string()
            }
        };

        let mut builder = FieldMapBuilder::new();
        for spec in &self.profile.fields {
            let value = extract_field(session, spec, &page_url).await;
            if value.is_none() {
                debug!(field = %spec.field, "no match, using sentinel");
            }
            builder.record(spec, value);
        }
        Ok(builder.finish(&self.profile))
    }
}

#[async_trait]
impl<L> ExtractionBackend for BrowserBackend<L>
where
    L: DriverLauncher + 'static,
{
    fn name(&self) -> &'static str {
        "Chromium automation"
    }

    fn requires_exclusive_resource(&self) -> bool {
        true
    }

    async fn extract(&self, url: &str) -> ScoutResult<FieldMap> {
        self.run_session(url, None).await
    }

    async fn extract_within(&self, url: &str, deadline: Deadline) -> ScoutResult<FieldMap> {
        self.run_session(url, Some(deadline)).await
    }
}

/// Quit the session, bounded by the teardown grace. On failure or timeout
/// the session is dropped, which releases the driver process.
async fn teardown<S: DriverSession>(mut session: S) {
    match tokio::time::timeout(TEARDOWN_GRACE, session.quit()).await {
        Ok(Ok(())) => debug!("automation session closed"),
        Ok(Err(e)) => warn!("session teardown failed: {e:#}"),
        Err(_) => warn!("session teardown timed out"),
    }
}

/// Resolve one field against the live page, running its fallback pass in
/// the order its policy asks for.
async fn extract_field<S: DriverSession>(
    session: &S,
    spec: &FieldSpec,
    page_url: &str,
) -> Option<String> {
    if spec.fallback_first() {
        if let Some(text) = fallback_pass(session, spec, page_url).await {
            return Some(text);
        }
    }

    let hit = spec
        .chain
        .resolve_async(|locator| {
            let lookup = session.find_text(locator);
            async move { lookup.await.map(|raw| spec.screen(raw)) }
        })
        .await;

    if hit.is_some() || spec.fallback_first() {
        return hit;
    }
    fallback_pass(session, spec, page_url).await
}

async fn fallback_pass<S: DriverSession>(
    session: &S,
    spec: &FieldSpec,
    page_url: &str,
) -> Option<String> {
    let fallback = spec.fallback.as_ref()?;
    let mut elements = Vec::new();
    for locator in fallback.locators() {
        match session.find_all(&locator).await {
            Ok(found) => elements.extend(found),
            Err(e) => debug!(locator = %locator, "query-all failed: {e:#}"),
        }
    }
    spec.apply_fallback(page_url, &elements)
}

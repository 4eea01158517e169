//! Chromium driver for the browser backend, via chromiumoxide.

use super::browser::{DriverLauncher, DriverSession};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::page::Page;
use futures::StreamExt;
use pricescout_core::ElementSnapshot;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Find the Chromium binary path.
pub fn find_chromium(explicit: Option<&Path>) -> Option<PathBuf> {
    // 1. Configured path
    if let Some(path) = explicit {
        if path.exists() {
            return Some(path.to_path_buf());
        }
        warn!(path = %path.display(), "configured Chromium path does not exist");
    }

    // 2. PRICESCOUT_CHROMIUM_PATH env
    if let Ok(p) = std::env::var("PRICESCOUT_CHROMIUM_PATH") {
        let path = PathBuf::from(&p);
        if path.exists() {
            return Some(path);
        }
    }

    // 3. ~/.pricescout/chromium/
    if let Some(home) = dirs::home_dir() {
        let candidates = [
            home.join(".pricescout/chromium/chrome-linux64/chrome"),
            home.join(".pricescout/chromium/chrome"),
        ];
        if let Some(found) = candidates.into_iter().find(|c| c.exists()) {
            return Some(found);
        }
    }

    // 4. System PATH
    ["google-chrome", "chromium", "chromium-browser"]
        .into_iter()
        .find_map(|bin| which::which(bin).ok())
}

/// Launch flag set for the automation browser.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum BrowserProfile {
    /// Conservative headless flags.
    #[default]
    Stable,
    /// Stable plus asset blocking and background-throttling tweaks.
    Fast,
}

const STABLE_FLAGS: &[&str] = &[
    "--headless=new",
    "--disable-gpu",
    "--no-sandbox",
    "--disable-dev-shm-usage",
    "--disable-extensions",
    "--disable-background-networking",
    "--window-size=1920,1080",
];

const FAST_FLAGS: &[&str] = &[
    "--blink-settings=imagesEnabled=false",
    "--disable-plugins",
    "--no-first-run",
    "--disable-default-apps",
    "--single-process",
    "--no-zygote",
    "--disable-background-timer-throttling",
    "--disable-renderer-backgrounding",
    "--disable-backgrounding-occluded-windows",
    "--disable-ipc-flooding-protection",
];

impl BrowserProfile {
    pub fn flags(&self) -> Vec<&'static str> {
        match self {
            Self::Stable => STABLE_FLAGS.to_vec(),
            Self::Fast => STABLE_FLAGS.iter().chain(FAST_FLAGS).copied().collect(),
        }
    }
}

impl FromStr for BrowserProfile {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "stable" => Ok(Self::Stable),
            "fast" => Ok(Self::Fast),
            other => Err(format!("unknown browser profile '{other}' (expected stable or fast)")),
        }
    }
}

impl fmt::Display for BrowserProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Stable => "stable",
            Self::Fast => "fast",
        })
    }
}

/// Launches a fresh headless Chromium bound to the fixed debugging port.
#[derive(Debug, Clone)]
pub struct ChromiumLauncher {
    chromium_path: Option<PathBuf>,
    driver_port: u16,
    profile: BrowserProfile,
    navigation_timeout: Duration,
}

impl ChromiumLauncher {
    pub fn new(
        chromium_path: Option<PathBuf>,
        driver_port: u16,
        profile: BrowserProfile,
        navigation_timeout: Duration,
    ) -> Self {
        Self {
            chromium_path,
            driver_port,
            profile,
            navigation_timeout,
        }
    }
}

#[async_trait]
impl DriverLauncher for ChromiumLauncher {
    type Session = ChromiumSession;

    async fn launch(&self) -> Result<ChromiumSession> {
        let chrome_path = find_chromium(self.chromium_path.as_deref())
            .context("Chromium not found. Set PRICESCOUT_CHROMIUM_PATH.")?;

        let mut builder = BrowserConfig::builder()
            .chrome_executable(chrome_path)
            .port(self.driver_port);
        for flag in self.profile.flags() {
            builder = builder.arg(flag);
        }
        let config = builder
            .build()
            .map_err(|e| anyhow!("failed to build browser config: {e}"))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .with_context(|| format!("failed to launch Chromium on port {}", self.driver_port))?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("cdp handler: {e}");
                }
            }
        });

        // From here on the session owns the process; its Drop cleans up.
        let mut session = ChromiumSession {
            browser,
            page: None,
            handler,
            navigation_timeout: self.navigation_timeout,
        };
        let page = session
            .browser
            .new_page("about:blank")
            .await
            .context("failed to open automation session")?;
        session.page = Some(page);
        Ok(session)
    }
}

/// One Chromium process plus its single page.
pub struct ChromiumSession {
    browser: Browser,
    page: Option<Page>,
    handler: JoinHandle<()>,
    navigation_timeout: Duration,
}

impl ChromiumSession {
    fn page(&self) -> Result<&Page> {
        self.page.as_ref().ok_or_else(|| anyhow!("session already closed"))
    }
}

#[async_trait]
impl DriverSession for ChromiumSession {
    async fn navigate(&self, url: &str) -> Result<()> {
        let page = self.page()?;
        tokio::time::timeout(self.navigation_timeout, page.goto(url))
            .await
            .map_err(|_| {
                anyhow!(
                    "navigation timed out after {}ms",
                    self.navigation_timeout.as_millis()
                )
            })?
            .context("navigation failed")?;
        if let Err(e) = page.wait_for_navigation().await {
            debug!("wait for navigation: {e}");
        }
        Ok(())
    }

    async fn find_text(&self, locator: &str) -> Result<Option<String>> {
        let element = self.page()?.find_element(locator).await?;
        Ok(element.inner_text().await?)
    }

    async fn find_all(&self, locator: &str) -> Result<Vec<ElementSnapshot>> {
        let mut snapshots = Vec::new();
        for element in self.page()?.find_elements(locator).await? {
            snapshots.push(ElementSnapshot {
                id: element.attribute("id").await?,
                text: element.inner_text().await?.unwrap_or_default(),
            });
        }
        Ok(snapshots)
    }

    async fn current_url(&self) -> Result<String> {
        Ok(self
            .page()?
            .url()
            .await
            .context("failed to get URL")?
            .unwrap_or_default())
    }

    /// Close gracefully, falling back to killing the process, and reap it
    /// so the debugging port is free once this returns.
    async fn quit(&mut self) -> Result<()> {
        if let Some(page) = self.page.take() {
            if let Err(e) = page.close().await {
                debug!("page close: {e}");
            }
        }
        if let Err(e) = self.browser.close().await {
            warn!("graceful close failed, killing Chromium: {e}");
            if let Some(Err(e)) = self.browser.kill().await {
                warn!("kill failed: {e}");
            }
        }
        self.browser.wait().await.context("failed to reap Chromium")?;
        self.handler.abort();
        Ok(())
    }
}

impl Drop for ChromiumSession {
    fn drop(&mut self) {
        // Browser's own Drop kills a still-running child process.
        self.handler.abort();
    }
}

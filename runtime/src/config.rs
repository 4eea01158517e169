//! Service configuration: defaults, `PRICESCOUT_*` environment overrides,
//! then CLI flags on top.

use crate::backend::chromium::BrowserProfile;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

/// Runtime settings for the HTTP service and both extraction backends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    pub host: String,
    pub port: u16,
    pub service_name: String,
    /// Fixed local port the automation driver binds.
    pub driver_port: u16,
    pub chromium_path: Option<PathBuf>,
    pub browser_profile: BrowserProfile,
    /// Pause after navigation before querying the live DOM.
    pub settle: Duration,
    pub fetch_timeout: Duration,
    /// Upper bound on how long a request queues for the browser lease.
    pub lease_timeout: Duration,
    /// Overall budget for one request, queueing included.
    pub request_deadline: Duration,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            service_name: "Pricescout Scrape Service".to_string(),
            driver_port: 9515,
            chromium_path: None,
            browser_profile: BrowserProfile::Stable,
            settle: Duration::from_secs(3),
            fetch_timeout: Duration::from_secs(30),
            lease_timeout: Duration::from_secs(60),
            request_deadline: Duration::from_secs(90),
        }
    }
}

impl ServiceConfig {
    /// Load from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup. Unset keys keep their default;
    /// malformed values keep their default and log a warning.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let d = Self::default();
        Self {
            host: lookup("PRICESCOUT_HOST").unwrap_or(d.host),
            port: parse_or(&lookup, "PRICESCOUT_PORT", d.port),
            service_name: lookup("PRICESCOUT_SERVICE_NAME").unwrap_or(d.service_name),
            driver_port: parse_or(&lookup, "PRICESCOUT_DRIVER_PORT", d.driver_port),
            chromium_path: lookup("PRICESCOUT_CHROMIUM_PATH")
                .filter(|p| !p.is_empty())
                .map(PathBuf::from),
            browser_profile: parse_or(&lookup, "PRICESCOUT_BROWSER_PROFILE", d.browser_profile),
            settle: Duration::from_millis(parse_or(
                &lookup,
                "PRICESCOUT_SETTLE_MS",
                d.settle.as_millis() as u64,
            )),
            fetch_timeout: secs_or(&lookup, "PRICESCOUT_FETCH_TIMEOUT_SECS", d.fetch_timeout),
            lease_timeout: secs_or(&lookup, "PRICESCOUT_LEASE_TIMEOUT_SECS", d.lease_timeout),
            request_deadline: secs_or(
                &lookup,
                "PRICESCOUT_REQUEST_DEADLINE_SECS",
                d.request_deadline,
            ),
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_or<T, F>(lookup: &F, key: &str, default: T) -> T
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => default,
        Some(raw) => match raw.trim().parse() {
            Ok(value) => value,
            Err(e) => {
                warn!(key, value = %raw, "ignoring malformed setting: {e}");
                default
            }
        },
    }
}

fn secs_or<F>(lookup: &F, key: &str, default: Duration) -> Duration
where
    F: Fn(&str) -> Option<String>,
{
    Duration::from_secs(parse_or(lookup, key, default.as_secs()))
}

//! Wire types for the HTTP surface: the admitted request schema and the
//! JSON envelopes returned for `/scrape` and `/health`.

use crate::dispatcher::{ResultMode, ScrapeResult};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::time::Duration;

/// Literal token that turns a request into a service self-test.
pub const SELF_TEST_TOKEN: &str = "go";

/// Admitted `/scrape` body. Unknown keys are ignored; known keys must be
/// strings when present.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrapeRequest {
    #[serde(default)]
    pub command: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub chat_id: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
}

impl ScrapeRequest {
    pub fn for_url(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            ..Default::default()
        }
    }

    pub fn is_self_test(&self) -> bool {
        self.command.as_deref() == Some(SELF_TEST_TOKEN)
            || self.url.as_deref() == Some(SELF_TEST_TOKEN)
    }

    pub fn target_url(&self) -> &str {
        self.url.as_deref().unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimingInfo {
    pub start_time: String,
    pub end_time: String,
    pub duration: String,
    pub scraping_method: String,
    pub concurrent_requests: usize,
    pub request_id: String,
}

/// Uniform `/scrape` response, for success and failure alike.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrapeResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product_info: Option<BTreeMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product_details: Option<BTreeMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug: Option<Vec<String>>,
    pub timing: TimingInfo,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
    pub timestamp: String,
}

impl HealthResponse {
    pub fn now(service: &str) -> Self {
        Self {
            status: "ok".to_string(),
            service: service.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            timestamp: wall_clock(Local::now()),
        }
    }
}

pub fn clock_time(at: DateTime<Local>) -> String {
    at.format("%H:%M:%S%.3f").to_string()
}

pub fn wall_clock(at: DateTime<Local>) -> String {
    at.format("%Y-%m-%d %H:%M:%S %:z").to_string()
}

pub fn format_duration(d: Duration) -> String {
    format!("{d:.3?}")
}

impl From<&ScrapeResult> for ScrapeResponse {
    fn from(result: &ScrapeResult) -> Self {
        let t = &result.timing;
        let duration = format_duration(t.duration);
        let timing = TimingInfo {
            start_time: clock_time(t.started_at),
            end_time: clock_time(t.finished_at),
            duration: duration.clone(),
            scraping_method: t.method.to_string(),
            concurrent_requests: t.concurrent,
            request_id: t.request_id.clone(),
        };

        if let Some(err) = &result.error {
            return Self {
                success: false,
                message: format!(
                    "Request failed\nMethod: {}\nDuration: {duration}\nConcurrent: {}",
                    t.method, t.concurrent
                ),
                product_info: None,
                product_details: None,
                error: Some(format!("Scraping failed: {err}")),
                debug: None,
                timing,
            };
        }

        match result.mode {
            ResultMode::SelfTest => {
                let product_info = BTreeMap::from([
                    ("title".to_string(), "Pricescout scrape service - ACTIVE".to_string()),
                    ("price".to_string(), format!("Response in {duration}")),
                    ("timestamp".to_string(), wall_clock(t.finished_at)),
                ]);
                Self {
                    success: true,
                    message: format!(
                        "Pricescout v{} is live\nRequest ID: {}\n\
                         Concurrent: {} requests\nResponse time: {duration}",
                        env!("CARGO_PKG_VERSION"),
                        t.request_id,
                        t.concurrent
                    ),
                    product_info: Some(product_info),
                    product_details: None,
                    error: None,
                    debug: Some(vec![
                        format!("Request ID: {}", t.request_id),
                        format!("Concurrent requests: {}", t.concurrent),
                        "Static fetch for Amazon".to_string(),
                        "Chromium automation for Flipkart".to_string(),
                    ]),
                    timing,
                }
            }
            ResultMode::Extraction(site) => {
                let mut message = format!("{site} product found!\n\n");
                let mut product_info = BTreeMap::new();
                let mut found = 0;
                let mut total = 0;
                let mut product_details = None;
                if let Some(fields) = &result.fields {
                    for (field, value) in fields.iter() {
                        let _ = writeln!(message, "{}: {}", field.label(), value.as_str());
                        product_info.insert(field.as_str().to_string(), value.as_str().to_string());
                    }
                    found = fields.found_count();
                    total = fields.len();
                    if !fields.details().is_empty() {
                        product_details = Some(fields.details().clone());
                    }
                }
                let _ = write!(
                    message,
                    "\nMethod: {}\nDuration: {duration}\nConcurrent: {} requests\nID: {}",
                    t.method, t.concurrent, t.request_id
                );
                Self {
                    success: true,
                    message,
                    product_info: Some(product_info),
                    product_details,
                    error: None,
                    debug: Some(vec![
                        format!("Method: {}", t.method),
                        format!("Duration: {duration}"),
                        format!("Concurrent requests: {}", t.concurrent),
                        format!("Request ID: {}", t.request_id),
                        format!("Fields found: {found}/{total}"),
                    ]),
                    timing,
                }
            }
        }
    }
}

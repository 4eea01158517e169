//! `pricescout scrape <url>`: one request through the dispatcher, printed
//! as the same JSON envelope the service returns.

use crate::config::ServiceConfig;
use crate::dispatcher::Dispatcher;
use crate::envelope::{ScrapeRequest, ScrapeResponse};
use anyhow::{Context, Result};

/// Returns whether the scrape succeeded.
pub async fn run(config: ServiceConfig, url: String) -> Result<bool> {
    let dispatcher = Dispatcher::from_config(&config).context("failed to build dispatcher")?;
    let result = dispatcher.handle(&ScrapeRequest::for_url(url)).await;
    let response = ScrapeResponse::from(&result);
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(response.success)
}

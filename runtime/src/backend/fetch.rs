//! Static fetch backend: one HTTP GET with a browser-like header set,
//! then selector chains over the parsed document.

use super::ExtractionBackend;
use anyhow::Context;
use async_trait::async_trait;
use pricescout_core::{
    ElementSnapshot, FieldMap, FieldMapBuilder, ScoutResult, ScrapeError, SiteProfile,
};
use reqwest::header::{self, HeaderMap, HeaderValue};
use scraper::{ElementRef, Html, Selector};
use std::time::Duration;
use tracing::{debug, info};

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
                          AppleWebKit/537.36 (KHTML, like Gecko) \
                          Chrome/131.0.0.0 Safari/537.36";

fn browser_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        header::ACCEPT,
        HeaderValue::from_static(
            "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8",
        ),
    );
    headers.insert(header::ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.5"));
    headers.insert(header::DNT, HeaderValue::from_static("1"));
    headers.insert(header::UPGRADE_INSECURE_REQUESTS, HeaderValue::from_static("1"));
    headers.insert("sec-fetch-dest", HeaderValue::from_static("document"));
    headers.insert("sec-fetch-mode", HeaderValue::from_static("navigate"));
    headers.insert("sec-fetch-site", HeaderValue::from_static("none"));
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("max-age=0"));
    headers
}

/// Stateless HTTP extraction for sites that render product data server-side.
#[derive(Debug, Clone)]
pub struct StaticFetchBackend {
    client: reqwest::Client,
    profile: SiteProfile,
}

impl StaticFetchBackend {
    pub fn new(profile: SiteProfile, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::limited(5))
            .user_agent(USER_AGENT)
            .default_headers(browser_headers())
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self { client, profile })
    }
}

#[async_trait]
impl ExtractionBackend for StaticFetchBackend {
    fn name(&self) -> &'static str {
        "Static fetch"
    }

    fn requires_exclusive_resource(&self) -> bool {
        false
    }

    async fn extract(&self, url: &str) -> ScoutResult<FieldMap> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ScrapeError::Upstream(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ScrapeError::Upstream(format!("HTTP {}", status.as_u16())));
        }

        let final_url = response.url().to_string();
        let body = response
            .text()
            .await
            .map_err(|e| ScrapeError::Upstream(format!("unreadable body: {e}")))?;
        info!(bytes = body.len(), final_url = %final_url, "fetched product page");

        Ok(extract_document(&body, &final_url, &self.profile))
    }
}

/// Apply every field spec of `profile` to an HTML document.
///
/// `page_url` is the URL the document was served from; fallbacks that key
/// off the URL read it from here.
pub fn extract_document(html: &str, page_url: &str, profile: &SiteProfile) -> FieldMap {
    let document = Html::parse_document(html);
    let mut builder = FieldMapBuilder::new();

    for spec in &profile.fields {
        let value = spec.extract(
            page_url,
            |locator| Ok::<_, String>(document.select(&parse(locator)?).next().map(element_text)),
            |locator| {
                Ok(document
                    .select(&parse(locator)?)
                    .map(|el| ElementSnapshot {
                        id: el.value().attr("id").map(str::to_string),
                        text: element_text(el),
                    })
                    .collect())
            },
        );
        if value.is_none() {
            debug!(field = %spec.field, "no match, using sentinel");
        }
        builder.record(spec, value);
    }

    if let Some(table) = &profile.details {
        match (parse(table.rows), parse(table.cells)) {
            (Ok(rows), Ok(cells)) => {
                let rows = document
                    .select(&rows)
                    .map(|row| row.select(&cells).map(element_text).collect::<Vec<_>>());
                builder.details(table.collect(rows));
            }
            (Err(e), _) | (_, Err(e)) => debug!("detail table skipped: {e}"),
        }
    }

    builder.finish(profile)
}

fn parse(locator: &str) -> Result<Selector, String> {
    Selector::parse(locator).map_err(|e| format!("invalid selector '{locator}': {e}"))
}

fn element_text(el: ElementRef<'_>) -> String {
    el.text().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pricescout_core::Field;

    const AMAZON_PAGE: &str = r#"
        <html><body>
          <span id="productTitle">
            Acme   Wireless Earbuds
          </span>
          <div id="corePrice_feature_div"><span class="a-offscreen">₹1,499.00</span></div>
          <span class="a-price"><span class="a-offscreen">₹2,999.00</span></span>
          <span class="savingsPercentage">-50%</span>
          <span class="a-icon-alt">4.2 out of 5 stars</span>
          <div id="availability"><span> In stock </span></div>
        </body></html>
    "#;

    const AMAZON_URL: &str = "https://www.amazon.in/dp/B0TEST";

    #[test]
    fn test_extracts_amazon_fields() {
        let map = extract_document(AMAZON_PAGE, AMAZON_URL, &SiteProfile::amazon());

        assert_eq!(map.text(Field::Title), Some("Acme Wireless Earbuds"));
        assert_eq!(map.text(Field::Price), Some("₹1,499.00"));
        assert_eq!(map.text(Field::Discount), Some("-50%"));
        assert_eq!(map.text(Field::Rating), Some("4.2 out of 5 stars"));
        assert_eq!(map.text(Field::Availability), Some("In stock"));
    }

    #[test]
    fn test_mrp_falls_back_to_largest_price() {
        let map = extract_document(AMAZON_PAGE, AMAZON_URL, &SiteProfile::amazon());
        assert_eq!(map.text(Field::Mrp), Some("₹2,999.00"));
    }

    #[test]
    fn test_mrp_falls_back_to_core_price_alone() {
        let html = r#"
            <div id="corePrice_feature_div"><span class="a-offscreen">₹1,299.00</span></div>
        "#;
        let map = extract_document(html, AMAZON_URL, &SiteProfile::amazon());
        assert_eq!(map.text(Field::Price), Some("₹1,299.00"));
        assert_eq!(map.text(Field::Mrp), Some("₹1,299.00"));
        // Equal amounts give no discount.
        assert_eq!(map.text(Field::Discount), Some("Discount Not Found"));
    }

    #[test]
    fn test_discount_computed_and_details_collected() {
        let html = r#"
            <span id="productTitle">Acme Kettle</span>
            <div id="corePrice_feature_div"><span class="a-offscreen">₹1,299.00</span></div>
            <span class="a-price a-text-price"><span class="a-offscreen">₹2,499.00</span></span>
            <div id="detailBullets_feature_div"><ul>
              <li><span>Brand &rlm;:&lrm;</span><span> Acme </span></li>
              <li><span>Item Weight :</span><span>1.2 kg</span></li>
              <li><span>Manufacturer only</span></li>
            </ul></div>
        "#;
        let map = extract_document(html, AMAZON_URL, &SiteProfile::amazon());
        assert_eq!(map.text(Field::Discount), Some("-48%"));
        assert_eq!(map.details().len(), 2);
        assert_eq!(map.details()["Brand"], "Acme");
        assert_eq!(map.details()["Item Weight"], "1.2 kg");
    }

    #[test]
    fn test_empty_document_yields_all_sentinels() {
        let profile = SiteProfile::amazon();
        let map = extract_document("<html></html>", "https://www.amazon.in/dp/X", &profile);
        assert_eq!(map.len(), profile.fields.len());
        assert_eq!(map.found_count(), 0);
        assert_eq!(map.text(Field::Title), Some("Title Not Found"));
        assert_eq!(map.text(Field::Availability), Some("Availability Not Found"));
    }

    #[test]
    fn test_static_disambiguation_uses_page_url() {
        let html = r#"
            <h1>Kettle</h1>
            <div class="Nx9bqj CxhGGd">₹899</div>
            <div id="productRating_LSTA_PIDA_"><div>3.1</div></div>
            <div id="productRating_LSTB_PIDA_"><div>4.7</div></div>
        "#;
        let map = extract_document(
            html,
            "https://www.flipkart.com/kettle/p/itm?pid=PIDA&lid=LSTB",
            &SiteProfile::flipkart(),
        );
        assert_eq!(map.text(Field::Name), Some("Kettle"));
        assert_eq!(map.text(Field::Price), Some("₹899"));
        assert_eq!(map.text(Field::Rating), Some("4.7"));
    }
}

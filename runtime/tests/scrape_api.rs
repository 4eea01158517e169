//! REST round trips through the router, with in-process backends.
//!
//! Covers admission (400/405), the self-test path, envelope shape and
//! browser-lease exclusivity under concurrent HTTP load.

use assert_json_diff::assert_json_include;
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use pricescout_core::{
    Field, FieldMap, FieldMapBuilder, ScoutResult, ScrapeError, Site, SiteProfile,
};
use pricescout_runtime::backend::ExtractionBackend;
use pricescout_runtime::dispatcher::{Dispatcher, DispatcherState};
use pricescout_runtime::rest::{router, AppState};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

// ── Test backends ──

#[derive(Default)]
struct CallStats {
    calls: AtomicUsize,
    inside: AtomicUsize,
    peak: AtomicUsize,
}

struct FakeBackend {
    site: Site,
    exclusive: bool,
    work: Duration,
    fail: Option<ScrapeError>,
    stats: Arc<CallStats>,
}

#[async_trait]
impl ExtractionBackend for FakeBackend {
    fn name(&self) -> &'static str {
        if self.exclusive {
            "Chromium automation"
        } else {
            "Static fetch"
        }
    }

    fn requires_exclusive_resource(&self) -> bool {
        self.exclusive
    }

    async fn extract(&self, _url: &str) -> ScoutResult<FieldMap> {
        self.stats.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.stats.inside.fetch_add(1, Ordering::SeqCst) + 1;
        self.stats.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.work).await;
        self.stats.inside.fetch_sub(1, Ordering::SeqCst);

        if let Some(err) = &self.fail {
            return Err(err.clone());
        }
        let profile = match self.site {
            Site::Flipkart => SiteProfile::flipkart(),
            Site::Amazon => SiteProfile::amazon(),
        };
        let mut builder = FieldMapBuilder::new();
        let first = profile.fields[0].field;
        builder.record(profile.spec(first).unwrap(), Some("Acme Kettle 1.5L".into()));
        if let Some(price) = profile.spec(Field::Price) {
            builder.record(price, Some("₹1,299".into()));
        }
        Ok(builder.finish(&profile))
    }
}

struct Harness {
    app: Router,
    state: Arc<AppState>,
    browser: Arc<CallStats>,
    fetch: Arc<CallStats>,
}

fn harness_with(browser_fail: Option<ScrapeError>, browser_work: Duration) -> Harness {
    let browser = Arc::new(CallStats::default());
    let fetch = Arc::new(CallStats::default());
    let dispatcher = Dispatcher::new(
        DispatcherState::new(Duration::from_secs(5)),
        Arc::new(FakeBackend {
            site: Site::Flipkart,
            exclusive: true,
            work: browser_work,
            fail: browser_fail,
            stats: Arc::clone(&browser),
        }),
        Arc::new(FakeBackend {
            site: Site::Amazon,
            exclusive: false,
            work: Duration::from_millis(5),
            fail: None,
            stats: Arc::clone(&fetch),
        }),
        Duration::from_secs(10),
    );
    let state = Arc::new(AppState {
        dispatcher,
        service_name: "Pricescout Test Service".to_string(),
    });
    Harness {
        app: router(Arc::clone(&state)),
        state,
        browser,
        fetch,
    }
}

fn harness() -> Harness {
    harness_with(None, Duration::from_millis(5))
}

fn post_scrape(body: impl Into<Body>) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri("/scrape")
        .header("content-type", "application/json")
        .body(body.into())
        .unwrap()
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, bytes.to_vec())
}

async fn send_json(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let (status, bytes) = send(app, request).await;
    (status, serde_json::from_slice(&bytes).unwrap())
}

// ── Tests ──

#[tokio::test]
async fn test_health() {
    let h = harness();
    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let (status, json) = send_json(&h.app, request).await;

    assert_eq!(status, StatusCode::OK);
    assert_json_include!(
        actual: json.clone(),
        expected: json!({
            "status": "ok",
            "service": "Pricescout Test Service",
            "version": env!("CARGO_PKG_VERSION"),
        })
    );
    assert_eq!(json.as_object().unwrap().len(), 4);
    assert!(json["timestamp"].as_str().is_some());
    assert_eq!(h.state.dispatcher.state().tracker.active_count(), 0);
}

#[tokio::test]
async fn test_self_test_round_trip() {
    let h = harness();
    let (status, json) = send_json(&h.app, post_scrape(r#"{"command":"go"}"#)).await;

    assert_eq!(status, StatusCode::OK);
    assert_json_include!(
        actual: json.clone(),
        expected: json!({
            "success": true,
            "timing": {
                "scraping_method": "Service self-test",
                "concurrent_requests": 1
            }
        })
    );
    assert!(json["timing"]["request_id"]
        .as_str()
        .unwrap()
        .starts_with("REQ_1_"));
    assert!(json["product_info"]["title"].as_str().is_some());
    assert!(json.get("error").is_none());
    assert_eq!(h.browser.calls.load(Ordering::SeqCst), 0);
    assert_eq!(h.fetch.calls.load(Ordering::SeqCst), 0);
    assert!(h.state.dispatcher.state().serializer.is_free());
}

#[tokio::test]
async fn test_go_in_url_is_also_self_test() {
    let h = harness();
    let (_, json) = send_json(&h.app, post_scrape(r#"{"url":"go","username":"asha"}"#)).await;
    assert_eq!(json["success"], true);
    assert_eq!(json["timing"]["scraping_method"], "Service self-test");
    assert_eq!(h.browser.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_malformed_body_is_400_without_tracker_entry() {
    let h = harness();
    for body in ["not json", "", r#"{"url": 42}"#, "[1,2,3]"] {
        let (status, _) = send(&h.app, post_scrape(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "body {body:?}");
    }
    assert_eq!(h.state.dispatcher.state().tracker.active_count(), 0);

    // No ids were consumed by the rejected requests.
    let (_, json) = send_json(&h.app, post_scrape(r#"{"command":"go"}"#)).await;
    assert!(json["timing"]["request_id"]
        .as_str()
        .unwrap()
        .starts_with("REQ_1_"));
}

#[tokio::test]
async fn test_non_post_is_405() {
    let h = harness();
    for method in [Method::GET, Method::PUT, Method::DELETE] {
        let request = Request::builder()
            .method(method.clone())
            .uri("/scrape")
            .body(Body::empty())
            .unwrap();
        let (status, _) = send(&h.app, request).await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED, "{method}");
    }
}

#[tokio::test]
async fn test_unknown_keys_are_ignored() {
    let h = harness();
    let body = json!({
        "url": "https://www.amazon.in/dp/B0TEST",
        "chat_id": "-100200",
        "username": "asha",
        "locale": "en-IN",
        "retries": 3
    });
    let (status, json) = send_json(&h.app, post_scrape(body.to_string())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true);
    assert_eq!(h.fetch.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_static_site_envelope() {
    let h = harness();
    let body = json!({ "url": "https://www.amazon.in/dp/B0TEST" }).to_string();
    let (status, json) = send_json(&h.app, post_scrape(body)).await;

    assert_eq!(status, StatusCode::OK);
    assert_json_include!(
        actual: json.clone(),
        expected: json!({
            "success": true,
            "product_info": {
                "title": "Acme Kettle 1.5L",
                "price": "₹1,299",
                "mrp": "MRP Not Found",
                "discount": "Discount Not Found",
                "rating": "Rating Not Found",
                "availability": "Availability Not Found"
            },
            "timing": {
                "scraping_method": "Static fetch",
                "concurrent_requests": 1
            }
        })
    );
    assert!(json["message"].as_str().unwrap().contains("Amazon product found!"));
    assert_eq!(json["debug"].as_array().unwrap().len(), 5);
    assert_eq!(h.browser.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_backend_startup_failure_envelope() {
    let h = harness_with(
        Some(ScrapeError::BackendStartup("driver could not bind port 9515".into())),
        Duration::from_millis(5),
    );
    let body = json!({ "url": "https://dl.flipkart.com/s/abc123" }).to_string();
    let (status, json) = send_json(&h.app, post_scrape(body)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], false);
    assert!(json["error"].as_str().unwrap().contains("9515"));
    assert!(json.get("product_info").is_none());
    assert_eq!(json["timing"]["scraping_method"], "Chromium automation");
    assert_eq!(h.state.dispatcher.state().tracker.active_count(), 0);
    assert!(h.state.dispatcher.state().serializer.is_free());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_browser_requests_are_serialized() {
    let h = harness_with(None, Duration::from_millis(25));
    let body = json!({ "url": "https://www.flipkart.com/kettle/p/itm1?pid=P1&lid=L1" }).to_string();

    let tasks: Vec<_> = (0..4)
        .map(|_| {
            let app = h.app.clone();
            let body = body.clone();
            tokio::spawn(async move { send_json(&app, post_scrape(body)).await })
        })
        .collect();

    let mut concurrency_seen = Vec::new();
    for task in tasks {
        let (status, json) = task.await.unwrap();
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["success"], true);
        concurrency_seen.push(json["timing"]["concurrent_requests"].as_u64().unwrap());
    }

    assert_eq!(h.browser.calls.load(Ordering::SeqCst), 4);
    assert_eq!(h.browser.peak.load(Ordering::SeqCst), 1);
    assert!(concurrency_seen.iter().all(|&c| (1..=4).contains(&c)));
    assert_eq!(h.state.dispatcher.state().tracker.active_count(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_static_requests_run_in_parallel_with_browser() {
    let h = harness_with(None, Duration::from_millis(200));
    let flipkart = json!({ "url": "https://www.flipkart.com/p/itm9?pid=P9&lid=L9" }).to_string();
    let amazon = json!({ "url": "https://www.amazon.in/dp/B0TEST" }).to_string();

    let app = h.app.clone();
    let slow = tokio::spawn(async move { send_json(&app, post_scrape(flipkart)).await });
    tokio::time::sleep(Duration::from_millis(20)).await;

    let started = std::time::Instant::now();
    let (_, json) = send_json(&h.app, post_scrape(amazon)).await;
    assert_eq!(json["success"], true);
    assert!(started.elapsed() < Duration::from_millis(150));
    assert_eq!(json["timing"]["concurrent_requests"], 2);

    let (_, slow_json) = slow.await.unwrap();
    assert_eq!(slow_json["success"], true);
}

//! Ordered selector fallback chains.
//!
//! A chain is tried front to back and the first locator that yields
//! non-empty text wins. Later locators are never consulted once one hits,
//! so declaration order is the only tie-breaker. Lookup failures are
//! treated exactly like empty results.

use std::fmt::Display;
use std::future::Future;
use tracing::debug;

/// An ordered list of element locators for one logical field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectorChain {
    locators: Vec<String>,
}

impl SelectorChain {
    pub fn new<I, S>(locators: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            locators: locators.into_iter().map(Into::into).collect(),
        }
    }

    pub fn locators(&self) -> &[String] {
        &self.locators
    }

    pub fn len(&self) -> usize {
        self.locators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locators.is_empty()
    }

    /// Return the normalized text of the first locator with a non-empty hit.
    pub fn resolve<F, E>(&self, mut lookup: F) -> Option<String>
    where
        F: FnMut(&str) -> Result<Option<String>, E>,
        E: Display,
    {
        for locator in &self.locators {
            match lookup(locator.as_str()) {
                Ok(raw) => {
                    if let Some(text) = accept(raw) {
                        return Some(text);
                    }
                }
                Err(e) => debug!(locator = %locator, "selector lookup failed: {e}"),
            }
        }
        None
    }

    /// Like [`resolve`](Self::resolve), but substitutes `sentinel` on a miss.
    pub fn resolve_or<F, E>(&self, sentinel: &str, lookup: F) -> String
    where
        F: FnMut(&str) -> Result<Option<String>, E>,
        E: Display,
    {
        self.resolve(lookup).unwrap_or_else(|| sentinel.to_string())
    }

    /// Async form for lookups that query a live page.
    pub async fn resolve_async<'a, F, Fut, E>(&'a self, mut lookup: F) -> Option<String>
    where
        F: FnMut(&'a str) -> Fut,
        Fut: Future<Output = Result<Option<String>, E>>,
        E: Display,
    {
        for locator in &self.locators {
            match lookup(locator.as_str()).await {
                Ok(raw) => {
                    if let Some(text) = accept(raw) {
                        return Some(text);
                    }
                }
                Err(e) => debug!(locator = %locator, "selector lookup failed: {e}"),
            }
        }
        None
    }
}

/// Trim and collapse internal whitespace runs to single spaces.
pub fn normalize_text(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn accept(raw: Option<String>) -> Option<String> {
    let text = normalize_text(&raw?);
    (!text.is_empty()).then_some(text)
}

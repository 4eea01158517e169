//! Picks the right element among structurally identical widgets using
//! identifiers carried in the page's own URL.
//!
//! Product pages can render several rating widgets side by side (one per
//! product/listing pair). Their ids embed both the product id and the
//! listing id, so the widget belonging to the current page is the one whose
//! id contains the `pid` and `lid` values of the current URL.

/// When a disambiguation pass runs relative to the field's selector chain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DisambiguationPolicy {
    /// Only when the selector chain found nothing.
    #[default]
    Fallback,
    /// Before the selector chain; the chain is used only if this misses.
    Preferred,
}

/// Configuration for one URL-keyed disambiguation pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Disambiguation {
    /// Id prefix that marks candidate elements (e.g. `productRating_`).
    pub element_prefix: String,
    /// The two query keys whose values must both appear in the element id.
    pub keys: (String, String),
    pub policy: DisambiguationPolicy,
}

impl Disambiguation {
    pub fn new(element_prefix: &str, key_a: &str, key_b: &str) -> Self {
        Self {
            element_prefix: element_prefix.to_string(),
            keys: (key_a.to_string(), key_b.to_string()),
            policy: DisambiguationPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: DisambiguationPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// CSS locator matching every candidate element by id prefix.
    pub fn candidate_locator(&self) -> String {
        format!("[id^='{}']", self.element_prefix)
    }

    /// Extract both fragments from `url` and pick the matching candidate.
    pub fn pick<'c, I>(&self, url: &str, candidates: I) -> Option<String>
    where
        I: IntoIterator<Item = (&'c str, &'c str)>,
    {
        let a = extract_fragment(url, &self.keys.0).unwrap_or_default();
        let b = extract_fragment(url, &self.keys.1).unwrap_or_default();
        select(candidates, a, b)
    }
}

/// Value of query key `key` in `url`, up to the next `&` or end of string.
///
/// The key must start the string or follow `?` or `&`, so `pid` does not
/// match inside `spid=`.
pub fn extract_fragment<'u>(url: &'u str, key: &str) -> Option<&'u str> {
    let needle = format!("{key}=");
    let mut from = 0;
    while let Some(rel) = url[from..].find(&needle) {
        let at = from + rel;
        let boundary = at == 0 || matches!(url.as_bytes()[at - 1], b'?' | b'&');
        if boundary {
            let rest = &url[at + needle.len()..];
            let end = rest.find('&').unwrap_or(rest.len());
            return Some(&rest[..end]);
        }
        from = at + needle.len();
    }
    None
}

/// First candidate whose id contains both fragments, as trimmed text.
///
/// An empty fragment never matches: it would otherwise be contained in
/// every id. Candidates with blank text are skipped.
pub fn select<'c, I>(candidates: I, fragment_a: &str, fragment_b: &str) -> Option<String>
where
    I: IntoIterator<Item = (&'c str, &'c str)>,
{
    if fragment_a.is_empty() || fragment_b.is_empty() {
        return None;
    }
    candidates
        .into_iter()
        .filter(|(id, _)| id.contains(fragment_a) && id.contains(fragment_b))
        .map(|(_, text)| text.trim())
        .find(|text| !text.is_empty())
        .map(str::to_string)
}

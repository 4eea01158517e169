//! Per-site field tables: which fields a site is scraped for, the selector
//! chain for each, the sentinel used on a miss, and optional fallbacks.
//!
//! Update the chains here when a site changes its markup. Keep the most
//! stable locator first; order is the only tie-breaker.

use crate::disambiguation::{Disambiguation, DisambiguationPolicy};
use crate::fields::Field;
use crate::price::largest_price;
use crate::selector::{normalize_text, SelectorChain};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Target storefront, decided from the request URL alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Site {
    /// First-party token `flipkart.com`; served by browser automation.
    Flipkart,
    /// Everything else; served by static fetch.
    Amazon,
}

impl Site {
    const FLIPKART_TOKEN: &'static str = "flipkart.com";

    /// Total classification: every URL maps to exactly one site.
    pub fn classify(url: &str) -> Self {
        if url.contains(Self::FLIPKART_TOKEN) {
            Self::Flipkart
        } else {
            Self::Amazon
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Flipkart => "Flipkart",
            Self::Amazon => "Amazon",
        }
    }

}

impl fmt::Display for Site {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Plausibility filter applied to each candidate text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ValueCheck {
    #[default]
    Any,
    /// Contains `₹`, `Rs` or at least one digit.
    PriceLike,
    /// Contains a digit and is shorter than 20 characters.
    RatingLike,
}

impl ValueCheck {
    pub fn accepts(&self, text: &str) -> bool {
        let has_digit = text.chars().any(|c| c.is_ascii_digit());
        match self {
            Self::Any => true,
            Self::PriceLike => text.contains('₹') || text.contains("Rs") || has_digit,
            Self::RatingLike => has_digit && text.chars().count() < 20,
        }
    }
}

/// A snapshot of one element returned by a query-all lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ElementSnapshot {
    pub id: Option<String>,
    pub text: String,
}

/// Second-chance strategies that need every matching element, not just
/// the first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fallback {
    /// Pick among id-prefixed widgets using `pid`/`lid`-style URL fragments.
    Disambiguate(Disambiguation),
    /// Largest rupee amount among every element the chain matches.
    LargestPrice(SelectorChain),
    /// Derived from two other fields once the map is frozen; never reads
    /// the page itself.
    ComputedDiscount { price: Field, mrp: Field },
}

impl Fallback {
    /// Locators to run as query-all lookups before calling [`apply`](Self::apply).
    pub fn locators(&self) -> Vec<String> {
        match self {
            Self::Disambiguate(rule) => vec![rule.candidate_locator()],
            Self::LargestPrice(chain) => chain.locators().to_vec(),
            Self::ComputedDiscount { .. } => Vec::new(),
        }
    }

    pub fn apply(&self, page_url: &str, elements: &[ElementSnapshot]) -> Option<String> {
        let picked = match self {
            Self::Disambiguate(rule) => rule.pick(
                page_url,
                elements
                    .iter()
                    .filter_map(|e| e.id.as_deref().map(|id| (id, e.text.as_str()))),
            ),
            Self::LargestPrice(_) => largest_price(elements.iter().map(|e| e.text.as_str())),
            Self::ComputedDiscount { .. } => None,
        };
        picked.map(|text| normalize_text(&text))
    }

    fn runs_first(&self) -> bool {
        matches!(
            self,
            Self::Disambiguate(Disambiguation {
                policy: DisambiguationPolicy::Preferred,
                ..
            })
        )
    }
}

/// Extraction contract for one field on one site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpec {
    pub field: Field,
    pub chain: SelectorChain,
    pub sentinel: &'static str,
    pub check: ValueCheck,
    pub fallback: Option<Fallback>,
}

impl FieldSpec {
    pub fn new<I, S>(field: Field, chain: I, sentinel: &'static str) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            field,
            chain: SelectorChain::new(chain),
            sentinel,
            check: ValueCheck::Any,
            fallback: None,
        }
    }

    pub fn with_check(mut self, check: ValueCheck) -> Self {
        self.check = check;
        self
    }

    pub fn with_fallback(mut self, fallback: Fallback) -> Self {
        self.fallback = Some(fallback);
        self
    }

    /// Whether the fallback pass runs before the selector chain.
    pub fn fallback_first(&self) -> bool {
        self.fallback.as_ref().is_some_and(Fallback::runs_first)
    }

    /// Drop raw text that fails this field's plausibility check.
    pub fn screen(&self, raw: Option<String>) -> Option<String> {
        raw.filter(|text| self.check.accepts(&normalize_text(text)))
    }

    /// Run the fallback pass over already-collected elements.
    pub fn apply_fallback(&self, page_url: &str, elements: &[ElementSnapshot]) -> Option<String> {
        let fallback = self.fallback.as_ref()?;
        self.screen(fallback.apply(page_url, elements))
    }

    /// Full synchronous extraction: chain and fallback in policy order.
    ///
    /// `first` returns the text of the first element a locator matches;
    /// `all` returns every element it matches.
    pub fn extract<F, A, E>(&self, page_url: &str, mut first: F, mut all: A) -> Option<String>
    where
        F: FnMut(&str) -> Result<Option<String>, E>,
        A: FnMut(&str) -> Result<Vec<ElementSnapshot>, E>,
        E: fmt::Display,
    {
        let mut run_fallback = || {
            let fallback = self.fallback.as_ref()?;
            let mut elements = Vec::new();
            for locator in fallback.locators() {
                match all(&locator) {
                    Ok(found) => elements.extend(found),
                    Err(e) => tracing::debug!(locator = %locator, "query-all failed: {e}"),
                }
            }
            self.apply_fallback(page_url, &elements)
        };

        if self.fallback_first() {
            if let Some(text) = run_fallback() {
                return Some(text);
            }
            return self.chain.resolve(|loc| first(loc).map(|raw| self.screen(raw)));
        }

        self.chain
            .resolve(|loc| first(loc).map(|raw| self.screen(raw)))
            .or_else(run_fallback)
    }
}

/// Key/value rows read from a product-details block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetailTable {
    /// Locator matching one element per row.
    pub rows: &'static str,
    /// Locator for the cells inside a row, in document order.
    pub cells: &'static str,
}

impl DetailTable {
    /// Build the table from each row's cell texts. The first cell is the
    /// key, the second the value; rows with fewer than two cells are
    /// skipped.
    pub fn collect<R, C>(&self, rows: R) -> BTreeMap<String, String>
    where
        R: IntoIterator<Item = C>,
        C: IntoIterator<Item = String>,
    {
        let mut table = BTreeMap::new();
        for row in rows {
            let mut cells = row.into_iter();
            let (Some(key), Some(value)) = (cells.next(), cells.next()) else {
                continue;
            };
            let key: String = key
                .chars()
                .filter(|c| !matches!(c, ':' | '\u{200e}' | '\u{200f}'))
                .collect();
            let key = normalize_text(&key);
            if key.is_empty() {
                continue;
            }
            table.insert(key, normalize_text(&value));
        }
        table
    }
}

/// The field table for one site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteProfile {
    pub site: Site,
    pub fields: Vec<FieldSpec>,
    pub details: Option<DetailTable>,
}

impl SiteProfile {
    pub fn spec(&self, field: Field) -> Option<&FieldSpec> {
        self.fields.iter().find(|s| s.field == field)
    }

    pub fn flipkart() -> Self {
        Self {
            site: Site::Flipkart,
            fields: vec![
                FieldSpec::new(
                    Field::Name,
                    [
                        "span.B_NuCI",
                        "span.VU-ZEz",
                        "h1._35KyD6",
                        "span._35KyD6",
                        "h1",
                    ],
                    "Name not found",
                ),
                FieldSpec::new(
                    Field::Price,
                    [
                        "div._30jeq3._16Jk6d",
                        "div.Nx9bqj.CxhGGd",
                        "div._30jeq3",
                        "div._1_WHN1",
                    ],
                    "Price not found",
                )
                .with_check(ValueCheck::PriceLike),
                FieldSpec::new(
                    Field::Rating,
                    ["div._3LWZlK", "span._1lRcqv", "div._1lRcqv"],
                    "Rating not available",
                )
                .with_check(ValueCheck::RatingLike)
                .with_fallback(Fallback::Disambiguate(Disambiguation::new(
                    "productRating_",
                    "pid",
                    "lid",
                ))),
            ],
            details: None,
        }
    }

    pub fn amazon() -> Self {
        Self {
            site: Site::Amazon,
            fields: vec![
                FieldSpec::new(
                    Field::Title,
                    ["span#productTitle", "h1.a-size-large", "h1.product-title"],
                    "Title Not Found",
                ),
                FieldSpec::new(
                    Field::Mrp,
                    [
                        "span.a-price.a-text-price span.a-offscreen",
                        "span#priceblock_mrp",
                        "span.a-text-price",
                        "span.a-price.a-text-price",
                    ],
                    "MRP Not Found",
                )
                .with_fallback(Fallback::LargestPrice(SelectorChain::new([
                    "span.a-price span.a-offscreen",
                    "span#priceblock_ourprice",
                    "span#priceblock_dealprice",
                    "span#price_inside_buybox",
                    "span.a-color-price",
                    "span.offer-price",
                    "span.a-price-whole",
                    "span.a-price-fraction",
                    "div#corePrice_feature_div span.a-offscreen",
                    "span#priceblock_saleprice",
                    "span#priceblock_regularprice",
                    "div#averageCustomerReviews span.a-price",
                ]))),
                FieldSpec::new(
                    Field::Discount,
                    ["span.savingsPercentage", "span.a-color-price"],
                    "Discount Not Found",
                )
                .with_fallback(Fallback::ComputedDiscount {
                    price: Field::Price,
                    mrp: Field::Mrp,
                }),
                FieldSpec::new(
                    Field::Price,
                    [
                        "div#corePrice_feature_div span.a-offscreen",
                        "span#priceblock_dealprice",
                        "span#priceblock_ourprice",
                    ],
                    "Price Not Found",
                ),
                FieldSpec::new(
                    Field::Rating,
                    ["span.a-icon-alt", "span#acrPopover"],
                    "Rating Not Found",
                ),
                FieldSpec::new(
                    Field::Availability,
                    ["div#availability span", "span#availability"],
                    "Availability Not Found",
                ),
            ],
            details: Some(DetailTable {
                rows: "div#detailBullets_feature_div li",
                cells: "span",
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_classify_is_total() {
        assert_eq!(Site::classify("https://www.flipkart.com/x/p/itm1"), Site::Flipkart);
        assert_eq!(Site::classify("https://dl.flipkart.com/s/abc"), Site::Flipkart);
        assert_eq!(Site::classify("https://www.amazon.in/dp/B0TEST"), Site::Amazon);
        assert_eq!(Site::classify("not a url at all"), Site::Amazon);
        assert_eq!(Site::classify(""), Site::Amazon);
    }

    #[test]
    fn test_value_checks() {
        assert!(ValueCheck::PriceLike.accepts("₹1,299"));
        assert!(ValueCheck::PriceLike.accepts("Rs. 499"));
        assert!(!ValueCheck::PriceLike.accepts("Out of stock"));
        assert!(ValueCheck::RatingLike.accepts("4.3"));
        assert!(!ValueCheck::RatingLike.accepts("Be the first to review"));
        assert!(!ValueCheck::RatingLike.accepts("12,345 Ratings & 1,024 Reviews"));
    }

    #[test]
    fn test_profiles_have_unique_fields() {
        for profile in [SiteProfile::flipkart(), SiteProfile::amazon()] {
            let mut seen = std::collections::HashSet::new();
            for spec in &profile.fields {
                assert!(seen.insert(spec.field), "duplicate {:?}", spec.field);
                assert!(!spec.chain.is_empty());
            }
        }
    }

    fn rating_elements() -> Vec<ElementSnapshot> {
        vec![
            ElementSnapshot {
                id: Some("productRating_P1_L9_".into()),
                text: "3.9".into(),
            },
            ElementSnapshot {
                id: Some("productRating_P1_L1_".into()),
                text: "4.4".into(),
            },
        ]
    }

    #[test]
    fn test_disambiguation_runs_only_as_fallback() {
        let profile = SiteProfile::flipkart();
        let spec = profile.spec(Field::Rating).unwrap();
        let url = "https://www.flipkart.com/p/itm?pid=P1&lid=L1";

        // Chain hit: fallback never consulted.
        let dom: HashMap<&str, &str> = [("div._3LWZlK", "4.1")].into();
        let got = spec.extract(
            url,
            |loc| Ok::<_, String>(dom.get(loc).map(|s| s.to_string())),
            |_| -> Result<Vec<ElementSnapshot>, String> { panic!("fallback should not run") },
        );
        assert_eq!(got.as_deref(), Some("4.1"));

        // Chain miss: disambiguation picks the widget for this listing.
        let got = spec.extract(url, |_| Ok::<_, String>(None), |_| Ok(rating_elements()));
        assert_eq!(got.as_deref(), Some("4.4"));
    }

    #[test]
    fn test_preferred_policy_runs_disambiguation_first() {
        let mut spec = SiteProfile::flipkart().spec(Field::Rating).unwrap().clone();
        spec.fallback = Some(Fallback::Disambiguate(
            Disambiguation::new("productRating_", "pid", "lid")
                .with_policy(DisambiguationPolicy::Preferred),
        ));
        assert!(spec.fallback_first());

        let url = "https://www.flipkart.com/p/itm?pid=P1&lid=L9";
        let got = spec.extract(
            url,
            |_| Ok::<_, String>(Some("4.1".into())),
            |_| Ok(rating_elements()),
        );
        assert_eq!(got.as_deref(), Some("3.9"));
    }

    #[test]
    fn test_check_rejects_implausible_chain_hit() {
        let profile = SiteProfile::flipkart();
        let spec = profile.spec(Field::Price).unwrap();
        let dom: HashMap<&str, &str> = [
            ("div._30jeq3._16Jk6d", "Coming soon"),
            ("div.Nx9bqj.CxhGGd", "₹54,999"),
        ]
        .into();
        let got = spec.extract(
            "https://www.flipkart.com/p",
            |loc| Ok::<_, String>(dom.get(loc).map(|s| s.to_string())),
            |_| Ok(Vec::new()),
        );
        assert_eq!(got.as_deref(), Some("₹54,999"));
    }

    #[test]
    fn test_largest_price_fallback_for_mrp() {
        let profile = SiteProfile::amazon();
        let spec = profile.spec(Field::Mrp).unwrap();
        let got = spec.extract(
            "https://www.amazon.in/dp/B0",
            |_| Ok::<_, String>(None),
            |loc| {
                Ok(if loc == "span.a-price span.a-offscreen" {
                    vec![
                        ElementSnapshot {
                            id: None,
                            text: "₹1,499.00".into(),
                        },
                        ElementSnapshot {
                            id: None,
                            text: "₹2,199.00".into(),
                        },
                    ]
                } else {
                    Vec::new()
                })
            },
        );
        assert_eq!(got.as_deref(), Some("₹2,199.00"));
    }

    #[test]
    fn test_largest_price_covers_core_price_block() {
        let profile = SiteProfile::amazon();
        let spec = profile.spec(Field::Mrp).unwrap();
        let Some(Fallback::LargestPrice(chain)) = &spec.fallback else {
            panic!("amazon mrp should fall back to the largest price");
        };
        let locators = chain.locators();
        assert_eq!(locators.len(), 12);
        assert!(locators.iter().any(|l| l == "div#corePrice_feature_div span.a-offscreen"));
        assert!(locators.iter().any(|l| l == "span.offer-price"));
    }

    #[test]
    fn test_computed_discount_never_reads_the_page() {
        let profile = SiteProfile::amazon();
        let spec = profile.spec(Field::Discount).unwrap();
        let fallback = spec.fallback.as_ref().unwrap();
        assert!(fallback.locators().is_empty());
        assert_eq!(fallback.apply("https://www.amazon.in/dp/B0", &[]), None);
        assert!(!spec.fallback_first());
    }

    #[test]
    fn test_detail_table_cleans_keys_and_skips_short_rows() {
        let table = SiteProfile::amazon().details.unwrap();
        let rows = vec![
            vec!["Brand \u{200f}:\u{200e}".to_string(), " Acme ".to_string()],
            vec!["Lonely cell".to_string()],
            vec![":".to_string(), "no key".to_string()],
            vec![
                "Item Weight :".to_string(),
                "1.2  kg".to_string(),
                "ignored".to_string(),
            ],
        ];
        let got = table.collect(rows);
        assert_eq!(got.len(), 2);
        assert_eq!(got["Brand"], "Acme");
        assert_eq!(got["Item Weight"], "1.2 kg");
        assert!(SiteProfile::flipkart().details.is_none());
    }
}

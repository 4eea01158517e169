//! Semantic product fields and the per-request field map.

use crate::price::discount_label;
use crate::site::{Fallback, FieldSpec, SiteProfile};
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

/// A semantic product field a backend can be contracted to extract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Field {
    Name,
    Title,
    Price,
    Mrp,
    Discount,
    Rating,
    Availability,
}

impl Field {
    /// Wire key used in `product_info`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Title => "title",
            Self::Price => "price",
            Self::Mrp => "mrp",
            Self::Discount => "discount",
            Self::Rating => "rating",
            Self::Availability => "availability",
        }
    }

    /// Human label used in envelope messages.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Name => "Name",
            Self::Title => "Name",
            Self::Price => "Price",
            Self::Mrp => "MRP",
            Self::Discount => "Discount",
            Self::Rating => "Rating",
            Self::Availability => "Availability",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Extracted text, or the sentinel substituted when every attempt missed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Found(String),
    Missing(&'static str),
}

impl FieldValue {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Found(text) => text,
            Self::Missing(sentinel) => sentinel,
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, Self::Found(_))
    }
}

impl Serialize for FieldValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// The complete set of fields produced by one backend invocation.
///
/// Only [`FieldMapBuilder::finish`] constructs one, and it guarantees that
/// every field the site profile contracts is present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldMap {
    entries: BTreeMap<Field, FieldValue>,
    #[serde(skip)]
    details: BTreeMap<String, String>,
}

impl FieldMap {
    pub fn get(&self, field: Field) -> Option<&FieldValue> {
        self.entries.get(&field)
    }

    /// Text for a field, whether extracted or sentinel.
    pub fn text(&self, field: Field) -> Option<&str> {
        self.entries.get(&field).map(FieldValue::as_str)
    }

    pub fn is_found(&self, field: Field) -> bool {
        self.entries.get(&field).is_some_and(FieldValue::is_found)
    }

    pub fn found_count(&self) -> usize {
        self.entries.values().filter(|v| v.is_found()).count()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Field, &FieldValue)> {
        self.entries.iter().map(|(f, v)| (*f, v))
    }

    /// Product-details table, empty when the site has none.
    pub fn details(&self) -> &BTreeMap<String, String> {
        &self.details
    }
}

/// Accumulates field results while a backend runs.
#[derive(Debug, Default)]
pub struct FieldMapBuilder {
    entries: BTreeMap<Field, FieldValue>,
    details: BTreeMap<String, String>,
}

impl FieldMapBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the outcome of one field spec: the extracted text, or the
    /// spec's sentinel when nothing matched.
    pub fn record(&mut self, spec: &FieldSpec, value: Option<String>) -> &mut Self {
        let value = match value {
            Some(text) => FieldValue::Found(text),
            None => FieldValue::Missing(spec.sentinel),
        };
        self.entries.insert(spec.field, value);
        self
    }

    pub fn details(&mut self, details: BTreeMap<String, String>) -> &mut Self {
        self.details = details;
        self
    }

    fn found(&self, field: Field) -> Option<&str> {
        match self.entries.get(&field) {
            Some(FieldValue::Found(text)) => Some(text.as_str()),
            _ => None,
        }
    }

    /// Freeze the map. Derived fields are computed from what was found;
    /// any contracted field still without a value gets its sentinel.
    pub fn finish(mut self, profile: &SiteProfile) -> FieldMap {
        for spec in &profile.fields {
            if self.found(spec.field).is_some() {
                continue;
            }
            let derived = match &spec.fallback {
                Some(Fallback::ComputedDiscount { price, mrp }) => self
                    .found(*price)
                    .zip(self.found(*mrp))
                    .and_then(|(price, mrp)| discount_label(price, mrp)),
                _ => None,
            };
            match derived {
                Some(text) => {
                    self.entries.insert(spec.field, FieldValue::Found(text));
                }
                None => {
                    self.entries
                        .entry(spec.field)
                        .or_insert(FieldValue::Missing(spec.sentinel));
                }
            }
        }
        FieldMap {
            entries: self.entries,
            details: self.details,
        }
    }
}

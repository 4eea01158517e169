//! pricescout-core: selector fallback chains, URL-keyed disambiguation,
//! and the per-site field tables used by every extraction backend.
//!
//! Nothing in this crate performs I/O. Backends feed it lookups (live DOM
//! queries or a parsed document) and get back a complete [`FieldMap`].

pub mod disambiguation;
pub mod error;
pub mod fields;
pub mod price;
pub mod selector;
pub mod site;

pub use disambiguation::{extract_fragment, select, Disambiguation, DisambiguationPolicy};
pub use error::{ScoutResult, ScrapeError};
pub use fields::{Field, FieldMap, FieldMapBuilder, FieldValue};
pub use price::{discount_label, largest_price, parse_rupees};
pub use selector::{normalize_text, SelectorChain};
pub use site::{DetailTable, ElementSnapshot, Fallback, FieldSpec, Site, SiteProfile, ValueCheck};

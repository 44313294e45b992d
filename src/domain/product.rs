//! Canonical product - the normalized, platform-agnostic import unit
//!
//! Produced by the mapper from one raw record, consumed by the batch
//! importer. Collections are BTree-backed so that mapping the same record
//! always yields a bit-identical product.

use std::collections::{BTreeMap, BTreeSet};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::schema::MetafieldRef;

/// A typed metafield value, coerced during mapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetafieldValue {
    Text(String),
    Integer(i64),
    Decimal(Decimal),
    Rating { value: Decimal, scale_max: Decimal },
}

impl MetafieldValue {
    /// Platform value-type string, matching the definition kinds in
    /// [`crate::domain::schema::FieldKind`].
    pub fn platform_type(&self) -> &'static str {
        match self {
            Self::Text(_) => "single_line_text_field",
            Self::Integer(_) => "number_integer",
            Self::Decimal(_) => "number_decimal",
            Self::Rating { .. } => "rating",
        }
    }

    /// Wire encoding of the value. Ratings serialize as the platform's JSON
    /// scale object; everything else is the plain string form.
    pub fn platform_value(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Integer(number) => number.to_string(),
            Self::Decimal(number) => number.to_string(),
            Self::Rating { value, scale_max } => serde_json::json!({
                "value": value.to_string(),
                "scale_min": "0",
                "scale_max": scale_max.to_string(),
            })
            .to_string(),
        }
    }
}

/// The normalized product ready for import.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalProduct {
    /// Stable key used for upsert matching. Required, unique within a run.
    pub identifier: String,
    pub title: String,
    /// URL slug derived from the title.
    pub handle: String,
    pub price: Decimal,
    pub compare_at_price: Option<Decimal>,
    pub vendor: Option<String>,
    pub description: Option<String>,
    pub tags: BTreeSet<String>,
    pub image_url: Option<String>,
    pub metafields: BTreeMap<MetafieldRef, MetafieldValue>,
    /// Collection handles derived from breadcrumbs/category path.
    pub collection_hints: BTreeSet<String>,
}

impl CanonicalProduct {
    /// Metafield references carried by this product.
    pub fn metafield_refs(&self) -> impl Iterator<Item = &MetafieldRef> {
        self.metafields.keys()
    }

    /// Rendered HTML body for the store listing: one paragraph per
    /// description line, with a tasting-notes paragraph when present.
    /// Used both when creating remotely and when diffing against the
    /// remote body.
    pub fn body_html(&self) -> Option<String> {
        let mut parts: Vec<String> = Vec::new();
        if let Some(description) = &self.description {
            for line in description.lines().map(str::trim).filter(|l| !l.is_empty()) {
                parts.push(format!("<p>{line}</p>"));
            }
        }
        if let Some(MetafieldValue::Text(notes)) =
            self.metafields.get(&MetafieldRef::new("wine", "tasting_notes"))
        {
            parts.push(format!("<p><strong>Tasting Notes:</strong> {notes}</p>"));
        }
        if parts.is_empty() {
            None
        } else {
            Some(parts.join("\n"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn rating_encodes_as_scale_object() {
        let rating = MetafieldValue::Rating {
            value: dec!(4.5),
            scale_max: dec!(5),
        };
        let value: serde_json::Value = serde_json::from_str(&rating.platform_value()).unwrap();
        assert_eq!(value["value"], "4.5");
        assert_eq!(value["scale_max"], "5");
        assert_eq!(rating.platform_type(), "rating");
    }

    #[test]
    fn integer_keeps_plain_string_form() {
        let value = MetafieldValue::Integer(2022);
        assert_eq!(value.platform_value(), "2022");
        assert_eq!(value.platform_type(), "number_integer");
    }
}

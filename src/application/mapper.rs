//! Field mapper - raw record to canonical product
//!
//! Pure function of its inputs: resolves each schema declaration against the
//! record's columns, coerces values to their declared kinds, and derives the
//! presentation fields (handle, tags, collection hints). A record that fails
//! mapping is skipped; it never aborts the batch.

use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;
use thiserror::Error;

use crate::domain::product::{CanonicalProduct, MetafieldValue};
use crate::domain::record::RawRecord;
use crate::domain::schema::{FieldKind, FieldSchema, FieldTarget, MetafieldRef, StandardField};

/// Currency symbols, grouping separators and unit decoration stripped before
/// numeric parsing ("$1,299.00", "14.5 %").
static NUMERIC_DECOR: Lazy<Regex> = Lazy::new(|| Regex::new(r"[$,%\s]").unwrap());

/// Leading "value" or "value/scale" of a rating string ("4.5/5", "92 points").
static RATING_SHAPE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(\d+(?:\.\d+)?)\s*(?:/\s*(\d+(?:\.\d+)?))?").unwrap());

/// Why a single record could not be mapped.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MappingError {
    #[error("required field '{field}' has no matching column")]
    MissingRequiredField { field: String },

    #[error("field '{field}' value '{raw_value}' is not a valid {kind}")]
    TypeCoercion {
        field: String,
        raw_value: String,
        kind: FieldKind,
    },
}

impl MappingError {
    fn missing(field: &str) -> Self {
        Self::MissingRequiredField {
            field: field.to_string(),
        }
    }

    fn coercion(field: &str, raw_value: &str, kind: FieldKind) -> Self {
        Self::TypeCoercion {
            field: field.to_string(),
            raw_value: raw_value.to_string(),
            kind,
        }
    }
}

/// Map one raw record into a canonical product using the given schema.
///
/// Alias lists are tried in order; the first matching column wins. Columns
/// the schema does not declare are ignored, so new scraped fields never
/// break an existing schema.
pub fn map_record(raw: &RawRecord, schema: &FieldSchema) -> Result<CanonicalProduct, MappingError> {
    let mut identifier = None;
    let mut title = None;
    let mut price = None;
    let mut compare_at_price = None;
    let mut vendor = None;
    let mut description = None;
    let mut image_url = None;
    let mut tags: BTreeSet<String> = BTreeSet::new();
    let mut collection_hints: BTreeSet<String> = BTreeSet::new();
    let mut metafields: BTreeMap<MetafieldRef, MetafieldValue> = BTreeMap::new();

    for decl in &schema.fields {
        let Some(value) = raw.resolve(&decl.aliases) else {
            if decl.required {
                return Err(MappingError::missing(&decl.name));
            }
            continue;
        };
        let value = value.trim();

        match &decl.target {
            FieldTarget::Standard { field } => match field {
                StandardField::Identifier => identifier = Some(value.to_string()),
                StandardField::Title => title = Some(value.to_string()),
                StandardField::Price => {
                    price = Some(parse_decimal(value).ok_or_else(|| {
                        MappingError::coercion(&decl.name, value, FieldKind::Decimal)
                    })?);
                }
                StandardField::CompareAtPrice => {
                    compare_at_price = Some(parse_decimal(value).ok_or_else(|| {
                        MappingError::coercion(&decl.name, value, FieldKind::Decimal)
                    })?);
                }
                StandardField::Vendor => vendor = Some(value.to_string()),
                StandardField::Description => description = Some(value.to_string()),
                StandardField::ImageUrl => image_url = validate_image_url(value),
                StandardField::Tags => {
                    tags.extend(
                        value
                            .split(',')
                            .map(str::trim)
                            .filter(|t| !t.is_empty())
                            .map(ToString::to_string),
                    );
                }
                StandardField::CategoryPath => {
                    collection_hints.extend(category_hints(value));
                }
            },
            FieldTarget::Metafield { namespace, key, kind } => {
                let coerced = coerce(value, *kind)
                    .ok_or_else(|| MappingError::coercion(&decl.name, value, *kind))?;
                metafields.insert(MetafieldRef::new(namespace, key), coerced);
            }
        }

        if decl.tag {
            tags.insert(value.to_string());
        }
    }

    let identifier = identifier.ok_or_else(|| MappingError::missing("identifier"))?;
    let title = title.ok_or_else(|| MappingError::missing("title"))?;
    let price = price.ok_or_else(|| MappingError::missing("price"))?;

    // A compare-at price that is not strictly above the selling price is a
    // fake discount; drop it rather than publish it.
    let compare_at_price = compare_at_price.filter(|compare_at| *compare_at > price);

    tags.insert(price_band_tag(price).to_string());

    Ok(CanonicalProduct {
        handle: slugify(&title),
        identifier,
        title,
        price,
        compare_at_price,
        vendor,
        description,
        tags,
        image_url,
        metafields,
        collection_hints,
    })
}

/// Coerce a raw string to the declared metafield kind.
fn coerce(value: &str, kind: FieldKind) -> Option<MetafieldValue> {
    match kind {
        FieldKind::Text => Some(MetafieldValue::Text(value.to_string())),
        FieldKind::Integer => parse_integer(value).map(MetafieldValue::Integer),
        FieldKind::Decimal => parse_decimal(value).map(MetafieldValue::Decimal),
        FieldKind::Rating => parse_rating(value),
    }
}

fn parse_integer(value: &str) -> Option<i64> {
    let cleaned = NUMERIC_DECOR.replace_all(value, "");
    cleaned.parse::<i64>().ok()
}

fn parse_decimal(value: &str) -> Option<Decimal> {
    let cleaned = NUMERIC_DECOR.replace_all(value, "");
    if cleaned.is_empty() {
        return None;
    }
    Decimal::from_str(&cleaned).ok()
}

/// Ratings arrive as "4.5/5", "4.5 / 5" or a bare score like "92". Bare
/// values up to 5 are read on a 5-point scale, larger ones on a 100-point
/// critic scale.
fn parse_rating(value: &str) -> Option<MetafieldValue> {
    let captures = RATING_SHAPE.captures(value)?;
    let score = Decimal::from_str(captures.get(1)?.as_str()).ok()?;
    let scale_max = match captures.get(2) {
        Some(scale) => Decimal::from_str(scale.as_str()).ok()?,
        None if score <= Decimal::from(5) => Decimal::from(5),
        None => Decimal::from(100),
    };
    if scale_max.is_zero() || score > scale_max {
        return None;
    }
    Some(MetafieldValue::Rating {
        value: score,
        scale_max,
    })
}

/// URL slug from a title: lowercase, non-alphanumeric runs collapsed to a
/// single dash.
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_dash = false;
    for ch in text.chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(ch.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }
    slug
}

/// Collection hints from a breadcrumb/category path like
/// "Wine > Red Wines > Cabernet Sauvignon".
fn category_hints(path: &str) -> BTreeSet<String> {
    path.split(['>', '/', '|'])
        .map(str::trim)
        .filter(|segment| !segment.is_empty() && !segment.eq_ignore_ascii_case("home"))
        .map(slugify)
        .filter(|slug| !slug.is_empty())
        .collect()
}

fn price_band_tag(price: Decimal) -> &'static str {
    if price < Decimal::from(25) {
        "Under $25"
    } else if price < Decimal::from(50) {
        "$25-$50"
    } else {
        "Premium ($50+)"
    }
}

/// Only http(s) URLs pointing at a raster image are attached.
fn validate_image_url(value: &str) -> Option<String> {
    let parsed = url::Url::parse(value).ok()?;
    if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
        return None;
    }
    let path = parsed.path().to_ascii_lowercase();
    const EXTENSIONS: [&str; 5] = [".jpg", ".jpeg", ".png", ".webp", ".gif"];
    EXTENSIONS
        .iter()
        .any(|ext| path.ends_with(ext))
        .then(|| value.to_string())
}

//! Field schema and store-schema declarations
//!
//! A [`FieldSchema`] drives the mapper: each declaration names the canonical
//! field, the CSV column aliases that may carry it, whether it is required,
//! and whether it lands on a standard product attribute or a namespaced
//! metafield. [`MetafieldDefinition`] and [`CollectionRule`] are the
//! provisioning side of the same configuration: the custom-field definitions
//! and collection rules the store must have before any import runs.
//!
//! All types deserialize with serde so the schema source stays
//! format-agnostic (the CLI ships JSON, tests build them in code).

use std::fmt;

use serde::{Deserialize, Serialize};

/// Value kind a field is coerced to during mapping. Doubles as the metafield
/// definition type on the provisioning side.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    #[default]
    Text,
    Integer,
    Decimal,
    Rating,
}

impl FieldKind {
    /// Shopify metafield type string for this kind.
    pub fn as_platform_type(self) -> &'static str {
        match self {
            Self::Text => "single_line_text_field",
            Self::Integer => "number_integer",
            Self::Decimal => "number_decimal",
            Self::Rating => "rating",
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Text => "text",
            Self::Integer => "integer",
            Self::Decimal => "decimal",
            Self::Rating => "rating",
        };
        f.write_str(name)
    }
}

/// Standard product attributes a field can map onto.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StandardField {
    /// Stable upsert key (SKU or source URL).
    Identifier,
    Title,
    Price,
    CompareAtPrice,
    Vendor,
    Description,
    ImageUrl,
    /// Comma-separated tag list.
    Tags,
    /// Breadcrumb/category path, split into collection hints.
    CategoryPath,
}

/// Where a declared field lands on the canonical product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldTarget {
    Standard { field: StandardField },
    Metafield {
        namespace: String,
        key: String,
        #[serde(default)]
        kind: FieldKind,
    },
}

/// One field declaration of a [`FieldSchema`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDecl {
    pub name: String,
    /// Column aliases tried in order against the raw record.
    pub aliases: Vec<String>,
    #[serde(default)]
    pub required: bool,
    /// Also emit the resolved value as a product tag (descriptive fields
    /// like wine type or region double as browse tags).
    #[serde(default)]
    pub tag: bool,
    pub target: FieldTarget,
}

impl FieldDecl {
    pub fn standard(name: &str, aliases: &[&str], required: bool, field: StandardField) -> Self {
        Self {
            name: name.to_string(),
            aliases: aliases.iter().map(ToString::to_string).collect(),
            required,
            tag: false,
            target: FieldTarget::Standard { field },
        }
    }

    pub fn metafield(name: &str, aliases: &[&str], namespace: &str, key: &str, kind: FieldKind) -> Self {
        Self {
            name: name.to_string(),
            aliases: aliases.iter().map(ToString::to_string).collect(),
            required: false,
            tag: false,
            target: FieldTarget::Metafield {
                namespace: namespace.to_string(),
                key: key.to_string(),
                kind,
            },
        }
    }

    pub fn with_tag(mut self) -> Self {
        self.tag = true;
        self
    }
}

/// Ordered field declarations for one product type. Loaded once per run and
/// immutable afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSchema {
    pub product_type: String,
    pub fields: Vec<FieldDecl>,
}

impl FieldSchema {
    /// Metafield references declared by this schema, in declaration order.
    pub fn metafield_refs(&self) -> Vec<MetafieldRef> {
        self.fields
            .iter()
            .filter_map(|decl| match &decl.target {
                FieldTarget::Metafield { namespace, key, .. } => {
                    Some(MetafieldRef::new(namespace, key))
                }
                FieldTarget::Standard { .. } => None,
            })
            .collect()
    }
}

/// Natural key of a metafield: namespace + key. Serializes as the dotted
/// `namespace.key` form so it can key JSON maps.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MetafieldRef {
    pub namespace: String,
    pub key: String,
}

impl MetafieldRef {
    pub fn new(namespace: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            key: key.into(),
        }
    }
}

impl Serialize for MetafieldRef {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for MetafieldRef {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.split_once('.')
            .filter(|(namespace, key)| !namespace.is_empty() && !key.is_empty())
            .map(|(namespace, key)| Self::new(namespace, key))
            .ok_or_else(|| serde::de::Error::custom("expected 'namespace.key'"))
    }
}

impl fmt::Display for MetafieldRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.namespace, self.key)
    }
}

/// A custom-field definition the store must carry before import.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetafieldDefinition {
    pub namespace: String,
    pub key: String,
    /// Display name shown in the store admin.
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub kind: FieldKind,
}

impl MetafieldDefinition {
    pub fn new(namespace: &str, key: &str, name: &str, description: &str, kind: FieldKind) -> Self {
        Self {
            namespace: namespace.to_string(),
            key: key.to_string(),
            name: name.to_string(),
            description: description.to_string(),
            kind,
        }
    }

    pub fn reference(&self) -> MetafieldRef {
        MetafieldRef::new(&self.namespace, &self.key)
    }
}

/// Condition of an automated collection rule, in platform rule vocabulary
/// (e.g. `variant_price less_than 20`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleCondition {
    pub column: String,
    pub relation: String,
    pub condition: String,
}

impl RuleCondition {
    pub fn new(column: &str, relation: &str, condition: &str) -> Self {
        Self {
            column: column.to_string(),
            relation: relation.to_string(),
            condition: condition.to_string(),
        }
    }
}

/// How a collection gathers its members.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectionKind {
    /// Membership set explicitly per product.
    Manual,
    /// Membership decided by the platform from rule conditions.
    Automated {
        conditions: Vec<RuleCondition>,
        #[serde(default)]
        disjunctive: bool,
    },
}

/// A collection the store must carry before import. The title is the natural
/// key used for existence matching; remote numeric ids from prior runs are
/// never trusted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionRule {
    pub title: String,
    pub handle: String,
    pub kind: CollectionKind,
}

impl CollectionRule {
    pub fn manual(title: &str, handle: &str) -> Self {
        Self {
            title: title.to_string(),
            handle: handle.to_string(),
            kind: CollectionKind::Manual,
        }
    }

    pub fn automated(title: &str, handle: &str, conditions: Vec<RuleCondition>) -> Self {
        Self {
            title: title.to_string(),
            handle: handle.to_string(),
            kind: CollectionKind::Automated {
                conditions,
                disjunctive: false,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_round_trips_through_json() {
        let schema = FieldSchema {
            product_type: "wine".to_string(),
            fields: vec![
                FieldDecl::standard("title", &["Name", "Title"], true, StandardField::Title),
                FieldDecl::metafield("vintage", &["Vintage"], "wine", "vintage", FieldKind::Integer),
            ],
        };
        let json = serde_json::to_string(&schema).unwrap();
        let back: FieldSchema = serde_json::from_str(&json).unwrap();
        assert_eq!(back, schema);
    }

    #[test]
    fn metafield_refs_follow_declaration_order() {
        let schema = FieldSchema {
            product_type: "wine".to_string(),
            fields: vec![
                FieldDecl::metafield("vintage", &["Vintage"], "wine", "vintage", FieldKind::Integer),
                FieldDecl::standard("title", &["Name"], true, StandardField::Title),
                FieldDecl::metafield("region", &["Region"], "wine", "region", FieldKind::Text),
            ],
        };
        let refs = schema.metafield_refs();
        assert_eq!(refs.len(), 2);
        assert_eq!(refs[0].to_string(), "wine.vintage");
        assert_eq!(refs[1].to_string(), "wine.region");
    }

    #[test]
    fn metafield_ref_serializes_as_dotted_key() {
        let reference = MetafieldRef::new("wine", "vintage");
        let json = serde_json::to_string(&reference).unwrap();
        assert_eq!(json, "\"wine.vintage\"");
        let back: MetafieldRef = serde_json::from_str(&json).unwrap();
        assert_eq!(back, reference);
        assert!(serde_json::from_str::<MetafieldRef>("\"no-namespace\"").is_err());
    }

    #[test]
    fn unknown_kind_defaults_to_text() {
        let json = r#"{"name":"style","aliases":["Style"],"target":{"metafield":{"namespace":"wine","key":"style"}}}"#;
        let decl: FieldDecl = serde_json::from_str(json).unwrap();
        match decl.target {
            FieldTarget::Metafield { kind, .. } => assert_eq!(kind, FieldKind::Text),
            FieldTarget::Standard { .. } => panic!("expected metafield target"),
        }
    }
}

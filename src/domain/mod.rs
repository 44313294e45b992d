//! Domain module - core entities and value objects of the import pipeline
//!
//! Everything here is platform-agnostic: raw records as scraped, the field
//! schema that drives mapping, the canonical product representation, and the
//! per-product import outcome.

pub mod outcome;
pub mod product;
pub mod record;
pub mod schema;
pub mod wine_catalog;

// Re-export commonly used items
pub use outcome::{ImportOutcome, ImportStatus};
pub use product::{CanonicalProduct, MetafieldValue};
pub use record::RawRecord;
pub use schema::{
    CollectionKind, CollectionRule, FieldDecl, FieldKind, FieldSchema, FieldTarget,
    MetafieldDefinition, MetafieldRef, RuleCondition, StandardField,
};

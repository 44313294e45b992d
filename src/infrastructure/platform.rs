//! Platform port - the remote operations the pipeline depends on
//!
//! The importer and provisioner talk to the store exclusively through
//! [`PlatformApi`]; the Shopify client implements it over the Admin REST
//! API and the tests implement it in memory. [`ApiError`] carries the
//! error classification the retry loop needs: rate-limit signals are
//! distinguishable from other transient classes, and transient from
//! permanent.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::product::{CanonicalProduct, MetafieldValue};
use crate::domain::schema::{CollectionRule, MetafieldDefinition, MetafieldRef};

/// Error classes a platform call can produce.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    #[error("rate limited by platform")]
    RateLimited { retry_after: Option<Duration> },

    #[error("request timed out: {context}")]
    Timeout { context: String },

    #[error("server error {status}: {message}")]
    Server { status: u16, message: String },

    #[error("network error: {message}")]
    Network { message: String },

    #[error("validation rejected: {message}")]
    Validation { message: String },

    #[error("authentication failed ({status}): {message}")]
    Auth { status: u16, message: String },

    #[error("client error {status}: {message}")]
    Http { status: u16, message: String },

    #[error("unexpected response shape: {message}")]
    Decode { message: String },
}

impl ApiError {
    /// Transient errors are retried with backoff; everything else is
    /// recorded as a permanent failure.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::RateLimited { .. } | Self::Timeout { .. } | Self::Server { .. } | Self::Network { .. }
        )
    }

    /// Server-provided floor on the next retry delay, if any.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }

    /// Authentication failures abort the whole run, not just one item.
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Auth { .. })
    }
}

/// What the platform can do, as far as the importer cares.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PlatformCapabilities {
    /// Whether single metafields can be written without replacing the whole
    /// set. Shopify supports it; platforms that do not get a full replace.
    pub partial_metafield_updates: bool,
}

impl Default for PlatformCapabilities {
    fn default() -> Self {
        Self {
            partial_metafield_updates: true,
        }
    }
}

/// The remote product state relevant for diffing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteProduct {
    pub id: String,
    pub variant_id: Option<String>,
    pub title: String,
    pub vendor: Option<String>,
    pub body_html: Option<String>,
    pub tags: BTreeSet<String>,
    pub price: Option<Decimal>,
    pub compare_at_price: Option<Decimal>,
    pub has_image: bool,
    pub metafields: BTreeMap<MetafieldRef, MetafieldValue>,
    /// Remote-side ids of the fetched metafields, needed for per-key
    /// updates. Platforms without per-key writes leave this empty.
    pub metafield_ids: BTreeMap<MetafieldRef, String>,
}

/// Field-level changes to apply to an existing product. `None` means
/// unchanged; fields are never cleared, only overwritten.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductPatch {
    pub title: Option<String>,
    pub vendor: Option<String>,
    pub body_html: Option<String>,
    pub tags: Option<BTreeSet<String>>,
    pub price: Option<Decimal>,
    pub compare_at_price: Option<Decimal>,
    /// Attached only when the remote product has no image yet.
    pub image_url: Option<String>,
    /// Metafields to write. With partial updates this holds only changed
    /// keys; otherwise the full desired set.
    pub metafields: Vec<(MetafieldRef, MetafieldValue)>,
    /// Collection handles whose membership is ensured alongside the update.
    /// Membership is idempotent on the platform and not part of the diff.
    pub ensure_collections: BTreeSet<String>,
}

impl ProductPatch {
    /// True when no field-level change is pending. Collection membership is
    /// not a field change; an otherwise-identical product is `Skipped`.
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.vendor.is_none()
            && self.body_html.is_none()
            && self.tags.is_none()
            && self.price.is_none()
            && self.compare_at_price.is_none()
            && self.image_url.is_none()
            && self.metafields.is_empty()
    }
}

/// Result of an idempotent create-if-absent call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EnsureOutcome {
    Created,
    AlreadyExists,
}

/// The four remote operations the pipeline core depends on.
#[async_trait]
pub trait PlatformApi: Send + Sync {
    /// Exact-match lookup by the stable identifier (platform-indexed field).
    async fn find_by_identifier(&self, identifier: &str) -> Result<Option<RemoteProduct>, ApiError>;

    /// Create the product with all standard fields, metafields and
    /// collection memberships as one logical unit.
    async fn create_product(&self, product: &CanonicalProduct) -> Result<RemoteProduct, ApiError>;

    /// Apply a field-level patch to an existing product.
    async fn update_product(&self, remote: &RemoteProduct, patch: &ProductPatch) -> Result<(), ApiError>;

    /// Create the metafield definition unless its namespace/key already
    /// exists.
    async fn ensure_metafield_definition(
        &self,
        definition: &MetafieldDefinition,
    ) -> Result<EnsureOutcome, ApiError>;

    /// Create the collection unless one with the same title already exists.
    async fn ensure_collection_rule(&self, rule: &CollectionRule) -> Result<EnsureOutcome, ApiError>;

    fn capabilities(&self) -> PlatformCapabilities {
        PlatformCapabilities::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification() {
        assert!(ApiError::RateLimited { retry_after: None }.is_transient());
        assert!(ApiError::Timeout { context: "find".into() }.is_transient());
        assert!(ApiError::Server { status: 503, message: "unavailable".into() }.is_transient());
        assert!(!ApiError::Validation { message: "title required".into() }.is_transient());
        assert!(!ApiError::Auth { status: 401, message: "bad token".into() }.is_transient());
        assert!(!ApiError::Http { status: 404, message: "gone".into() }.is_transient());
    }

    #[test]
    fn retry_after_only_from_rate_limit() {
        let limited = ApiError::RateLimited {
            retry_after: Some(Duration::from_secs(7)),
        };
        assert_eq!(limited.retry_after(), Some(Duration::from_secs(7)));
        assert_eq!(
            ApiError::Server { status: 500, message: String::new() }.retry_after(),
            None,
        );
    }

    #[test]
    fn empty_patch_ignores_collection_membership() {
        let patch = ProductPatch {
            ensure_collections: ["red-wines".to_string()].into_iter().collect(),
            ..ProductPatch::default()
        };
        assert!(patch.is_empty());
    }
}

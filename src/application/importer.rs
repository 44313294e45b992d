//! Batch importer - per-product upsert against the platform
//!
//! Processes an ordered product sequence with bounded concurrency. Each
//! product is looked up by its stable identifier and either created with all
//! fields in one logical unit or patched with only the changed fields, so
//! that running the same input twice converges instead of duplicating.
//! Transient platform errors are retried with exponential backoff; permanent
//! ones are recorded and never abort the batch. Only a schema-precondition
//! violation or an authentication failure aborts the whole run.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::domain::outcome::{ImportOutcome, ImportStatus};
use crate::domain::product::CanonicalProduct;
use crate::domain::schema::MetafieldRef;
use crate::infrastructure::platform::{
    ApiError, PlatformApi, PlatformCapabilities, ProductPatch, RemoteProduct,
};

/// Knobs for one import run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportOptions {
    /// Maximum in-flight product imports.
    pub concurrency: usize,
    /// Total attempts per platform call (first try included).
    pub max_retries: u32,
    pub base_backoff_ms: u64,
    pub max_backoff_ms: u64,
    /// Report `Skipped` instead of `Updated` when the diff is empty.
    pub skip_unchanged: bool,
    /// Keep going after a permanent per-product failure.
    pub continue_on_error: bool,
    /// Perform lookups and diffs but no mutations.
    pub dry_run: bool,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            concurrency: 1,
            max_retries: 3,
            base_backoff_ms: 500,
            max_backoff_ms: 30_000,
            skip_unchanged: true,
            continue_on_error: true,
            dry_run: false,
        }
    }
}

/// Run-level failures. Per-product errors never surface here; they are
/// recorded in the product's outcome instead.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ImportError {
    #[error("metafield {reference} referenced by '{identifier}' is not provisioned")]
    SchemaPrecondition {
        reference: MetafieldRef,
        identifier: String,
    },

    #[error("duplicate product identifier '{identifier}' in input")]
    DuplicateIdentifier { identifier: String },

    #[error("authentication with the platform failed: {detail}")]
    Auth { detail: String },

    #[error("import task aborted: {detail}")]
    TaskPanic { detail: String },
}

/// Sequential or bounded-parallel upsert pipeline.
pub struct BatchImporter {
    api: Arc<dyn PlatformApi>,
    provisioned: BTreeSet<MetafieldRef>,
    options: ImportOptions,
}

impl BatchImporter {
    pub fn new(api: Arc<dyn PlatformApi>, provisioned: BTreeSet<MetafieldRef>, options: ImportOptions) -> Self {
        Self {
            api,
            provisioned,
            options,
        }
    }

    /// Import the product sequence, returning one outcome per dispatched
    /// product in input order.
    ///
    /// Cancelling `cancel` stops dispatch of further products; in-flight
    /// imports run to completion and their outcomes are recorded.
    pub async fn import(
        &self,
        products: Vec<CanonicalProduct>,
        cancel: &CancellationToken,
    ) -> Result<Vec<ImportOutcome>, ImportError> {
        self.check_preconditions(&products)?;

        let total = products.len();
        let capabilities = self.api.capabilities();
        if self.options.dry_run {
            info!("🔍 Dry run: {total} products, no mutations will be issued");
        } else {
            info!("📦 Importing {total} products (concurrency {})", self.options.concurrency.max(1));
        }

        // Dispatch stops when the caller cancels or, with
        // continue_on_error off, when any task records a failure.
        let dispatch = cancel.child_token();
        let semaphore = Arc::new(Semaphore::new(self.options.concurrency.max(1)));
        let mut tasks = Vec::with_capacity(total);

        for (index, product) in products.into_iter().enumerate() {
            if dispatch.is_cancelled() {
                warn!("🛑 Cancelled; not dispatching remaining {} products", total - index);
                break;
            }
            let permit = tokio::select! {
                permit = Arc::clone(&semaphore).acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
                _ = dispatch.cancelled() => {
                    warn!("🛑 Cancelled; not dispatching remaining {} products", total - index);
                    break;
                }
            };
            // A failing task cancels before it releases its permit, so this
            // re-check keeps stop-on-first-failure deterministic.
            if dispatch.is_cancelled() {
                warn!("🛑 Cancelled; not dispatching remaining {} products", total - index);
                break;
            }

            let api = Arc::clone(&self.api);
            let options = self.options.clone();
            let dispatch = dispatch.clone();
            tasks.push(tokio::spawn(async move {
                let _permit = permit;
                let result = import_one(api, &options, capabilities, &product, index, total).await;
                match &result {
                    Ok(outcome) if outcome.is_failure() && !options.continue_on_error => {
                        dispatch.cancel();
                    }
                    Err(_) => dispatch.cancel(),
                    Ok(_) => {}
                }
                result
            }));
        }

        // Join in dispatch order so outcomes line up with the input.
        let mut outcomes = Vec::with_capacity(tasks.len());
        let mut run_error = None;
        for task in tasks {
            match task.await {
                Ok(Ok(outcome)) => outcomes.push(outcome),
                Ok(Err(error)) => run_error = run_error.or(Some(error)),
                Err(join_error) => {
                    run_error = run_error.or(Some(ImportError::TaskPanic {
                        detail: join_error.to_string(),
                    }));
                }
            }
        }

        match run_error {
            Some(error) => Err(error),
            None => Ok(outcomes),
        }
    }

    /// Fatal gate before any remote call: every referenced metafield must be
    /// provisioned and identifiers must be unique within the run.
    fn check_preconditions(&self, products: &[CanonicalProduct]) -> Result<(), ImportError> {
        let mut seen = BTreeSet::new();
        for product in products {
            if !seen.insert(product.identifier.as_str()) {
                return Err(ImportError::DuplicateIdentifier {
                    identifier: product.identifier.clone(),
                });
            }
            for reference in product.metafield_refs() {
                if !self.provisioned.contains(reference) {
                    return Err(ImportError::SchemaPrecondition {
                        reference: reference.clone(),
                        identifier: product.identifier.clone(),
                    });
                }
            }
        }
        Ok(())
    }
}

/// Upsert a single product. Returns `Err` only for run-aborting conditions
/// (authentication); every other error lands in the outcome.
async fn import_one(
    api: Arc<dyn PlatformApi>,
    options: &ImportOptions,
    capabilities: PlatformCapabilities,
    product: &CanonicalProduct,
    index: usize,
    total: usize,
) -> Result<ImportOutcome, ImportError> {
    let identifier = product.identifier.as_str();
    let position = index + 1;

    let existing = match with_retries(options, identifier, || api.find_by_identifier(identifier)).await {
        Ok(existing) => existing,
        Err(error) => return record_failure(identifier, position, total, error),
    };

    match existing {
        Some(remote) => {
            let patch = build_patch(product, &remote, capabilities);
            if patch.is_empty() {
                let status = if options.skip_unchanged {
                    debug!("⏭️ [{position}/{total}] Unchanged: {identifier}");
                    ImportStatus::Skipped
                } else {
                    ImportStatus::Updated
                };
                return Ok(ImportOutcome::success(identifier, status, Some(remote.id)));
            }
            if options.dry_run {
                info!("🔍 [{position}/{total}] Would update: {identifier}");
                return Ok(ImportOutcome::success(identifier, ImportStatus::Updated, Some(remote.id)));
            }
            match with_retries(options, identifier, || api.update_product(&remote, &patch)).await {
                Ok(()) => {
                    info!("🔄 [{position}/{total}] Updated: {identifier}");
                    Ok(ImportOutcome::success(identifier, ImportStatus::Updated, Some(remote.id)))
                }
                Err(error) => record_failure(identifier, position, total, error),
            }
        }
        None => {
            if options.dry_run {
                info!("🔍 [{position}/{total}] Would create: {identifier}");
                return Ok(ImportOutcome::success(identifier, ImportStatus::Created, None));
            }
            match with_retries(options, identifier, || api.create_product(product)).await {
                Ok(remote) => {
                    info!("✅ [{position}/{total}] Created: {}", product.title);
                    Ok(ImportOutcome::success(identifier, ImportStatus::Created, Some(remote.id)))
                }
                Err(error) => record_failure(identifier, position, total, error),
            }
        }
    }
}

fn record_failure(
    identifier: &str,
    position: usize,
    total: usize,
    error: ApiError,
) -> Result<ImportOutcome, ImportError> {
    if error.is_auth() {
        return Err(ImportError::Auth {
            detail: error.to_string(),
        });
    }
    warn!("❌ [{position}/{total}] Failed: {identifier} - {error}");
    Ok(ImportOutcome::failed(identifier, error.to_string()))
}

/// Run a platform call with up to `max_retries` total attempts. Transient
/// errors back off exponentially with jitter; a server-provided retry-after
/// hint is a floor on the next delay, never a ceiling.
async fn with_retries<T, F, Fut>(
    options: &ImportOptions,
    identifier: &str,
    mut call: F,
) -> Result<T, ApiError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, ApiError>>,
{
    let max_attempts = options.max_retries.max(1);
    let mut attempt = 1;
    loop {
        match call().await {
            Ok(value) => return Ok(value),
            Err(error) if error.is_transient() && attempt < max_attempts => {
                let delay = backoff_delay(options, attempt, error.retry_after());
                debug!(
                    "🔁 Transient error for {identifier} (attempt {attempt}/{max_attempts}), retrying in {delay:?}: {error}",
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(error) => return Err(error),
        }
    }
}

fn backoff_delay(options: &ImportOptions, attempt: u32, floor: Option<Duration>) -> Duration {
    let shift = attempt.saturating_sub(1).min(16);
    let exponential = options.base_backoff_ms.saturating_mul(1u64 << shift);
    let jitter = fastrand::u64(..=options.base_backoff_ms.max(1) / 2);
    let mut delay_ms = exponential.saturating_add(jitter).min(options.max_backoff_ms);
    if let Some(floor) = floor {
        delay_ms = delay_ms.max(u64::try_from(floor.as_millis()).unwrap_or(u64::MAX));
    }
    Duration::from_millis(delay_ms)
}

/// Field-level diff between the desired and the remote product.
fn build_patch(
    product: &CanonicalProduct,
    remote: &RemoteProduct,
    capabilities: PlatformCapabilities,
) -> ProductPatch {
    let mut patch = ProductPatch {
        ensure_collections: product.collection_hints.clone(),
        ..ProductPatch::default()
    };

    if remote.title != product.title {
        patch.title = Some(product.title.clone());
    }
    if let Some(vendor) = &product.vendor {
        if remote.vendor.as_ref() != Some(vendor) {
            patch.vendor = Some(vendor.clone());
        }
    }
    if let Some(body_html) = product.body_html() {
        if remote.body_html.as_ref() != Some(&body_html) {
            patch.body_html = Some(body_html);
        }
    }
    if remote.tags != product.tags {
        patch.tags = Some(product.tags.clone());
    }
    if remote.price != Some(product.price) {
        patch.price = Some(product.price);
    }
    if let Some(compare_at) = product.compare_at_price {
        if remote.compare_at_price != Some(compare_at) {
            patch.compare_at_price = Some(compare_at);
        }
    }
    if let Some(image_url) = &product.image_url {
        if !remote.has_image {
            patch.image_url = Some(image_url.clone());
        }
    }

    let changed: Vec<_> = product
        .metafields
        .iter()
        .filter(|&(reference, value)| remote.metafields.get(reference) != Some(value))
        .map(|(reference, value)| (reference.clone(), value.clone()))
        .collect();
    if capabilities.partial_metafield_updates {
        patch.metafields = changed;
    } else if !changed.is_empty() {
        // Platform replaces the whole set; send every desired metafield.
        patch.metafields = product
            .metafields
            .iter()
            .map(|(reference, value)| (reference.clone(), value.clone()))
            .collect();
    }

    patch
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::product::MetafieldValue;
    use rust_decimal_macros::dec;
    use std::collections::BTreeMap;

    fn desired() -> CanonicalProduct {
        CanonicalProduct {
            identifier: "CAYM-CAB-2022".to_string(),
            title: "Caymus Cabernet".to_string(),
            handle: "caymus-cabernet".to_string(),
            price: dec!(59.99),
            compare_at_price: None,
            vendor: Some("Caymus".to_string()),
            description: None,
            tags: ["Red".to_string()].into_iter().collect(),
            image_url: None,
            metafields: BTreeMap::from([(
                MetafieldRef::new("wine", "vintage"),
                MetafieldValue::Integer(2022),
            )]),
            collection_hints: ["red-wines".to_string()].into_iter().collect(),
        }
    }

    fn matching_remote() -> RemoteProduct {
        RemoteProduct {
            id: "1001".to_string(),
            variant_id: Some("2001".to_string()),
            title: "Caymus Cabernet".to_string(),
            vendor: Some("Caymus".to_string()),
            body_html: None,
            tags: ["Red".to_string()].into_iter().collect(),
            price: Some(dec!(59.99)),
            compare_at_price: None,
            has_image: false,
            metafields: BTreeMap::from([(
                MetafieldRef::new("wine", "vintage"),
                MetafieldValue::Integer(2022),
            )]),
            metafield_ids: BTreeMap::new(),
        }
    }

    #[test]
    fn identical_products_produce_an_empty_patch() {
        let patch = build_patch(&desired(), &matching_remote(), PlatformCapabilities::default());
        assert!(patch.is_empty());
    }

    #[test]
    fn only_changed_fields_enter_the_patch() {
        let mut remote = matching_remote();
        remote.price = Some(dec!(49.99));
        remote.metafields.insert(
            MetafieldRef::new("wine", "vintage"),
            MetafieldValue::Integer(2021),
        );
        let patch = build_patch(&desired(), &remote, PlatformCapabilities::default());
        assert_eq!(patch.price, Some(dec!(59.99)));
        assert_eq!(patch.title, None);
        assert_eq!(patch.vendor, None);
        assert_eq!(patch.metafields.len(), 1);
        assert_eq!(patch.metafields[0].1, MetafieldValue::Integer(2022));
    }

    #[test]
    fn full_replace_when_partial_updates_unsupported() {
        let mut product = desired();
        product.metafields.insert(
            MetafieldRef::new("wine", "region"),
            MetafieldValue::Text("Napa Valley".to_string()),
        );
        let remote = matching_remote();
        let capabilities = PlatformCapabilities {
            partial_metafield_updates: false,
        };
        let patch = build_patch(&product, &remote, capabilities);
        // Only wine.region changed, but the whole desired set is sent.
        assert_eq!(patch.metafields.len(), 2);
    }

    #[test]
    fn image_only_attached_when_remote_has_none() {
        let mut product = desired();
        product.image_url = Some("https://cdn.example.com/wine.jpg".to_string());
        let mut remote = matching_remote();

        let patch = build_patch(&product, &remote, PlatformCapabilities::default());
        assert_eq!(patch.image_url.as_deref(), Some("https://cdn.example.com/wine.jpg"));

        remote.has_image = true;
        let patch = build_patch(&product, &remote, PlatformCapabilities::default());
        assert_eq!(patch.image_url, None);
    }

    #[test]
    fn backoff_honors_retry_after_floor() {
        let options = ImportOptions {
            base_backoff_ms: 100,
            max_backoff_ms: 1_000,
            ..ImportOptions::default()
        };
        let delay = backoff_delay(&options, 1, Some(Duration::from_secs(9)));
        assert!(delay >= Duration::from_secs(9));

        let capped = backoff_delay(&options, 10, None);
        assert!(capped <= Duration::from_millis(1_000));
    }
}

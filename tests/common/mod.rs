//! In-memory platform fake shared by the integration tests
//!
//! Stores products keyed by their variant SKU the way the real store
//! indexes them, counts every call, and plays back scripted errors so the
//! tests can exercise retry and isolation behavior without a network.

// Not every test binary uses every helper.
#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use wine_catalog_importer::domain::product::CanonicalProduct;
use wine_catalog_importer::domain::schema::{CollectionRule, MetafieldDefinition};
use wine_catalog_importer::infrastructure::platform::{
    ApiError, EnsureOutcome, PlatformApi, PlatformCapabilities, ProductPatch, RemoteProduct,
};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FakeCounts {
    pub find_calls: usize,
    pub create_calls: usize,
    pub update_calls: usize,
    pub definition_creates: usize,
    pub collection_creates: usize,
}

impl FakeCounts {
    /// Every call that would mutate the remote store.
    pub fn mutations(&self) -> usize {
        self.create_calls + self.update_calls + self.definition_creates + self.collection_creates
    }
}

#[derive(Default)]
struct FakeState {
    products: BTreeMap<String, RemoteProduct>,
    memberships: BTreeMap<String, BTreeSet<String>>,
    definitions: BTreeSet<String>,
    collections: BTreeSet<String>,
    counts: FakeCounts,
    next_id: i64,
    fail_create: HashMap<String, VecDeque<ApiError>>,
    fail_update: HashMap<String, VecDeque<ApiError>>,
    fail_definition: HashMap<String, ApiError>,
}

pub struct FakePlatform {
    state: Mutex<FakeState>,
    capabilities: PlatformCapabilities,
}

impl FakePlatform {
    pub fn new() -> Arc<Self> {
        Self::with_capabilities(PlatformCapabilities::default())
    }

    pub fn with_capabilities(capabilities: PlatformCapabilities) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(FakeState {
                next_id: 1000,
                ..FakeState::default()
            }),
            capabilities,
        })
    }

    /// Queue errors returned by successive create attempts for one product.
    pub fn fail_create(&self, identifier: &str, errors: Vec<ApiError>) {
        let mut state = self.state.lock().unwrap();
        state.fail_create.insert(identifier.to_string(), errors.into());
    }

    pub fn fail_update(&self, identifier: &str, errors: Vec<ApiError>) {
        let mut state = self.state.lock().unwrap();
        state.fail_update.insert(identifier.to_string(), errors.into());
    }

    /// Make one metafield definition fail to provision, permanently.
    pub fn fail_definition(&self, reference: &str, error: ApiError) {
        let mut state = self.state.lock().unwrap();
        state.fail_definition.insert(reference.to_string(), error);
    }

    /// Pre-populate a remote product, as if created by an earlier run.
    pub fn seed_product(&self, identifier: &str, remote: RemoteProduct) {
        let mut state = self.state.lock().unwrap();
        state.products.insert(identifier.to_string(), remote);
    }

    pub fn counts(&self) -> FakeCounts {
        self.state.lock().unwrap().counts
    }

    pub fn product(&self, identifier: &str) -> Option<RemoteProduct> {
        self.state.lock().unwrap().products.get(identifier).cloned()
    }

    pub fn memberships(&self, identifier: &str) -> BTreeSet<String> {
        self.state
            .lock()
            .unwrap()
            .memberships
            .get(identifier)
            .cloned()
            .unwrap_or_default()
    }

    pub fn definitions(&self) -> BTreeSet<String> {
        self.state.lock().unwrap().definitions.clone()
    }

    pub fn collections(&self) -> BTreeSet<String> {
        self.state.lock().unwrap().collections.clone()
    }
}

fn remote_from(product: &CanonicalProduct, id: i64) -> RemoteProduct {
    RemoteProduct {
        id: id.to_string(),
        variant_id: Some((id + 1).to_string()),
        title: product.title.clone(),
        vendor: product.vendor.clone(),
        body_html: product.body_html(),
        tags: product.tags.clone(),
        price: Some(product.price),
        compare_at_price: product.compare_at_price,
        has_image: product.image_url.is_some(),
        metafields: product.metafields.clone(),
        metafield_ids: BTreeMap::new(),
    }
}

#[async_trait]
impl PlatformApi for FakePlatform {
    async fn find_by_identifier(&self, identifier: &str) -> Result<Option<RemoteProduct>, ApiError> {
        let mut state = self.state.lock().unwrap();
        state.counts.find_calls += 1;
        Ok(state.products.get(identifier).cloned())
    }

    async fn create_product(&self, product: &CanonicalProduct) -> Result<RemoteProduct, ApiError> {
        let mut state = self.state.lock().unwrap();
        state.counts.create_calls += 1;
        if let Some(queue) = state.fail_create.get_mut(&product.identifier) {
            if let Some(error) = queue.pop_front() {
                return Err(error);
            }
        }
        state.next_id += 2;
        let remote = remote_from(product, state.next_id);
        state.products.insert(product.identifier.clone(), remote.clone());
        state
            .memberships
            .insert(product.identifier.clone(), product.collection_hints.clone());
        Ok(remote)
    }

    async fn update_product(&self, remote: &RemoteProduct, patch: &ProductPatch) -> Result<(), ApiError> {
        let mut state = self.state.lock().unwrap();
        state.counts.update_calls += 1;

        let Some(identifier) = state
            .products
            .iter()
            .find(|(_, stored)| stored.id == remote.id)
            .map(|(identifier, _)| identifier.clone())
        else {
            return Err(ApiError::Http {
                status: 404,
                message: format!("no product with id {}", remote.id),
            });
        };
        if let Some(queue) = state.fail_update.get_mut(&identifier) {
            if let Some(error) = queue.pop_front() {
                return Err(error);
            }
        }

        let stored = state.products.get_mut(&identifier).expect("looked up above");
        if let Some(title) = &patch.title {
            stored.title = title.clone();
        }
        if let Some(vendor) = &patch.vendor {
            stored.vendor = Some(vendor.clone());
        }
        if let Some(body_html) = &patch.body_html {
            stored.body_html = Some(body_html.clone());
        }
        if let Some(tags) = &patch.tags {
            stored.tags = tags.clone();
        }
        if let Some(price) = patch.price {
            stored.price = Some(price);
        }
        if let Some(compare_at) = patch.compare_at_price {
            stored.compare_at_price = Some(compare_at);
        }
        if patch.image_url.is_some() {
            stored.has_image = true;
        }
        for (reference, value) in &patch.metafields {
            stored.metafields.insert(reference.clone(), value.clone());
        }

        state
            .memberships
            .entry(identifier)
            .or_default()
            .extend(patch.ensure_collections.iter().cloned());
        Ok(())
    }

    async fn ensure_metafield_definition(
        &self,
        definition: &MetafieldDefinition,
    ) -> Result<EnsureOutcome, ApiError> {
        let mut state = self.state.lock().unwrap();
        let reference = definition.reference().to_string();
        if let Some(error) = state.fail_definition.get(&reference) {
            return Err(error.clone());
        }
        if state.definitions.contains(&reference) {
            return Ok(EnsureOutcome::AlreadyExists);
        }
        state.counts.definition_creates += 1;
        state.definitions.insert(reference);
        Ok(EnsureOutcome::Created)
    }

    async fn ensure_collection_rule(&self, rule: &CollectionRule) -> Result<EnsureOutcome, ApiError> {
        let mut state = self.state.lock().unwrap();
        if state.collections.contains(&rule.title) {
            return Ok(EnsureOutcome::AlreadyExists);
        }
        state.counts.collection_creates += 1;
        state.collections.insert(rule.title.clone());
        Ok(EnsureOutcome::Created)
    }

    fn capabilities(&self) -> PlatformCapabilities {
        self.capabilities
    }
}

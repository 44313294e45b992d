//! Shopify Admin REST implementation of the platform port
//!
//! Speaks the versioned `/admin/api/{version}/` JSON endpoints with the
//! `X-Shopify-Access-Token` header. Every call goes through the shared
//! request budget first; HTTP statuses are classified into the [`ApiError`]
//! taxonomy (429 with its Retry-After hint, 401/403 as run-aborting auth
//! errors, 5xx as transient). A 422 on provisioning endpoints means the
//! resource already exists and is reported as such, which is what makes
//! setup safe to run any number of times.

use std::collections::BTreeMap;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE, RETRY_AFTER};
use reqwest::{Method, StatusCode};
use rust_decimal::Decimal;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::domain::product::{CanonicalProduct, MetafieldValue};
use crate::domain::schema::{CollectionKind, CollectionRule, MetafieldDefinition, MetafieldRef};
use crate::infrastructure::config::ShopifyConfig;
use crate::infrastructure::platform::{
    ApiError, EnsureOutcome, PlatformApi, PlatformCapabilities, ProductPatch, RemoteProduct,
};
use crate::infrastructure::rate_limit::RequestBudget;

const ACCESS_TOKEN_HEADER: &str = "X-Shopify-Access-Token";
/// REST search window when matching variants by SKU.
const LOOKUP_PAGE_SIZE: u32 = 250;

/// Admin REST client with an embedded request budget.
pub struct ShopifyClient {
    http: reqwest::Client,
    budget: RequestBudget,
    base_url: String,
    capabilities: PlatformCapabilities,
}

impl ShopifyClient {
    pub fn new(config: &ShopifyConfig) -> Result<Self> {
        config.validate()?;

        let mut headers = HeaderMap::new();
        headers.insert(
            ACCESS_TOKEN_HEADER,
            HeaderValue::from_str(&config.access_token).context("Access token is not header-safe")?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .default_headers(headers)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            http,
            budget: RequestBudget::new(config.requests_per_second, config.burst),
            base_url: format!(
                "{}/admin/api/{}",
                config.shop_url.trim_end_matches('/'),
                config.api_version,
            ),
            capabilities: config.capabilities(),
        })
    }

    /// Issue one budgeted request. Rate-limit, auth and server errors are
    /// classified here; other statuses are returned with their body so
    /// callers can treat endpoint-specific cases like 422.
    async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<(StatusCode, Value), ApiError> {
        self.budget.acquire(1).await;

        let url = format!("{}/{}", self.base_url, path);
        let mut request = self.http.request(method, &url);
        if let Some(body) = body {
            request = request.json(&body);
        }
        let response = request.send().await.map_err(|error| classify_transport(&error, path))?;

        let status = response.status();
        let retry_after = parse_retry_after(response.headers().get(RETRY_AFTER));
        let body: Value = response.json().await.unwrap_or(Value::Null);

        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(ApiError::RateLimited { retry_after });
        }
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(ApiError::Auth {
                status: status.as_u16(),
                message: error_message(&body),
            });
        }
        if status.is_server_error() {
            return Err(ApiError::Server {
                status: status.as_u16(),
                message: error_message(&body),
            });
        }
        Ok((status, body))
    }

    async fn get(&self, path: &str) -> Result<Value, ApiError> {
        let (status, body) = self.request(Method::GET, path, None).await?;
        if status.is_success() {
            Ok(body)
        } else {
            Err(client_error(status, &body))
        }
    }

    /// Write one metafield: PUT when we know its remote id, POST otherwise.
    async fn write_metafield(
        &self,
        product_id: &str,
        remote_ids: &BTreeMap<MetafieldRef, String>,
        reference: &MetafieldRef,
        value: &MetafieldValue,
    ) -> Result<(), ApiError> {
        let payload = json!({
            "metafield": {
                "namespace": reference.namespace,
                "key": reference.key,
                "type": value.platform_type(),
                "value": value.platform_value(),
            }
        });
        let (method, path) = match remote_ids.get(reference) {
            Some(id) => (Method::PUT, format!("metafields/{id}.json")),
            None => (Method::POST, format!("products/{product_id}/metafields.json")),
        };
        let (status, body) = self.request(method, &path, Some(payload)).await?;
        if status.is_success() {
            Ok(())
        } else {
            Err(client_error(status, &body))
        }
    }

    /// Ensure the product is a member of every hinted manual collection.
    /// Hints that match no collection are skipped; a 422 on the collect
    /// means the membership already exists.
    async fn ensure_memberships(
        &self,
        product_id: &str,
        hints: impl Iterator<Item = &str>,
    ) -> Result<(), ApiError> {
        for handle in hints {
            let listing = self
                .get(&format!("custom_collections.json?handle={handle}"))
                .await?;
            let Some(collection_id) = listing["custom_collections"]
                .as_array()
                .and_then(|collections| collections.first())
                .and_then(|collection| collection["id"].as_i64())
            else {
                debug!("No manual collection for hint '{handle}', skipping");
                continue;
            };

            let payload = json!({
                "collect": {
                    "product_id": product_id.parse::<i64>().unwrap_or_default(),
                    "collection_id": collection_id,
                }
            });
            let (status, body) = self.request(Method::POST, "collects.json", Some(payload)).await?;
            match status {
                StatusCode::CREATED | StatusCode::OK => {}
                StatusCode::UNPROCESSABLE_ENTITY => {
                    debug!("Already in collection '{handle}'");
                }
                other => return Err(client_error(other, &body)),
            }
        }
        Ok(())
    }
}

#[async_trait]
impl PlatformApi for ShopifyClient {
    async fn find_by_identifier(&self, identifier: &str) -> Result<Option<RemoteProduct>, ApiError> {
        let listing = self
            .get(&format!(
                "products.json?limit={LOOKUP_PAGE_SIZE}&fields=id,title,handle,vendor,body_html,tags,images,variants",
            ))
            .await?;
        let products = listing["products"].as_array().cloned().unwrap_or_default();

        let Some(found) = products.iter().find(|product| {
            product["variants"]
                .as_array()
                .is_some_and(|variants| variants.iter().any(|v| v["sku"].as_str() == Some(identifier)))
        }) else {
            return Ok(None);
        };

        let mut remote = parse_remote_product(found)?;
        let metafields = self
            .get(&format!("products/{}/metafields.json", remote.id))
            .await?;
        let (values, ids) = parse_remote_metafields(&metafields);
        remote.metafields = values;
        remote.metafield_ids = ids;
        Ok(Some(remote))
    }

    async fn create_product(&self, product: &CanonicalProduct) -> Result<RemoteProduct, ApiError> {
        let payload = create_payload(product);
        let (status, body) = self.request(Method::POST, "products.json", Some(payload)).await?;
        if !(status == StatusCode::CREATED || status == StatusCode::OK) {
            return Err(client_error(status, &body));
        }
        let remote = parse_remote_product(&body["product"])?;
        self.ensure_memberships(&remote.id, product.collection_hints.iter().map(String::as_str))
            .await?;
        Ok(remote)
    }

    async fn update_product(&self, remote: &RemoteProduct, patch: &ProductPatch) -> Result<(), ApiError> {
        if let Some(payload) = update_payload(remote, patch) {
            let path = format!("products/{}.json", remote.id);
            let (status, body) = self.request(Method::PUT, &path, Some(payload)).await?;
            if !status.is_success() {
                return Err(client_error(status, &body));
            }
        }

        for (reference, value) in &patch.metafields {
            self.write_metafield(&remote.id, &remote.metafield_ids, reference, value)
                .await?;
        }

        self.ensure_memberships(&remote.id, patch.ensure_collections.iter().map(String::as_str))
            .await
    }

    async fn ensure_metafield_definition(
        &self,
        definition: &MetafieldDefinition,
    ) -> Result<EnsureOutcome, ApiError> {
        let existing = self
            .get(&format!(
                "metafield_definitions.json?namespace={}&key={}&owner_type=PRODUCT",
                definition.namespace, definition.key,
            ))
            .await?;
        if existing["metafield_definitions"]
            .as_array()
            .is_some_and(|definitions| !definitions.is_empty())
        {
            return Ok(EnsureOutcome::AlreadyExists);
        }

        let payload = json!({
            "metafield_definition": {
                "namespace": definition.namespace,
                "key": definition.key,
                "name": definition.name,
                "description": definition.description,
                "type": definition.kind.as_platform_type(),
                "owner_type": "PRODUCT",
                "access": { "storefront": "PUBLIC_READ" },
            }
        });
        let (status, body) = self
            .request(Method::POST, "metafield_definitions.json", Some(payload))
            .await?;
        match status {
            StatusCode::CREATED | StatusCode::OK => Ok(EnsureOutcome::Created),
            // Lost a create race or the listing endpoint missed it; either
            // way the definition exists now.
            StatusCode::UNPROCESSABLE_ENTITY => Ok(EnsureOutcome::AlreadyExists),
            other => Err(client_error(other, &body)),
        }
    }

    async fn ensure_collection_rule(&self, rule: &CollectionRule) -> Result<EnsureOutcome, ApiError> {
        let (resource, endpoint) = match rule.kind {
            CollectionKind::Manual => ("custom_collections", "custom_collections.json"),
            CollectionKind::Automated { .. } => ("smart_collections", "smart_collections.json"),
        };

        let existing = self.get(&format!("{endpoint}?handle={}", rule.handle)).await?;
        if existing[resource].as_array().is_some_and(|collections| !collections.is_empty()) {
            return Ok(EnsureOutcome::AlreadyExists);
        }

        let mut collection = json!({
            "title": rule.title,
            "handle": rule.handle,
            "published": true,
        });
        if let CollectionKind::Automated { conditions, disjunctive } = &rule.kind {
            collection["rules"] = json!(conditions
                .iter()
                .map(|condition| {
                    json!({
                        "column": condition.column,
                        "relation": condition.relation,
                        "condition": condition.condition,
                    })
                })
                .collect::<Vec<_>>());
            collection["disjunctive"] = json!(disjunctive);
            collection["sort_order"] = json!("best-selling");
        }

        let singular = resource.trim_end_matches('s');
        let (status, body) = self
            .request(Method::POST, endpoint, Some(json!({ singular: collection })))
            .await?;
        match status {
            StatusCode::CREATED | StatusCode::OK => Ok(EnsureOutcome::Created),
            StatusCode::UNPROCESSABLE_ENTITY => {
                warn!("⚠️ Collection already exists: {}", rule.title);
                Ok(EnsureOutcome::AlreadyExists)
            }
            other => Err(client_error(other, &body)),
        }
    }

    fn capabilities(&self) -> PlatformCapabilities {
        self.capabilities
    }
}

fn classify_transport(error: &reqwest::Error, path: &str) -> ApiError {
    if error.is_timeout() {
        ApiError::Timeout {
            context: path.to_string(),
        }
    } else {
        ApiError::Network {
            message: error.to_string(),
        }
    }
}

/// Shopify sends Retry-After as fractional seconds.
fn parse_retry_after(header: Option<&HeaderValue>) -> Option<Duration> {
    let seconds: f64 = header?.to_str().ok()?.trim().parse().ok()?;
    if seconds.is_finite() && seconds >= 0.0 {
        Some(Duration::from_secs_f64(seconds))
    } else {
        None
    }
}

fn error_message(body: &Value) -> String {
    match &body["errors"] {
        Value::Null => "no error detail".to_string(),
        detail => detail.to_string(),
    }
}

fn client_error(status: StatusCode, body: &Value) -> ApiError {
    if status == StatusCode::UNPROCESSABLE_ENTITY {
        ApiError::Validation {
            message: error_message(body),
        }
    } else {
        ApiError::Http {
            status: status.as_u16(),
            message: error_message(body),
        }
    }
}

fn parse_remote_product(value: &Value) -> Result<RemoteProduct, ApiError> {
    let id = value["id"]
        .as_i64()
        .ok_or_else(|| ApiError::Decode {
            message: "product without id".to_string(),
        })?
        .to_string();
    let variant = value["variants"].as_array().and_then(|variants| variants.first());

    Ok(RemoteProduct {
        id,
        variant_id: variant.and_then(|v| v["id"].as_i64()).map(|id| id.to_string()),
        title: value["title"].as_str().unwrap_or_default().to_string(),
        vendor: value["vendor"].as_str().filter(|v| !v.is_empty()).map(ToString::to_string),
        body_html: value["body_html"]
            .as_str()
            .filter(|body| !body.is_empty())
            .map(ToString::to_string),
        tags: value["tags"]
            .as_str()
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|tag| !tag.is_empty())
            .map(ToString::to_string)
            .collect(),
        price: variant
            .and_then(|v| v["price"].as_str())
            .and_then(|price| Decimal::from_str(price).ok()),
        compare_at_price: variant
            .and_then(|v| v["compare_at_price"].as_str())
            .and_then(|price| Decimal::from_str(price).ok()),
        has_image: value["images"].as_array().is_some_and(|images| !images.is_empty()),
        metafields: BTreeMap::new(),
        metafield_ids: BTreeMap::new(),
    })
}

type RemoteMetafields = (
    BTreeMap<MetafieldRef, MetafieldValue>,
    BTreeMap<MetafieldRef, String>,
);

fn parse_remote_metafields(body: &Value) -> RemoteMetafields {
    let mut values = BTreeMap::new();
    let mut ids = BTreeMap::new();
    for entry in body["metafields"].as_array().into_iter().flatten() {
        let (Some(namespace), Some(key)) = (entry["namespace"].as_str(), entry["key"].as_str()) else {
            continue;
        };
        let reference = MetafieldRef::new(namespace, key);
        if let Some(id) = entry["id"].as_i64() {
            ids.insert(reference.clone(), id.to_string());
        }
        if let Some(value) = parse_metafield_value(entry) {
            values.insert(reference, value);
        }
    }
    (values, ids)
}

fn parse_metafield_value(entry: &Value) -> Option<MetafieldValue> {
    let raw = match &entry["value"] {
        Value::String(text) => text.clone(),
        Value::Number(number) => number.to_string(),
        _ => return None,
    };
    match entry["type"].as_str().unwrap_or("single_line_text_field") {
        "number_integer" => raw.parse().ok().map(MetafieldValue::Integer),
        "number_decimal" => Decimal::from_str(&raw).ok().map(MetafieldValue::Decimal),
        "rating" => {
            let shape: Value = serde_json::from_str(&raw).ok()?;
            let value = Decimal::from_str(shape["value"].as_str()?).ok()?;
            let scale_max = Decimal::from_str(shape["scale_max"].as_str()?).ok()?;
            Some(MetafieldValue::Rating { value, scale_max })
        }
        _ => Some(MetafieldValue::Text(raw)),
    }
}

/// Full product payload for a create: standard fields, the variant with its
/// pricing and stock defaults, metafields and the image in one request.
fn create_payload(product: &CanonicalProduct) -> Value {
    let mut variant = json!({
        "price": product.price.to_string(),
        "sku": product.identifier,
        "inventory_quantity": 100,
        "inventory_policy": "deny",
        "requires_shipping": true,
        "taxable": true,
        "weight": 1.5,
        "weight_unit": "kg",
    });
    if let Some(compare_at) = product.compare_at_price {
        variant["compare_at_price"] = json!(compare_at.to_string());
    }

    let mut payload = json!({
        "title": product.title,
        "handle": product.handle,
        "status": "active",
        "published": true,
        "tags": product.tags.iter().cloned().collect::<Vec<_>>().join(", "),
        "variants": [variant],
    });
    if let Some(vendor) = &product.vendor {
        payload["vendor"] = json!(vendor);
    }
    if let Some(body_html) = product.body_html() {
        payload["body_html"] = json!(body_html);
    }
    if let Some(image_url) = &product.image_url {
        payload["images"] = json!([{ "src": image_url, "alt": product.title }]);
    }
    if !product.metafields.is_empty() {
        payload["metafields"] = json!(product
            .metafields
            .iter()
            .map(|(reference, value)| {
                json!({
                    "namespace": reference.namespace,
                    "key": reference.key,
                    "type": value.platform_type(),
                    "value": value.platform_value(),
                })
            })
            .collect::<Vec<_>>());
    }

    json!({ "product": payload })
}

/// Changed standard fields as a PUT payload, or `None` when only metafields
/// or memberships changed.
fn update_payload(remote: &RemoteProduct, patch: &ProductPatch) -> Option<Value> {
    let mut product = json!({ "id": remote.id.parse::<i64>().unwrap_or_default() });
    let mut changed = false;

    if let Some(title) = &patch.title {
        product["title"] = json!(title);
        changed = true;
    }
    if let Some(vendor) = &patch.vendor {
        product["vendor"] = json!(vendor);
        changed = true;
    }
    if let Some(body_html) = &patch.body_html {
        product["body_html"] = json!(body_html);
        changed = true;
    }
    if let Some(tags) = &patch.tags {
        product["tags"] = json!(tags.iter().cloned().collect::<Vec<_>>().join(", "));
        changed = true;
    }
    if patch.price.is_some() || patch.compare_at_price.is_some() {
        let mut variant = json!({});
        if let Some(variant_id) = &remote.variant_id {
            variant["id"] = json!(variant_id.parse::<i64>().unwrap_or_default());
        }
        if let Some(price) = patch.price {
            variant["price"] = json!(price.to_string());
        }
        if let Some(compare_at) = patch.compare_at_price {
            variant["compare_at_price"] = json!(compare_at.to_string());
        }
        product["variants"] = json!([variant]);
        changed = true;
    }
    if let Some(image_url) = &patch.image_url {
        product["images"] = json!([{ "src": image_url }]);
        changed = true;
    }

    changed.then(|| json!({ "product": product }))
}

//! Metafield/collection provisioner
//!
//! Ensures the store carries every custom-field definition and collection
//! rule the import references, before any product mutation runs. Safe to run
//! any number of times: existence is matched on natural keys (namespace/key,
//! collection title), so a second run creates nothing and errors nothing.

use std::collections::BTreeSet;
use std::sync::Arc;

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::domain::schema::{CollectionRule, MetafieldDefinition, MetafieldRef};
use crate::infrastructure::platform::{EnsureOutcome, PlatformApi};

/// One failed provisioning item with its cause.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvisionFailure {
    pub name: String,
    pub cause: String,
}

/// Counters and failures from one provisioning pass.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProvisionReport {
    pub definitions_created: usize,
    pub definitions_existing: usize,
    pub definitions_failed: usize,
    pub rules_created: usize,
    pub rules_existing: usize,
    pub rules_failed: usize,
    pub failures: Vec<ProvisionFailure>,
    /// Definitions now known to exist (created or already present); the
    /// importer's schema precondition gate checks against this set.
    pub provisioned: BTreeSet<MetafieldRef>,
}

impl ProvisionReport {
    pub fn is_clean(&self) -> bool {
        self.definitions_failed == 0 && self.rules_failed == 0
    }
}

/// Idempotent store-schema setup against a [`PlatformApi`].
pub struct Provisioner {
    api: Arc<dyn PlatformApi>,
}

impl Provisioner {
    pub fn new(api: Arc<dyn PlatformApi>) -> Self {
        Self { api }
    }

    /// Ensure all definitions and rules exist. Items are independent, so
    /// they run concurrently and one failure never stops the others; the
    /// report collects every outcome.
    pub async fn ensure_schema(
        &self,
        definitions: &[MetafieldDefinition],
        rules: &[CollectionRule],
    ) -> ProvisionReport {
        info!(
            "🗂️ Provisioning store schema: {} metafield definitions, {} collection rules",
            definitions.len(),
            rules.len(),
        );

        let definition_results = join_all(definitions.iter().map(|definition| {
            let api = Arc::clone(&self.api);
            async move {
                let outcome = api.ensure_metafield_definition(definition).await;
                (definition, outcome)
            }
        }))
        .await;

        let rule_results = join_all(rules.iter().map(|rule| {
            let api = Arc::clone(&self.api);
            async move {
                let outcome = api.ensure_collection_rule(rule).await;
                (rule, outcome)
            }
        }))
        .await;

        let mut report = ProvisionReport::default();

        for (definition, outcome) in definition_results {
            let reference = definition.reference();
            match outcome {
                Ok(EnsureOutcome::Created) => {
                    info!("✅ Created metafield definition {reference}");
                    report.definitions_created += 1;
                    report.provisioned.insert(reference);
                }
                Ok(EnsureOutcome::AlreadyExists) => {
                    report.definitions_existing += 1;
                    report.provisioned.insert(reference);
                }
                Err(error) => {
                    warn!("❌ Metafield definition {reference} failed: {error}");
                    report.definitions_failed += 1;
                    report.failures.push(ProvisionFailure {
                        name: reference.to_string(),
                        cause: error.to_string(),
                    });
                }
            }
        }

        for (rule, outcome) in rule_results {
            match outcome {
                Ok(EnsureOutcome::Created) => {
                    info!("✅ Created collection: {}", rule.title);
                    report.rules_created += 1;
                }
                Ok(EnsureOutcome::AlreadyExists) => report.rules_existing += 1,
                Err(error) => {
                    warn!("❌ Collection '{}' failed: {error}", rule.title);
                    report.rules_failed += 1;
                    report.failures.push(ProvisionFailure {
                        name: rule.title.clone(),
                        cause: error.to_string(),
                    });
                }
            }
        }

        info!(
            "🗂️ Provisioning done: {}+{} definitions created/existing, {}+{} collections created/existing, {} failed",
            report.definitions_created,
            report.definitions_existing,
            report.rules_created,
            report.rules_existing,
            report.definitions_failed + report.rules_failed,
        );
        report
    }
}

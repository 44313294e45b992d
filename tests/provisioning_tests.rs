//! Provisioner idempotence and partial-failure tests

mod common;

use std::sync::Arc;

use common::FakePlatform;

use wine_catalog_importer::application::provisioner::Provisioner;
use wine_catalog_importer::domain::schema::MetafieldRef;
use wine_catalog_importer::domain::wine_catalog::{
    wine_collection_rules, wine_metafield_definitions,
};
use wine_catalog_importer::infrastructure::platform::{ApiError, PlatformApi};

#[tokio::test]
async fn provisioning_twice_creates_nothing_twice() {
    let fake = FakePlatform::new();
    let definitions = wine_metafield_definitions();
    let rules = wine_collection_rules();

    let provisioner = Provisioner::new(Arc::clone(&fake) as Arc<dyn PlatformApi>);
    let first = provisioner.ensure_schema(&definitions, &rules).await;
    assert_eq!(first.definitions_created, definitions.len());
    assert_eq!(first.rules_created, rules.len());
    assert_eq!(first.definitions_existing, 0);
    assert!(first.is_clean());

    let second = provisioner.ensure_schema(&definitions, &rules).await;
    assert_eq!(second.definitions_created, 0);
    assert_eq!(second.definitions_existing, definitions.len());
    assert_eq!(second.rules_created, 0);
    assert_eq!(second.rules_existing, rules.len());
    assert!(second.is_clean());

    // The store saw each create exactly once.
    assert_eq!(fake.counts().definition_creates, definitions.len());
    assert_eq!(fake.counts().collection_creates, rules.len());
    assert!(fake.definitions().contains("wine.vintage"));
    assert!(fake.collections().contains("Red Wines"));
}

#[tokio::test]
async fn one_failed_definition_does_not_stop_the_others() {
    let fake = FakePlatform::new();
    fake.fail_definition(
        "wine.vintage",
        ApiError::Validation {
            message: "type not supported".into(),
        },
    );
    let definitions = wine_metafield_definitions();

    let report = Provisioner::new(Arc::clone(&fake) as Arc<dyn PlatformApi>)
        .ensure_schema(&definitions, &[])
        .await;

    assert_eq!(report.definitions_failed, 1);
    assert_eq!(report.definitions_created, definitions.len() - 1);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].name, "wine.vintage");
    assert!(report.failures[0].cause.contains("type not supported"));
    assert!(!report.is_clean());

    // The failed definition is not part of the provisioned set the importer
    // gates on.
    assert!(!report.provisioned.contains(&MetafieldRef::new("wine", "vintage")));
    assert!(report.provisioned.contains(&MetafieldRef::new("wine", "region")));
}

#[tokio::test]
async fn provisioned_set_covers_created_and_existing() {
    let fake = FakePlatform::new();
    let definitions = wine_metafield_definitions();
    let provisioner = Provisioner::new(Arc::clone(&fake) as Arc<dyn PlatformApi>);

    provisioner.ensure_schema(&definitions[..4], &[]).await;
    let report = provisioner.ensure_schema(&definitions, &[]).await;

    assert_eq!(report.definitions_existing, 4);
    assert_eq!(report.definitions_created, definitions.len() - 4);
    assert_eq!(report.provisioned.len(), definitions.len());
}

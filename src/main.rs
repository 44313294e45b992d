//! Wine Catalog Importer CLI
//!
//! `provision`  - create the store's metafield definitions and collections
//! `import CSV` - upsert every product of a scraped catalog CSV
//! `plan CSV`   - dry run: lookups and diffs only, no mutations
//!
//! Configuration comes from `importer.config.json` (or the file named by
//! `WINE_IMPORTER_CONFIG`) with `WINE_IMPORTER__*` environment overrides.
//! Exit code is zero only when nothing failed.

use std::collections::BTreeSet;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use wine_catalog_importer::application::importer::BatchImporter;
use wine_catalog_importer::application::mapper::map_record;
use wine_catalog_importer::application::provisioner::Provisioner;
use wine_catalog_importer::application::report::summarize;
use wine_catalog_importer::domain::schema::{
    CollectionRule, FieldSchema, FieldTarget, MetafieldDefinition,
};
use wine_catalog_importer::domain::wine_catalog;
use wine_catalog_importer::infrastructure::config::AppConfig;
use wine_catalog_importer::infrastructure::csv_reader::read_raw_records;
use wine_catalog_importer::infrastructure::logging::init_logging;
use wine_catalog_importer::infrastructure::platform::PlatformApi;
use wine_catalog_importer::infrastructure::shopify::ShopifyClient;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(err) => {
            error!("❌ {err:#}");
            eprintln!("❌ {err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<ExitCode> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let config_path = std::env::var("WINE_IMPORTER_CONFIG").ok();
    let config = AppConfig::load(config_path.as_deref())?;
    init_logging(&config.logging)?;

    match args.first().map(String::as_str) {
        Some("provision") => provision(&config).await,
        Some("import") => {
            let csv = args.get(1).context("Usage: wine-catalog-importer import <catalog.csv>")?;
            import(&config, Path::new(csv), false).await
        }
        Some("plan") => {
            let csv = args.get(1).context("Usage: wine-catalog-importer plan <catalog.csv>")?;
            import(&config, Path::new(csv), true).await
        }
        _ => {
            eprintln!("🍷 Wine Catalog Importer");
            eprintln!("Usage:");
            eprintln!("  wine-catalog-importer provision");
            eprintln!("  wine-catalog-importer import <catalog.csv>");
            eprintln!("  wine-catalog-importer plan <catalog.csv>");
            Ok(ExitCode::FAILURE)
        }
    }
}

/// The store schema in effect: either the built-in wine catalog or a custom
/// schema file (whose definitions are derived from its metafield
/// declarations; stock collection rules apply to the wine schema only).
fn load_store_schema(config: &AppConfig) -> Result<(FieldSchema, Vec<MetafieldDefinition>, Vec<CollectionRule>)> {
    match &config.schema_file {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read schema file {}", path.display()))?;
            let schema: FieldSchema = serde_json::from_str(&raw)
                .with_context(|| format!("Invalid field schema in {}", path.display()))?;
            let definitions = definitions_from_schema(&schema);
            Ok((schema, definitions, Vec::new()))
        }
        None => Ok((
            wine_catalog::wine_field_schema(),
            wine_catalog::wine_metafield_definitions(),
            wine_catalog::wine_collection_rules(),
        )),
    }
}

fn definitions_from_schema(schema: &FieldSchema) -> Vec<MetafieldDefinition> {
    schema
        .fields
        .iter()
        .filter_map(|decl| match &decl.target {
            FieldTarget::Metafield { namespace, key, kind } => Some(MetafieldDefinition::new(
                namespace,
                key,
                &decl.name,
                "",
                *kind,
            )),
            FieldTarget::Standard { .. } => None,
        })
        .collect()
}

async fn provision(config: &AppConfig) -> Result<ExitCode> {
    let (_, definitions, rules) = load_store_schema(config)?;
    let api: Arc<dyn PlatformApi> = Arc::new(ShopifyClient::new(&config.shopify)?);
    let report = Provisioner::new(api).ensure_schema(&definitions, &rules).await;

    println!("📋 Provisioning Summary:");
    println!(
        "  Definitions: {} created, {} existing, {} failed",
        report.definitions_created, report.definitions_existing, report.definitions_failed,
    );
    println!(
        "  Collections: {} created, {} existing, {} failed",
        report.rules_created, report.rules_existing, report.rules_failed,
    );
    for failure in &report.failures {
        println!("    ❌ {}: {}", failure.name, failure.cause);
    }
    Ok(if report.is_clean() { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

async fn import(config: &AppConfig, csv: &Path, dry_run: bool) -> Result<ExitCode> {
    let run_id = uuid::Uuid::new_v4();
    info!("🚀 Import run {run_id} starting ({})", if dry_run { "dry run" } else { "live" });

    let (schema, definitions, rules) = load_store_schema(config)?;
    let api: Arc<dyn PlatformApi> = Arc::new(ShopifyClient::new(&config.shopify)?);

    let records = read_raw_records(csv)?;
    info!("📁 Read {} rows from {}", records.len(), csv.display());

    let mut products = Vec::with_capacity(records.len());
    let mut mapping_failures = 0usize;
    for (index, record) in records.iter().enumerate() {
        match map_record(record, &schema) {
            Ok(product) => products.push(product),
            Err(err) => {
                warn!("⚠️ Row {} skipped: {err}", index + 2);
                mapping_failures += 1;
            }
        }
    }
    info!("🔄 Mapped {} products ({} rows skipped)", products.len(), mapping_failures);

    // Store schema must be in place before the first product mutation. A
    // dry run must not mutate anything, so it trusts the declared set.
    let provisioned: BTreeSet<_> = if dry_run {
        definitions.iter().map(MetafieldDefinition::reference).collect()
    } else {
        let report = Provisioner::new(Arc::clone(&api)).ensure_schema(&definitions, &rules).await;
        if !report.is_clean() {
            warn!(
                "⚠️ {} schema items failed to provision; products referencing them will abort the run",
                report.failures.len(),
            );
        }
        report.provisioned
    };

    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("🛑 Interrupt received; finishing in-flight imports");
            signal_cancel.cancel();
        }
    });

    let mut options = config.import.clone();
    options.dry_run = dry_run;
    let importer = BatchImporter::new(api, provisioned, options);
    let outcomes = importer.import(products, &cancel).await?;

    let summary = summarize(&outcomes);
    print!("{}", summary.render());
    if mapping_failures > 0 {
        println!("  ⚠️ Rows skipped at mapping: {mapping_failures}");
    }
    Ok(if summary.is_success() { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

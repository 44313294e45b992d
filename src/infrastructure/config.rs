//! Configuration infrastructure
//!
//! Explicit configuration structs passed into the client and pipeline
//! constructors; nothing here is process-global. Loaded from an optional
//! JSON file with environment overrides (prefix `WINE_IMPORTER`, e.g.
//! `WINE_IMPORTER__SHOPIFY__ACCESS_TOKEN`), so credentials never need to
//! live in the file.

use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::application::importer::ImportOptions;
use crate::infrastructure::platform::PlatformCapabilities;

/// Complete application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub shopify: ShopifyConfig,
    pub import: ImportOptions,
    pub logging: LoggingConfig,
    /// Optional field-schema file; the built-in wine schema is used when
    /// absent.
    pub schema_file: Option<PathBuf>,
}

/// Store endpoint, credentials and request budget.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ShopifyConfig {
    /// e.g. `https://your-store.myshopify.com`
    pub shop_url: String,
    pub access_token: String,
    pub api_version: String,
    pub timeout_seconds: u64,
    /// REST budget: bucket size and leak rate.
    pub requests_per_second: u32,
    pub burst: u32,
    pub partial_metafield_updates: bool,
}

impl Default for ShopifyConfig {
    fn default() -> Self {
        Self {
            shop_url: String::new(),
            access_token: String::new(),
            api_version: "2024-10".to_string(),
            timeout_seconds: 30,
            requests_per_second: 2,
            burst: 40,
            partial_metafield_updates: true,
        }
    }
}

impl ShopifyConfig {
    pub fn capabilities(&self) -> PlatformCapabilities {
        PlatformCapabilities {
            partial_metafield_updates: self.partial_metafield_updates,
        }
    }

    /// Credentials must be present and not the template placeholders.
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(!self.shop_url.trim().is_empty(), "shopify.shop_url is not configured");
        anyhow::ensure!(
            !self.access_token.trim().is_empty(),
            "shopify.access_token is not configured",
        );
        anyhow::ensure!(
            !self.shop_url.contains("YOUR-STORE") && !self.access_token.contains("YOUR_ACCESS_TOKEN"),
            "shopify credentials still hold template placeholders",
        );
        Ok(())
    }
}

/// Logging configuration settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "error", "warn", "info", "debug", "trace"
    pub level: String,
    pub console_output: bool,
    pub file_output: bool,
    pub log_dir: PathBuf,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            console_output: true,
            file_output: false,
            log_dir: PathBuf::from("logs"),
        }
    }
}

impl AppConfig {
    /// Load from the given file (JSON, optional) layered under environment
    /// overrides.
    pub fn load(path: Option<&str>) -> Result<Self> {
        let file = path.unwrap_or("importer.config");
        let settings = config::Config::builder()
            .add_source(config::File::with_name(file).required(false))
            .add_source(
                config::Environment::with_prefix("WINE_IMPORTER")
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()
            .context("Failed to read configuration sources")?;
        settings
            .try_deserialize()
            .context("Invalid configuration shape")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_platform_budget() {
        let config = ShopifyConfig::default();
        assert_eq!(config.requests_per_second, 2);
        assert_eq!(config.burst, 40);
        assert!(config.partial_metafield_updates);
    }

    #[test]
    fn placeholder_credentials_fail_validation() {
        let config = ShopifyConfig {
            shop_url: "https://YOUR-STORE.myshopify.com".to_string(),
            access_token: "YOUR_ACCESS_TOKEN_HERE".to_string(),
            ..ShopifyConfig::default()
        };
        assert!(config.validate().is_err());
        assert!(ShopifyConfig::default().validate().is_err());

        let config = ShopifyConfig {
            shop_url: "https://vintage-cellar.myshopify.com".to_string(),
            access_token: "shpat_demo".to_string(),
            ..ShopifyConfig::default()
        };
        assert!(config.validate().is_ok());
    }
}

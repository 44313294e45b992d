//! Infrastructure module - platform access and process plumbing
//!
//! The platform port and its Shopify implementation, the cost-weighted
//! request budget, CSV input, configuration and logging setup.

pub mod config;
pub mod csv_reader;
pub mod logging;
pub mod platform;
pub mod rate_limit;
pub mod shopify;

pub use config::AppConfig;
pub use platform::{ApiError, EnsureOutcome, PlatformApi, PlatformCapabilities, ProductPatch, RemoteProduct};
pub use shopify::ShopifyClient;

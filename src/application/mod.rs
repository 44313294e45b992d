//! Application module - the pipeline stages
//!
//! Field mapping, store-schema provisioning, the batch importer itself and
//! the run report. Each stage depends only on the domain types and the
//! platform port in `infrastructure::platform`.

pub mod importer;
pub mod mapper;
pub mod provisioner;
pub mod report;

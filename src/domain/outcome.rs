//! Per-product import outcome
//!
//! Created by the batch importer, read-only afterwards, aggregated by the
//! run report.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What happened to one product during a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportStatus {
    Created,
    Updated,
    Skipped,
    Failed,
}

/// The recorded result for one canonical product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportOutcome {
    pub identifier: String,
    pub status: ImportStatus,
    pub remote_id: Option<String>,
    pub error_detail: Option<String>,
    pub finished_at: DateTime<Utc>,
}

impl ImportOutcome {
    pub fn success(identifier: &str, status: ImportStatus, remote_id: Option<String>) -> Self {
        Self {
            identifier: identifier.to_string(),
            status,
            remote_id,
            error_detail: None,
            finished_at: Utc::now(),
        }
    }

    pub fn failed(identifier: &str, error_detail: String) -> Self {
        Self {
            identifier: identifier.to_string(),
            status: ImportStatus::Failed,
            remote_id: None,
            error_detail: Some(error_detail),
            finished_at: Utc::now(),
        }
    }

    pub fn is_failure(&self) -> bool {
        self.status == ImportStatus::Failed
    }
}

//! Run report - aggregation of per-product outcomes
//!
//! Pure and deterministic: no remote calls, same outcome sequence in, same
//! summary out. The failure list keeps input order and enough detail
//! (identifier + cause) to drive a retry of just the failed subset.

use serde::{Deserialize, Serialize};

use crate::domain::outcome::{ImportOutcome, ImportStatus};

/// One failed product with the error recorded verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureLine {
    pub identifier: String,
    pub error_detail: String,
}

/// Aggregate counts plus the ordered failure list of one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub created_count: usize,
    pub updated_count: usize,
    pub skipped_count: usize,
    pub failed_count: usize,
    pub failures: Vec<FailureLine>,
}

impl RunSummary {
    pub fn from_outcomes(outcomes: &[ImportOutcome]) -> Self {
        let mut summary = Self::default();
        for outcome in outcomes {
            match outcome.status {
                ImportStatus::Created => summary.created_count += 1,
                ImportStatus::Updated => summary.updated_count += 1,
                ImportStatus::Skipped => summary.skipped_count += 1,
                ImportStatus::Failed => {
                    summary.failed_count += 1;
                    summary.failures.push(FailureLine {
                        identifier: outcome.identifier.clone(),
                        error_detail: outcome
                            .error_detail
                            .clone()
                            .unwrap_or_else(|| "unknown error".to_string()),
                    });
                }
            }
        }
        summary
    }

    pub fn total(&self) -> usize {
        self.created_count + self.updated_count + self.skipped_count + self.failed_count
    }

    /// Exit-code condition: a run succeeds iff nothing failed.
    pub fn is_success(&self) -> bool {
        self.failed_count == 0
    }

    /// Operator-facing text block, printed by the CLI and written to logs.
    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str("📋 Import Summary:\n");
        out.push_str(&format!("  ✅ Created: {}\n", self.created_count));
        out.push_str(&format!("  🔄 Updated: {}\n", self.updated_count));
        out.push_str(&format!("  ⏭️ Skipped: {}\n", self.skipped_count));
        out.push_str(&format!("  ❌ Failed: {}\n", self.failed_count));
        out.push_str(&format!("  📊 Total processed: {}\n", self.total()));
        if !self.failures.is_empty() {
            out.push_str("  Failures:\n");
            for failure in &self.failures {
                out.push_str(&format!("    - {}: {}\n", failure.identifier, failure.error_detail));
            }
        }
        out
    }
}

/// Convenience wrapper matching the pipeline's call shape.
pub fn summarize(outcomes: &[ImportOutcome]) -> RunSummary {
    RunSummary::from_outcomes(outcomes)
}

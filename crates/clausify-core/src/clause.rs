//! Clause records: the flat `(text, label)` rows fed to fine-tuning.

use serde::{Deserialize, Serialize};

/// Labels extracted from `master_clauses.csv` by default.
///
/// These must match the CUAD column names exactly.
pub const DEFAULT_LABELS: &[&str] = &[
    "Termination For Convenience",
    "Non-Compete",
    "Exclusivity",
    "Anti-Assignment",
    "Ip Ownership Assignment",
    "Cap On Liability",
];

/// One extracted clause and the label of the column it came from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ClauseRecord {
    pub text: String,
    pub label: String,
}

impl ClauseRecord {
    pub fn new(text: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            label: label.into(),
        }
    }
}

/// Collapse each `\n` to a single space and trim surrounding whitespace.
///
/// Carriage returns are left in place; only line feeds are replaced.
pub fn normalize_clause(raw: &str) -> String {
    raw.replace('\n', " ").trim().to_string()
}

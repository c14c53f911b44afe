//! Clause extraction from the CUAD contract table.
//!
//! `master_clauses.csv` has one row per contract and one column per clause
//! category. Each selected column's cells are turned into zero or more
//! `(text, label)` records; the result is deduplicated and written as
//! `clauses_clean.csv`.

use std::collections::HashSet;
use std::path::Path;

use clausify_core::{ClauseRecord, normalize_clause};
use tracing::{debug, info, warn};

use crate::csv::{CsvTable, cell_str, read_csv_utf8, write_clauses};
use crate::literal::{PyLiteral, parse_literal};
use crate::StoreError;

/// Raw cell values read as missing, matching pandas' default NA markers.
pub const NA_MARKERS: &[&str] = &[
    "", "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

/// Turn one cell into clean clause strings.
///
/// - missing or blank → nothing
/// - `[...]` that parses as a literal list → one clause per non-blank element
/// - `[...]` that parses as another literal (e.g. the tuple `[a], [b]`) → its string form
/// - `[...]` that fails to parse → the raw text, brackets included
/// - anything else → the text itself
///
/// Every clause is normalized with [`normalize_clause`] and empty results are dropped.
pub fn extract_clauses_from_cell(cell: Option<&str>) -> Vec<String> {
    let Some(raw) = cell else {
        return Vec::new();
    };
    if NA_MARKERS.contains(&raw) {
        return Vec::new();
    }

    let s = raw.trim();
    if s.is_empty() {
        return Vec::new();
    }

    let clauses = if s.starts_with('[') && s.ends_with(']') {
        match parse_literal(s) {
            Ok(PyLiteral::List(items)) => items
                .iter()
                .map(PyLiteral::to_py_str)
                .filter(|item| !item.trim().is_empty())
                .map(|item| normalize_clause(&item))
                .collect(),
            Ok(other) => vec![normalize_clause(&other.to_py_str())],
            Err(err) => {
                debug!(%err, "list-like cell did not parse, keeping raw text");
                vec![normalize_clause(s)]
            }
        }
    } else {
        vec![normalize_clause(s)]
    };

    clauses.into_iter().filter(|c| !c.is_empty()).collect()
}

/// Result of running the extractor over a table.
#[derive(Debug, Default)]
pub struct Extraction {
    /// Records in row order, then configured label order; not yet deduplicated.
    pub clauses: Vec<ClauseRecord>,
    /// Configured labels that are not columns of the table.
    pub missing_labels: Vec<String>,
    pub rows_seen: usize,
}

/// Summary of a full extraction run.
#[derive(Debug)]
pub struct ExtractStats {
    pub rows_seen: usize,
    pub clauses_extracted: usize,
    pub clauses_written: usize,
    pub missing_labels: Vec<String>,
}

impl ExtractStats {
    pub fn duplicates_dropped(&self) -> usize {
        self.clauses_extracted - self.clauses_written
    }
}

/// Extracts clause records for a fixed, ordered set of labels.
pub struct ClauseExtractor {
    labels: Vec<String>,
}

impl ClauseExtractor {
    pub fn new<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            labels: labels.into_iter().map(Into::into).collect(),
        }
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Walk every row and every present label column.
    ///
    /// Labels absent from the table are reported once and skipped.
    pub fn extract(&self, table: &CsvTable) -> Extraction {
        let (present, missing): (Vec<&String>, Vec<&String>) =
            self.labels.iter().partition(|l| table.has_column(l));

        for label in &missing {
            warn!(label = %label, "label is not a column in the table, skipping");
        }

        let mut clauses = Vec::new();
        for batch in &table.batches {
            let columns: Vec<_> = present
                .iter()
                .filter_map(|label| batch.column_by_name(label).map(|col| (*label, col)))
                .collect();

            for row in 0..batch.num_rows() {
                for (label, col) in &columns {
                    for text in extract_clauses_from_cell(cell_str(col.as_ref(), row)) {
                        clauses.push(ClauseRecord::new(text, label.as_str()));
                    }
                }
            }
        }

        Extraction {
            clauses,
            missing_labels: missing.into_iter().cloned().collect(),
            rows_seen: table.num_rows(),
        }
    }
}

/// Drop exact duplicate records, keeping the first occurrence and the original order.
pub fn dedup_clauses(records: Vec<ClauseRecord>) -> Vec<ClauseRecord> {
    let mut seen = HashSet::with_capacity(records.len());
    records
        .into_iter()
        .filter(|r| seen.insert(r.clone()))
        .collect()
}

/// Read `input`, extract `labels`, deduplicate and write the clause table to `output`.
pub fn run_extraction<S: AsRef<str>>(
    input: &Path,
    output: &Path,
    labels: &[S],
) -> Result<ExtractStats, StoreError> {
    if !input.exists() {
        return Err(StoreError::CsvNotFound(input.to_path_buf()));
    }

    info!(path = %input.display(), "loading contract table");
    let table = read_csv_utf8(input)?;
    debug!(columns = ?table.column_names(), "contract table columns");

    let extractor = ClauseExtractor::new(labels.iter().map(|l| l.as_ref().to_string()));
    let extraction = extractor.extract(&table);
    let extracted = extraction.clauses.len();

    let clauses = dedup_clauses(extraction.clauses);
    write_clauses(output, &clauses)?;

    let stats = ExtractStats {
        rows_seen: extraction.rows_seen,
        clauses_extracted: extracted,
        clauses_written: clauses.len(),
        missing_labels: extraction.missing_labels,
    };
    info!(
        rows = stats.rows_seen,
        written = stats.clauses_written,
        duplicates = stats.duplicates_dropped(),
        output = %output.display(),
        "extracted clauses"
    );
    Ok(stats)
}

//! CSV tables read and written through the Arrow CSV reader/writer.
//!
//! Contract tables are read with every column typed `Utf8` so that cell text
//! reaches the extractor untouched; type inference is only used to discover
//! the header.

use std::fs::File;
use std::io::{Seek, SeekFrom};
use std::path::Path;
use std::sync::Arc;

use arrow::array::{Array, LargeStringArray, StringArray};
use arrow::csv::reader::Format;
use arrow::csv::{ReaderBuilder, WriterBuilder};
use arrow::datatypes::SchemaRef;
use arrow::record_batch::RecordBatch;
use clausify_core::ClauseRecord;
use clausify_core::schema::clauses;
use tracing::{debug, info};

use crate::StoreError;

/// A CSV file loaded into Arrow record batches.
#[derive(Debug)]
pub struct CsvTable {
    pub schema: SchemaRef,
    pub batches: Vec<RecordBatch>,
}

impl CsvTable {
    pub fn num_rows(&self) -> usize {
        self.batches.iter().map(|b| b.num_rows()).sum()
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.schema
            .fields()
            .iter()
            .map(|f| f.name().as_str())
            .collect()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.schema.index_of(name).is_ok()
    }
}

/// Read a headered CSV file with every column as nullable `Utf8`.
///
/// Quoted fields may span lines. Empty fields come back as nulls.
pub fn read_csv_utf8(path: &Path) -> Result<CsvTable, StoreError> {
    if !path.exists() {
        return Err(StoreError::CsvNotFound(path.to_path_buf()));
    }

    let mut file = File::open(path)?;
    let format = Format::default().with_header(true);
    let (header, _) = format.infer_schema(&mut file, Some(0))?;
    file.seek(SeekFrom::Start(0))?;

    let schema = Arc::new(clauses::all_text_schema(
        header.fields().iter().map(|f| f.name().as_str()),
    ));
    debug!(columns = schema.fields().len(), path = %path.display(), "read csv header");

    let reader = ReaderBuilder::new(schema.clone())
        .with_format(format)
        .build(file)?;
    let batches = reader.collect::<Result<Vec<_>, _>>()?;

    let table = CsvTable { schema, batches };
    info!(rows = table.num_rows(), path = %path.display(), "loaded csv");
    Ok(table)
}

/// Write clause records as a `text,label` CSV with a header row.
pub fn write_clauses(path: &Path, records: &[ClauseRecord]) -> Result<(), StoreError> {
    let schema = Arc::new(clauses::clause_table_schema());
    let text = StringArray::from_iter_values(records.iter().map(|r| r.text.as_str()));
    let label = StringArray::from_iter_values(records.iter().map(|r| r.label.as_str()));
    let batch = RecordBatch::try_new(schema, vec![Arc::new(text), Arc::new(label)])?;

    let file = File::create(path)?;
    let mut writer = WriterBuilder::new().with_header(true).build(file);
    writer.write(&batch)?;

    info!(rows = records.len(), path = %path.display(), "wrote clause table");
    Ok(())
}

/// Read a clause table written by [`write_clauses`].
///
/// Rows with a null `text` or `label` are skipped.
pub fn read_clauses(path: &Path) -> Result<Vec<ClauseRecord>, StoreError> {
    let table = read_csv_utf8(path)?;
    for column in [clauses::TEXT, clauses::LABEL] {
        if !table.has_column(column) {
            return Err(StoreError::MissingColumn {
                column: column.to_string(),
                path: path.to_path_buf(),
            });
        }
    }

    let mut records = Vec::with_capacity(table.num_rows());
    for batch in &table.batches {
        // Columns are guaranteed by the header check above.
        let (Some(text_col), Some(label_col)) = (
            batch.column_by_name(clauses::TEXT),
            batch.column_by_name(clauses::LABEL),
        ) else {
            continue;
        };
        for row in 0..batch.num_rows() {
            if let (Some(text), Some(label)) =
                (cell_str(text_col.as_ref(), row), cell_str(label_col.as_ref(), row))
            {
                records.push(ClauseRecord::new(text, label));
            }
        }
    }
    Ok(records)
}

/// String value of a `Utf8` or `LargeUtf8` cell, `None` when null.
pub(crate) fn cell_str(col: &dyn Array, row: usize) -> Option<&str> {
    if col.is_null(row) {
        return None;
    }
    col.as_any()
        .downcast_ref::<StringArray>()
        .map(|arr| arr.value(row))
        .or_else(|| {
            col.as_any()
                .downcast_ref::<LargeStringArray>()
                .map(|arr| arr.value(row))
        })
}

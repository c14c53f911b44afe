//! Storage layer: CSV tables read and written through Arrow, and the clause extractor.

mod error;
pub use error::StoreError;

pub mod csv;
pub mod extract;
pub mod literal;
pub mod segment;

pub use csv::{CsvTable, read_clauses, read_csv_utf8, write_clauses};
pub use extract::{
    ClauseExtractor, ExtractStats, Extraction, dedup_clauses, extract_clauses_from_cell,
    run_extraction,
};
pub use literal::{LiteralError, PyLiteral, parse_literal};
pub use segment::split_into_clauses;

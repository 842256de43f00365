//! Source ingestion: documents (decks, one-pagers) and tabular sources (CSV,
//! Google Sheets).

pub mod document;
pub mod tabular;

pub use document::{
    DocumentFetcher, DocumentParser, HttpFileFetcher, Location, PdfParser, SharedFetcher,
    SharedParser, parse_blocking,
};
pub use tabular::{
    ColumnMap, CsvSource, Field, HEADER_SYNONYMS, SharedTabularSource, TabularRow, TabularSource,
    export_location, parse_csv, rows_from_records, sheet_id,
};

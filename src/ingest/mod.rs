// Bill ingestion engine
// Delimiter Detector → Header Classifier → Row Parser, driven by the Importer

pub mod delimiter;
pub mod header;
pub mod row;
pub mod importer;

pub use delimiter::{detect_delimiter, Delimiter};
pub use header::{classify_header, split_fields, BillField, ColumnMapping, HeaderScan, HeaderSynonyms};
pub use row::{normalize_date, normalize_value, parse_due_date, NumberLocale, RowOutcome, RowParser, SkipReason};
pub use importer::{
    is_spreadsheet_binary, BillSink, ImportOutcome, ImportReporter, ImportSummary, Importer,
    LogReporter, ParsedImport, SkippedRow,
};

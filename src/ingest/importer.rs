// 📥 Import Orchestrator
// raw text → delimiter → header scan → row parse → sink + one summary signal
//
// Per-row problems are counted, never raised. Only two things fail an import:
// a binary spreadsheet file name, and a file where no row was accepted.

use super::delimiter::{detect_delimiter, Delimiter};
use super::header::{classify_header, ColumnMapping};
use super::row::{RowOutcome, RowParser, SkipReason};
use crate::config::ImportConfig;
use crate::error::ImportError;
use crate::model::Bill;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;

/// Shown when nothing could be imported
pub const EMPTY_IMPORT_MESSAGE: &str =
    "Could not import any bills. Check the file format (expected: Description; Value; Due date).";

/// Shown when a binary spreadsheet is offered
pub const UNSUPPORTED_FILE_MESSAGE: &str =
    "Please save your spreadsheet as a CSV file before importing.";

// ============================================================================
// COLLABORATORS
// ============================================================================

/// Receives every accepted bill ("add bill")
pub trait BillSink {
    fn add_bill(&mut self, bill: Bill) -> anyhow::Result<()>;
}

impl BillSink for Vec<Bill> {
    fn add_bill(&mut self, bill: Bill) -> anyhow::Result<()> {
        self.push(bill);
        Ok(())
    }
}

/// Terminal signal of an import, one per call
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ImportOutcome {
    Imported { count: usize },
    Failed { reason: String },
}

impl ImportOutcome {
    pub fn message(&self) -> String {
        match self {
            ImportOutcome::Imported { count } => format!("{} bills imported successfully!", count),
            ImportOutcome::Failed { reason } => reason.clone(),
        }
    }
}

/// Receives the terminal summary (a UI alert, a log line, a test vector)
pub trait ImportReporter {
    fn report(&mut self, outcome: &ImportOutcome);
}

impl<F: FnMut(&ImportOutcome)> ImportReporter for F {
    fn report(&mut self, outcome: &ImportOutcome) {
        self(outcome)
    }
}

/// Reporter that only writes to the tracing log
pub struct LogReporter;

impl ImportReporter for LogReporter {
    fn report(&mut self, outcome: &ImportOutcome) {
        match outcome {
            ImportOutcome::Imported { count } => tracing::info!(count, "import finished"),
            ImportOutcome::Failed { reason } => tracing::warn!(%reason, "import failed"),
        }
    }
}

// ============================================================================
// SUMMARY
// ============================================================================

/// A line that did not become a bill
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedRow {
    /// 1-based line number in the source text
    pub line_number: usize,
    pub reason: SkipReason,
}

/// What happened during one import call
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportSummary {
    pub delimiter: Delimiter,
    pub mapping: ColumnMapping,
    /// 0-based line index of the detected header row
    pub header_line: Option<usize>,
    /// Non-blank data lines handed to the row parser
    pub processed: usize,
    /// Bills delivered to the sink
    pub imported: usize,
    pub skipped: Vec<SkippedRow>,
}

impl ImportSummary {
    /// Skipped rows per `SkipReason::code`
    pub fn skip_counts(&self) -> BTreeMap<&'static str, usize> {
        let mut counts = BTreeMap::new();
        for row in &self.skipped {
            *counts.entry(row.reason.code()).or_insert(0) += 1;
        }
        counts
    }
}

/// Parse result before anything is sent to a sink
#[derive(Debug, Clone)]
pub struct ParsedImport {
    pub bills: Vec<Bill>,
    pub summary: ImportSummary,
}

// ============================================================================
// FILE TYPE CHECK
// ============================================================================

/// `.xlsx` / `.xls` (any case) - binary formats the importer refuses
pub fn is_spreadsheet_binary(file_name: &str) -> bool {
    Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| matches!(ext.to_ascii_lowercase().as_str(), "xlsx" | "xls"))
        .unwrap_or(false)
}

// ============================================================================
// IMPORTER
// ============================================================================

pub struct Importer {
    config: ImportConfig,
}

impl Importer {
    pub fn new(config: ImportConfig) -> Self {
        Importer { config }
    }

    pub fn config(&self) -> &ImportConfig {
        &self.config
    }

    /// Detect, classify and parse every line. No sink is involved.
    pub fn parse_text(&self, text: &str) -> ParsedImport {
        let text = text.strip_prefix('\u{feff}').unwrap_or(text);
        let lines: Vec<&str> = text.lines().collect();

        let delimiter = detect_delimiter(text);
        let scan = classify_header(
            &lines,
            delimiter,
            &self.config.synonyms,
            self.config.header_scan_limit,
        );
        let parser = RowParser::new(delimiter, scan.mapping, &self.config);

        let mut bills = Vec::new();
        let mut skipped = Vec::new();
        let mut processed = 0;

        for (index, line) in lines.iter().enumerate().skip(scan.data_start()) {
            if line.trim().is_empty() {
                continue;
            }
            processed += 1;

            match parser.parse(line) {
                RowOutcome::Accepted(bill) => bills.push(bill),
                RowOutcome::Skipped(reason) => {
                    tracing::debug!(line = index + 1, %reason, "row skipped");
                    skipped.push(SkippedRow {
                        line_number: index + 1,
                        reason,
                    });
                }
            }
        }

        let summary = ImportSummary {
            delimiter,
            mapping: scan.mapping,
            header_line: scan.header_line,
            processed,
            imported: 0,
            skipped,
        };

        ParsedImport { bills, summary }
    }

    /// Run a full import.
    ///
    /// `file_name` is only used to refuse binary spreadsheets. Accepted bills
    /// go to `sink` after the whole text is parsed; `reporter` receives
    /// exactly one outcome.
    pub fn import(
        &self,
        file_name: Option<&str>,
        text: &str,
        sink: &mut dyn BillSink,
        reporter: &mut dyn ImportReporter,
    ) -> Result<ImportSummary, ImportError> {
        if let Some(name) = file_name.filter(|name| is_spreadsheet_binary(name)) {
            tracing::warn!(file = name, "binary spreadsheet rejected");
            reporter.report(&ImportOutcome::Failed {
                reason: UNSUPPORTED_FILE_MESSAGE.to_string(),
            });
            return Err(ImportError::UnsupportedFileType {
                file_name: name.to_string(),
            });
        }

        let ParsedImport { bills, mut summary } = self.parse_text(text);

        if bills.is_empty() {
            tracing::warn!(
                processed = summary.processed,
                skipped = summary.skipped.len(),
                "no rows accepted"
            );
            reporter.report(&ImportOutcome::Failed {
                reason: EMPTY_IMPORT_MESSAGE.to_string(),
            });
            return Err(ImportError::EmptyImport {
                processed: summary.processed,
                skipped: summary.skipped.len(),
            });
        }

        for bill in bills {
            if let Err(err) = sink.add_bill(bill) {
                reporter.report(&ImportOutcome::Failed {
                    reason: format!("Failed to save imported bills: {}", err),
                });
                return Err(ImportError::Sink(err));
            }
            summary.imported += 1;
        }

        tracing::info!(
            imported = summary.imported,
            processed = summary.processed,
            skipped = summary.skipped.len(),
            delimiter = %summary.delimiter.as_char(),
            header_line = ?summary.header_line,
            "import complete"
        );
        reporter.report(&ImportOutcome::Imported {
            count: summary.imported,
        });

        Ok(summary)
    }
}

impl Default for Importer {
    fn default() -> Self {
        Importer::new(ImportConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::header::BillField;
    use crate::logging;
    use crate::model::BillStatus;
    use std::collections::HashSet;

    fn run(file_name: Option<&str>, text: &str) -> (Result<ImportSummary, ImportError>, Vec<Bill>, Vec<ImportOutcome>) {
        logging::init_test();
        let importer = Importer::default();
        let mut sink: Vec<Bill> = Vec::new();
        let mut outcomes: Vec<ImportOutcome> = Vec::new();
        let result = importer.import(
            file_name,
            text,
            &mut sink,
            &mut |outcome: &ImportOutcome| outcomes.push(outcome.clone()),
        );
        (result, sink, outcomes)
    }

    #[test]
    fn test_partial_failure_still_succeeds() {
        let text = "Descricao;Valor;Vencimento\n\
                    Energia;150,50;10/12/2024\n\
                    Internet;99,90;\n\
                    Agua;80,00;15/12/2024\n\
                    Aluguel;1.200,00;\n\
                    Escola;450;20/12/2024\n";

        let (result, sink, outcomes) = run(Some("contas.csv"), text);
        let summary = result.unwrap();

        assert_eq!(summary.processed, 5);
        assert_eq!(summary.imported, 3);
        assert_eq!(sink.len(), 3);
        assert_eq!(outcomes, vec![ImportOutcome::Imported { count: 3 }]);
        assert_eq!(summary.skip_counts().get("missing_field"), Some(&2));
        assert_eq!(summary.skipped[0].line_number, 3);
        assert_eq!(
            summary.skipped[0].reason,
            SkipReason::MissingField { field: BillField::DueDate }
        );

        println!("✅ Partial failure import PASSED: {}", outcomes[0].message());
    }

    #[test]
    fn test_xlsx_rejected_before_parsing() {
        let text = "Descricao;Valor;Vencimento\nEnergia;150,50;10/12/2024\n";

        let (result, sink, outcomes) = run(Some("sheet.xlsx"), text);

        assert!(matches!(
            result,
            Err(ImportError::UnsupportedFileType { ref file_name }) if file_name == "sheet.xlsx"
        ));
        assert!(sink.is_empty());
        assert_eq!(
            outcomes,
            vec![ImportOutcome::Failed { reason: UNSUPPORTED_FILE_MESSAGE.to_string() }]
        );
    }

    #[test]
    fn test_spreadsheet_extension_check() {
        assert!(is_spreadsheet_binary("sheet.xlsx"));
        assert!(is_spreadsheet_binary("OLD.XLS"));
        assert!(!is_spreadsheet_binary("contas.csv"));
        assert!(!is_spreadsheet_binary("xlsx"));
        assert!(!is_spreadsheet_binary("notes.txt"));
    }

    #[test]
    fn test_empty_import_is_failure() {
        let (result, sink, outcomes) = run(None, "Descricao;Valor;Vencimento\nEnergia;abc;10/12/2024\n\n");

        assert!(matches!(
            result,
            Err(ImportError::EmptyImport { processed: 1, skipped: 1 })
        ));
        assert!(sink.is_empty());
        assert_eq!(
            outcomes,
            vec![ImportOutcome::Failed { reason: EMPTY_IMPORT_MESSAGE.to_string() }]
        );
    }

    #[test]
    fn test_blank_text_is_failure() {
        let (result, _, _) = run(Some("empty.csv"), "\n  \n");
        assert!(matches!(result, Err(ImportError::EmptyImport { processed: 0, skipped: 0 })));
    }

    #[test]
    fn test_headerless_comma_file() {
        let text = "Rent,\"1,200.00\",2024-01-05\nPower,80.10,2024/01/10,123456\n";
        let importer = Importer::default();
        let parsed = importer.parse_text(text);

        // The quoted thousands separator splits the first row into four cells
        assert_eq!(parsed.summary.delimiter, Delimiter::Comma);
        assert_eq!(parsed.summary.header_line, None);
        assert_eq!(parsed.summary.processed, 2);
        assert_eq!(parsed.bills.len(), 1);
        assert_eq!(parsed.bills[0].title, "Power");
        assert_eq!(parsed.bills[0].barcode.as_deref(), Some("123456"));
        assert_eq!(parsed.summary.imported, 0);
    }

    #[test]
    fn test_ids_unique_and_status_pending() {
        let mut text = String::from("Descricao;Valor;Vencimento\n");
        for day in 1..=28 {
            text.push_str(&format!("Conta {};10,00;{:02}/02/2024\n", day, day));
        }

        let (result, sink, _) = run(Some("fev.csv"), &text);
        assert_eq!(result.unwrap().imported, 28);

        let ids: HashSet<&str> = sink.iter().map(|b| b.id.as_str()).collect();
        assert_eq!(ids.len(), 28);
        assert!(sink.iter().all(|b| b.status == BillStatus::Pending));
    }

    #[test]
    fn test_bom_and_crlf() {
        let text = "\u{feff}Descricao;Valor;Vencimento\r\nEnergia;150,50;10/12/2024\r\n";
        let parsed = Importer::default().parse_text(text);

        assert_eq!(parsed.summary.header_line, Some(0));
        assert_eq!(parsed.bills.len(), 1);
        assert_eq!(parsed.bills[0].due_date_iso(), "2024-12-10");
    }

    struct FailingSink {
        accepted: usize,
    }

    impl BillSink for FailingSink {
        fn add_bill(&mut self, _bill: Bill) -> anyhow::Result<()> {
            if self.accepted == 1 {
                anyhow::bail!("disk full");
            }
            self.accepted += 1;
            Ok(())
        }
    }

    #[test]
    fn test_sink_failure_is_reported() {
        let text = "Energia;150,50;10/12/2024\nAgua;80;11/12/2024\n";
        let mut sink = FailingSink { accepted: 0 };
        let mut outcomes = Vec::new();

        let result = Importer::default().import(
            Some("contas.csv"),
            text,
            &mut sink,
            &mut |outcome: &ImportOutcome| outcomes.push(outcome.clone()),
        );

        assert!(matches!(result, Err(ImportError::Sink(_))));
        assert_eq!(sink.accepted, 1);
        assert_eq!(outcomes.len(), 1);
        assert!(outcomes[0].message().contains("disk full"));
    }

    #[test]
    fn test_explicit_locale_changes_reading() {
        let config = ImportConfig {
            number_locale: crate::ingest::row::NumberLocale::DotDecimal,
            ..ImportConfig::default()
        };
        let parsed = Importer::new(config).parse_text("Power;1,234;2024-01-10\n");

        assert_eq!(parsed.bills[0].value, 1234.0);
    }
}

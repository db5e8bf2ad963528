// 🔎 Header Classifier
// Finds an optional header row and maps logical bill fields to column indices.
//
// Synonyms are data, not code: `HeaderSynonyms` is a plain table that can be
// replaced from a JSON config file (see `config::ImportConfig`).

use super::delimiter::Delimiter;
use serde::{Deserialize, Serialize};

// ============================================================================
// FIELDS
// ============================================================================

/// Logical columns of an imported bill
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BillField {
    Title,
    Value,
    DueDate,
    Barcode,
}

impl BillField {
    pub fn name(&self) -> &'static str {
        match self {
            BillField::Title => "title",
            BillField::Value => "value",
            BillField::DueDate => "due date",
            BillField::Barcode => "barcode",
        }
    }
}

// ============================================================================
// FIELD SPLITTING (shared with the row parser)
// ============================================================================

/// Split a line on `delimiter`, trim every cell and strip one layer of
/// matching single or double quotes.
pub fn split_fields(line: &str, delimiter: Delimiter) -> Vec<String> {
    line.split(delimiter.as_char())
        .map(|cell| strip_quotes(cell.trim()).trim().to_string())
        .collect()
}

fn strip_quotes(cell: &str) -> &str {
    let bytes = cell.as_bytes();
    if bytes.len() >= 2 {
        let first = bytes[0];
        let last = bytes[bytes.len() - 1];
        if first == last && (first == b'"' || first == b'\'') {
            return &cell[1..cell.len() - 1];
        }
    }
    cell
}

// ============================================================================
// SYNONYM TABLE
// ============================================================================

/// Recognized header names per field, all lowercase.
///
/// A header cell matches a field when it contains one of the field's
/// synonyms, so `dt_venc` and `codigobarras` are recognized as well.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeaderSynonyms {
    pub title: Vec<String>,
    pub value: Vec<String>,
    pub due_date: Vec<String>,
    pub barcode: Vec<String>,
}

fn owned(words: &[&str]) -> Vec<String> {
    words.iter().map(|w| w.to_string()).collect()
}

impl Default for HeaderSynonyms {
    fn default() -> Self {
        HeaderSynonyms {
            title: owned(&[
                "descricao", "descrição", "titulo", "título", "nome", "loja",
                "estabelecimento", "historico", "histórico",
                "description", "title", "name", "store", "merchant", "history",
            ]),
            value: owned(&[
                "valor", "preco", "preço", "total", "quantia", "debito", "débito",
                "value", "price", "amount", "debit",
            ]),
            due_date: owned(&[
                "vencimento", "venc", "data", "dia",
                "due date", "date", "day", "due",
            ]),
            barcode: owned(&[
                "codigo", "código", "barras", "linha", "boleto",
                "code", "barcode", "line", "bill-line",
            ]),
        }
    }
}

impl HeaderSynonyms {
    pub fn synonyms(&self, field: BillField) -> &[String] {
        match field {
            BillField::Title => &self.title,
            BillField::Value => &self.value,
            BillField::DueDate => &self.due_date,
            BillField::Barcode => &self.barcode,
        }
    }

    /// Does a lowercase header cell name this field?
    pub fn matches(&self, field: BillField, cell: &str) -> bool {
        !cell.is_empty()
            && self
                .synonyms(field)
                .iter()
                .any(|synonym| cell.contains(synonym.as_str()))
    }

    /// Index of the first cell naming `field`
    pub fn find(&self, field: BillField, cells: &[String]) -> Option<usize> {
        cells.iter().position(|cell| self.matches(field, cell))
    }
}

// ============================================================================
// COLUMN MAPPING
// ============================================================================

/// Logical field → physical column index. Built once per import.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMapping {
    pub title: usize,
    pub value: usize,
    pub due_date: usize,
    pub barcode: usize,
}

impl Default for ColumnMapping {
    /// Positional layout: Description, Value, Due date, Barcode
    fn default() -> Self {
        ColumnMapping {
            title: 0,
            value: 1,
            due_date: 2,
            barcode: 3,
        }
    }
}

impl ColumnMapping {
    pub fn index(&self, field: BillField) -> usize {
        match field {
            BillField::Title => self.title,
            BillField::Value => self.value,
            BillField::DueDate => self.due_date,
            BillField::Barcode => self.barcode,
        }
    }
}

// ============================================================================
// CLASSIFIER
// ============================================================================

/// Result of the header scan
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderScan {
    pub mapping: ColumnMapping,
    /// Raw line index of the header row, if one was found
    pub header_line: Option<usize>,
}

impl HeaderScan {
    /// First raw line index that may hold data
    pub fn data_start(&self) -> usize {
        self.header_line.map_or(0, |line| line + 1)
    }
}

/// Scan at most `scan_limit` non-blank lines for a header row.
///
/// The first line with a title, value or due-date synonym wins. Its matches
/// overwrite the default mapping; the barcode index moves only when a barcode
/// synonym is present too.
pub fn classify_header(
    lines: &[&str],
    delimiter: Delimiter,
    synonyms: &HeaderSynonyms,
    scan_limit: usize,
) -> HeaderScan {
    let candidates = lines
        .iter()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .take(scan_limit);

    for (line_index, line) in candidates {
        let cells: Vec<String> = split_fields(line, delimiter)
            .into_iter()
            .map(|cell| cell.to_lowercase())
            .collect();

        let title = synonyms.find(BillField::Title, &cells);
        let value = synonyms.find(BillField::Value, &cells);
        let due_date = synonyms.find(BillField::DueDate, &cells);

        if title.is_none() && value.is_none() && due_date.is_none() {
            continue;
        }

        let defaults = ColumnMapping::default();
        let mapping = ColumnMapping {
            title: title.unwrap_or(defaults.title),
            value: value.unwrap_or(defaults.value),
            due_date: due_date.unwrap_or(defaults.due_date),
            barcode: synonyms
                .find(BillField::Barcode, &cells)
                .unwrap_or(defaults.barcode),
        };

        tracing::debug!(line = line_index, ?mapping, "header row detected");

        return HeaderScan {
            mapping,
            header_line: Some(line_index),
        };
    }

    tracing::debug!("no header row found, using positional mapping");
    HeaderScan {
        mapping: ColumnMapping::default(),
        header_line: None,
    }
}

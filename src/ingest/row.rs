// 🧮 Row Parser
// One data line in, one tagged outcome out: Accepted(Bill) or Skipped(reason).
// Nothing in here fails the batch.

use super::delimiter::Delimiter;
use super::header::{split_fields, BillField, ColumnMapping};
use crate::config::ImportConfig;
use crate::model::Bill;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// NUMBER LOCALE
// ============================================================================

/// How decimal and thousands separators are read in the value column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NumberLocale {
    /// Guess per value: the separator that comes last is the decimal one.
    /// A lone comma is read as decimal ("100,50" → 100.50).
    #[default]
    Auto,
    /// `1.234,56` - dots group thousands, comma is decimal
    CommaDecimal,
    /// `1,234.56` - commas group thousands, dot is decimal
    DotDecimal,
}

impl FromStr for NumberLocale {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('_', "-").as_str() {
            "auto" => Ok(NumberLocale::Auto),
            "comma-decimal" | "br" | "pt-br" => Ok(NumberLocale::CommaDecimal),
            "dot-decimal" | "us" | "en-us" => Ok(NumberLocale::DotDecimal),
            other => Err(format!(
                "unknown number locale '{}' (expected auto, comma-decimal or dot-decimal)",
                other
            )),
        }
    }
}

// ============================================================================
// OUTCOME
// ============================================================================

/// Why a line did not become a bill
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SkipReason {
    /// Fewer than two fields after splitting
    MalformedRow { fields: usize },
    /// Title, value or due date cell is empty (or missing)
    MissingField { field: BillField },
    /// Value is not a finite number after normalization
    ValueParseFailure { raw: String },
    /// Value parsed but is below zero
    NegativeValue { value: f64 },
    /// Normalized date shorter than `YYYY-M-D`
    DateTooShort { raw: String },
    /// Normalized date is not a real calendar day
    InvalidDate { raw: String },
}

impl SkipReason {
    /// Stable short code, used as the key of skip counters
    pub fn code(&self) -> &'static str {
        match self {
            SkipReason::MalformedRow { .. } => "malformed_row",
            SkipReason::MissingField { .. } => "missing_field",
            SkipReason::ValueParseFailure { .. } => "value_parse_failure",
            SkipReason::NegativeValue { .. } => "negative_value",
            SkipReason::DateTooShort { .. } => "date_too_short",
            SkipReason::InvalidDate { .. } => "invalid_date",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::MalformedRow { fields } => write!(f, "only {} field(s) on line", fields),
            SkipReason::MissingField { field } => write!(f, "{} is empty", field.name()),
            SkipReason::ValueParseFailure { raw } => write!(f, "value '{}' is not a number", raw),
            SkipReason::NegativeValue { value } => write!(f, "value {} is negative", value),
            SkipReason::DateTooShort { raw } => write!(f, "date '{}' is too short", raw),
            SkipReason::InvalidDate { raw } => write!(f, "date '{}' is not a valid calendar date", raw),
        }
    }
}

/// Outcome of parsing one line
#[derive(Debug, Clone, PartialEq)]
pub enum RowOutcome {
    Accepted(Bill),
    Skipped(SkipReason),
}

impl RowOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, RowOutcome::Accepted(_))
    }
}

// ============================================================================
// VALUE NORMALIZATION
// ============================================================================

/// Turn a loosely formatted amount into a number.
///
/// Currency markers and whitespace are removed first, then separators are
/// resolved according to `locale`. Returns `None` unless the result is a
/// finite number.
///
/// # Examples:
/// ```
/// use bill_ledger::ingest::row::{normalize_value, NumberLocale};
///
/// let markers = vec!["R$".to_string()];
/// assert_eq!(normalize_value("1.234,56", NumberLocale::Auto, &markers), Some(1234.56));
/// assert_eq!(normalize_value("R$ 50", NumberLocale::Auto, &markers), Some(50.0));
/// ```
pub fn normalize_value(raw: &str, locale: NumberLocale, currency_markers: &[String]) -> Option<f64> {
    let mut cleaned = raw.to_string();
    for marker in currency_markers.iter().filter(|m| !m.is_empty()) {
        cleaned = cleaned.replace(marker.as_str(), "");
    }
    cleaned.retain(|c| !c.is_whitespace());

    let comma_is_decimal = match locale {
        NumberLocale::CommaDecimal => true,
        NumberLocale::DotDecimal => false,
        NumberLocale::Auto => match (cleaned.rfind('.'), cleaned.rfind(',')) {
            (None, Some(_)) => true,
            (Some(dot), Some(comma)) => comma > dot,
            _ => false,
        },
    };

    let canonical = if comma_is_decimal {
        cleaned.replace('.', "").replacen(',', ".", 1)
    } else {
        cleaned.replace(',', "")
    };

    canonical.parse::<f64>().ok().filter(|v| v.is_finite())
}

// ============================================================================
// DATE NORMALIZATION
// ============================================================================

/// Rewrite a slash date into ISO order.
///
/// - `YYYY/MM/DD` → `YYYY-MM-DD`
/// - `DD/MM/YYYY` → `YYYY-MM-DD`
/// - anything with a slash but not exactly three parts → empty string
/// - no slash → returned unchanged (assumed ISO already)
pub fn normalize_date(raw: &str) -> String {
    if !raw.contains('/') {
        return raw.to_string();
    }

    let parts: Vec<&str> = raw.split('/').collect();
    match parts.as_slice() {
        [year, month, day] if year.len() == 4 => format!("{}-{}-{}", year, month, day),
        [day, month, year] => format!("{}-{}-{}", year, month, day),
        _ => String::new(),
    }
}

/// Normalize and validate a raw due date cell
pub fn parse_due_date(raw: &str) -> Result<NaiveDate, SkipReason> {
    let normalized = normalize_date(raw);

    if normalized.chars().count() < 8 {
        return Err(SkipReason::DateTooShort { raw: raw.to_string() });
    }

    NaiveDate::parse_from_str(&normalized, "%Y-%m-%d")
        .map_err(|_| SkipReason::InvalidDate { raw: raw.to_string() })
}

// ============================================================================
// ROW PARSER
// ============================================================================

/// Parses data lines with a fixed delimiter and column mapping
pub struct RowParser<'a> {
    delimiter: Delimiter,
    mapping: ColumnMapping,
    config: &'a ImportConfig,
}

impl<'a> RowParser<'a> {
    pub fn new(delimiter: Delimiter, mapping: ColumnMapping, config: &'a ImportConfig) -> Self {
        RowParser {
            delimiter,
            mapping,
            config,
        }
    }

    pub fn parse(&self, line: &str) -> RowOutcome {
        match self.try_parse(line) {
            Ok(bill) => RowOutcome::Accepted(bill),
            Err(reason) => RowOutcome::Skipped(reason),
        }
    }

    fn try_parse(&self, line: &str) -> Result<Bill, SkipReason> {
        let cells = split_fields(line, self.delimiter);
        if cells.len() < 2 {
            return Err(SkipReason::MalformedRow { fields: cells.len() });
        }

        let cell = |field: BillField| cell_at(&cells, self.mapping.index(field));

        // Opt-in: the only field ever filled from config instead of the row
        let title = match (cell(BillField::Title), &self.config.default_title) {
            ("", Some(fallback)) => fallback.trim(),
            (title, _) => title,
        };
        let raw_value = cell(BillField::Value);
        let raw_date = cell(BillField::DueDate);

        if title.is_empty() {
            return Err(SkipReason::MissingField { field: BillField::Title });
        }
        if raw_value.is_empty() {
            return Err(SkipReason::MissingField { field: BillField::Value });
        }
        if raw_date.is_empty() {
            return Err(SkipReason::MissingField { field: BillField::DueDate });
        }

        let value = normalize_value(raw_value, self.config.number_locale, &self.config.currency_markers)
            .ok_or_else(|| SkipReason::ValueParseFailure { raw: raw_value.to_string() })?;
        if value < 0.0 {
            return Err(SkipReason::NegativeValue { value });
        }

        let due_date = parse_due_date(raw_date)?;

        let barcode = match cell(BillField::Barcode) {
            "" => None,
            code => Some(code.to_string()),
        };

        Ok(Bill::pending(title.to_string(), value, due_date, barcode))
    }
}

/// Cell at `index`, or "" when the line is shorter
fn cell_at(cells: &[String], index: usize) -> &str {
    cells.get(index).map(String::as_str).unwrap_or("")
}

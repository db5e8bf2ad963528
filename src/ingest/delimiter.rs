// Delimiter Detector
// Only the first non-blank line is consulted.

use serde::{Deserialize, Serialize};

/// Field separators the importer understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Delimiter {
    Semicolon,
    Comma,
}

impl Delimiter {
    pub fn as_char(&self) -> char {
        match self {
            Delimiter::Semicolon => ';',
            Delimiter::Comma => ',',
        }
    }

    pub fn as_byte(&self) -> u8 {
        self.as_char() as u8
    }
}

/// Pick the delimiter for `text`.
///
/// Counts `;` and `,` on the first line with non-whitespace content.
/// Ties go to `;`: comma-decimal locales put commas inside amounts.
///
/// # Examples:
/// ```
/// use bill_ledger::ingest::delimiter::{detect_delimiter, Delimiter};
///
/// assert_eq!(detect_delimiter("a;b;c;d,e"), Delimiter::Semicolon);
/// assert_eq!(detect_delimiter("a,b,c"), Delimiter::Comma);
/// ```
pub fn detect_delimiter(text: &str) -> Delimiter {
    let first_line = text
        .lines()
        .find(|line| !line.trim().is_empty())
        .unwrap_or("");

    let semicolons = first_line.matches(';').count();
    let commas = first_line.matches(',').count();

    if semicolons >= commas {
        Delimiter::Semicolon
    } else {
        Delimiter::Comma
    }
}

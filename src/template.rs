// 📄 CSV Template & Export
// The template names the canonical header vocabulary; the export writes bills
// back in the same layout so a file can be re-imported.

use crate::model::Bill;
use anyhow::Result;
use csv::{QuoteStyle, WriterBuilder};
use std::io::Write;

pub const TEMPLATE_FILE_NAME: &str = "bill_template.csv";

/// Downloadable example file
pub const TEMPLATE_CSV: &str = "Descricao;Valor;Vencimento;CodigoBarras\n\
                                Energia;150,50;10/12/2024;\n\
                                Internet;99,90;15/12/2024;\n";

/// Canonical header row
pub const TEMPLATE_HEADER: [&str; 4] = ["Descricao", "Valor", "Vencimento", "CodigoBarras"];

/// `1234.5` → `1234,5`, `1.234` → `1,234` (full precision, no rounding)
fn format_comma_decimal(value: f64) -> String {
    value.to_string().replace('.', ",")
}

/// The importer splits lines on `;` without quote handling, so text cells
/// must not carry the delimiter, quotes or line breaks.
fn plain_cell(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            ';' => ',',
            '"' => '\'',
            '\r' | '\n' => ' ',
            other => other,
        })
        .collect()
}

/// Write `bills` as `;`-separated CSV with comma decimals and DD/MM/YYYY dates.
///
/// Text cells are written unquoted; `;` becomes `,` and `"` becomes `'`.
/// A title wrapped entirely in quotes loses the wrapper on re-import.
pub fn export_bills_csv<W: Write>(writer: W, bills: &[Bill]) -> Result<()> {
    let mut wtr = WriterBuilder::new()
        .delimiter(b';')
        .quote_style(QuoteStyle::Never)
        .from_writer(writer);

    wtr.write_record(TEMPLATE_HEADER)?;
    for bill in bills {
        wtr.write_record([
            plain_cell(&bill.title),
            format_comma_decimal(bill.value),
            bill.due_date.format("%d/%m/%Y").to_string(),
            plain_cell(bill.barcode.as_deref().unwrap_or("")),
        ])?;
    }

    wtr.flush()?;
    Ok(())
}

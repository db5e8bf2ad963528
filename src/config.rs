// ⚙️ Configuration
// ImportConfig: how the importer reads numbers and headers (JSON file).
// AppConfig: where the binaries keep their data (environment / .env).

use crate::ingest::header::HeaderSynonyms;
use crate::ingest::row::NumberLocale;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

// ============================================================================
// IMPORT CONFIG
// ============================================================================

/// Settings for one import call. Every field has a default, so a JSON file
/// only needs the keys it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportConfig {
    /// Separator convention of the value column
    pub number_locale: NumberLocale,

    /// Non-blank lines inspected when looking for a header row
    pub header_scan_limit: usize,

    /// Removed from value cells before parsing (longest first)
    pub currency_markers: Vec<String>,

    /// Title used when a row's title cell is empty. `None` (the default) skips
    /// such rows. Setting it is an opt-in exception to the rule that an
    /// accepted row never carries filled-in defaults: only the title is ever
    /// substituted, and value and due date must still come from the row.
    pub default_title: Option<String>,

    /// Header vocabulary per field
    pub synonyms: HeaderSynonyms,
}

impl Default for ImportConfig {
    fn default() -> Self {
        ImportConfig {
            number_locale: NumberLocale::Auto,
            header_scan_limit: 10,
            currency_markers: vec![
                "R$".to_string(),
                "US$".to_string(),
                "$".to_string(),
                "€".to_string(),
                "£".to_string(),
            ],
            default_title: None,
            synonyms: HeaderSynonyms::default(),
        }
    }
}

impl ImportConfig {
    /// Load from a JSON file
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path)
            .with_context(|| format!("Failed to read import config: {}", path.display()))?;
        Self::from_json_str(&json)
            .with_context(|| format!("Invalid import config: {}", path.display()))
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let mut config: ImportConfig =
            serde_json::from_str(json).context("Failed to parse import config JSON")?;
        config.normalize();
        Ok(config)
    }

    /// Synonyms are matched against lowercased cells, and longer currency
    /// markers must be stripped before their suffixes ("US$" before "$").
    fn normalize(&mut self) {
        for list in [
            &mut self.synonyms.title,
            &mut self.synonyms.value,
            &mut self.synonyms.due_date,
            &mut self.synonyms.barcode,
        ] {
            for synonym in list.iter_mut() {
                *synonym = synonym.trim().to_lowercase();
            }
            list.retain(|s| !s.is_empty());
        }

        self.currency_markers
            .sort_by(|a, b| b.chars().count().cmp(&a.chars().count()));
    }
}

// ============================================================================
// APP CONFIG
// ============================================================================

/// Runtime settings for the CLI and server
///
/// | Env Var                     | Default          |
/// |-----------------------------|------------------|
/// | `BILL_LEDGER_DB`            | `bills.db`       |
/// | `BILL_LEDGER_ADDR`          | `127.0.0.1:3000` |
/// | `BILL_LEDGER_IMPORT_CONFIG` | (built-in)       |
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_path: PathBuf,
    pub server_addr: String,
    pub import: ImportConfig,
}

impl AppConfig {
    /// Read `.env` (if present) and the process environment
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();

        let database_path = std::env::var("BILL_LEDGER_DB")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("bills.db"));

        let server_addr =
            std::env::var("BILL_LEDGER_ADDR").unwrap_or_else(|_| "127.0.0.1:3000".into());

        let import = match std::env::var("BILL_LEDGER_IMPORT_CONFIG") {
            Ok(path) if !path.trim().is_empty() => ImportConfig::from_json_file(Path::new(&path))?,
            _ => ImportConfig::default(),
        };

        Ok(AppConfig {
            database_path,
            server_addr,
            import,
        })
    }
}

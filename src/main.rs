use anyhow::{bail, Context, Result};
use chrono::{Datelike, Local, NaiveDate};
use clap::{Parser, Subcommand};
use rusqlite::Connection;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use bill_ledger::ingest::is_spreadsheet_binary;
use bill_ledger::{
    bills_in_month, bills_on_day, delete_bill, expand, export_bills_csv, get_all_bills, get_bill,
    insert_bills, load_settings, logging, mark_paid, open_database, record_import, save_settings,
    update_bill, verify_count, AppConfig, Bill, BillPatch, BillStub, DashboardStats, ImportConfig,
    ImportError, ImportOutcome, Importer, NumberLocale, SqliteBillSink, TEMPLATE_CSV,
    TEMPLATE_FILE_NAME,
};

#[derive(Parser)]
#[command(name = "bill-ledger", version, about = "Household bill tracker: import, schedule and pay bills")]
struct Cli {
    /// SQLite database path (overrides BILL_LEDGER_DB)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Import bills from a CSV / text export
    Import {
        file: PathBuf,
        /// auto, comma-decimal or dot-decimal
        #[arg(long)]
        locale: Option<NumberLocale>,
        /// JSON import config (overrides BILL_LEDGER_IMPORT_CONFIG)
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Add a bill, optionally repeated monthly
    Add {
        #[arg(long)]
        title: String,
        #[arg(long)]
        value: f64,
        /// First due date, YYYY-MM-DD
        #[arg(long)]
        due: NaiveDate,
        /// Number of monthly installments
        #[arg(long, default_value_t = 1)]
        repeat: u32,
        #[arg(long)]
        barcode: Option<String>,
    },
    /// List bills, optionally for one month (YYYY-MM) or one day (YYYY-MM-DD)
    List {
        #[arg(long, value_parser = parse_month, conflicts_with = "day")]
        month: Option<(i32, u32)>,
        #[arg(long)]
        day: Option<NaiveDate>,
    },
    /// Mark a bill as paid
    Pay { id: String },
    /// Delete a bill
    Delete { id: String },
    /// Attach a receipt file to a bill
    Attach { id: String, file: PathBuf },
    /// Dashboard numbers
    Stats,
    /// Show or update income settings
    Settings {
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        income: Option<f64>,
        #[arg(long)]
        extra: Option<f64>,
    },
    /// Write the example CSV template
    Template {
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Export every bill as re-importable CSV
    Export {
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

/// `2024-12` → (2024, 12)
fn parse_month(s: &str) -> Result<(i32, u32), String> {
    let first = NaiveDate::parse_from_str(&format!("{}-01", s.trim()), "%Y-%m-%d")
        .map_err(|_| format!("expected YYYY-MM, got '{}'", s))?;
    Ok((first.year(), first.month()))
}

fn main() -> Result<()> {
    logging::init();

    let cli = Cli::parse();
    let mut config = AppConfig::from_env()?;
    if let Some(db) = cli.db {
        config.database_path = db;
    }

    match cli.command {
        Command::Import { file, locale, config: import_config } => {
            let mut import = match import_config {
                Some(path) => ImportConfig::from_json_file(&path)?,
                None => config.import.clone(),
            };
            if let Some(locale) = locale {
                import.number_locale = locale;
            }
            run_import(&config.database_path, &file, import)
        }
        Command::Add { title, value, due, repeat, barcode } => {
            let stub = BillStub { title, value, due_date: due, barcode };
            run_add(&config.database_path, &stub, repeat)
        }
        Command::List { month, day } => run_list(&config.database_path, month, day),
        Command::Pay { id } => {
            let conn = open_database(&config.database_path)?;
            if !mark_paid(&conn, &id)? {
                bail!("No bill with id {}", id);
            }
            println!("✅ Bill {} marked as paid", id);
            Ok(())
        }
        Command::Delete { id } => {
            let conn = open_database(&config.database_path)?;
            if !delete_bill(&conn, &id)? {
                bail!("No bill with id {}", id);
            }
            println!("🗑️  Bill {} deleted", id);
            Ok(())
        }
        Command::Attach { id, file } => run_attach(&config.database_path, &id, &file),
        Command::Stats => run_stats(&config.database_path),
        Command::Settings { name, income, extra } => {
            run_settings(&config.database_path, name, income, extra)
        }
        Command::Template { out } => {
            let out = out.unwrap_or_else(|| PathBuf::from(TEMPLATE_FILE_NAME));
            fs::write(&out, TEMPLATE_CSV)
                .with_context(|| format!("Failed to write template: {}", out.display()))?;
            println!("📄 Template written to {}", out.display());
            Ok(())
        }
        Command::Export { out } => run_export(&config.database_path, out.as_deref()),
    }
}

fn run_import(db_path: &Path, file: &Path, import: ImportConfig) -> Result<()> {
    println!("📥 Bill Import - CSV → SQLite");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let file_name = file
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();

    // Reject spreadsheets before reading their bytes
    let text = if is_spreadsheet_binary(&file_name) {
        String::new()
    } else {
        let bytes = fs::read(file)
            .with_context(|| format!("Failed to read import file: {}", file.display()))?;
        String::from_utf8_lossy(&bytes).into_owned()
    };

    let conn = open_database(db_path)?;
    let mut sink = SqliteBillSink::new(&conn, "cli");
    let mut reporter = |outcome: &ImportOutcome| match outcome {
        ImportOutcome::Imported { .. } => println!("\n✅ {}", outcome.message()),
        ImportOutcome::Failed { .. } => eprintln!("\n❌ {}", outcome.message()),
    };

    let importer = Importer::new(import);
    let summary = match importer.import(Some(&file_name), &text, &mut sink, &mut reporter) {
        Ok(summary) => summary,
        Err(ImportError::Sink(err)) => {
            return Err(err.context(format!(
                "Import stopped after {} bills were saved",
                sink.inserted()
            )))
        }
        Err(err) => return Err(err.into()),
    };

    record_import(&conn, &file_name, &text, summary.imported)?;

    println!("\n📊 Summary");
    println!("✓ Delimiter: '{}'", summary.delimiter.as_char());
    match summary.header_line {
        Some(line) => println!("✓ Header found on line {}", line + 1),
        None => println!("✓ No header row (positional columns)"),
    }
    println!("✓ Rows processed: {}", summary.processed);
    println!("✓ Bills imported: {}", summary.imported);
    if !summary.skipped.is_empty() {
        println!("⚠️  Rows skipped: {}", summary.skipped.len());
        for (code, count) in summary.skip_counts() {
            println!("   {:<20} {}", code, count);
        }
    }
    println!("✓ Database now holds {} bills", verify_count(&conn)?);

    Ok(())
}

fn run_add(db_path: &Path, stub: &BillStub, repeat: u32) -> Result<()> {
    let bills = expand(stub, repeat)?;
    let conn = open_database(db_path)?;
    let inserted = insert_bills(&conn, &bills, "cli")?;

    println!("✅ Added {} bill(s)", inserted);
    for bill in &bills {
        print_bill(bill);
    }
    Ok(())
}

fn run_list(db_path: &Path, month: Option<(i32, u32)>, day: Option<NaiveDate>) -> Result<()> {
    let conn = open_database(db_path)?;
    let bills = get_all_bills(&conn)?;

    let selected: Vec<&Bill> = match (month, day) {
        (_, Some(day)) => bills_on_day(&bills, day),
        (Some((year, month)), None) => bills_in_month(&bills, year, month),
        (None, None) => bills.iter().collect(),
    };

    if selected.is_empty() {
        println!("No bills found.");
        return Ok(());
    }

    let today = Local::now().date_naive();
    for bill in selected {
        print_bill(bill);
        if !bill.is_paid() && bill.due_date < today {
            println!("   ⚠️  overdue");
        }
        if let Some(receipt) = &bill.receipt {
            println!("   📎 {}", receipt);
        }
    }
    Ok(())
}

fn run_attach(db_path: &Path, id: &str, file: &Path) -> Result<()> {
    let receipt = fs::canonicalize(file)
        .with_context(|| format!("Receipt file not found: {}", file.display()))?;

    let conn = open_database(db_path)?;
    let Some(mut bill) = get_bill(&conn, id)? else {
        bail!("No bill with id {}", id);
    };

    BillPatch::receipt(receipt.to_string_lossy()).apply(&mut bill)?;
    update_bill(&conn, &bill)?;

    println!("📎 Receipt attached to {}", bill.title);
    println!("   {}", receipt.display());
    Ok(())
}

fn run_stats(db_path: &Path) -> Result<()> {
    let conn = open_database(db_path)?;
    let bills = get_all_bills(&conn)?;
    let settings = load_settings(&conn)?;
    let stats = DashboardStats::compute(&bills, &settings);

    if !settings.user_name.is_empty() {
        println!("👋 Hello, {}", settings.user_name);
    }
    println!("📊 Dashboard");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("Pending bills:   {}", stats.total_pending);
    println!("Total:           {:.2}", stats.total_value);
    println!("Paid:            {:.2}", stats.total_paid);
    println!("Remaining:       {:.2}", stats.remaining_value);
    println!("Progress:        {:.1}%", stats.percent_complete);
    println!("Income:          {:.2}", settings.total_income());
    println!("Leftover:        {:.2}", stats.leftover);
    Ok(())
}

fn run_settings(
    db_path: &Path,
    name: Option<String>,
    income: Option<f64>,
    extra: Option<f64>,
) -> Result<()> {
    let conn = open_database(db_path)?;
    let mut settings = load_settings(&conn)?;
    let changed = name.is_some() || income.is_some() || extra.is_some();

    if let Some(name) = name {
        settings.user_name = name;
    }
    if let Some(income) = income {
        settings.monthly_income = income;
    }
    if let Some(extra) = extra {
        settings.extra_income = extra;
    }
    if changed {
        save_settings(&conn, &settings)?;
        println!("✅ Settings saved");
    }

    println!("Name:            {}", settings.user_name);
    println!("Monthly income:  {:.2}", settings.monthly_income);
    println!("Extra income:    {:.2}", settings.extra_income);
    Ok(())
}

fn run_export(db_path: &Path, out: Option<&Path>) -> Result<()> {
    let conn: Connection = open_database(db_path)?;
    let bills = get_all_bills(&conn)?;

    match out {
        Some(path) => {
            let file = fs::File::create(path)
                .with_context(|| format!("Failed to create export file: {}", path.display()))?;
            export_bills_csv(file, &bills)?;
            println!("📤 Exported {} bills to {}", bills.len(), path.display());
        }
        None => export_bills_csv(io::stdout().lock(), &bills)?,
    }
    Ok(())
}

fn print_bill(bill: &Bill) {
    let mark = if bill.is_paid() { "✓" } else { "•" };
    println!(
        "{} {}  {:<30} {:>10.2}  {}",
        mark,
        bill.due_date_iso(),
        bill.title,
        bill.value,
        bill.id
    );
}

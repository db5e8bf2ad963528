// Bill Ledger - Core Library
// Exposes all modules for use in CLI, API server, and tests

pub mod model;
pub mod error;
pub mod config;
pub mod logging;
pub mod ingest;    // CSV/text → bills
pub mod schedule;  // Manual entry → monthly installments
pub mod db;        // SQLite store + audit events
pub mod ledger;    // Dashboard / calendar views
pub mod template;  // Template + CSV export

// Re-export commonly used types
pub use model::{Bill, BillPatch, BillStatus, BillStub, UserSettings};
pub use error::{EditError, ImportError, ScheduleError};
pub use config::{AppConfig, ImportConfig};
pub use ingest::{
    BillSink, ImportOutcome, ImportReporter, ImportSummary, Importer, LogReporter,
    NumberLocale, SkipReason,
};
pub use schedule::{add_months_clamped, expand, MAX_REPEAT};
pub use db::{
    Event, SqliteBillSink,
    open_database, setup_database, insert_bill, insert_bills,
    get_all_bills, get_bill, update_bill, mark_paid, delete_bill,
    verify_count, load_settings, save_settings,
    insert_event, get_events_for_entity, record_import,
};
pub use ledger::{bills_in_month, bills_on_day, DashboardStats};
pub use template::{export_bills_csv, TEMPLATE_CSV, TEMPLATE_FILE_NAME};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

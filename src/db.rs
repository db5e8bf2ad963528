// 🗄️ Bill Store - SQLite (WAL) persistence for bills, settings and the audit trail
// This is the "add bill" collaborator the importer and the schedule expander feed.

use crate::ingest::importer::BillSink;
use crate::model::{Bill, BillStatus, UserSettings};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

// ============================================================================
// EVENTS
// ============================================================================

/// Event for the audit trail (every write leaves one)
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Event {
    pub event_id: String,
    pub timestamp: DateTime<Utc>,
    pub event_type: String,
    pub entity_type: String,
    pub entity_id: String,
    pub data: serde_json::Value,
    pub actor: String,
}

impl Event {
    pub fn new(
        event_type: &str,
        entity_type: &str,
        entity_id: &str,
        data: serde_json::Value,
        actor: &str,
    ) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            event_type: event_type.to_string(),
            entity_type: entity_type.to_string(),
            entity_id: entity_id.to_string(),
            data,
            actor: actor.to_string(),
        }
    }
}

// ============================================================================
// SCHEMA
// ============================================================================

pub fn setup_database(conn: &Connection) -> Result<()> {
    // Enable WAL mode for crash recovery
    conn.pragma_update(None, "journal_mode", "WAL")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS bills (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            bill_uuid TEXT UNIQUE NOT NULL,
            title TEXT NOT NULL,
            value REAL NOT NULL,
            due_date TEXT NOT NULL,
            status TEXT NOT NULL,
            barcode TEXT,
            receipt TEXT,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    // Single row: id is always 1
    conn.execute(
        "CREATE TABLE IF NOT EXISTS settings (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            user_name TEXT NOT NULL,
            monthly_income REAL NOT NULL,
            extra_income REAL NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            event_id TEXT UNIQUE NOT NULL,
            timestamp TEXT NOT NULL,
            event_type TEXT NOT NULL,
            entity_type TEXT NOT NULL,
            entity_id TEXT NOT NULL,
            data TEXT NOT NULL,
            actor TEXT NOT NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_bills_due_date ON bills(due_date)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_events_entity ON events(entity_type, entity_id)",
        [],
    )?;

    Ok(())
}

/// Open (or create) the database file and make sure the schema exists
pub fn open_database(path: &std::path::Path) -> Result<Connection> {
    let conn = Connection::open(path)
        .with_context(|| format!("Failed to open database: {}", path.display()))?;
    setup_database(&conn)?;
    Ok(conn)
}

// ============================================================================
// BILLS
// ============================================================================

const BILL_COLUMNS: &str = "bill_uuid, title, value, due_date, status, barcode, receipt";

fn bill_from_row(row: &Row) -> rusqlite::Result<Bill> {
    let status_code: String = row.get(4)?;
    let status = BillStatus::from_code(&status_code).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            4,
            Type::Text,
            format!("unknown bill status: {}", status_code).into(),
        )
    })?;

    Ok(Bill {
        id: row.get(0)?,
        title: row.get(1)?,
        value: row.get(2)?,
        due_date: row.get(3)?,
        status,
        barcode: row.get(5)?,
        receipt: row.get(6)?,
    })
}

/// Insert one bill and log a `bill_added` event
pub fn insert_bill(conn: &Connection, bill: &Bill, actor: &str) -> Result<()> {
    conn.execute(
        &format!("INSERT INTO bills ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)", BILL_COLUMNS),
        params![
            bill.id,
            bill.title,
            bill.value,
            bill.due_date,
            bill.status.code(),
            bill.barcode,
            bill.receipt,
        ],
    )
    .with_context(|| format!("Failed to insert bill {}", bill.id))?;

    let event = Event::new(
        "bill_added",
        "bill",
        &bill.id,
        serde_json::json!({
            "title": bill.title,
            "value": bill.value,
            "due_date": bill.due_date_iso(),
        }),
        actor,
    );
    insert_event(conn, &event)?;

    tracing::debug!(id = %bill.id, title = %bill.title, "bill stored");
    Ok(())
}

/// Insert a batch (e.g. an expanded schedule) in one transaction: either
/// every bill and its event is stored, or none is.
pub fn insert_bills(conn: &Connection, bills: &[Bill], actor: &str) -> Result<usize> {
    let tx = conn.unchecked_transaction()?;
    for bill in bills {
        insert_bill(&tx, bill, actor)?;
    }
    tx.commit()?;
    tracing::info!(count = bills.len(), actor, "bills stored");
    Ok(bills.len())
}

/// All bills ordered by due date
pub fn get_all_bills(conn: &Connection) -> Result<Vec<Bill>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM bills ORDER BY due_date ASC, id ASC",
        BILL_COLUMNS
    ))?;

    let bills = stmt
        .query_map([], bill_from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(bills)
}

pub fn get_bill(conn: &Connection, id: &str) -> Result<Option<Bill>> {
    let bill = conn
        .query_row(
            &format!("SELECT {} FROM bills WHERE bill_uuid = ?1", BILL_COLUMNS),
            params![id],
            bill_from_row,
        )
        .optional()?;

    Ok(bill)
}

/// Overwrite every field of an existing bill. Returns false if the id is unknown.
pub fn update_bill(conn: &Connection, bill: &Bill) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE bills
         SET title = ?2, value = ?3, due_date = ?4, status = ?5, barcode = ?6, receipt = ?7
         WHERE bill_uuid = ?1",
        params![
            bill.id,
            bill.title,
            bill.value,
            bill.due_date,
            bill.status.code(),
            bill.barcode,
            bill.receipt,
        ],
    )?;

    if changed > 0 {
        let event = Event::new(
            "bill_updated",
            "bill",
            &bill.id,
            serde_json::to_value(bill)?,
            "user",
        );
        insert_event(conn, &event)?;
    }

    Ok(changed > 0)
}

/// Mark a bill as paid. Returns false if the id is unknown.
pub fn mark_paid(conn: &Connection, id: &str) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE bills SET status = ?2 WHERE bill_uuid = ?1",
        params![id, BillStatus::Paid.code()],
    )?;

    if changed > 0 {
        insert_event(
            conn,
            &Event::new("bill_paid", "bill", id, serde_json::json!({}), "user"),
        )?;
        tracing::info!(id, "bill paid");
    }

    Ok(changed > 0)
}

/// Delete one bill. Installments of a series are independent rows, so this
/// never touches siblings.
pub fn delete_bill(conn: &Connection, id: &str) -> Result<bool> {
    let changed = conn.execute("DELETE FROM bills WHERE bill_uuid = ?1", params![id])?;

    if changed > 0 {
        insert_event(
            conn,
            &Event::new("bill_deleted", "bill", id, serde_json::json!({}), "user"),
        )?;
        tracing::info!(id, "bill deleted");
    }

    Ok(changed > 0)
}

pub fn verify_count(conn: &Connection) -> Result<i64> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM bills", [], |row| row.get(0))?;

    Ok(count)
}

// ============================================================================
// SETTINGS
// ============================================================================

/// Stored settings, or defaults when none were saved yet
pub fn load_settings(conn: &Connection) -> Result<UserSettings> {
    let settings = conn
        .query_row(
            "SELECT user_name, monthly_income, extra_income FROM settings WHERE id = 1",
            [],
            |row| {
                Ok(UserSettings {
                    user_name: row.get(0)?,
                    monthly_income: row.get(1)?,
                    extra_income: row.get(2)?,
                })
            },
        )
        .optional()?;

    Ok(settings.unwrap_or_default())
}

pub fn save_settings(conn: &Connection, settings: &UserSettings) -> Result<()> {
    conn.execute(
        "INSERT INTO settings (id, user_name, monthly_income, extra_income)
         VALUES (1, ?1, ?2, ?3)
         ON CONFLICT(id) DO UPDATE SET
            user_name = excluded.user_name,
            monthly_income = excluded.monthly_income,
            extra_income = excluded.extra_income",
        params![settings.user_name, settings.monthly_income, settings.extra_income],
    )?;

    Ok(())
}

// ============================================================================
// AUDIT TRAIL
// ============================================================================

/// Insert event into audit trail
pub fn insert_event(conn: &Connection, event: &Event) -> Result<()> {
    let data_json = serde_json::to_string(&event.data)?;

    conn.execute(
        "INSERT INTO events (
            event_id, timestamp, event_type, entity_type, entity_id, data, actor
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            event.event_id,
            event.timestamp.to_rfc3339(),
            event.event_type,
            event.entity_type,
            event.entity_id,
            data_json,
            event.actor,
        ],
    )?;

    Ok(())
}

/// Get events for a specific entity, newest first
pub fn get_events_for_entity(
    conn: &Connection,
    entity_type: &str,
    entity_id: &str,
) -> Result<Vec<Event>> {
    let mut stmt = conn.prepare(
        "SELECT event_id, timestamp, event_type, entity_type, entity_id, data, actor
         FROM events
         WHERE entity_type = ?1 AND entity_id = ?2
         ORDER BY id DESC",
    )?;

    let events = stmt
        .query_map(params![entity_type, entity_id], |row| {
            let timestamp_str: String = row.get(1)?;
            let data_json: String = row.get(5)?;

            Ok(Event {
                event_id: row.get(0)?,
                timestamp: DateTime::parse_from_rfc3339(&timestamp_str)
                    .map_err(|e| rusqlite::Error::FromSqlConversionFailure(1, Type::Text, Box::new(e)))?
                    .with_timezone(&Utc),
                event_type: row.get(2)?,
                entity_type: row.get(3)?,
                entity_id: row.get(4)?,
                data: serde_json::from_str(&data_json)
                    .map_err(|e| rusqlite::Error::FromSqlConversionFailure(5, Type::Text, Box::new(e)))?,
                actor: row.get(6)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(events)
}

/// SHA-256 of an imported file's text, used as the import's entity id
pub fn content_digest(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Log a finished import in the audit trail
pub fn record_import(conn: &Connection, source_name: &str, text: &str, imported: usize) -> Result<Event> {
    let event = Event::new(
        "bills_imported",
        "import",
        &content_digest(text),
        serde_json::json!({
            "source": source_name,
            "imported": imported,
        }),
        "csv_importer",
    );
    insert_event(conn, &event)?;
    Ok(event)
}

// ============================================================================
// SINK
// ============================================================================

/// `BillSink` that writes straight into the bills table
pub struct SqliteBillSink<'c> {
    conn: &'c Connection,
    actor: String,
    inserted: usize,
}

impl<'c> SqliteBillSink<'c> {
    pub fn new(conn: &'c Connection, actor: &str) -> Self {
        SqliteBillSink {
            conn,
            actor: actor.to_string(),
            inserted: 0,
        }
    }

    pub fn inserted(&self) -> usize {
        self.inserted
    }
}

impl BillSink for SqliteBillSink<'_> {
    fn add_bill(&mut self, bill: Bill) -> Result<()> {
        insert_bill(self.conn, &bill, &self.actor)?;
        self.inserted += 1;
        Ok(())
    }
}

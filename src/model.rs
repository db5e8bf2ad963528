// 🧾 Bill Model - the record every other module produces or consumes
// A Bill leaves the engine fully validated; storage never sees a partial one.

use crate::error::EditError;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// ============================================================================
// STATUS
// ============================================================================

/// Payment status of a bill. Ingestion and scheduling always emit `Pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BillStatus {
    Pending,
    Paid,
}

impl BillStatus {
    /// Storage code (also the serde name)
    pub fn code(&self) -> &'static str {
        match self {
            BillStatus::Pending => "pending",
            BillStatus::Paid => "paid",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "pending" => Some(BillStatus::Pending),
            "paid" => Some(BillStatus::Paid),
            _ => None,
        }
    }
}

// ============================================================================
// BILL
// ============================================================================

/// Bill - a validated bill draft
///
/// Invariants (enforced by the constructors in `ingest::row` and `schedule`):
/// - `id` is a fresh UUID v4, never reused
/// - `title` is non-empty
/// - `value` is finite and non-negative
/// - `due_date` is a real calendar date (serialized as `YYYY-MM-DD`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bill {
    pub id: String,
    pub title: String,
    pub value: f64,
    pub due_date: NaiveDate,
    pub status: BillStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub barcode: Option<String>,
    /// Path or URI of an attached receipt
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receipt: Option<String>,
}

impl Bill {
    /// Create a pending bill with a fresh identity
    pub fn pending(title: String, value: f64, due_date: NaiveDate, barcode: Option<String>) -> Self {
        Bill {
            id: uuid::Uuid::new_v4().to_string(),
            title,
            value,
            due_date,
            status: BillStatus::Pending,
            barcode,
            receipt: None,
        }
    }

    pub fn is_paid(&self) -> bool {
        self.status == BillStatus::Paid
    }

    /// Due date rendered as ISO `YYYY-MM-DD`
    pub fn due_date_iso(&self) -> String {
        self.due_date.format("%Y-%m-%d").to_string()
    }
}

// ============================================================================
// STUB (manual entry input)
// ============================================================================

/// BillStub - what a user types into the manual entry form.
/// Expanded into one or more `Bill`s by `schedule::expand`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BillStub {
    pub title: String,
    pub value: f64,
    pub due_date: NaiveDate,
    #[serde(default)]
    pub barcode: Option<String>,
}

// ============================================================================
// PATCH (edit an existing bill)
// ============================================================================

/// Fields to change on a stored bill. `None` leaves a field alone; an empty
/// barcode or receipt string clears it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BillPatch {
    pub title: Option<String>,
    pub value: Option<f64>,
    pub due_date: Option<NaiveDate>,
    pub status: Option<BillStatus>,
    pub barcode: Option<String>,
    pub receipt: Option<String>,
}

impl BillPatch {
    /// Attach (or replace) a receipt
    pub fn receipt(location: impl Into<String>) -> Self {
        BillPatch {
            receipt: Some(location.into()),
            ..BillPatch::default()
        }
    }

    /// Apply to `bill`, keeping the non-empty title and non-negative value
    /// invariants. Nothing is changed when validation fails.
    pub fn apply(&self, bill: &mut Bill) -> Result<(), EditError> {
        let title = match self.title.as_deref().map(str::trim) {
            Some("") => return Err(EditError::EmptyTitle),
            Some(title) => Some(title.to_string()),
            None => None,
        };
        if let Some(value) = self.value {
            if !value.is_finite() || value < 0.0 {
                return Err(EditError::InvalidValue { value });
            }
        }

        if let Some(title) = title {
            bill.title = title;
        }
        if let Some(value) = self.value {
            bill.value = value;
        }
        if let Some(due_date) = self.due_date {
            bill.due_date = due_date;
        }
        if let Some(status) = self.status {
            bill.status = status;
        }
        if let Some(barcode) = &self.barcode {
            bill.barcode = non_empty(barcode);
        }
        if let Some(receipt) = &self.receipt {
            bill.receipt = non_empty(receipt);
        }
        Ok(())
    }
}

fn non_empty(text: &str) -> Option<String> {
    Some(text.trim()).filter(|t| !t.is_empty()).map(str::to_string)
}

// ============================================================================
// USER SETTINGS
// ============================================================================

/// Household income the dashboard compares bills against
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSettings {
    pub user_name: String,
    pub monthly_income: f64,
    /// One-off income added for the current month
    #[serde(default)]
    pub extra_income: f64,
}

impl UserSettings {
    pub fn total_income(&self) -> f64 {
        self.monthly_income + self.extra_income
    }
}

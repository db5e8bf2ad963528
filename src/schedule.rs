// 🔁 Schedule Expander
// One manual-entry stub → N monthly installments.
//
// Every installment is computed from the base date, so a 31st clamped to
// Feb 29 comes back to the 31st in March.

use crate::error::ScheduleError;
use crate::model::{Bill, BillStub};
use chrono::{Months, NaiveDate};

/// Largest accepted repeat count (30 years of monthly bills)
pub const MAX_REPEAT: u32 = 360;

/// Add `months` to `date`, clamping the day to the target month's last day.
///
/// Returns `None` only when the result leaves chrono's supported year range.
///
/// # Examples:
/// ```
/// use bill_ledger::schedule::add_months_clamped;
/// use chrono::NaiveDate;
///
/// let jan31 = NaiveDate::from_ymd_opt(2024, 1, 31).unwrap();
/// assert_eq!(add_months_clamped(jan31, 1), NaiveDate::from_ymd_opt(2024, 2, 29));
/// ```
pub fn add_months_clamped(date: NaiveDate, months: u32) -> Option<NaiveDate> {
    date.checked_add_months(Months::new(months))
}

/// Expand `stub` into `count` monthly bills.
///
/// - `count == 1` is plain manual entry: one bill, title untouched
/// - `count > 1` appends ` (i/N)` to each title
///
/// Installments share nothing but the title prefix; each has its own id.
pub fn expand(stub: &BillStub, count: u32) -> Result<Vec<Bill>, ScheduleError> {
    if count == 0 || count > MAX_REPEAT {
        return Err(ScheduleError::CountOutOfRange { count });
    }

    let title = stub.title.trim();
    if title.is_empty() {
        return Err(ScheduleError::EmptyTitle);
    }

    if !stub.value.is_finite() || stub.value < 0.0 {
        return Err(ScheduleError::InvalidValue { value: stub.value });
    }

    let barcode = stub
        .barcode
        .as_deref()
        .map(str::trim)
        .filter(|code| !code.is_empty())
        .map(str::to_string);

    let mut bills = Vec::with_capacity(count as usize);

    for i in 0..count {
        let due_date = add_months_clamped(stub.due_date, i)
            .ok_or(ScheduleError::DateOutOfRange { months: i })?;

        let installment_title = if count > 1 {
            format!("{} ({}/{})", title, i + 1, count)
        } else {
            title.to_string()
        };

        bills.push(Bill::pending(installment_title, stub.value, due_date, barcode.clone()));
    }

    tracing::debug!(title, count, first = %stub.due_date, "schedule expanded");

    Ok(bills)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::BillStatus;
    use std::collections::HashSet;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn stub(title: &str, due: NaiveDate) -> BillStub {
        BillStub {
            title: title.to_string(),
            value: 120.0,
            due_date: due,
            barcode: None,
        }
    }

    #[test]
    fn test_add_months_clamps_to_month_end() {
        assert_eq!(add_months_clamped(date(2024, 1, 31), 1), Some(date(2024, 2, 29)));
        assert_eq!(add_months_clamped(date(2023, 1, 31), 1), Some(date(2023, 2, 28)));
        assert_eq!(add_months_clamped(date(1900, 1, 31), 1), Some(date(1900, 2, 28)));
        assert_eq!(add_months_clamped(date(2000, 1, 31), 1), Some(date(2000, 2, 29)));
        assert_eq!(add_months_clamped(date(2024, 3, 31), 1), Some(date(2024, 4, 30)));
        assert_eq!(add_months_clamped(date(2024, 12, 15), 0), Some(date(2024, 12, 15)));
        assert_eq!(add_months_clamped(NaiveDate::MAX, 1), None);
    }

    #[test]
    fn test_month_overflow_clamps_to_february_end() {
        let bills = expand(&stub("Aluguel", date(2024, 1, 31)), 2).unwrap();

        assert_eq!(bills.len(), 2);
        assert_eq!(bills[0].due_date, date(2024, 1, 31));
        assert_eq!(bills[1].due_date, date(2024, 2, 29));
        assert_eq!(bills[1].title, "Aluguel (2/2)");
    }

    #[test]
    fn test_clamp_is_not_cumulative() {
        let bills = expand(&stub("Aluguel", date(2023, 1, 31)), 4).unwrap();
        let dates: Vec<NaiveDate> = bills.iter().map(|b| b.due_date).collect();

        assert_eq!(
            dates,
            vec![date(2023, 1, 31), date(2023, 2, 28), date(2023, 3, 31), date(2023, 4, 30)]
        );
    }

    #[test]
    fn test_year_carry() {
        let bills = expand(&stub("Seguro", date(2024, 11, 15)), 3).unwrap();

        assert_eq!(bills[2].due_date, date(2025, 1, 15));
        assert_eq!(add_months_clamped(date(2024, 12, 31), 14), Some(date(2026, 2, 28)));
    }

    #[test]
    fn test_single_bill_is_plain_manual_entry() {
        let bills = expand(&stub("Internet", date(2024, 3, 10)), 1).unwrap();

        assert_eq!(bills.len(), 1);
        assert_eq!(bills[0].title, "Internet");
        assert_eq!(bills[0].due_date, date(2024, 3, 10));
        assert_eq!(bills[0].value, 120.0);
        assert_eq!(bills[0].status, BillStatus::Pending);
    }

    #[test]
    fn test_series_titles_and_identities() {
        let bills = expand(&stub("Curso", date(2024, 1, 5)), 12).unwrap();

        assert_eq!(bills[0].title, "Curso (1/12)");
        assert_eq!(bills[11].title, "Curso (12/12)");
        assert_eq!(bills[11].due_date, date(2024, 12, 5));

        let ids: HashSet<&str> = bills.iter().map(|b| b.id.as_str()).collect();
        assert_eq!(ids.len(), 12);
    }

    #[test]
    fn test_max_repeat() {
        let bills = expand(&stub("Financiamento", date(2024, 1, 31)), MAX_REPEAT).unwrap();

        assert_eq!(bills.len(), 360);
        assert_eq!(bills[359].due_date, date(2053, 12, 31));
        assert_eq!(bills[1].due_date, date(2024, 2, 29));
    }

    #[test]
    fn test_rejections() {
        let base = stub("Agua", date(2024, 1, 1));

        assert_eq!(expand(&base, 0), Err(ScheduleError::CountOutOfRange { count: 0 }));
        assert_eq!(expand(&base, 361), Err(ScheduleError::CountOutOfRange { count: 361 }));
        assert_eq!(expand(&stub("   ", date(2024, 1, 1)), 1), Err(ScheduleError::EmptyTitle));

        let negative = BillStub { value: -1.0, ..base.clone() };
        assert_eq!(expand(&negative, 1), Err(ScheduleError::InvalidValue { value: -1.0 }));

        let nan = BillStub { value: f64::NAN, ..base };
        assert!(matches!(expand(&nan, 1), Err(ScheduleError::InvalidValue { .. })));
    }

    #[test]
    fn test_barcode_is_carried_to_every_installment() {
        let base = BillStub {
            barcode: Some(" 8369 ".to_string()),
            ..stub("Condominio", date(2024, 6, 10))
        };
        let bills = expand(&base, 3).unwrap();

        assert!(bills.iter().all(|b| b.barcode.as_deref() == Some("8369")));
    }
}

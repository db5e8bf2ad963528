// 📊 Ledger Views - dashboard numbers and calendar slices over a set of bills

use crate::model::{Bill, BillStatus, UserSettings};
use chrono::{Datelike, NaiveDate};
use serde::Serialize;

/// Dashboard summary
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    /// Number of pending bills
    pub total_pending: usize,
    /// Sum of paid bill values
    pub total_paid: f64,
    /// Sum of all bill values
    pub total_value: f64,
    /// Sum of pending bill values
    pub remaining_value: f64,
    /// Paid share of the total, 0-100
    pub percent_complete: f64,
    /// Income (monthly + extra) minus every bill
    pub leftover: f64,
}

impl DashboardStats {
    pub fn compute(bills: &[Bill], settings: &UserSettings) -> Self {
        let total_value: f64 = bills.iter().map(|b| b.value).sum();
        let total_paid: f64 = bills.iter().filter(|b| b.is_paid()).map(|b| b.value).sum();
        let pending: Vec<&Bill> = bills
            .iter()
            .filter(|b| b.status == BillStatus::Pending)
            .collect();

        let percent_complete = if total_value > 0.0 {
            total_paid / total_value * 100.0
        } else {
            0.0
        };

        DashboardStats {
            total_pending: pending.len(),
            total_paid,
            total_value,
            remaining_value: pending.iter().map(|b| b.value).sum(),
            percent_complete,
            leftover: settings.total_income() - total_value,
        }
    }
}

/// Bills due in `year`/`month`, earliest first
pub fn bills_in_month(bills: &[Bill], year: i32, month: u32) -> Vec<&Bill> {
    let mut selected: Vec<&Bill> = bills
        .iter()
        .filter(|b| b.due_date.year() == year && b.due_date.month() == month)
        .collect();
    selected.sort_by_key(|b| b.due_date);
    selected
}

/// Bills due on one calendar day
pub fn bills_on_day(bills: &[Bill], day: NaiveDate) -> Vec<&Bill> {
    bills.iter().filter(|b| b.due_date == day).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bill(title: &str, value: f64, y: i32, m: u32, d: u32, paid: bool) -> Bill {
        let mut bill = Bill::pending(
            title.to_string(),
            value,
            NaiveDate::from_ymd_opt(y, m, d).unwrap(),
            None,
        );
        if paid {
            bill.status = BillStatus::Paid;
        }
        bill
    }

    fn sample() -> Vec<Bill> {
        vec![
            bill("Internet", 100.0, 2024, 12, 15, false),
            bill("Energia", 150.0, 2024, 12, 10, true),
            bill("Aluguel", 750.0, 2025, 1, 5, false),
        ]
    }

    #[test]
    fn test_dashboard_stats() {
        let settings = UserSettings {
            user_name: "Ana".to_string(),
            monthly_income: 1000.0,
            extra_income: 200.0,
        };
        let stats = DashboardStats::compute(&sample(), &settings);

        assert_eq!(stats.total_pending, 2);
        assert_eq!(stats.total_paid, 150.0);
        assert_eq!(stats.total_value, 1000.0);
        assert_eq!(stats.remaining_value, 850.0);
        assert_eq!(stats.percent_complete, 15.0);
        assert_eq!(stats.leftover, 200.0);
    }

    #[test]
    fn test_dashboard_stats_empty() {
        let stats = DashboardStats::compute(&[], &UserSettings::default());

        assert_eq!(stats.total_pending, 0);
        assert_eq!(stats.percent_complete, 0.0);
        assert_eq!(stats.leftover, 0.0);
    }

    #[test]
    fn test_bills_in_month_sorted() {
        let bills = sample();
        let december = bills_in_month(&bills, 2024, 12);

        let titles: Vec<&str> = december.iter().map(|b| b.title.as_str()).collect();
        assert_eq!(titles, vec!["Energia", "Internet"]);
        assert!(bills_in_month(&bills, 2024, 11).is_empty());
    }

    #[test]
    fn test_bills_on_day() {
        let bills = sample();
        let day = NaiveDate::from_ymd_opt(2025, 1, 5).unwrap();

        let due = bills_on_day(&bills, day);
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].title, "Aluguel");
    }
}

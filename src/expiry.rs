//! Due-date expiration.
//!
//! Dates carry no time of day. A task is expired when its due date falls
//! strictly before the reference day; due today is not expired.

use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};

/// Whether a task due on `due` is expired on `today`.
pub fn is_expired(due: Option<NaiveDate>, today: NaiveDate) -> bool {
    match due {
        Some(due) => due < today,
        None => false,
    }
}

/// The current local day.
pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DueStatus {
    Overdue,
    OnTime,
    NoDate,
}

impl DueStatus {
    pub fn classify(due: Option<NaiveDate>, today: NaiveDate) -> Self {
        match due {
            None => DueStatus::NoDate,
            Some(_) if is_expired(due, today) => DueStatus::Overdue,
            Some(_) => DueStatus::OnTime,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn strictly_before_today_is_expired() {
        let today = date(2024, 5, 2);
        assert!(is_expired(Some(date(2024, 5, 1)), today));
        assert!(!is_expired(Some(date(2024, 5, 2)), today));
        assert!(!is_expired(Some(date(2024, 5, 3)), today));
        assert!(!is_expired(None, today));
    }

    #[test]
    fn classification() {
        let today = date(2024, 5, 2);
        assert_eq!(DueStatus::classify(None, today), DueStatus::NoDate);
        assert_eq!(
            DueStatus::classify(Some(date(2024, 4, 30)), today),
            DueStatus::Overdue
        );
        assert_eq!(
            DueStatus::classify(Some(today), today),
            DueStatus::OnTime
        );
    }
}

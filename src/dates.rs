//! Week arithmetic for the analysis period

use crate::error::AgentError;
use crate::Result;
use chrono::{Datelike, Duration, Local, NaiveDate};

/// Monday of the week `week_offset` weeks before the week containing `today`.
/// 0 is the current week, 1 the previous one, and so on.
pub fn monday_of_week_from(today: NaiveDate, week_offset: u32) -> Result<NaiveDate> {
    let days_back = i64::from(today.weekday().num_days_from_monday()) + 7 * i64::from(week_offset);

    today
        .checked_sub_signed(Duration::days(days_back))
        .ok_or_else(|| {
            AgentError::InvalidInput(format!("week offset {} is out of range", week_offset))
        })
}

/// [`monday_of_week_from`] relative to the local calendar date.
pub fn monday_of_week(week_offset: u32) -> Result<NaiveDate> {
    monday_of_week_from(Local::now().date_naive(), week_offset)
}

/// The trading week reported on: Monday to Friday, plus the exclusive
/// Saturday bound the price history endpoint needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnalysisWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub end_exclusive: NaiveDate,
}

impl AnalysisWindow {
    pub fn for_monday(monday: NaiveDate) -> Self {
        Self {
            start: monday,
            end: monday + Duration::days(4),
            end_exclusive: monday + Duration::days(5),
        }
    }

    pub fn for_offset(week_offset: u32) -> Result<Self> {
        Ok(Self::for_monday(monday_of_week(week_offset)?))
    }

    /// e.g. "the week of 2024-07-22 to 2024-07-26"
    pub fn description(&self) -> String {
        format!(
            "the week of {} to {}",
            self.start.format("%Y-%m-%d"),
            self.end.format("%Y-%m-%d")
        )
    }
}

/// Interpret free-form week input relative to `today`.
///
/// Accepts exactly "this week", "last week", "next week", a non-negative
/// week offset or a `YYYY-MM-DD` date, and returns the Monday of the
/// described week.
pub fn parse_week_input(input: &str, today: NaiveDate) -> Option<NaiveDate> {
    let lowered = input
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();

    match lowered.as_str() {
        "" => return None,
        "this week" => return monday_of_week_from(today, 0).ok(),
        "last week" => return monday_of_week_from(today, 1).ok(),
        "next week" => {
            return monday_of_week_from(today, 0)
                .ok()
                .and_then(|m| m.checked_add_signed(Duration::days(7)))
        }
        _ => {}
    }

    if let Ok(offset) = lowered.parse::<u32>() {
        return monday_of_week_from(today, offset).ok();
    }

    NaiveDate::parse_from_str(&lowered, "%Y-%m-%d")
        .ok()
        .and_then(|date| monday_of_week_from(date, 0).ok())
}

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::aggregate::{credited_display, official_minutes};
use super::model::DayEntry;
use super::time::format_duration;

/// Weekly ceiling on confirmed, capped hours.
pub const WEEKLY_CAP_HOURS: u32 = 30;

/// Days between two Sunday boundaries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct WeekBucket {
    pub week_num: u32,
    /// Confirmed, capped minutes.
    pub minutes: u32,
    pub hours: f64,
    pub start_day: u32,
    pub end_day: u32,
    pub days: Vec<u32>,
    pub exceeds: bool,
}

/// Worked and credited time for one non-Sunday day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DayTotal {
    pub day: u32,
    pub total_minutes: u32,
    /// Capped at the daily ceiling.
    pub official_minutes: u32,
    /// e.g. "7h 00m (5h 00m credited)"
    pub display: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PeriodSummary {
    pub days: Vec<DayTotal>,
    pub weeks: Vec<WeekBucket>,
    pub has_violations: bool,
    pub total_monthly_minutes: u32,
    pub total_monthly_formatted: String,
}

/// Split the month on Sundays. Only confirmed entries count toward a week's
/// minutes; Sundays never join a bucket.
pub fn weekly_buckets(entries: &[DayEntry]) -> Vec<WeekBucket> {
    let mut weeks = Vec::new();
    let mut current: Vec<&DayEntry> = Vec::new();

    for entry in entries {
        if entry.is_sunday() {
            if !current.is_empty() {
                weeks.push(close_bucket(weeks.len() as u32 + 1, &current));
                current.clear();
            }
            continue;
        }
        current.push(entry);
    }

    if !current.is_empty() {
        weeks.push(close_bucket(weeks.len() as u32 + 1, &current));
    }

    weeks
}

fn close_bucket(week_num: u32, days: &[&DayEntry]) -> WeekBucket {
    let minutes: u32 = days
        .iter()
        .filter(|e| e.is_confirmed())
        .map(|e| official_minutes(e.total_minutes))
        .sum();

    WeekBucket {
        week_num,
        minutes,
        hours: f64::from(minutes) / 60.0,
        start_day: days.first().map(|e| e.day).unwrap_or_default(),
        end_day: days.last().map(|e| e.day).unwrap_or_default(),
        days: days.iter().map(|e| e.day).collect(),
        exceeds: minutes > WEEKLY_CAP_HOURS * 60,
    }
}

/// Capped total over every working day, confirmed or not.
///
/// This intentionally differs from the weekly figure, which only counts
/// confirmed days.
pub fn monthly_total_minutes(entries: &[DayEntry]) -> u32 {
    entries
        .iter()
        .filter(|e| !e.is_sunday())
        .map(|e| official_minutes(e.total_minutes))
        .sum()
}

pub fn day_totals(entries: &[DayEntry]) -> Vec<DayTotal> {
    entries
        .iter()
        .filter(|e| !e.is_sunday())
        .map(|e| DayTotal {
            day: e.day,
            total_minutes: e.total_minutes,
            official_minutes: official_minutes(e.total_minutes),
            display: credited_display(e.total_minutes),
        })
        .collect()
}

pub fn summarize(entries: &[DayEntry]) -> PeriodSummary {
    let days = day_totals(entries);
    let weeks = weekly_buckets(entries);
    let has_violations = weeks.iter().any(|w| w.exceeds);
    let total = monthly_total_minutes(entries);

    PeriodSummary {
        days,
        weeks,
        has_violations,
        total_monthly_minutes: total,
        total_monthly_formatted: format_duration(total),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dtr::model::{ConfirmationStatus, MonthlyRecord};

    // September 2024 starts on a Sunday
    fn september() -> MonthlyRecord {
        MonthlyRecord::new(1, 1, 9, 2024).unwrap()
    }

    fn set(record: &mut MonthlyRecord, day: u32, minutes: u32, confirmed: bool) {
        let entry = record.entry_mut(day).unwrap();
        entry.total_minutes = minutes;
        entry.confirmation_status = if confirmed {
            ConfirmationStatus::Confirmed
        } else {
            ConfirmationStatus::Unconfirmed
        };
    }

    #[test]
    fn test_buckets_split_on_sundays() {
        let record = september();
        let weeks = weekly_buckets(&record.entries);

        // Sundays: 1, 8, 15, 22, 29
        assert_eq!(weeks.len(), 5);
        assert_eq!(weeks[0].days, vec![2, 3, 4, 5, 6, 7]);
        assert_eq!((weeks[0].start_day, weeks[0].end_day), (2, 7));
        assert_eq!(weeks[3].week_num, 4);
        assert_eq!(weeks[4].days, vec![30]);
    }

    #[test]
    fn test_month_starting_midweek() {
        // October 2024 starts on a Tuesday
        let record = MonthlyRecord::new(1, 1, 10, 2024).unwrap();
        let weeks = weekly_buckets(&record.entries);

        assert_eq!(weeks[0].days, vec![1, 2, 3, 4, 5]);
        assert_eq!(weeks[1].start_day, 7);
    }

    #[test]
    fn test_only_confirmed_days_count_toward_week() {
        let mut record = september();
        set(&mut record, 2, 300, true);
        set(&mut record, 3, 300, true);
        set(&mut record, 4, 600, false);

        let weeks = weekly_buckets(&record.entries);
        assert_eq!(weeks[0].minutes, 600);
        assert_eq!(weeks[0].hours, 10.0);
        assert!(!weeks[0].exceeds);
    }

    #[test]
    fn test_week_over_thirty_hours_is_flagged() {
        let mut record = september();
        for day in 2..=7 {
            set(&mut record, day, 360, true);
        }

        // Six capped days are exactly 30h, which does not exceed
        let summary = summarize(&record.entries);
        assert_eq!(summary.weeks[0].minutes, 1800);
        assert!(!summary.weeks[0].exceeds);
        assert!(!summary.has_violations);

        // Same days plus Monday the 9th with no Sunday in between
        set(&mut record, 9, 60, true);
        let run: Vec<DayEntry> = record
            .entries
            .iter()
            .filter(|e| (2..=9).contains(&e.day) && e.day != 8)
            .cloned()
            .collect();

        let summary = summarize(&run);
        assert_eq!(summary.weeks.len(), 1);
        assert_eq!(summary.weeks[0].minutes, 1860);
        assert!(summary.weeks[0].exceeds);
        assert!(summary.has_violations);
    }

    #[test]
    fn test_monthly_total_ignores_confirmation() {
        let mut record = september();
        set(&mut record, 2, 300, true);
        set(&mut record, 3, 420, false);
        set(&mut record, 4, 90, false);

        let summary = summarize(&record.entries);
        assert_eq!(summary.total_monthly_minutes, 690);
        assert_eq!(summary.total_monthly_formatted, "11h 30m");
        assert_eq!(summary.weeks[0].minutes, 300);
    }

    #[test]
    fn test_sunday_minutes_are_excluded() {
        let mut record = september();
        set(&mut record, 1, 240, true);

        let summary = summarize(&record.entries);
        assert_eq!(summary.total_monthly_minutes, 0);
        assert!(summary.weeks.iter().all(|w| !w.days.contains(&1)));
    }

    #[test]
    fn test_day_totals_show_raw_and_credited_time() {
        let mut record = september();
        set(&mut record, 2, 240, false);
        set(&mut record, 3, 420, true);

        let summary = summarize(&record.entries);
        // 30 days minus five Sundays
        assert_eq!(summary.days.len(), 25);
        assert!(summary.days.iter().all(|d| d.day != 1));

        let monday = &summary.days[0];
        assert_eq!((monday.day, monday.official_minutes), (2, 240));
        assert_eq!(monday.display, "4h 00m");

        let tuesday = &summary.days[1];
        assert_eq!(tuesday.total_minutes, 420);
        assert_eq!(tuesday.official_minutes, 300);
        assert_eq!(tuesday.display, "7h 00m (5h 00m credited)");
    }
}

use super::model::{DayEntry, EntryStatus, Shift};
use super::time::format_duration;

/// Daily credit ceiling for official totals (5 hours).
pub const DAILY_CAP_MINUTES: u32 = 300;

/// Worked minutes over complete, well-ordered shifts. Anything else counts as zero.
pub fn total_minutes(shifts: &[Shift]) -> u32 {
    shifts
        .iter()
        .filter_map(Shift::bounds)
        .map(|(time_in, time_out)| time_out.saturating_sub(time_in))
        .sum()
}

/// Minutes credited toward period totals.
pub fn official_minutes(total: u32) -> u32 {
    total.min(DAILY_CAP_MINUTES)
}

/// Raw time, plus the credited figure when the cap cut it down.
pub fn credited_display(total: u32) -> String {
    let official = official_minutes(total);
    if official == total {
        format_duration(total)
    } else {
        format!("{} ({} credited)", format_duration(total), format_duration(official))
    }
}

/// Status shown for a day. Office-assigned statuses win over the derived one.
pub fn derive_status(current: EntryStatus, shifts: &[Shift], is_sunday: bool) -> EntryStatus {
    if is_sunday {
        return EntryStatus::Unset;
    }
    if current.is_office_status() {
        return current;
    }

    let has_input = shifts
        .iter()
        .any(|s| !s.time_in.is_empty() || !s.time_out.is_empty());

    if has_input {
        EntryStatus::Unconfirmed
    } else {
        EntryStatus::Unset
    }
}

/// Business rules for late and undertime minutes. Unset rules yield zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AttendancePolicy {
    /// Minutes after midnight; a first IN after this is late.
    pub late_after: Option<u32>,
    /// Expected worked minutes on a day with any attendance.
    pub expected_daily_minutes: Option<u32>,
}

impl AttendancePolicy {
    pub fn late_minutes(&self, shifts: &[Shift]) -> u32 {
        let Some(threshold) = self.late_after else {
            return 0;
        };

        shifts
            .iter()
            .filter_map(Shift::bounds)
            .map(|(time_in, _)| time_in)
            .min()
            .map(|first_in| first_in.saturating_sub(threshold))
            .unwrap_or(0)
    }

    pub fn undertime_minutes(&self, total: u32) -> u32 {
        match self.expected_daily_minutes {
            Some(expected) if total > 0 => expected.saturating_sub(total),
            _ => 0,
        }
    }
}

/// Refresh every derived field of `entry` from its shifts.
pub fn recompute_entry(entry: &mut DayEntry, policy: &AttendancePolicy) {
    if entry.is_sunday() {
        entry.total_minutes = 0;
        entry.late_minutes = 0;
        entry.undertime_minutes = 0;
        entry.status = EntryStatus::Unset;
        return;
    }

    let total = total_minutes(&entry.shifts);
    entry.total_minutes = total;
    entry.late_minutes = policy.late_minutes(&entry.shifts);
    entry.undertime_minutes = policy.undertime_minutes(total);
    entry.status = derive_status(entry.status, &entry.shifts, false);
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn weekday_entry(shifts: Vec<Shift>) -> DayEntry {
        // 2024-09-02 is a Monday
        let mut entry = DayEntry::blank(NaiveDate::from_ymd_opt(2024, 9, 2).unwrap());
        entry.shifts = shifts;
        entry
    }

    #[test]
    fn test_total_is_out_minus_in() {
        assert_eq!(total_minutes(&[Shift::new("07:00", "11:00")]), 240);
        assert_eq!(
            total_minutes(&[Shift::new("07:00", "11:00"), Shift::new("13:15", "17:00")]),
            465
        );
    }

    #[test]
    fn test_bad_shifts_contribute_zero() {
        let shifts = [
            Shift::new("11:00", "07:00"),
            Shift::new("08:00", ""),
            Shift::new("x", "y"),
            Shift::new("13:00", "14:00"),
        ];
        assert_eq!(total_minutes(&shifts), 60);
        assert_eq!(total_minutes(&[]), 0);
    }

    #[test]
    fn test_daily_cap() {
        assert_eq!(official_minutes(240), 240);
        assert_eq!(official_minutes(420), 300);
        assert_eq!(credited_display(240), "4h 00m");
        assert_eq!(credited_display(420), "7h 00m (5h 00m credited)");
    }

    #[test]
    fn test_status_derivation() {
        let shifts = [Shift::new("07:00", "")];
        assert_eq!(derive_status(EntryStatus::Unset, &shifts, false), EntryStatus::Unconfirmed);
        assert_eq!(derive_status(EntryStatus::Unconfirmed, &[], false), EntryStatus::Unset);
        assert_eq!(derive_status(EntryStatus::Excused, &shifts, false), EntryStatus::Excused);
        assert_eq!(derive_status(EntryStatus::Absent, &[], false), EntryStatus::Absent);
        assert_eq!(derive_status(EntryStatus::Present, &shifts, true), EntryStatus::Unset);
    }

    #[test]
    fn test_policy_late_and_undertime() {
        let policy = AttendancePolicy {
            late_after: Some(8 * 60),
            expected_daily_minutes: Some(300),
        };
        let shifts = [Shift::new("13:00", "15:00"), Shift::new("08:30", "10:00")];

        assert_eq!(policy.late_minutes(&shifts), 30);
        assert_eq!(policy.undertime_minutes(210), 90);
        assert_eq!(policy.undertime_minutes(0), 0);
        assert_eq!(policy.undertime_minutes(360), 0);

        let lenient = AttendancePolicy::default();
        assert_eq!(lenient.late_minutes(&shifts), 0);
        assert_eq!(lenient.undertime_minutes(210), 0);
    }

    #[test]
    fn test_recompute_entry() {
        let mut entry = weekday_entry(vec![Shift::new("07:00", "11:00"), Shift::new("13:00", "16:00")]);
        recompute_entry(&mut entry, &AttendancePolicy::default());

        assert_eq!(entry.total_minutes, 420);
        assert_eq!(entry.status, EntryStatus::Unconfirmed);

        entry.shifts.clear();
        recompute_entry(&mut entry, &AttendancePolicy::default());
        assert_eq!(entry.total_minutes, 0);
        assert_eq!(entry.status, EntryStatus::Unset);
    }
}

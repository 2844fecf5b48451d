use chrono::{DateTime, NaiveDate, Utc};

use super::aggregate::{derive_status, recompute_entry, AttendancePolicy};
use super::model::{
    Actor, ConfirmationStatus, DayEntry, EntryPayload, EntryStatus, MonthlyRecord, RecordStatus,
    Shift,
};
use super::period::monthly_total_minutes;
use super::time::normalize_time;
use super::validator::{validate_day, ShiftConflict, SlotWindows, ValidationMode};

/// Why an entry cannot be edited right now.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LockReason {
    #[error("Day {0} is not part of this record")]
    NoSuchDay(u32),

    #[error("Day {0} is a Sunday and takes no entries")]
    NoDutyDay(u32),

    #[error("Record is {0} and can no longer be edited")]
    RecordLocked(RecordStatus),

    #[error("Record belongs to another user")]
    NotOwner,

    #[error("Day {0} has been confirmed by the office")]
    EntryConfirmed(u32),

    #[error("Confirmed day {0} can only be changed on its own date")]
    OutsideEntryDate(u32),
}

/// Server-side refusal of an entry write or lifecycle action.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UpdateRejection {
    #[error(transparent)]
    Locked(#[from] LockReason),

    #[error(transparent)]
    Conflict(#[from] ShiftConflict),

    #[error("Stale write for day {day}: revision {received} is older than {current}")]
    StaleRevision { day: u32, current: u64, received: u64 },

    #[error("Cannot {action} a {from} record")]
    InvalidTransition {
        from: RecordStatus,
        action: &'static str,
    },

    #[error("{0}")]
    Forbidden(String),

    #[error("Invalid period {month}/{year}")]
    InvalidPeriod { month: u32, year: i32 },
}

/// Lifecycle actions other than plain entry writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordAction {
    Submit,
    ConfirmEntry { day: u32 },
    SetEntryStatus { day: u32, status: EntryStatus },
    Approve { remarks: Option<String> },
    Reject { remarks: Option<String> },
}

impl RecordAction {
    pub fn name(&self) -> &'static str {
        match self {
            RecordAction::Submit => "submit",
            RecordAction::ConfirmEntry { .. } => "confirm an entry of",
            RecordAction::SetEntryStatus { .. } => "set an entry status of",
            RecordAction::Approve { .. } => "approve",
            RecordAction::Reject { .. } => "reject",
        }
    }
}

/// Business configuration applied when entries are written.
#[derive(Debug, Clone, Default)]
pub struct RecordRules {
    pub attendance: AttendancePolicy,
    pub slot_windows: SlotWindows,
}

/// Can `actor` change the shifts of `day` on `today`?
pub fn check_edit(
    record: &MonthlyRecord,
    day: u32,
    actor: &Actor,
    today: NaiveDate,
) -> Result<(), LockReason> {
    let entry = record.entry(day).ok_or(LockReason::NoSuchDay(day))?;

    if entry.is_sunday() {
        return Err(LockReason::NoDutyDay(day));
    }
    if record.status.is_locked() {
        return Err(LockReason::RecordLocked(record.status));
    }
    if !actor.is_office() && actor.user_id != record.user_id {
        return Err(LockReason::NotOwner);
    }
    if entry.is_confirmed() {
        if !actor.is_office() {
            return Err(LockReason::EntryConfirmed(day));
        }
        if entry.date != today {
            return Err(LockReason::OutsideEntryDate(day));
        }
    }

    Ok(())
}

impl MonthlyRecord {
    /// Full-entry replace of `day`, as performed by the persistence boundary.
    ///
    /// Replaying the same payload leaves the record unchanged.
    pub fn apply_entry_update(
        &mut self,
        actor: &Actor,
        day: u32,
        payload: &EntryPayload,
        rules: &RecordRules,
        today: NaiveDate,
    ) -> Result<(), UpdateRejection> {
        check_edit(self, day, actor, today)?;

        let entry = self.entry_mut(day).ok_or(LockReason::NoSuchDay(day))?;

        if let Some(received) = payload.revision {
            if received < entry.revision {
                return Err(UpdateRejection::StaleRevision {
                    day,
                    current: entry.revision,
                    received,
                });
            }
        }

        let shifts: Vec<Shift> = payload
            .resolved_shifts()
            .into_iter()
            .map(|s| Shift::new(normalize_time(&s.time_in), normalize_time(&s.time_out)))
            .collect();

        let mode = if payload.shifts.is_none() && !payload.legacy.is_empty() {
            ValidationMode::Legacy(&rules.slot_windows)
        } else {
            ValidationMode::Dynamic
        };
        validate_day(&shifts, mode)?;

        entry.shifts = shifts;
        // Students cannot assign office statuses through a save
        if actor.is_office() {
            entry.status = payload.status;
        }
        recompute_entry(entry, &rules.attendance);
        if let Some(received) = payload.revision {
            entry.revision = received;
        }

        self.total_monthly_minutes = monthly_total_minutes(&self.entries);
        Ok(())
    }

    pub fn apply_action(
        &mut self,
        actor: &Actor,
        action: RecordAction,
        now: DateTime<Utc>,
    ) -> Result<(), UpdateRejection> {
        let invalid = |from: RecordStatus, action: &RecordAction| UpdateRejection::InvalidTransition {
            from,
            action: action.name(),
        };

        match action {
            RecordAction::Submit => {
                if actor.user_id != self.user_id {
                    return Err(UpdateRejection::Forbidden(
                        "Only the record owner can submit".to_string(),
                    ));
                }
                if self.status != RecordStatus::Draft {
                    return Err(invalid(self.status, &action));
                }
                self.status = RecordStatus::Submitted;
                self.submitted_at = Some(now);
            }
            RecordAction::ConfirmEntry { day } => {
                require_office(actor)?;
                let entry = self.office_entry_mut(day)?;
                entry.confirmation_status = ConfirmationStatus::Confirmed;
            }
            RecordAction::SetEntryStatus { day, status } => {
                require_office(actor)?;
                let entry = self.office_entry_mut(day)?;
                entry.status = derive_status(status, &entry.shifts, false);
            }
            RecordAction::Approve { ref remarks } | RecordAction::Reject { ref remarks } => {
                require_office(actor)?;
                if self.status != RecordStatus::Submitted {
                    return Err(invalid(self.status, &action));
                }
                self.status = if matches!(action, RecordAction::Approve { .. }) {
                    RecordStatus::Approved
                } else {
                    RecordStatus::Rejected
                };
                self.checked_by = Some(actor.user_id);
                self.checked_at = Some(now);
                self.remarks = remarks.clone();
            }
        }

        Ok(())
    }

    fn office_entry_mut(&mut self, day: u32) -> Result<&mut DayEntry, UpdateRejection> {
        if self.status.is_locked() {
            return Err(LockReason::RecordLocked(self.status).into());
        }
        let entry = self.entry_mut(day).ok_or(LockReason::NoSuchDay(day))?;
        if entry.is_sunday() {
            return Err(LockReason::NoDutyDay(day).into());
        }
        Ok(entry)
    }
}

fn require_office(actor: &Actor) -> Result<(), UpdateRejection> {
    if actor.is_office() {
        Ok(())
    } else {
        Err(UpdateRejection::Forbidden(
            "Only the office can perform this action".to_string(),
        ))
    }
}

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::model::{Shift, ShiftField, LEGACY_SLOT_COUNT};
use super::time::{format_minutes, parse_minutes};

/// Why a proposed shift edit was refused.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ShiftConflict {
    #[error("Invalid time \"{value}\", expected HH:MM")]
    MalformedTime { value: String },

    #[error("OUT must be after IN")]
    OutNotAfterIn { shift: usize },

    #[error("IN time {time} is already used by shift {}", .other + 1)]
    DuplicateIn { time: String, other: usize },

    #[error("OUT time {time} is already used by shift {}", .other + 1)]
    DuplicateOut { time: String, other: usize },

    #[error("Shift {} overlaps shift {} ({other_in}-{other_out})", .shift + 1, .other + 1)]
    Overlap {
        shift: usize,
        other: usize,
        other_in: String,
        other_out: String,
    },

    #[error("{slot} must be between {start} and {end}")]
    OutsideWindow {
        slot: String,
        start: String,
        end: String,
    },

    #[error("Only {max} time slots are available")]
    TooManyShifts { max: usize },

    #[error("Shift {} does not exist", .index + 1)]
    NoSuchShift { index: usize },
}

/// A proposed change to one field of one shift.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ShiftEdit {
    pub index: usize,
    pub field: ShiftField,
    pub value: String,
}

impl ShiftEdit {
    pub fn new(index: usize, field: ShiftField, value: impl Into<String>) -> Self {
        Self {
            index,
            field,
            value: value.into(),
        }
    }
}

/// Inclusive time-of-day range, in minutes after midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: u32,
    pub end: u32,
}

impl TimeWindow {
    pub fn contains(&self, minutes: u32) -> bool {
        minutes >= self.start && minutes <= self.end
    }
}

/// Per-slot windows for fixed-slot mode, indexed in1, out1, in2, out2, ...
/// A `None` slot is unrestricted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotWindows {
    windows: Vec<Option<TimeWindow>>,
}

impl Default for SlotWindows {
    fn default() -> Self {
        // Morning in/out, afternoon in/out
        Self {
            windows: vec![
                Some(TimeWindow { start: 5 * 60, end: 12 * 60 }),
                Some(TimeWindow { start: 7 * 60, end: 13 * 60 }),
                Some(TimeWindow { start: 12 * 60, end: 18 * 60 }),
                Some(TimeWindow { start: 13 * 60, end: 21 * 60 }),
            ],
        }
    }
}

impl SlotWindows {
    pub fn new(windows: Vec<Option<TimeWindow>>) -> Self {
        Self { windows }
    }

    /// Parse `"05:00-12:00,07:00-13:00,*,..."`; `*` or an empty item leaves a slot open.
    pub fn parse(spec: &str) -> Result<Self, String> {
        let mut windows = Vec::new();

        for item in spec.split(',') {
            let item = item.trim();
            if item.is_empty() || item == "*" {
                windows.push(None);
                continue;
            }

            let (start, end) = item
                .split_once('-')
                .ok_or_else(|| format!("Invalid slot window \"{}\"", item))?;
            let start = parse_minutes(start.trim())
                .ok_or_else(|| format!("Invalid window start in \"{}\"", item))?;
            let end = parse_minutes(end.trim())
                .ok_or_else(|| format!("Invalid window end in \"{}\"", item))?;

            if end < start {
                return Err(format!("Window end before start in \"{}\"", item));
            }

            windows.push(Some(TimeWindow { start, end }));
        }

        Ok(Self { windows })
    }

    pub fn window(&self, index: usize, field: ShiftField) -> Option<TimeWindow> {
        self.windows.get(slot_position(index, field)).copied().flatten()
    }

    fn check(&self, index: usize, field: ShiftField, value: &str) -> Result<(), ShiftConflict> {
        let (Some(window), Some(minutes)) = (self.window(index, field), parse_minutes(value)) else {
            return Ok(());
        };

        if window.contains(minutes) {
            Ok(())
        } else {
            Err(ShiftConflict::OutsideWindow {
                slot: slot_name(index, field),
                start: format_minutes(window.start),
                end: format_minutes(window.end),
            })
        }
    }
}

fn slot_position(index: usize, field: ShiftField) -> usize {
    index * 2
        + match field {
            ShiftField::In => 0,
            ShiftField::Out => 1,
        }
}

fn slot_name(index: usize, field: ShiftField) -> String {
    match field {
        ShiftField::In => format!("in{}", index + 1),
        ShiftField::Out => format!("out{}", index + 1),
    }
}

#[derive(Debug, Clone, Copy)]
pub enum ValidationMode<'a> {
    /// Arbitrary number of shifts, no time-of-day windows.
    Dynamic,
    /// At most four shifts, each slot inside its configured window.
    Legacy(&'a SlotWindows),
}

/// Apply `edit` to a scratch copy of `shifts` and return the new list if it is
/// acceptable. `shifts` itself is never touched.
pub fn validate_edit(
    shifts: &[Shift],
    edit: &ShiftEdit,
    mode: ValidationMode<'_>,
) -> Result<Vec<Shift>, ShiftConflict> {
    let mut scratch = shifts.to_vec();

    if edit.index > scratch.len() {
        return Err(ShiftConflict::NoSuchShift { index: edit.index });
    }
    if edit.index == scratch.len() {
        scratch.push(Shift::default());
    }
    check_count(&scratch, mode)?;

    let value = edit.value.trim().to_string();
    check_format(&value)?;
    if let ValidationMode::Legacy(windows) = mode {
        windows.check(edit.index, edit.field, &value)?;
    }

    scratch[edit.index].set_field(edit.field, value);
    check_against_others(&scratch, edit.index)?;

    Ok(scratch)
}

/// Append a complete `{in, out}` pair in one step.
pub fn validate_new_shift(
    shifts: &[Shift],
    shift: Shift,
    mode: ValidationMode<'_>,
) -> Result<Vec<Shift>, ShiftConflict> {
    let mut scratch = shifts.to_vec();
    scratch.push(Shift::new(shift.time_in.trim(), shift.time_out.trim()));
    check_count(&scratch, mode)?;

    let index = scratch.len() - 1;
    check_shift_fields(&scratch[index], index, mode)?;
    check_against_others(&scratch, index)?;

    Ok(scratch)
}

/// Check a complete shift list, as received in a full-entry payload.
pub fn validate_day(shifts: &[Shift], mode: ValidationMode<'_>) -> Result<(), ShiftConflict> {
    check_count(shifts, mode)?;

    for (index, shift) in shifts.iter().enumerate() {
        check_shift_fields(shift, index, mode)?;
        check_against_others(shifts, index)?;
    }

    Ok(())
}

fn check_count(shifts: &[Shift], mode: ValidationMode<'_>) -> Result<(), ShiftConflict> {
    match mode {
        ValidationMode::Legacy(_) if shifts.len() > LEGACY_SLOT_COUNT => {
            Err(ShiftConflict::TooManyShifts {
                max: LEGACY_SLOT_COUNT,
            })
        }
        _ => Ok(()),
    }
}

fn check_format(value: &str) -> Result<(), ShiftConflict> {
    if value.is_empty() || parse_minutes(value).is_some() {
        Ok(())
    } else {
        Err(ShiftConflict::MalformedTime {
            value: value.to_string(),
        })
    }
}

fn check_shift_fields(
    shift: &Shift,
    index: usize,
    mode: ValidationMode<'_>,
) -> Result<(), ShiftConflict> {
    for field in [ShiftField::In, ShiftField::Out] {
        let value = shift.field(field);
        check_format(value)?;
        if let ValidationMode::Legacy(windows) = mode {
            windows.check(index, field, value)?;
        }
    }
    Ok(())
}

fn check_against_others(shifts: &[Shift], index: usize) -> Result<(), ShiftConflict> {
    let shift = &shifts[index];
    let bounds = shift.bounds();

    if let Some((time_in, time_out)) = bounds {
        if time_out <= time_in {
            return Err(ShiftConflict::OutNotAfterIn { shift: index });
        }
    }

    for (other_index, other) in shifts.iter().enumerate() {
        if other_index == index {
            continue;
        }
        // Only complete shifts take part in conflict checks
        let Some((other_in, other_out)) = other.bounds() else {
            continue;
        };

        if !shift.time_in.is_empty() && shift.time_in == other.time_in {
            return Err(ShiftConflict::DuplicateIn {
                time: shift.time_in.clone(),
                other: other_index,
            });
        }
        if !shift.time_out.is_empty() && shift.time_out == other.time_out {
            return Err(ShiftConflict::DuplicateOut {
                time: shift.time_out.clone(),
                other: other_index,
            });
        }

        if let Some((time_in, time_out)) = bounds {
            if time_in < other_out && time_out > other_in {
                return Err(ShiftConflict::Overlap {
                    shift: index,
                    other: other_index,
                    other_in: other.time_in.clone(),
                    other_out: other.time_out.clone(),
                });
            }
        }
    }

    Ok(())
}

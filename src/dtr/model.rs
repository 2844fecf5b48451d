use chrono::{DateTime, Datelike, NaiveDate, Utc, Weekday};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;

use super::time::parse_minutes;

/// One in/out pair. Empty strings mean "not entered yet".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Shift {
    #[serde(rename = "in", default)]
    pub time_in: String,
    #[serde(rename = "out", default)]
    pub time_out: String,
}

impl Shift {
    pub fn new(time_in: impl Into<String>, time_out: impl Into<String>) -> Self {
        Self {
            time_in: time_in.into(),
            time_out: time_out.into(),
        }
    }

    pub fn is_blank(&self) -> bool {
        self.time_in.is_empty() && self.time_out.is_empty()
    }

    /// `(in, out)` in minutes after midnight when both sides parse.
    pub fn bounds(&self) -> Option<(u32, u32)> {
        Some((parse_minutes(&self.time_in)?, parse_minutes(&self.time_out)?))
    }

    pub fn field(&self, field: ShiftField) -> &str {
        match field {
            ShiftField::In => &self.time_in,
            ShiftField::Out => &self.time_out,
        }
    }

    pub fn set_field(&mut self, field: ShiftField, value: String) {
        match field {
            ShiftField::In => self.time_in = value,
            ShiftField::Out => self.time_out = value,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ShiftField {
    In,
    Out,
}

impl fmt::Display for ShiftField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShiftField::In => write!(f, "IN"),
            ShiftField::Out => write!(f, "OUT"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum EntryStatus {
    #[default]
    #[serde(rename = "unset")]
    Unset,
    Present,
    Absent,
    Late,
    #[serde(rename = "On Leave")]
    OnLeave,
    Excused,
    Unconfirmed,
}

impl EntryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryStatus::Unset => "unset",
            EntryStatus::Present => "Present",
            EntryStatus::Absent => "Absent",
            EntryStatus::Late => "Late",
            EntryStatus::OnLeave => "On Leave",
            EntryStatus::Excused => "Excused",
            EntryStatus::Unconfirmed => "Unconfirmed",
        }
    }

    /// Statuses only the office sets; they take precedence over derivation.
    pub fn is_office_status(&self) -> bool {
        matches!(
            self,
            EntryStatus::Present
                | EntryStatus::Absent
                | EntryStatus::Late
                | EntryStatus::OnLeave
                | EntryStatus::Excused
        )
    }
}

impl FromStr for EntryStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" | "unset" => Ok(EntryStatus::Unset),
            "Present" => Ok(EntryStatus::Present),
            "Absent" => Ok(EntryStatus::Absent),
            "Late" => Ok(EntryStatus::Late),
            "On Leave" => Ok(EntryStatus::OnLeave),
            "Excused" => Ok(EntryStatus::Excused),
            "Unconfirmed" => Ok(EntryStatus::Unconfirmed),
            other => Err(format!("Unknown entry status: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ConfirmationStatus {
    #[default]
    Unconfirmed,
    Confirmed,
}

impl ConfirmationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfirmationStatus::Unconfirmed => "unconfirmed",
            ConfirmationStatus::Confirmed => "confirmed",
        }
    }
}

impl FromStr for ConfirmationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unconfirmed" => Ok(ConfirmationStatus::Unconfirmed),
            "confirmed" => Ok(ConfirmationStatus::Confirmed),
            other => Err(format!("Unknown confirmation status: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum RecordStatus {
    #[default]
    Draft,
    Submitted,
    Approved,
    Rejected,
}

impl RecordStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordStatus::Draft => "draft",
            RecordStatus::Submitted => "submitted",
            RecordStatus::Approved => "approved",
            RecordStatus::Rejected => "rejected",
        }
    }

    /// Office decisions are terminal and lock every entry.
    pub fn is_locked(&self) -> bool {
        matches!(self, RecordStatus::Approved | RecordStatus::Rejected)
    }
}

impl fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(RecordStatus::Draft),
            "submitted" => Ok(RecordStatus::Submitted),
            "approved" => Ok(RecordStatus::Approved),
            "rejected" => Ok(RecordStatus::Rejected),
            other => Err(format!("Unknown record status: {}", other)),
        }
    }
}

/// One calendar day of a monthly record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DayEntry {
    pub day: u32,
    pub date: NaiveDate,
    pub shifts: Vec<Shift>,
    pub total_minutes: u32,
    pub late_minutes: u32,
    pub undertime_minutes: u32,
    pub status: EntryStatus,
    pub confirmation_status: ConfirmationStatus,
    pub revision: u64,
}

impl DayEntry {
    pub fn blank(date: NaiveDate) -> Self {
        Self {
            day: date.day(),
            date,
            shifts: Vec::new(),
            total_minutes: 0,
            late_minutes: 0,
            undertime_minutes: 0,
            status: EntryStatus::Unset,
            confirmation_status: ConfirmationStatus::Unconfirmed,
            revision: 0,
        }
    }

    pub fn is_sunday(&self) -> bool {
        self.date.weekday() == Weekday::Sun
    }

    pub fn is_confirmed(&self) -> bool {
        self.confirmation_status == ConfirmationStatus::Confirmed
    }

    pub fn legacy_slots(&self) -> LegacySlots {
        LegacySlots::from_shifts(&self.shifts)
    }
}

/// The per-user, per-month time record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyRecord {
    pub id: i32,
    pub user_id: i32,
    pub month: u32,
    pub year: i32,
    pub status: RecordStatus,
    pub submitted_at: Option<DateTime<Utc>>,
    pub checked_by: Option<i32>,
    pub checked_at: Option<DateTime<Utc>>,
    pub remarks: Option<String>,
    pub total_monthly_minutes: u32,
    pub entries: Vec<DayEntry>,
}

impl MonthlyRecord {
    /// Empty draft with one entry per calendar day. `None` for an invalid period.
    pub fn new(id: i32, user_id: i32, month: u32, year: i32) -> Option<Self> {
        let entries = days_of_month(month, year)?
            .into_iter()
            .map(DayEntry::blank)
            .collect();

        Some(Self {
            id,
            user_id,
            month,
            year,
            status: RecordStatus::Draft,
            submitted_at: None,
            checked_by: None,
            checked_at: None,
            remarks: None,
            total_monthly_minutes: 0,
            entries,
        })
    }

    pub fn entry(&self, day: u32) -> Option<&DayEntry> {
        self.entries.iter().find(|e| e.day == day)
    }

    pub fn entry_mut(&mut self, day: u32) -> Option<&mut DayEntry> {
        self.entries.iter_mut().find(|e| e.day == day)
    }
}

/// Every calendar date of `(month, year)`.
pub fn days_of_month(month: u32, year: i32) -> Option<Vec<NaiveDate>> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    Some(
        first
            .iter_days()
            .take_while(|d| d.month() == month)
            .collect(),
    )
}

/// Fixed four-slot view over the first four shifts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct LegacySlots {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub in1: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub out1: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub in2: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub out2: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub in3: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub out3: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub in4: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub out4: Option<String>,
}

pub const LEGACY_SLOT_COUNT: usize = 4;

impl LegacySlots {
    pub fn from_shifts(shifts: &[Shift]) -> Self {
        let slot = |i: usize, field: ShiftField| {
            shifts
                .get(i)
                .map(|s| s.field(field).to_string())
                .filter(|v| !v.is_empty())
        };

        Self {
            in1: slot(0, ShiftField::In),
            out1: slot(0, ShiftField::Out),
            in2: slot(1, ShiftField::In),
            out2: slot(1, ShiftField::Out),
            in3: slot(2, ShiftField::In),
            out3: slot(2, ShiftField::Out),
            in4: slot(3, ShiftField::In),
            out4: slot(3, ShiftField::Out),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.pairs().iter().all(|(i, o)| i.is_none() && o.is_none())
    }

    /// Back to the canonical list, dropping trailing empty slots.
    pub fn to_shifts(&self) -> Vec<Shift> {
        let mut shifts: Vec<Shift> = self
            .pairs()
            .iter()
            .map(|&(i, o)| Shift::new(i.clone().unwrap_or_default(), o.clone().unwrap_or_default()))
            .collect();

        while shifts.last().is_some_and(Shift::is_blank) {
            shifts.pop();
        }

        shifts
    }

    fn pairs(&self) -> [(&Option<String>, &Option<String>); LEGACY_SLOT_COUNT] {
        [
            (&self.in1, &self.out1),
            (&self.in2, &self.out2),
            (&self.in3, &self.out3),
            (&self.in4, &self.out4),
        ]
    }
}

/// Full-entry payload exchanged with the persistence boundary.
///
/// Current clients send `shifts`; legacy clients send `in1/out1..in4/out4`
/// and omit `shifts`. `revision` is optional: without it the write is
/// last-write-wins.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EntryPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shifts: Option<Vec<Shift>>,
    #[serde(flatten)]
    pub legacy: LegacySlots,
    #[serde(default)]
    pub status: EntryStatus,
    /// Worked minutes as computed by the sender. Informational only.
    #[serde(default)]
    pub total_hours: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revision: Option<u64>,
}

impl EntryPayload {
    pub fn from_entry(entry: &DayEntry) -> Self {
        Self {
            shifts: Some(entry.shifts.clone()),
            legacy: entry.legacy_slots(),
            status: entry.status,
            total_hours: entry.total_minutes,
            revision: Some(entry.revision),
        }
    }

    pub fn resolved_shifts(&self) -> Vec<Shift> {
        match &self.shifts {
            Some(shifts) => shifts.clone(),
            None => self.legacy.to_shifts(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ActorRole {
    /// The record owner.
    Student,
    /// The confirming office.
    Office,
}

impl ActorRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActorRole::Student => "student",
            ActorRole::Office => "office",
        }
    }
}

impl FromStr for ActorRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "student" => Ok(ActorRole::Student),
            "office" => Ok(ActorRole::Office),
            other => Err(format!("Unknown role: {}", other)),
        }
    }
}

/// Who is performing an edit or action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Actor {
    pub user_id: i32,
    pub role: ActorRole,
}

impl Actor {
    pub fn student(user_id: i32) -> Self {
        Self {
            user_id,
            role: ActorRole::Student,
        }
    }

    pub fn office(user_id: i32) -> Self {
        Self {
            user_id,
            role: ActorRole::Office,
        }
    }

    pub fn is_office(&self) -> bool {
        self.role == ActorRole::Office
    }
}

//! Daily time record engine: time entry normalization and validation,
//! per-day and per-period aggregation, the record lifecycle, and the
//! debounced auto-save edit session.

pub mod aggregate;
pub mod lifecycle;
pub mod model;
pub mod period;
pub mod queue;
pub mod scheduler;
pub mod session;
pub mod store;
pub mod time;
pub mod validator;

pub use lifecycle::{check_edit, LockReason, RecordAction, RecordRules, UpdateRejection};
pub use model::{
    Actor, ActorRole, ConfirmationStatus, DayEntry, EntryPayload, EntryStatus, MonthlyRecord,
    RecordStatus, Shift, ShiftField,
};
pub use period::{summarize, DayTotal, PeriodSummary, WeekBucket};
pub use scheduler::{AutoSaveConfig, ExponentialBackoff, NoRetry, RetryPolicy};
pub use session::{EditOutcome, EditSession, SaveWarning, SessionOptions};
pub use store::{DtrStore, MemoryDtrStore, StoreError};
pub use validator::{ShiftConflict, SlotWindows};

use chrono::NaiveDate;

/// The local calendar date, used for the office's same-day rule.
pub fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

use super::aggregate::{recompute_entry, AttendancePolicy};
use super::lifecycle::{check_edit, LockReason, UpdateRejection};
use super::model::{Actor, DayEntry, EntryPayload, MonthlyRecord, Shift, ShiftField};
use super::period::{monthly_total_minutes, summarize, PeriodSummary};
use super::queue::{ChangeQueue, EntryPatch};
use super::scheduler::{save_with_retry, AutoSaveConfig, Debouncer, WriteTracker};
use super::store::{DtrStore, StoreError};
use super::time::normalize_time;
use super::validator::{
    validate_edit, validate_new_shift, ShiftConflict, ShiftEdit, SlotWindows, ValidationMode,
};

/// How long a refused edit stays visible to the user.
pub const CONFLICT_NOTICE_TTL: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, Default)]
pub struct SessionOptions {
    /// `Some` restricts the session to four fixed slots inside these windows.
    pub legacy_slots: Option<SlotWindows>,
    pub attendance: AttendancePolicy,
    pub autosave: AutoSaveConfig,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditOutcome {
    /// Accepted locally and queued for saving.
    Applied { revision: u64 },
    /// Accepted but identical to the current state; nothing queued.
    Unchanged,
    /// Refused by the validator; a conflict notice is shown.
    Rejected(ShiftConflict),
    /// The day cannot be edited right now. Nothing is shown to the user.
    Ignored(LockReason),
}

/// A save that did not reach the server. The local edit is kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveWarning {
    pub day: u32,
    pub message: String,
}

#[derive(Debug)]
struct ConflictNotice {
    message: String,
    raised_at: Instant,
}

struct SessionState {
    record: MonthlyRecord,
    queue: ChangeQueue,
    notice: Option<ConflictNotice>,
    warnings: Vec<SaveWarning>,
}

struct SessionShared {
    store: Arc<dyn DtrStore>,
    actor: Actor,
    options: SessionOptions,
    state: Mutex<SessionState>,
    debouncer: Debouncer,
    writes: WriteTracker,
}

/// Editing state for one user's record in one period.
///
/// Edits are validated and applied locally right away, then written in the
/// background once the user pauses. Cloning yields another handle to the same
/// session.
#[derive(Clone)]
pub struct EditSession {
    shared: Arc<SessionShared>,
}

impl EditSession {
    /// Load (or create) the record for `(user_id, month, year)`.
    pub async fn open(
        store: Arc<dyn DtrStore>,
        actor: Actor,
        user_id: i32,
        month: u32,
        year: i32,
        options: SessionOptions,
    ) -> Result<Self, StoreError> {
        let record = store.get_or_create_record(user_id, month, year).await?;

        let mut queue = ChangeQueue::new();
        for entry in &record.entries {
            queue.seed_revision(entry.day, entry.revision);
        }

        tracing::debug!(
            record_id = record.id,
            user_id,
            month,
            year,
            "Opened DTR edit session"
        );

        Ok(Self {
            shared: Arc::new(SessionShared {
                store,
                actor,
                options,
                state: Mutex::new(SessionState {
                    record,
                    queue,
                    notice: None,
                    warnings: Vec::new(),
                }),
                debouncer: Debouncer::default(),
                writes: WriteTracker::default(),
            }),
        })
    }

    /// Save everything pending for this period, then open another one.
    pub async fn switch_period(self, month: u32, year: i32) -> Result<EditSession, StoreError> {
        self.settle().await;

        let user_id = self.shared.state.lock().await.record.user_id;
        EditSession::open(
            self.shared.store.clone(),
            self.shared.actor,
            user_id,
            month,
            year,
            self.shared.options.clone(),
        )
        .await
    }

    /// Set one field of one shift. `index` equal to the shift count starts a new shift.
    pub async fn edit_shift(&self, day: u32, index: usize, field: ShiftField, raw: &str) -> EditOutcome {
        let edit = ShiftEdit::new(index, field, normalize_time(raw));
        self.apply(day, |shifts, mode| validate_edit(shifts, &edit, mode))
            .await
    }

    pub async fn add_shift(&self, day: u32, raw_in: &str, raw_out: &str) -> EditOutcome {
        let shift = Shift::new(normalize_time(raw_in), normalize_time(raw_out));
        self.apply(day, |shifts, mode| validate_new_shift(shifts, shift, mode))
            .await
    }

    pub async fn remove_shift(&self, day: u32, index: usize) -> EditOutcome {
        self.apply(day, |shifts, _| {
            if index >= shifts.len() {
                return Err(ShiftConflict::NoSuchShift { index });
            }
            let mut remaining = shifts.to_vec();
            remaining.remove(index);
            Ok(remaining)
        })
        .await
    }

    async fn apply<F>(&self, day: u32, change: F) -> EditOutcome
    where
        F: FnOnce(&[Shift], ValidationMode<'_>) -> Result<Vec<Shift>, ShiftConflict>,
    {
        let shared = &self.shared;
        let mode = match &shared.options.legacy_slots {
            Some(windows) => ValidationMode::Legacy(windows),
            None => ValidationMode::Dynamic,
        };

        let revision = {
            let mut state = shared.state.lock().await;

            if let Err(reason) = check_edit(&state.record, day, &shared.actor, super::today()) {
                tracing::debug!(day, reason = %reason, "Ignoring edit to locked day");
                return EditOutcome::Ignored(reason);
            }
            let Some(entry) = state.record.entry(day) else {
                return EditOutcome::Ignored(LockReason::NoSuchDay(day));
            };

            let shifts = match change(&entry.shifts, mode) {
                Ok(shifts) => shifts,
                Err(conflict) => {
                    state.notice = Some(ConflictNotice {
                        message: conflict.to_string(),
                        raised_at: Instant::now(),
                    });
                    return EditOutcome::Rejected(conflict);
                }
            };
            if shifts == entry.shifts {
                return EditOutcome::Unchanged;
            }

            let revision = state.queue.push(day, EntryPatch::shifts(shifts.clone()));
            if let Some(entry) = state.record.entry_mut(day) {
                entry.shifts = shifts;
                entry.revision = revision;
                recompute_entry(entry, &shared.options.attendance);
            }
            state.record.total_monthly_minutes = monthly_total_minutes(&state.record.entries);
            state.notice = None;
            revision
        };

        self.schedule_flush().await;
        EditOutcome::Applied { revision }
    }

    async fn schedule_flush(&self) {
        let session = self.clone();
        self.shared
            .debouncer
            .schedule(self.shared.options.autosave.debounce, async move {
                session.flush().await;
            })
            .await;
    }

    /// Write pending changes now instead of waiting for the quiet period.
    pub async fn flush_now(&self) {
        self.shared.debouncer.cancel().await;
        self.flush().await;
    }

    /// Flush and wait until every write has completed.
    pub async fn settle(&self) {
        self.flush_now().await;
        self.shared.writes.wait_all().await;
    }

    async fn flush(&self) {
        let shared = &self.shared;

        // Writes are tracked before the state lock is released
        let mut state = shared.state.lock().await;
        if state.record.status.is_locked() || state.queue.is_empty() {
            return;
        }

        let record_id = state.record.id;
        let drained = state.queue.drain();
        let batch: Vec<(u32, EntryPayload)> = drained
            .into_iter()
            .filter_map(|(day, patch)| {
                let mut entry = state.record.entry(day)?.clone();
                patch.apply_to(&mut entry);
                recompute_entry(&mut entry, &shared.options.attendance);

                let mut payload = EntryPayload::from_entry(&entry);
                payload.revision = Some(state.queue.revision(day));
                Some((day, payload))
            })
            .collect();

        tracing::debug!(record_id, days = batch.len(), "Flushing DTR changes");

        for (day, payload) in batch {
            let session = self.clone();
            let handle = tokio::spawn(async move {
                session.write_day(record_id, day, payload).await;
            });
            shared.writes.track(handle).await;
        }
    }

    async fn write_day(&self, record_id: i32, day: u32, payload: EntryPayload) {
        let shared = &self.shared;
        let result = save_with_retry(
            shared.store.as_ref(),
            shared.options.autosave.retry.as_ref(),
            &shared.actor,
            record_id,
            day,
            &payload,
        )
        .await;

        let mut state = shared.state.lock().await;
        let sent = payload.revision.unwrap_or_default();
        match result {
            Ok(server) => reconcile(&mut state, server),
            Err(e) if is_stale_write(&e) && state.queue.revision(day) > sent => {
                tracing::debug!(
                    error = %e,
                    record_id,
                    day,
                    revision = sent,
                    "Dropping response to a superseded write"
                );
            }
            Err(e) => {
                tracing::warn!(error = %e, record_id, day, "Failed to save DTR entry");
                state.warnings.push(SaveWarning {
                    day,
                    message: e.to_string(),
                });
            }
        }
    }

    pub async fn record(&self) -> MonthlyRecord {
        self.shared.state.lock().await.record.clone()
    }

    pub async fn entry(&self, day: u32) -> Option<DayEntry> {
        self.shared.state.lock().await.record.entry(day).cloned()
    }

    pub async fn summary(&self) -> PeriodSummary {
        summarize(&self.shared.state.lock().await.record.entries)
    }

    /// The last conflict message, while it is still visible.
    pub async fn conflict_notice(&self) -> Option<String> {
        let mut state = self.shared.state.lock().await;
        match &state.notice {
            Some(notice) if notice.raised_at.elapsed() < CONFLICT_NOTICE_TTL => {
                Some(notice.message.clone())
            }
            Some(_) => {
                state.notice = None;
                None
            }
            None => None,
        }
    }

    pub async fn take_warnings(&self) -> Vec<SaveWarning> {
        std::mem::take(&mut self.shared.state.lock().await.warnings)
    }

    pub async fn pending_days(&self) -> usize {
        self.shared.state.lock().await.queue.len()
    }
}

/// The server already holds a newer revision of the day.
fn is_stale_write(err: &StoreError) -> bool {
    matches!(
        err,
        StoreError::Rejected(UpdateRejection::StaleRevision { .. })
            | StoreError::Remote { status: 409, .. }
    )
}

/// Adopt the server's record without clobbering newer local edits.
fn reconcile(state: &mut SessionState, server: MonthlyRecord) {
    if server.id != state.record.id {
        return;
    }

    for server_entry in server.entries {
        let day = server_entry.day;
        if state.queue.contains(day) || server_entry.revision < state.queue.revision(day) {
            tracing::debug!(day, "Keeping newer local entry");
            continue;
        }
        if let Some(local) = state.record.entry_mut(day) {
            *local = server_entry;
        }
    }

    let record = &mut state.record;
    record.status = server.status;
    record.submitted_at = server.submitted_at;
    record.checked_by = server.checked_by;
    record.checked_at = server.checked_at;
    record.remarks = server.remarks;
    record.total_monthly_minutes = monthly_total_minutes(&record.entries);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dtr::lifecycle::RecordAction;
    use crate::dtr::model::{EntryStatus, RecordStatus};
    use crate::dtr::scheduler::ExponentialBackoff;
    use crate::dtr::store::MemoryDtrStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Semaphore;

    const OWNER: i32 = 7;

    /// Memory store that counts writes and can fail or hold them.
    struct RecordingStore {
        inner: MemoryDtrStore,
        writes: AtomicUsize,
        failures_left: AtomicUsize,
        payloads: Mutex<Vec<(u32, EntryPayload)>>,
        gate: Option<Semaphore>,
        slow_revision: Option<u64>,
    }

    impl RecordingStore {
        fn new() -> Self {
            Self {
                inner: MemoryDtrStore::default(),
                writes: AtomicUsize::new(0),
                failures_left: AtomicUsize::new(0),
                payloads: Mutex::new(Vec::new()),
                gate: None,
                slow_revision: None,
            }
        }

        /// Writes carrying `revision` take five seconds to land.
        fn slow_for(revision: u64) -> Self {
            Self {
                slow_revision: Some(revision),
                ..Self::new()
            }
        }

        fn failing(times: usize) -> Self {
            let store = Self::new();
            store.failures_left.store(times, Ordering::SeqCst);
            store
        }

        fn gated() -> Self {
            Self {
                gate: Some(Semaphore::new(0)),
                ..Self::new()
            }
        }

        fn release_one(&self) {
            if let Some(gate) = &self.gate {
                gate.add_permits(1);
            }
        }

        fn writes(&self) -> usize {
            self.writes.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl DtrStore for RecordingStore {
        async fn get_or_create_record(
            &self,
            user_id: i32,
            month: u32,
            year: i32,
        ) -> Result<MonthlyRecord, StoreError> {
            self.inner.get_or_create_record(user_id, month, year).await
        }

        async fn get_record(&self, record_id: i32) -> Result<MonthlyRecord, StoreError> {
            self.inner.get_record(record_id).await
        }

        async fn update_entry(
            &self,
            actor: &Actor,
            record_id: i32,
            day: u32,
            payload: &EntryPayload,
        ) -> Result<MonthlyRecord, StoreError> {
            self.writes.fetch_add(1, Ordering::SeqCst);
            self.payloads.lock().await.push((day, payload.clone()));

            if let Some(gate) = &self.gate {
                gate.acquire().await.unwrap().forget();
            }
            if self.slow_revision.is_some() && payload.revision == self.slow_revision {
                tokio::time::sleep(Duration::from_secs(5)).await;
            }

            let failed = self
                .failures_left
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if failed {
                return Err(StoreError::Transport("connection reset".to_string()));
            }

            self.inner.update_entry(actor, record_id, day, payload).await
        }

        async fn apply_action(
            &self,
            actor: &Actor,
            record_id: i32,
            action: RecordAction,
        ) -> Result<MonthlyRecord, StoreError> {
            self.inner.apply_action(actor, record_id, action).await
        }
    }

    // September 2024: the 1st is a Sunday
    async fn open(store: &Arc<RecordingStore>, options: SessionOptions) -> EditSession {
        EditSession::open(store.clone(), Actor::student(OWNER), OWNER, 9, 2024, options)
            .await
            .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_rapid_edits_are_saved_once() {
        let store = Arc::new(RecordingStore::new());
        let session = open(&store, SessionOptions::default()).await;

        assert!(matches!(
            session.edit_shift(10, 0, ShiftField::In, "7").await,
            EditOutcome::Applied { revision: 1 }
        ));
        tokio::time::sleep(Duration::from_millis(200)).await;
        session.edit_shift(10, 0, ShiftField::Out, "11:00").await;
        tokio::time::sleep(Duration::from_millis(200)).await;
        session.edit_shift(10, 1, ShiftField::In, "13:00").await;

        assert_eq!(store.writes(), 0);
        assert_eq!(session.pending_days().await, 1);

        tokio::time::sleep(Duration::from_millis(1500)).await;
        session.settle().await;

        assert_eq!(store.writes(), 1);
        let payloads = store.payloads.lock().await;
        let (day, payload) = &payloads[0];
        assert_eq!(*day, 10);
        assert_eq!(
            payload.shifts.as_deref(),
            Some(&[Shift::new("07:00", "11:00"), Shift::new("13:00", "")][..])
        );
        assert_eq!(payload.revision, Some(3));
        assert_eq!(payload.total_hours, 240);
        assert_eq!(payload.status, EntryStatus::Unconfirmed);
        drop(payloads);

        let entry = session.entry(10).await.unwrap();
        assert_eq!(entry.total_minutes, 240);
        assert_eq!(entry.revision, 3);
        assert_eq!(session.pending_days().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_each_day_gets_its_own_write() {
        let store = Arc::new(RecordingStore::new());
        let session = open(&store, SessionOptions::default()).await;

        session.add_shift(2, "08:00", "12:00").await;
        session.add_shift(3, "08:00", "10:30").await;
        session.settle().await;

        assert_eq!(store.writes(), 2);
        let saved = store.inner.get_record(session.record().await.id).await.unwrap();
        assert_eq!(saved.total_monthly_minutes, 390);
        assert_eq!(session.record().await.total_monthly_minutes, 390);
    }

    #[tokio::test(start_paused = true)]
    async fn test_overlapping_shift_is_rejected_with_notice() {
        let store = Arc::new(RecordingStore::new());
        let session = open(&store, SessionOptions::default()).await;

        session.add_shift(5, "07:00", "11:00").await;
        let outcome = session.add_shift(5, "08:00", "10:00").await;

        assert!(matches!(
            outcome,
            EditOutcome::Rejected(ShiftConflict::Overlap { other: 0, .. })
        ));
        assert_eq!(session.entry(5).await.unwrap().shifts.len(), 1);

        let notice = session.conflict_notice().await.unwrap();
        assert_eq!(notice, "Shift 2 overlaps shift 1 (07:00-11:00)");

        tokio::time::sleep(CONFLICT_NOTICE_TTL).await;
        assert_eq!(session.conflict_notice().await, None);

        session.settle().await;
        let saved = store.payloads.lock().await;
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].1.shifts.as_ref().map(Vec::len), Some(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_out_before_in_is_rejected() {
        let store = Arc::new(RecordingStore::new());
        let session = open(&store, SessionOptions::default()).await;

        session.edit_shift(4, 0, ShiftField::In, "09:00").await;
        let outcome = session.edit_shift(4, 0, ShiftField::Out, "8").await;

        assert_eq!(outcome, EditOutcome::Rejected(ShiftConflict::OutNotAfterIn { shift: 0 }));
        assert_eq!(session.conflict_notice().await.as_deref(), Some("OUT must be after IN"));
        assert_eq!(session.entry(4).await.unwrap().shifts[0].time_out, "");
    }

    #[tokio::test(start_paused = true)]
    async fn test_confirmed_day_is_ignored_without_a_write() {
        let store = Arc::new(RecordingStore::new());
        let record = store.get_or_create_record(OWNER, 9, 2024).await.unwrap();
        store
            .apply_action(&Actor::office(900), record.id, RecordAction::ConfirmEntry { day: 12 })
            .await
            .unwrap();

        let session = open(&store, SessionOptions::default()).await;
        let outcome = session.edit_shift(12, 0, ShiftField::In, "08:00").await;

        assert_eq!(outcome, EditOutcome::Ignored(LockReason::EntryConfirmed(12)));
        assert_eq!(session.conflict_notice().await, None);
        assert!(session.entry(12).await.unwrap().shifts.is_empty());

        session.settle().await;
        assert_eq!(store.writes(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sunday_is_ignored() {
        let store = Arc::new(RecordingStore::new());
        let session = open(&store, SessionOptions::default()).await;

        let outcome = session.add_shift(1, "08:00", "12:00").await;
        assert_eq!(outcome, EditOutcome::Ignored(LockReason::NoDutyDay(1)));
        assert_eq!(session.pending_days().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_approved_record_is_read_only() {
        let store = Arc::new(RecordingStore::new());
        let record = store.get_or_create_record(OWNER, 9, 2024).await.unwrap();
        store
            .apply_action(&Actor::student(OWNER), record.id, RecordAction::Submit)
            .await
            .unwrap();
        store
            .apply_action(&Actor::office(900), record.id, RecordAction::Approve { remarks: None })
            .await
            .unwrap();

        let session = open(&store, SessionOptions::default()).await;
        let outcome = session.add_shift(3, "08:00", "12:00").await;

        assert_eq!(
            outcome,
            EditOutcome::Ignored(LockReason::RecordLocked(RecordStatus::Approved))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_save_keeps_local_state() {
        let store = Arc::new(RecordingStore::failing(1));
        let session = open(&store, SessionOptions::default()).await;

        session.add_shift(3, "08:00", "12:00").await;
        session.settle().await;

        assert_eq!(store.writes(), 1);
        let warnings = session.take_warnings().await;
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].day, 3);
        assert_eq!(session.entry(3).await.unwrap().total_minutes, 240);
        assert!(session.take_warnings().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_retries_transient_failures() {
        let store = Arc::new(RecordingStore::failing(2));
        let options = SessionOptions {
            autosave: AutoSaveConfig {
                retry: Arc::new(ExponentialBackoff::default()),
                ..AutoSaveConfig::default()
            },
            ..SessionOptions::default()
        };
        let session = open(&store, options).await;

        session.add_shift(3, "08:00", "12:00").await;
        session.settle().await;

        assert_eq!(store.writes(), 3);
        assert!(session.take_warnings().await.is_empty());
        let saved = store.inner.get_record(session.record().await.id).await.unwrap();
        assert_eq!(saved.entry(3).unwrap().total_minutes, 240);
    }

    #[tokio::test(start_paused = true)]
    async fn test_edit_during_write_is_not_overwritten() {
        let store = Arc::new(RecordingStore::gated());
        let session = open(&store, SessionOptions::default()).await;

        session.add_shift(3, "08:00", "12:00").await;
        session.flush_now().await;
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(store.writes(), 1);

        // Newer edit while the first write is still in flight
        session.edit_shift(3, 0, ShiftField::Out, "10:00").await;
        store.release_one();
        tokio::time::sleep(Duration::from_millis(10)).await;

        let entry = session.entry(3).await.unwrap();
        assert_eq!(entry.shifts[0].time_out, "10:00");
        assert_eq!(entry.total_minutes, 120);

        store.release_one();
        session.settle().await;

        assert_eq!(store.writes(), 2);
        let saved = store.inner.get_record(session.record().await.id).await.unwrap();
        assert_eq!(saved.entry(3).unwrap().shifts[0].time_out, "10:00");
        assert_eq!(saved.entry(3).unwrap().revision, 2);
        assert_eq!(session.entry(3).await.unwrap().total_minutes, 120);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_write_is_reported_not_retried() {
        let store = Arc::new(RecordingStore::new());
        let record = store.get_or_create_record(OWNER, 9, 2024).await.unwrap();
        let options = SessionOptions {
            autosave: AutoSaveConfig {
                retry: Arc::new(ExponentialBackoff::default()),
                ..AutoSaveConfig::default()
            },
            ..SessionOptions::default()
        };
        let session = open(&store, options).await;

        // Another device saved day 3 at a higher revision after the session loaded
        let newer = EntryPayload {
            shifts: Some(vec![Shift::new("13:00", "15:00")]),
            revision: Some(5),
            ..Default::default()
        };
        store
            .inner
            .update_entry(&Actor::student(OWNER), record.id, 3, &newer)
            .await
            .unwrap();

        session.add_shift(3, "08:00", "12:00").await;
        session.settle().await;

        assert_eq!(store.writes(), 1);
        let warnings = session.take_warnings().await;
        assert_eq!(warnings.len(), 1);
        let expected = StoreError::from(UpdateRejection::StaleRevision {
            day: 3,
            current: 5,
            received: 1,
        });
        assert_eq!(warnings[0].message, expected.to_string());
    }

    #[tokio::test(start_paused = true)]
    async fn test_superseded_write_landing_late_is_not_reported() {
        let store = Arc::new(RecordingStore::slow_for(1));
        let session = open(&store, SessionOptions::default()).await;

        session.add_shift(3, "08:00", "09:00").await;
        session.flush_now().await;
        session.edit_shift(3, 0, ShiftField::Out, "10:00").await;
        session.flush_now().await;
        session.settle().await;

        assert_eq!(store.writes(), 2);
        assert!(session.take_warnings().await.is_empty());

        let saved = store.inner.get_record(session.record().await.id).await.unwrap();
        let day = saved.entry(3).unwrap();
        assert_eq!(day.shifts, vec![Shift::new("08:00", "10:00")]);
        assert_eq!(day.revision, 2);
        assert_eq!(session.entry(3).await.unwrap().shifts, day.shifts);
    }

    #[tokio::test(start_paused = true)]
    async fn test_settle_waits_for_debounced_flush() {
        let store = Arc::new(RecordingStore::gated());
        let session = open(&store, SessionOptions::default()).await;

        session.add_shift(2, "08:00", "12:00").await;
        tokio::time::sleep(Duration::from_millis(1100)).await;
        assert_eq!(store.writes(), 1);
        assert_eq!(session.pending_days().await, 0);

        let settling = tokio::spawn({
            let session = session.clone();
            async move { session.settle().await }
        });
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!settling.is_finished());

        store.release_one();
        settling.await.unwrap();
        let saved = store.inner.get_record(session.record().await.id).await.unwrap();
        assert_eq!(saved.entry(2).unwrap().total_minutes, 240);
    }

    #[tokio::test(start_paused = true)]
    async fn test_legacy_mode_limits_slots() {
        let store = Arc::new(RecordingStore::new());
        let options = SessionOptions {
            legacy_slots: Some(SlotWindows::default()),
            ..SessionOptions::default()
        };
        let session = open(&store, options).await;

        let outcome = session.add_shift(3, "04:00", "06:00").await;
        assert!(matches!(
            outcome,
            EditOutcome::Rejected(ShiftConflict::OutsideWindow { .. })
        ));
        assert!(matches!(
            session.add_shift(3, "07:00", "11:00").await,
            EditOutcome::Applied { .. }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_remove_shift_and_switch_period() {
        let store = Arc::new(RecordingStore::new());
        let session = open(&store, SessionOptions::default()).await;

        session.add_shift(3, "08:00", "10:00").await;
        session.add_shift(3, "13:00", "15:00").await;
        assert!(matches!(session.remove_shift(3, 0).await, EditOutcome::Applied { .. }));
        assert_eq!(
            session.remove_shift(3, 5).await,
            EditOutcome::Rejected(ShiftConflict::NoSuchShift { index: 5 })
        );

        let september_id = session.record().await.id;
        let october = session.switch_period(10, 2024).await.unwrap();

        let saved = store.inner.get_record(september_id).await.unwrap();
        assert_eq!(saved.entry(3).unwrap().shifts, vec![Shift::new("13:00", "15:00")]);
        assert_eq!(october.record().await.month, 10);
        assert_eq!(store.writes(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_summary_reflects_local_edits() {
        let store = Arc::new(RecordingStore::new());
        let session = open(&store, SessionOptions::default()).await;

        session.add_shift(2, "07:00", "14:00").await;
        let summary = session.summary().await;

        // Unconfirmed days count toward the month but not the week
        assert_eq!(summary.total_monthly_minutes, 300);
        assert_eq!(summary.weeks[0].minutes, 0);
    }
}

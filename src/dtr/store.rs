use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::Mutex;

use super::lifecycle::{RecordAction, RecordRules, UpdateRejection};
use super::model::{Actor, EntryPayload, MonthlyRecord};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Not Found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Rejected(#[from] UpdateRejection),

    #[error("{0}")]
    Database(#[from] sqlx::Error),

    #[error("Remote error {status}: {message}")]
    Remote { status: u16, message: String },

    #[error("Transport error: {0}")]
    Transport(String),
}

impl StoreError {
    /// Whether trying the same write again could succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            StoreError::Database(e) => is_transient_db_error(e),
            StoreError::Transport(_) => true,
            StoreError::Remote { status, .. } => *status >= 500,
            StoreError::NotFound(_) | StoreError::Rejected(_) => false,
        }
    }
}

/// Connection, pool and serialization failures. Decode errors, missing rows
/// and constraint violations fail the same way every time.
fn is_transient_db_error(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::Protocol(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::WorkerCrashed => true,
        // serialization_failure, deadlock_detected
        sqlx::Error::Database(db) => matches!(db.code().as_deref(), Some("40001" | "40P01")),
        _ => false,
    }
}

/// The persistence boundary for monthly records.
#[async_trait]
pub trait DtrStore: Send + Sync {
    /// Idempotent: creates an empty draft with one entry per day when missing.
    async fn get_or_create_record(
        &self,
        user_id: i32,
        month: u32,
        year: i32,
    ) -> Result<MonthlyRecord, StoreError>;

    async fn get_record(&self, record_id: i32) -> Result<MonthlyRecord, StoreError>;

    /// Full-entry replace of one day; returns the authoritative record.
    async fn update_entry(
        &self,
        actor: &Actor,
        record_id: i32,
        day: u32,
        payload: &EntryPayload,
    ) -> Result<MonthlyRecord, StoreError>;

    async fn apply_action(
        &self,
        actor: &Actor,
        record_id: i32,
        action: RecordAction,
    ) -> Result<MonthlyRecord, StoreError>;
}

#[derive(Default)]
struct MemoryRecords {
    records: HashMap<i32, MonthlyRecord>,
    by_period: HashMap<(i32, u32, i32), i32>,
    next_id: i32,
}

/// In-process store. One mutex serializes every write.
#[derive(Default)]
pub struct MemoryDtrStore {
    rules: RecordRules,
    inner: Mutex<MemoryRecords>,
}

impl MemoryDtrStore {
    pub fn new(rules: RecordRules) -> Self {
        Self {
            rules,
            inner: Mutex::new(MemoryRecords::default()),
        }
    }
}

#[async_trait]
impl DtrStore for MemoryDtrStore {
    async fn get_or_create_record(
        &self,
        user_id: i32,
        month: u32,
        year: i32,
    ) -> Result<MonthlyRecord, StoreError> {
        let mut inner = self.inner.lock().await;

        if let Some(id) = inner.by_period.get(&(user_id, month, year)).copied() {
            if let Some(record) = inner.records.get(&id) {
                return Ok(record.clone());
            }
        }

        inner.next_id += 1;
        let id = inner.next_id;
        let record = MonthlyRecord::new(id, user_id, month, year)
            .ok_or(UpdateRejection::InvalidPeriod { month, year })?;

        tracing::debug!(record_id = id, user_id, month, year, "Created DTR record");
        inner.by_period.insert((user_id, month, year), id);
        inner.records.insert(id, record.clone());

        Ok(record)
    }

    async fn get_record(&self, record_id: i32) -> Result<MonthlyRecord, StoreError> {
        let inner = self.inner.lock().await;
        inner
            .records
            .get(&record_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("DTR record {} not found", record_id)))
    }

    async fn update_entry(
        &self,
        actor: &Actor,
        record_id: i32,
        day: u32,
        payload: &EntryPayload,
    ) -> Result<MonthlyRecord, StoreError> {
        let mut inner = self.inner.lock().await;
        let record = inner
            .records
            .get_mut(&record_id)
            .ok_or_else(|| StoreError::NotFound(format!("DTR record {} not found", record_id)))?;

        let mut updated = record.clone();
        updated.apply_entry_update(actor, day, payload, &self.rules, super::today())?;
        *record = updated.clone();

        Ok(updated)
    }

    async fn apply_action(
        &self,
        actor: &Actor,
        record_id: i32,
        action: RecordAction,
    ) -> Result<MonthlyRecord, StoreError> {
        let mut inner = self.inner.lock().await;
        let record = inner
            .records
            .get_mut(&record_id)
            .ok_or_else(|| StoreError::NotFound(format!("DTR record {} not found", record_id)))?;

        let mut updated = record.clone();
        updated.apply_action(actor, action, Utc::now())?;
        *record = updated.clone();

        Ok(updated)
    }
}

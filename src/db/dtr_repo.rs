use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{types::Json, FromRow, PgConnection, PgPool};

use crate::dtr::{
    Actor, ConfirmationStatus, DayEntry, DtrStore, EntryPayload, EntryStatus, MonthlyRecord,
    RecordAction, RecordRules, RecordStatus, Shift, StoreError, UpdateRejection,
};

#[derive(Debug, FromRow)]
struct RecordRow {
    id: i32,
    user_id: i32,
    month: i32,
    year: i32,
    status: String,
    submitted_at: Option<DateTime<Utc>>,
    checked_by: Option<i32>,
    checked_at: Option<DateTime<Utc>>,
    remarks: Option<String>,
    total_monthly_minutes: i32,
}

#[derive(Debug, FromRow)]
struct EntryRow {
    day: i32,
    date: NaiveDate,
    shifts: Json<Vec<Shift>>,
    total_minutes: i32,
    late_minutes: i32,
    undertime_minutes: i32,
    status: String,
    confirmation_status: String,
    revision: i64,
}

fn decode_error(message: String) -> sqlx::Error {
    sqlx::Error::Decode(message.into())
}

impl TryFrom<EntryRow> for DayEntry {
    type Error = sqlx::Error;

    fn try_from(row: EntryRow) -> Result<Self, Self::Error> {
        Ok(DayEntry {
            day: row.day as u32,
            date: row.date,
            shifts: row.shifts.0,
            total_minutes: row.total_minutes.max(0) as u32,
            late_minutes: row.late_minutes.max(0) as u32,
            undertime_minutes: row.undertime_minutes.max(0) as u32,
            status: row.status.parse::<EntryStatus>().map_err(decode_error)?,
            confirmation_status: row
                .confirmation_status
                .parse::<ConfirmationStatus>()
                .map_err(decode_error)?,
            revision: row.revision.max(0) as u64,
        })
    }
}

fn assemble(row: RecordRow, entries: Vec<EntryRow>) -> Result<MonthlyRecord, sqlx::Error> {
    Ok(MonthlyRecord {
        id: row.id,
        user_id: row.user_id,
        month: row.month as u32,
        year: row.year,
        status: row.status.parse::<RecordStatus>().map_err(decode_error)?,
        submitted_at: row.submitted_at,
        checked_by: row.checked_by,
        checked_at: row.checked_at,
        remarks: row.remarks,
        total_monthly_minutes: row.total_monthly_minutes.max(0) as u32,
        entries: entries
            .into_iter()
            .map(DayEntry::try_from)
            .collect::<Result<_, _>>()?,
    })
}

const SELECT_RECORD: &str = r#"
    SELECT id, user_id, month, year, status, submitted_at, checked_by, checked_at,
           remarks, total_monthly_minutes
    FROM dtr_records
    WHERE id = $1
"#;

const SELECT_RECORD_FOR_UPDATE: &str = r#"
    SELECT id, user_id, month, year, status, submitted_at, checked_by, checked_at,
           remarks, total_monthly_minutes
    FROM dtr_records
    WHERE id = $1
    FOR UPDATE
"#;

async fn fetch_record(
    conn: &mut PgConnection,
    record_id: i32,
    for_update: bool,
) -> Result<MonthlyRecord, StoreError> {
    let sql = if for_update {
        SELECT_RECORD_FOR_UPDATE
    } else {
        SELECT_RECORD
    };

    let row: RecordRow = sqlx::query_as(sql)
        .bind(record_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| StoreError::NotFound(format!("DTR record {} not found", record_id)))?;

    let entries: Vec<EntryRow> = sqlx::query_as(
        r#"
        SELECT day, date, shifts, total_minutes, late_minutes, undertime_minutes,
               status, confirmation_status, revision
        FROM dtr_entries
        WHERE record_id = $1
        ORDER BY day
        "#,
    )
    .bind(record_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(assemble(row, entries)?)
}

/// Persist the record-level fields and every entry that differs from `before`.
async fn save_changes(
    conn: &mut PgConnection,
    before: &MonthlyRecord,
    after: &MonthlyRecord,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE dtr_records
        SET status = $1, submitted_at = $2, checked_by = $3, checked_at = $4,
            remarks = $5, total_monthly_minutes = $6, updated_at = NOW()
        WHERE id = $7
        "#,
    )
    .bind(after.status.as_str())
    .bind(after.submitted_at)
    .bind(after.checked_by)
    .bind(after.checked_at)
    .bind(&after.remarks)
    .bind(after.total_monthly_minutes as i32)
    .bind(after.id)
    .execute(&mut *conn)
    .await?;

    for (old, new) in before.entries.iter().zip(&after.entries) {
        if old == new {
            continue;
        }

        sqlx::query(
            r#"
            UPDATE dtr_entries
            SET shifts = $1, total_minutes = $2, late_minutes = $3, undertime_minutes = $4,
                status = $5, confirmation_status = $6, revision = $7, updated_at = NOW()
            WHERE record_id = $8 AND day = $9
            "#,
        )
        .bind(Json(&new.shifts))
        .bind(new.total_minutes as i32)
        .bind(new.late_minutes as i32)
        .bind(new.undertime_minutes as i32)
        .bind(new.status.as_str())
        .bind(new.confirmation_status.as_str())
        .bind(new.revision as i64)
        .bind(after.id)
        .bind(new.day as i32)
        .execute(&mut *conn)
        .await?;
    }

    Ok(())
}

/// Postgres-backed store. Every write runs in a transaction holding the
/// record's row lock.
#[derive(Clone)]
pub struct PgDtrStore {
    db: PgPool,
    rules: RecordRules,
}

impl PgDtrStore {
    pub fn new(db: PgPool, rules: RecordRules) -> Self {
        Self { db, rules }
    }

    /// Lock the record, apply `change` and store the result.
    async fn mutate<F>(&self, record_id: i32, change: F) -> Result<MonthlyRecord, StoreError>
    where
        F: FnOnce(&mut MonthlyRecord) -> Result<(), UpdateRejection> + Send,
    {
        let mut tx = self.db.begin().await?;

        let before = fetch_record(&mut tx, record_id, true).await?;
        let mut after = before.clone();
        // Dropping `tx` rolls back and releases the lock
        change(&mut after)?;

        save_changes(&mut tx, &before, &after).await?;
        tx.commit().await.map_err(|e| {
            tracing::error!(error = %e, record_id, "Failed to commit DTR update");
            e
        })?;

        Ok(after)
    }
}

#[async_trait]
impl DtrStore for PgDtrStore {
    async fn get_or_create_record(
        &self,
        user_id: i32,
        month: u32,
        year: i32,
    ) -> Result<MonthlyRecord, StoreError> {
        let template = MonthlyRecord::new(0, user_id, month, year)
            .ok_or(UpdateRejection::InvalidPeriod { month, year })?;

        let mut tx = self.db.begin().await?;

        let inserted: Option<(i32,)> = sqlx::query_as(
            r#"
            INSERT INTO dtr_records (user_id, month, year)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id, month, year) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(user_id)
        .bind(month as i32)
        .bind(year)
        .fetch_optional(&mut *tx)
        .await?;

        let record_id = match inserted {
            Some((id,)) => {
                let days: Vec<i32> = template.entries.iter().map(|e| e.day as i32).collect();
                let dates: Vec<NaiveDate> = template.entries.iter().map(|e| e.date).collect();

                sqlx::query(
                    r#"
                    INSERT INTO dtr_entries (record_id, day, date)
                    SELECT $1, day, date FROM UNNEST($2::int4[], $3::date[]) AS t(day, date)
                    "#,
                )
                .bind(id)
                .bind(&days)
                .bind(&dates)
                .execute(&mut *tx)
                .await?;

                tracing::info!(record_id = id, user_id, month, year, "Created DTR record");
                id
            }
            None => {
                let (id,): (i32,) = sqlx::query_as(
                    r#"SELECT id FROM dtr_records WHERE user_id = $1 AND month = $2 AND year = $3"#,
                )
                .bind(user_id)
                .bind(month as i32)
                .bind(year)
                .fetch_one(&mut *tx)
                .await?;
                id
            }
        };

        let record = fetch_record(&mut tx, record_id, false).await?;
        tx.commit().await?;

        Ok(record)
    }

    async fn get_record(&self, record_id: i32) -> Result<MonthlyRecord, StoreError> {
        let mut conn = self.db.acquire().await?;
        fetch_record(&mut conn, record_id, false).await
    }

    async fn update_entry(
        &self,
        actor: &Actor,
        record_id: i32,
        day: u32,
        payload: &EntryPayload,
    ) -> Result<MonthlyRecord, StoreError> {
        let today = crate::dtr::today();
        self.mutate(record_id, |record| {
            record.apply_entry_update(actor, day, payload, &self.rules, today)
        })
        .await
    }

    async fn apply_action(
        &self,
        actor: &Actor,
        record_id: i32,
        action: RecordAction,
    ) -> Result<MonthlyRecord, StoreError> {
        let now = Utc::now();
        self.mutate(record_id, |record| record.apply_action(actor, action, now))
            .await
    }
}

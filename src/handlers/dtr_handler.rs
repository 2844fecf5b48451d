use axum::{
    extract::{Path, Query, State},
    Json,
};
use metrics::counter;
use serde::Deserialize;
use std::sync::Arc;
use utoipa::IntoParams;

use crate::{
    dtr::{summarize, Actor, EntryPayload, MonthlyRecord, PeriodSummary, RecordAction, StoreError},
    models::{DecisionInput, EntryStatusInput},
    AppError, AppResult, AppState,
};

#[derive(Debug, Deserialize, IntoParams)]
pub struct DtrQuery {
    /// Defaults to the calling user
    #[serde(rename = "userId")]
    pub user_id: Option<i32>,
    pub month: u32,
    pub year: i32,
}

fn ensure_can_view(actor: &Actor, user_id: i32) -> AppResult<()> {
    if actor.is_office() || actor.user_id == user_id {
        Ok(())
    } else {
        Err(AppError::Forbidden(
            "You can only view your own time records".to_string(),
        ))
    }
}

async fn load_visible(state: &AppState, actor: &Actor, record_id: i32) -> AppResult<MonthlyRecord> {
    let record = state.store.get_record(record_id).await?;
    ensure_can_view(actor, record.user_id)?;
    Ok(record)
}

async fn run_action(
    state: &AppState,
    actor: &Actor,
    record_id: i32,
    action: RecordAction,
) -> AppResult<Json<MonthlyRecord>> {
    let name = action.name();
    let record = state
        .store
        .apply_action(actor, record_id, action)
        .await
        .map_err(|e| {
            tracing::warn!(
                error = %e,
                record_id,
                user_id = actor.user_id,
                action = name,
                "DTR action refused"
            );
            e
        })?;

    tracing::info!(
        record_id,
        user_id = actor.user_id,
        action = name,
        status = %record.status,
        "DTR action applied"
    );

    Ok(Json(record))
}

/// GET /api/dtr?userId=&month=&year=
#[utoipa::path(
    get,
    path = "/api/dtr",
    params(DtrQuery),
    responses(
        (status = 200, description = "The user's record for the period, created empty if missing", body = MonthlyRecord),
        (status = 400, description = "Invalid period"),
        (status = 403, description = "Record belongs to another user")
    ),
    tag = "dtr",
    security(("actor_headers" = []))
)]
pub async fn get_record_for_period(
    State(state): State<Arc<AppState>>,
    Query(query): Query<DtrQuery>,
    actor: Actor,
) -> AppResult<Json<MonthlyRecord>> {
    let user_id = query.user_id.unwrap_or(actor.user_id);
    ensure_can_view(&actor, user_id)?;

    let record = state
        .store
        .get_or_create_record(user_id, query.month, query.year)
        .await?;

    Ok(Json(record))
}

/// GET /api/dtr/{id}
#[utoipa::path(
    get,
    path = "/api/dtr/{id}",
    params(
        ("id" = i32, Path, description = "DTR record ID")
    ),
    responses(
        (status = 200, description = "The record", body = MonthlyRecord),
        (status = 403, description = "Record belongs to another user"),
        (status = 404, description = "Record not found")
    ),
    tag = "dtr",
    security(("actor_headers" = []))
)]
pub async fn get_record(
    State(state): State<Arc<AppState>>,
    Path(record_id): Path<i32>,
    actor: Actor,
) -> AppResult<Json<MonthlyRecord>> {
    Ok(Json(load_visible(&state, &actor, record_id).await?))
}

/// GET /api/dtr/{id}/summary
#[utoipa::path(
    get,
    path = "/api/dtr/{id}/summary",
    params(
        ("id" = i32, Path, description = "DTR record ID")
    ),
    responses(
        (status = 200, description = "Weekly buckets and the monthly total", body = PeriodSummary),
        (status = 403, description = "Record belongs to another user"),
        (status = 404, description = "Record not found")
    ),
    tag = "dtr",
    security(("actor_headers" = []))
)]
pub async fn get_summary(
    State(state): State<Arc<AppState>>,
    Path(record_id): Path<i32>,
    actor: Actor,
) -> AppResult<Json<PeriodSummary>> {
    let record = load_visible(&state, &actor, record_id).await?;
    Ok(Json(summarize(&record.entries)))
}

/// PUT /api/dtr/{id}/entries/{day} - Full replace of one day
#[utoipa::path(
    put,
    path = "/api/dtr/{id}/entries/{day}",
    params(
        ("id" = i32, Path, description = "DTR record ID"),
        ("day" = u32, Path, description = "Day of month")
    ),
    request_body = EntryPayload,
    responses(
        (status = 200, description = "Entry saved; the authoritative record", body = MonthlyRecord),
        (status = 403, description = "Record belongs to another user"),
        (status = 404, description = "Record or day not found"),
        (status = 409, description = "Entry is locked or the write is stale"),
        (status = 422, description = "Shifts conflict")
    ),
    tag = "dtr",
    security(("actor_headers" = []))
)]
pub async fn update_entry(
    State(state): State<Arc<AppState>>,
    Path((record_id, day)): Path<(i32, u32)>,
    actor: Actor,
    Json(payload): Json<EntryPayload>,
) -> AppResult<Json<MonthlyRecord>> {
    let result = state
        .store
        .update_entry(&actor, record_id, day, &payload)
        .await;

    let outcome = match &result {
        Ok(_) => "ok",
        Err(StoreError::Rejected(_)) => "rejected",
        Err(_) => "error",
    };
    counter!("dtr_entry_updates_total", "outcome" => outcome).increment(1);

    match result {
        Ok(record) => {
            tracing::debug!(
                record_id,
                day,
                user_id = actor.user_id,
                revision = ?payload.revision,
                "DTR entry saved"
            );
            Ok(Json(record))
        }
        Err(e) => {
            tracing::warn!(error = %e, record_id, day, user_id = actor.user_id, "DTR entry rejected");
            Err(e.into())
        }
    }
}

/// POST /api/dtr/{id}/submit
#[utoipa::path(
    post,
    path = "/api/dtr/{id}/submit",
    params(
        ("id" = i32, Path, description = "DTR record ID")
    ),
    responses(
        (status = 200, description = "Record submitted", body = MonthlyRecord),
        (status = 403, description = "Only the owner can submit"),
        (status = 409, description = "Record is not a draft")
    ),
    tag = "dtr",
    security(("actor_headers" = []))
)]
pub async fn submit_record(
    State(state): State<Arc<AppState>>,
    Path(record_id): Path<i32>,
    actor: Actor,
) -> AppResult<Json<MonthlyRecord>> {
    run_action(&state, &actor, record_id, RecordAction::Submit).await
}

/// POST /api/dtr/{id}/entries/{day}/confirm - Office only
#[utoipa::path(
    post,
    path = "/api/dtr/{id}/entries/{day}/confirm",
    params(
        ("id" = i32, Path, description = "DTR record ID"),
        ("day" = u32, Path, description = "Day of month")
    ),
    responses(
        (status = 200, description = "Entry confirmed", body = MonthlyRecord),
        (status = 403, description = "Office only"),
        (status = 409, description = "Record is closed or the day is a Sunday")
    ),
    tag = "dtr",
    security(("actor_headers" = []))
)]
pub async fn confirm_entry(
    State(state): State<Arc<AppState>>,
    Path((record_id, day)): Path<(i32, u32)>,
    actor: Actor,
) -> AppResult<Json<MonthlyRecord>> {
    run_action(&state, &actor, record_id, RecordAction::ConfirmEntry { day }).await
}

/// PUT /api/dtr/{id}/entries/{day}/status - Office only
#[utoipa::path(
    put,
    path = "/api/dtr/{id}/entries/{day}/status",
    params(
        ("id" = i32, Path, description = "DTR record ID"),
        ("day" = u32, Path, description = "Day of month")
    ),
    request_body = EntryStatusInput,
    responses(
        (status = 200, description = "Entry status set", body = MonthlyRecord),
        (status = 403, description = "Office only"),
        (status = 409, description = "Record is closed or the day is a Sunday")
    ),
    tag = "dtr",
    security(("actor_headers" = []))
)]
pub async fn set_entry_status(
    State(state): State<Arc<AppState>>,
    Path((record_id, day)): Path<(i32, u32)>,
    actor: Actor,
    Json(input): Json<EntryStatusInput>,
) -> AppResult<Json<MonthlyRecord>> {
    let action = RecordAction::SetEntryStatus {
        day,
        status: input.status,
    };
    run_action(&state, &actor, record_id, action).await
}

/// POST /api/dtr/{id}/decision - Office approves or rejects a submitted record
#[utoipa::path(
    post,
    path = "/api/dtr/{id}/decision",
    params(
        ("id" = i32, Path, description = "DTR record ID")
    ),
    request_body = DecisionInput,
    responses(
        (status = 200, description = "Decision recorded", body = MonthlyRecord),
        (status = 403, description = "Office only"),
        (status = 409, description = "Record is not submitted")
    ),
    tag = "dtr",
    security(("actor_headers" = []))
)]
pub async fn decide_record(
    State(state): State<Arc<AppState>>,
    Path(record_id): Path<i32>,
    actor: Actor,
    Json(input): Json<DecisionInput>,
) -> AppResult<Json<MonthlyRecord>> {
    let action = if input.approve {
        RecordAction::Approve {
            remarks: input.remarks,
        }
    } else {
        RecordAction::Reject {
            remarks: input.remarks,
        }
    };
    run_action(&state, &actor, record_id, action).await
}

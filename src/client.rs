use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, StatusCode};
use serde_json::Value;

use crate::dtr::{Actor, DtrStore, EntryPayload, MonthlyRecord, RecordAction, StoreError};
use crate::extractors::{USER_ID_HEADER, USER_ROLE_HEADER};
use crate::models::{DecisionInput, EntryStatusInput};

/// `DtrStore` backed by a remote DTR service.
///
/// Reads go out as `actor`; writes carry the actor passed to each call.
#[derive(Clone, Debug)]
pub struct HttpDtrStore {
    client: reqwest::Client,
    base_url: String,
    actor: Actor,
}

impl HttpDtrStore {
    pub fn new(base_url: impl Into<String>, actor: Actor) -> Self {
        Self::with_client(reqwest::Client::new(), base_url, actor)
    }

    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>, actor: Actor) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            client,
            base_url,
            actor,
        }
    }

    fn request(&self, method: Method, path: &str, actor: &Actor) -> RequestBuilder {
        self.client
            .request(method, format!("{}/api/dtr{}", self.base_url, path))
            .header(USER_ID_HEADER, actor.user_id.to_string())
            .header(USER_ROLE_HEADER, actor.role.as_str())
    }

    async fn send(&self, request: RequestBuilder, what: &str) -> Result<MonthlyRecord, StoreError> {
        let response = request.send().await.map_err(|e| {
            tracing::error!(error = %e, base_url = %self.base_url, what, "Failed to call DTR service");
            StoreError::Transport(format!("Failed to {}: {}", what, e))
        })?;

        let status = response.status();
        if !status.is_success() {
            let body: Option<Value> = response.json().await.ok();
            let message = body
                .as_ref()
                .and_then(|b| b.get("error"))
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| status.to_string());

            tracing::warn!(status = %status, message, what, "DTR service returned error");

            return Err(if status == StatusCode::NOT_FOUND {
                StoreError::NotFound(message)
            } else {
                StoreError::Remote {
                    status: status.as_u16(),
                    message,
                }
            });
        }

        response.json::<MonthlyRecord>().await.map_err(|e| {
            tracing::error!(error = %e, what, "Failed to parse DTR service response");
            StoreError::Transport(format!("Failed to parse DTR response: {}", e))
        })
    }
}

#[async_trait]
impl DtrStore for HttpDtrStore {
    async fn get_or_create_record(
        &self,
        user_id: i32,
        month: u32,
        year: i32,
    ) -> Result<MonthlyRecord, StoreError> {
        let request = self.request(Method::GET, "", &self.actor).query(&[
            ("userId", user_id.to_string()),
            ("month", month.to_string()),
            ("year", year.to_string()),
        ]);
        self.send(request, "load the record").await
    }

    async fn get_record(&self, record_id: i32) -> Result<MonthlyRecord, StoreError> {
        let request = self.request(Method::GET, &format!("/{}", record_id), &self.actor);
        self.send(request, "load the record").await
    }

    async fn update_entry(
        &self,
        actor: &Actor,
        record_id: i32,
        day: u32,
        payload: &EntryPayload,
    ) -> Result<MonthlyRecord, StoreError> {
        let request = self
            .request(Method::PUT, &format!("/{}/entries/{}", record_id, day), actor)
            .json(payload);
        self.send(request, "save the entry").await
    }

    async fn apply_action(
        &self,
        actor: &Actor,
        record_id: i32,
        action: RecordAction,
    ) -> Result<MonthlyRecord, StoreError> {
        let request = match action {
            RecordAction::Submit => {
                self.request(Method::POST, &format!("/{}/submit", record_id), actor)
            }
            RecordAction::ConfirmEntry { day } => self.request(
                Method::POST,
                &format!("/{}/entries/{}/confirm", record_id, day),
                actor,
            ),
            RecordAction::SetEntryStatus { day, status } => self
                .request(
                    Method::PUT,
                    &format!("/{}/entries/{}/status", record_id, day),
                    actor,
                )
                .json(&EntryStatusInput { status }),
            RecordAction::Approve { remarks } => self
                .request(Method::POST, &format!("/{}/decision", record_id), actor)
                .json(&DecisionInput {
                    approve: true,
                    remarks,
                }),
            RecordAction::Reject { remarks } => self
                .request(Method::POST, &format!("/{}/decision", record_id), actor)
                .json(&DecisionInput {
                    approve: false,
                    remarks,
                }),
        };
        self.send(request, "apply the action").await
    }
}

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::dtr::EntryStatus;

/// Input for an office-assigned entry status
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct EntryStatusInput {
    pub status: EntryStatus,
}

/// Input for the office decision on a submitted record
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DecisionInput {
    pub approve: bool, // true = approve, false = reject
    pub remarks: Option<String>,
}

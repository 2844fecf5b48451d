use utoipa::openapi::security::{ApiKey, ApiKeyValue, SecurityScheme};
use utoipa::Modify;
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "DTR Engine API",
        version = "0.1.0",
        description = "Daily time records: shift entry, weekly and monthly totals, and office review"
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development server"),
    ),
    paths(
        // Health
        crate::handlers::health::health_check,

        // DTR
        crate::handlers::dtr_handler::get_record_for_period,
        crate::handlers::dtr_handler::get_record,
        crate::handlers::dtr_handler::get_summary,
        crate::handlers::dtr_handler::update_entry,
        crate::handlers::dtr_handler::submit_record,
        crate::handlers::dtr_handler::confirm_entry,
        crate::handlers::dtr_handler::set_entry_status,
        crate::handlers::dtr_handler::decide_record,
    ),
    components(
        schemas(
            // Core models
            crate::dtr::MonthlyRecord,
            crate::dtr::DayEntry,
            crate::dtr::Shift,
            crate::dtr::EntryStatus,
            crate::dtr::ConfirmationStatus,
            crate::dtr::RecordStatus,
            crate::dtr::PeriodSummary,
            crate::dtr::WeekBucket,
            crate::dtr::DayTotal,

            // Input models
            crate::dtr::EntryPayload,
            crate::dtr::model::LegacySlots,
            crate::models::EntryStatusInput,
            crate::models::DecisionInput,
        )
    ),
    tags(
        (name = "health", description = "Health check"),
        (name = "dtr", description = "Daily time records"),
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            // Identity is asserted by the gateway; X-User-Role is optional
            components.add_security_scheme(
                "actor_headers",
                SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::new("X-User-Id"))),
            )
        }
    }
}

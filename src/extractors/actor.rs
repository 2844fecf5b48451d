use axum::{
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
};
use serde_json::json;
use std::future::Future;

use crate::dtr::{Actor, ActorRole};

/// Set by the gateway after authenticating the caller.
pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";

type Rejection = (StatusCode, axum::Json<serde_json::Value>);

fn unauthorized(message: String) -> Rejection {
    (StatusCode::UNAUTHORIZED, axum::Json(json!({ "error": message })))
}

fn header<'a>(parts: &'a Parts, name: &str) -> Result<&'a str, Rejection> {
    parts
        .headers
        .get(name)
        .ok_or_else(|| unauthorized(format!("Missing {} header", name)))?
        .to_str()
        .map_err(|_| unauthorized(format!("Invalid {} header", name)))
}

fn actor_from_parts(parts: &Parts) -> Result<Actor, Rejection> {
    let user_id = header(parts, USER_ID_HEADER)?
        .trim()
        .parse::<i32>()
        .map_err(|_| unauthorized(format!("{} must be a numeric user id", USER_ID_HEADER)))?;

    // Callers without a role header act as record owners
    let role = match parts.headers.get(USER_ROLE_HEADER) {
        Some(_) => header(parts, USER_ROLE_HEADER)?
            .parse::<ActorRole>()
            .map_err(unauthorized)?,
        None => ActorRole::Student,
    };

    Ok(Actor { user_id, role })
}

impl<S> FromRequestParts<S> for Actor
where
    S: Send + Sync,
{
    type Rejection = Rejection;

    fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> impl Future<Output = Result<Self, Self::Rejection>> + Send {
        let actor = actor_from_parts(parts);

        async move {
            let actor = actor?;
            tracing::debug!(user_id = actor.user_id, role = ?actor.role, "Resolved actor");
            Ok(actor)
        }
    }
}

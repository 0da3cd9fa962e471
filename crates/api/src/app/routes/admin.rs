//! User administration. Only `ADMIN` may provision accounts with scoped roles
//! or change an account's status.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
};
use chrono::Utc;
use tracing::warn;

use shepherd_auth::{Role, UserStatus};
use shepherd_core::UserId;

use crate::app::dto::{self, ProvisionUserRequest};
use crate::app::errors;
use crate::app::services::{self, AppServices};
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/users", post(provision_user))
        .route("/users/:id/suspend", post(suspend_user))
        .route("/users/:id/activate", post(activate_user))
}

fn require_admin(principal: &PrincipalContext, action: &str) -> Result<(), Response> {
    if principal.user().role != Role::Admin {
        warn!(user_id = %principal.user_id(), action, "admin action denied: not an admin");
        return Err(errors::json_error(StatusCode::FORBIDDEN, "forbidden", "admin role required"));
    }
    Ok(())
}

pub async fn provision_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    payload: Result<Json<ProvisionUserRequest>, JsonRejection>,
) -> Result<Response, Response> {
    require_admin(&principal, "provision_user")?;

    let input = dto::body(payload)?
        .into_input()
        .map_err(|e| errors::json_error(StatusCode::BAD_REQUEST, "validation_error", e.to_string()))?;

    let user = services::blocking(move || services.auth.provision_user(input, Utc::now()))
        .await?
        .map_err(errors::auth_error_to_response)?;

    Ok((StatusCode::CREATED, Json(dto::UserResponse { user: user.profile() })).into_response())
}

pub async fn suspend_user(
    services: Extension<Arc<AppServices>>,
    principal: Extension<PrincipalContext>,
    id: Path<String>,
) -> Result<Response, Response> {
    change_status(services, principal, id, UserStatus::Suspended).await
}

pub async fn activate_user(
    services: Extension<Arc<AppServices>>,
    principal: Extension<PrincipalContext>,
    id: Path<String>,
) -> Result<Response, Response> {
    change_status(services, principal, id, UserStatus::Active).await
}

async fn change_status(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    status: UserStatus,
) -> Result<Response, Response> {
    require_admin(&principal, "set_user_status")?;
    let user_id = id
        .parse::<UserId>()
        .map_err(|_| errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid user id"))?;
    let actor = principal.user_id();

    let user = services::blocking(move || services.auth.set_user_status(actor, user_id, status, Utc::now()))
        .await?
        .map_err(errors::auth_error_to_response)?;

    Ok(Json(dto::UserResponse { user }).into_response())
}

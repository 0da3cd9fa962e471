//! Approval request endpoints.
//!
//! The acting user and their scope come from [`PrincipalContext`]; request
//! bodies never carry identity.

use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Extension, Path, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::Utc;

use shepherd_approvals::ApprovalAction;
use shepherd_core::ApprovalRequestId;

use crate::app::dto::{self, DecisionRequest, SubmitApprovalRequest};
use crate::app::errors;
use crate::app::services::{self, AppServices};
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/", post(submit))
        .route("/pending", get(pending))
        .route("/:id", get(get_approval))
        .route("/:id/approve", post(approve))
        .route("/:id/reject", post(reject))
        .route("/:id/cancel", post(cancel))
}

pub async fn submit(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    payload: Result<Json<SubmitApprovalRequest>, JsonRejection>,
) -> Result<Response, Response> {
    let draft = dto::body(payload)?
        .into_draft(principal.user_id())
        .map_err(|e| errors::json_error(StatusCode::BAD_REQUEST, "validation_error", e.to_string()))?;

    let approval = services::blocking(move || services.approvals.submit(draft, Utc::now()))
        .await?
        .map_err(errors::engine_error_to_response)?;

    Ok((StatusCode::CREATED, Json(dto::ApprovalResponse { approval })).into_response())
}

pub async fn pending(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> Result<Response, Response> {
    let actor = principal.actor();
    let approvals = services::blocking(move || services.approvals.pending_for(&actor))
        .await?
        .map_err(errors::engine_error_to_response)?;

    Ok(Json(dto::ApprovalsResponse { approvals }).into_response())
}

pub async fn get_approval(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> Result<Response, Response> {
    let id = parse_id(&id)?;
    let actor = principal.actor();
    let approval = services::blocking(move || services.approvals.get(id, &actor))
        .await?
        .map_err(errors::engine_error_to_response)?;

    Ok(Json(dto::ApprovalResponse { approval }).into_response())
}

pub async fn approve(
    services: Extension<Arc<AppServices>>,
    principal: Extension<PrincipalContext>,
    id: Path<String>,
    body: Bytes,
) -> Result<Response, Response> {
    decide(services, principal, id, body, ApprovalAction::Approve).await
}

pub async fn reject(
    services: Extension<Arc<AppServices>>,
    principal: Extension<PrincipalContext>,
    id: Path<String>,
    body: Bytes,
) -> Result<Response, Response> {
    decide(services, principal, id, body, ApprovalAction::Reject).await
}

pub async fn cancel(
    services: Extension<Arc<AppServices>>,
    principal: Extension<PrincipalContext>,
    id: Path<String>,
    body: Bytes,
) -> Result<Response, Response> {
    decide(services, principal, id, body, ApprovalAction::Cancel).await
}

async fn decide(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    body: Bytes,
    action: ApprovalAction,
) -> Result<Response, Response> {
    let id = parse_id(&id)?;
    let comments = dto::optional_body::<DecisionRequest>(&body)?.comments;
    let actor = principal.actor();

    let decision = services::blocking(move || {
        services
            .approvals
            .decide(id, action, &actor, comments, Utc::now())
    })
    .await?
    .map_err(errors::engine_error_to_response)?;

    Ok(Json(decision).into_response())
}

fn parse_id(raw: &str) -> Result<ApprovalRequestId, Response> {
    raw.parse::<ApprovalRequestId>()
        .map_err(|_| errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid approval request id"))
}

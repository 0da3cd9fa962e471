//! Credential endpoints: signup, login, refresh rotation, logout, password change.
//!
//! Handlers hand the synchronous service calls to [`services::blocking`]
//! because password hashing is deliberately slow.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Extension, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::Utc;

use shepherd_infra::{ClientInfo, SignupInput};

use crate::app::dto::{self, ChangePasswordRequest, LoginRequest, RefreshRequest, SignupRequest};
use crate::app::errors;
use crate::app::services::{self, AppServices};
use crate::context::PrincipalContext;

pub async fn signup(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(client): Extension<ClientInfo>,
    payload: Result<Json<SignupRequest>, JsonRejection>,
) -> Result<Response, Response> {
    let input = SignupInput::from(dto::body(payload)?);
    let outcome = services::blocking(move || services.auth.signup(input, &client, Utc::now()))
        .await?
        .map_err(errors::auth_error_to_response)?;

    Ok((StatusCode::CREATED, Json(outcome)).into_response())
}

pub async fn login(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(client): Extension<ClientInfo>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Response, Response> {
    let body = dto::body(payload)?;
    let outcome = services::blocking(move || {
        services
            .auth
            .login(&body.email, &body.password, &client, Utc::now())
    })
    .await?
    .map_err(errors::auth_error_to_response)?;

    Ok(Json(outcome).into_response())
}

pub async fn refresh(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(client): Extension<ClientInfo>,
    payload: Result<Json<RefreshRequest>, JsonRejection>,
) -> Result<Response, Response> {
    let body = dto::body(payload)?;
    let tokens = services::blocking(move || {
        services
            .auth
            .refresh(&body.refresh_token, &client, Utc::now())
    })
    .await?
    .map_err(errors::auth_error_to_response)?;

    Ok(Json(dto::TokensResponse { tokens }).into_response())
}

pub async fn logout(
    Extension(services): Extension<Arc<AppServices>>,
    payload: Result<Json<RefreshRequest>, JsonRejection>,
) -> Result<Response, Response> {
    let body = dto::body(payload)?;
    services::blocking(move || services.auth.logout(&body.refresh_token, Utc::now()))
        .await?
        .map_err(errors::auth_error_to_response)?;

    Ok(StatusCode::NO_CONTENT.into_response())
}

pub async fn change_password(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(client): Extension<ClientInfo>,
    Extension(principal): Extension<PrincipalContext>,
    payload: Result<Json<ChangePasswordRequest>, JsonRejection>,
) -> Result<Response, Response> {
    let body = dto::body(payload)?;
    let tokens = services::blocking(move || {
        services.auth.change_password(
            principal.user_id(),
            body.user_id,
            &body.current_password,
            &body.new_password,
            &client,
            Utc::now(),
        )
    })
    .await?
    .map_err(errors::auth_error_to_response)?;

    Ok(Json(dto::TokensResponse { tokens }).into_response())
}

pub async fn me(Extension(principal): Extension<PrincipalContext>) -> impl IntoResponse {
    Json(dto::UserResponse {
        user: principal.user().profile(),
    })
}

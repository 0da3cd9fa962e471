use axum::http::{StatusCode, header};
use axum::response::IntoResponse;
use serde_json::json;

use shepherd_infra::{AuthServiceError, EngineError};

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

pub fn auth_error_to_response(err: AuthServiceError) -> axum::response::Response {
    match err {
        AuthServiceError::Validation(msg) => json_error(StatusCode::BAD_REQUEST, "validation_error", msg),
        AuthServiceError::WeakPassword(report) => (
            StatusCode::BAD_REQUEST,
            axum::Json(json!({
                "error": "weak_password",
                "message": "password does not meet strength requirements",
                "score": report.score,
                "strength": report.strength,
                "checks": report.checks,
            })),
        )
            .into_response(),
        AuthServiceError::EmailTaken => json_error(StatusCode::CONFLICT, "email_taken", "email is already registered"),
        AuthServiceError::InvalidCredentials => {
            json_error(StatusCode::UNAUTHORIZED, "invalid_credentials", "invalid email or password")
        }
        AuthServiceError::RateLimited { retry_after } => {
            let secs = retry_after_secs(retry_after);
            (
                StatusCode::TOO_MANY_REQUESTS,
                [(header::RETRY_AFTER, secs.to_string())],
                axum::Json(json!({
                    "error": "rate_limited",
                    "message": "too many attempts; try again later",
                    "retryAfter": secs,
                })),
            )
                .into_response()
        }
        AuthServiceError::InvalidToken => json_error(StatusCode::UNAUTHORIZED, "invalid_token", "invalid or expired token"),
        AuthServiceError::Forbidden => json_error(StatusCode::FORBIDDEN, "forbidden", "forbidden"),
        AuthServiceError::NotFound => json_error(StatusCode::NOT_FOUND, "not_found", "user not found"),
        AuthServiceError::Hashing(_) | AuthServiceError::Internal(_) => {
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", "internal error")
        }
        AuthServiceError::DependencyUnavailable(_) => json_error(
            StatusCode::SERVICE_UNAVAILABLE,
            "dependency_unavailable",
            "service temporarily unavailable",
        ),
    }
}

pub fn engine_error_to_response(err: EngineError) -> axum::response::Response {
    match err {
        EngineError::NotFound => json_error(StatusCode::NOT_FOUND, "not_found", "approval request not found"),
        EngineError::Forbidden => json_error(StatusCode::FORBIDDEN, "forbidden", "not permitted to act on this request"),
        e @ EngineError::InvalidTransition { .. } => {
            json_error(StatusCode::BAD_REQUEST, "invalid_transition", e.to_string())
        }
        EngineError::Validation(msg) => json_error(StatusCode::BAD_REQUEST, "validation_error", msg),
        EngineError::PartialFailure { approval, reason, .. } => (
            StatusCode::INTERNAL_SERVER_ERROR,
            axum::Json(json!({
                "error": "partial_failure",
                "message": format!("decision recorded but audit logging failed: {reason}"),
                "approval": approval,
            })),
        )
            .into_response(),
        EngineError::DependencyUnavailable(_) => json_error(
            StatusCode::SERVICE_UNAVAILABLE,
            "dependency_unavailable",
            "service temporarily unavailable",
        ),
    }
}

/// Whole seconds, rounded up, never below one.
fn retry_after_secs(retry_after: std::time::Duration) -> u64 {
    let secs = retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0);
    secs.max(1)
}

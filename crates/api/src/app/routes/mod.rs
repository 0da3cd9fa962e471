use axum::{
    Router,
    routing::{get, post},
};

pub mod admin;
pub mod approvals;
pub mod auth;
pub mod system;

/// Endpoints reachable without an access token (rate limited per client).
pub fn public_router() -> Router {
    Router::new()
        .route("/health", get(system::health))
        .route("/auth/signup", post(auth::signup))
        .route("/auth/login", post(auth::login))
        .route("/auth/refresh", post(auth::refresh))
        .route("/auth/logout", post(auth::logout))
}

/// Endpoints that require a valid access token.
pub fn protected_router() -> Router {
    Router::new()
        .route("/auth/me", get(auth::me))
        .route("/auth/change-password", post(auth::change_password))
        .nest("/approvals", approvals::router())
        .nest("/admin", admin::router())
}

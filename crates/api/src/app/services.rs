//! Service wiring: in-memory stores, credential service, approval engine.

use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::Response;
use chrono::{DateTime, Utc};

use shepherd_auth::{InMemoryRateLimitStore, OrgScope, RateLimitPolicy, RateLimiter, Role, TokenManager};
use shepherd_infra::{
    ApprovalStore, ApprovalWorkflowEngine, AuditSink, AuthService, AuthServiceError, CredentialStore,
    InMemoryApprovalStore, InMemoryAuditSink, InMemoryCredentialStore, InMemoryEntityStore,
    InMemoryWorkflowStore, ProvisionInput, SharedApprovalEngine, SideEffectRegistry, WorkflowStore,
};

use crate::app::errors;
use crate::config::Config;

pub type SharedAuthService =
    AuthService<Arc<dyn CredentialStore>, Arc<InMemoryRateLimitStore>, Arc<dyn AuditSink>>;

/// Everything the handlers need, shared behind one `Arc`.
///
/// The concrete in-memory stores are kept alongside the services so that
/// tests and seeding can reach them directly.
pub struct AppServices {
    pub auth: SharedAuthService,
    pub approvals: SharedApprovalEngine,
    pub credentials: Arc<InMemoryCredentialStore>,
    pub approval_store: Arc<InMemoryApprovalStore>,
    pub workflows: Arc<InMemoryWorkflowStore>,
    pub entities: Arc<InMemoryEntityStore>,
    pub audit: Arc<InMemoryAuditSink>,
    pub rate_limits: Arc<InMemoryRateLimitStore>,
    pub rate_limit_policy: RateLimitPolicy,
    pub trust_proxy: bool,
}

impl AppServices {
    pub fn in_memory(config: &Config) -> Self {
        let credentials = Arc::new(InMemoryCredentialStore::new());
        let approval_store = Arc::new(InMemoryApprovalStore::new());
        let workflows = Arc::new(InMemoryWorkflowStore::new());
        let entities = Arc::new(InMemoryEntityStore::new());
        let audit = Arc::new(InMemoryAuditSink::new());
        let rate_limits = Arc::new(InMemoryRateLimitStore::new());

        let auth = AuthService::new(
            credentials.clone() as Arc<dyn CredentialStore>,
            RateLimiter::new(rate_limits.clone(), config.rate_limit),
            config.password_hasher(),
            TokenManager::new(config.token_config()),
            audit.clone() as Arc<dyn AuditSink>,
        );

        let approvals = ApprovalWorkflowEngine::new(
            approval_store.clone() as Arc<dyn ApprovalStore>,
            workflows.clone() as Arc<dyn WorkflowStore>,
            audit.clone() as Arc<dyn AuditSink>,
            SideEffectRegistry::with_entity_handlers(entities.clone()),
        );

        Self {
            auth,
            approvals,
            credentials,
            approval_store,
            workflows,
            entities,
            audit,
            rate_limits,
            rate_limit_policy: config.rate_limit,
            trust_proxy: config.trust_proxy,
        }
    }

    /// Provision the configured bootstrap admin. An existing account is left untouched.
    pub fn bootstrap_admin(&self, config: &Config, now: DateTime<Utc>) -> Result<(), AuthServiceError> {
        let Some(admin) = &config.bootstrap_admin else {
            return Ok(());
        };
        let input = ProvisionInput {
            email: admin.email.clone(),
            password: admin.password.clone(),
            full_name: "Administrator".to_string(),
            role: Role::Admin,
            scope: OrgScope::national(),
        };
        match self.auth.provision_user(input, now) {
            Ok(_) | Err(AuthServiceError::EmailTaken) => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Drop attempt records whose window has closed.
    pub fn purge_rate_limits(&self, now: DateTime<Utc>) {
        self.rate_limits
            .purge_expired(self.rate_limit_policy.window, now);
    }
}

/// Run synchronous service code (hashing, store IO) off the async runtime.
pub async fn blocking<T, F>(f: F) -> Result<T, Response>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await.map_err(|e| {
        tracing::error!(error = %e, "blocking task failed");
        errors::json_error(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", "internal error")
    })
}

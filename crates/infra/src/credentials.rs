//! Credential flows: signup, login, refresh rotation, password change, logout.
//!
//! Composes the pure primitives from `shepherd-auth` with a [`CredentialStore`]
//! and an audit sink. Every flow takes the clock value `now` from the caller.
//!
//! Rate-limit identifiers are per endpoint class (`login:<ip>`, `signup:<ip>`,
//! `refresh:<ip>`, `password:<user_id>`) so one flow cannot lock another.
//!
//! Nothing here logs a password, a hash, a token or a strength breakdown.

use std::sync::OnceLock;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use tracing::{error, info, warn};

use shepherd_auth::{
    OrgScope, PasswordError, PasswordHasher, RateLimitStore, RateLimited, RateLimiter, Role,
    StrengthReport, TokenError, TokenManager, TokenPair, User, UserProfile, UserStatus, check_strength,
    normalize_email,
};
use shepherd_core::{DomainError, UserId};

use crate::audit::{AuditLogEntry, AuditSink, actions};
use crate::store::{CredentialStore, Session, StoreError};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthServiceError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("password does not meet strength requirements")]
    WeakPassword(Box<StrengthReport>),

    #[error("email is already registered")]
    EmailTaken,

    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("too many attempts; retry after {retry_after:?}")]
    RateLimited { retry_after: Duration },

    #[error("invalid or expired token")]
    InvalidToken,

    #[error("forbidden")]
    Forbidden,

    #[error("user not found")]
    NotFound,

    #[error("password hashing failed")]
    Hashing(String),

    #[error("token encoding failed")]
    Internal(String),

    #[error("dependency unavailable: {0}")]
    DependencyUnavailable(String),
}

impl From<StoreError> for AuthServiceError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::Duplicate(_) => AuthServiceError::EmailTaken,
            other => {
                error!(error = %other, "credential store failure");
                AuthServiceError::DependencyUnavailable(other.to_string())
            }
        }
    }
}

impl From<PasswordError> for AuthServiceError {
    fn from(value: PasswordError) -> Self {
        error!(error = %value, "password hashing failure");
        AuthServiceError::Hashing(value.to_string())
    }
}

impl From<RateLimited> for AuthServiceError {
    fn from(value: RateLimited) -> Self {
        AuthServiceError::RateLimited {
            retry_after: value.retry_after,
        }
    }
}

impl From<TokenError> for AuthServiceError {
    fn from(value: TokenError) -> Self {
        match value {
            TokenError::Invalid(_) | TokenError::InvalidRefreshToken => AuthServiceError::InvalidToken,
            TokenError::Encoding(msg) => {
                error!(error = %msg, "token encoding failure");
                AuthServiceError::Internal(msg)
            }
        }
    }
}

impl From<DomainError> for AuthServiceError {
    fn from(value: DomainError) -> Self {
        AuthServiceError::Validation(value.to_string())
    }
}

/// Client metadata recorded on sessions and used for rate-limit keys.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientInfo {
    pub ip: Option<String>,
    pub user_agent: Option<String>,
}

impl ClientInfo {
    fn key(&self, class: &str) -> String {
        format!("{class}:{}", self.ip.as_deref().unwrap_or("unknown"))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SignupInput {
    pub email: String,
    pub password: String,
    pub full_name: String,
    pub role: Role,
}

/// Provisioning input for administrators and seeding (any role, with scope).
#[derive(Debug, Clone)]
pub struct ProvisionInput {
    pub email: String,
    pub password: String,
    pub full_name: String,
    pub role: Role,
    pub scope: OrgScope,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthOutcome {
    pub user: UserProfile,
    pub tokens: TokenPair,
}

pub struct AuthService<C, R, L> {
    credentials: C,
    limiter: RateLimiter<R>,
    hasher: PasswordHasher,
    tokens: TokenManager,
    audit: L,
    dummy_hash: OnceLock<Option<String>>,
}

impl<C, R, L> core::fmt::Debug for AuthService<C, R, L> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AuthService")
            .field("hasher", &self.hasher)
            .field("tokens", &self.tokens)
            .finish_non_exhaustive()
    }
}

impl<C, R, L> AuthService<C, R, L>
where
    C: CredentialStore,
    R: RateLimitStore,
    L: AuditSink,
{
    pub fn new(
        credentials: C,
        limiter: RateLimiter<R>,
        hasher: PasswordHasher,
        tokens: TokenManager,
        audit: L,
    ) -> Self {
        Self {
            credentials,
            limiter,
            hasher,
            tokens,
            audit,
            dummy_hash: OnceLock::new(),
        }
    }

    pub fn tokens(&self) -> &TokenManager {
        &self.tokens
    }

    pub fn limiter(&self) -> &RateLimiter<R> {
        &self.limiter
    }

    pub fn credentials(&self) -> &C {
        &self.credentials
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Flows
    // ─────────────────────────────────────────────────────────────────────────

    /// Self-service registration for roles that need no scope assignment.
    pub fn signup(
        &self,
        input: SignupInput,
        client: &ClientInfo,
        now: DateTime<Utc>,
    ) -> Result<AuthOutcome, AuthServiceError> {
        self.throttle(&client.key("signup"), now)?;

        if !input.role.is_self_assignable() {
            return Err(AuthServiceError::Validation(format!(
                "role {} cannot be self-assigned",
                input.role
            )));
        }

        let user = self.create_user(
            ProvisionInput {
                email: input.email,
                password: input.password,
                full_name: input.full_name,
                role: input.role,
                scope: OrgScope::national(),
            },
            now,
        )?;

        info!(user_id = %user.id, email = %user.email, role = %user.role, "user signed up");
        self.audit_best_effort(AuditLogEntry::new(
            actions::USER_SIGNUP,
            "user",
            user.id,
            Some(user.id),
            json!({ "role": user.role }),
            now,
        ));

        let tokens = self.start_session(&user, client, now)?;
        Ok(AuthOutcome {
            user: user.profile(),
            tokens,
        })
    }

    /// Create a user with any role and scope (administration and seeding).
    pub fn provision_user(&self, input: ProvisionInput, now: DateTime<Utc>) -> Result<User, AuthServiceError> {
        let user = self.create_user(input, now)?;
        info!(user_id = %user.id, role = %user.role, "user provisioned");
        Ok(user)
    }

    pub fn login(
        &self,
        email: &str,
        password: &str,
        client: &ClientInfo,
        now: DateTime<Utc>,
    ) -> Result<AuthOutcome, AuthServiceError> {
        let key = client.key("login");
        self.throttle(&key, now)?;

        let Ok(email) = normalize_email(email) else {
            self.burn_verification(password);
            return Err(AuthServiceError::InvalidCredentials);
        };

        let Some(mut user) = self.credentials.find_user_by_email(&email)? else {
            self.burn_verification(password);
            warn!(ip = ?client.ip, "login failed: unknown account");
            return Err(AuthServiceError::InvalidCredentials);
        };

        if !self.hasher.verify_detected(password, &user.password_hash) {
            warn!(user_id = %user.id, ip = ?client.ip, "login failed: password mismatch");
            return Err(AuthServiceError::InvalidCredentials);
        }
        if !user.is_active() {
            warn!(user_id = %user.id, "login failed: account suspended");
            return Err(AuthServiceError::InvalidCredentials);
        }

        if self.hasher.needs_rehash(&user.password_hash) {
            self.migrate_hash(&mut user, password, now);
        }

        self.limiter.reset(&key);
        let tokens = self.start_session(&user, client, now)?;

        info!(user_id = %user.id, "user logged in");
        self.audit_best_effort(AuditLogEntry::new(
            actions::USER_LOGIN,
            "user",
            user.id,
            Some(user.id),
            json!({ "ip": client.ip }),
            now,
        ));

        Ok(AuthOutcome {
            user: user.profile(),
            tokens,
        })
    }

    /// Exchange a refresh token for a new pair. The presented token is single use.
    pub fn refresh(
        &self,
        refresh_token: &str,
        client: &ClientInfo,
        now: DateTime<Utc>,
    ) -> Result<TokenPair, AuthServiceError> {
        let key = client.key("refresh");
        self.throttle(&key, now)?;

        let claims = self.tokens.verify_refresh(refresh_token, now).map_err(|e| {
            warn!(error = %e, "refresh rejected: token verification failed");
            AuthServiceError::InvalidToken
        })?;

        let Some(session) = self.credentials.get_session(claims.jti)? else {
            // Signed and unexpired but no longer stored: already rotated or revoked.
            let revoked = self.credentials.delete_user_sessions(claims.sub)?;
            warn!(user_id = %claims.sub, revoked, "refresh token reuse detected; sessions revoked");
            return Err(AuthServiceError::InvalidToken);
        };

        if session.user_id != claims.sub || session.is_expired(now) {
            self.credentials.delete_session(session.token)?;
            warn!(user_id = %claims.sub, "refresh rejected: session expired or mismatched");
            return Err(AuthServiceError::InvalidToken);
        }

        if !self.credentials.delete_session(session.token)? {
            warn!(user_id = %claims.sub, "refresh rejected: session consumed concurrently");
            return Err(AuthServiceError::InvalidToken);
        }

        let user = self
            .credentials
            .get_user(claims.sub)?
            .filter(User::is_active)
            .ok_or(AuthServiceError::InvalidToken)?;
        let issued = self.tokens.rotate(&claims, &user, now)?;
        self.store_session(&user, issued.refresh_jti, issued.refresh_expires_at, client, now)?;
        self.limiter.reset(&key);

        info!(user_id = %user.id, "refresh token rotated");
        Ok(issued.pair)
    }

    /// Change a password for the authenticated user; revokes every session.
    pub fn change_password(
        &self,
        authenticated: UserId,
        user_id: UserId,
        current_password: &str,
        new_password: &str,
        client: &ClientInfo,
        now: DateTime<Utc>,
    ) -> Result<TokenPair, AuthServiceError> {
        if authenticated != user_id {
            warn!(user_id = %authenticated, target = %user_id, "password change for another user denied");
            return Err(AuthServiceError::Forbidden);
        }

        let key = format!("password:{user_id}");
        self.throttle(&key, now)?;

        let mut user = self
            .credentials
            .get_user(user_id)?
            .filter(User::is_active)
            .ok_or(AuthServiceError::InvalidToken)?;

        if !self.hasher.verify_detected(current_password, &user.password_hash) {
            warn!(user_id = %user.id, "password change failed: current password mismatch");
            return Err(AuthServiceError::InvalidCredentials);
        }
        if current_password == new_password {
            return Err(AuthServiceError::Validation(
                "new password must differ from the current password".to_string(),
            ));
        }
        ensure_strong(new_password)?;

        let hash = self.hasher.hash_default(new_password)?;
        user.change_password_hash(hash, now);
        self.credentials.update_user(user.clone())?;

        let revoked = self.credentials.delete_user_sessions(user.id)?;
        self.limiter.reset(&key);
        info!(user_id = %user.id, revoked, "password changed; sessions revoked");
        self.audit_best_effort(AuditLogEntry::new(
            actions::PASSWORD_CHANGED,
            "user",
            user.id,
            Some(user.id),
            json!({ "revokedSessions": revoked }),
            now,
        ));

        self.start_session(&user, client, now)
    }

    /// Delete the session behind a refresh token. Unknown sessions are ignored.
    pub fn logout(&self, refresh_token: &str, now: DateTime<Utc>) -> Result<(), AuthServiceError> {
        let claims = self
            .tokens
            .verify_refresh(refresh_token, now)
            .map_err(|_| AuthServiceError::InvalidToken)?;
        if self.credentials.delete_session(claims.jti)? {
            info!(user_id = %claims.sub, "user logged out");
        }
        Ok(())
    }

    /// Resolve an access token to the active user it was issued for.
    ///
    /// Tokens issued before the user's last password change are rejected.
    pub fn authenticate(&self, access_token: &str, now: DateTime<Utc>) -> Result<User, AuthServiceError> {
        let claims = self.tokens.verify_access(access_token, now).map_err(|e| {
            warn!(error = %e, "access token rejected");
            AuthServiceError::InvalidToken
        })?;
        let user = self
            .credentials
            .get_user(claims.sub)?
            .filter(User::is_active)
            .ok_or(AuthServiceError::InvalidToken)?;

        let issued_at = claims.issued_at().ok_or(AuthServiceError::InvalidToken)?;
        if user.token_predates_password_change(issued_at) {
            warn!(user_id = %user.id, "access token predates password change");
            return Err(AuthServiceError::InvalidToken);
        }
        Ok(user)
    }

    /// Suspend or reactivate an account. Suspension revokes every session.
    pub fn set_user_status(
        &self,
        actor: UserId,
        user_id: UserId,
        status: UserStatus,
        now: DateTime<Utc>,
    ) -> Result<UserProfile, AuthServiceError> {
        if actor == user_id && status == UserStatus::Suspended {
            return Err(AuthServiceError::Validation("cannot suspend your own account".to_string()));
        }

        let mut user = self
            .credentials
            .get_user(user_id)?
            .ok_or(AuthServiceError::NotFound)?;
        if user.set_status(status, now) {
            self.credentials.update_user(user.clone())?;
        }

        let revoked = match status {
            UserStatus::Suspended => self.credentials.delete_user_sessions(user.id)?,
            UserStatus::Active => 0,
        };
        info!(user_id = %user.id, actor = %actor, status = ?status, revoked, "user status changed");
        self.audit_best_effort(AuditLogEntry::new(
            actions::USER_STATUS_CHANGED,
            "user",
            user.id,
            Some(actor),
            json!({ "status": status, "revokedSessions": revoked }),
            now,
        ));

        Ok(user.profile())
    }

    pub fn current_user(&self, user_id: UserId) -> Result<UserProfile, AuthServiceError> {
        self.credentials
            .get_user(user_id)?
            .map(|u| u.profile())
            .ok_or(AuthServiceError::InvalidToken)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Helpers
    // ─────────────────────────────────────────────────────────────────────────

    fn throttle(&self, key: &str, now: DateTime<Utc>) -> Result<(), AuthServiceError> {
        self.limiter.check(key, now).map_err(|limited| {
            warn!(key, retry_after_secs = limited.retry_after.as_secs(), "rate limit exceeded");
            limited.into()
        })
    }

    fn create_user(&self, input: ProvisionInput, now: DateTime<Utc>) -> Result<User, AuthServiceError> {
        let email = normalize_email(&input.email)?;
        if input.full_name.trim().is_empty() {
            return Err(AuthServiceError::Validation("full name cannot be empty".to_string()));
        }
        ensure_strong(&input.password)?;

        if self.credentials.find_user_by_email(&email)?.is_some() {
            return Err(AuthServiceError::EmailTaken);
        }

        let hash = self.hasher.hash_default(&input.password)?;
        let user = User::new(
            UserId::new(),
            &email,
            &input.full_name,
            hash,
            input.role,
            input.scope,
            now,
        )?;
        self.credentials.insert_user(user.clone())?;
        Ok(user)
    }

    fn start_session(&self, user: &User, client: &ClientInfo, now: DateTime<Utc>) -> Result<TokenPair, AuthServiceError> {
        let issued = self.tokens.issue(user, now)?;
        self.store_session(user, issued.refresh_jti, issued.refresh_expires_at, client, now)?;
        Ok(issued.pair)
    }

    fn store_session(
        &self,
        user: &User,
        token: uuid::Uuid,
        expires_at: DateTime<Utc>,
        client: &ClientInfo,
        now: DateTime<Utc>,
    ) -> Result<(), AuthServiceError> {
        self.credentials.put_session(Session {
            token,
            user_id: user.id,
            expires_at,
            ip: client.ip.clone(),
            user_agent: client.user_agent.clone(),
            created_at: now,
        })?;
        Ok(())
    }

    fn migrate_hash(&self, user: &mut User, password: &str, now: DateTime<Utc>) {
        let from = shepherd_auth::password::detect_algorithm(&user.password_hash);
        let result = self
            .hasher
            .hash_default(password)
            .map_err(AuthServiceError::from)
            .and_then(|hash| {
                let mut migrated = user.clone();
                migrated.set_password_hash(hash, now);
                self.credentials.update_user(migrated.clone())?;
                *user = migrated;
                Ok(())
            });
        match result {
            Ok(()) => info!(
                user_id = %user.id,
                from = ?from,
                to = %self.hasher.default_algorithm().as_str(),
                "password hash migrated"
            ),
            Err(e) => warn!(user_id = %user.id, error = %e, "password hash migration failed"),
        }
    }

    /// Equalize timing for unknown accounts by verifying against a throwaway hash.
    fn burn_verification(&self, password: &str) {
        let dummy = self
            .dummy_hash
            .get_or_init(|| self.hasher.hash_default("shepherd-timing-equalizer").ok());
        if let Some(hash) = dummy {
            let _ = self.hasher.verify_detected(password, hash);
        }
    }

    fn audit_best_effort(&self, entry: AuditLogEntry) {
        if let Err(e) = self.audit.append(&entry) {
            error!(action = %entry.action, entity_id = %entry.entity_id, error = %e, "audit append failed");
        }
    }
}

fn ensure_strong(password: &str) -> Result<(), AuthServiceError> {
    let report = check_strength(password);
    if report.is_valid {
        Ok(())
    } else {
        Err(AuthServiceError::WeakPassword(Box::new(report)))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

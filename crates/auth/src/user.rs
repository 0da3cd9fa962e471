//! User account record.
//!
//! Users are created at signup (or provisioned by an administrator), mutated on
//! password change and profile update, and never hard-deleted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use shepherd_core::{DomainError, DomainResult, UserId};

use crate::principal::ensure_role_scope;
use crate::{Actor, OrgScope, Role};

// ─────────────────────────────────────────────────────────────────────────────
// User Status
// ─────────────────────────────────────────────────────────────────────────────

/// Soft lifecycle state of an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserStatus {
    /// User can authenticate.
    #[default]
    Active,
    /// User cannot authenticate; record is retained.
    Suspended,
}

// ─────────────────────────────────────────────────────────────────────────────
// User
// ─────────────────────────────────────────────────────────────────────────────

/// A stored user account.
///
/// # Invariants
/// - `email` is trimmed, lowercased and contains an `@`.
/// - A role that requires a scope id carries it.
/// - `password_hash` is tagged with its algorithm by prefix (see `password`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub full_name: String,
    pub password_hash: String,
    pub role: Role,
    pub scope: OrgScope,
    pub status: UserStatus,
    /// Access tokens issued before this second are no longer honoured.
    pub password_changed_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Public view of a user returned by the API (never includes the hash).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: UserId,
    pub email: String,
    pub name: String,
    pub role: Role,
}

impl User {
    pub fn new(
        id: UserId,
        email: &str,
        full_name: &str,
        password_hash: String,
        role: Role,
        scope: OrgScope,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let email = normalize_email(email)?;

        let full_name = full_name.trim();
        if full_name.is_empty() {
            return Err(DomainError::validation("full name cannot be empty"));
        }

        ensure_role_scope(role, &scope)?;

        Ok(Self {
            id,
            email,
            full_name: full_name.to_string(),
            password_hash,
            role,
            scope,
            status: UserStatus::Active,
            password_changed_at: now,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn is_active(&self) -> bool {
        self.status == UserStatus::Active
    }

    /// Replace the stored hash of the same password (algorithm migration).
    pub fn set_password_hash(&mut self, hash: String, now: DateTime<Utc>) {
        self.password_hash = hash;
        self.updated_at = now;
    }

    /// Store the hash of a new password; earlier access tokens stop working.
    pub fn change_password_hash(&mut self, hash: String, now: DateTime<Utc>) {
        self.set_password_hash(hash, now);
        self.password_changed_at = now;
    }

    /// Whether an access token issued at `iat` (unix seconds) predates the last
    /// password change. Token timestamps have one-second resolution.
    pub fn token_predates_password_change(&self, iat: DateTime<Utc>) -> bool {
        iat.timestamp() < self.password_changed_at.timestamp()
    }

    /// Move to `status`; returns `false` when already there.
    pub fn set_status(&mut self, status: UserStatus, now: DateTime<Utc>) -> bool {
        if self.status == status {
            return false;
        }
        self.status = status;
        self.updated_at = now;
        true
    }

    pub fn actor(&self) -> Actor {
        Actor::new(self.id, self.role, self.scope.clone())
    }

    pub fn profile(&self) -> UserProfile {
        UserProfile {
            id: self.id,
            email: self.email.clone(),
            name: self.full_name.clone(),
            role: self.role,
        }
    }
}

/// Trim + lowercase an email address and apply a basic shape check.
pub fn normalize_email(email: &str) -> DomainResult<String> {
    let email = email.trim().to_lowercase();
    let Some((local, domain)) = email.split_once('@') else {
        return Err(DomainError::validation("invalid email format"));
    };
    if local.is_empty() || domain.is_empty() || domain.contains('@') || email.contains(' ') {
        return Err(DomainError::validation("invalid email format"));
    }
    Ok(email)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use shepherd_approvals::{
    ApprovalRequest, ApprovalStatus, ApprovalType, ApprovalWorkflow, FundTransfer, Requisition,
};
use shepherd_auth::User;
use shepherd_core::{ApprovalRequestId, EntityId, ExpectedVersion, UserId};

/// Store operation error.
///
/// These are **infrastructure errors** as opposed to domain errors; callers
/// map `Unavailable` to a dependency failure and must not degrade security
/// behavior because of it.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The backing store could not be reached or failed internally.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// Optimistic concurrency check failed (version mismatch).
    #[error("optimistic concurrency check failed: {0}")]
    Conflict(String),

    /// A uniqueness constraint was violated.
    #[error("duplicate: {0}")]
    Duplicate(String),

    /// An update targeted a record that does not exist.
    #[error("record not found")]
    NotFound,
}

/// A refresh-token session. `token` is the refresh token's `jti`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub token: Uuid,
    pub user_id: UserId,
    pub expires_at: DateTime<Utc>,
    pub ip: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Session {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// User records and refresh-token sessions.
///
/// ## Implementation Requirements
///
/// - `email` is unique across users (`insert_user` returns `Duplicate`).
/// - Users are never deleted.
/// - Session operations are keyed by the session token and must be safe to
///   call concurrently.
pub trait CredentialStore: Send + Sync {
    fn get_user(&self, id: UserId) -> Result<Option<User>, StoreError>;
    fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;
    fn insert_user(&self, user: User) -> Result<(), StoreError>;
    fn update_user(&self, user: User) -> Result<(), StoreError>;

    fn put_session(&self, session: Session) -> Result<(), StoreError>;
    fn get_session(&self, token: Uuid) -> Result<Option<Session>, StoreError>;
    /// Returns whether a session was removed.
    fn delete_session(&self, token: Uuid) -> Result<bool, StoreError>;
    /// Revoke every session of a user; returns how many were removed.
    fn delete_user_sessions(&self, user_id: UserId) -> Result<usize, StoreError>;
}

/// Approval request persistence.
///
/// `update` is the per-request mutual-exclusion boundary: it must compare the
/// stored version against `expected` and write atomically, so two concurrent
/// decisions on one request cannot both land.
pub trait ApprovalStore: Send + Sync {
    fn get(&self, id: ApprovalRequestId) -> Result<Option<ApprovalRequest>, StoreError>;
    fn insert(&self, request: ApprovalRequest) -> Result<(), StoreError>;
    fn update(&self, request: ApprovalRequest, expected: ExpectedVersion) -> Result<(), StoreError>;
    fn list_by_status(&self, status: ApprovalStatus) -> Result<Vec<ApprovalRequest>, StoreError>;
}

/// Approval workflow templates (administrator-managed, read-only to the engine).
pub trait WorkflowStore: Send + Sync {
    fn list_for_type(&self, approval_type: ApprovalType) -> Result<Vec<ApprovalWorkflow>, StoreError>;
    fn put(&self, workflow: ApprovalWorkflow) -> Result<(), StoreError>;
}

/// Linked business entities gated by approvals.
pub trait EntityStore: Send + Sync {
    fn get_requisition(&self, id: EntityId) -> Result<Option<Requisition>, StoreError>;
    fn put_requisition(&self, requisition: Requisition) -> Result<(), StoreError>;
    fn get_fund_transfer(&self, id: EntityId) -> Result<Option<FundTransfer>, StoreError>;
    fn put_fund_transfer(&self, transfer: FundTransfer) -> Result<(), StoreError>;
}

impl<S> CredentialStore for Arc<S>
where
    S: CredentialStore + ?Sized,
{
    fn get_user(&self, id: UserId) -> Result<Option<User>, StoreError> {
        (**self).get_user(id)
    }

    fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        (**self).find_user_by_email(email)
    }

    fn insert_user(&self, user: User) -> Result<(), StoreError> {
        (**self).insert_user(user)
    }

    fn update_user(&self, user: User) -> Result<(), StoreError> {
        (**self).update_user(user)
    }

    fn put_session(&self, session: Session) -> Result<(), StoreError> {
        (**self).put_session(session)
    }

    fn get_session(&self, token: Uuid) -> Result<Option<Session>, StoreError> {
        (**self).get_session(token)
    }

    fn delete_session(&self, token: Uuid) -> Result<bool, StoreError> {
        (**self).delete_session(token)
    }

    fn delete_user_sessions(&self, user_id: UserId) -> Result<usize, StoreError> {
        (**self).delete_user_sessions(user_id)
    }
}

impl<S> ApprovalStore for Arc<S>
where
    S: ApprovalStore + ?Sized,
{
    fn get(&self, id: ApprovalRequestId) -> Result<Option<ApprovalRequest>, StoreError> {
        (**self).get(id)
    }

    fn insert(&self, request: ApprovalRequest) -> Result<(), StoreError> {
        (**self).insert(request)
    }

    fn update(&self, request: ApprovalRequest, expected: ExpectedVersion) -> Result<(), StoreError> {
        (**self).update(request, expected)
    }

    fn list_by_status(&self, status: ApprovalStatus) -> Result<Vec<ApprovalRequest>, StoreError> {
        (**self).list_by_status(status)
    }
}

impl<S> WorkflowStore for Arc<S>
where
    S: WorkflowStore + ?Sized,
{
    fn list_for_type(&self, approval_type: ApprovalType) -> Result<Vec<ApprovalWorkflow>, StoreError> {
        (**self).list_for_type(approval_type)
    }

    fn put(&self, workflow: ApprovalWorkflow) -> Result<(), StoreError> {
        (**self).put(workflow)
    }
}

impl<S> EntityStore for Arc<S>
where
    S: EntityStore + ?Sized,
{
    fn get_requisition(&self, id: EntityId) -> Result<Option<Requisition>, StoreError> {
        (**self).get_requisition(id)
    }

    fn put_requisition(&self, requisition: Requisition) -> Result<(), StoreError> {
        (**self).put_requisition(requisition)
    }

    fn get_fund_transfer(&self, id: EntityId) -> Result<Option<FundTransfer>, StoreError> {
        (**self).get_fund_transfer(id)
    }

    fn put_fund_transfer(&self, transfer: FundTransfer) -> Result<(), StoreError> {
        (**self).put_fund_transfer(transfer)
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use shepherd_auth::{Actor, OrgScope, ScopeLevel};
use shepherd_core::{
    AggregateRoot, ApprovalRequestId, DomainError, DomainResult, EntityId, UserId, WorkflowId,
};

use crate::{ApprovalAction, ApprovalStatus};

// ─────────────────────────────────────────────────────────────────────────────
// Types
// ─────────────────────────────────────────────────────────────────────────────

/// Kind of business record an approval request gates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApprovalType {
    Requisition,
    FundTransfer,
}

impl ApprovalType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApprovalType::Requisition => "REQUISITION",
            ApprovalType::FundTransfer => "FUND_TRANSFER",
        }
    }
}

impl core::fmt::Display for ApprovalType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Organizational tier at which a request is decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApprovalLevel {
    SubDistrict,
    District,
    Agency,
    National,
}

impl ApprovalLevel {
    /// Scope id the request must carry to be routable at this level.
    pub fn required_scope(&self) -> Option<ScopeLevel> {
        match self {
            ApprovalLevel::SubDistrict => Some(ScopeLevel::SubDistrict),
            ApprovalLevel::District => Some(ScopeLevel::District),
            ApprovalLevel::Agency => Some(ScopeLevel::Agency),
            ApprovalLevel::National => None,
        }
    }

    /// Level implied by the most specific scope id present.
    pub fn from_scope(scope: &OrgScope) -> Self {
        match scope.most_specific() {
            Some(ScopeLevel::SubDistrict) => ApprovalLevel::SubDistrict,
            Some(ScopeLevel::District) => ApprovalLevel::District,
            Some(ScopeLevel::Agency) => ApprovalLevel::Agency,
            None => ApprovalLevel::National,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ApprovalError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("invalid transition from {from} to {to}")]
    InvalidTransition {
        from: ApprovalStatus,
        to: ApprovalStatus,
    },
}

impl From<DomainError> for ApprovalError {
    fn from(value: DomainError) -> Self {
        ApprovalError::Validation(value.to_string())
    }
}

/// A validated status change, produced before anything is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Transition {
    pub action: ApprovalAction,
    pub from: ApprovalStatus,
    pub to: ApprovalStatus,
}

// ─────────────────────────────────────────────────────────────────────────────
// Approval Request
// ─────────────────────────────────────────────────────────────────────────────

/// Input for creating an approval request over a linked business record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalRequestDraft {
    #[serde(rename = "type")]
    pub approval_type: ApprovalType,
    pub entity_id: EntityId,
    /// Amount in minor currency units.
    pub amount: u64,
    #[serde(flatten)]
    pub scope: OrgScope,
    pub requested_by: UserId,
    pub comments: Option<String>,
}

/// Lifecycle record of a single decision over a linked business entity.
///
/// # Invariants
/// - `status` only changes through [`ApprovalRequest::plan`] + [`ApprovalRequest::apply`].
/// - `approved_by` / `approved_at` are set only by approve/reject decisions.
/// - The scope carries the id required by `approval_level`.
/// - The request references its entity; it never owns it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalRequest {
    pub id: ApprovalRequestId,
    #[serde(rename = "type")]
    pub approval_type: ApprovalType,
    pub entity_id: EntityId,
    pub status: ApprovalStatus,
    pub approval_level: ApprovalLevel,
    #[serde(flatten)]
    pub scope: OrgScope,
    pub amount: u64,
    pub workflow_id: Option<WorkflowId>,
    pub requested_by: UserId,
    pub approved_by: Option<UserId>,
    pub approved_at: Option<DateTime<Utc>>,
    pub comments: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: u64,
}

impl ApprovalRequest {
    /// Create a PENDING request at `level`.
    pub fn submit(
        id: ApprovalRequestId,
        draft: ApprovalRequestDraft,
        level: ApprovalLevel,
        workflow_id: Option<WorkflowId>,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        if draft.amount == 0 {
            return Err(DomainError::validation("amount must be positive"));
        }
        if let Some(required) = level.required_scope() {
            if !draft.scope.has(required) {
                return Err(DomainError::validation(format!(
                    "{level:?} approval requires a {required:?} scope id"
                )));
            }
        }

        Ok(Self {
            id,
            approval_type: draft.approval_type,
            entity_id: draft.entity_id,
            status: ApprovalStatus::Pending,
            approval_level: level,
            scope: draft.scope,
            amount: draft.amount,
            workflow_id,
            requested_by: draft.requested_by,
            approved_by: None,
            approved_at: None,
            comments: normalize_comments(draft.comments),
            created_at: now,
            updated_at: now,
            version: 1,
        })
    }

    /// Validate `action` against the transition table. Never mutates.
    pub fn plan(&self, action: ApprovalAction) -> Result<Transition, ApprovalError> {
        let to = action.target();
        if !self.status.can_transition_to(to) {
            return Err(ApprovalError::InvalidTransition {
                from: self.status,
                to,
            });
        }
        Ok(Transition {
            action,
            from: self.status,
            to,
        })
    }

    /// Apply a planned transition.
    pub fn apply(
        &mut self,
        transition: Transition,
        actor: &Actor,
        comments: Option<String>,
        now: DateTime<Utc>,
    ) {
        self.status = transition.to;
        if transition.action.records_decider() {
            self.approved_by = Some(actor.user_id);
            self.approved_at = Some(now);
        }
        if let Some(comments) = normalize_comments(comments) {
            self.comments = Some(comments);
        }
        self.updated_at = now;
        self.version += 1;
    }
}

impl AggregateRoot for ApprovalRequest {
    type Id = ApprovalRequestId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

fn normalize_comments(comments: Option<String>) -> Option<String> {
    comments
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

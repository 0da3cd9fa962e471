use core::str::FromStr;

use serde::{Deserialize, Serialize};

use shepherd_core::DomainError;

/// Approval request lifecycle.
///
/// ```text
/// PENDING ──approve──▶ APPROVED ──cancel──▶ CANCELLED
///    │ ──reject───▶ REJECTED ──cancel──▶ CANCELLED
///    └──cancel──────────────────────────▶ CANCELLED
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
    Cancelled,
}

impl ApprovalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApprovalStatus::Pending => "PENDING",
            ApprovalStatus::Approved => "APPROVED",
            ApprovalStatus::Rejected => "REJECTED",
            ApprovalStatus::Cancelled => "CANCELLED",
        }
    }

    /// Statuses reachable in one step.
    pub fn allowed_next(&self) -> &'static [ApprovalStatus] {
        match self {
            ApprovalStatus::Pending => &[
                ApprovalStatus::Approved,
                ApprovalStatus::Rejected,
                ApprovalStatus::Cancelled,
            ],
            ApprovalStatus::Approved | ApprovalStatus::Rejected => &[ApprovalStatus::Cancelled],
            ApprovalStatus::Cancelled => &[],
        }
    }

    pub fn can_transition_to(&self, next: ApprovalStatus) -> bool {
        self.allowed_next().contains(&next)
    }

    /// APPROVED/REJECTED/CANCELLED are decisions; only CANCELLED is final.
    pub fn is_decided(&self) -> bool {
        !matches!(self, ApprovalStatus::Pending)
    }
}

impl core::fmt::Display for ApprovalStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Action an actor requests on an approval request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalAction {
    Approve,
    Reject,
    Cancel,
}

impl ApprovalAction {
    pub fn target(&self) -> ApprovalStatus {
        match self {
            ApprovalAction::Approve => ApprovalStatus::Approved,
            ApprovalAction::Reject => ApprovalStatus::Rejected,
            ApprovalAction::Cancel => ApprovalStatus::Cancelled,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ApprovalAction::Approve => "approve",
            ApprovalAction::Reject => "reject",
            ApprovalAction::Cancel => "cancel",
        }
    }

    /// Whether the action records `approved_by` / `approved_at`.
    pub fn records_decider(&self) -> bool {
        match self {
            ApprovalAction::Approve | ApprovalAction::Reject => true,
            ApprovalAction::Cancel => false,
        }
    }
}

impl core::fmt::Display for ApprovalAction {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ApprovalAction {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "approve" => Ok(ApprovalAction::Approve),
            "reject" => Ok(ApprovalAction::Reject),
            "cancel" => Ok(ApprovalAction::Cancel),
            other => Err(DomainError::validation(format!("unknown approval action '{other}'"))),
        }
    }
}

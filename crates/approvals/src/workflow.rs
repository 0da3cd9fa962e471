use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use shepherd_core::{DomainError, DomainResult, WorkflowId};

use crate::{ApprovalLevel, ApprovalType};

/// Administrator-defined approval template. Read-only to the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalWorkflow {
    pub id: WorkflowId,
    pub name: String,
    pub department: String,
    pub approval_type: ApprovalType,
    /// Requests at or above this amount (minor units) use this template.
    pub amount_threshold: Option<u64>,
    pub approval_level: ApprovalLevel,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl ApprovalWorkflow {
    pub fn new(
        name: &str,
        department: &str,
        approval_type: ApprovalType,
        amount_threshold: Option<u64>,
        approval_level: ApprovalLevel,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let name = name.trim();
        if name.is_empty() {
            return Err(DomainError::validation("workflow name cannot be empty"));
        }
        Ok(Self {
            id: WorkflowId::new(),
            name: name.to_string(),
            department: department.trim().to_string(),
            approval_type,
            amount_threshold,
            approval_level,
            is_active: true,
            created_at: now,
        })
    }

    fn applies_to(&self, approval_type: ApprovalType, amount: u64) -> bool {
        self.is_active
            && self.approval_type == approval_type
            && self.amount_threshold.is_none_or(|threshold| amount >= threshold)
    }
}

/// Pick the active template for `approval_type` with the highest threshold not
/// exceeding `amount`. Templates without a threshold match any amount and rank
/// below every thresholded one.
pub fn select_workflow(
    workflows: &[ApprovalWorkflow],
    approval_type: ApprovalType,
    amount: u64,
) -> Option<&ApprovalWorkflow> {
    workflows
        .iter()
        .filter(|w| w.applies_to(approval_type, amount))
        .max_by_key(|w| w.amount_threshold.map_or(0, |t| t.saturating_add(1)))
}

//! Business records gated by approval requests.
//!
//! The approval engine holds references to these and never assumes exclusive
//! write access: it only moves their status, and doing so twice is a no-op.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use shepherd_core::{EntityId, UserId};

use crate::ApprovalStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntityStatus {
    Pending,
    Approved,
    Rejected,
    Cancelled,
}

impl EntityStatus {
    /// Entity status mirroring a decided approval status.
    pub fn from_decision(status: ApprovalStatus) -> Self {
        match status {
            ApprovalStatus::Pending => EntityStatus::Pending,
            ApprovalStatus::Approved => EntityStatus::Approved,
            ApprovalStatus::Rejected => EntityStatus::Rejected,
            ApprovalStatus::Cancelled => EntityStatus::Cancelled,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Requisition {
    pub id: EntityId,
    pub title: String,
    pub amount: u64,
    pub requested_by: UserId,
    pub status: EntityStatus,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FundTransfer {
    pub id: EntityId,
    pub from_account: String,
    pub to_account: String,
    pub amount: u64,
    pub requested_by: UserId,
    pub status: EntityStatus,
    pub updated_at: DateTime<Utc>,
}

macro_rules! impl_status_update {
    ($t:ty) => {
        impl $t {
            /// Move to `status`; returns `false` when already there.
            pub fn set_status(&mut self, status: EntityStatus, now: DateTime<Utc>) -> bool {
                if self.status == status {
                    return false;
                }
                self.status = status;
                self.updated_at = now;
                true
            }
        }
    };
}

impl_status_update!(Requisition);
impl_status_update!(FundTransfer);

impl Requisition {
    pub fn new(title: &str, amount: u64, requested_by: UserId, now: DateTime<Utc>) -> Self {
        Self {
            id: EntityId::new(),
            title: title.trim().to_string(),
            amount,
            requested_by,
            status: EntityStatus::Pending,
            updated_at: now,
        }
    }
}

impl FundTransfer {
    pub fn new(from_account: &str, to_account: &str, amount: u64, requested_by: UserId, now: DateTime<Utc>) -> Self {
        Self {
            id: EntityId::new(),
            from_account: from_account.trim().to_string(),
            to_account: to_account.trim().to_string(),
            amount,
            requested_by,
            status: EntityStatus::Pending,
            updated_at: now,
        }
    }
}

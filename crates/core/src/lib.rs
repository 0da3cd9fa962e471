//! `shepherd-core`: shared domain building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns).

pub mod aggregate;
pub mod error;
pub mod id;

pub use aggregate::{AggregateRoot, ExpectedVersion};
pub use error::{DomainError, DomainResult};
pub use id::{
    AgencyId, ApprovalRequestId, AuditEntryId, DistrictId, EntityId, SubDistrictId, UserId,
    WorkflowId,
};

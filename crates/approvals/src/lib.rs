//! `shepherd-approvals`: approval requests and who may decide them.
//!
//! Pure domain: the status state machine, the scope-aware authorizer,
//! workflow templates and the linked business entities. Persistence,
//! side-effect dispatch and auditing live in `shepherd-infra`.

pub mod authorize;
pub mod entity;
pub mod request;
pub mod status;
pub mod workflow;

pub use authorize::{ApprovalAuthorizer, AuthorizationDecision, DenialKind};
pub use entity::{EntityStatus, FundTransfer, Requisition};
pub use request::{
    ApprovalError, ApprovalLevel, ApprovalRequest, ApprovalRequestDraft, ApprovalType, Transition,
};
pub use status::{ApprovalAction, ApprovalStatus};
pub use workflow::{ApprovalWorkflow, select_workflow};

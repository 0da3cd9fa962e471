//! Infrastructure layer: stores, credential flows, approval orchestration.
//!
//! Everything here composes the pure crates (`shepherd-auth`,
//! `shepherd-approvals`) with injected storage traits. Real backends are
//! external collaborators; the in-memory implementations serve tests and
//! single-instance development.

pub mod approval_engine;
pub mod audit;
pub mod credentials;
pub mod side_effects;
pub mod store;

pub use approval_engine::{ApprovalWorkflowEngine, Decision, EngineError, SharedApprovalEngine};
pub use audit::{AuditLogEntry, AuditSink, InMemoryAuditSink};
pub use credentials::{
    AuthOutcome, AuthService, AuthServiceError, ClientInfo, ProvisionInput, SignupInput,
};
pub use side_effects::{
    EffectOutcome, FundTransferHandler, RequisitionHandler, SideEffectError, SideEffectHandler,
    SideEffectRegistry,
};
pub use store::{
    ApprovalStore, CredentialStore, EntityStore, InMemoryApprovalStore, InMemoryCredentialStore,
    InMemoryEntityStore, InMemoryWorkflowStore, Session, StoreError, WorkflowStore,
};

//! Storage boundaries for credentials, sessions, approvals, workflow
//! templates and linked business entities.
//!
//! The relational data store is an external collaborator; this module only
//! defines the operations the core needs, plus in-memory implementations for
//! tests and single-instance development.

pub mod in_memory;
pub mod r#trait;

pub use in_memory::{
    InMemoryApprovalStore, InMemoryCredentialStore, InMemoryEntityStore, InMemoryWorkflowStore,
};
pub use r#trait::{
    ApprovalStore, CredentialStore, EntityStore, Session, StoreError, WorkflowStore,
};

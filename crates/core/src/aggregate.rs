//! Aggregate root trait and optimistic concurrency primitives.

use crate::error::{DomainError, DomainResult};

/// Aggregate root marker + minimal interface.
///
/// Records that are mutated through a state machine (approval requests) expose
/// their identity and a monotonically increasing version so that stores can
/// reject stale writes.
pub trait AggregateRoot {
    /// Strongly-typed aggregate identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the aggregate identifier.
    fn id(&self) -> &Self::Id;

    /// Monotonically increasing version of the aggregate's state.
    ///
    /// Incremented by one for every persisted state change.
    fn version(&self) -> u64;
}

/// Optimistic concurrency expectation for an aggregate.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ExpectedVersion {
    /// Require the stored aggregate to be at an exact version.
    Exact(u64),
}

impl ExpectedVersion {
    /// Fails with [`DomainError::Conflict`] when `actual` is not the expected version.
    pub fn check(self, actual: u64) -> DomainResult<()> {
        let ExpectedVersion::Exact(expected) = self;
        if expected == actual {
            Ok(())
        } else {
            Err(DomainError::conflict(format!(
                "expected version {expected}, found {actual}"
            )))
        }
    }
}

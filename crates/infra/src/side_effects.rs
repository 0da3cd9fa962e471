//! Linked-entity side effects of approval decisions.
//!
//! A decided request updates the status of the business record it gates. The
//! handler for each [`ApprovalType`] is looked up in a [`SideEffectRegistry`];
//! types without a handler are a no-op. Handlers must be idempotent: applying
//! the same status twice leaves the entity unchanged and reports
//! [`EffectOutcome::AlreadyApplied`].

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use shepherd_approvals::{ApprovalStatus, ApprovalType, EntityStatus};
use shepherd_core::EntityId;

use crate::store::{EntityStore, StoreError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectOutcome {
    Applied,
    AlreadyApplied,
    NoHandler,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SideEffectError {
    #[error("linked entity {0} not found")]
    EntityNotFound(EntityId),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub trait SideEffectHandler: Send + Sync {
    /// Move the linked entity to the status implied by `decision`.
    fn apply(
        &self,
        entity_id: EntityId,
        decision: ApprovalStatus,
        now: DateTime<Utc>,
    ) -> Result<EffectOutcome, SideEffectError>;

    /// Whether the linked entity exists (checked at submission).
    fn exists(&self, entity_id: EntityId) -> Result<bool, SideEffectError>;
}

/// Handlers keyed by approval type.
#[derive(Default, Clone)]
pub struct SideEffectRegistry {
    handlers: HashMap<ApprovalType, Arc<dyn SideEffectHandler>>,
}

impl core::fmt::Debug for SideEffectRegistry {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SideEffectRegistry")
            .field("types", &self.handlers.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl SideEffectRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry wired with the requisition and fund-transfer handlers over `store`.
    pub fn with_entity_handlers<E>(store: Arc<E>) -> Self
    where
        E: EntityStore + 'static,
    {
        Self::new()
            .register(ApprovalType::Requisition, RequisitionHandler::new(store.clone()))
            .register(ApprovalType::FundTransfer, FundTransferHandler::new(store))
    }

    pub fn register<H>(mut self, approval_type: ApprovalType, handler: H) -> Self
    where
        H: SideEffectHandler + 'static,
    {
        self.handlers.insert(approval_type, Arc::new(handler));
        self
    }

    pub fn handler(&self, approval_type: ApprovalType) -> Option<&dyn SideEffectHandler> {
        self.handlers.get(&approval_type).map(|h| h.as_ref())
    }

    pub fn dispatch(
        &self,
        approval_type: ApprovalType,
        entity_id: EntityId,
        decision: ApprovalStatus,
        now: DateTime<Utc>,
    ) -> Result<EffectOutcome, SideEffectError> {
        match self.handler(approval_type) {
            Some(handler) => handler.apply(entity_id, decision, now),
            None => Ok(EffectOutcome::NoHandler),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct RequisitionHandler<E> {
    store: Arc<E>,
}

impl<E> RequisitionHandler<E> {
    pub fn new(store: Arc<E>) -> Self {
        Self { store }
    }
}

impl<E: EntityStore> SideEffectHandler for RequisitionHandler<E> {
    fn apply(
        &self,
        entity_id: EntityId,
        decision: ApprovalStatus,
        now: DateTime<Utc>,
    ) -> Result<EffectOutcome, SideEffectError> {
        let mut requisition = self
            .store
            .get_requisition(entity_id)?
            .ok_or(SideEffectError::EntityNotFound(entity_id))?;
        if !requisition.set_status(EntityStatus::from_decision(decision), now) {
            return Ok(EffectOutcome::AlreadyApplied);
        }
        self.store.put_requisition(requisition)?;
        Ok(EffectOutcome::Applied)
    }

    fn exists(&self, entity_id: EntityId) -> Result<bool, SideEffectError> {
        Ok(self.store.get_requisition(entity_id)?.is_some())
    }
}

#[derive(Debug)]
pub struct FundTransferHandler<E> {
    store: Arc<E>,
}

impl<E> FundTransferHandler<E> {
    pub fn new(store: Arc<E>) -> Self {
        Self { store }
    }
}

impl<E: EntityStore> SideEffectHandler for FundTransferHandler<E> {
    fn apply(
        &self,
        entity_id: EntityId,
        decision: ApprovalStatus,
        now: DateTime<Utc>,
    ) -> Result<EffectOutcome, SideEffectError> {
        let mut transfer = self
            .store
            .get_fund_transfer(entity_id)?
            .ok_or(SideEffectError::EntityNotFound(entity_id))?;
        if !transfer.set_status(EntityStatus::from_decision(decision), now) {
            return Ok(EffectOutcome::AlreadyApplied);
        }
        self.store.put_fund_transfer(transfer)?;
        Ok(EffectOutcome::Applied)
    }

    fn exists(&self, entity_id: EntityId) -> Result<bool, SideEffectError> {
        Ok(self.store.get_fund_transfer(entity_id)?.is_some())
    }
}

//! Approval workflow engine (application-level orchestration).
//!
//! The engine drives an [`ApprovalRequest`] through its status machine and
//! keeps the linked business entity and the audit log in step with it.
//!
//! ## Decision Flow
//!
//! ```text
//! decide(request_id, action, actor, comments, now)
//!   ↓
//! 1. Load the request (absent → NotFound)
//!   ↓
//! 2. Authorize the actor against the request scope (→ Forbidden)
//!   ↓
//! 3. Plan the transition (→ InvalidTransition)
//!   ↓
//! 4. Persist under an optimistic version check
//!   ↓
//! 5. Dispatch the linked-entity side effect (failures are recorded, not fatal)
//!   ↓
//! 6. Append one audit entry (failure → PartialFailure, see `retry_audit`)
//! ```
//!
//! Steps 1-3 never mutate. Once step 4 succeeds the decision stands: neither a
//! side-effect failure nor an audit failure rolls it back.
//!
//! ## Concurrency
//!
//! `ApprovalStore::update` compares versions atomically. When a concurrent
//! decision wins, the loser re-reads the request and re-plans; if the fresh
//! status no longer permits the action it fails with `InvalidTransition`.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;
use tracing::{error, info, warn};

use shepherd_approvals::{
    ApprovalAction, ApprovalAuthorizer, ApprovalError, ApprovalLevel, ApprovalRequest,
    ApprovalRequestDraft, ApprovalStatus, Transition, select_workflow,
};
use shepherd_auth::Actor;
use shepherd_core::{ApprovalRequestId, DomainError, ExpectedVersion};

use crate::audit::{AuditLogEntry, AuditSink, actions};
use crate::side_effects::{EffectOutcome, SideEffectRegistry};
use crate::store::{ApprovalStore, StoreError, WorkflowStore};

const ENTITY_TYPE: &str = "approval_request";

/// Re-plans attempted after losing an optimistic concurrency race.
const MAX_CONFLICT_RETRIES: usize = 3;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("approval request not found")]
    NotFound,

    #[error("forbidden")]
    Forbidden,

    #[error("invalid transition from {from} to {to}")]
    InvalidTransition {
        from: ApprovalStatus,
        to: ApprovalStatus,
    },

    #[error("validation failed: {0}")]
    Validation(String),

    /// The state change was persisted but its audit entry was not.
    #[error("decision persisted but audit append failed: {reason}")]
    PartialFailure {
        approval: Box<ApprovalRequest>,
        entry: Box<AuditLogEntry>,
        reason: String,
    },

    #[error("dependency unavailable: {0}")]
    DependencyUnavailable(String),
}

impl From<ApprovalError> for EngineError {
    fn from(value: ApprovalError) -> Self {
        match value {
            ApprovalError::Validation(msg) => EngineError::Validation(msg),
            ApprovalError::InvalidTransition { from, to } => {
                EngineError::InvalidTransition { from, to }
            }
        }
    }
}

impl From<DomainError> for EngineError {
    fn from(value: DomainError) -> Self {
        ApprovalError::from(value).into()
    }
}

impl From<StoreError> for EngineError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::NotFound => EngineError::NotFound,
            StoreError::Duplicate(msg) => EngineError::Validation(msg),
            StoreError::Unavailable(msg) | StoreError::Conflict(msg) => {
                EngineError::DependencyUnavailable(msg)
            }
        }
    }
}

/// Outcome of a persisted decision.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Decision {
    pub approval: ApprovalRequest,
    pub transition: Transition,
    pub effect: Option<EffectOutcome>,
    pub effect_error: Option<String>,
}

/// Approval state machine over injected stores.
///
/// ## Generic Parameters
///
/// - `A`: approval request store
/// - `W`: workflow template store
/// - `L`: audit sink
pub struct ApprovalWorkflowEngine<A, W, L> {
    approvals: A,
    workflows: W,
    audit: L,
    effects: SideEffectRegistry,
    authorizer: ApprovalAuthorizer,
}

impl<A, W, L> ApprovalWorkflowEngine<A, W, L>
where
    A: ApprovalStore,
    W: WorkflowStore,
    L: AuditSink,
{
    pub fn new(approvals: A, workflows: W, audit: L, effects: SideEffectRegistry) -> Self {
        Self {
            approvals,
            workflows,
            audit,
            effects,
            authorizer: ApprovalAuthorizer::new(),
        }
    }

    /// Apply `action` to a request on behalf of `actor`.
    pub fn decide(
        &self,
        request_id: ApprovalRequestId,
        action: ApprovalAction,
        actor: &Actor,
        comments: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<Decision, EngineError> {
        let mut current = self.load(request_id)?;
        let mut attempts = 0;

        let (approval, transition) = loop {
            let decision = self.authorizer.explain(actor, &current);
            if !decision.granted {
                warn!(
                    request_id = %request_id,
                    user_id = %actor.user_id,
                    role = %actor.role,
                    denial = ?decision.denial,
                    "approval decision denied"
                );
                return Err(EngineError::Forbidden);
            }

            let transition = current.plan(action)?;
            let expected = ExpectedVersion::Exact(current.version);
            let mut next = current.clone();
            next.apply(transition, actor, comments.clone(), now);

            match self.approvals.update(next.clone(), expected) {
                Ok(()) => break (next, transition),
                Err(StoreError::Conflict(_)) if attempts < MAX_CONFLICT_RETRIES => {
                    attempts += 1;
                    current = self.load(request_id)?;
                }
                Err(StoreError::Conflict(_)) => {
                    let fresh = self.load(request_id)?;
                    return Err(EngineError::InvalidTransition {
                        from: fresh.status,
                        to: action.target(),
                    });
                }
                Err(e) => {
                    error!(request_id = %request_id, error = %e, "approval store update failed");
                    return Err(e.into());
                }
            }
        };

        info!(
            request_id = %request_id,
            user_id = %actor.user_id,
            from = %transition.from,
            to = %transition.to,
            "approval request decided"
        );

        let (effect, effect_error) = match self.effects.dispatch(
            approval.approval_type,
            approval.entity_id,
            transition.to,
            now,
        ) {
            Ok(outcome) => (Some(outcome), None),
            Err(e) => {
                warn!(
                    request_id = %request_id,
                    entity_id = %approval.entity_id,
                    error = %e,
                    "linked entity side effect failed"
                );
                (None, Some(e.to_string()))
            }
        };

        let entry = AuditLogEntry::new(
            decision_action(transition.to),
            ENTITY_TYPE,
            approval.id,
            Some(actor.user_id),
            json!({
                "from": transition.from,
                "to": transition.to,
                "type": approval.approval_type,
                "entityId": approval.entity_id,
                "actorRole": actor.role,
                "comments": approval.comments,
                "sideEffect": effect,
                "sideEffectError": effect_error,
            }),
            now,
        );
        self.append_audit(&approval, entry)?;

        Ok(Decision {
            approval,
            transition,
            effect,
            effect_error,
        })
    }

    /// Create a PENDING request for a linked entity.
    pub fn submit(
        &self,
        draft: ApprovalRequestDraft,
        now: DateTime<Utc>,
    ) -> Result<ApprovalRequest, EngineError> {
        if let Some(handler) = self.effects.handler(draft.approval_type) {
            let exists = handler.exists(draft.entity_id).map_err(|e| {
                error!(entity_id = %draft.entity_id, error = %e, "linked entity lookup failed");
                EngineError::DependencyUnavailable(e.to_string())
            })?;
            if !exists {
                return Err(EngineError::Validation(format!(
                    "linked {} {} does not exist",
                    draft.approval_type, draft.entity_id
                )));
            }
        }

        let templates = self.workflows.list_for_type(draft.approval_type)?;
        let workflow = select_workflow(&templates, draft.approval_type, draft.amount);
        let level = workflow
            .map(|w| w.approval_level)
            .unwrap_or_else(|| ApprovalLevel::from_scope(&draft.scope));
        let workflow_id = workflow.map(|w| w.id);

        let request = ApprovalRequest::submit(ApprovalRequestId::new(), draft, level, workflow_id, now)?;
        self.approvals.insert(request.clone())?;

        info!(
            request_id = %request.id,
            approval_type = %request.approval_type,
            level = ?request.approval_level,
            "approval request submitted"
        );

        let entry = AuditLogEntry::new(
            actions::APPROVAL_SUBMITTED,
            ENTITY_TYPE,
            request.id,
            Some(request.requested_by),
            json!({
                "type": request.approval_type,
                "entityId": request.entity_id,
                "amount": request.amount,
                "approvalLevel": request.approval_level,
                "workflowId": request.workflow_id,
            }),
            now,
        );
        self.append_audit(&request, entry)?;

        Ok(request)
    }

    /// PENDING requests the actor may see, newest first.
    pub fn pending_for(&self, actor: &Actor) -> Result<Vec<ApprovalRequest>, EngineError> {
        let mut visible: Vec<_> = self
            .approvals
            .list_by_status(ApprovalStatus::Pending)?
            .into_iter()
            .filter(|r| self.authorizer.can_view(actor, r))
            .collect();
        visible.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(visible)
    }

    pub fn get(&self, request_id: ApprovalRequestId, actor: &Actor) -> Result<ApprovalRequest, EngineError> {
        let request = self.load(request_id)?;
        if !self.authorizer.can_view(actor, &request) {
            return Err(EngineError::Forbidden);
        }
        Ok(request)
    }

    /// Re-append an audit entry returned in a `PartialFailure`. Idempotent.
    pub fn retry_audit(&self, entry: &AuditLogEntry) -> Result<(), EngineError> {
        self.audit.append(entry).map_err(|e| {
            error!(entity_id = %entry.entity_id, action = %entry.action, error = %e, "audit retry failed");
            EngineError::DependencyUnavailable(e.to_string())
        })
    }

    fn load(&self, request_id: ApprovalRequestId) -> Result<ApprovalRequest, EngineError> {
        self.approvals
            .get(request_id)
            .map_err(|e| {
                error!(request_id = %request_id, error = %e, "approval store read failed");
                EngineError::from(e)
            })?
            .ok_or(EngineError::NotFound)
    }

    fn append_audit(&self, approval: &ApprovalRequest, entry: AuditLogEntry) -> Result<(), EngineError> {
        self.audit.append(&entry).map_err(|e| {
            warn!(
                request_id = %approval.id,
                action = %entry.action,
                error = %e,
                "audit append failed after state change"
            );
            EngineError::PartialFailure {
                approval: Box::new(approval.clone()),
                entry: Box::new(entry),
                reason: e.to_string(),
            }
        })
    }
}

impl<A, W, L> core::fmt::Debug for ApprovalWorkflowEngine<A, W, L> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ApprovalWorkflowEngine")
            .field("effects", &self.effects)
            .finish_non_exhaustive()
    }
}

/// Engine over shared trait objects, as wired by the API.
pub type SharedApprovalEngine = ApprovalWorkflowEngine<
    Arc<dyn ApprovalStore>,
    Arc<dyn WorkflowStore>,
    Arc<dyn AuditSink>,
>;

fn decision_action(status: ApprovalStatus) -> &'static str {
    match status {
        ApprovalStatus::Approved => actions::APPROVAL_APPROVED,
        ApprovalStatus::Rejected => actions::APPROVAL_REJECTED,
        ApprovalStatus::Cancelled => actions::APPROVAL_CANCELLED,
        ApprovalStatus::Pending => actions::APPROVAL_SUBMITTED,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use proptest::prelude::*;

    use shepherd_approvals::{
        ApprovalType, ApprovalWorkflow, EntityStatus, FundTransfer, Requisition,
    };
    use shepherd_auth::{OrgScope, Role};
    use shepherd_core::{AgencyId, SubDistrictId, UserId};

    use crate::audit::InMemoryAuditSink;
    use crate::store::{
        EntityStore, InMemoryApprovalStore, InMemoryEntityStore, InMemoryWorkflowStore,
    };

    use super::*;

    struct Harness {
        engine: ApprovalWorkflowEngine<Arc<InMemoryApprovalStore>, Arc<InMemoryWorkflowStore>, Arc<InMemoryAuditSink>>,
        approvals: Arc<InMemoryApprovalStore>,
        workflows: Arc<InMemoryWorkflowStore>,
        entities: Arc<InMemoryEntityStore>,
        audit: Arc<InMemoryAuditSink>,
    }

    fn harness() -> Harness {
        let approvals = Arc::new(InMemoryApprovalStore::new());
        let workflows = Arc::new(InMemoryWorkflowStore::new());
        let entities = Arc::new(InMemoryEntityStore::new());
        let audit = Arc::new(InMemoryAuditSink::new());
        let engine = ApprovalWorkflowEngine::new(
            approvals.clone(),
            workflows.clone(),
            audit.clone(),
            SideEffectRegistry::with_entity_handlers(entities.clone()),
        );
        Harness {
            engine,
            approvals,
            workflows,
            entities,
            audit,
        }
    }

    fn agency(id: &str) -> OrgScope {
        OrgScope::agency(AgencyId::new(id).unwrap())
    }

    fn admin() -> Actor {
        Actor::new(UserId::new(), Role::Admin, OrgScope::national())
    }

    impl Harness {
        fn requisition(&self, scope: OrgScope, amount: u64) -> ApprovalRequest {
            self.requisition_at(scope, amount, Utc::now())
        }

        fn requisition_at(&self, scope: OrgScope, amount: u64, now: DateTime<Utc>) -> ApprovalRequest {
            let requester = UserId::new();
            let requisition = Requisition::new("Sound system", amount, requester, Utc::now());
            let entity_id = requisition.id;
            self.entities.put_requisition(requisition).unwrap();
            self.engine
                .submit(
                    ApprovalRequestDraft {
                        approval_type: ApprovalType::Requisition,
                        entity_id,
                        amount,
                        scope,
                        requested_by: requester,
                        comments: None,
                    },
                    now,
                )
                .unwrap()
        }

        fn entity_status(&self, request: &ApprovalRequest) -> EntityStatus {
            self.entities
                .get_requisition(request.entity_id)
                .unwrap()
                .unwrap()
                .status
        }
    }

    #[test]
    fn agency_leader_approves_within_agency() {
        let h = harness();
        let request = h.requisition(agency("A1"), 50_000);
        let leader = Actor::new(UserId::new(), Role::AgencyLeader, agency("A1"));

        let decision = h
            .engine
            .decide(request.id, ApprovalAction::Approve, &leader, Some("ok".to_string()), Utc::now())
            .unwrap();

        assert_eq!(decision.approval.status, ApprovalStatus::Approved);
        assert_eq!(decision.approval.approved_by, Some(leader.user_id));
        assert_eq!(decision.effect, Some(EffectOutcome::Applied));
        assert_eq!(h.entity_status(&request), EntityStatus::Approved);

        let trail = h.audit.entries_for(&request.id.to_string());
        let actions: Vec<_> = trail.iter().map(|e| e.action.as_str()).collect();
        assert_eq!(actions, vec![actions::APPROVAL_SUBMITTED, actions::APPROVAL_APPROVED]);
        assert_eq!(trail[1].details["from"], "PENDING");
        assert_eq!(trail[1].details["to"], "APPROVED");
    }

    #[test]
    fn second_approval_is_an_invalid_transition() {
        let h = harness();
        let request = h.requisition(agency("A1"), 10_000);
        let actor = admin();

        h.engine
            .decide(request.id, ApprovalAction::Approve, &actor, None, Utc::now())
            .unwrap();
        let err = h
            .engine
            .decide(request.id, ApprovalAction::Approve, &actor, None, Utc::now())
            .unwrap_err();

        assert!(matches!(
            err,
            EngineError::InvalidTransition {
                from: ApprovalStatus::Approved,
                to: ApprovalStatus::Approved
            }
        ));
    }

    #[test]
    fn cancelled_request_accepts_no_decision() {
        let h = harness();
        let request = h.requisition(agency("A1"), 10_000);
        let actor = admin();
        h.engine
            .decide(request.id, ApprovalAction::Cancel, &actor, None, Utc::now())
            .unwrap();
        assert_eq!(h.entity_status(&request), EntityStatus::Cancelled);

        for action in [ApprovalAction::Approve, ApprovalAction::Reject, ApprovalAction::Cancel] {
            let err = h.engine.decide(request.id, action, &actor, None, Utc::now()).unwrap_err();
            assert!(matches!(err, EngineError::InvalidTransition { from: ApprovalStatus::Cancelled, .. }));
        }
    }

    #[test]
    fn out_of_scope_actor_is_forbidden_without_mutation() {
        let h = harness();
        let request = h.requisition(agency("A2"), 10_000);
        let leader = Actor::new(UserId::new(), Role::AgencyLeader, agency("A1"));

        let err = h
            .engine
            .decide(request.id, ApprovalAction::Approve, &leader, None, Utc::now())
            .unwrap_err();

        assert!(matches!(err, EngineError::Forbidden));
        let stored = h.approvals.get(request.id).unwrap().unwrap();
        assert_eq!(stored.status, ApprovalStatus::Pending);
        assert_eq!(stored.version, 1);
        assert_eq!(h.audit.entries_for(&request.id.to_string()).len(), 1);
    }

    #[test]
    fn unknown_request_is_not_found() {
        let h = harness();
        let err = h
            .engine
            .decide(ApprovalRequestId::new(), ApprovalAction::Approve, &admin(), None, Utc::now())
            .unwrap_err();
        assert!(matches!(err, EngineError::NotFound));
    }

    #[test]
    fn audit_failure_reports_partial_failure_and_retry_is_idempotent() {
        let h = harness();
        let request = h.requisition(agency("A1"), 10_000);
        h.audit.set_failing(true);

        let err = h
            .engine
            .decide(request.id, ApprovalAction::Reject, &admin(), None, Utc::now())
            .unwrap_err();
        let EngineError::PartialFailure { approval, entry, .. } = err else {
            panic!("expected partial failure, got {err:?}");
        };
        assert_eq!(approval.status, ApprovalStatus::Rejected);
        assert_eq!(
            h.approvals.get(request.id).unwrap().unwrap().status,
            ApprovalStatus::Rejected
        );
        assert!(h.engine.retry_audit(&entry).is_err());

        h.audit.set_failing(false);
        h.engine.retry_audit(&entry).unwrap();
        h.engine.retry_audit(&entry).unwrap();

        let rejected: Vec<_> = h
            .audit
            .entries_for(&request.id.to_string())
            .into_iter()
            .filter(|e| e.action == actions::APPROVAL_REJECTED)
            .collect();
        assert_eq!(rejected.len(), 1);
    }

    #[test]
    fn side_effect_failure_does_not_undo_decision() {
        let h = harness();
        let request = h.requisition(agency("A1"), 10_000);
        h.entities.set_unavailable(true);

        let decision = h
            .engine
            .decide(request.id, ApprovalAction::Approve, &admin(), None, Utc::now())
            .unwrap();

        assert_eq!(decision.approval.status, ApprovalStatus::Approved);
        assert!(decision.effect.is_none());
        assert!(decision.effect_error.is_some());
        let trail = h.audit.entries_for(&request.id.to_string());
        assert!(trail[1].details["sideEffectError"].is_string());
    }

    #[test]
    fn unregistered_type_skips_side_effect() {
        let approvals = Arc::new(InMemoryApprovalStore::new());
        let engine = ApprovalWorkflowEngine::new(
            approvals,
            Arc::new(InMemoryWorkflowStore::new()),
            Arc::new(InMemoryAuditSink::new()),
            SideEffectRegistry::new(),
        );
        let transfer = FundTransfer::new("general", "missions", 900, UserId::new(), Utc::now());
        let request = engine
            .submit(
                ApprovalRequestDraft {
                    approval_type: ApprovalType::FundTransfer,
                    entity_id: transfer.id,
                    amount: transfer.amount,
                    scope: OrgScope::national(),
                    requested_by: transfer.requested_by,
                    comments: None,
                },
                Utc::now(),
            )
            .unwrap();

        let decision = engine
            .decide(request.id, ApprovalAction::Approve, &admin(), None, Utc::now())
            .unwrap();
        assert_eq!(decision.effect, Some(EffectOutcome::NoHandler));
    }

    #[test]
    fn submit_uses_matching_workflow_level() {
        let h = harness();
        h.workflows
            .put(
                ApprovalWorkflow::new(
                    "large requisitions",
                    "finance",
                    ApprovalType::Requisition,
                    Some(100_000),
                    ApprovalLevel::Agency,
                    Utc::now(),
                )
                .unwrap(),
            )
            .unwrap();

        let scope = OrgScope {
            agency_id: Some(AgencyId::new("A1").unwrap()),
            sub_district_id: Some(SubDistrictId::new("S1").unwrap()),
            ..OrgScope::default()
        };
        let small = h.requisition(scope.clone(), 5_000);
        let large = h.requisition(scope, 250_000);

        assert_eq!(small.approval_level, ApprovalLevel::SubDistrict);
        assert!(small.workflow_id.is_none());
        assert_eq!(large.approval_level, ApprovalLevel::Agency);
        assert!(large.workflow_id.is_some());
    }

    #[test]
    fn submit_rejects_missing_entity() {
        let h = harness();
        let err = h
            .engine
            .submit(
                ApprovalRequestDraft {
                    approval_type: ApprovalType::Requisition,
                    entity_id: shepherd_core::EntityId::new(),
                    amount: 100,
                    scope: agency("A1"),
                    requested_by: UserId::new(),
                    comments: None,
                },
                Utc::now(),
            )
            .unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
    }

    #[test]
    fn pending_for_is_scoped_and_newest_first() {
        let h = harness();
        let t0 = Utc::now();
        let a1_old = h.requisition_at(agency("A1"), 100, t0);
        let _a2 = h.requisition_at(agency("A2"), 100, t0 + chrono::Duration::seconds(1));
        let a1_new = h.requisition_at(agency("A1"), 100, t0 + chrono::Duration::seconds(2));

        let leader = Actor::new(UserId::new(), Role::AgencyLeader, agency("A1"));
        let visible = h.engine.pending_for(&leader).unwrap();
        let ids: Vec<_> = visible.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![a1_new.id, a1_old.id]);

        assert_eq!(h.engine.pending_for(&admin()).unwrap().len(), 3);

        let member = Actor::new(UserId::new(), Role::Member, OrgScope::national());
        assert!(h.engine.pending_for(&member).unwrap().is_empty());
        assert!(matches!(
            h.engine.get(a1_old.id, &member),
            Err(EngineError::Forbidden)
        ));
    }

    #[test]
    fn store_outage_is_dependency_unavailable() {
        let h = harness();
        let request = h.requisition(agency("A1"), 100);
        h.approvals.set_unavailable(true);
        let err = h
            .engine
            .decide(request.id, ApprovalAction::Approve, &admin(), None, Utc::now())
            .unwrap_err();
        assert!(matches!(err, EngineError::DependencyUnavailable(_)));
    }

    /// Serves one stale snapshot on the next read, as if another writer
    /// committed between this reader's load and its update.
    struct StaleReadStore {
        inner: InMemoryApprovalStore,
        stale: Mutex<Option<ApprovalRequest>>,
    }

    impl ApprovalStore for StaleReadStore {
        fn get(&self, id: ApprovalRequestId) -> Result<Option<ApprovalRequest>, StoreError> {
            if let Some(stale) = self.stale.lock().unwrap().take() {
                return Ok(Some(stale));
            }
            self.inner.get(id)
        }

        fn insert(&self, request: ApprovalRequest) -> Result<(), StoreError> {
            self.inner.insert(request)
        }

        fn update(&self, request: ApprovalRequest, expected: ExpectedVersion) -> Result<(), StoreError> {
            self.inner.update(request, expected)
        }

        fn list_by_status(&self, status: ApprovalStatus) -> Result<Vec<ApprovalRequest>, StoreError> {
            self.inner.list_by_status(status)
        }
    }

    #[test]
    fn losing_a_concurrent_decision_reports_invalid_transition() {
        let store = Arc::new(StaleReadStore {
            inner: InMemoryApprovalStore::new(),
            stale: Mutex::new(None),
        });
        let engine = ApprovalWorkflowEngine::new(
            store.clone(),
            Arc::new(InMemoryWorkflowStore::new()),
            Arc::new(InMemoryAuditSink::new()),
            SideEffectRegistry::new(),
        );
        let request = engine
            .submit(
                ApprovalRequestDraft {
                    approval_type: ApprovalType::Requisition,
                    entity_id: shepherd_core::EntityId::new(),
                    amount: 100,
                    scope: agency("A1"),
                    requested_by: UserId::new(),
                    comments: None,
                },
                Utc::now(),
            )
            .unwrap();

        engine
            .decide(request.id, ApprovalAction::Approve, &admin(), None, Utc::now())
            .unwrap();

        *store.stale.lock().unwrap() = Some(request.clone());
        let err = engine
            .decide(request.id, ApprovalAction::Reject, &admin(), None, Utc::now())
            .unwrap_err();

        assert!(matches!(
            err,
            EngineError::InvalidTransition {
                from: ApprovalStatus::Approved,
                to: ApprovalStatus::Rejected
            }
        ));
        let stored = store.inner.get(request.id).unwrap().unwrap();
        assert_eq!(stored.status, ApprovalStatus::Approved);
        assert_eq!(stored.version, 2);
    }

    fn action_strategy() -> impl Strategy<Value = ApprovalAction> {
        prop_oneof![
            Just(ApprovalAction::Approve),
            Just(ApprovalAction::Reject),
            Just(ApprovalAction::Cancel),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn decisions_follow_the_transition_table(actions in prop::collection::vec(action_strategy(), 1..6)) {
            let h = harness();
            let request = h.requisition(agency("A1"), 1_000);
            let actor = admin();
            let mut expected = ApprovalStatus::Pending;
            let mut version = 1;

            for action in actions {
                let allowed = expected.can_transition_to(action.target());
                let result = h.engine.decide(request.id, action, &actor, None, Utc::now());
                prop_assert_eq!(result.is_ok(), allowed);
                if allowed {
                    expected = action.target();
                    version += 1;
                }
            }

            let stored = h.approvals.get(request.id).unwrap().unwrap();
            prop_assert_eq!(stored.status, expected);
            prop_assert_eq!(stored.version, version);
        }
    }
}

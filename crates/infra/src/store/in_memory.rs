use std::collections::HashMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};

use uuid::Uuid;

use shepherd_approvals::{
    ApprovalRequest, ApprovalStatus, ApprovalType, ApprovalWorkflow, FundTransfer, Requisition,
};
use shepherd_auth::User;
use shepherd_core::{ApprovalRequestId, EntityId, ExpectedVersion, UserId, WorkflowId};

use super::r#trait::{
    ApprovalStore, CredentialStore, EntityStore, Session, StoreError, WorkflowStore,
};

/// Simulated outage switch shared by the in-memory stores.
#[derive(Debug, Default)]
struct Availability(AtomicBool);

impl Availability {
    fn set_unavailable(&self, down: bool) {
        self.0.store(down, Ordering::SeqCst);
    }

    fn ensure(&self) -> Result<(), StoreError> {
        if self.0.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable("store is offline".to_string()))
        } else {
            Ok(())
        }
    }
}

fn poisoned() -> StoreError {
    StoreError::Unavailable("lock poisoned".to_string())
}

// ─────────────────────────────────────────────────────────────────────────────
// Credentials
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct CredentialTables {
    users: HashMap<UserId, User>,
    emails: HashMap<String, UserId>,
    sessions: HashMap<Uuid, Session>,
}

/// In-memory users + sessions.
///
/// Intended for tests/dev. Not optimized for performance.
#[derive(Debug, Default)]
pub struct InMemoryCredentialStore {
    tables: RwLock<CredentialTables>,
    availability: Availability,
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail with `Unavailable` (or recover).
    pub fn set_unavailable(&self, down: bool) {
        self.availability.set_unavailable(down);
    }

    pub fn session_count(&self) -> usize {
        self.tables.read().map(|t| t.sessions.len()).unwrap_or(0)
    }
}

impl CredentialStore for InMemoryCredentialStore {
    fn get_user(&self, id: UserId) -> Result<Option<User>, StoreError> {
        self.availability.ensure()?;
        let tables = self.tables.read().map_err(|_| poisoned())?;
        Ok(tables.users.get(&id).cloned())
    }

    fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        self.availability.ensure()?;
        let tables = self.tables.read().map_err(|_| poisoned())?;
        Ok(tables
            .emails
            .get(email)
            .and_then(|id| tables.users.get(id))
            .cloned())
    }

    fn insert_user(&self, user: User) -> Result<(), StoreError> {
        self.availability.ensure()?;
        let mut tables = self.tables.write().map_err(|_| poisoned())?;
        if tables.emails.contains_key(&user.email) {
            return Err(StoreError::Duplicate(format!("email {}", user.email)));
        }
        if tables.users.contains_key(&user.id) {
            return Err(StoreError::Duplicate(format!("user {}", user.id)));
        }
        tables.emails.insert(user.email.clone(), user.id);
        tables.users.insert(user.id, user);
        Ok(())
    }

    fn update_user(&self, user: User) -> Result<(), StoreError> {
        self.availability.ensure()?;
        let mut tables = self.tables.write().map_err(|_| poisoned())?;
        let Some(existing) = tables.users.get(&user.id) else {
            return Err(StoreError::NotFound);
        };
        if existing.email != user.email {
            if tables.emails.contains_key(&user.email) {
                return Err(StoreError::Duplicate(format!("email {}", user.email)));
            }
            let old = existing.email.clone();
            tables.emails.remove(&old);
            tables.emails.insert(user.email.clone(), user.id);
        }
        tables.users.insert(user.id, user);
        Ok(())
    }

    fn put_session(&self, session: Session) -> Result<(), StoreError> {
        self.availability.ensure()?;
        let mut tables = self.tables.write().map_err(|_| poisoned())?;
        tables.sessions.insert(session.token, session);
        Ok(())
    }

    fn get_session(&self, token: Uuid) -> Result<Option<Session>, StoreError> {
        self.availability.ensure()?;
        let tables = self.tables.read().map_err(|_| poisoned())?;
        Ok(tables.sessions.get(&token).cloned())
    }

    fn delete_session(&self, token: Uuid) -> Result<bool, StoreError> {
        self.availability.ensure()?;
        let mut tables = self.tables.write().map_err(|_| poisoned())?;
        Ok(tables.sessions.remove(&token).is_some())
    }

    fn delete_user_sessions(&self, user_id: UserId) -> Result<usize, StoreError> {
        self.availability.ensure()?;
        let mut tables = self.tables.write().map_err(|_| poisoned())?;
        let before = tables.sessions.len();
        tables.sessions.retain(|_, s| s.user_id != user_id);
        Ok(before - tables.sessions.len())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Approvals
// ─────────────────────────────────────────────────────────────────────────────

/// In-memory approval requests with version-checked updates.
#[derive(Debug, Default)]
pub struct InMemoryApprovalStore {
    requests: RwLock<HashMap<ApprovalRequestId, ApprovalRequest>>,
    availability: Availability,
}

impl InMemoryApprovalStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_unavailable(&self, down: bool) {
        self.availability.set_unavailable(down);
    }
}

impl ApprovalStore for InMemoryApprovalStore {
    fn get(&self, id: ApprovalRequestId) -> Result<Option<ApprovalRequest>, StoreError> {
        self.availability.ensure()?;
        let requests = self.requests.read().map_err(|_| poisoned())?;
        Ok(requests.get(&id).cloned())
    }

    fn insert(&self, request: ApprovalRequest) -> Result<(), StoreError> {
        self.availability.ensure()?;
        let mut requests = self.requests.write().map_err(|_| poisoned())?;
        if requests.contains_key(&request.id) {
            return Err(StoreError::Duplicate(format!("approval request {}", request.id)));
        }
        requests.insert(request.id, request);
        Ok(())
    }

    fn update(&self, request: ApprovalRequest, expected: ExpectedVersion) -> Result<(), StoreError> {
        self.availability.ensure()?;
        let mut requests = self.requests.write().map_err(|_| poisoned())?;
        let Some(current) = requests.get(&request.id) else {
            return Err(StoreError::NotFound);
        };
        expected
            .check(current.version)
            .map_err(|e| StoreError::Conflict(e.to_string()))?;
        requests.insert(request.id, request);
        Ok(())
    }

    fn list_by_status(&self, status: ApprovalStatus) -> Result<Vec<ApprovalRequest>, StoreError> {
        self.availability.ensure()?;
        let requests = self.requests.read().map_err(|_| poisoned())?;
        let mut matching: Vec<_> = requests
            .values()
            .filter(|r| r.status == status)
            .cloned()
            .collect();
        matching.sort_by_key(|r| r.created_at);
        Ok(matching)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Workflows
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct InMemoryWorkflowStore {
    workflows: RwLock<HashMap<WorkflowId, ApprovalWorkflow>>,
    availability: Availability,
}

impl InMemoryWorkflowStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_unavailable(&self, down: bool) {
        self.availability.set_unavailable(down);
    }
}

impl WorkflowStore for InMemoryWorkflowStore {
    fn list_for_type(&self, approval_type: ApprovalType) -> Result<Vec<ApprovalWorkflow>, StoreError> {
        self.availability.ensure()?;
        let workflows = self.workflows.read().map_err(|_| poisoned())?;
        Ok(workflows
            .values()
            .filter(|w| w.approval_type == approval_type)
            .cloned()
            .collect())
    }

    fn put(&self, workflow: ApprovalWorkflow) -> Result<(), StoreError> {
        self.availability.ensure()?;
        let mut workflows = self.workflows.write().map_err(|_| poisoned())?;
        workflows.insert(workflow.id, workflow);
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Linked entities
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct InMemoryEntityStore {
    requisitions: RwLock<HashMap<EntityId, Requisition>>,
    fund_transfers: RwLock<HashMap<EntityId, FundTransfer>>,
    availability: Availability,
}

impl InMemoryEntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_unavailable(&self, down: bool) {
        self.availability.set_unavailable(down);
    }
}

impl EntityStore for InMemoryEntityStore {
    fn get_requisition(&self, id: EntityId) -> Result<Option<Requisition>, StoreError> {
        self.availability.ensure()?;
        let requisitions = self.requisitions.read().map_err(|_| poisoned())?;
        Ok(requisitions.get(&id).cloned())
    }

    fn put_requisition(&self, requisition: Requisition) -> Result<(), StoreError> {
        self.availability.ensure()?;
        let mut requisitions = self.requisitions.write().map_err(|_| poisoned())?;
        requisitions.insert(requisition.id, requisition);
        Ok(())
    }

    fn get_fund_transfer(&self, id: EntityId) -> Result<Option<FundTransfer>, StoreError> {
        self.availability.ensure()?;
        let transfers = self.fund_transfers.read().map_err(|_| poisoned())?;
        Ok(transfers.get(&id).cloned())
    }

    fn put_fund_transfer(&self, transfer: FundTransfer) -> Result<(), StoreError> {
        self.availability.ensure()?;
        let mut transfers = self.fund_transfers.write().map_err(|_| poisoned())?;
        transfers.insert(transfer.id, transfer);
        Ok(())
    }
}

//! Append-only audit log boundary.
//!
//! Entries are idempotent on `(entity_id, created_at, action)`: appending the
//! same entry twice stores it once, so a caller may retry a failed append
//! without duplicating history.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use shepherd_core::{AuditEntryId, UserId};

use crate::store::StoreError;

/// Audit action names.
pub mod actions {
    pub const APPROVAL_SUBMITTED: &str = "APPROVAL_SUBMITTED";
    pub const APPROVAL_APPROVED: &str = "APPROVAL_APPROVED";
    pub const APPROVAL_REJECTED: &str = "APPROVAL_REJECTED";
    pub const APPROVAL_CANCELLED: &str = "APPROVAL_CANCELLED";
    pub const USER_SIGNUP: &str = "USER_SIGNUP";
    pub const USER_LOGIN: &str = "USER_LOGIN";
    pub const PASSWORD_CHANGED: &str = "PASSWORD_CHANGED";
    pub const USER_STATUS_CHANGED: &str = "USER_STATUS_CHANGED";
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditLogEntry {
    pub id: AuditEntryId,
    pub action: String,
    pub entity_type: String,
    pub entity_id: String,
    pub user_id: Option<UserId>,
    pub details: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl AuditLogEntry {
    pub fn new(
        action: &str,
        entity_type: &str,
        entity_id: impl ToString,
        user_id: Option<UserId>,
        details: serde_json::Value,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: AuditEntryId::new(),
            action: action.to_string(),
            entity_type: entity_type.to_string(),
            entity_id: entity_id.to_string(),
            user_id,
            details,
            created_at,
        }
    }

    /// Idempotency key.
    pub fn key(&self) -> (String, DateTime<Utc>, String) {
        (self.entity_id.clone(), self.created_at, self.action.clone())
    }
}

pub trait AuditSink: Send + Sync {
    /// Append an entry; re-appending an entry with the same key is a no-op.
    fn append(&self, entry: &AuditLogEntry) -> Result<(), StoreError>;
}

impl<S> AuditSink for Arc<S>
where
    S: AuditSink + ?Sized,
{
    fn append(&self, entry: &AuditLogEntry) -> Result<(), StoreError> {
        (**self).append(entry)
    }
}

#[derive(Debug, Default)]
struct AuditLog {
    entries: Vec<AuditLogEntry>,
    keys: HashSet<(String, DateTime<Utc>, String)>,
}

/// In-memory audit log with a failure switch for tests.
#[derive(Debug, Default)]
pub struct InMemoryAuditSink {
    log: RwLock<AuditLog>,
    failing: AtomicBool,
}

impl InMemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make appends fail with `Unavailable` until switched back.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn entries(&self) -> Vec<AuditLogEntry> {
        self.log
            .read()
            .map(|log| log.entries.clone())
            .unwrap_or_default()
    }

    pub fn entries_for(&self, entity_id: &str) -> Vec<AuditLogEntry> {
        self.entries()
            .into_iter()
            .filter(|e| e.entity_id == entity_id)
            .collect()
    }
}

impl AuditSink for InMemoryAuditSink {
    fn append(&self, entry: &AuditLogEntry) -> Result<(), StoreError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("audit log is offline".to_string()));
        }
        let mut log = self
            .log
            .write()
            .map_err(|_| StoreError::Unavailable("lock poisoned".to_string()))?;
        if log.keys.insert(entry.key()) {
            log.entries.push(entry.clone());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn duplicate_key_is_stored_once() {
        let sink = InMemoryAuditSink::new();
        let entry = AuditLogEntry::new(
            actions::APPROVAL_APPROVED,
            "approval_request",
            "req-1",
            Some(UserId::new()),
            json!({ "from": "PENDING", "to": "APPROVED" }),
            Utc::now(),
        );

        sink.append(&entry).unwrap();
        sink.append(&entry).unwrap();
        assert_eq!(sink.entries().len(), 1);
        assert_eq!(sink.entries_for("req-1").len(), 1);
    }

    #[test]
    fn failing_sink_rejects_appends() {
        let sink = InMemoryAuditSink::new();
        sink.set_failing(true);
        let entry = AuditLogEntry::new("X", "t", "e", None, json!({}), Utc::now());
        assert!(matches!(sink.append(&entry), Err(StoreError::Unavailable(_))));
        assert!(sink.entries().is_empty());
    }
}

//! Who may act on an approval request.
//!
//! - No IO
//! - No panics
//! - Fails closed: a missing scope id on either side is a non-match

use serde::Serialize;

use shepherd_auth::{Actor, Role, ScopeLevel};

use crate::ApprovalRequest;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DenialKind {
    /// The role may not decide approvals at all.
    RoleNotPermitted,
    /// The actor's role is scoped but the actor carries no id for that scope.
    ActorScopeMissing,
    /// The request carries no id at the actor's scope level.
    RequestScopeMissing,
    /// Both ids are present and differ.
    ScopeMismatch,
}

/// Outcome of an authorization check with the reason for a denial.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthorizationDecision {
    pub granted: bool,
    pub role: Role,
    pub scope_level: Option<ScopeLevel>,
    pub denial: Option<DenialKind>,
}

impl AuthorizationDecision {
    fn grant(role: Role, scope_level: Option<ScopeLevel>) -> Self {
        Self {
            granted: true,
            role,
            scope_level,
            denial: None,
        }
    }

    fn deny(role: Role, scope_level: Option<ScopeLevel>, kind: DenialKind) -> Self {
        Self {
            granted: false,
            role,
            scope_level,
            denial: Some(kind),
        }
    }
}

/// Role- and scope-aware approval authorizer.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApprovalAuthorizer;

impl ApprovalAuthorizer {
    pub fn new() -> Self {
        Self
    }

    pub fn can_act(&self, actor: &Actor, request: &ApprovalRequest) -> bool {
        self.explain(actor, request).granted
    }

    /// Deciders see what they may act on; requesters always see their own requests.
    pub fn can_view(&self, actor: &Actor, request: &ApprovalRequest) -> bool {
        request.requested_by == actor.user_id || self.can_act(actor, request)
    }

    pub fn explain(&self, actor: &Actor, request: &ApprovalRequest) -> AuthorizationDecision {
        let role = actor.role;
        if !role.is_approver() {
            return AuthorizationDecision::deny(role, None, DenialKind::RoleNotPermitted);
        }

        let Some(level) = role.required_scope() else {
            // ADMIN / GCC: national level, scope-unrestricted.
            return AuthorizationDecision::grant(role, None);
        };

        if !actor.scope.has(level) {
            return AuthorizationDecision::deny(role, Some(level), DenialKind::ActorScopeMissing);
        }
        if !request.scope.has(level) {
            return AuthorizationDecision::deny(role, Some(level), DenialKind::RequestScopeMissing);
        }
        if !actor.scope.matches_at(&request.scope, level) {
            return AuthorizationDecision::deny(role, Some(level), DenialKind::ScopeMismatch);
        }

        AuthorizationDecision::grant(role, Some(level))
    }
}

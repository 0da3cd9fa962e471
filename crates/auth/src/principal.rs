use serde::{Deserialize, Serialize};

use shepherd_core::{AgencyId, DistrictId, DomainError, SubDistrictId, UserId};

use crate::{Role, ScopeLevel};

/// Organizational scope ids carried by users and approval requests.
///
/// Every id is optional; which ones are meaningful depends on the role (for
/// users) or the approval level (for requests).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrgScope {
    pub agency_id: Option<AgencyId>,
    pub district_id: Option<DistrictId>,
    pub sub_district_id: Option<SubDistrictId>,
}

impl OrgScope {
    pub fn national() -> Self {
        Self::default()
    }

    pub fn agency(id: AgencyId) -> Self {
        Self {
            agency_id: Some(id),
            ..Self::default()
        }
    }

    pub fn district(id: DistrictId) -> Self {
        Self {
            district_id: Some(id),
            ..Self::default()
        }
    }

    pub fn sub_district(id: SubDistrictId) -> Self {
        Self {
            sub_district_id: Some(id),
            ..Self::default()
        }
    }

    pub fn has(&self, level: ScopeLevel) -> bool {
        match level {
            ScopeLevel::Agency => self.agency_id.is_some(),
            ScopeLevel::District => self.district_id.is_some(),
            ScopeLevel::SubDistrict => self.sub_district_id.is_some(),
        }
    }

    /// Exact match of the ids at `level`. A missing id on either side never matches.
    pub fn matches_at(&self, other: &OrgScope, level: ScopeLevel) -> bool {
        match level {
            ScopeLevel::Agency => same(&self.agency_id, &other.agency_id),
            ScopeLevel::District => same(&self.district_id, &other.district_id),
            ScopeLevel::SubDistrict => same(&self.sub_district_id, &other.sub_district_id),
        }
    }

    /// Most specific tier populated in this scope.
    pub fn most_specific(&self) -> Option<ScopeLevel> {
        if self.sub_district_id.is_some() {
            Some(ScopeLevel::SubDistrict)
        } else if self.district_id.is_some() {
            Some(ScopeLevel::District)
        } else if self.agency_id.is_some() {
            Some(ScopeLevel::Agency)
        } else {
            None
        }
    }
}

fn same<T: PartialEq>(a: &Option<T>, b: &Option<T>) -> bool {
    matches!((a, b), (Some(x), Some(y)) if x == y)
}

/// The authenticated party performing an action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Actor {
    pub user_id: UserId,
    pub role: Role,
    pub scope: OrgScope,
}

impl Actor {
    pub fn new(user_id: UserId, role: Role, scope: OrgScope) -> Self {
        Self {
            user_id,
            role,
            scope,
        }
    }

    /// Check that a scoped role carries the id it needs.
    pub fn ensure_scope_populated(&self) -> Result<(), DomainError> {
        ensure_role_scope(self.role, &self.scope)
    }
}

pub(crate) fn ensure_role_scope(role: Role, scope: &OrgScope) -> Result<(), DomainError> {
    match role.required_scope() {
        Some(level) if !scope.has(level) => Err(DomainError::validation(format!(
            "role {role} requires a {level:?} scope id"
        ))),
        _ => Ok(()),
    }
}

use core::str::FromStr;

use serde::{Deserialize, Serialize};

use shepherd_core::DomainError;

/// Role of a user within the organizational hierarchy.
///
/// Roles form a closed set; every dispatch on a role is an exhaustive `match`
/// so that adding a role is a compile-checked change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Member,
    Admin,
    AgencyLeader,
    /// District coordinating committee.
    Dcc,
    /// Local (sub-district) coordinating committee.
    Lcc,
    /// General (national) coordinating committee.
    Gcc,
    BankOperator,
}

/// Organizational tier a scoped role is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScopeLevel {
    Agency,
    District,
    SubDistrict,
}

impl Role {
    pub const ALL: [Role; 7] = [
        Role::Member,
        Role::Admin,
        Role::AgencyLeader,
        Role::Dcc,
        Role::Lcc,
        Role::Gcc,
        Role::BankOperator,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Member => "MEMBER",
            Role::Admin => "ADMIN",
            Role::AgencyLeader => "AGENCY_LEADER",
            Role::Dcc => "DCC",
            Role::Lcc => "LCC",
            Role::Gcc => "GCC",
            Role::BankOperator => "BANK_OPERATOR",
        }
    }

    /// Scope id a user holding this role must carry, if any.
    pub fn required_scope(&self) -> Option<ScopeLevel> {
        match self {
            Role::AgencyLeader => Some(ScopeLevel::Agency),
            Role::Dcc => Some(ScopeLevel::District),
            Role::Lcc => Some(ScopeLevel::SubDistrict),
            Role::Member | Role::Admin | Role::Gcc | Role::BankOperator => None,
        }
    }

    /// Whether the role may decide approval requests at all (scope aside).
    pub fn is_approver(&self) -> bool {
        match self {
            Role::Admin | Role::Gcc | Role::Dcc | Role::AgencyLeader | Role::Lcc => true,
            Role::Member | Role::BankOperator => false,
        }
    }

    /// Roles that are not bound to any organizational unit (national level).
    pub fn is_national(&self) -> bool {
        matches!(self, Role::Admin | Role::Gcc)
    }

    /// Roles a user may pick for themselves at signup.
    ///
    /// Approver roles carry authority over other people's requests and are
    /// provisioned by an administrator.
    pub fn is_self_assignable(&self) -> bool {
        match self {
            Role::Member | Role::BankOperator => true,
            Role::Admin | Role::Gcc | Role::Dcc | Role::AgencyLeader | Role::Lcc => false,
        }
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase().replace('-', "_");
        Role::ALL
            .into_iter()
            .find(|r| r.as_str() == normalized)
            .ok_or_else(|| DomainError::validation(format!("unknown role '{s}'")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_wire_names_case_insensitively() {
        assert_eq!("agency_leader".parse::<Role>().unwrap(), Role::AgencyLeader);
        assert_eq!("Bank-Operator".parse::<Role>().unwrap(), Role::BankOperator);
        assert!("pastor".parse::<Role>().is_err());
    }

    #[test]
    fn serde_uses_screaming_snake_case() {
        let json = serde_json::to_string(&Role::AgencyLeader).unwrap();
        assert_eq!(json, "\"AGENCY_LEADER\"");
        let role: Role = serde_json::from_str("\"LCC\"").unwrap();
        assert_eq!(role, Role::Lcc);
    }

    #[test]
    fn scoped_roles_declare_their_tier() {
        assert_eq!(Role::AgencyLeader.required_scope(), Some(ScopeLevel::Agency));
        assert_eq!(Role::Dcc.required_scope(), Some(ScopeLevel::District));
        assert_eq!(Role::Lcc.required_scope(), Some(ScopeLevel::SubDistrict));
        assert_eq!(Role::Gcc.required_scope(), None);
    }

    #[test]
    fn approvers_are_exactly_the_five_committee_roles() {
        let approvers: Vec<Role> = Role::ALL.into_iter().filter(Role::is_approver).collect();
        assert_eq!(
            approvers,
            vec![Role::Admin, Role::AgencyLeader, Role::Dcc, Role::Lcc, Role::Gcc]
        );
    }
}

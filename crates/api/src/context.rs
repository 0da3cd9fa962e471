use shepherd_auth::{Actor, User};
use shepherd_core::UserId;

/// Authenticated user for a request.
///
/// Inserted by `auth_middleware` after the access token verified and the
/// account was found active. Scope ids come from the stored user, never from
/// the token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrincipalContext {
    user: User,
}

impl PrincipalContext {
    pub fn new(user: User) -> Self {
        Self { user }
    }

    pub fn user_id(&self) -> UserId {
        self.user.id
    }

    pub fn user(&self) -> &User {
        &self.user
    }

    pub fn actor(&self) -> Actor {
        self.user.actor()
    }
}

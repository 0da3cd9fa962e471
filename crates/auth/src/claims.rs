use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use shepherd_core::UserId;

use crate::Role;

/// Kind of bearer token. Each kind carries its own audience and `typ` claim so
/// a token of one kind is never accepted where the other is expected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

impl TokenKind {
    pub fn typ(&self) -> &'static str {
        match self {
            TokenKind::Access => "access",
            TokenKind::Refresh => "refresh",
        }
    }

    pub fn audience(&self) -> &'static str {
        match self {
            TokenKind::Access => "shepherd-api",
            TokenKind::Refresh => "shepherd-refresh",
        }
    }
}

/// Claims of a short-lived access token.
///
/// Tokens are signed, not encrypted: nothing secret goes in here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessClaims {
    pub sub: UserId,
    pub email: String,
    pub role: Role,
    pub iat: i64,
    pub exp: i64,
    pub iss: String,
    pub aud: String,
    pub typ: String,
    pub jti: Uuid,
}

/// Claims of a long-lived refresh token. `jti` doubles as the session token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshClaims {
    pub sub: UserId,
    pub iat: i64,
    pub exp: i64,
    pub iss: String,
    pub aud: String,
    pub typ: String,
    pub jti: Uuid,
}

impl AccessClaims {
    pub fn issued_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.iat, 0)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenValidationError {
    #[error("token has expired")]
    Expired,

    #[error("token not yet valid (issued_at is in the future)")]
    NotYetValid,

    #[error("invalid token time window (exp <= iat)")]
    InvalidTimeWindow,
}

/// Check `iat`/`exp` (unix seconds) against `now` with a bounded clock-skew `leeway`.
pub fn validate_time_window(
    iat: i64,
    exp: i64,
    now: DateTime<Utc>,
    leeway: Duration,
) -> Result<(), TokenValidationError> {
    if exp <= iat {
        return Err(TokenValidationError::InvalidTimeWindow);
    }
    let now = now.timestamp();
    let leeway = leeway.num_seconds().max(0);
    if now + leeway < iat {
        return Err(TokenValidationError::NotYetValid);
    }
    if now >= exp + leeway {
        return Err(TokenValidationError::Expired);
    }
    Ok(())
}

//! `shepherd-auth`: credential and session security primitives.
//!
//! This crate is intentionally decoupled from HTTP and storage: password
//! hashing, strength scoring, rate-limit policy and token issuance are pure
//! functions over their inputs plus an injected clock value (`now`).

pub mod claims;
pub mod password;
pub mod principal;
pub mod rate_limit;
pub mod roles;
pub mod strength;
pub mod tokens;
pub mod user;

pub use claims::{AccessClaims, RefreshClaims, TokenKind, TokenValidationError, validate_time_window};
pub use password::{HashAlgorithm, HasherParams, PasswordError, PasswordHasher};
pub use principal::{Actor, OrgScope};
pub use rate_limit::{
    AttemptRecord, InMemoryRateLimitStore, RateLimitPolicy, RateLimitStore, RateLimited,
    RateLimiter,
};
pub use roles::{Role, ScopeLevel};
pub use strength::{Strength, StrengthChecks, StrengthReport, check_strength};
pub use tokens::{IssuedTokens, TokenConfig, TokenError, TokenManager, TokenPair, VerifiedClaims};
pub use user::{User, UserProfile, UserStatus, normalize_email};

//! Process configuration read from the environment.
//!
//! | var | default |
//! |---|---|
//! | `SHEPHERD_BIND_ADDR` | `0.0.0.0:8080` |
//! | `SHEPHERD_ENV` | `development` |
//! | `SHEPHERD_TRUST_PROXY` | `false` |
//! | `JWT_SECRET` | `dev-secret` (rejected in production) |
//! | `JWT_ISSUER` | `shepherd` |
//! | `ACCESS_TOKEN_TTL_SECS` | `900` |
//! | `REFRESH_TOKEN_TTL_SECS` | `604800` |
//! | `TOKEN_LEEWAY_SECS` | `30` |
//! | `RATE_LIMIT_MAX_ATTEMPTS` | `5` |
//! | `RATE_LIMIT_WINDOW_SECS` | `900` |
//! | `PASSWORD_HASH_ALGORITHM` | `argon2` |
//! | `SHEPHERD_ADMIN_EMAIL` | unset |
//! | `SHEPHERD_ADMIN_PASSWORD` | unset |
//!
//! When both admin variables are set an `ADMIN` account is provisioned at
//! startup unless the email is already registered.

use std::net::SocketAddr;

use chrono::Duration;
use thiserror::Error;

use shepherd_auth::{HashAlgorithm, HasherParams, PasswordHasher, RateLimitPolicy, TokenConfig};

pub const DEV_JWT_SECRET: &str = "dev-secret";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var} has an invalid value '{value}': {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },

    #[error("JWT_SECRET must be set to a non-default value in production")]
    InsecureSecret,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: SocketAddr,
    pub environment: Environment,
    /// Take the client address from `X-Forwarded-For` (behind a trusted proxy only).
    pub trust_proxy: bool,
    pub jwt_secret: String,
    pub jwt_issuer: String,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
    pub token_leeway: Duration,
    pub rate_limit: RateLimitPolicy,
    pub hash_algorithm: HashAlgorithm,
    /// Hashing cost parameters; tests swap in cheap ones.
    pub hasher_params: HasherParams,
    pub bootstrap_admin: Option<AdminCredentials>,
}

/// Initial administrator account.
#[derive(Clone)]
pub struct AdminCredentials {
    pub email: String,
    pub password: String,
}

impl core::fmt::Debug for AdminCredentials {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AdminCredentials")
            .field("email", &self.email)
            .finish_non_exhaustive()
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let environment = match lookup("SHEPHERD_ENV").as_deref().map(str::trim) {
            None | Some("") | Some("development") | Some("dev") | Some("test") => {
                Environment::Development
            }
            Some("production") | Some("prod") => Environment::Production,
            Some(other) => {
                return Err(invalid("SHEPHERD_ENV", other, "expected development or production"));
            }
        };

        let jwt_secret = match lookup("JWT_SECRET").filter(|s| !s.trim().is_empty()) {
            Some(secret) => secret,
            None => DEV_JWT_SECRET.to_string(),
        };
        if environment == Environment::Production && jwt_secret == DEV_JWT_SECRET {
            return Err(ConfigError::InsecureSecret);
        }

        let bind_addr = parse_or(&lookup, "SHEPHERD_BIND_ADDR", SocketAddr::from(([0, 0, 0, 0], 8080)))?;
        let trust_proxy = parse_or(&lookup, "SHEPHERD_TRUST_PROXY", false)?;

        let access_ttl = seconds(&lookup, "ACCESS_TOKEN_TTL_SECS", 900)?;
        let refresh_ttl = seconds(&lookup, "REFRESH_TOKEN_TTL_SECS", 604_800)?;
        let token_leeway = seconds(&lookup, "TOKEN_LEEWAY_SECS", 30)?;
        let window = seconds(&lookup, "RATE_LIMIT_WINDOW_SECS", 900)?;
        let max_attempts = parse_or(&lookup, "RATE_LIMIT_MAX_ATTEMPTS", 5u32)?;
        if max_attempts == 0 {
            return Err(invalid("RATE_LIMIT_MAX_ATTEMPTS", "0", "must be at least 1"));
        }

        let hash_algorithm = match lookup("PASSWORD_HASH_ALGORITHM") {
            Some(value) => value
                .parse::<HashAlgorithm>()
                .map_err(|e| invalid("PASSWORD_HASH_ALGORITHM", &value, &e.to_string()))?,
            None => HashAlgorithm::Argon2,
        };

        let non_empty = |var: &str| lookup(var).filter(|s| !s.trim().is_empty());
        let bootstrap_admin = match (non_empty("SHEPHERD_ADMIN_EMAIL"), non_empty("SHEPHERD_ADMIN_PASSWORD")) {
            (Some(email), Some(password)) => Some(AdminCredentials { email, password }),
            (None, None) => None,
            (Some(_), None) => {
                return Err(invalid("SHEPHERD_ADMIN_PASSWORD", "", "required with SHEPHERD_ADMIN_EMAIL"));
            }
            (None, Some(_)) => {
                return Err(invalid("SHEPHERD_ADMIN_EMAIL", "", "required with SHEPHERD_ADMIN_PASSWORD"));
            }
        };

        Ok(Self {
            bind_addr,
            environment,
            trust_proxy,
            jwt_secret,
            jwt_issuer: lookup("JWT_ISSUER")
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| "shepherd".to_string()),
            access_ttl,
            refresh_ttl,
            token_leeway,
            rate_limit: RateLimitPolicy {
                max_attempts,
                window,
            },
            hash_algorithm,
            hasher_params: HasherParams::default(),
            bootstrap_admin,
        })
    }

    /// Development defaults with the given secret (tests and local runs).
    pub fn for_secret(secret: &str) -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            environment: Environment::Development,
            trust_proxy: false,
            jwt_secret: secret.to_string(),
            jwt_issuer: "shepherd".to_string(),
            access_ttl: Duration::seconds(900),
            refresh_ttl: Duration::seconds(604_800),
            token_leeway: Duration::seconds(30),
            rate_limit: RateLimitPolicy::default(),
            hash_algorithm: HashAlgorithm::Argon2,
            hasher_params: HasherParams::default(),
            bootstrap_admin: None,
        }
    }

    pub fn uses_dev_secret(&self) -> bool {
        self.jwt_secret == DEV_JWT_SECRET
    }

    pub fn token_config(&self) -> TokenConfig {
        let mut tokens = TokenConfig::new(self.jwt_secret.as_bytes().to_vec());
        tokens.issuer = self.jwt_issuer.clone();
        tokens.access_ttl = self.access_ttl;
        tokens.refresh_ttl = self.refresh_ttl;
        tokens.leeway = self.token_leeway;
        tokens
    }

    pub fn password_hasher(&self) -> PasswordHasher {
        PasswordHasher::with_params(self.hash_algorithm, self.hasher_params)
    }
}

fn invalid(var: &'static str, value: &str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        var,
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn parse_or<F, T>(lookup: &F, var: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: core::str::FromStr,
    T::Err: core::fmt::Display,
{
    match lookup(var) {
        Some(value) => value
            .trim()
            .parse::<T>()
            .map_err(|e| invalid(var, &value, &e.to_string())),
        None => Ok(default),
    }
}

fn seconds<F>(lookup: &F, var: &'static str, default: i64) -> Result<Duration, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let secs = parse_or(lookup, var, default)?;
    if secs < 0 {
        return Err(invalid(var, &secs.to_string(), "must not be negative"));
    }
    Ok(Duration::seconds(secs))
}

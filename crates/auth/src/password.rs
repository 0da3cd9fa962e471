//! Password hashing with two interchangeable algorithms.
//!
//! Stored hashes are self-describing: Argon2 hashes are PHC strings starting
//! with `$argon2id$` (or `$argon2i$` / `$argon2d$`), bcrypt hashes use the
//! modular-crypt `$2b$NN$...` layout. `detect_algorithm` reads those markers so
//! hashes created under one algorithm stay verifiable after the configured
//! default changes; `needs_rehash` drives the online migration on login.

use core::str::FromStr;

use argon2::{
    Algorithm as Argon2Variant, Argon2, Params, Version,
    password_hash::{PasswordHash, PasswordHasher as _, PasswordVerifier, SaltString},
};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PasswordError {
    #[error("password hashing failed: {0}")]
    Hashing(String),

    #[error("unknown hash algorithm '{0}'")]
    UnknownAlgorithm(String),
}

/// Supported hashing algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    /// Argon2id, memory-hard. Preferred default.
    Argon2,
    Bcrypt,
}

impl HashAlgorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            HashAlgorithm::Argon2 => "argon2",
            HashAlgorithm::Bcrypt => "bcrypt",
        }
    }
}

impl core::fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HashAlgorithm {
    type Err = PasswordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "argon2" | "argon2id" => Ok(HashAlgorithm::Argon2),
            "bcrypt" => Ok(HashAlgorithm::Bcrypt),
            other => Err(PasswordError::UnknownAlgorithm(other.to_string())),
        }
    }
}

/// Cost parameters used when producing new hashes.
///
/// Verification always uses the parameters embedded in the stored hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HasherParams {
    pub argon2_memory_kib: u32,
    pub argon2_iterations: u32,
    pub argon2_parallelism: u32,
    pub bcrypt_cost: u32,
}

impl Default for HasherParams {
    fn default() -> Self {
        Self {
            argon2_memory_kib: 19_456,
            argon2_iterations: 2,
            argon2_parallelism: 1,
            bcrypt_cost: bcrypt::DEFAULT_COST,
        }
    }
}

impl HasherParams {
    /// Minimal-cost parameters for tests and local development.
    pub fn fast() -> Self {
        Self {
            argon2_memory_kib: 1_024,
            argon2_iterations: 1,
            argon2_parallelism: 1,
            bcrypt_cost: 4,
        }
    }
}

/// Stateless password hasher.
///
/// Holds only configuration, so a single instance can be shared across threads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PasswordHasher {
    default_algorithm: HashAlgorithm,
    params: HasherParams,
}

impl PasswordHasher {
    pub fn new(default_algorithm: HashAlgorithm) -> Self {
        Self::with_params(default_algorithm, HasherParams::default())
    }

    pub fn with_params(default_algorithm: HashAlgorithm, params: HasherParams) -> Self {
        Self {
            default_algorithm,
            params,
        }
    }

    pub fn default_algorithm(&self) -> HashAlgorithm {
        self.default_algorithm
    }

    /// Hash with the configured default algorithm.
    pub fn hash_default(&self, password: &str) -> Result<String, PasswordError> {
        self.hash(password, self.default_algorithm)
    }

    pub fn hash(&self, password: &str, algorithm: HashAlgorithm) -> Result<String, PasswordError> {
        match algorithm {
            HashAlgorithm::Argon2 => self.hash_argon2(password),
            HashAlgorithm::Bcrypt => bcrypt::hash(password, self.params.bcrypt_cost)
                .map_err(|e| PasswordError::Hashing(e.to_string())),
        }
    }

    /// Verify `password` against `hash` produced by `algorithm`.
    ///
    /// Returns `false` (never an error) when the hash is malformed or was not
    /// produced by `algorithm`.
    pub fn verify(&self, password: &str, hash: &str, algorithm: HashAlgorithm) -> bool {
        if detect_algorithm(hash) != Some(algorithm) {
            return false;
        }

        match algorithm {
            HashAlgorithm::Argon2 => match PasswordHash::new(hash) {
                Ok(parsed) => Argon2::default()
                    .verify_password(password.as_bytes(), &parsed)
                    .is_ok(),
                Err(_) => false,
            },
            HashAlgorithm::Bcrypt => bcrypt::verify(password, hash).unwrap_or(false),
        }
    }

    /// Detect the algorithm from the stored hash and verify with it.
    ///
    /// Unrecognized formats fail verification.
    pub fn verify_detected(&self, password: &str, hash: &str) -> bool {
        match detect_algorithm(hash) {
            Some(algorithm) => self.verify(password, hash, algorithm),
            None => false,
        }
    }

    /// Whether a stored hash should be replaced with one from the default algorithm.
    pub fn needs_rehash(&self, hash: &str) -> bool {
        detect_algorithm(hash) != Some(self.default_algorithm)
    }

    fn hash_argon2(&self, password: &str) -> Result<String, PasswordError> {
        let params = Params::new(
            self.params.argon2_memory_kib,
            self.params.argon2_iterations,
            self.params.argon2_parallelism,
            None,
        )
        .map_err(|e| PasswordError::Hashing(e.to_string()))?;

        let salt = SaltString::generate(&mut OsRng);
        Argon2::new(Argon2Variant::Argon2id, Version::V0x13, params)
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| PasswordError::Hashing(e.to_string()))
    }
}

/// Identify which algorithm produced `hash`; `None` for unrecognized formats.
pub fn detect_algorithm(hash: &str) -> Option<HashAlgorithm> {
    if ["$argon2id$", "$argon2i$", "$argon2d$"]
        .iter()
        .any(|prefix| hash.starts_with(prefix))
    {
        return Some(HashAlgorithm::Argon2);
    }

    if is_bcrypt_layout(hash) {
        return Some(HashAlgorithm::Bcrypt);
    }

    None
}

// `$2b$12$` + 53 chars of salt/hash = 60 bytes.
fn is_bcrypt_layout(hash: &str) -> bool {
    let bytes = hash.as_bytes();
    bytes.len() == 60
        && bytes[0] == b'$'
        && bytes[1] == b'2'
        && matches!(bytes[2], b'a' | b'b' | b'x' | b'y')
        && bytes[3] == b'$'
        && bytes[4].is_ascii_digit()
        && bytes[5].is_ascii_digit()
        && bytes[6] == b'$'
}

//! HS256 access/refresh token issuance and verification.
//!
//! Expiry is checked against the caller-supplied `now` (not the system clock)
//! with a bounded leeway, so verification is deterministic under test.
//! Rotating the signing secret invalidates every outstanding token.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use shepherd_core::UserId;

use crate::claims::{AccessClaims, RefreshClaims, TokenKind, validate_time_window};
use crate::User;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenError {
    /// Bad signature, wrong kind, wrong issuer/audience, malformed or expired.
    #[error("invalid token: {0}")]
    Invalid(String),

    #[error("invalid refresh token")]
    InvalidRefreshToken,

    #[error("token encoding failed: {0}")]
    Encoding(String),
}

#[derive(Clone)]
pub struct TokenConfig {
    pub secret: Vec<u8>,
    pub issuer: String,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
    pub leeway: Duration,
}

impl core::fmt::Debug for TokenConfig {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TokenConfig")
            .field("secret", &"<redacted>")
            .field("issuer", &self.issuer)
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .field("leeway", &self.leeway)
            .finish()
    }
}

impl TokenConfig {
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            secret: secret.into(),
            issuer: "shepherd".to_string(),
            access_ttl: Duration::minutes(15),
            refresh_ttl: Duration::days(7),
            leeway: Duration::seconds(30),
        }
    }
}

/// Token pair returned to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    /// Access-token lifetime in seconds.
    pub expires_in: i64,
}

/// A freshly issued pair plus the data needed to persist its refresh session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedTokens {
    pub pair: TokenPair,
    pub refresh_jti: Uuid,
    pub refresh_expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifiedClaims {
    Access(AccessClaims),
    Refresh(RefreshClaims),
}

pub struct TokenManager {
    config: TokenConfig,
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl core::fmt::Debug for TokenManager {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TokenManager")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl TokenManager {
    pub fn new(config: TokenConfig) -> Self {
        let encoding = EncodingKey::from_secret(&config.secret);
        let decoding = DecodingKey::from_secret(&config.secret);
        Self {
            config,
            encoding,
            decoding,
        }
    }

    pub fn config(&self) -> &TokenConfig {
        &self.config
    }

    /// Issue a new access + refresh pair for `user`.
    pub fn issue(&self, user: &User, now: DateTime<Utc>) -> Result<IssuedTokens, TokenError> {
        let iat = now.timestamp();
        let access = AccessClaims {
            sub: user.id,
            email: user.email.clone(),
            role: user.role,
            iat,
            exp: (now + self.config.access_ttl).timestamp(),
            iss: self.config.issuer.clone(),
            aud: TokenKind::Access.audience().to_string(),
            typ: TokenKind::Access.typ().to_string(),
            jti: Uuid::now_v7(),
        };

        let refresh_expires_at = now + self.config.refresh_ttl;
        let refresh = RefreshClaims {
            sub: user.id,
            iat,
            exp: refresh_expires_at.timestamp(),
            iss: self.config.issuer.clone(),
            aud: TokenKind::Refresh.audience().to_string(),
            typ: TokenKind::Refresh.typ().to_string(),
            jti: Uuid::now_v7(),
        };

        Ok(IssuedTokens {
            pair: TokenPair {
                access_token: self.encode(&access)?,
                refresh_token: self.encode(&refresh)?,
                expires_in: self.config.access_ttl.num_seconds(),
            },
            refresh_jti: refresh.jti,
            refresh_expires_at,
        })
    }

    pub fn verify(&self, token: &str, kind: TokenKind, now: DateTime<Utc>) -> Result<VerifiedClaims, TokenError> {
        match kind {
            TokenKind::Access => self.verify_access(token, now).map(VerifiedClaims::Access),
            TokenKind::Refresh => self.verify_refresh(token, now).map(VerifiedClaims::Refresh),
        }
    }

    pub fn verify_access(&self, token: &str, now: DateTime<Utc>) -> Result<AccessClaims, TokenError> {
        let claims: AccessClaims = self.decode(token, TokenKind::Access)?;
        self.check_claims(TokenKind::Access, &claims.typ, claims.iat, claims.exp, now)?;
        Ok(claims)
    }

    pub fn verify_refresh(&self, token: &str, now: DateTime<Utc>) -> Result<RefreshClaims, TokenError> {
        let claims: RefreshClaims = self.decode(token, TokenKind::Refresh)?;
        self.check_claims(TokenKind::Refresh, &claims.typ, claims.iat, claims.exp, now)?;
        Ok(claims)
    }

    /// Verify a refresh token and issue an entirely new pair.
    ///
    /// `load_user` resolves the token subject; a missing or inactive user makes
    /// the refresh token invalid. Session bookkeeping (single use) is the
    /// caller's responsibility.
    pub fn refresh<F>(&self, refresh_token: &str, now: DateTime<Utc>, load_user: F) -> Result<IssuedTokens, TokenError>
    where
        F: FnOnce(UserId) -> Option<User>,
    {
        let claims = self
            .verify_refresh(refresh_token, now)
            .map_err(|_| TokenError::InvalidRefreshToken)?;
        let user = load_user(claims.sub).ok_or(TokenError::InvalidRefreshToken)?;
        self.rotate(&claims, &user, now)
    }

    /// Issue a new pair for an already verified refresh token.
    pub fn rotate(&self, claims: &RefreshClaims, user: &User, now: DateTime<Utc>) -> Result<IssuedTokens, TokenError> {
        if claims.sub != user.id || !user.is_active() {
            return Err(TokenError::InvalidRefreshToken);
        }
        self.issue(user, now)
    }

    fn encode<T: Serialize>(&self, claims: &T) -> Result<String, TokenError> {
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), claims, &self.encoding)
            .map_err(|e| TokenError::Encoding(e.to_string()))
    }

    fn decode<T: DeserializeOwned>(&self, token: &str, kind: TokenKind) -> Result<T, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[self.config.issuer.as_str()]);
        validation.set_audience(&[kind.audience()]);
        validation.set_required_spec_claims(&["exp", "iat", "iss", "aud", "sub"]);
        // Expiry is checked against the injected clock in `check_claims`.
        validation.validate_exp = false;

        jsonwebtoken::decode::<T>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| TokenError::Invalid(e.to_string()))
    }

    fn check_claims(&self, kind: TokenKind, typ: &str, iat: i64, exp: i64, now: DateTime<Utc>) -> Result<(), TokenError> {
        if typ != kind.typ() {
            return Err(TokenError::Invalid(format!("expected {} token", kind.typ())));
        }
        validate_time_window(iat, exp, now, self.config.leeway)
            .map_err(|e| TokenError::Invalid(e.to_string()))
    }
}

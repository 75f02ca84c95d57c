//! Bearer Tokens
//!
//! Stateless HS256 JWTs carrying account identity. Issuing and verifying
//! depend only on the secret and the current instant; nothing is stored
//! server-side, so a token stays valid until it expires or the secret
//! changes.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Fixed token lifetime
pub const TOKEN_TTL_HOURS: i64 = 24;

/// JWT claims for account tokens
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Account ID, carried as the `sub` claim
    #[serde(rename = "sub")]
    pub account_id: i64,
    /// Account login
    pub login: String,
    /// Normalized display name
    pub display_name: String,
    /// Issued at timestamp
    pub iat: i64,
    /// Expiration timestamp
    pub exp: i64,
    /// JWT ID (unique identifier)
    pub jti: Uuid,
}

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("token signature does not match")]
    InvalidSignature,

    #[error("token has expired")]
    Expired,

    #[error("token is malformed")]
    Malformed,

    #[error("failed to encode token: {0}")]
    Encoding(#[source] jsonwebtoken::errors::Error),
}

/// Token issuing and verification
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl TokenService {
    /// Create a token service signing with `secret`
    pub fn new(secret: &[u8]) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is checked by `verify_at` against the caller's instant,
        // with no leeway.
        validation.validate_exp = false;
        validation.leeway = 0;

        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
        }
    }

    /// Issue a token valid for [`TOKEN_TTL_HOURS`] from now
    pub fn issue(
        &self,
        account_id: i64,
        login: &str,
        display_name: &str,
    ) -> Result<String, TokenError> {
        self.issue_at(account_id, login, display_name, Utc::now())
    }

    /// Issue a token as if the current time were `now`
    pub fn issue_at(
        &self,
        account_id: i64,
        login: &str,
        display_name: &str,
        now: DateTime<Utc>,
    ) -> Result<String, TokenError> {
        let exp = now + Duration::hours(TOKEN_TTL_HOURS);

        let claims = Claims {
            account_id,
            login: login.to_string(),
            display_name: display_name.to_string(),
            iat: now.timestamp(),
            exp: exp.timestamp(),
            jti: Uuid::new_v4(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(TokenError::Encoding)
    }

    /// Verify a token against the current time
    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        self.verify_at(token, Utc::now())
    }

    /// Verify a token as if the current time were `now`.
    ///
    /// The signature is checked before any claim is decoded. A token whose
    /// expiry is at or before `now` is rejected.
    pub fn verify_at(&self, token: &str, now: DateTime<Utc>) -> Result<Claims, TokenError> {
        let token_data =
            decode::<Claims>(token, &self.decoding_key, &self.validation).map_err(|e| {
                match e.kind() {
                    ErrorKind::InvalidSignature => TokenError::InvalidSignature,
                    ErrorKind::ExpiredSignature => TokenError::Expired,
                    _ => TokenError::Malformed,
                }
            })?;

        let claims = token_data.claims;
        if claims.exp <= now.timestamp() {
            return Err(TokenError::Expired);
        }

        Ok(claims)
    }
}

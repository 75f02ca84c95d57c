//! Password Hashing
//!
//! Argon2id hashing and verification of account passwords.

use crate::config::AuthConfig;
use crate::error::AuthError;

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};

/// Minimum password length, in characters
pub const MIN_PASSWORD_LENGTH: usize = 6;

/// Checks the password policy: length only, no composition rules.
pub fn meets_policy(plaintext: &str) -> bool {
    plaintext.chars().count() >= MIN_PASSWORD_LENGTH
}

/// Argon2id password hasher
///
/// Holds only the cost parameters, so it is cheap to clone and safe to
/// share between request handlers.
#[derive(Clone)]
pub struct Argon2Hasher {
    params: Params,
    // Hash of a throwaway password, verified against when the account
    // being logged into does not exist.
    dummy_hash: String,
}

impl Argon2Hasher {
    /// Create a hasher with explicit cost parameters
    pub fn new(memory_cost: u32, time_cost: u32, parallelism: u32) -> Result<Self, AuthError> {
        let params = Params::new(memory_cost, time_cost, parallelism, None).map_err(|e| {
            AuthError::Config(format!("Invalid Argon2 parameters: {}", e))
        })?;

        let mut hasher = Self {
            params,
            dummy_hash: String::new(),
        };
        hasher.dummy_hash = hasher.hash("rustpress-identity-dummy")?;

        Ok(hasher)
    }

    /// Create a hasher from the configured cost parameters
    pub fn from_config(config: &AuthConfig) -> Result<Self, AuthError> {
        Self::new(
            config.argon2_memory_cost,
            config.argon2_time_cost,
            config.argon2_parallelism,
        )
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }

    /// Hash a password with a fresh random salt.
    ///
    /// The output is a PHC string carrying the salt and parameters, so two
    /// calls with the same password give different hashes that both verify.
    pub fn hash(&self, plaintext: &str) -> Result<String, AuthError> {
        let salt = SaltString::generate(&mut OsRng);

        let hash = self
            .argon2()
            .hash_password(plaintext.as_bytes(), &salt)?
            .to_string();

        Ok(hash)
    }

    /// Verify a password against a stored hash.
    ///
    /// The digest comparison is constant-time. A stored hash that cannot be
    /// parsed never verifies.
    pub fn verify(&self, plaintext: &str, hash: &str) -> bool {
        let parsed_hash = match PasswordHash::new(hash) {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::error!("Stored password hash is unreadable: {:?}", e);
                return false;
            }
        };

        self.argon2()
            .verify_password(plaintext.as_bytes(), &parsed_hash)
            .is_ok()
    }

    /// Spend the same effort as [`verify`](Self::verify) without a real hash.
    pub fn verify_dummy(&self, plaintext: &str) {
        self.verify(plaintext, &self.dummy_hash);
    }
}

#[cfg(test)]
pub(crate) fn test_hasher() -> Argon2Hasher {
    Argon2Hasher::new(Params::MIN_M_COST, Params::MIN_T_COST, Params::MIN_P_COST)
        .expect("minimal argon2 params are valid")
}

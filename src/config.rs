//! Identity Service Configuration
//!
//! All configuration values are loaded from environment variables.
//! No hardcoded secrets or sensitive data.

use crate::error::AuthError;
use std::env;
use std::str::FromStr;

/// Service configuration loaded from environment
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Listen address (from SERVER_ADDRESS env var)
    pub server_address: String,

    /// SQLite database URL (from DATABASE_URL env var)
    pub database_url: String,

    /// Pool size (from DATABASE_MAX_CONNECTIONS env var)
    pub database_max_connections: u32,

    /// Directory holding migration scripts (from MIGRATIONS_DIR env var)
    pub migrations_dir: String,

    /// JWT secret key for signing tokens (from JWT_SECRET env var)
    pub jwt_secret: String,

    /// Argon2 memory cost in KiB (from ARGON2_MEMORY_COST env var)
    pub argon2_memory_cost: u32,

    /// Argon2 time cost (iterations) (from ARGON2_TIME_COST env var)
    pub argon2_time_cost: u32,

    /// Argon2 parallelism (from ARGON2_PARALLELISM env var)
    pub argon2_parallelism: u32,
}

impl AuthConfig {
    /// Load configuration from environment variables and validate it
    pub fn from_env() -> Result<Self, AuthError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AuthError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let config = Self {
            server_address: lookup("SERVER_ADDRESS").unwrap_or_else(|| "0.0.0.0:8081".to_string()),

            database_url: lookup("DATABASE_URL").unwrap_or_else(|| "sqlite://auth.db".to_string()),

            database_max_connections: parse_or(&lookup, "DATABASE_MAX_CONNECTIONS", 5)?,

            migrations_dir: lookup("MIGRATIONS_DIR").unwrap_or_else(|| "migrations".to_string()),

            jwt_secret: lookup("JWT_SECRET").ok_or_else(|| {
                AuthError::Config("JWT_SECRET environment variable must be set".to_string())
            })?,

            argon2_memory_cost: parse_or(&lookup, "ARGON2_MEMORY_COST", 65536)?, // 64 MiB

            argon2_time_cost: parse_or(&lookup, "ARGON2_TIME_COST", 3)?,

            argon2_parallelism: parse_or(&lookup, "ARGON2_PARALLELISM", 4)?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), AuthError> {
        if self.jwt_secret.len() < 32 {
            return Err(AuthError::Config(
                "JWT_SECRET must be at least 32 characters".to_string(),
            ));
        }

        if self.database_max_connections == 0 {
            return Err(AuthError::Config(
                "DATABASE_MAX_CONNECTIONS must be positive".to_string(),
            ));
        }

        if self.server_address.trim().is_empty() {
            return Err(AuthError::Config(
                "SERVER_ADDRESS must not be empty".to_string(),
            ));
        }

        Ok(())
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, AuthError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| AuthError::Config(format!("{key} must be a number, got {raw:?}"))),
        None => Ok(default),
    }
}

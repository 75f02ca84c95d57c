//! RustPress Identity Service
//!
//! Account registration and authentication for RustPress providing:
//! - Registration with login, display name, email and password
//! - Login returning a signed, 24-hour JWT
//! - Profile read and partial update by token
//! - Argon2id password hashing
//! - Versioned SQL migrations applied at startup
//!
//! # Configuration
//!
//! All configuration is loaded from environment variables:
//! - `JWT_SECRET` - Secret key for signing JWTs (required, min 32 chars)
//! - `SERVER_ADDRESS` - Listen address (default: "0.0.0.0:8081")
//! - `DATABASE_URL` - SQLite database URL (default: "sqlite://auth.db")
//! - `DATABASE_MAX_CONNECTIONS` - Pool size (default: 5)
//! - `MIGRATIONS_DIR` - Migration script directory (default: "migrations")
//! - `ARGON2_MEMORY_COST`, `ARGON2_TIME_COST`, `ARGON2_PARALLELISM` - Hashing cost
//!
//! # Usage
//!
//! ```rust,ignore
//! use rustpress_identity::{db, migrate::Migrator, AccountService, AuthConfig};
//!
//! let config = AuthConfig::from_env()?;
//! let pool = db::connect(&config.database_url, config.database_max_connections).await?;
//! Migrator::from_dir(&config.migrations_dir)?.run(&pool).await?;
//!
//! let accounts = Arc::new(AccountService::new(pool, &config)?);
//! let app = rustpress_identity::create_routes(accounts);
//! ```

pub mod config;
pub mod db;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod migrate;
pub mod models;
pub mod password;
pub mod service;
pub mod store;
pub mod token;
pub mod validation;

// Re-export commonly used types
pub use config::AuthConfig;
pub use error::AuthError;
pub use extractors::{BearerToken, JsonBody};
pub use handlers::{create_routes, AccountState};
pub use migrate::{MigrationError, Migrator};
pub use models::*;
pub use password::Argon2Hasher;
pub use service::AccountService;
pub use store::{SqliteAccountStore, StoreError};
pub use token::{Claims, TokenError, TokenService};

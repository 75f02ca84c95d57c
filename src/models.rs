//! Account Models
//!
//! Data structures for account requests, responses, and database entities.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::collections::BTreeMap;
use std::fmt;

// ============================================
// Database Entities
// ============================================

/// Account entity from database
#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub id: i64,
    pub login: String,
    pub display_name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Account about to be inserted; the store assigns id and timestamps
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub login: String,
    /// Already normalized
    pub display_name: String,
    pub email: String,
    pub password_hash: String,
}

/// Columns carrying a uniqueness constraint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniqueField {
    Login,
    DisplayName,
    Email,
}

impl UniqueField {
    pub fn column(&self) -> &'static str {
        match self {
            UniqueField::Login => "login",
            UniqueField::DisplayName => "display_name",
            UniqueField::Email => "email",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            UniqueField::Login => "Login",
            UniqueField::DisplayName => "Display name",
            UniqueField::Email => "Email",
        }
    }
}

impl fmt::Display for UniqueField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

/// Columns a partial update may name
///
/// `Password` exists so that a stray password change can be named and
/// refused; the store never writes it through a partial update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum AccountField {
    DisplayName,
    Email,
    Password,
}

impl AccountField {
    pub fn column(&self) -> &'static str {
        match self {
            AccountField::DisplayName => "display_name",
            AccountField::Email => "email",
            AccountField::Password => "password_hash",
        }
    }
}

/// A set of column changes for one account
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldChanges(BTreeMap<AccountField, String>);

impl FieldChanges {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, field: AccountField, value: impl Into<String>) -> &mut Self {
        self.0.insert(field, value.into());
        self
    }

    pub fn get(&self, field: AccountField) -> Option<&str> {
        self.0.get(&field).map(String::as_str)
    }

    pub fn contains(&self, field: AccountField) -> bool {
        self.0.contains_key(&field)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (AccountField, &str)> {
        self.0.iter().map(|(field, value)| (*field, value.as_str()))
    }
}

// ============================================
// Request DTOs
// ============================================

/// Registration request
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub login: String,
    pub display_name: String,
    pub email: String,
    pub password: String,
    pub password_confirm: String,
}

/// Login request
#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub login: String,
    pub password: String,
}

/// Profile update request; absent fields are left untouched
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    pub display_name: Option<String>,
    pub email: Option<String>,
}

// ============================================
// Response DTOs
// ============================================

/// User response (public account data without the password hash)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: i64,
    pub login: String,
    pub display_name: String,
    pub email: String,
}

impl From<Account> for UserResponse {
    fn from(account: Account) -> Self {
        Self {
            id: account.id,
            login: account.login,
            display_name: account.display_name,
            email: account.email,
        }
    }
}

impl From<&Account> for UserResponse {
    fn from(account: &Account) -> Self {
        Self {
            id: account.id,
            login: account.login.clone(),
            display_name: account.display_name.clone(),
            email: account.email.clone(),
        }
    }
}

/// Result of a successful registration or login
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub token: String,
    pub user: UserResponse,
}

/// JSON envelope returned by every account endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<UserResponse>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ApiResponse {
    pub fn session(session: AuthSession) -> Self {
        Self {
            success: true,
            token: Some(session.token),
            user: Some(session.user),
            error: None,
        }
    }

    pub fn user(user: UserResponse) -> Self {
        Self {
            success: true,
            token: None,
            user: Some(user),
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            token: None,
            user: None,
            error: Some(message.into()),
        }
    }
}

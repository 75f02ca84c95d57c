//! Account Service
//!
//! The account workflow: registration, login, and profile read/update.
//! Combines validation, the account store, password hashing and tokens.

use crate::config::AuthConfig;
use crate::error::AuthError;
use crate::models::*;
use crate::password::Argon2Hasher;
use crate::store::{SqliteAccountStore, StoreError};
use crate::token::TokenService;
use crate::validation::{
    normalize_display_name, validate_display_name, validate_email, validate_login,
    validate_password, ValidationError,
};

use sqlx::SqlitePool;

/// Account workflow service
pub struct AccountService {
    store: SqliteAccountStore,
    hasher: Argon2Hasher,
    tokens: TokenService,
}

impl AccountService {
    /// Create the service from a migrated pool and the loaded configuration
    pub fn new(db: SqlitePool, config: &AuthConfig) -> Result<Self, AuthError> {
        Ok(Self::with_parts(
            SqliteAccountStore::new(db),
            Argon2Hasher::from_config(config)?,
            TokenService::new(config.jwt_secret.as_bytes()),
        ))
    }

    pub fn with_parts(store: SqliteAccountStore, hasher: Argon2Hasher, tokens: TokenService) -> Self {
        Self {
            store,
            hasher,
            tokens,
        }
    }

    /// Get reference to the account store
    pub fn store(&self) -> &SqliteAccountStore {
        &self.store
    }

    /// Get reference to the token service
    pub fn tokens(&self) -> &TokenService {
        &self.tokens
    }

    // ============================================
    // Registration
    // ============================================

    /// Register a new account and sign it in
    pub async fn register(&self, req: RegisterRequest) -> Result<AuthSession, AuthError> {
        validate_login(&req.login)?;
        validate_display_name(&req.display_name)?;
        validate_email(&req.email)?;
        validate_password(&req.password)?;

        if req.password != req.password_confirm {
            return Err(ValidationError::PasswordMismatch.into());
        }

        let display_name = normalize_display_name(&req.display_name);
        let password_hash = self.hasher.hash(&req.password)?;

        let account = self
            .store
            .create(NewAccount {
                login: req.login,
                display_name,
                email: req.email,
                password_hash,
            })
            .await?;

        tracing::info!(account_id = account.id, login = %account.login, "Account registered");

        self.session_for(account)
    }

    // ============================================
    // Login
    // ============================================

    /// Authenticate by login and password.
    ///
    /// Unknown login and wrong password produce the same error, and both
    /// paths run one password verification.
    pub async fn login(&self, req: LoginRequest) -> Result<AuthSession, AuthError> {
        if validate_login(&req.login).is_err() {
            self.hasher.verify_dummy(&req.password);
            return Err(AuthError::InvalidCredentials);
        }

        let account = match self.store.get_by_login(&req.login).await {
            Ok(account) => account,
            Err(StoreError::NotFound) => {
                self.hasher.verify_dummy(&req.password);
                tracing::warn!(login = %req.login, "Login failed: unknown login");
                return Err(AuthError::InvalidCredentials);
            }
            Err(e) => return Err(e.into()),
        };

        if !self.hasher.verify(&req.password, &account.password_hash) {
            tracing::warn!(account_id = account.id, "Login failed: wrong password");
            return Err(AuthError::InvalidCredentials);
        }

        tracing::info!(account_id = account.id, "Account logged in");

        self.session_for(account)
    }

    // ============================================
    // Profile
    // ============================================

    /// Return the profile of the account a token was issued to
    pub async fn get_profile(&self, token: &str) -> Result<UserResponse, AuthError> {
        let claims = self.tokens.verify(token)?;
        let account = self.store.get_by_id(claims.account_id).await?;
        Ok(UserResponse::from(account))
    }

    /// Change display name and/or email of the token's account.
    ///
    /// Absent fields are left untouched; with neither supplied the current
    /// profile is returned as is.
    pub async fn update_profile(
        &self,
        token: &str,
        req: UpdateProfileRequest,
    ) -> Result<UserResponse, AuthError> {
        let claims = self.tokens.verify(token)?;

        let mut changes = FieldChanges::new();

        if let Some(display_name) = &req.display_name {
            validate_display_name(display_name)?;
            changes.set(AccountField::DisplayName, normalize_display_name(display_name));
        }

        if let Some(email) = req.email {
            validate_email(&email)?;
            changes.set(AccountField::Email, email);
        }

        if !changes.is_empty() {
            self.store.update_fields(claims.account_id, &changes).await?;
            tracing::info!(account_id = claims.account_id, "Profile updated");
        }

        let account = self.store.get_by_id(claims.account_id).await?;
        Ok(UserResponse::from(account))
    }

    fn session_for(&self, account: Account) -> Result<AuthSession, AuthError> {
        let token = self
            .tokens
            .issue(account.id, &account.login, &account.display_name)?;

        Ok(AuthSession {
            token,
            user: UserResponse::from(account),
        })
    }
}

#[cfg(test)]
pub(crate) async fn test_service() -> AccountService {
    AccountService::with_parts(
        crate::store::test_store().await,
        crate::password::test_hasher(),
        TokenService::new(b"test-secret-test-secret-test-secret"),
    )
}

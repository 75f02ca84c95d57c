//! Account Store
//!
//! Persistence for accounts on SQLite. Login, display name and email each
//! carry a `UNIQUE` constraint in the schema; the checks here run first so
//! that a collision is reported against the right field, and a constraint
//! violation that slips past them (two concurrent registrations) is mapped
//! back to the same field.

use crate::models::{Account, AccountField, FieldChanges, NewAccount, UniqueField};

use chrono::Utc;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

const ACCOUNT_COLUMNS: &str =
    "id, login, display_name, email, password_hash, created_at, updated_at";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{0} already exists")]
    Conflict(UniqueField),

    #[error("account not found")]
    NotFound,

    #[error("update rejected: {0}")]
    Rejected(&'static str),

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

/// SQLite-backed account store
#[derive(Clone)]
pub struct SqliteAccountStore {
    db: SqlitePool,
}

impl SqliteAccountStore {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Get reference to the database pool
    pub fn db(&self) -> &SqlitePool {
        &self.db
    }

    // ============================================
    // Uniqueness
    // ============================================

    async fn is_taken(
        &self,
        field: UniqueField,
        value: &str,
        except_id: Option<i64>,
    ) -> Result<bool, StoreError> {
        let query = match field {
            UniqueField::Login => "SELECT COUNT(*) FROM accounts WHERE login = $1 AND id != $2",
            UniqueField::DisplayName => {
                "SELECT COUNT(*) FROM accounts WHERE display_name = $1 AND id != $2"
            }
            UniqueField::Email => "SELECT COUNT(*) FROM accounts WHERE email = $1 AND id != $2",
        };

        let count: i64 = sqlx::query_scalar(query)
            .bind(value)
            .bind(except_id.unwrap_or(-1))
            .fetch_one(&self.db)
            .await?;

        Ok(count > 0)
    }

    /// Check that none of the three identifiers is in use.
    ///
    /// Fields are checked in order login, display name, email and the first
    /// one already taken is reported; the rest are not looked at.
    pub async fn check_unique(
        &self,
        login: &str,
        display_name: &str,
        email: &str,
    ) -> Result<(), StoreError> {
        for (field, value) in [
            (UniqueField::Login, login),
            (UniqueField::DisplayName, display_name),
            (UniqueField::Email, email),
        ] {
            if self.is_taken(field, value, None).await? {
                return Err(StoreError::Conflict(field));
            }
        }

        Ok(())
    }

    // ============================================
    // Create
    // ============================================

    /// Insert a new account and return it with its assigned id
    pub async fn create(&self, account: NewAccount) -> Result<Account, StoreError> {
        if account.password_hash.is_empty() {
            return Err(StoreError::Rejected("password hash must not be empty"));
        }

        self.check_unique(&account.login, &account.display_name, &account.email)
            .await?;

        let now = Utc::now();
        let query = format!(
            r#"
            INSERT INTO accounts (login, display_name, email, password_hash, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $5)
            RETURNING {ACCOUNT_COLUMNS}
            "#
        );

        sqlx::query_as::<_, Account>(&query)
            .bind(&account.login)
            .bind(&account.display_name)
            .bind(&account.email)
            .bind(&account.password_hash)
            .bind(now)
            .fetch_one(&self.db)
            .await
            .map_err(map_unique_violation)
    }

    // ============================================
    // Lookups
    // ============================================

    pub async fn get_by_login(&self, login: &str) -> Result<Account, StoreError> {
        let query = format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE login = $1");
        sqlx::query_as::<_, Account>(&query)
            .bind(login)
            .fetch_optional(&self.db)
            .await?
            .ok_or(StoreError::NotFound)
    }

    pub async fn get_by_email(&self, email: &str) -> Result<Account, StoreError> {
        let query = format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE email = $1");
        sqlx::query_as::<_, Account>(&query)
            .bind(email)
            .fetch_optional(&self.db)
            .await?
            .ok_or(StoreError::NotFound)
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Account, StoreError> {
        let query = format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = $1");
        sqlx::query_as::<_, Account>(&query)
            .bind(id)
            .fetch_optional(&self.db)
            .await?
            .ok_or(StoreError::NotFound)
    }

    // ============================================
    // Updates
    // ============================================

    /// Apply a partial update to display name and/or email.
    ///
    /// Refuses any change set that names the password column. Changed
    /// display name and email are checked against other accounts before the
    /// single `UPDATE`, which also refreshes `updated_at`.
    pub async fn update_fields(&self, id: i64, changes: &FieldChanges) -> Result<(), StoreError> {
        if changes.contains(AccountField::Password) {
            return Err(StoreError::Rejected(
                "password cannot be updated through this method",
            ));
        }

        if changes.is_empty() {
            return Ok(());
        }

        for (field, unique) in [
            (AccountField::DisplayName, UniqueField::DisplayName),
            (AccountField::Email, UniqueField::Email),
        ] {
            if let Some(value) = changes.get(field) {
                if self.is_taken(unique, value, Some(id)).await? {
                    return Err(StoreError::Conflict(unique));
                }
            }
        }

        let mut query: QueryBuilder<Sqlite> = QueryBuilder::new("UPDATE accounts SET ");
        for (field, value) in changes.iter() {
            query.push(field.column()).push(" = ").push_bind(value).push(", ");
        }
        query
            .push("updated_at = ")
            .push_bind(Utc::now())
            .push(" WHERE id = ")
            .push_bind(id);

        let result = query
            .build()
            .execute(&self.db)
            .await
            .map_err(map_unique_violation)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }

        Ok(())
    }

    /// Overwrite the stored password hash.
    ///
    /// Not reachable from any account workflow operation yet; kept as the
    /// only path through which a password may change.
    pub async fn update_password_hash(&self, id: i64, new_hash: &str) -> Result<(), StoreError> {
        if new_hash.is_empty() {
            return Err(StoreError::Rejected("password hash must not be empty"));
        }

        let result =
            sqlx::query("UPDATE accounts SET password_hash = $1, updated_at = $2 WHERE id = $3")
                .bind(new_hash)
                .bind(Utc::now())
                .bind(id)
                .execute(&self.db)
                .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }

        Ok(())
    }
}

/// Map a `UNIQUE` constraint failure to the column it was raised on.
fn map_unique_violation(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() {
            // SQLite reports "UNIQUE constraint failed: accounts.<column>"
            let message = db_err.message();
            let field = [
                UniqueField::Login,
                UniqueField::DisplayName,
                UniqueField::Email,
            ]
            .into_iter()
            .find(|field| message.ends_with(&format!("accounts.{}", field.column())));

            if let Some(field) = field {
                tracing::warn!(field = %field, "Unique constraint caught a concurrent write");
                return StoreError::Conflict(field);
            }
        }
    }

    StoreError::Database(err)
}

#[cfg(test)]
pub(crate) async fn test_store() -> SqliteAccountStore {
    let pool = crate::db::connect("sqlite::memory:", 1)
        .await
        .expect("in-memory database");
    crate::migrate::Migrator::from_dir(crate::migrate::bundled_dir())
        .expect("bundled migrations parse")
        .run(&pool)
        .await
        .expect("bundled migrations apply");
    SqliteAccountStore::new(pool)
}

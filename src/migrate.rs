//! Schema Migrations
//!
//! Versioned SQL scripts applied once each, in version order, at startup.
//!
//! Scripts are files named `<version>_<description>.sql`. Each holds a
//! forward section after a `-- +migrate Up` line and optionally a reverse
//! section after a `-- +migrate Down` line; anything before the first
//! marker is ignored. Reverse sections are parsed and kept but never run.
//!
//! Applied versions are recorded in `schema_migrations`. A recorded version
//! is never run again, even if its script text later changes.

use sqlx::{Executor, SqlitePool};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

pub const UP_MARKER: &str = "-- +migrate Up";
pub const DOWN_MARKER: &str = "-- +migrate Down";

#[derive(Debug, thiserror::Error)]
pub enum MigrationError {
    #[error("malformed migration {file}: {reason}")]
    Malformed { file: String, reason: String },

    #[error("migrations {first} and {second} share version {version}")]
    DuplicateVersion {
        version: i64,
        first: String,
        second: String,
    },

    #[error("failed to read migrations from {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to apply migration {version} ({name}): {source}")]
    Apply {
        version: i64,
        name: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("migration bookkeeping failed: {0}")]
    Database(#[from] sqlx::Error),
}

/// One parsed migration script
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Migration {
    pub version: i64,
    pub name: String,
    pub up: String,
    pub down: Option<String>,
}

impl Migration {
    /// Parse a migration from its file name and contents
    pub fn parse(file_name: &str, contents: &str) -> Result<Self, MigrationError> {
        let malformed = |reason: &str| MigrationError::Malformed {
            file: file_name.to_string(),
            reason: reason.to_string(),
        };

        let (prefix, _) = file_name
            .split_once('_')
            .ok_or_else(|| malformed("file name has no `<version>_` prefix"))?;

        if prefix.is_empty() || !prefix.bytes().all(|b| b.is_ascii_digit()) {
            return Err(malformed("version prefix is not a number"));
        }
        let version: i64 = prefix
            .parse()
            .map_err(|_| malformed("version prefix is out of range"))?;
        if version <= 0 {
            return Err(malformed("version must be positive"));
        }

        let (up, down) = split_sections(contents);
        if up.is_empty() {
            return Err(malformed("missing `-- +migrate Up` section"));
        }

        Ok(Self {
            version,
            name: file_name.to_string(),
            up,
            down: (!down.is_empty()).then_some(down),
        })
    }
}

fn split_sections(contents: &str) -> (String, String) {
    enum Section {
        Preamble,
        Up,
        Down,
    }

    let mut section = Section::Preamble;
    let mut up = Vec::new();
    let mut down = Vec::new();

    for line in contents.lines() {
        match line.trim() {
            UP_MARKER => section = Section::Up,
            DOWN_MARKER => section = Section::Down,
            _ => match section {
                Section::Preamble => {}
                Section::Up => up.push(line),
                Section::Down => down.push(line),
            },
        }
    }

    (
        up.join("\n").trim().to_string(),
        down.join("\n").trim().to_string(),
    )
}

/// Ordered set of migrations and the logic to apply them
#[derive(Debug, Clone)]
pub struct Migrator {
    migrations: Vec<Migration>,
}

impl Migrator {
    /// Build a migrator from already-parsed migrations.
    ///
    /// Migrations are sorted by version; two sharing a version is an error.
    pub fn new(mut migrations: Vec<Migration>) -> Result<Self, MigrationError> {
        migrations.sort_by_key(|m| m.version);

        if let Some(pair) = migrations.windows(2).find(|w| w[0].version == w[1].version) {
            return Err(MigrationError::DuplicateVersion {
                version: pair[0].version,
                first: pair[0].name.clone(),
                second: pair[1].name.clone(),
            });
        }

        Ok(Self { migrations })
    }

    /// Discover every `*.sql` script in `dir`
    pub fn from_dir(dir: impl AsRef<Path>) -> Result<Self, MigrationError> {
        let dir = dir.as_ref();
        let io_err = |source| MigrationError::Io {
            path: dir.to_path_buf(),
            source,
        };

        let mut migrations = Vec::new();
        for entry in fs::read_dir(dir).map_err(io_err)? {
            let entry = entry.map_err(io_err)?;
            let path = entry.path();

            if path.extension().and_then(|ext| ext.to_str()) != Some("sql") {
                continue;
            }
            // Follows symlinks, so a linked script is still picked up.
            if !path.is_file() {
                tracing::warn!(path = %path.display(), "Skipping non-file migration entry");
                continue;
            }

            let file_name = entry.file_name();
            let file_name = file_name.to_str().ok_or_else(|| MigrationError::Malformed {
                file: path.display().to_string(),
                reason: "file name is not valid UTF-8".to_string(),
            })?;

            let contents = fs::read_to_string(&path).map_err(|source| MigrationError::Io {
                path: path.clone(),
                source,
            })?;

            migrations.push(Migration::parse(file_name, &contents)?);
        }

        Self::new(migrations)
    }

    pub fn migrations(&self) -> &[Migration] {
        &self.migrations
    }

    /// Apply every migration not yet recorded, in version order.
    ///
    /// Each migration runs in its own transaction together with the insert
    /// into `schema_migrations`, so a version is either fully applied and
    /// recorded or not at all. The first failure stops the run. Returns the
    /// versions applied by this call.
    pub async fn run(&self, db: &SqlitePool) -> Result<Vec<i64>, MigrationError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                applied_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        )
        .execute(db)
        .await?;

        let applied: HashSet<i64> =
            sqlx::query_scalar::<_, i64>("SELECT version FROM schema_migrations")
                .fetch_all(db)
                .await?
                .into_iter()
                .collect();

        let mut newly_applied = Vec::new();
        for migration in self
            .migrations
            .iter()
            .filter(|m| !applied.contains(&m.version))
        {
            tracing::info!(
                version = migration.version,
                name = %migration.name,
                "Applying migration"
            );

            apply(db, migration)
                .await
                .map_err(|source| MigrationError::Apply {
                    version: migration.version,
                    name: migration.name.clone(),
                    source,
                })?;

            newly_applied.push(migration.version);
        }

        tracing::info!(
            applied = newly_applied.len(),
            total = self.migrations.len(),
            "Database migrations completed"
        );

        Ok(newly_applied)
    }
}

async fn apply(db: &SqlitePool, migration: &Migration) -> Result<(), sqlx::Error> {
    // Dropping the transaction without commit rolls it back.
    let mut tx = db.begin().await?;

    (&mut *tx).execute(migration.up.as_str()).await?;

    sqlx::query("INSERT INTO schema_migrations (version) VALUES ($1)")
        .bind(migration.version)
        .execute(&mut *tx)
        .await?;

    tx.commit().await
}

/// Migration scripts shipped with the crate
#[cfg(test)]
pub(crate) fn bundled_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("migrations")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn migration(version: i64, up: &str) -> Migration {
        Migration {
            version,
            name: format!("{version:04}_test.sql"),
            up: up.to_string(),
            down: None,
        }
    }

    async fn memory_pool() -> SqlitePool {
        crate::db::connect("sqlite::memory:", 1).await.unwrap()
    }

    async fn recorded_versions(db: &SqlitePool) -> Vec<i64> {
        sqlx::query_scalar("SELECT version FROM schema_migrations ORDER BY version")
            .fetch_all(db)
            .await
            .unwrap()
    }

    async fn table_exists(db: &SqlitePool, name: &str) -> bool {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = $1",
        )
        .bind(name)
        .fetch_one(db)
        .await
        .unwrap();
        count > 0
    }

    #[test]
    fn test_parse_sections() {
        let contents = "\
-- leading comment, ignored
-- +migrate Up
CREATE TABLE a (id INTEGER);
CREATE INDEX idx_a ON a(id);

-- +migrate Down
DROP TABLE a;
";
        let m = Migration::parse("0003_create_a.sql", contents).unwrap();
        assert_eq!(m.version, 3);
        assert_eq!(m.name, "0003_create_a.sql");
        assert_eq!(m.up, "CREATE TABLE a (id INTEGER);\nCREATE INDEX idx_a ON a(id);");
        assert_eq!(m.down.as_deref(), Some("DROP TABLE a;"));
    }

    #[test]
    fn test_parse_without_down() {
        let m = Migration::parse("12_x.sql", "-- +migrate Up\nSELECT 1;").unwrap();
        assert_eq!(m.version, 12);
        assert_eq!(m.down, None);
    }

    #[test]
    fn test_parse_rejects_bad_names() {
        for name in ["create.sql", "abc_create.sql", "0_create.sql", "-1_create.sql", "_x.sql", "1a_x.sql"] {
            assert!(
                matches!(
                    Migration::parse(name, "-- +migrate Up\nSELECT 1;"),
                    Err(MigrationError::Malformed { .. })
                ),
                "{name} should be malformed"
            );
        }
    }

    #[test]
    fn test_parse_rejects_missing_up() {
        assert!(matches!(
            Migration::parse("1_x.sql", "CREATE TABLE a (id INTEGER);"),
            Err(MigrationError::Malformed { .. })
        ));
        assert!(matches!(
            Migration::parse("1_x.sql", "-- +migrate Up\n\n-- +migrate Down\nDROP TABLE a;"),
            Err(MigrationError::Malformed { .. })
        ));
    }

    #[test]
    fn test_new_sorts_and_rejects_duplicates() {
        let migrator = Migrator::new(vec![migration(3, "SELECT 3"), migration(1, "SELECT 1")]).unwrap();
        let versions: Vec<_> = migrator.migrations().iter().map(|m| m.version).collect();
        assert_eq!(versions, vec![1, 3]);

        let mut dup = migration(2, "SELECT 2");
        dup.name = "0002_other.sql".into();
        assert!(matches!(
            Migrator::new(vec![migration(2, "SELECT 2"), dup]),
            Err(MigrationError::DuplicateVersion { version: 2, .. })
        ));
    }

    #[test]
    fn test_bundled_migrations_parse() {
        let migrator = Migrator::from_dir(bundled_dir()).unwrap();
        assert!(!migrator.migrations().is_empty());
        assert_eq!(migrator.migrations()[0].version, 1);
        assert!(migrator.migrations()[0].down.is_some());
    }

    struct ScratchDir(PathBuf);

    impl ScratchDir {
        fn new() -> Self {
            let path = std::env::temp_dir()
                .join(format!("rustpress-migrations-{}", uuid::Uuid::new_v4()));
            fs::create_dir_all(&path).unwrap();
            Self(path)
        }

        fn write(&self, name: &str, contents: &str) -> &Self {
            fs::write(self.0.join(name), contents).unwrap();
            self
        }
    }

    impl Drop for ScratchDir {
        fn drop(&mut self) {
            let _ = fs::remove_dir_all(&self.0);
        }
    }

    #[test]
    fn test_from_dir_skips_non_scripts() {
        let dir = ScratchDir::new();
        dir.write("README.md", "not a migration")
            .write("1_a.sql", "-- +migrate Up\nSELECT 1;");
        fs::create_dir(dir.0.join("9_dir.sql")).unwrap();

        let migrator = Migrator::from_dir(&dir.0).unwrap();
        let names: Vec<_> = migrator.migrations().iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["1_a.sql"]);
    }

    #[test]
    fn test_from_dir_rejects_shared_version() {
        let dir = ScratchDir::new();
        dir.write("README.md", "not a migration")
            .write("1_a.sql", "-- +migrate Up\nSELECT 1;")
            .write("0001_b.sql", "-- +migrate Up\nSELECT 2;");
        fs::create_dir(dir.0.join("9_dir.sql")).unwrap();

        match Migrator::from_dir(&dir.0) {
            Err(MigrationError::DuplicateVersion {
                version,
                first,
                second,
            }) => {
                assert_eq!(version, 1);
                let mut names = vec![first, second];
                names.sort();
                assert_eq!(names, vec!["0001_b.sql", "1_a.sql"]);
            }
            other => panic!("expected duplicate version, got {other:?}"),
        }
    }

    #[test]
    fn test_from_dir_rejects_bad_name() {
        let dir = ScratchDir::new();
        dir.write("x_bad.sql", "-- +migrate Up\nSELECT 1;");

        assert!(matches!(
            Migrator::from_dir(&dir.0),
            Err(MigrationError::Malformed { .. })
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_from_dir_follows_symlinks() {
        let source = ScratchDir::new();
        source.write("shared.sql", "-- +migrate Up\nSELECT 1;");

        let dir = ScratchDir::new();
        std::os::unix::fs::symlink(source.0.join("shared.sql"), dir.0.join("0002_linked.sql"))
            .unwrap();

        let migrator = Migrator::from_dir(&dir.0).unwrap();
        assert_eq!(migrator.migrations().len(), 1);
        assert_eq!(migrator.migrations()[0].version, 2);
    }

    #[test]
    fn test_missing_dir() {
        assert!(matches!(
            Migrator::from_dir(bundled_dir().join("does-not-exist")),
            Err(MigrationError::Io { .. })
        ));
    }

    #[tokio::test]
    async fn test_run_is_idempotent() {
        let db = memory_pool().await;
        let migrator = Migrator::new(vec![
            migration(1, "CREATE TABLE run_log (n INTEGER);"),
            migration(2, "INSERT INTO run_log (n) VALUES (1);"),
        ])
        .unwrap();

        assert_eq!(migrator.run(&db).await.unwrap(), vec![1, 2]);
        assert_eq!(migrator.run(&db).await.unwrap(), Vec::<i64>::new());

        let runs: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM run_log")
            .fetch_one(&db)
            .await
            .unwrap();
        assert_eq!(runs, 1);
        assert_eq!(recorded_versions(&db).await, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_applied_version_ignores_changed_text() {
        let db = memory_pool().await;
        Migrator::new(vec![migration(1, "CREATE TABLE a (id INTEGER);")])
            .unwrap()
            .run(&db)
            .await
            .unwrap();

        let edited = Migrator::new(vec![migration(1, "CREATE TABLE b (id INTEGER);")]).unwrap();
        assert!(edited.run(&db).await.unwrap().is_empty());
        assert!(!table_exists(&db, "b").await);
    }

    #[tokio::test]
    async fn test_failed_script_rolls_back_and_stops() {
        let db = memory_pool().await;
        let migrator = Migrator::new(vec![
            migration(1, "CREATE TABLE a (id INTEGER);"),
            migration(2, "CREATE TABLE half_done (id INTEGER);\nINSERT INTO nowhere VALUES (1);"),
            migration(3, "CREATE TABLE c (id INTEGER);"),
        ])
        .unwrap();

        match migrator.run(&db).await {
            Err(MigrationError::Apply { version, .. }) => assert_eq!(version, 2),
            other => panic!("expected apply failure, got {other:?}"),
        }

        assert_eq!(recorded_versions(&db).await, vec![1]);
        assert!(table_exists(&db, "a").await);
        assert!(!table_exists(&db, "half_done").await);
        assert!(!table_exists(&db, "c").await);
    }

    #[tokio::test]
    async fn test_failed_record_rolls_back_script() {
        let db = memory_pool().await;
        // The script records its own version, so the engine's insert fails.
        let migrator = Migrator::new(vec![migration(
            5,
            "CREATE TABLE sneaky (id INTEGER);\nINSERT INTO schema_migrations (version) VALUES (5);",
        )])
        .unwrap();

        assert!(matches!(
            migrator.run(&db).await,
            Err(MigrationError::Apply { version: 5, .. })
        ));
        assert!(recorded_versions(&db).await.is_empty());
        assert!(!table_exists(&db, "sneaky").await);
    }

    #[tokio::test]
    async fn test_bundled_schema_applies() {
        let db = memory_pool().await;
        let migrator = Migrator::from_dir(bundled_dir()).unwrap();
        let applied = migrator.run(&db).await.unwrap();

        assert_eq!(applied.len(), migrator.migrations().len());
        assert!(table_exists(&db, "accounts").await);
        assert!(migrator.run(&db).await.unwrap().is_empty());
    }
}

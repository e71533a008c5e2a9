//! # Database Migrations
//!
//! Versioned SQL scripts tracked in `schema_migrations(version)`.
//!
//! ## How Migrations Work
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Migration Process                                  │
//! │                                                                         │
//! │  App Startup                                                           │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  CREATE TABLE IF NOT EXISTS schema_migrations                          │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Collect scripts                                                       │
//! │       ├── embedded:   001_initial_schema, 002_debt_entry               │
//! │       └── filesystem: <migrations_dir>/*.up.sql (optional)             │
//! │       │   same version in both? embedded copy wins                     │
//! │       ▼                                                                 │
//! │  Sort by version (lexicographic)                                       │
//! │       │                                                                 │
//! │       ├── 001_initial_schema   ✓ (already recorded, skipped)           │
//! │       └── 003_client_email     ⬜ (pending)                            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  For each pending: BEGIN → run each statement → INSERT version → COMMIT│
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Adding a Migration
//! 1. Add `NNN_description.up.sql` under `crates/tally-db/migrations/`
//! 2. Register it in `EMBEDDED`
//! 3. Never edit a script that has shipped; add a new one
//!
//! Scripts run one statement at a time. A statement failing with "already
//! exists" or "duplicate column" is skipped with a warning and the rest of
//! the script still runs; any other failure aborts startup.

use chrono::Utc;
use sqlx::SqlitePool;
use std::borrow::Cow;
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::error::{DbError, DbResult};

/// Suffix every migration file carries.
pub const SCRIPT_SUFFIX: &str = ".up.sql";

/// Scripts compiled into the binary.
const EMBEDDED: &[(&str, &str)] = &[
    (
        "001_initial_schema",
        include_str!("../migrations/001_initial_schema.up.sql"),
    ),
    (
        "002_debt_entry",
        include_str!("../migrations/002_debt_entry.up.sql"),
    ),
];

/// Where a script came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptSource {
    Embedded,
    Filesystem,
}

/// One versioned migration script.
#[derive(Debug, Clone)]
pub struct MigrationScript {
    /// File name without `.up.sql`, e.g. `001_initial_schema`.
    pub version: String,
    pub sql: Cow<'static, str>,
    pub source: ScriptSource,
}

/// Known vs applied migration counts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationStatus {
    pub known: usize,
    pub applied: usize,
    pub pending: Vec<String>,
}

/// Derives the version from a file name: `003_x.up.sql` → `003_x`.
///
/// Returns `None` for anything that is not a migration script.
pub fn version_from_file_name(file_name: &str) -> Option<&str> {
    file_name
        .strip_suffix(SCRIPT_SUFFIX)
        .filter(|version| !version.is_empty())
}

/// Returns the scripts compiled into the binary.
pub fn embedded_scripts() -> Vec<MigrationScript> {
    EMBEDDED
        .iter()
        .map(|(version, sql)| MigrationScript {
            version: (*version).to_string(),
            sql: Cow::Borrowed(*sql),
            source: ScriptSource::Embedded,
        })
        .collect()
}

/// Reads every `*.up.sql` file in `dir`.
///
/// A missing directory yields no scripts. An unreadable file is an error.
pub fn load_directory(dir: &Path) -> DbResult<Vec<MigrationScript>> {
    if !dir.is_dir() {
        warn!(dir = %dir.display(), "Migrations directory not found, skipping");
        return Ok(Vec::new());
    }

    let entries = fs::read_dir(dir)
        .map_err(|e| DbError::MigrationFailed(format!("read {}: {}", dir.display(), e)))?;

    let mut scripts = Vec::new();
    for entry in entries {
        let entry = entry
            .map_err(|e| DbError::MigrationFailed(format!("read {}: {}", dir.display(), e)))?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }

        let Some(version) = path
            .file_name()
            .and_then(|name| name.to_str())
            .and_then(version_from_file_name)
        else {
            continue;
        };

        let sql = fs::read_to_string(&path)
            .map_err(|e| DbError::MigrationFailed(format!("read {}: {}", path.display(), e)))?;

        scripts.push(MigrationScript {
            version: version.to_string(),
            sql: Cow::Owned(sql),
            source: ScriptSource::Filesystem,
        });
    }

    Ok(scripts)
}

/// Merges embedded and filesystem scripts into one sorted list.
///
/// Embedded scripts take precedence when a version appears in both.
pub fn collect_scripts(dir: Option<&Path>) -> DbResult<Vec<MigrationScript>> {
    let mut by_version: BTreeMap<String, MigrationScript> = BTreeMap::new();

    for script in embedded_scripts() {
        by_version.insert(script.version.clone(), script);
    }

    if let Some(dir) = dir {
        for script in load_directory(dir)? {
            if by_version.contains_key(&script.version) {
                debug!(version = %script.version, "Filesystem script shadowed by embedded copy");
                continue;
            }
            by_version.insert(script.version.clone(), script);
        }
    }

    Ok(by_version.into_values().collect())
}

/// Runs all pending migrations from the embedded set plus `dir`.
///
/// ## Returns
/// The versions applied by this call, in order. Empty when up to date.
///
/// ## Errors
/// Any script or bookkeeping failure is `DbError::MigrationFailed`; the
/// caller must not serve requests afterwards.
pub async fn run_migrations(pool: &SqlitePool, dir: Option<&Path>) -> DbResult<Vec<String>> {
    let scripts = collect_scripts(dir)?;
    apply_scripts(pool, &scripts).await
}

/// Applies `scripts` in the given order, skipping recorded versions.
pub async fn apply_scripts(pool: &SqlitePool, scripts: &[MigrationScript]) -> DbResult<Vec<String>> {
    ensure_migrations_table(pool).await?;
    let applied = applied_versions(pool).await?;

    let mut newly_applied = Vec::new();
    for script in scripts {
        if applied.contains(&script.version) {
            continue;
        }
        apply_one(pool, script).await?;
        newly_applied.push(script.version.clone());
    }

    if newly_applied.is_empty() {
        debug!("Schema up to date");
    } else {
        info!(count = newly_applied.len(), "Applied migrations");
    }

    Ok(newly_applied)
}

/// Reports how many known scripts have been applied.
pub async fn migration_status(pool: &SqlitePool, dir: Option<&Path>) -> DbResult<MigrationStatus> {
    ensure_migrations_table(pool).await?;
    let scripts = collect_scripts(dir)?;
    let applied = applied_versions(pool).await?;

    let pending: Vec<String> = scripts
        .iter()
        .filter(|s| !applied.contains(&s.version))
        .map(|s| s.version.clone())
        .collect();

    Ok(MigrationStatus {
        known: scripts.len(),
        applied: scripts.len() - pending.len(),
        pending,
    })
}

async fn ensure_migrations_table(pool: &SqlitePool) -> DbResult<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS schema_migrations (
            version     TEXT PRIMARY KEY,
            applied_at  TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await
    .map_err(|e| DbError::MigrationFailed(format!("create schema_migrations: {}", e)))?;

    Ok(())
}

async fn applied_versions(pool: &SqlitePool) -> DbResult<HashSet<String>> {
    let versions: Vec<String> = sqlx::query_scalar("SELECT version FROM schema_migrations")
        .fetch_all(pool)
        .await
        .map_err(|e| DbError::MigrationFailed(format!("read schema_migrations: {}", e)))?;

    Ok(versions.into_iter().collect())
}

async fn apply_one(pool: &SqlitePool, script: &MigrationScript) -> DbResult<()> {
    let version = script.version.as_str();
    debug!(version, source = ?script.source, "Applying migration");

    let fail = |what: &str, e: sqlx::Error| DbError::MigrationFailed(format!("{version}: {what}: {e}"));

    let mut tx = pool.begin().await.map_err(|e| fail("begin", e))?;

    for (index, statement) in split_statements(script.sql.as_ref()).into_iter().enumerate() {
        match sqlx::raw_sql(statement).execute(&mut *tx).await {
            Ok(_) => {}
            Err(e) if is_already_applied(&e) => {
                warn!(version, statement = index + 1, error = %e, "Statement already applied, skipping");
            }
            Err(e) => return Err(fail(format!("statement {}", index + 1).as_str(), e)),
        }
    }

    sqlx::query("INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)")
        .bind(version)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await
        .map_err(|e| fail("record", e))?;

    tx.commit().await.map_err(|e| fail("commit", e))?;

    info!(version, "Migration applied");
    Ok(())
}

/// Splits a script on top-level `;`.
///
/// Semicolons inside quotes, comments and `CREATE TRIGGER ... BEGIN ... END`
/// bodies do not split. Fragments holding only whitespace or comments are
/// dropped.
pub(crate) fn split_statements(sql: &str) -> Vec<&str> {
    let bytes = sql.as_bytes();
    let len = bytes.len();

    let mut statements = Vec::new();
    let mut start = 0;
    let mut has_code = false;
    let mut in_trigger = false;
    // BEGIN / CASE nesting inside a trigger body
    let mut depth = 0usize;

    let mut i = 0;
    while i < len {
        match bytes[i] {
            quote @ (b'\'' | b'"' | b'`') => {
                has_code = true;
                i += 1;
                while i < len && bytes[i] != quote {
                    i += 1;
                }
            }
            b'[' => {
                has_code = true;
                while i < len && bytes[i] != b']' {
                    i += 1;
                }
            }
            b'-' if bytes.get(i + 1) == Some(&b'-') => {
                while i < len && bytes[i] != b'\n' {
                    i += 1;
                }
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                i += 2;
                while i + 1 < len && !(bytes[i] == b'*' && bytes[i + 1] == b'/') {
                    i += 1;
                }
                i += 1;
            }
            b';' if depth == 0 => {
                if has_code {
                    statements.push(sql[start..i].trim());
                }
                start = i + 1;
                has_code = false;
                in_trigger = false;
            }
            c if c.is_ascii_alphabetic() || c == b'_' => {
                has_code = true;
                let word_start = i;
                while i < len && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
                    i += 1;
                }
                let word = &sql[word_start..i];

                if word.eq_ignore_ascii_case("TRIGGER") {
                    in_trigger = true;
                } else if in_trigger && word.eq_ignore_ascii_case("BEGIN") {
                    depth += 1;
                } else if depth > 0 && word.eq_ignore_ascii_case("CASE") {
                    depth += 1;
                } else if depth > 0 && word.eq_ignore_ascii_case("END") {
                    depth -= 1;
                }
                continue;
            }
            c if !c.is_ascii_whitespace() => has_code = true,
            _ => {}
        }
        i += 1;
    }

    if has_code {
        statements.push(sql[start..].trim());
    }

    statements
}

fn is_already_applied(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = db_err.message().to_ascii_lowercase();
            msg.contains("already exists") || msg.contains("duplicate column")
        }
        _ => false,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use std::path::PathBuf;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("tally-migrations-{}-{}", name, std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_version_from_file_name() {
        assert_eq!(version_from_file_name("001_initial_schema.up.sql"), Some("001_initial_schema"));
        assert_eq!(version_from_file_name("001_initial_schema.down.sql"), None);
        assert_eq!(version_from_file_name(".up.sql"), None);
        assert_eq!(version_from_file_name("README.md"), None);
    }

    #[test]
    fn test_embedded_scripts_are_sorted() {
        let scripts = collect_scripts(None).unwrap();
        let versions: Vec<&str> = scripts.iter().map(|s| s.version.as_str()).collect();
        assert_eq!(versions, vec!["001_initial_schema", "002_debt_entry"]);
    }

    #[test]
    fn test_filesystem_scripts_merge_in_order() {
        let dir = scratch_dir("merge");
        fs::write(dir.join("003_client_email.up.sql"), "ALTER TABLE client ADD COLUMN email TEXT;").unwrap();
        fs::write(dir.join("0025_between.up.sql"), "SELECT 1;").unwrap();
        fs::write(dir.join("001_initial_schema.up.sql"), "THIS IS SHADOWED").unwrap();
        fs::write(dir.join("notes.txt"), "ignored").unwrap();

        let scripts = collect_scripts(Some(&dir)).unwrap();
        let versions: Vec<&str> = scripts.iter().map(|s| s.version.as_str()).collect();
        assert_eq!(
            versions,
            vec!["001_initial_schema", "0025_between", "002_debt_entry", "003_client_email"]
        );
        assert_eq!(scripts[0].source, ScriptSource::Embedded);
        assert_eq!(scripts[3].source, ScriptSource::Filesystem);

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_missing_directory_is_empty() {
        let dir = std::env::temp_dir().join("tally-migrations-does-not-exist");
        assert!(load_directory(&dir).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_migrations_are_idempotent() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        let status = migration_status(db.pool(), None).await.unwrap();
        assert_eq!(status.known, 2);
        assert_eq!(status.applied, 2);
        assert!(status.pending.is_empty());

        let second = run_migrations(db.pool(), None).await.unwrap();
        assert!(second.is_empty());
    }

    #[tokio::test]
    async fn test_filesystem_migration_applies_once() {
        let dir = scratch_dir("apply");
        fs::write(dir.join("003_client_email.up.sql"), "ALTER TABLE client ADD COLUMN email TEXT;").unwrap();

        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let applied = run_migrations(db.pool(), Some(&dir)).await.unwrap();
        assert_eq!(applied, vec!["003_client_email".to_string()]);

        let again = run_migrations(db.pool(), Some(&dir)).await.unwrap();
        assert!(again.is_empty());

        let _ = fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn test_duplicate_column_is_recorded_as_applied() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let scripts = vec![
            MigrationScript {
                version: "010_add_email".to_string(),
                sql: Cow::Borrowed("ALTER TABLE client ADD COLUMN email TEXT;"),
                source: ScriptSource::Filesystem,
            },
            MigrationScript {
                version: "011_add_email_again".to_string(),
                sql: Cow::Borrowed("ALTER TABLE client ADD COLUMN email TEXT;"),
                source: ScriptSource::Filesystem,
            },
        ];

        let applied = apply_scripts(db.pool(), &scripts).await.unwrap();
        assert_eq!(applied.len(), 2);
    }

    #[test]
    fn test_split_statements() {
        let sql = r#"
            -- leading comment; not a statement
            CREATE TABLE tag (name TEXT NOT NULL DEFAULT 'a;b');
            /* block; comment */
            INSERT INTO tag (name) VALUES ("x;y");
            CREATE TRIGGER tag_touch AFTER INSERT ON tag
            BEGIN
                UPDATE tag SET name = CASE WHEN name = '' THEN 'n/a' ELSE name END;
            END;
            SELECT 1
        "#;

        let statements = split_statements(sql);
        assert_eq!(statements.len(), 4);
        assert!(statements[0].ends_with("DEFAULT 'a;b')"));
        assert!(statements[1].starts_with("/* block; comment */"));
        assert!(statements[2].starts_with("CREATE TRIGGER"));
        assert!(statements[2].ends_with("END"));
        assert_eq!(statements[3], "SELECT 1");

        assert!(split_statements("  -- nothing here\n ; ;").is_empty());
    }

    #[tokio::test]
    async fn test_statements_after_duplicate_column_still_run() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let scripts = vec![
            MigrationScript {
                version: "010_email".to_string(),
                sql: Cow::Borrowed("ALTER TABLE client ADD COLUMN email TEXT;"),
                source: ScriptSource::Filesystem,
            },
            MigrationScript {
                version: "011_email_and_tags".to_string(),
                sql: Cow::Borrowed(
                    "ALTER TABLE client ADD COLUMN email TEXT;\n\
                     CREATE TABLE tag (id INTEGER PRIMARY KEY, name TEXT NOT NULL);\n\
                     INSERT INTO tag (name) VALUES ('wholesale');",
                ),
                source: ScriptSource::Filesystem,
            },
        ];

        let applied = apply_scripts(db.pool(), &scripts).await.unwrap();
        assert_eq!(applied, vec!["010_email".to_string(), "011_email_and_tags".to_string()]);

        let tags: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tag")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(tags, 1);
    }

    #[tokio::test]
    async fn test_failure_after_skipped_statement_rolls_back_script() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let scripts = vec![MigrationScript {
            version: "012_half_broken".to_string(),
            sql: Cow::Borrowed(
                "CREATE TABLE client (id INTEGER PRIMARY KEY);\n\
                 CREATE TABLE label (id INTEGER PRIMARY KEY);\n\
                 CREATE TABLE oops (;",
            ),
            source: ScriptSource::Filesystem,
        }];

        let err = apply_scripts(db.pool(), &scripts).await.unwrap_err();
        assert!(matches!(err, DbError::MigrationFailed(_)));

        let label_tables: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'label'",
        )
        .fetch_one(db.pool())
        .await
        .unwrap();
        assert_eq!(label_tables, 0);

        let recorded: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM schema_migrations WHERE version = '012_half_broken'",
        )
        .fetch_one(db.pool())
        .await
        .unwrap();
        assert_eq!(recorded, 0);
    }

    #[tokio::test]
    async fn test_broken_script_is_fatal_and_not_recorded() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let scripts = vec![MigrationScript {
            version: "020_broken".to_string(),
            sql: Cow::Borrowed("CREATE TABLE oops (;"),
            source: ScriptSource::Filesystem,
        }];

        let err = apply_scripts(db.pool(), &scripts).await.unwrap_err();
        assert!(matches!(err, DbError::MigrationFailed(_)));

        let recorded: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM schema_migrations WHERE version = '020_broken'")
                .fetch_one(db.pool())
                .await
                .unwrap();
        assert_eq!(recorded, 0);
    }
}

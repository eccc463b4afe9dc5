//! Database schema migrations.
//!
//! Each schema version `NN` has an embedded `migration_NN_up.sql` in this directory that moves the
//! schema from version `NN-1` to `NN`. Migrations only run forward.
//!
//! The current version is kept in the single-row `schema_version` table.

use crate::error::Res;
use anyhow::{bail, Context};
use sqlx::{Executor, SqlitePool};
use tracing::debug;

/// The schema version this build of roster expects.
pub(crate) const CURRENT_VERSION: i32 = 1;

#[derive(Debug)]
struct Migration {
    /// The version the `up` script produces.
    version: i32,
    up: &'static str,
}

const MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    up: include_str!("migration_01_up.sql"),
}];

/// Creates the `schema_version` table at version 0 if it does not exist yet.
pub(crate) async fn bootstrap(pool: &SqlitePool) -> Res<()> {
    let mut tx = pool
        .begin()
        .await
        .context("Failed to begin bootstrap transaction")?;
    tx.execute("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL)")
        .await
        .context("Failed to create schema_version table")?;
    let (rows,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM schema_version")
        .fetch_one(&mut *tx)
        .await
        .context("Failed to count schema_version rows")?;
    if rows == 0 {
        sqlx::query("INSERT INTO schema_version (version) VALUES (0)")
            .execute(&mut *tx)
            .await
            .context("Failed to insert initial schema version")?;
    }
    tx.commit()
        .await
        .context("Failed to commit bootstrap transaction")
}

/// Reads the schema version recorded in the database.
pub(crate) async fn version(pool: &SqlitePool) -> Res<i32> {
    let (version,): (i32,) = sqlx::query_as("SELECT MAX(version) FROM schema_version")
        .fetch_one(pool)
        .await
        .context("Failed to read the schema version")?;
    Ok(version)
}

/// Moves the schema from `current` up to `target`, one version at a time.
///
/// Every script runs in its own transaction together with the `schema_version` update. All needed
/// scripts are located before the first one runs.
pub(crate) async fn run(pool: &SqlitePool, current: i32, target: i32) -> Res<()> {
    if current == target {
        debug!("Database already at target version {target}, no migrations needed");
        return Ok(());
    }

    for migration in plan(current, target)? {
        debug!("Running migration to version {:02}", migration.version);
        run_migration(pool, migration).await?;
    }

    debug!("Migration complete, schema now at version {target}");
    Ok(())
}

/// The migrations that take the schema from `current` to `target`, in order.
fn plan(current: i32, target: i32) -> Res<Vec<&'static Migration>> {
    if target < current {
        bail!("Cannot migrate the schema down from version {current} to {target}");
    }
    (current + 1..=target)
        .map(|version| {
            MIGRATIONS
                .iter()
                .find(|m| m.version == version)
                .with_context(|| {
                    format!(
                        "Migration {version} is missing but required to migrate from version \
                         {current} to {target}"
                    )
                })
        })
        .collect()
}

async fn run_migration(pool: &SqlitePool, migration: &Migration) -> Res<()> {
    let mut tx = pool
        .begin()
        .await
        .context("Failed to begin migration transaction")?;

    // A script may hold several statements
    tx.execute(migration.up)
        .await
        .context("Failed to execute migration SQL")?;

    sqlx::query("UPDATE schema_version SET version = ?")
        .bind(migration.version)
        .execute(&mut *tx)
        .await
        .context("Failed to update schema_version")?;

    tx.commit()
        .await
        .context("Failed to commit migration transaction")
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
    use tempfile::TempDir;

    async fn empty_db() -> (TempDir, SqlitePool) {
        let temp_dir = TempDir::new().unwrap();
        let options = SqliteConnectOptions::new()
            .filename(temp_dir.path().join("test.sqlite"))
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .unwrap();
        bootstrap(&pool).await.unwrap();
        (temp_dir, pool)
    }

    async fn table_exists(pool: &SqlitePool, name: &str) -> bool {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?")
                .bind(name)
                .fetch_one(pool)
                .await
                .unwrap();
        count > 0
    }

    #[tokio::test]
    async fn test_bootstrap_is_idempotent() {
        let (_temp_dir, pool) = empty_db().await;
        bootstrap(&pool).await.unwrap();
        let (rows,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM schema_version")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(rows, 1);
        assert_eq!(version(&pool).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_migration_up_creates_students() {
        let (_temp_dir, pool) = empty_db().await;
        run(&pool, 0, CURRENT_VERSION).await.unwrap();
        assert_eq!(version(&pool).await.unwrap(), CURRENT_VERSION);
        assert!(table_exists(&pool, "students").await);
    }

    #[tokio::test]
    async fn test_migration_no_op_when_already_at_target() {
        let (_temp_dir, pool) = empty_db().await;
        run(&pool, 0, CURRENT_VERSION).await.unwrap();
        run(&pool, CURRENT_VERSION, CURRENT_VERSION).await.unwrap();
        assert_eq!(version(&pool).await.unwrap(), CURRENT_VERSION);
    }

    #[tokio::test]
    async fn test_students_table_enforces_unique_code() {
        let (_temp_dir, pool) = empty_db().await;
        run(&pool, 0, CURRENT_VERSION).await.unwrap();

        let insert = "INSERT INTO students (student_id, student_name, unique_code, data) \
                      VALUES (?, ?, ?, '{}')";
        sqlx::query(insert)
            .bind("1")
            .bind("Amr")
            .bind("X1")
            .execute(&pool)
            .await
            .unwrap();
        let duplicate = sqlx::query(insert)
            .bind("2")
            .bind("Mona")
            .bind("X1")
            .execute(&pool)
            .await;
        assert!(duplicate.is_err());
    }

    #[test]
    fn test_plan_runs_forward_only() {
        let up = plan(0, CURRENT_VERSION).unwrap();
        assert_eq!(up.len(), CURRENT_VERSION as usize);
        assert_eq!(up.last().unwrap().version, CURRENT_VERSION);
        assert!(plan(CURRENT_VERSION, CURRENT_VERSION).unwrap().is_empty());

        let err = plan(CURRENT_VERSION, 0).unwrap_err();
        assert!(err.to_string().contains("Cannot migrate the schema down"));
    }

    #[test]
    fn test_plan_missing_migration() {
        let err = plan(0, CURRENT_VERSION + 1).unwrap_err();
        assert!(err.to_string().contains("is missing"));
        assert!(plan(CURRENT_VERSION, CURRENT_VERSION + 2).is_err());
    }
}

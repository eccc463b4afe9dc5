//! This module is responsible for reading, writing and managing the SQLite database

mod migrations;

use crate::error::Res;
use crate::model::{StoredStudent, StudentRecord};
use crate::store::StudentStore;
use anyhow::{bail, Context};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, trace};

const MAX_CONNECTIONS: u32 = 5;
const BUSY_TIMEOUT: Duration = Duration::from_secs(10);

/// The SQLite database holding the imported students.
#[derive(Debug, Clone)]
pub(crate) struct Db {
    pool: SqlitePool,
}

impl Db {
    /// - Validates that no file currently exists at `path`
    /// - Creates a new SQLite file at `path`
    /// - Initializes the database schema
    pub(crate) async fn init(path: impl AsRef<Path>) -> Res<Self> {
        let path = path.as_ref();
        if path.exists() {
            bail!("A database already exists at '{}'", path.display());
        }
        let pool = connect(path, true).await?;
        migrations::bootstrap(&pool).await?;
        migrations::run(&pool, 0, migrations::CURRENT_VERSION).await?;
        debug!("Created database at {}", path.display());
        Ok(Self { pool })
    }

    /// - Validates that there is a SQLite file at `path`
    /// - Updates the database schema with migrations if it is out-of-date
    pub(crate) async fn load(path: impl AsRef<Path>) -> Res<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            bail!("The database file is missing '{}'", path.display());
        }
        let pool = connect(path, false).await?;
        migrations::bootstrap(&pool).await?;
        let current = migrations::version(&pool).await?;
        if current > migrations::CURRENT_VERSION {
            bail!(
                "The database schema version {current} is newer than this program supports ({})",
                migrations::CURRENT_VERSION
            );
        }
        migrations::run(&pool, current, migrations::CURRENT_VERSION).await?;
        Ok(Self { pool })
    }

    /// Returns the number of rows in the students table.
    pub(crate) async fn count_students(&self) -> Res<u64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM students")
            .fetch_one(&self.pool)
            .await
            .context("Failed to count students")?;
        Ok(count as u64)
    }
}

async fn connect(path: &Path, create: bool) -> Res<SqlitePool> {
    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(create)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(BUSY_TIMEOUT);
    SqlitePoolOptions::new()
        .max_connections(MAX_CONNECTIONS)
        .connect_with(options)
        .await
        .with_context(|| format!("Unable to open SQLite database at '{}'", path.display()))
}

#[async_trait::async_trait]
impl StudentStore for Db {
    /// Deletes every student and inserts `records` in a single transaction. If any statement fails
    /// the transaction is dropped without committing, which rolls it back.
    async fn replace_all(&self, records: &[StudentRecord]) -> Res<usize> {
        let stored = records
            .iter()
            .map(StudentRecord::to_stored)
            .collect::<Res<Vec<StoredStudent>>>()?;

        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to begin replace transaction")?;

        sqlx::query("DELETE FROM students")
            .execute(&mut *tx)
            .await
            .context("Failed to delete existing students")?;

        for student in &stored {
            trace!("inserting student {}", student.unique_code);
            sqlx::query(
                "INSERT OR REPLACE INTO students (student_id, student_name, unique_code, data) \
                 VALUES (?, ?, ?, ?)",
            )
            .bind(&student.student_id)
            .bind(&student.student_name)
            .bind(&student.unique_code)
            .bind(&student.data)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("Failed to insert student '{}'", student.unique_code))?;
        }

        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM students")
            .fetch_one(&mut *tx)
            .await
            .context("Failed to count inserted students")?;

        tx.commit()
            .await
            .context("Failed to commit replace transaction")?;

        Ok(count as usize)
    }

    async fn get_by_code(&self, code: &str) -> Res<Option<StoredStudent>> {
        sqlx::query_as::<_, StoredStudent>(
            "SELECT student_id, student_name, unique_code, data FROM students \
             WHERE unique_code = ?",
        )
        .bind(code)
        .fetch_optional(&self.pool)
        .await
        .with_context(|| format!("Failed to look up student '{code}'"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CellValue, ExamMap, SessionList};
    use std::sync::Arc;
    use tempfile::TempDir;

    fn student(code: &str, grade: i64) -> StudentRecord {
        let mut sessions = SessionList::new();
        sessions.session_mut(1).grade = Some(CellValue::Int(grade));
        let mut exams = ExamMap::new();
        exams.insert("exam-final", Some(CellValue::from("absent")));
        StudentRecord {
            student_id: Some(grade.to_string()),
            student_name: Some(format!("Student {code}")),
            unique_code: code.to_string(),
            sessions,
            exams,
        }
    }

    #[tokio::test]
    async fn test_init_then_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("roster.sqlite");
        let db = Db::init(&path).await.unwrap();
        assert_eq!(db.count_students().await.unwrap(), 0);
        drop(db);

        // A second init must not clobber the existing file
        assert!(Db::init(&path).await.is_err());

        let db = Db::load(&path).await.unwrap();
        assert_eq!(db.count_students().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_load_missing_file() {
        let dir = TempDir::new().unwrap();
        assert!(Db::load(dir.path().join("nope.sqlite")).await.is_err());
    }

    #[tokio::test]
    async fn test_replace_all_replaces_everything() {
        let dir = TempDir::new().unwrap();
        let db = Db::init(dir.path().join("roster.sqlite")).await.unwrap();

        let count = db
            .replace_all(&[student("A1", 10), student("B2", 20)])
            .await
            .unwrap();
        assert_eq!(count, 2);

        let count = db.replace_all(&[student("C3", 30)]).await.unwrap();
        assert_eq!(count, 1);
        assert_eq!(db.count_students().await.unwrap(), 1);
        assert!(db.get_by_code("A1").await.unwrap().is_none());

        let stored = db.get_by_code("C3").await.unwrap().unwrap();
        assert_eq!(
            StudentRecord::from_stored(stored).unwrap(),
            student("C3", 30)
        );
    }

    #[tokio::test]
    async fn test_replace_all_duplicate_codes_later_wins() {
        let dir = TempDir::new().unwrap();
        let db = Db::init(dir.path().join("roster.sqlite")).await.unwrap();
        let count = db
            .replace_all(&[student("A1", 10), student("A1", 99)])
            .await
            .unwrap();
        assert_eq!(count, 1);
        let stored = db.get_by_code("A1").await.unwrap().unwrap();
        assert_eq!(stored.student_id.as_deref(), Some("99"));
    }

    #[tokio::test]
    async fn test_get_by_code_is_exact() {
        let dir = TempDir::new().unwrap();
        let db = Db::init(dir.path().join("roster.sqlite")).await.unwrap();
        db.replace_all(&[student("Ab1", 1)]).await.unwrap();
        assert!(db.get_by_code("Ab1").await.unwrap().is_some());
        assert!(db.get_by_code("ab1").await.unwrap().is_none());
        assert!(db.get_by_code("Ab1 ").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_readers_never_see_an_empty_store_during_replace() {
        let dir = TempDir::new().unwrap();
        let db = Arc::new(Db::init(dir.path().join("roster.sqlite")).await.unwrap());
        db.replace_all(&[student("KEEP", 1)]).await.unwrap();

        let writer = {
            let db = db.clone();
            tokio::spawn(async move {
                for round in 0..20 {
                    let mut batch: Vec<StudentRecord> =
                        (0..50).map(|i| student(&format!("S{i}"), round)).collect();
                    batch.push(student("KEEP", round));
                    db.replace_all(&batch).await.unwrap();
                }
            })
        };

        let reader = {
            let db = db.clone();
            tokio::spawn(async move {
                for _ in 0..200 {
                    assert!(db.get_by_code("KEEP").await.unwrap().is_some());
                    let count = db.count_students().await.unwrap();
                    assert!(count == 1 || count == 51, "saw a partial batch: {count}");
                    tokio::task::yield_now().await;
                }
            })
        };

        writer.await.unwrap();
        reader.await.unwrap();
    }
}

//! The ingestion pipeline: classifies the header row once, normalizes every data row, drops the rows
//! that cannot become a student, and replaces the stored collection with the result.

pub mod header;
pub mod row;

use crate::error::{Error, ErrorType, IntoResult};
use crate::model::StudentRecord;
use crate::sheet::RawSheet;
use crate::store::StudentStore;
use crate::Result;
use chrono::{DateTime, Utc};
use header::Markers;
use serde::{Deserialize, Serialize};
use std::error::Error as StdError;
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Why a sheet produced no batch.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum IngestError {
    /// Fewer than two rows, so there is no header + data pair.
    EmptySheet,
    /// Every data row was empty or lacked a unique code.
    NoValidRows,
}

impl Display for IngestError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            IngestError::EmptySheet => f.write_str("The file is empty or has no data rows."),
            IngestError::NoValidRows => {
                f.write_str("No students with a unique code were found in the file.")
            }
        }
    }
}

impl StdError for IngestError {}

/// Turns `sheet` into an ordered batch of students.
///
/// The records come out in row order. Rows that are empty or lack a unique code are dropped.
pub fn ingest(
    sheet: &RawSheet,
    markers: &Markers,
) -> std::result::Result<Vec<StudentRecord>, IngestError> {
    if sheet.len() < 2 {
        return Err(IngestError::EmptySheet);
    }
    let header = sheet.header().unwrap_or_default();
    let fields = header::classify(&header, markers);
    debug!("Classified header: {fields:?}");

    let records: Vec<StudentRecord> = sheet
        .data_rows()
        .iter()
        .filter_map(|r| row::normalize(r, &fields))
        .collect();

    debug!(
        "{} of {} data rows produced a student",
        records.len(),
        sheet.data_rows().len()
    );

    if records.is_empty() {
        return Err(IngestError::NoValidRows);
    }
    Ok(records)
}

/// The outcome of a successful import.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct ImportSummary {
    /// The number of students now in the store.
    pub count: usize,
    pub imported_at: DateTime<Utc>,
}

/// Runs `ingest` and installs the batch in a `StudentStore`.
///
/// Imports are serialized: only one replace runs at a time, so readers see either the whole old
/// collection or the whole new one.
#[derive(Clone)]
pub struct IngestionPipeline {
    store: Arc<dyn StudentStore>,
    markers: Markers,
    lock: Arc<Mutex<()>>,
}

impl IngestionPipeline {
    pub fn new(store: Arc<dyn StudentStore>, markers: Markers) -> Self {
        Self {
            store,
            markers,
            lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn markers(&self) -> &Markers {
        &self.markers
    }

    /// Ingests `sheet` and replaces every stored student with the result.
    ///
    /// # Errors
    /// - `ErrorType::UserInput` if the sheet is empty or has no rows with a unique code.
    /// - `ErrorType::Storage` if the replace fails. The previous collection is left in place.
    pub async fn run(&self, sheet: &RawSheet) -> Result<ImportSummary> {
        let records = ingest(sheet, &self.markers)
            .map_err(|e| Error::message(ErrorType::UserInput, e))?;

        let _guard = self.lock.lock().await;
        let count = self
            .store
            .replace_all(&records)
            .await
            .pub_result(ErrorType::Storage)?;

        info!("{count} students inserted successfully.");
        Ok(ImportSummary {
            count,
            imported_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Db;
    use crate::error::Res;
    use crate::model::{Cell, CellValue, StoredStudent};
    use crate::store::MemoryStore;

    fn text(s: &str) -> Cell {
        Some(CellValue::from(s))
    }

    fn header() -> Vec<Cell> {
        vec![
            text("ID"),
            text("Name"),
            text("session exam grade 1"),
            text("code"),
        ]
    }

    #[test]
    fn test_header_only_sheet_is_empty() {
        let sheet = RawSheet::new(vec![header()]);
        assert_eq!(
            ingest(&sheet, &Markers::default()),
            Err(IngestError::EmptySheet)
        );
        let sheet = RawSheet::default();
        assert_eq!(
            ingest(&sheet, &Markers::default()),
            Err(IngestError::EmptySheet)
        );
    }

    #[test]
    fn test_only_rows_with_codes_survive() {
        let sheet = RawSheet::new(vec![
            header(),
            vec![text("1"), text("A"), text("10")],
            vec![text("2"), text("B"), text("20"), text("B2")],
            vec![text("3"), text("C"), text("30"), text("")],
        ]);
        let records = ingest(&sheet, &Markers::default()).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].unique_code, "B2");
    }

    #[test]
    fn test_no_valid_rows() {
        let sheet = RawSheet::new(vec![header(), vec![], vec![text("1"), text("A")]]);
        assert_eq!(
            ingest(&sheet, &Markers::default()),
            Err(IngestError::NoValidRows)
        );
    }

    #[test]
    fn test_records_keep_row_order() {
        let sheet = RawSheet::new(vec![
            header(),
            vec![text("1"), text("A"), None, text("Z9")],
            vec![],
            vec![text("2"), text("B"), None, text("A1")],
        ]);
        let codes: Vec<String> = ingest(&sheet, &Markers::default())
            .unwrap()
            .into_iter()
            .map(|r| r.unique_code)
            .collect();
        assert_eq!(codes, vec!["Z9", "A1"]);
    }

    #[test]
    fn test_ingest_error_messages() {
        assert_eq!(
            IngestError::EmptySheet.to_string(),
            "The file is empty or has no data rows."
        );
        assert_eq!(
            IngestError::NoValidRows.to_string(),
            "No students with a unique code were found in the file."
        );
    }

    #[tokio::test]
    async fn test_run_replaces_store() {
        let store = Arc::new(MemoryStore::new());
        let pipeline = IngestionPipeline::new(store.clone(), Markers::default());

        let first = RawSheet::new(vec![
            header(),
            vec![text("1"), text("A"), text("10"), text("A1")],
            vec![text("2"), text("B"), text("20"), text("B2")],
        ]);
        assert_eq!(pipeline.run(&first).await.unwrap().count, 2);

        let second = RawSheet::new(vec![
            header(),
            vec![text("3"), text("C"), text("30"), text("C3")],
        ]);
        assert_eq!(pipeline.run(&second).await.unwrap().count, 1);

        assert!(store.get_by_code("A1").await.unwrap().is_none());
        assert!(store.get_by_code("C3").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_run_user_errors_leave_store_alone() {
        let store = Arc::new(MemoryStore::new());
        let pipeline = IngestionPipeline::new(store.clone(), Markers::default());
        let good = RawSheet::new(vec![
            header(),
            vec![text("1"), text("A"), text("10"), text("A1")],
        ]);
        pipeline.run(&good).await.unwrap();

        let err = pipeline
            .run(&RawSheet::new(vec![header()]))
            .await
            .unwrap_err();
        assert_eq!(err.error_type(), ErrorType::UserInput);
        assert_eq!(err.user_message(), "The file is empty or has no data rows.");

        let err = pipeline
            .run(&RawSheet::new(vec![header(), vec![text("x")]]))
            .await
            .unwrap_err();
        assert_eq!(err.error_type(), ErrorType::UserInput);

        assert!(store.get_by_code("A1").await.unwrap().is_some());
    }

    struct FailingStore;

    #[async_trait::async_trait]
    impl StudentStore for FailingStore {
        async fn replace_all(&self, _records: &[StudentRecord]) -> Res<usize> {
            anyhow::bail!("database is locked")
        }

        async fn get_by_code(&self, _code: &str) -> Res<Option<StoredStudent>> {
            Ok(None)
        }
    }

    #[tokio::test]
    async fn test_run_storage_failure() {
        let pipeline = IngestionPipeline::new(Arc::new(FailingStore), Markers::default());
        let sheet = RawSheet::new(vec![
            header(),
            vec![text("1"), text("A"), text("10"), text("A1")],
        ]);
        let err = pipeline.run(&sheet).await.unwrap_err();
        assert_eq!(err.error_type(), ErrorType::Storage);
    }

    fn batch(size: usize, round: usize) -> RawSheet {
        let mut rows = vec![header()];
        rows.push(vec![text("0"), text("keeper"), text("1"), text("KEEP")]);
        for i in 1..size {
            rows.push(vec![
                Some(CellValue::Int(i as i64)),
                text("student"),
                Some(CellValue::Int(round as i64)),
                Some(CellValue::from(format!("S{i}"))),
            ]);
        }
        RawSheet::new(rows)
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_uploads_never_expose_a_partial_store() {
        let dir = tempfile::TempDir::new().unwrap();
        let db = Arc::new(Db::init(dir.path().join("roster.sqlite")).await.unwrap());
        let shared = IngestionPipeline::new(db.clone(), Markers::default());
        shared.run(&batch(3, 0)).await.unwrap();

        // Two clones share the upload lock, the third pipeline has its own and races at the
        // SQLite level
        let uploaders = [
            (shared.clone(), 3),
            (shared.clone(), 5),
            (IngestionPipeline::new(db.clone(), Markers::default()), 7),
        ]
        .into_iter()
        .map(|(pipeline, size)| {
            tokio::spawn(async move {
                for round in 0..10 {
                    let summary = pipeline.run(&batch(size, round)).await.unwrap();
                    assert_eq!(summary.count, size);
                }
            })
        })
        .collect::<Vec<_>>();

        let reader = {
            let db = db.clone();
            tokio::spawn(async move {
                for _ in 0..300 {
                    assert!(db.get_by_code("KEEP").await.unwrap().is_some());
                    let count = db.count_students().await.unwrap();
                    assert!(
                        [3, 5, 7].contains(&count),
                        "saw an incomplete batch of {count}"
                    );
                    tokio::task::yield_now().await;
                }
            })
        };

        for uploader in uploaders {
            uploader.await.unwrap();
        }
        reader.await.unwrap();
    }
}

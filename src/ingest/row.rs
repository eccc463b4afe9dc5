//! Builds one `StudentRecord` from one data row.

use crate::ingest::header::{HeaderField, Identity};
use crate::model::{Cell, CellValue, ExamMap, SessionList, StudentRecord};

/// Normalizes `row` using the classified `fields` of the header row.
///
/// Returns `None` for a row with no cells and for a row without a unique code. Cells that are
/// missing because the row is shorter than the header are treated as absent. Individual cells are
/// never rejected.
pub fn normalize(row: &[Cell], fields: &[HeaderField]) -> Option<StudentRecord> {
    if row.is_empty() {
        return None;
    }

    let cell = |ix: usize| row.get(ix).and_then(Option::as_ref);
    let identity = |which: Identity| {
        fields
            .iter()
            .position(|f| *f == HeaderField::Identity(which))
            .and_then(cell)
    };

    let unique_code = identity(Identity::UniqueCode)
        .map(CellValue::to_text)
        .filter(|code| !code.is_empty())?;

    let mut sessions = SessionList::new();
    let mut exams = ExamMap::new();

    for (ix, field) in fields.iter().enumerate() {
        let value = cell(ix).cloned();
        match field {
            HeaderField::SessionGrade(n) => sessions.session_mut(*n).grade = value,
            HeaderField::SessionAttendance(n) => sessions.session_mut(*n).attendance = value,
            HeaderField::NamedExam(label) => exams.insert(label.as_str(), value),
            HeaderField::Identity(_) | HeaderField::Ignored => {}
        }
    }

    Some(StudentRecord {
        student_id: identity(Identity::Id).map(CellValue::to_text),
        student_name: identity(Identity::Name).map(CellValue::to_text),
        unique_code,
        sessions,
        exams,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::header::{classify, Markers};
    use crate::model::SessionEntry;

    fn fields(items: &[&str]) -> Vec<HeaderField> {
        let header: Vec<Option<String>> = items
            .iter()
            .map(|s| (!s.is_empty()).then(|| s.to_string()))
            .collect();
        classify(&header, &Markers::default())
    }

    fn text(s: &str) -> Cell {
        Some(CellValue::from(s))
    }

    fn int(i: i64) -> Cell {
        Some(CellValue::Int(i))
    }

    fn example_fields() -> Vec<HeaderField> {
        fields(&[
            "ID",
            "Name",
            "session exam grade 3",
            "session attendance 1",
            "exam-final",
            "code",
        ])
    }

    #[test]
    fn test_normalize_example_row() {
        let row = vec![int(7), text("Amr"), int(88), text("present"), int(95), text("X1")];
        let record = normalize(&row, &example_fields()).unwrap();

        assert_eq!(record.student_id.as_deref(), Some("7"));
        assert_eq!(record.student_name.as_deref(), Some("Amr"));
        assert_eq!(record.unique_code, "X1");
        assert_eq!(
            record.sessions,
            SessionList::from(vec![
                SessionEntry {
                    grade: None,
                    attendance: text("present"),
                },
                SessionEntry {
                    grade: None,
                    attendance: None,
                },
                SessionEntry {
                    grade: int(88),
                    attendance: None,
                },
            ])
        );
        assert_eq!(record.exams.len(), 1);
        assert_eq!(record.exams.get("exam-final"), Some(&int(95)));
    }

    #[test]
    fn test_empty_row_is_skipped() {
        assert_eq!(normalize(&[], &example_fields()), None);
    }

    #[test]
    fn test_row_without_code_is_skipped() {
        let f = example_fields();
        // Code cell absent
        let row = vec![int(7), text("Amr"), int(88), None, None, None];
        assert_eq!(normalize(&row, &f), None);
        // Code cell is empty text
        let row = vec![int(7), text("Amr"), int(88), None, None, text("")];
        assert_eq!(normalize(&row, &f), None);
        // Row shorter than the header, so the code is out of bounds
        let row = vec![int(7), text("Amr")];
        assert_eq!(normalize(&row, &f), None);
    }

    #[test]
    fn test_code_is_not_trimmed() {
        let row = vec![None, None, None, None, None, text(" X1 ")];
        let record = normalize(&row, &example_fields()).unwrap();
        assert_eq!(record.unique_code, " X1 ");
        assert_eq!(record.student_id, None);
        assert_eq!(record.student_name, None);
    }

    #[test]
    fn test_numeric_code_uses_text_form() {
        let row = vec![int(7), text("Amr"), None, None, None, int(1234)];
        let record = normalize(&row, &example_fields()).unwrap();
        assert_eq!(record.unique_code, "1234");
    }

    #[test]
    fn test_sessions_length_is_max_index() {
        let f = fields(&[
            "ID",
            "Name",
            "session attendance 2",
            "session exam grade 5",
            "session attendance 4",
            "code",
        ]);
        // Values absent, but the headers are present so the list still grows
        let row = vec![int(1), text("A"), None, None, None, text("C1")];
        let record = normalize(&row, &f).unwrap();
        assert_eq!(record.sessions.len(), 5);
        assert!(record.sessions.iter().all(|s| *s == SessionEntry::default()));
    }

    #[test]
    fn test_no_session_headers_means_no_sessions() {
        let f = fields(&["ID", "Name", "exam 1", "code"]);
        let row = vec![int(1), text("A"), int(10), text("C1")];
        let record = normalize(&row, &f).unwrap();
        assert!(record.sessions.is_empty());
        assert_eq!(record.exams.get("exam 1"), Some(&int(10)));
    }

    #[test]
    fn test_grade_and_attendance_share_a_session() {
        let f = fields(&[
            "ID",
            "Name",
            "session attendance 1",
            "session exam grade 1",
            "code",
        ]);
        let row = vec![int(1), text("A"), Some(CellValue::Bool(true)), int(9), text("C1")];
        let record = normalize(&row, &f).unwrap();
        assert_eq!(record.sessions.len(), 1);
        assert_eq!(
            record.sessions.session(1),
            Some(&SessionEntry {
                grade: int(9),
                attendance: Some(CellValue::Bool(true)),
            })
        );
    }

    #[test]
    fn test_duplicate_exam_label_last_write_wins() {
        let f = fields(&["ID", "Name", "exam 1", "review", "exam 1", "code"]);
        let row = vec![int(1), text("A"), int(10), int(20), int(30), text("C1")];
        let record = normalize(&row, &f).unwrap();
        assert_eq!(record.exams.len(), 2);
        assert_eq!(record.exams.get("exam 1"), Some(&int(30)));
        let labels: Vec<&str> = record.exams.iter().map(|(label, _)| label).collect();
        assert_eq!(labels, vec!["exam 1", "review"]);
    }

    #[test]
    fn test_duplicate_exam_label_later_absent_overwrites() {
        let f = fields(&["ID", "Name", "exam 1", "exam 1", "code"]);
        let row = vec![int(1), text("A"), int(10), None, text("C1")];
        let record = normalize(&row, &f).unwrap();
        assert_eq!(record.exams.get("exam 1"), Some(&None));
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let f = example_fields();
        let row = vec![int(7), text("Amr"), int(88), text("present"), int(95), text("X1")];
        assert_eq!(normalize(&row, &f), normalize(&row, &f));
    }

    #[test]
    fn test_ignored_columns_are_not_consulted() {
        let f = fields(&["ID", "Name", "notes", "", "code"]);
        let row = vec![int(1), text("A"), text("likes math"), text("?"), text("C1")];
        let record = normalize(&row, &f).unwrap();
        assert!(record.sessions.is_empty());
        assert!(record.exams.is_empty());
    }
}

//! Decides what each column of an uploaded sheet means by looking at its header label and position.

use serde::{Deserialize, Serialize};

/// Marks a session grade column, e.g. `درجة امتحان حصة 3`.
pub const SESSION_GRADE_AR: &str = "درجة امتحان حصة";
/// Marks a session attendance column, e.g. `حضور حصة 1`.
pub const SESSION_ATTENDANCE_AR: &str = "حضور حصة";
/// Marks a named exam column.
pub const EXAM_AR: &str = "امتحان";
/// Marks a named review column, grouped with exams.
pub const REVIEW_AR: &str = "مراجعة";

pub const SESSION_GRADE_EN: &str = "session exam grade";
pub const SESSION_ATTENDANCE_EN: &str = "session attendance";
pub const EXAM_EN: &str = "exam";
pub const REVIEW_EN: &str = "review";

/// Session numbers above this are treated as unresolvable.
pub const MAX_SESSION_INDEX: usize = 1000;

/// Which identity a column holds. These are assigned by position, not by label.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum Identity {
    Id,
    Name,
    UniqueCode,
}

/// The meaning of one column.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub enum HeaderField {
    /// The grade for 1-based session `n`.
    SessionGrade(usize),
    /// The attendance for 1-based session `n`.
    SessionAttendance(usize),
    /// An exam or review whose label is the header text.
    NamedExam(String),
    Identity(Identity),
    Ignored,
}

/// The substrings that identify session and exam columns. A label matches a marker list if it
/// contains any of the list's entries.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Markers {
    pub session_grade: Vec<String>,
    pub session_attendance: Vec<String>,
    pub exam: Vec<String>,
}

impl Default for Markers {
    fn default() -> Self {
        Self {
            session_grade: vec![SESSION_GRADE_AR.into(), SESSION_GRADE_EN.into()],
            session_attendance: vec![SESSION_ATTENDANCE_AR.into(), SESSION_ATTENDANCE_EN.into()],
            exam: vec![
                EXAM_AR.into(),
                REVIEW_AR.into(),
                EXAM_EN.into(),
                REVIEW_EN.into(),
            ],
        }
    }
}

impl Markers {
    /// Classifies a single label without regard to its position. Session markers take precedence
    /// over exam markers.
    pub fn classify_label(&self, label: &str) -> HeaderField {
        if contains_any(label, &self.session_grade) {
            return match session_index(label) {
                Some(n) => HeaderField::SessionGrade(n),
                None => HeaderField::Ignored,
            };
        }
        if contains_any(label, &self.session_attendance) {
            return match session_index(label) {
                Some(n) => HeaderField::SessionAttendance(n),
                None => HeaderField::Ignored,
            };
        }
        if contains_any(label, &self.exam) {
            return HeaderField::NamedExam(label.to_string());
        }
        HeaderField::Ignored
    }
}

/// Classifies every column of `header_row`. The result has the same length as the input.
///
/// Column 0 is always the student id, column 1 the student name and the last column the unique
/// code, whatever their labels say. With fewer than three columns the unique code wins. Every
/// other column is classified by its label; blank labels are ignored.
pub fn classify(header_row: &[Option<String>], markers: &Markers) -> Vec<HeaderField> {
    let last = header_row.len().checked_sub(1);
    header_row
        .iter()
        .enumerate()
        .map(|(ix, label)| {
            if Some(ix) == last {
                return HeaderField::Identity(Identity::UniqueCode);
            }
            match ix {
                0 => HeaderField::Identity(Identity::Id),
                1 => HeaderField::Identity(Identity::Name),
                _ => match label.as_deref() {
                    Some(label) if !label.is_empty() => markers.classify_label(label),
                    _ => HeaderField::Ignored,
                },
            }
        })
        .collect()
}

fn contains_any(label: &str, markers: &[String]) -> bool {
    markers
        .iter()
        .any(|m| !m.is_empty() && label.contains(m.as_str()))
}

/// Parses the first run of ASCII digits in `label`. Returns `None` when there is no run, when it
/// is zero, or when it is larger than `MAX_SESSION_INDEX`.
fn session_index(label: &str) -> Option<usize> {
    let start = label.find(|c: char| c.is_ascii_digit())?;
    let digits = &label[start..];
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    let n: usize = digits[..end].parse().ok()?;
    (1..=MAX_SESSION_INDEX).contains(&n).then_some(n)
}

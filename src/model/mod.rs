//! Types that represent the core data model, such as `StudentRecord` and `CellValue`.
mod cell;
mod student;

pub use cell::{Cell, CellValue};
pub use student::{ExamMap, SessionEntry, SessionList, StoredStudent, StudentRecord};

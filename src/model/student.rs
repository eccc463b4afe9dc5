use crate::error::Res;
use crate::model::Cell;
use anyhow::Context;
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt::Formatter;

/// One session's grade and attendance. Either may be absent.
#[derive(Default, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionEntry {
    pub grade: Cell,
    pub attendance: Cell,
}

/// The dense list of a student's sessions. Session `n` lives at position `n - 1`.
///
/// The list only ever grows, and it only grows through `ensure_len`, which fills new slots with
/// entries whose grade and attendance are both absent.
#[derive(Default, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionList(Vec<SessionEntry>);

impl SessionList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Grows the list to at least `len` entries.
    pub fn ensure_len(&mut self, len: usize) {
        if self.0.len() < len {
            self.0.resize_with(len, SessionEntry::default);
        }
    }

    /// Returns the entry for 1-based `session`, growing the list if needed. `session` must be
    /// greater than zero.
    pub fn session_mut(&mut self, session: usize) -> &mut SessionEntry {
        debug_assert!(session > 0, "session numbers start at 1");
        self.ensure_len(session);
        &mut self.0[session - 1]
    }

    /// Returns the entry for 1-based `session`, if the list is long enough.
    pub fn session(&self, session: usize) -> Option<&SessionEntry> {
        session.checked_sub(1).and_then(|ix| self.0.get(ix))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SessionEntry> {
        self.0.iter()
    }
}

impl From<Vec<SessionEntry>> for SessionList {
    fn from(value: Vec<SessionEntry>) -> Self {
        Self(value)
    }
}

/// Exam values keyed by the exam's header label.
///
/// Keys are unique. Inserting a label that already exists overwrites its value (last write wins)
/// while keeping the position of the first occurrence, so iteration follows the order of the
/// columns in the uploaded sheet. Serializes as a JSON object in that order.
#[derive(Default, Debug, Clone, PartialEq)]
pub struct ExamMap(Vec<(String, Cell)>);

impl ExamMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `label` to `value`, overwriting any earlier value for the same label.
    pub fn insert(&mut self, label: impl Into<String>, value: Cell) {
        let label = label.into();
        match self.0.iter_mut().find(|(existing, _)| *existing == label) {
            Some((_, slot)) => *slot = value,
            None => self.0.push((label, value)),
        }
    }

    /// Returns `None` when the label is unknown and `Some(None)` when the label is known but its
    /// value is absent.
    pub fn get(&self, label: &str) -> Option<&Cell> {
        self.0
            .iter()
            .find(|(existing, _)| existing == label)
            .map(|(_, value)| value)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Cell)> {
        self.0.iter().map(|(label, value)| (label.as_str(), value))
    }
}

impl Serialize for ExamMap {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (label, value) in &self.0 {
            map.serialize_entry(label, value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for ExamMap {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct ExamMapVisitor;

        impl<'de> Visitor<'de> for ExamMapVisitor {
            type Value = ExamMap;

            fn expecting(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
                f.write_str("a map of exam labels to values")
            }

            fn visit_map<A>(self, mut access: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut exams = ExamMap::new();
                while let Some((label, value)) = access.next_entry::<String, Cell>()? {
                    exams.insert(label, value);
                }
                Ok(exams)
            }
        }

        deserializer.deserialize_map(ExamMapVisitor)
    }
}

/// A normalized student built from one row of an uploaded sheet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct StudentRecord {
    pub student_id: Option<String>,
    pub student_name: Option<String>,
    /// Never empty. This is the primary key in the store.
    pub unique_code: String,
    pub sessions: SessionList,
    pub exams: ExamMap,
}

impl StudentRecord {
    /// Converts the record into the shape that is persisted, serializing sessions and exams into
    /// the opaque `data` payload.
    pub fn to_stored(&self) -> Res<StoredStudent> {
        let payload = StudentPayloadRef {
            sessions: &self.sessions,
            exams: &self.exams,
        };
        let data = serde_json::to_string(&payload).with_context(|| {
            format!(
                "Unable to serialize the payload for student '{}'",
                self.unique_code
            )
        })?;
        Ok(StoredStudent {
            student_id: self.student_id.clone(),
            student_name: self.student_name.clone(),
            unique_code: self.unique_code.clone(),
            data,
        })
    }

    /// Rebuilds a record from its persisted shape. Fails if the payload is not valid.
    pub fn from_stored(stored: StoredStudent) -> Res<Self> {
        let payload: StudentPayload = serde_json::from_str(&stored.data).with_context(|| {
            format!(
                "The stored payload for student '{}' is corrupt",
                stored.unique_code
            )
        })?;
        Ok(Self {
            student_id: stored.student_id,
            student_name: stored.student_name,
            unique_code: stored.unique_code,
            sessions: payload.sessions,
            exams: payload.exams,
        })
    }
}

/// A student row as it is kept in the store.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct StoredStudent {
    pub student_id: Option<String>,
    pub student_name: Option<String>,
    pub unique_code: String,
    /// JSON: `{"sessions": [...], "exams": {...}}`
    pub data: String,
}

#[derive(Deserialize)]
struct StudentPayload {
    #[serde(default)]
    sessions: SessionList,
    #[serde(default)]
    exams: ExamMap,
}

#[derive(Serialize)]
struct StudentPayloadRef<'a> {
    sessions: &'a SessionList,
    exams: &'a ExamMap,
}

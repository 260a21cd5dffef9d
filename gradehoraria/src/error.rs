use chrono::NaiveTime;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

use crate::models::{Day, Shift, TermKey};

/// Entrada rechazada antes de tocar el `EventStore`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("entry {entry_id}: a course is required")]
    MissingCourse { entry_id: String },
    #[error("entry {entry_id}: at least one instructor is required")]
    MissingInstructor { entry_id: String },
    #[error("entry {entry_id}: at most two instructors are allowed, got {count}")]
    TooManyInstructors { entry_id: String, count: usize },
    #[error("entry {entry_id}: instructor {instructor_id} is listed twice")]
    DuplicateInstructor { entry_id: String, instructor_id: String },
    #[error("entry {entry_id}: unknown course {course_id}")]
    UnknownCourse { entry_id: String, course_id: String },
    #[error("entry {entry_id}: unknown instructor {instructor_id}")]
    UnknownInstructor { entry_id: String, instructor_id: String },
    #[error("entry {entry_id}: day {day} is outside 1..=6")]
    InvalidDay { entry_id: String, day: Day },
    #[error("entry {entry_id}: {start} is not a slot of any shift")]
    OutsideShift { entry_id: String, start: NaiveTime },
    #[error("entry {entry_id}: phase {phase} is not offered in the {shift} shift for {term}")]
    ShiftNotOffered { entry_id: String, phase: u8, shift: Shift, term: TermKey },
    #[error("entry {entry_id}: belongs to {found}, session is editing {expected}")]
    WrongTerm { entry_id: String, found: TermKey, expected: TermKey },
    #[error("entry {entry_id} already exists")]
    DuplicateId { entry_id: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOp {
    ListCourses,
    ListInstructors,
    ListCurricula,
    ListOfferings,
    ListEntries,
    Create,
    Update,
    Delete,
    Open,
}

impl fmt::Display for StoreOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StoreOp::ListCourses => "list courses",
            StoreOp::ListInstructors => "list instructors",
            StoreOp::ListCurricula => "list curricula",
            StoreOp::ListOfferings => "list offerings",
            StoreOp::ListEntries => "list timetable entries",
            StoreOp::Create => "create timetable entries",
            StoreOp::Update => "update timetable entry",
            StoreOp::Delete => "delete timetable entry",
            StoreOp::Open => "open store",
        };
        f.write_str(s)
    }
}

/// Falla de red/almacenamiento. `target` identifica la fila o el periodo.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{op} failed for {target}: {cause}")]
pub struct PersistenceError {
    pub op: StoreOp,
    pub target: String,
    pub cause: String,
}

impl PersistenceError {
    pub fn new(op: StoreOp, target: impl Into<String>, cause: impl fmt::Display) -> Self {
        PersistenceError { op, target: target.into(), cause: cause.to_string() }
    }
}

/// Fila persistida que no se puede resolver; se omite al hidratar.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DataIntegrityWarning {
    #[error("row {row_id} ({term}): unknown course {course_id}")]
    UnknownCourse { row_id: String, term: TermKey, course_id: String },
    #[error("row {row_id} ({term}): day code {day} cannot be resolved")]
    InvalidDay { row_id: String, term: TermKey, day: Day },
    #[error("row {row_id} ({term}): start {start} is outside every shift")]
    OutsideShift { row_id: String, term: TermKey, start: NaiveTime },
    #[error("row {row_id} ({term}): duration must be at least one slot")]
    EmptyDuration { row_id: String, term: TermKey },
    #[error("row {row_id} ({term}): start time '{raw}' cannot be read")]
    UnreadableStart { row_id: String, term: TermKey, raw: String },
}

#[derive(Error, Debug)]
pub enum ScheduleError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
    #[error("entry {0} not found")]
    EntryNotFound(String),
    #[error("a sync is already in flight")]
    SyncInProgress,
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} is not set")]
    Missing(&'static str),
    #[error("{var} has an invalid value '{value}': {reason}")]
    Invalid { var: &'static str, value: String, reason: String },
    #[error("GRADE_DB_URL uses unsupported scheme: {0}")]
    UnsupportedScheme(String),
}

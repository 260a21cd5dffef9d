// Capa de persistencia: contrato CRUD externo + hidratación de filas.
pub mod memory;
pub mod sqlite;

use std::collections::{BTreeMap, HashMap};

use tracing::warn;

use crate::algorithm::time::remaining_slots;
use crate::error::{DataIntegrityWarning, PersistenceError};
use crate::models::{
    Assignment, Course, Curriculum, FIRST_DAY, Instructor, LAST_DAY, Offering, PersistedRow, TermKey, TimetableEntry,
};

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Almacén CRUD de cursos, docentes, ofertas y horarios.
#[allow(async_fn_in_trait)]
pub trait TimetableStore {
    async fn list_courses(&self) -> Result<Vec<Course>, PersistenceError>;
    async fn list_instructors(&self) -> Result<Vec<Instructor>, PersistenceError>;
    async fn list_curricula(&self) -> Result<Vec<Curriculum>, PersistenceError>;
    async fn list_offerings(&self, term: TermKey, curriculum_id: &str) -> Result<Vec<Offering>, PersistenceError>;
    async fn list_timetable_entries(&self, term: TermKey, curriculum_id: &str) -> Result<Vec<PersistedRow>, PersistenceError>;
    async fn create_timetable_entries_bulk(&self, rows: &[PersistedRow]) -> Result<(), PersistenceError>;
    async fn update_timetable_entry(&self, id: &str, row: &PersistedRow) -> Result<(), PersistenceError>;
    async fn delete_timetable_entry(&self, id: &str) -> Result<(), PersistenceError>;

    /// Filas que el almacén no pudo ni leer (p. ej. hora ilegible). Se
    /// vacía en cada llamada.
    fn drain_warnings(&self) -> Vec<DataIntegrityWarning> {
        Vec::new()
    }
}

/// Revisa que la fila se pueda usar: CCR conocido, día 1..=6, inicio dentro
/// de algún turno y duración positiva. Con `courses` vacío no se valida el CCR.
pub fn check_row(row: &PersistedRow, courses: &HashMap<String, Course>) -> Result<(), DataIntegrityWarning> {
    let row_id = row.id.clone();
    let term = row.term_key();
    if !courses.is_empty() && !courses.contains_key(&row.course_id) {
        return Err(DataIntegrityWarning::UnknownCourse { row_id, term, course_id: row.course_id.clone() });
    }
    if !(FIRST_DAY..=LAST_DAY).contains(&row.day) {
        return Err(DataIntegrityWarning::InvalidDay { row_id, term, day: row.day });
    }
    if remaining_slots(row.start_time).is_none() {
        return Err(DataIntegrityWarning::OutsideShift { row_id, term, start: row.start_time });
    }
    if row.duration_slots == 0 {
        return Err(DataIntegrityWarning::EmptyDuration { row_id, term });
    }
    Ok(())
}

/// Separa filas válidas de las que no se pueden resolver (se registran con
/// `warn!` y se devuelven como avisos).
pub fn partition_rows<'a>(
    rows: &'a [PersistedRow],
    courses: &HashMap<String, Course>,
) -> (Vec<&'a PersistedRow>, Vec<DataIntegrityWarning>) {
    let mut ok = Vec::new();
    let mut warnings = Vec::new();
    for row in rows {
        match check_row(row, courses) {
            Ok(()) => ok.push(row),
            Err(w) => {
                warn!(row_id = %row.id, "skipping persisted row: {}", w);
                warnings.push(w);
            }
        }
    }
    (ok, warnings)
}

pub fn resolve_assignments(rows: &[PersistedRow], courses: &HashMap<String, Course>) -> (Vec<Assignment>, Vec<DataIntegrityWarning>) {
    let (ok, warnings) = partition_rows(rows, courses);
    (ok.into_iter().map(Assignment::from_row).collect(), warnings)
}

/// Reagrupa las filas por id base en entradas de la grilla. Los docentes
/// quedan en orden de sufijo; los demás campos salen de la fila de menor
/// sufijo.
pub fn hydrate_entries(rows: &[PersistedRow], courses: &HashMap<String, Course>) -> (Vec<TimetableEntry>, Vec<DataIntegrityWarning>) {
    let (ok, warnings) = partition_rows(rows, courses);

    let mut groups: BTreeMap<String, Vec<&PersistedRow>> = BTreeMap::new();
    for row in ok {
        groups.entry(row.entry_id().base).or_default().push(row);
    }

    let mut entries = Vec::new();
    for (base, mut group) in groups {
        group.sort_by_key(|r| r.entry_id().slot);
        let first = group[0];
        let mut instructor_ids: Vec<String> = Vec::new();
        for r in &group {
            if !instructor_ids.contains(&r.instructor_id) {
                instructor_ids.push(r.instructor_id.clone());
            }
        }
        entries.push(TimetableEntry {
            base_id: base,
            course_id: first.course_id.clone(),
            course_name: courses.get(&first.course_id).map(|c| c.name.clone()).unwrap_or_default(),
            instructor_ids,
            day: first.day,
            start_time: first.start_time,
            duration_slots: first.duration_slots,
            phase: first.phase,
            year: first.year,
            term: first.term,
            comment: first.comment.clone(),
            allow_conflict: first.allow_conflict,
            color: 0,
        });
    }
    (entries, warnings)
}

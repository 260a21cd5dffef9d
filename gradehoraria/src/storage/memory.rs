// Almacén en memoria: útil para pruebas y para correr sin base de datos.
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use crate::error::{PersistenceError, StoreOp};
use crate::models::{Course, Curriculum, Instructor, Offering, PersistedRow, TermKey};
use crate::storage::TimetableStore;

#[derive(Debug, Default)]
struct MemoryData {
    courses: Vec<Course>,
    instructors: Vec<Instructor>,
    curricula: Vec<Curriculum>,
    offerings: Vec<Offering>,
    rows: BTreeMap<String, PersistedRow>,
    operations: Vec<String>,
    fail_on: Option<StoreOp>,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<MemoryData>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self, op: StoreOp) -> Result<MutexGuard<'_, MemoryData>, PersistenceError> {
        self.inner.lock().map_err(|e| PersistenceError::new(op, "memory store", e))
    }

    /// Acceso directo para sembrar datos; un mutex envenenado sólo puede
    /// venir de un panic previo en una prueba.
    fn data(&self) -> MutexGuard<'_, MemoryData> {
        match self.inner.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn with_courses(self, courses: Vec<Course>) -> Self {
        self.data().courses = courses;
        self
    }

    pub fn with_instructors(self, instructors: Vec<Instructor>) -> Self {
        self.data().instructors = instructors;
        self
    }

    pub fn with_curricula(self, curricula: Vec<Curriculum>) -> Self {
        self.data().curricula = curricula;
        self
    }

    pub fn with_offerings(self, offerings: Vec<Offering>) -> Self {
        self.data().offerings = offerings;
        self
    }

    pub fn with_rows(self, rows: Vec<PersistedRow>) -> Self {
        {
            let mut d = self.data();
            for r in rows {
                d.rows.insert(r.id.clone(), r);
            }
        }
        self
    }

    /// Hace fallar la próxima operación `op` (una sola vez).
    pub fn fail_next(&self, op: StoreOp) {
        self.data().fail_on = Some(op);
    }

    pub fn rows(&self) -> Vec<PersistedRow> {
        self.data().rows.values().cloned().collect()
    }

    /// Bitácora de escrituras en orden ("delete x", "update y", "create z").
    pub fn operations(&self) -> Vec<String> {
        self.data().operations.clone()
    }

    fn check_fail(data: &mut MemoryData, op: StoreOp, target: &str) -> Result<(), PersistenceError> {
        if data.fail_on == Some(op) {
            data.fail_on = None;
            return Err(PersistenceError::new(op, target, "injected failure"));
        }
        Ok(())
    }
}

impl TimetableStore for MemoryStore {
    async fn list_courses(&self) -> Result<Vec<Course>, PersistenceError> {
        let mut d = self.lock(StoreOp::ListCourses)?;
        Self::check_fail(&mut d, StoreOp::ListCourses, "courses")?;
        Ok(d.courses.clone())
    }

    async fn list_instructors(&self) -> Result<Vec<Instructor>, PersistenceError> {
        let mut d = self.lock(StoreOp::ListInstructors)?;
        Self::check_fail(&mut d, StoreOp::ListInstructors, "instructors")?;
        Ok(d.instructors.clone())
    }

    async fn list_curricula(&self) -> Result<Vec<Curriculum>, PersistenceError> {
        let mut d = self.lock(StoreOp::ListCurricula)?;
        Self::check_fail(&mut d, StoreOp::ListCurricula, "curricula")?;
        Ok(d.curricula.clone())
    }

    async fn list_offerings(&self, term: TermKey, curriculum_id: &str) -> Result<Vec<Offering>, PersistenceError> {
        let mut d = self.lock(StoreOp::ListOfferings)?;
        Self::check_fail(&mut d, StoreOp::ListOfferings, &format!("{} {}", term, curriculum_id))?;
        Ok(d.offerings
            .iter()
            .filter(|o| o.year == term.year && o.term == term.term && o.curriculum_id == curriculum_id)
            .cloned()
            .collect())
    }

    async fn list_timetable_entries(&self, term: TermKey, curriculum_id: &str) -> Result<Vec<PersistedRow>, PersistenceError> {
        let mut d = self.lock(StoreOp::ListEntries)?;
        Self::check_fail(&mut d, StoreOp::ListEntries, &format!("{} {}", term, curriculum_id))?;
        Ok(d.rows
            .values()
            .filter(|r| r.term_key() == term && r.curriculum_id == curriculum_id)
            .cloned()
            .collect())
    }

    async fn create_timetable_entries_bulk(&self, rows: &[PersistedRow]) -> Result<(), PersistenceError> {
        let mut d = self.lock(StoreOp::Create)?;
        let target = rows.first().map(|r| r.id.as_str()).unwrap_or("(empty batch)");
        Self::check_fail(&mut d, StoreOp::Create, target)?;
        if let Some(dup) = rows.iter().find(|r| d.rows.contains_key(&r.id)) {
            return Err(PersistenceError::new(StoreOp::Create, dup.id.clone(), "duplicate id"));
        }
        for r in rows {
            d.operations.push(format!("create {}", r.id));
            d.rows.insert(r.id.clone(), r.clone());
        }
        Ok(())
    }

    async fn update_timetable_entry(&self, id: &str, row: &PersistedRow) -> Result<(), PersistenceError> {
        let mut d = self.lock(StoreOp::Update)?;
        Self::check_fail(&mut d, StoreOp::Update, id)?;
        if !d.rows.contains_key(id) {
            return Err(PersistenceError::new(StoreOp::Update, id, "row not found"));
        }
        d.operations.push(format!("update {}", id));
        d.rows.insert(id.to_string(), row.clone());
        Ok(())
    }

    /// Borrar una fila inexistente no es error (reintentos tras un sync fallido).
    async fn delete_timetable_entry(&self, id: &str) -> Result<(), PersistenceError> {
        let mut d = self.lock(StoreOp::Delete)?;
        Self::check_fail(&mut d, StoreOp::Delete, id)?;
        d.operations.push(format!("delete {}", id));
        d.rows.remove(id);
        Ok(())
    }
}

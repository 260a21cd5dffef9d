//! Sesión de edición de la grade horária.
//!
//! `ScheduleSession` es el agregado que la UI manipula: posee la grilla en
//! memoria, el último snapshot persistido y las filas de los demás periodos
//! y cursos. Las consultas (conflictos, cambios pendientes, créditos) se
//! recalculan completas en cada llamada.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::NaiveTime;
use futures_util::future::try_join_all;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::algorithm::conflict::{conflicts_for, detect_conflicts, merge_sources};
use crate::algorithm::credits::{CreditSummary, summarize};
use crate::algorithm::diff::{PendingChanges, compute_changes, flatten_entries};
use crate::error::{DataIntegrityWarning, ScheduleError, ValidationError};
use crate::models::{
    Assignment, Conflict, Course, Day, EntryPatch, Instructor, Offering, PersistedRow, Shift, TermKey, TimetableEntry,
};
use crate::schedule::EventStore;
use crate::storage::{TimetableStore, hydrate_entries, resolve_assignments};

/// Qué periodo y curso se está editando, y qué otros periodos vigilar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScheduleContext {
    pub term: TermKey,
    pub curriculum_id: String,
    /// Periodos extra cuyos horarios cuentan para los conflictos.
    pub watched_terms: Vec<TermKey>,
}

impl ScheduleContext {
    pub fn new(term: TermKey, curriculum_id: impl Into<String>) -> Self {
        ScheduleContext { term, curriculum_id: curriculum_id.into(), watched_terms: Vec::new() }
    }

    /// Periodo activo, su semestre par y los vigilados, sin repetir.
    pub fn all_terms(&self) -> Vec<TermKey> {
        let mut terms = vec![self.term, self.term.companion()];
        for t in &self.watched_terms {
            if !terms.contains(t) {
                terms.push(*t);
            }
        }
        terms
    }
}

/// Compuerta de "un solo sync a la vez". Se libera al soltar el permiso,
/// también si el future del sync se cancela.
#[derive(Debug, Clone, Default)]
pub struct SyncGate(Arc<AtomicBool>);

pub struct SyncPermit(Arc<AtomicBool>);

impl SyncGate {
    pub fn try_acquire(&self) -> Option<SyncPermit> {
        self.0
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| SyncPermit(Arc::clone(&self.0)))
    }

    pub fn is_busy(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

impl Drop for SyncPermit {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub applied: PendingChanges,
    pub snapshot: Vec<PersistedRow>,
}

#[derive(Debug, Clone, Default)]
pub struct ScheduleSession {
    context: Option<ScheduleContext>,
    store: EventStore,
    snapshot: Vec<PersistedRow>,
    /// Filas de otros cursos/periodos, ya resueltas.
    external: Vec<Assignment>,
    courses: HashMap<String, Course>,
    instructors: HashMap<String, Instructor>,
    offerings: Vec<Offering>,
    warnings: Vec<DataIntegrityWarning>,
    gate: SyncGate,
}

impl ScheduleSession {
    /// Sesión vacía (sin datos persistidos).
    pub fn new(context: ScheduleContext) -> Self {
        ScheduleSession { context: Some(context), ..Default::default() }
    }

    /// Carga catálogos, snapshot y horarios de los demás periodos/cursos.
    /// Los horarios externos se piden en paralelo.
    pub async fn load<S: TimetableStore>(store: &S, context: ScheduleContext) -> Result<Self, ScheduleError> {
        let courses = store.list_courses().await?;
        let instructors = store.list_instructors().await?;
        let curricula = store.list_curricula().await?;
        let offerings = store.list_offerings(context.term, &context.curriculum_id).await?;
        let snapshot = store.list_timetable_entries(context.term, &context.curriculum_id).await?;

        let courses: HashMap<String, Course> = courses.into_iter().map(|c| (c.id.clone(), c)).collect();
        let instructors: HashMap<String, Instructor> = instructors.into_iter().map(|i| (i.id.clone(), i)).collect();

        let mut curriculum_ids: Vec<String> = curricula.into_iter().map(|c| c.id).collect();
        if !curriculum_ids.contains(&context.curriculum_id) {
            curriculum_ids.push(context.curriculum_id.clone());
        }
        let targets: Vec<(TermKey, String)> = context
            .all_terms()
            .into_iter()
            .flat_map(|t| curriculum_ids.iter().map(move |c| (t, c.clone())))
            .filter(|(t, c)| !(*t == context.term && *c == context.curriculum_id))
            .collect();

        let fetches = targets.iter().map(|(term, curriculum)| store.list_timetable_entries(*term, curriculum));
        let batches = try_join_all(fetches).await?;
        let external_rows: Vec<PersistedRow> = batches.into_iter().flatten().collect();

        let (entries, mut warnings) = hydrate_entries(&snapshot, &courses);
        let (external, ext_warnings) = resolve_assignments(&external_rows, &courses);
        warnings.extend(ext_warnings);
        // filas que el almacén descartó al leerlas
        warnings.extend(store.drain_warnings());

        // el snapshot sólo conserva filas que se pudieron hidratar
        let kept: HashSet<String> = entries.iter().map(|e| e.base_id.clone()).collect();
        let snapshot: Vec<PersistedRow> = snapshot.into_iter().filter(|r| kept.contains(&r.entry_id().base)).collect();

        info!(
            term = %context.term,
            curriculum = %context.curriculum_id,
            entries = entries.len(),
            snapshot_rows = snapshot.len(),
            external_rows = external.len(),
            skipped = warnings.len(),
            "schedule session loaded"
        );

        Ok(ScheduleSession {
            context: Some(context),
            store: EventStore::from_entries(entries),
            snapshot,
            external,
            courses,
            instructors,
            offerings,
            warnings,
            gate: SyncGate::default(),
        })
    }

    pub fn context(&self) -> Option<&ScheduleContext> {
        self.context.as_ref()
    }

    fn active_term(&self) -> Option<TermKey> {
        self.context.as_ref().map(|c| c.term)
    }

    fn curriculum_id(&self) -> &str {
        self.context.as_ref().map(|c| c.curriculum_id.as_str()).unwrap_or("")
    }

    pub fn entries(&self) -> impl Iterator<Item = &TimetableEntry> + '_ {
        self.store.entries()
    }

    pub fn event_store(&self) -> &EventStore {
        &self.store
    }

    pub fn snapshot(&self) -> &[PersistedRow] {
        &self.snapshot
    }

    pub fn warnings(&self) -> &[DataIntegrityWarning] {
        &self.warnings
    }

    pub fn courses(&self) -> &HashMap<String, Course> {
        &self.courses
    }

    pub fn sync_gate(&self) -> SyncGate {
        self.gate.clone()
    }

    /// Reemplaza catálogos (útil sin `load`, p. ej. en pruebas).
    pub fn set_catalog(&mut self, courses: Vec<Course>, instructors: Vec<Instructor>, offerings: Vec<Offering>) {
        self.courses = courses.into_iter().map(|c| (c.id.clone(), c)).collect();
        self.instructors = instructors.into_iter().map(|i| (i.id.clone(), i)).collect();
        self.offerings = offerings;
    }

    /// Reemplaza las filas externas (otros cursos y periodos).
    pub fn set_external_rows(&mut self, rows: &[PersistedRow]) {
        let (external, warnings) = resolve_assignments(rows, &self.courses);
        self.external = external;
        self.warnings.extend(warnings);
    }

    /// Turnos en que corre una fase según la oferta del periodo activo.
    /// Vacío si no hay oferta cargada para esa fase.
    pub fn shifts_for_phase(&self, phase: u8) -> Vec<Shift> {
        let mut shifts: Vec<Shift> = self.offerings.iter().filter(|o| o.phase == phase).map(|o| o.shift).collect();
        shifts.sort();
        shifts.dedup();
        shifts
    }

    pub fn is_multi_shift(&self, phase: u8) -> bool {
        self.shifts_for_phase(phase).len() > 1
    }

    /// Reglas que dependen del catálogo y de la oferta.
    fn validate_against_catalog(&self, entry: &TimetableEntry) -> Result<(), ValidationError> {
        let entry_id = entry.base_id.clone();
        if let Some(term) = self.active_term() {
            if entry.term_key() != term {
                return Err(ValidationError::WrongTerm { entry_id, found: entry.term_key(), expected: term });
            }
        }
        if !self.courses.is_empty() && !entry.course_id.is_empty() && !self.courses.contains_key(&entry.course_id) {
            return Err(ValidationError::UnknownCourse { entry_id, course_id: entry.course_id.clone() });
        }
        if !self.instructors.is_empty() {
            if let Some(unknown) = entry.instructor_ids.iter().find(|i| !self.instructors.contains_key(*i)) {
                return Err(ValidationError::UnknownInstructor { entry_id, instructor_id: unknown.clone() });
            }
        }
        let offered = self.shifts_for_phase(entry.phase);
        if let Some(shift) = Shift::of(entry.start_time) {
            if !offered.is_empty() && !offered.contains(&shift) {
                return Err(ValidationError::ShiftNotOffered {
                    entry_id,
                    phase: entry.phase,
                    shift,
                    term: entry.term_key(),
                });
            }
        }
        Ok(())
    }

    fn fill_course_name(&self, entry: &mut TimetableEntry) {
        if let Some(c) = self.courses.get(&entry.course_id) {
            entry.course_name = c.name.clone();
        }
    }

    pub fn add_entry(&mut self, phase: u8, day: Day, slot: NaiveTime, mut entry: TimetableEntry) -> Result<(), ScheduleError> {
        entry.phase = phase;
        entry.day = day;
        entry.start_time = slot;
        if let Some(term) = self.active_term() {
            entry.year = term.year;
            entry.term = term.term;
        }
        self.validate_against_catalog(&entry)?;
        self.fill_course_name(&mut entry);
        self.store.add_entry(phase, day, slot, entry)
    }

    pub fn move_entry(&mut self, id: &str, new_day: Day, new_slot: NaiveTime, new_phase: u8) -> Result<(), ScheduleError> {
        let mut candidate = self.store.get(id).cloned().ok_or_else(|| ScheduleError::EntryNotFound(id.to_string()))?;
        candidate.day = new_day;
        candidate.start_time = new_slot;
        candidate.phase = new_phase;
        self.validate_against_catalog(&candidate)?;
        self.store.move_entry(id, new_day, new_slot, new_phase)
    }

    pub fn resize_entry(&mut self, id: &str, new_duration: u8, phase: u8) -> Result<u8, ScheduleError> {
        self.store.resize_entry(id, new_duration, phase)
    }

    pub fn delete_entry(&mut self, id: &str, phase: u8) -> Result<TimetableEntry, ScheduleError> {
        self.store.delete_entry(id, phase)
    }

    pub fn edit_entry(&mut self, id: &str, patch: &EntryPatch) -> Result<Vec<String>, ScheduleError> {
        let mut candidate = self.store.get(id).cloned().ok_or_else(|| ScheduleError::EntryNotFound(id.to_string()))?;
        let mut patch = patch.clone();
        if let Some(course_id) = &patch.course_id {
            if patch.course_name.is_none() {
                patch.course_name = self.courses.get(course_id).map(|c| c.name.clone());
            }
            candidate.course_id = course_id.clone();
        }
        if let Some(instructors) = &patch.instructor_ids {
            candidate.instructor_ids = instructors.clone();
        }
        self.validate_against_catalog(&candidate)?;
        self.store.edit_entry(id, &patch)
    }

    /// Filas que se persistirían ahora (una por docente, sufijos estables).
    pub fn candidate_rows(&self) -> Vec<PersistedRow> {
        flatten_entries(self.store.entries(), &self.snapshot, self.curriculum_id())
    }

    /// Asignaciones vigentes: grilla en memoria con prioridad sobre lo
    /// persistido. Del snapshot sólo cuentan las filas que la grilla todavía
    /// produce: una entrada borrada o un docente quitado ya no generan
    /// conflictos ni créditos.
    pub fn merged_assignments(&self) -> Vec<Assignment> {
        let candidates = self.candidate_rows();
        let live_ids: HashSet<&str> = candidates.iter().map(|r| r.id.as_str()).collect();
        let temporary: Vec<Assignment> = candidates.iter().map(Assignment::from_row).collect();
        let persisted: Vec<Assignment> = self
            .snapshot
            .iter()
            .filter(|r| live_ids.contains(r.id.as_str()))
            .map(Assignment::from_row)
            .chain(self.external.iter().cloned())
            .collect();
        merge_sources(&temporary, &persisted)
    }

    pub fn conflicts(&self) -> Vec<Conflict> {
        let merged = self.merged_assignments();
        let conflicts = detect_conflicts(&merged);
        debug!(assignments = merged.len(), conflicts = conflicts.len(), "conflicts recomputed");
        conflicts
    }

    pub fn conflicts_for(&self, entry: &TimetableEntry) -> Vec<Conflict> {
        conflicts_for(&self.conflicts(), entry)
    }

    pub fn pending_changes(&self) -> PendingChanges {
        compute_changes(&self.candidate_rows(), &self.snapshot)
    }

    /// Aplica el diff: bajas, luego modificaciones, luego altas en bloque.
    /// Un error corta el sync y deja snapshot y grilla como estaban.
    pub async fn sync<S: TimetableStore>(&mut self, store: &S) -> Result<SyncReport, ScheduleError> {
        let _permit = self.gate.try_acquire().ok_or(ScheduleError::SyncInProgress)?;

        let candidates = self.candidate_rows();
        let changes = compute_changes(&candidates, &self.snapshot);
        if changes.is_empty() {
            debug!("sync: nothing to persist");
            return Ok(SyncReport { applied: changes, snapshot: self.snapshot.clone() });
        }

        for row in &changes.removed {
            store.delete_timetable_entry(&row.id).await.inspect_err(|e| warn!("sync aborted: {}", e))?;
        }
        for change in &changes.modified {
            store
                .update_timetable_entry(&change.after.id, &change.after)
                .await
                .inspect_err(|e| warn!("sync aborted: {}", e))?;
        }
        if !changes.added.is_empty() {
            store
                .create_timetable_entries_bulk(&changes.added)
                .await
                .inspect_err(|e| warn!("sync aborted: {}", e))?;
        }

        info!(
            added = changes.added.len(),
            modified = changes.modified.len(),
            removed = changes.removed.len(),
            "sync complete"
        );
        self.snapshot = candidates;
        Ok(SyncReport { applied: changes, snapshot: self.snapshot.clone() })
    }

    pub fn credits_summary(&self) -> Vec<CreditSummary> {
        let Some(term) = self.active_term() else {
            return Vec::new();
        };
        let names: HashMap<String, String> =
            self.instructors.values().map(|i| (i.id.clone(), i.name.clone())).collect();
        summarize(&self.merged_assignments(), term, &self.courses, &names)
    }
}

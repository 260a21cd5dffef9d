//! Grilla en memoria: fase -> (día, franja) -> una o varias entradas.
//!
//! Es el único dueño mutable de las entradas no persistidas. Cada operación
//! valida antes de mutar, de modo que un error deja la grilla intacta.

use std::collections::BTreeMap;

use chrono::NaiveTime;
use serde::Serialize;

use crate::algorithm::time::{clamp_duration, remaining_slots};
use crate::error::{ScheduleError, ValidationError};
use crate::models::{Day, EntryPatch, FIRST_DAY, LAST_DAY, TimetableEntry};

pub mod colors;

pub use colors::PALETTE_LEN;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct SlotKey {
    pub day: Day,
    pub start: NaiveTime,
}

/// Una franja puede contener entradas de distintos CCR a la vez.
#[derive(Debug, Clone, PartialEq)]
pub enum SlotCell {
    Single(TimetableEntry),
    Many(Vec<TimetableEntry>),
}

impl SlotCell {
    pub fn entries(&self) -> &[TimetableEntry] {
        match self {
            SlotCell::Single(e) => std::slice::from_ref(e),
            SlotCell::Many(v) => v,
        }
    }

    fn entries_mut(&mut self) -> &mut [TimetableEntry] {
        match self {
            SlotCell::Single(e) => std::slice::from_mut(e),
            SlotCell::Many(v) => v,
        }
    }

    fn push(self, entry: TimetableEntry) -> SlotCell {
        match self {
            SlotCell::Single(first) => SlotCell::Many(vec![first, entry]),
            SlotCell::Many(mut v) => {
                v.push(entry);
                SlotCell::Many(v)
            }
        }
    }

    /// Quita `id`; None si la celda queda vacía. Una lista de uno vuelve a `Single`.
    fn without(self, id: &str) -> (Option<SlotCell>, Vec<TimetableEntry>) {
        let (removed, kept): (Vec<_>, Vec<_>) = match self {
            SlotCell::Single(e) => vec![e].into_iter().partition(|e| e.base_id == id),
            SlotCell::Many(v) => v.into_iter().partition(|e| e.base_id == id),
        };
        let cell = match kept.len() {
            0 => None,
            1 => kept.into_iter().next().map(SlotCell::Single),
            _ => Some(SlotCell::Many(kept)),
        };
        (cell, removed)
    }
}

/// Reglas de forma que no dependen de datos externos.
pub fn validate_entry(entry: &TimetableEntry) -> Result<(), ValidationError> {
    let entry_id = entry.base_id.clone();
    if entry.course_id.trim().is_empty() {
        return Err(ValidationError::MissingCourse { entry_id });
    }
    if entry.instructor_ids.is_empty() || entry.instructor_ids.iter().any(|i| i.trim().is_empty()) {
        return Err(ValidationError::MissingInstructor { entry_id });
    }
    if entry.instructor_ids.len() > 2 {
        return Err(ValidationError::TooManyInstructors { entry_id, count: entry.instructor_ids.len() });
    }
    if let [a, b] = entry.instructor_ids.as_slice() {
        if a == b {
            return Err(ValidationError::DuplicateInstructor { entry_id, instructor_id: a.clone() });
        }
    }
    if !(FIRST_DAY..=LAST_DAY).contains(&entry.day) {
        return Err(ValidationError::InvalidDay { entry_id, day: entry.day });
    }
    if remaining_slots(entry.start_time).is_none() {
        return Err(ValidationError::OutsideShift { entry_id, start: entry.start_time });
    }
    Ok(())
}

#[derive(Debug, Clone, Default)]
pub struct EventStore {
    phases: BTreeMap<u8, BTreeMap<SlotKey, SlotCell>>,
}

impl EventStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reconstruye la grilla a partir de entradas ya resueltas (hidratación).
    pub fn from_entries(entries: impl IntoIterator<Item = TimetableEntry>) -> Self {
        let mut store = EventStore::new();
        for entry in entries {
            store.insert(entry);
        }
        let phases: Vec<u8> = store.phases.keys().copied().collect();
        for p in phases {
            store.recolor(p);
        }
        store
    }

    pub fn len(&self) -> usize {
        self.entries().count()
    }

    pub fn is_empty(&self) -> bool {
        self.phases.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = &TimetableEntry> + '_ {
        self.phases.values().flat_map(|slots| slots.values()).flat_map(|c| c.entries())
    }

    pub fn phase_entries(&self, phase: u8) -> impl Iterator<Item = &TimetableEntry> + '_ {
        self.phases.get(&phase).into_iter().flat_map(|slots| slots.values()).flat_map(|c| c.entries())
    }

    pub fn cell(&self, phase: u8, day: Day, start: NaiveTime) -> Option<&SlotCell> {
        self.phases.get(&phase)?.get(&SlotKey { day, start })
    }

    pub fn get(&self, id: &str) -> Option<&TimetableEntry> {
        self.entries().find(|e| e.base_id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    fn insert(&mut self, entry: TimetableEntry) {
        let key = SlotKey { day: entry.day, start: entry.start_time };
        let slots = self.phases.entry(entry.phase).or_default();
        let cell = match slots.remove(&key) {
            Some(cell) => cell.push(entry),
            None => SlotCell::Single(entry),
        };
        slots.insert(key, cell);
    }

    /// Quita `id` de todas las franjas de `phase`.
    fn remove_from_phase(&mut self, phase: u8, id: &str) -> Vec<TimetableEntry> {
        let Some(slots) = self.phases.get_mut(&phase) else {
            return Vec::new();
        };
        let keys: Vec<SlotKey> = slots
            .iter()
            .filter(|(_, c)| c.entries().iter().any(|e| e.base_id == id))
            .map(|(k, _)| *k)
            .collect();
        let mut removed = Vec::new();
        for key in keys {
            if let Some(cell) = slots.remove(&key) {
                let (rest, mut gone) = cell.without(id);
                if let Some(rest) = rest {
                    slots.insert(key, rest);
                }
                removed.append(&mut gone);
            }
        }
        if slots.is_empty() {
            self.phases.remove(&phase);
        }
        removed
    }

    fn find_mut(&mut self, phase: u8, id: &str) -> Option<&mut TimetableEntry> {
        self.phases
            .get_mut(&phase)?
            .values_mut()
            .flat_map(|c| c.entries_mut())
            .find(|e| e.base_id == id)
    }

    /// Inserta en (fase, día, franja). Si la franja ya está ocupada pasa a
    /// ser una lista y la nueva entrada va al final.
    pub fn add_entry(&mut self, phase: u8, day: Day, slot: NaiveTime, mut entry: TimetableEntry) -> Result<(), ScheduleError> {
        entry.phase = phase;
        entry.day = day;
        entry.start_time = slot;
        validate_entry(&entry)?;
        if self.contains(&entry.base_id) {
            return Err(ValidationError::DuplicateId { entry_id: entry.base_id }.into());
        }
        entry.duration_slots = clamp_duration(slot, entry.duration_slots);
        self.insert(entry);
        self.recolor(phase);
        Ok(())
    }

    /// Saca la entrada de todas sus posiciones en todas las fases y la
    /// reinserta. La duración se vuelve a limitar al turno de destino.
    pub fn move_entry(&mut self, id: &str, new_day: Day, new_slot: NaiveTime, new_phase: u8) -> Result<(), ScheduleError> {
        let mut moved = self.get(id).cloned().ok_or_else(|| ScheduleError::EntryNotFound(id.to_string()))?;
        moved.day = new_day;
        moved.start_time = new_slot;
        moved.phase = new_phase;
        validate_entry(&moved)?;
        moved.duration_slots = clamp_duration(new_slot, moved.duration_slots);

        let phases: Vec<u8> = self.phases.keys().copied().collect();
        let mut touched = vec![new_phase];
        for p in phases {
            if !self.remove_from_phase(p, id).is_empty() {
                touched.push(p);
            }
        }
        self.insert(moved);
        touched.sort_unstable();
        touched.dedup();
        for p in touched {
            self.recolor(p);
        }
        Ok(())
    }

    /// Devuelve la duración efectivamente aplicada.
    pub fn resize_entry(&mut self, id: &str, new_duration: u8, phase: u8) -> Result<u8, ScheduleError> {
        let entry = self.find_mut(phase, id).ok_or_else(|| ScheduleError::EntryNotFound(id.to_string()))?;
        entry.duration_slots = clamp_duration(entry.start_time, new_duration);
        Ok(entry.duration_slots)
    }

    pub fn delete_entry(&mut self, id: &str, phase: u8) -> Result<TimetableEntry, ScheduleError> {
        let removed = self.remove_from_phase(phase, id);
        self.recolor(phase);
        removed.into_iter().next().ok_or_else(|| ScheduleError::EntryNotFound(id.to_string()))
    }

    /// Merge superficial de `patch`. Si cambia el CCR o los docentes, las
    /// entradas relacionadas (misma fase, mismo CCR y docentes anteriores,
    /// otro horario de inicio) reciben los mismos valores. Devuelve los ids
    /// modificados, el editado primero.
    pub fn edit_entry(&mut self, id: &str, patch: &EntryPatch) -> Result<Vec<String>, ScheduleError> {
        let original = self.get(id).cloned().ok_or_else(|| ScheduleError::EntryNotFound(id.to_string()))?;
        let mut edited = original.clone();
        apply_patch(&mut edited, patch);
        validate_entry(&edited)?;

        let identity_changed =
            edited.course_id != original.course_id || edited.instructor_ids != original.instructor_ids;
        let related: Vec<String> = if identity_changed {
            self.phase_entries(original.phase)
                .filter(|e| {
                    e.base_id != original.base_id
                        && e.course_id == original.course_id
                        && e.same_instructors(&original.instructor_ids)
                        && e.start_time != original.start_time
                })
                .map(|e| e.base_id.clone())
                .collect()
        } else {
            Vec::new()
        };

        let phase = original.phase;
        if let Some(slot) = self.find_mut(phase, id) {
            *slot = edited.clone();
        }
        for rid in &related {
            if let Some(e) = self.find_mut(phase, rid) {
                e.course_id = edited.course_id.clone();
                e.course_name = edited.course_name.clone();
                e.instructor_ids = edited.instructor_ids.clone();
            }
        }
        self.recolor(phase);

        let mut ids = vec![id.to_string()];
        ids.extend(related);
        Ok(ids)
    }

    pub(crate) fn recolor(&mut self, phase: u8) {
        let Some(slots) = self.phases.get_mut(&phase) else {
            return;
        };
        let palette = colors::phase_palette(slots.values().flat_map(|c| c.entries()));
        for e in slots.values_mut().flat_map(|c| c.entries_mut()) {
            if let Some(color) = palette.get(&e.course_id) {
                e.color = *color;
            }
        }
    }

    /// Fase actual de una entrada, si existe.
    pub fn locate(&self, id: &str) -> Option<u8> {
        self.get(id).map(|e| e.phase)
    }
}

fn apply_patch(entry: &mut TimetableEntry, patch: &EntryPatch) {
    if let Some(c) = &patch.course_id {
        entry.course_id = c.clone();
    }
    if let Some(n) = &patch.course_name {
        entry.course_name = n.clone();
    }
    if let Some(i) = &patch.instructor_ids {
        entry.instructor_ids = i.clone();
    }
    if let Some(c) = &patch.comment {
        entry.comment = c.clone();
    }
    if let Some(a) = patch.allow_conflict {
        entry.allow_conflict = a;
    }
}

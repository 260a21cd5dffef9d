// Diff entre la grilla en memoria y el último snapshot persistido.
use std::collections::{HashMap, HashSet};

use serde::Serialize;

use crate::algorithm::suffix::{allocate_slots, snapshot_history};
use crate::models::{PersistedRow, TimetableEntry};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowChange {
    pub before: PersistedRow,
    pub after: PersistedRow,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PendingChanges {
    pub added: Vec<PersistedRow>,
    pub modified: Vec<RowChange>,
    pub removed: Vec<PersistedRow>,
    pub total: usize,
}

impl PendingChanges {
    pub fn is_empty(&self) -> bool {
        self.total == 0
    }
}

/// Explota cada entrada con CCR y al menos un docente en una fila por docente,
/// usando el snapshot como historial de sufijos.
pub fn flatten_entries<'a, I>(entries: I, snapshot: &[PersistedRow], curriculum_id: &str) -> Vec<PersistedRow>
where
    I: IntoIterator<Item = &'a TimetableEntry>,
{
    let history = snapshot_history(snapshot);
    let empty = HashMap::new();
    let mut rows = Vec::new();
    for entry in entries {
        if entry.course_id.trim().is_empty() || entry.instructor_ids.is_empty() {
            continue;
        }
        let h = history.get(&entry.base_id).unwrap_or(&empty);
        for (instructor, slot) in allocate_slots(&entry.instructor_ids, h) {
            rows.push(PersistedRow::for_entry(entry, &instructor, slot, curriculum_id));
        }
    }
    rows
}

fn row_differs(a: &PersistedRow, b: &PersistedRow) -> bool {
    a.course_id != b.course_id
        || a.day != b.day
        || a.start_time != b.start_time
        || a.duration_slots != b.duration_slots
        || a.phase != b.phase
        || a.comment != b.comment
        || a.allow_conflict != b.allow_conflict
}

/// Particiona en altas, modificaciones y bajas comparando por id.
///
/// Si el id coincide pero cambió el docente, la fila vieja sale como baja y
/// la nueva como alta: el sufijo se reutiliza para otra persona.
pub fn compute_changes(candidates: &[PersistedRow], snapshot: &[PersistedRow]) -> PendingChanges {
    let by_id: HashMap<&str, &PersistedRow> = snapshot.iter().map(|r| (r.id.as_str(), r)).collect();
    let mut reached: HashSet<&str> = HashSet::new();
    let mut changes = PendingChanges::default();

    for row in candidates {
        match by_id.get(row.id.as_str()) {
            Some(prev) if prev.instructor_id != row.instructor_id => {
                changes.added.push(row.clone());
            }
            Some(prev) => {
                reached.insert(prev.id.as_str());
                if row_differs(prev, row) {
                    changes.modified.push(RowChange { before: (*prev).clone(), after: row.clone() });
                }
            }
            None => changes.added.push(row.clone()),
        }
    }

    changes.removed = snapshot
        .iter()
        .filter(|r| !reached.contains(r.id.as_str()))
        .cloned()
        .collect();
    changes.total = changes.added.len() + changes.modified.len() + changes.removed.len();
    changes
}

// Detección de choques de horario por docente.
use std::collections::{BTreeMap, HashSet};

use crate::algorithm::time::overlaps;
use crate::models::{Assignment, Conflict, Day, EntryId, ProfSlot, TimetableEntry};

/// Une las asignaciones temporales (grilla en memoria) con las persistidas.
///
/// Una temporal idéntica a una persistida de otro id se descarta; con el mismo
/// id gana la temporal. Después se deduplica por clave de registro, de nuevo
/// con prioridad para las temporales.
pub fn merge_sources(temporary: &[Assignment], persisted: &[Assignment]) -> Vec<Assignment> {
    let fresh = temporary
        .iter()
        .filter(|t| !persisted.iter().any(|p| p.id != t.id && p.same_registration(t)));

    let mut seen_ids = HashSet::new();
    let mut seen_keys = HashSet::new();
    let mut merged = Vec::new();
    for a in fresh.chain(persisted.iter()) {
        if !seen_ids.insert(&a.id) {
            continue;
        }
        if !seen_keys.insert(a.registration_key()) {
            continue;
        }
        merged.push(a.clone());
    }
    merged
}

fn conflict_id(instructor: &str, a: &Assignment, b: &Assignment) -> String {
    let (x, y) = (a.id.to_string(), b.id.to_string());
    let (lo, hi) = if x <= y { (x, y) } else { (y, x) };
    format!("{}|{}|{}", instructor, lo, hi)
}

fn skip_pair(a: &Assignment, b: &Assignment) -> bool {
    a.id == b.id
        || a.term != b.term
        || a.same_registration(b)
        || a.allow_conflict
        || b.allow_conflict
        // misma disciplina dividida dentro de la fase
        || (a.course_id == b.course_id && a.phase == b.phase)
}

/// Recalcula todos los conflictos. El resultado sale ordenado por id y sin
/// duplicados, sin importar el orden de los pares.
pub fn detect_conflicts(merged: &[Assignment]) -> Vec<Conflict> {
    let mut by_day: BTreeMap<(&str, Day), Vec<&Assignment>> = BTreeMap::new();
    for a in merged {
        by_day.entry((a.instructor_id.as_str(), a.day)).or_default().push(a);
    }

    let mut out: BTreeMap<String, Conflict> = BTreeMap::new();
    for ((instructor, day), group) in by_day {
        for (i, a) in group.iter().enumerate() {
            for b in &group[i + 1..] {
                if skip_pair(a, b) || !overlaps(*a, *b) {
                    continue;
                }
                let id = conflict_id(instructor, a, b);
                out.entry(id.clone()).or_insert_with(|| Conflict {
                    id,
                    instructor_id: instructor.to_string(),
                    day,
                    entry_a: (*a).clone(),
                    entry_b: (*b).clone(),
                });
            }
        }
    }
    out.into_values().collect()
}

/// Conflictos que tocan a `entry`. No compara ids (cambian al editar): vuelve
/// a verificar el solapamiento contra ambos lados del conflicto, y al menos
/// uno de ellos tiene que poder chocar con la entrada según las mismas reglas
/// de `detect_conflicts`.
pub fn conflicts_for(conflicts: &[Conflict], entry: &TimetableEntry) -> Vec<Conflict> {
    if entry.allow_conflict {
        return Vec::new();
    }
    let term = entry.term_key();
    conflicts
        .iter()
        .filter(|c| {
            c.day == entry.day
                && c.entry_a.term == term
                && entry.instructor_ids.iter().any(|i| *i == c.instructor_id)
                && overlaps(entry, &c.entry_a)
                && overlaps(entry, &c.entry_b)
                && (can_clash(entry, &c.instructor_id, &c.entry_a) || can_clash(entry, &c.instructor_id, &c.entry_b))
        })
        .cloned()
        .collect()
}

/// `side` es otra sesión y el par (entrada, side) no cae en las exclusiones.
fn can_clash(entry: &TimetableEntry, instructor_id: &str, side: &Assignment) -> bool {
    let own = Assignment {
        id: EntryId::new(entry.base_id.clone(), ProfSlot::First),
        instructor_id: instructor_id.to_string(),
        course_id: entry.course_id.clone(),
        phase: entry.phase,
        day: entry.day,
        start_time: entry.start_time,
        duration_slots: entry.duration_slots,
        term: entry.term_key(),
        allow_conflict: entry.allow_conflict,
    };
    side.id.base != entry.base_id && !skip_pair(&own, side)
}

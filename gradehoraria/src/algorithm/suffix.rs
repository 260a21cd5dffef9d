//! Asignación estable de sufijos `-prof1` / `-prof2`.
//!
//! Cada entrada de la grilla se persiste como una fila por docente. Para que
//! el diff reconozca "sin cambios" en vez de "borrado + alta", un docente que
//! ya tenía sufijo en el snapshot lo conserva.

use std::collections::HashMap;

use crate::models::{PersistedRow, ProfSlot};

/// Historial docente -> sufijo para un id base.
pub type SlotHistory = HashMap<String, ProfSlot>;

/// Agrupa el snapshot por id base.
pub fn snapshot_history(snapshot: &[PersistedRow]) -> HashMap<String, SlotHistory> {
    let mut out: HashMap<String, SlotHistory> = HashMap::new();
    for row in snapshot {
        let id = row.entry_id();
        out.entry(id.base).or_default().insert(row.instructor_id.clone(), id.slot);
    }
    out
}

/// Devuelve `(docente, sufijo)` en el orden de `instructors`.
///
/// - un docente: conserva su sufijo histórico; si no lo tiene recibe `prof1`,
///   también cuando reemplaza a otro que estaba en `prof2`.
/// - dos docentes: primero los que ya estaban conservan su sufijo, luego los
///   nuevos toman el menor libre.
/// - más de dos se truncan; quien llama debe validar antes.
pub fn allocate_slots(instructors: &[String], history: &SlotHistory) -> Vec<(String, ProfSlot)> {
    let instructors = &instructors[..instructors.len().min(2)];

    if let [only] = instructors {
        let slot = history.get(only).copied().unwrap_or(ProfSlot::First);
        return vec![(only.clone(), slot)];
    }

    let mut assigned: Vec<Option<ProfSlot>> = vec![None; instructors.len()];
    let mut used: Vec<ProfSlot> = Vec::new();

    for (i, inst) in instructors.iter().enumerate() {
        if let Some(slot) = history.get(inst) {
            // datos corruptos: dos docentes reclamando el mismo sufijo
            if !used.contains(slot) {
                assigned[i] = Some(*slot);
                used.push(*slot);
            }
        }
    }

    for a in assigned.iter_mut().filter(|a| a.is_none()) {
        if let Some(free) = ProfSlot::ALL.into_iter().find(|s| !used.contains(s)) {
            *a = Some(free);
            used.push(free);
        }
    }

    instructors
        .iter()
        .zip(assigned)
        .filter_map(|(inst, slot)| slot.map(|s| (inst.clone(), s)))
        .collect()
}

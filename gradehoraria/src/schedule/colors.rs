// Colores por CCR dentro de una fase.
use std::collections::{BTreeMap, HashMap};

use chrono::NaiveTime;

use crate::models::{Day, TimetableEntry};

pub const PALETTE_LEN: u8 = 12;

/// Cada CCR se ancla en su franja más temprana de la semana (día, inicio).
/// Los CCR se ordenan por ancla y toman `posición % PALETTE_LEN`; así el
/// color no depende del orden de inserción.
pub fn phase_palette<'a>(entries: impl Iterator<Item = &'a TimetableEntry>) -> HashMap<String, u8> {
    let mut anchors: BTreeMap<&'a str, (Day, NaiveTime)> = BTreeMap::new();
    for e in entries {
        let pos = (e.day, e.start_time);
        anchors
            .entry(e.course_id.as_str())
            .and_modify(|a| {
                if pos < *a {
                    *a = pos;
                }
            })
            .or_insert(pos);
    }

    let mut ordered: Vec<(&str, (Day, NaiveTime))> = anchors.into_iter().collect();
    // empate de ancla: decide el id del CCR (orden del BTreeMap, sort estable)
    ordered.sort_by_key(|(_, anchor)| *anchor);
    ordered
        .into_iter()
        .enumerate()
        .map(|(i, (course, _))| (course.to_string(), (i % PALETTE_LEN as usize) as u8))
        .collect()
}

// Modelo de tiempo: tablas de franjas por turno, minutos y solapamiento.
use chrono::{NaiveTime, TimeDelta, Timelike};

use crate::models::{Assignment, PersistedRow, Shift, TimetableEntry};

/// Granularidad de la grilla.
pub const SLOT_MINUTES: u32 = 30;

const MINUTES_PER_DAY: u32 = 24 * 60;

impl Shift {
    /// Minutos desde medianoche de la primera franja.
    pub fn first_slot_minutes(self) -> u32 {
        match self {
            Shift::Matutino => 7 * 60 + 30,
            Shift::Vespertino => 13 * 60 + 30,
            Shift::Noturno => 19 * 60,
        }
    }

    pub fn slot_count(self) -> usize {
        match self {
            Shift::Matutino => 9,
            Shift::Vespertino => 9,
            Shift::Noturno => 7,
        }
    }

    /// Franjas ordenadas del turno.
    pub fn slot_table(self) -> Vec<NaiveTime> {
        (0..self.slot_count())
            .map(|i| from_minutes(self.first_slot_minutes() + i as u32 * SLOT_MINUTES))
            .collect()
    }

    /// Turno cuya tabla contiene exactamente `start`.
    pub fn of(start: NaiveTime) -> Option<Shift> {
        Shift::ALL.into_iter().find(|s| slot_index(*s, start).is_some())
    }
}

pub fn to_minutes(t: NaiveTime) -> u32 {
    t.hour() * 60 + t.minute()
}

/// Inverso de `to_minutes`; da la vuelta pasada la medianoche.
pub fn from_minutes(minutes: u32) -> NaiveTime {
    let (t, _) = NaiveTime::MIN.overflowing_add_signed(TimeDelta::minutes((minutes % MINUTES_PER_DAY) as i64));
    t
}

/// Acepta "HH:MM" y "HH:MM:SS".
pub fn parse_time(s: &str) -> Option<NaiveTime> {
    let s = s.trim();
    NaiveTime::parse_from_str(s, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M"))
        .ok()
}

/// Posición de `start` dentro de la tabla del turno.
pub fn slot_index(shift: Shift, start: NaiveTime) -> Option<usize> {
    if start.second() != 0 {
        return None;
    }
    let m = to_minutes(start);
    let first = shift.first_slot_minutes();
    if m < first || (m - first) % SLOT_MINUTES != 0 {
        return None;
    }
    let idx = ((m - first) / SLOT_MINUTES) as usize;
    (idx < shift.slot_count()).then_some(idx)
}

/// Franjas que quedan en el turno desde `start` (incluida). None si `start`
/// no pertenece a ningún turno.
pub fn remaining_slots(start: NaiveTime) -> Option<u8> {
    let shift = Shift::of(start)?;
    let idx = slot_index(shift, start)?;
    Some((shift.slot_count() - idx) as u8)
}

/// Limita una duración a `[1, remaining_slots]`.
pub fn clamp_duration(start: NaiveTime, requested: u8) -> u8 {
    let max = remaining_slots(start).unwrap_or(1).max(1);
    requested.clamp(1, max)
}

/// Hora de término. Pasada la última franja se extrapola de 30 en 30.
pub fn end_time(start: NaiveTime, duration_slots: u8, table: &[NaiveTime]) -> NaiveTime {
    let d = duration_slots as usize;
    match table.iter().position(|t| *t == start) {
        Some(i) if i + d < table.len() => table[i + d],
        _ => from_minutes(to_minutes(start) + duration_slots as u32 * SLOT_MINUTES),
    }
}

/// Cualquier cosa que ocupa un intervalo en la grilla.
pub trait Timed {
    fn start(&self) -> NaiveTime;
    fn slots(&self) -> u8;

    /// `[inicio, fin)` en minutos desde medianoche.
    fn interval(&self) -> (u32, u32) {
        let s = to_minutes(self.start());
        (s, s + self.slots() as u32 * SLOT_MINUTES)
    }
}

impl Timed for TimetableEntry {
    fn start(&self) -> NaiveTime {
        self.start_time
    }
    fn slots(&self) -> u8 {
        self.duration_slots
    }
}

impl Timed for Assignment {
    fn start(&self) -> NaiveTime {
        self.start_time
    }
    fn slots(&self) -> u8 {
        self.duration_slots
    }
}

impl Timed for PersistedRow {
    fn start(&self) -> NaiveTime {
        self.start_time
    }
    fn slots(&self) -> u8 {
        self.duration_slots
    }
}

/// True si los intervalos se intersectan. Bloques consecutivos
/// (`fin_a == inicio_b`) no se solapan.
pub fn overlaps<A: Timed + ?Sized, B: Timed + ?Sized>(a: &A, b: &B) -> bool {
    let (s1, e1) = a.interval();
    let (s2, e2) = b.interval();
    s1 < e2 && s2 < e1
}

// Estructuras de datos principales de la grade horária

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Día de la semana: 1 = segunda-feira ... 6 = sábado.
pub type Day = u8;

pub const FIRST_DAY: Day = 1;
pub const LAST_DAY: Day = 6;

/// Par (año, semestre) que identifica un periodo lectivo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TermKey {
    pub year: i32,
    pub term: u8,
}

impl TermKey {
    pub fn new(year: i32, term: u8) -> Self {
        TermKey { year, term }
    }

    /// El otro semestre del mismo año (1 <-> 2).
    pub fn companion(self) -> TermKey {
        let term = if self.term == 1 { 2 } else { 1 };
        TermKey { year: self.year, term }
    }
}

impl fmt::Display for TermKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.year, self.term)
    }
}

impl FromStr for TermKey {
    type Err = String;

    /// Acepta "2025/1" o "2025-1".
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (y, t) = s
            .trim()
            .split_once(|c: char| c == '/' || c == '-')
            .ok_or_else(|| format!("invalid term '{}', expected YEAR/TERM", s))?;
        let year = y.trim().parse::<i32>().map_err(|e| format!("invalid year in '{}': {}", s, e))?;
        let term = t.trim().parse::<u8>().map_err(|e| format!("invalid term in '{}': {}", s, e))?;
        if term != 1 && term != 2 {
            return Err(format!("term must be 1 or 2, got {}", term));
        }
        Ok(TermKey { year, term })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Shift {
    Matutino,
    Vespertino,
    Noturno,
}

impl Shift {
    pub const ALL: [Shift; 3] = [Shift::Matutino, Shift::Vespertino, Shift::Noturno];

    pub fn as_str(self) -> &'static str {
        match self {
            Shift::Matutino => "matutino",
            Shift::Vespertino => "vespertino",
            Shift::Noturno => "noturno",
        }
    }
}

impl fmt::Display for Shift {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Shift {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "matutino" | "m" => Ok(Shift::Matutino),
            "vespertino" | "v" => Ok(Shift::Vespertino),
            "noturno" | "n" => Ok(Shift::Noturno),
            other => Err(format!("unknown shift '{}'", other)),
        }
    }
}

/// Posición del docente dentro de una entrada (sufijo `-prof1` / `-prof2`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ProfSlot {
    First,
    Second,
}

impl ProfSlot {
    pub const ALL: [ProfSlot; 2] = [ProfSlot::First, ProfSlot::Second];

    pub fn number(self) -> u8 {
        match self {
            ProfSlot::First => 1,
            ProfSlot::Second => 2,
        }
    }

    pub fn from_number(n: u8) -> Option<ProfSlot> {
        match n {
            1 => Some(ProfSlot::First),
            2 => Some(ProfSlot::Second),
            _ => None,
        }
    }
}

/// Identidad persistida de una fila: id base + posición del docente.
/// Sólo se convierte a la forma `base-profN` al emitir filas.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntryId {
    pub base: String,
    pub slot: ProfSlot,
}

impl EntryId {
    pub fn new(base: impl Into<String>, slot: ProfSlot) -> Self {
        EntryId { base: base.into(), slot }
    }

    /// Ids sin sufijo (filas antiguas) se interpretan como `prof1`.
    pub fn parse(raw: &str) -> EntryId {
        if let Some((base, n)) = raw.rsplit_once("-prof") {
            if let Some(slot) = n.parse::<u8>().ok().and_then(ProfSlot::from_number) {
                return EntryId::new(base, slot);
            }
        }
        EntryId::new(raw, ProfSlot::First)
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-prof{}", self.base, self.slot.number())
    }
}

/// Una sesión de un CCR, con uno o dos docentes, en una fase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimetableEntry {
    pub base_id: String,
    pub course_id: String,
    #[serde(default)]
    pub course_name: String,
    pub instructor_ids: Vec<String>,
    pub day: Day,
    pub start_time: NaiveTime,
    pub duration_slots: u8,
    pub phase: u8,
    pub year: i32,
    pub term: u8,
    #[serde(default)]
    pub comment: String,
    #[serde(default)]
    pub allow_conflict: bool,
    /// Índice de paleta; lo recalcula el `EventStore`.
    #[serde(default)]
    pub color: u8,
}

impl TimetableEntry {
    pub fn term_key(&self) -> TermKey {
        TermKey::new(self.year, self.term)
    }

    pub fn same_instructors(&self, other: &[String]) -> bool {
        self.instructor_ids.len() == other.len()
            && self.instructor_ids.iter().all(|i| other.contains(i))
    }
}

/// Cambios parciales sobre una entrada (merge superficial).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EntryPatch {
    pub course_id: Option<String>,
    pub course_name: Option<String>,
    pub instructor_ids: Option<Vec<String>>,
    pub comment: Option<String>,
    pub allow_conflict: Option<bool>,
}

impl EntryPatch {
    pub fn touches_identity(&self) -> bool {
        self.course_id.is_some() || self.instructor_ids.is_some()
    }
}

/// Fila tal como la guarda la capa de persistencia: una por docente.
/// Los alias de la base (`codigo_docente`, `hora_inicio`, ...) viven sólo aquí.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedRow {
    pub id: String,
    #[serde(rename = "id_ccr")]
    pub course_id: String,
    #[serde(rename = "codigo_docente")]
    pub instructor_id: String,
    #[serde(rename = "dia_semana")]
    pub day: Day,
    #[serde(rename = "ano")]
    pub year: i32,
    #[serde(rename = "semestre")]
    pub term: u8,
    #[serde(rename = "fase")]
    pub phase: u8,
    #[serde(rename = "hora_inicio")]
    pub start_time: NaiveTime,
    #[serde(rename = "duracao")]
    pub duration_slots: u8,
    #[serde(rename = "comentario", default)]
    pub comment: String,
    #[serde(rename = "permitir_conflito", default)]
    pub allow_conflict: bool,
    #[serde(rename = "id_curso")]
    pub curriculum_id: String,
}

impl PersistedRow {
    pub fn for_entry(entry: &TimetableEntry, instructor_id: &str, slot: ProfSlot, curriculum_id: &str) -> Self {
        PersistedRow {
            id: EntryId::new(entry.base_id.clone(), slot).to_string(),
            course_id: entry.course_id.clone(),
            instructor_id: instructor_id.to_string(),
            day: entry.day,
            year: entry.year,
            term: entry.term,
            phase: entry.phase,
            start_time: entry.start_time,
            duration_slots: entry.duration_slots,
            comment: entry.comment.clone(),
            allow_conflict: entry.allow_conflict,
            curriculum_id: curriculum_id.to_string(),
        }
    }

    pub fn entry_id(&self) -> EntryId {
        EntryId::parse(&self.id)
    }

    pub fn term_key(&self) -> TermKey {
        TermKey::new(self.year, self.term)
    }
}

/// Un docente asignado a una sesión. Es la unidad que comparan el detector
/// de conflictos y el agregador de créditos.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    pub id: EntryId,
    pub instructor_id: String,
    pub course_id: String,
    pub phase: u8,
    pub day: Day,
    pub start_time: NaiveTime,
    pub duration_slots: u8,
    pub term: TermKey,
    pub allow_conflict: bool,
}

/// (docente, ccr, día, inicio, duración, periodo)
pub type RegistrationKey<'a> = (&'a str, &'a str, Day, NaiveTime, u8, TermKey);

impl Assignment {
    pub fn from_row(row: &PersistedRow) -> Self {
        Assignment {
            id: row.entry_id(),
            instructor_id: row.instructor_id.clone(),
            course_id: row.course_id.clone(),
            phase: row.phase,
            day: row.day,
            start_time: row.start_time,
            duration_slots: row.duration_slots,
            term: row.term_key(),
            allow_conflict: row.allow_conflict,
        }
    }

    pub fn registration_key(&self) -> RegistrationKey<'_> {
        (
            self.instructor_id.as_str(),
            self.course_id.as_str(),
            self.day,
            self.start_time,
            self.duration_slots,
            self.term,
        )
    }

    pub fn same_registration(&self, other: &Assignment) -> bool {
        self.registration_key() == other.registration_key()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conflict {
    pub id: String,
    pub instructor_id: String,
    pub day: Day,
    pub entry_a: Assignment,
    pub entry_b: Assignment,
}

/// Componente curricular (CCR).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Course {
    pub id: String,
    pub code: String,
    pub name: String,
    pub credits: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instructor {
    pub id: String,
    pub name: String,
}

/// Curso (matriz curricular) al que pertenecen las fases.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Curriculum {
    pub id: String,
    pub name: String,
}

/// Oferta: la fase `phase` del curso corre en el turno `shift` en ese periodo.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Offering {
    pub year: i32,
    pub term: u8,
    pub curriculum_id: String,
    pub phase: u8,
    pub shift: Shift,
}

// Carga docente (créditos) por periodo.
use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::Serialize;
use tracing::warn;

use crate::models::{Assignment, Course, TermKey};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreditSummary {
    pub instructor_id: String,
    pub instructor_name: Option<String>,
    pub credits_this_term: u32,
    pub credits_companion_term: u32,
    /// Promedio sólo sobre los semestres con créditos.
    pub yearly_average: f64,
}

/// Créditos por docente en un periodo.
///
/// Para cada (docente, CCR): si todas las sesiones empiezan a la misma hora
/// son turmas paralelas y cuentan `créditos × días distintos`; si empiezan a
/// horas distintas es la misma disciplina dividida y cuenta una vez.
pub fn term_credits(assignments: &[Assignment], term: TermKey, courses: &HashMap<String, Course>) -> BTreeMap<String, u32> {
    let mut pairs: BTreeMap<(&str, &str), Vec<&Assignment>> = BTreeMap::new();
    for a in assignments.iter().filter(|a| a.term == term) {
        pairs.entry((a.instructor_id.as_str(), a.course_id.as_str())).or_default().push(a);
    }

    let mut out: BTreeMap<String, u32> = BTreeMap::new();
    for ((instructor, course_id), sessions) in pairs {
        let Some(course) = courses.get(course_id) else {
            warn!(instructor, course_id, %term, "course not found, counting 0 credits");
            out.entry(instructor.to_string()).or_insert(0);
            continue;
        };
        let starts: BTreeSet<_> = sessions.iter().map(|s| s.start_time).collect();
        let days: BTreeSet<_> = sessions.iter().map(|s| s.day).collect();
        let multiplier = if starts.len() == 1 { days.len() as u32 } else { 1 };
        *out.entry(instructor.to_string()).or_insert(0) += course.credits * multiplier;
    }
    out
}

pub fn yearly_average(terms: &[u32]) -> f64 {
    let nonzero: Vec<u32> = terms.iter().copied().filter(|c| *c > 0).collect();
    if nonzero.is_empty() {
        return 0.0;
    }
    nonzero.iter().sum::<u32>() as f64 / nonzero.len() as f64
}

/// Resumen por docente para el periodo activo y su semestre par.
pub fn summarize(
    assignments: &[Assignment],
    active: TermKey,
    courses: &HashMap<String, Course>,
    names: &HashMap<String, String>,
) -> Vec<CreditSummary> {
    let this_term = term_credits(assignments, active, courses);
    let companion = term_credits(assignments, active.companion(), courses);

    let instructors: BTreeSet<&String> = this_term.keys().chain(companion.keys()).collect();
    instructors
        .into_iter()
        .map(|id| {
            let a = this_term.get(id).copied().unwrap_or(0);
            let b = companion.get(id).copied().unwrap_or(0);
            CreditSummary {
                instructor_id: id.clone(),
                instructor_name: names.get(id).cloned(),
                credits_this_term: a,
                credits_companion_term: b,
                yearly_average: yearly_average(&[a, b]),
            }
        })
        .collect()
}

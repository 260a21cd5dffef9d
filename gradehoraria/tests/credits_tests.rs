use std::collections::HashMap;

use chrono::NaiveTime;
use gradehoraria::algorithm::credits::{summarize, term_credits, yearly_average};
use gradehoraria::models::{Assignment, Course, EntryId, ProfSlot, TermKey};

fn t(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

fn courses() -> HashMap<String, Course> {
    let c = Course { id: "C1".to_string(), code: "GEX101".to_string(), name: "Cálculo I".to_string(), credits: 3 };
    HashMap::from([(c.id.clone(), c)])
}

fn session(base: &str, course: &str, day: u8, start: NaiveTime, term: TermKey) -> Assignment {
    Assignment {
        id: EntryId::new(base, ProfSlot::First),
        instructor_id: "p1".to_string(),
        course_id: course.to_string(),
        phase: 1,
        day,
        start_time: start,
        duration_slots: 2,
        term,
        allow_conflict: false,
    }
}

#[test]
fn test_parallel_sections_count_per_day() {
    let term = TermKey::new(2025, 1);
    // misma hora, dos días: dos turmas
    let a = vec![session("a", "C1", 1, t(19, 0), term), session("b", "C1", 3, t(19, 0), term)];
    assert_eq!(term_credits(&a, term, &courses()).get("p1"), Some(&6));
}

#[test]
fn test_split_discipline_counts_once() {
    let term = TermKey::new(2025, 1);
    // horas distintas: la misma disciplina dividida
    let a = vec![session("a", "C1", 1, t(19, 0), term), session("b", "C1", 3, t(20, 30), term)];
    assert_eq!(term_credits(&a, term, &courses()).get("p1"), Some(&3));
}

#[test]
fn test_unknown_course_counts_zero() {
    let term = TermKey::new(2025, 1);
    let a = vec![session("a", "NOPE", 1, t(19, 0), term)];
    assert_eq!(term_credits(&a, term, &courses()).get("p1"), Some(&0));
}

#[test]
fn test_yearly_average_ignores_empty_terms() {
    assert_eq!(yearly_average(&[6, 0]), 6.0);
    assert_eq!(yearly_average(&[6, 4]), 5.0);
    assert_eq!(yearly_average(&[0, 0]), 0.0);
}

#[test]
fn test_summary_includes_companion_term() {
    let first = TermKey::new(2025, 1);
    let second = first.companion();
    let a = vec![
        session("a", "C1", 1, t(19, 0), first),
        session("b", "C1", 2, t(19, 0), first),
        session("c", "C1", 1, t(19, 0), second),
        // otro año: no cuenta
        session("d", "C1", 1, t(19, 0), TermKey::new(2024, 2)),
    ];
    let names = HashMap::from([("p1".to_string(), "Ana Souza".to_string())]);
    let summary = summarize(&a, first, &courses(), &names);

    assert_eq!(summary.len(), 1);
    let s = &summary[0];
    assert_eq!(s.instructor_name.as_deref(), Some("Ana Souza"));
    assert_eq!(s.credits_this_term, 6);
    assert_eq!(s.credits_companion_term, 3);
    assert_eq!(s.yearly_average, 4.5);
}

use chrono::NaiveTime;
use gradehoraria::algorithm::time::{clamp_duration, end_time, overlaps, parse_time, remaining_slots, to_minutes};
use gradehoraria::models::{Shift, TimetableEntry};

fn t(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

fn entry(start: NaiveTime, slots: u8) -> TimetableEntry {
    TimetableEntry {
        base_id: format!("e{}", to_minutes(start)),
        course_id: "GEX101".to_string(),
        course_name: String::new(),
        instructor_ids: vec!["p1".to_string()],
        day: 1,
        start_time: start,
        duration_slots: slots,
        phase: 1,
        year: 2025,
        term: 1,
        comment: String::new(),
        allow_conflict: false,
        color: 0,
    }
}

#[test]
fn test_slot_tables() {
    let m = Shift::Matutino.slot_table();
    assert_eq!(m.len(), 9);
    assert_eq!(m[0], t(7, 30));
    assert_eq!(m[8], t(11, 30));

    let v = Shift::Vespertino.slot_table();
    assert_eq!(v[0], t(13, 30));
    assert_eq!(v[8], t(17, 30));

    let n = Shift::Noturno.slot_table();
    assert_eq!(n.len(), 7);
    assert_eq!(n[0], t(19, 0));
    assert_eq!(n[6], t(22, 0));
}

#[test]
fn test_shift_of() {
    assert_eq!(Shift::of(t(8, 0)), Some(Shift::Matutino));
    assert_eq!(Shift::of(t(14, 30)), Some(Shift::Vespertino));
    assert_eq!(Shift::of(t(21, 30)), Some(Shift::Noturno));
    // entre turnos
    assert_eq!(Shift::of(t(12, 30)), None);
    assert_eq!(Shift::of(t(18, 0)), None);
}

#[test]
fn test_end_time_inside_and_past_table() {
    let table = Shift::Noturno.slot_table();
    assert_eq!(end_time(t(19, 0), 2, &table), t(20, 0));
    // 22:00 es la última franja; se extrapola
    assert_eq!(end_time(t(22, 0), 2, &table), t(23, 0));
    assert_eq!(end_time(t(21, 30), 1, &table), t(22, 0));
}

#[test]
fn test_overlap_is_symmetric() {
    let a = entry(t(14, 0), 2);
    let b = entry(t(14, 30), 2);
    let c = entry(t(16, 0), 1);
    assert!(overlaps(&a, &b));
    assert!(overlaps(&b, &a));
    assert!(!overlaps(&a, &c));
    assert!(!overlaps(&c, &a));
}

#[test]
fn test_back_to_back_does_not_overlap() {
    // 19:00-20:00 y 20:00-21:00
    let a = entry(t(19, 0), 2);
    let b = entry(t(20, 0), 2);
    assert!(!overlaps(&a, &b));
    assert!(!overlaps(&b, &a));
}

#[test]
fn test_remaining_and_clamp() {
    assert_eq!(remaining_slots(t(7, 30)), Some(9));
    assert_eq!(remaining_slots(t(22, 0)), Some(1));
    assert_eq!(remaining_slots(t(12, 0)), None);

    assert_eq!(clamp_duration(t(21, 0), 6), 3);
    assert_eq!(clamp_duration(t(21, 0), 0), 1);
    assert_eq!(clamp_duration(t(13, 30), 4), 4);
}

#[test]
fn test_parse_time_formats() {
    assert_eq!(parse_time("19:00"), Some(t(19, 0)));
    assert_eq!(parse_time("07:30:00"), Some(t(7, 30)));
    assert_eq!(parse_time("7h30"), None);
}

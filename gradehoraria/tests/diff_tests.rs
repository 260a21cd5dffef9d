use chrono::NaiveTime;
use gradehoraria::algorithm::diff::{compute_changes, flatten_entries};
use gradehoraria::models::TimetableEntry;

fn t(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

fn entry(id: &str, instructors: &[&str]) -> TimetableEntry {
    TimetableEntry {
        base_id: id.to_string(),
        course_id: "C1".to_string(),
        course_name: String::new(),
        instructor_ids: instructors.iter().map(|s| s.to_string()).collect(),
        day: 2,
        start_time: t(19, 0),
        duration_slots: 2,
        phase: 1,
        year: 2025,
        term: 1,
        comment: String::new(),
        allow_conflict: false,
        color: 0,
    }
}

#[test]
fn test_flatten_one_row_per_instructor() {
    let rows = flatten_entries(&[entry("a", &["p1", "p2"]), entry("b", &["p3"])], &[], "cc");
    let ids: Vec<&str> = rows.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["a-prof1", "a-prof2", "b-prof1"]);
    assert!(rows.iter().all(|r| r.curriculum_id == "cc"));
}

#[test]
fn test_flatten_skips_incomplete_entries() {
    let mut no_course = entry("a", &["p1"]);
    no_course.course_id = String::new();
    let rows = flatten_entries(&[no_course, entry("b", &[])], &[], "cc");
    assert!(rows.is_empty());
}

#[test]
fn test_no_changes_after_snapshot() {
    let entries = vec![entry("a", &["p1", "p2"])];
    let snapshot = flatten_entries(&entries, &[], "cc");
    let candidates = flatten_entries(&entries, &snapshot, "cc");
    let changes = compute_changes(&candidates, &snapshot);
    assert!(changes.is_empty());
    assert_eq!(changes.total, 0);
}

#[test]
fn test_added_modified_removed() {
    let snapshot = flatten_entries(&[entry("a", &["p1"]), entry("gone", &["p2"])], &[], "cc");

    let mut moved = entry("a", &["p1"]);
    moved.start_time = t(20, 0);
    let candidates = flatten_entries(&[moved, entry("new", &["p4"])], &snapshot, "cc");

    let changes = compute_changes(&candidates, &snapshot);
    assert_eq!(changes.added.len(), 1);
    assert_eq!(changes.added[0].id, "new-prof1");
    assert_eq!(changes.modified.len(), 1);
    assert_eq!(changes.modified[0].before.start_time, t(19, 0));
    assert_eq!(changes.modified[0].after.start_time, t(20, 0));
    assert_eq!(changes.removed.len(), 1);
    assert_eq!(changes.removed[0].id, "gone-prof1");
    assert_eq!(changes.total, 3);
}

#[test]
fn test_allow_conflict_toggle_is_a_modification() {
    let snapshot = flatten_entries(&[entry("a", &["p1"])], &[], "cc");
    let mut e = entry("a", &["p1"]);
    e.allow_conflict = true;
    let changes = compute_changes(&flatten_entries(&[e], &snapshot, "cc"), &snapshot);
    assert_eq!(changes.modified.len(), 1);
    assert!(changes.added.is_empty() && changes.removed.is_empty());
}

#[test]
fn test_replaced_instructor_is_removed_and_added() {
    let snapshot = flatten_entries(&[entry("a", &["p1"])], &[], "cc");
    let candidates = flatten_entries(&[entry("a", &["p9"])], &snapshot, "cc");
    let changes = compute_changes(&candidates, &snapshot);

    assert_eq!(changes.removed.len(), 1);
    assert_eq!(changes.removed[0].instructor_id, "p1");
    assert_eq!(changes.added.len(), 1);
    assert_eq!(changes.added[0].id, "a-prof1");
    assert_eq!(changes.added[0].instructor_id, "p9");
    assert!(changes.modified.is_empty());
}

#[test]
fn test_dropping_second_instructor_removes_row() {
    let snapshot = flatten_entries(&[entry("a", &["p1", "p2"])], &[], "cc");
    let candidates = flatten_entries(&[entry("a", &["p1"])], &snapshot, "cc");
    let changes = compute_changes(&candidates, &snapshot);
    assert!(changes.added.is_empty());
    assert!(changes.modified.is_empty());
    assert_eq!(changes.removed.len(), 1);
    assert_eq!(changes.removed[0].id, "a-prof2");
}

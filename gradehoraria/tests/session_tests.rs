use chrono::NaiveTime;
use gradehoraria::error::{DataIntegrityWarning, ScheduleError, StoreOp, ValidationError};
use gradehoraria::models::{Course, Curriculum, EntryPatch, Instructor, Offering, PersistedRow, Shift, TermKey, TimetableEntry};
use gradehoraria::session::{ScheduleContext, ScheduleSession};
use gradehoraria::storage::MemoryStore;

const T1: TermKey = TermKey { year: 2025, term: 1 };
const T2: TermKey = TermKey { year: 2025, term: 2 };

fn t(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

fn course(id: &str, credits: u32) -> Course {
    Course { id: id.to_string(), code: format!("GEX{}", id), name: format!("Disciplina {}", id), credits }
}

fn instructor(id: &str) -> Instructor {
    Instructor { id: id.to_string(), name: format!("Docente {}", id) }
}

fn offering(phase: u8, shift: Shift) -> Offering {
    Offering { year: 2025, term: 1, curriculum_id: "cc".to_string(), phase, shift }
}

#[allow(clippy::too_many_arguments)]
fn row(id: &str, course: &str, instructor: &str, day: u8, start: NaiveTime, phase: u8, term: TermKey, curriculum: &str) -> PersistedRow {
    PersistedRow {
        id: id.to_string(),
        course_id: course.to_string(),
        instructor_id: instructor.to_string(),
        day,
        year: term.year,
        term: term.term,
        phase,
        start_time: start,
        duration_slots: 2,
        comment: String::new(),
        allow_conflict: false,
        curriculum_id: curriculum.to_string(),
    }
}

fn entry(id: &str, course: &str, instructors: &[&str]) -> TimetableEntry {
    TimetableEntry {
        base_id: id.to_string(),
        course_id: course.to_string(),
        course_name: String::new(),
        instructor_ids: instructors.iter().map(|s| s.to_string()).collect(),
        day: 1,
        start_time: t(14, 0),
        duration_slots: 2,
        phase: 1,
        year: 0,
        term: 0,
        comment: String::new(),
        allow_conflict: false,
        color: 0,
    }
}

fn store(rows: Vec<PersistedRow>) -> MemoryStore {
    MemoryStore::new()
        .with_courses(vec![course("C1", 3), course("C2", 4)])
        .with_instructors(vec![instructor("p1"), instructor("p2")])
        .with_curricula(vec![
            Curriculum { id: "cc".to_string(), name: "Ciência da Computação".to_string() },
            Curriculum { id: "other".to_string(), name: "Matemática".to_string() },
        ])
        .with_offerings(vec![offering(1, Shift::Vespertino), offering(3, Shift::Vespertino)])
        .with_rows(rows)
}

fn ctx() -> ScheduleContext {
    ScheduleContext::new(T1, "cc")
}

#[tokio::test]
async fn test_sync_is_idempotent() {
    let store = store(vec![]);
    let mut session = ScheduleSession::load(&store, ctx()).await.unwrap();

    session.add_entry(1, 2, t(14, 0), entry("a", "C1", &["p1", "p2"])).unwrap();
    assert_eq!(session.pending_changes().total, 2);

    let report = session.sync(&store).await.unwrap();
    assert_eq!(report.applied.added.len(), 2);
    assert_eq!(store.rows().len(), 2);
    assert!(session.pending_changes().is_empty());

    let ops_before = store.operations().len();
    let again = session.sync(&store).await.unwrap();
    assert!(again.applied.is_empty());
    assert_eq!(store.operations().len(), ops_before);
}

#[tokio::test]
async fn test_sync_runs_removals_then_updates_then_creates() {
    let store = store(vec![
        row("x-prof1", "C1", "p1", 2, t(14, 0), 1, T1, "cc"),
        row("y-prof1", "C2", "p2", 3, t(14, 0), 1, T1, "cc"),
    ]);
    let mut session = ScheduleSession::load(&store, ctx()).await.unwrap();
    assert_eq!(session.entries().count(), 2);

    session.add_entry(1, 4, t(15, 0), entry("z", "C1", &["p2"])).unwrap();
    session.resize_entry("y", 4, 1).unwrap();
    session.delete_entry("x", 1).unwrap();

    let report = session.sync(&store).await.unwrap();
    assert_eq!(report.applied.total, 3);
    assert_eq!(store.operations(), vec!["delete x-prof1", "update y-prof1", "create z-prof1"]);
    assert_eq!(session.snapshot().len(), 2);
    assert!(session.pending_changes().is_empty());
}

#[tokio::test]
async fn test_failed_sync_keeps_snapshot() {
    let store = store(vec![row("y-prof1", "C2", "p2", 3, t(14, 0), 1, T1, "cc")]);
    let mut session = ScheduleSession::load(&store, ctx()).await.unwrap();
    session.resize_entry("y", 4, 1).unwrap();

    store.fail_next(StoreOp::Update);
    let err = session.sync(&store).await.unwrap_err();
    match err {
        ScheduleError::Persistence(e) => {
            assert_eq!(e.op, StoreOp::Update);
            assert_eq!(e.target, "y-prof1");
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(session.snapshot()[0].duration_slots, 2);
    assert_eq!(session.pending_changes().total, 1);

    // reintento
    session.sync(&store).await.unwrap();
    assert_eq!(store.operations(), vec!["update y-prof1"]);
    assert_eq!(session.snapshot()[0].duration_slots, 4);
}

#[tokio::test]
async fn test_retry_after_partial_sync() {
    let store = store(vec![row("x-prof1", "C1", "p1", 2, t(14, 0), 1, T1, "cc")]);
    let mut session = ScheduleSession::load(&store, ctx()).await.unwrap();
    session.delete_entry("x", 1).unwrap();
    session.add_entry(1, 4, t(15, 0), entry("z", "C1", &["p2"])).unwrap();

    store.fail_next(StoreOp::Create);
    assert!(session.sync(&store).await.is_err());
    // la baja ya se aplicó pero el snapshot no cambió
    assert_eq!(session.snapshot().len(), 1);

    session.sync(&store).await.unwrap();
    assert_eq!(store.operations(), vec!["delete x-prof1", "delete x-prof1", "create z-prof1"]);
    assert_eq!(store.rows().len(), 1);
}

#[tokio::test]
async fn test_second_sync_while_busy_is_rejected() {
    let store = store(vec![]);
    let mut session = ScheduleSession::load(&store, ctx()).await.unwrap();
    session.add_entry(1, 2, t(14, 0), entry("a", "C1", &["p1"])).unwrap();

    let gate = session.sync_gate();
    let permit = gate.try_acquire().unwrap();
    assert!(gate.is_busy());
    assert!(matches!(session.sync(&store).await, Err(ScheduleError::SyncInProgress)));
    assert!(store.rows().is_empty());

    drop(permit);
    assert!(!gate.is_busy());
    session.sync(&store).await.unwrap();
    assert_eq!(store.rows().len(), 1);
    assert!(!gate.is_busy());
}

#[tokio::test]
async fn test_hydration_skips_bad_rows() {
    let mut no_duration = row("e-prof1", "C1", "p1", 1, t(14, 0), 1, T1, "cc");
    no_duration.duration_slots = 0;
    let store = store(vec![
        row("ok-prof1", "C1", "p1", 1, t(14, 0), 1, T1, "cc"),
        row("ok-prof2", "C1", "p2", 1, t(14, 0), 1, T1, "cc"),
        row("b-prof1", "ZZ", "p1", 1, t(14, 0), 1, T1, "cc"),
        row("c-prof1", "C1", "p1", 9, t(14, 0), 1, T1, "cc"),
        row("d-prof1", "C1", "p1", 1, t(12, 15), 1, T1, "cc"),
        no_duration,
    ]);
    let session = ScheduleSession::load(&store, ctx()).await.unwrap();

    let entries: Vec<&TimetableEntry> = session.entries().collect();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].instructor_ids, vec!["p1", "p2"]);
    assert_eq!(entries[0].course_name, "Disciplina C1");
    assert_eq!(session.snapshot().len(), 2);

    let w = session.warnings();
    assert_eq!(w.len(), 4);
    assert!(w.iter().any(|x| matches!(x, DataIntegrityWarning::UnknownCourse { row_id, .. } if row_id == "b-prof1")));
    assert!(w.iter().any(|x| matches!(x, DataIntegrityWarning::InvalidDay { day: 9, .. })));
    assert!(w.iter().any(|x| matches!(x, DataIntegrityWarning::OutsideShift { .. })));
    assert!(w.iter().any(|x| matches!(x, DataIntegrityWarning::EmptyDuration { .. })));
}

#[tokio::test]
async fn test_load_failure_is_reported() {
    let store = store(vec![]);
    store.fail_next(StoreOp::ListCourses);
    let err = ScheduleSession::load(&store, ctx()).await.unwrap_err();
    assert!(matches!(err, ScheduleError::Persistence(e) if e.op == StoreOp::ListCourses));
}

#[tokio::test]
async fn test_saved_and_new_entry_conflict_until_allowed() {
    // E1 ya guardada (en otra fase del mismo curso)
    let store = store(vec![row("e1-prof1", "C1", "p1", 1, t(14, 0), 3, T1, "cc")]);
    let mut session = ScheduleSession::load(&store, ctx()).await.unwrap();

    let mut e2 = entry("e2", "C1", &["p1"]);
    e2.start_time = t(14, 30);
    session.add_entry(1, 1, t(14, 30), e2).unwrap();

    let e2 = session.event_store().get("e2").cloned().unwrap();
    let conflicts = session.conflicts_for(&e2);
    assert_eq!(conflicts.len(), 1);
    let ids = [conflicts[0].entry_a.id.to_string(), conflicts[0].entry_b.id.to_string()];
    assert!(ids.contains(&"e1-prof1".to_string()));
    assert!(ids.contains(&"e2-prof1".to_string()));

    let patch = EntryPatch { allow_conflict: Some(true), ..Default::default() };
    session.edit_entry("e2", &patch).unwrap();
    let e2 = session.event_store().get("e2").cloned().unwrap();
    assert!(session.conflicts_for(&e2).is_empty());
    assert!(session.conflicts().is_empty());
}

#[tokio::test]
async fn test_conflict_with_other_curriculum() {
    let store = store(vec![row("m-prof1", "C2", "p1", 1, t(14, 0), 5, T1, "other")]);
    let mut session = ScheduleSession::load(&store, ctx()).await.unwrap();
    session.add_entry(1, 1, t(14, 30), entry("n", "C1", &["p1"])).unwrap();

    let conflicts = session.conflicts();
    assert_eq!(conflicts.len(), 1);
    assert_eq!(conflicts[0].id, "p1|m-prof1|n-prof1");
}

#[tokio::test]
async fn test_deleted_entry_stops_conflicting() {
    let store = store(vec![row("e1-prof1", "C1", "p1", 1, t(14, 0), 3, T1, "cc")]);
    let mut session = ScheduleSession::load(&store, ctx()).await.unwrap();
    session.add_entry(1, 1, t(14, 30), entry("e2", "C1", &["p1"])).unwrap();
    assert_eq!(session.conflicts().len(), 1);

    session.delete_entry("e1", 3).unwrap();
    assert!(session.conflicts().is_empty());
}

#[tokio::test]
async fn test_catalog_validation() {
    let store = store(vec![]);
    let mut session = ScheduleSession::load(&store, ctx()).await.unwrap();

    // fase 1 sólo se ofrece en el vespertino
    let err = session.add_entry(1, 1, t(19, 0), entry("a", "C1", &["p1"])).unwrap_err();
    assert!(matches!(err, ScheduleError::Validation(ValidationError::ShiftNotOffered { shift: Shift::Noturno, .. })));

    let err = session.add_entry(1, 1, t(14, 0), entry("a", "C1", &["p7"])).unwrap_err();
    assert!(matches!(err, ScheduleError::Validation(ValidationError::UnknownInstructor { .. })));

    let err = session.add_entry(1, 1, t(14, 0), entry("a", "C9", &["p1"])).unwrap_err();
    assert!(matches!(err, ScheduleError::Validation(ValidationError::UnknownCourse { .. })));

    // fase sin oferta cargada: cualquier turno
    session.add_entry(7, 1, t(19, 0), entry("a", "C1", &["p1"])).unwrap();
    assert_eq!(session.shifts_for_phase(1), vec![Shift::Vespertino]);
    assert!(!session.is_multi_shift(1));
}

#[tokio::test]
async fn test_replacing_instructor_deletes_and_recreates_row() {
    let store = store(vec![row("a-prof1", "C1", "p1", 1, t(14, 0), 1, T1, "cc")]);
    let mut session = ScheduleSession::load(&store, ctx()).await.unwrap();

    let patch = EntryPatch { instructor_ids: Some(vec!["p2".to_string()]), ..Default::default() };
    session.edit_entry("a", &patch).unwrap();

    let pending = session.pending_changes();
    assert_eq!(pending.removed.len(), 1);
    assert_eq!(pending.added.len(), 1);

    session.sync(&store).await.unwrap();
    assert_eq!(store.operations(), vec!["delete a-prof1", "create a-prof1"]);
    let rows = store.rows();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].instructor_id, "p2");
}

#[tokio::test]
async fn test_credits_summary() {
    // 2025/2 del mismo curso: semestre par
    let store = store(vec![row("s-prof1", "C2", "p1", 2, t(19, 0), 2, T2, "cc")]);
    let mut session = ScheduleSession::load(&store, ctx()).await.unwrap();
    session.add_entry(1, 1, t(14, 0), entry("a", "C1", &["p1"])).unwrap();
    session.add_entry(1, 3, t(14, 0), entry("b", "C1", &["p1"])).unwrap();

    let summary = session.credits_summary();
    assert_eq!(summary.len(), 1);
    assert_eq!(summary[0].instructor_id, "p1");
    assert_eq!(summary[0].instructor_name.as_deref(), Some("Docente p1"));
    assert_eq!(summary[0].credits_this_term, 6);
    assert_eq!(summary[0].credits_companion_term, 4);
    assert_eq!(summary[0].yearly_average, 5.0);
}

#[tokio::test]
async fn test_removed_second_instructor_stops_counting() {
    // "x" con dos docentes; p2 también da "y" en el mismo horario
    let store = store(vec![
        row("x-prof1", "C1", "p1", 1, t(14, 0), 1, T1, "cc"),
        row("x-prof2", "C1", "p2", 1, t(14, 0), 1, T1, "cc"),
        row("y-prof1", "C2", "p2", 1, t(14, 30), 3, T1, "cc"),
    ]);
    let mut session = ScheduleSession::load(&store, ctx()).await.unwrap();
    assert_eq!(session.conflicts().len(), 1);

    let patch = EntryPatch { instructor_ids: Some(vec!["p1".to_string()]), ..Default::default() };
    session.edit_entry("x", &patch).unwrap();

    // la fila x-prof2 del snapshot ya no cuenta antes del sync
    assert!(session.conflicts().is_empty());
    let summary = session.credits_summary();
    let p1 = summary.iter().find(|s| s.instructor_id == "p1").unwrap();
    let p2 = summary.iter().find(|s| s.instructor_id == "p2").unwrap();
    assert_eq!(p1.credits_this_term, 3);
    assert_eq!(p2.credits_this_term, 4);
}

use rusqlite::{Connection, Row, params};
use std::fmt;
use std::fs;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use tracing::{debug, warn};

use crate::algorithm::time::parse_time;
use crate::error::{DataIntegrityWarning, PersistenceError, StoreOp};
use crate::models::{Course, Curriculum, Instructor, Offering, PersistedRow, Shift, TermKey};
use crate::storage::TimetableStore;

/// Almacén SQLite. Las operaciones son cortas y síncronas; el mutex sólo
/// serializa el acceso a la conexión.
pub struct SqliteStore {
    conn: Mutex<Connection>,
    skipped: Mutex<Vec<DataIntegrityWarning>>,
}

impl fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SqliteStore(..)")
    }
}

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS ccr (
        id TEXT PRIMARY KEY,
        codigo TEXT NOT NULL,
        nome TEXT NOT NULL,
        creditos INTEGER NOT NULL
    );
    CREATE TABLE IF NOT EXISTS docente (
        codigo TEXT PRIMARY KEY,
        nome TEXT NOT NULL
    );
    CREATE TABLE IF NOT EXISTS curso (
        id TEXT PRIMARY KEY,
        nome TEXT NOT NULL
    );
    CREATE TABLE IF NOT EXISTS oferta (
        ano INTEGER NOT NULL,
        semestre INTEGER NOT NULL,
        id_curso TEXT NOT NULL,
        fase INTEGER NOT NULL,
        turno TEXT NOT NULL
    );
    CREATE TABLE IF NOT EXISTS horario (
        id TEXT PRIMARY KEY,
        id_ccr TEXT NOT NULL,
        codigo_docente TEXT NOT NULL,
        dia_semana INTEGER NOT NULL,
        ano INTEGER NOT NULL,
        semestre INTEGER NOT NULL,
        fase INTEGER NOT NULL,
        hora_inicio TEXT NOT NULL,
        duracao INTEGER NOT NULL,
        comentario TEXT NOT NULL DEFAULT '',
        permitir_conflito INTEGER NOT NULL DEFAULT 0,
        id_curso TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS horario_periodo ON horario (ano, semestre, id_curso);
";

const ROW_COLUMNS: &str = "id, id_ccr, codigo_docente, dia_semana, ano, semestre, fase, hora_inicio, duracao, comentario, permitir_conflito, id_curso";

impl SqliteStore {
    /// Abre (o crea) la base en `path`, creando el directorio si falta.
    pub fn open(path: &Path) -> Result<Self, PersistenceError> {
        let target = path.display().to_string();
        if let Some(dir) = path.parent() {
            if !dir.as_os_str().is_empty() && !dir.exists() {
                fs::create_dir_all(dir).map_err(|e| PersistenceError::new(StoreOp::Open, target.clone(), e))?;
            }
        }
        let conn = Connection::open(path).map_err(|e| PersistenceError::new(StoreOp::Open, target.clone(), e))?;
        Self::init(conn, &target)
    }

    pub fn open_in_memory() -> Result<Self, PersistenceError> {
        let conn = Connection::open_in_memory().map_err(|e| PersistenceError::new(StoreOp::Open, ":memory:", e))?;
        Self::init(conn, ":memory:")
    }

    fn init(conn: Connection, target: &str) -> Result<Self, PersistenceError> {
        conn.execute_batch(SCHEMA).map_err(|e| PersistenceError::new(StoreOp::Open, target, e))?;
        debug!(db = %target, "sqlite schema ready");
        Ok(SqliteStore { conn: Mutex::new(conn), skipped: Mutex::new(Vec::new()) })
    }

    fn lock(&self, op: StoreOp) -> Result<MutexGuard<'_, Connection>, PersistenceError> {
        self.conn.lock().map_err(|e| PersistenceError::new(op, "sqlite connection", e))
    }

    pub fn insert_course(&self, course: &Course) -> Result<(), PersistenceError> {
        let conn = self.lock(StoreOp::Create)?;
        conn.execute(
            "INSERT OR REPLACE INTO ccr (id, codigo, nome, creditos) VALUES (?1, ?2, ?3, ?4)",
            params![course.id, course.code, course.name, course.credits],
        )
        .map_err(|e| PersistenceError::new(StoreOp::Create, course.id.clone(), e))?;
        Ok(())
    }

    pub fn insert_instructor(&self, instructor: &Instructor) -> Result<(), PersistenceError> {
        let conn = self.lock(StoreOp::Create)?;
        conn.execute(
            "INSERT OR REPLACE INTO docente (codigo, nome) VALUES (?1, ?2)",
            params![instructor.id, instructor.name],
        )
        .map_err(|e| PersistenceError::new(StoreOp::Create, instructor.id.clone(), e))?;
        Ok(())
    }

    pub fn insert_curriculum(&self, curriculum: &Curriculum) -> Result<(), PersistenceError> {
        let conn = self.lock(StoreOp::Create)?;
        conn.execute(
            "INSERT OR REPLACE INTO curso (id, nome) VALUES (?1, ?2)",
            params![curriculum.id, curriculum.name],
        )
        .map_err(|e| PersistenceError::new(StoreOp::Create, curriculum.id.clone(), e))?;
        Ok(())
    }

    pub fn insert_offering(&self, offering: &Offering) -> Result<(), PersistenceError> {
        let conn = self.lock(StoreOp::Create)?;
        conn.execute(
            "INSERT INTO oferta (ano, semestre, id_curso, fase, turno) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![offering.year, offering.term, offering.curriculum_id, offering.phase, offering.shift.as_str()],
        )
        .map_err(|e| PersistenceError::new(StoreOp::Create, offering.curriculum_id.clone(), e))?;
        Ok(())
    }
}

/// Lee una fila de `horario`; `hora_inicio` ilegible devuelve el aviso.
fn read_row(row: &Row<'_>) -> rusqlite::Result<Result<PersistedRow, DataIntegrityWarning>> {
    let id: String = row.get(0)?;
    let year: i32 = row.get(4)?;
    let term: u8 = row.get(5)?;
    let hora: String = row.get(7)?;
    let Some(start_time) = parse_time(&hora) else {
        return Ok(Err(DataIntegrityWarning::UnreadableStart { row_id: id, term: TermKey::new(year, term), raw: hora }));
    };
    Ok(Ok(PersistedRow {
        id,
        course_id: row.get(1)?,
        instructor_id: row.get(2)?,
        day: row.get(3)?,
        year,
        term,
        phase: row.get(6)?,
        start_time,
        duration_slots: row.get(8)?,
        comment: row.get(9)?,
        allow_conflict: row.get::<_, i64>(10)? != 0,
        curriculum_id: row.get(11)?,
    }))
}

fn write_row(conn: &Connection, row: &PersistedRow, sql: &str, op: StoreOp) -> Result<(), PersistenceError> {
    conn.execute(
        sql,
        params![
            row.id,
            row.course_id,
            row.instructor_id,
            row.day,
            row.year,
            row.term,
            row.phase,
            row.start_time.format("%H:%M:%S").to_string(),
            row.duration_slots,
            row.comment,
            row.allow_conflict as i64,
            row.curriculum_id,
        ],
    )
    .map_err(|e| PersistenceError::new(op, row.id.clone(), e))?;
    Ok(())
}

impl TimetableStore for SqliteStore {
    async fn list_courses(&self) -> Result<Vec<Course>, PersistenceError> {
        let op = StoreOp::ListCourses;
        let conn = self.lock(op)?;
        let mut stmt = conn
            .prepare("SELECT id, codigo, nome, creditos FROM ccr ORDER BY id")
            .map_err(|e| PersistenceError::new(op, "ccr", e))?;
        let rows = stmt
            .query_map([], |r| Ok(Course { id: r.get(0)?, code: r.get(1)?, name: r.get(2)?, credits: r.get(3)? }))
            .map_err(|e| PersistenceError::new(op, "ccr", e))?;
        let mut out = Vec::new();
        for r in rows {
            out.push(r.map_err(|e| PersistenceError::new(op, "ccr", e))?);
        }
        Ok(out)
    }

    async fn list_instructors(&self) -> Result<Vec<Instructor>, PersistenceError> {
        let op = StoreOp::ListInstructors;
        let conn = self.lock(op)?;
        let mut stmt = conn
            .prepare("SELECT codigo, nome FROM docente ORDER BY codigo")
            .map_err(|e| PersistenceError::new(op, "docente", e))?;
        let rows = stmt
            .query_map([], |r| Ok(Instructor { id: r.get(0)?, name: r.get(1)? }))
            .map_err(|e| PersistenceError::new(op, "docente", e))?;
        let mut out = Vec::new();
        for r in rows {
            out.push(r.map_err(|e| PersistenceError::new(op, "docente", e))?);
        }
        Ok(out)
    }

    async fn list_curricula(&self) -> Result<Vec<Curriculum>, PersistenceError> {
        let op = StoreOp::ListCurricula;
        let conn = self.lock(op)?;
        let mut stmt = conn
            .prepare("SELECT id, nome FROM curso ORDER BY id")
            .map_err(|e| PersistenceError::new(op, "curso", e))?;
        let rows = stmt
            .query_map([], |r| Ok(Curriculum { id: r.get(0)?, name: r.get(1)? }))
            .map_err(|e| PersistenceError::new(op, "curso", e))?;
        let mut out = Vec::new();
        for r in rows {
            out.push(r.map_err(|e| PersistenceError::new(op, "curso", e))?);
        }
        Ok(out)
    }

    async fn list_offerings(&self, term: TermKey, curriculum_id: &str) -> Result<Vec<Offering>, PersistenceError> {
        let op = StoreOp::ListOfferings;
        let target = format!("{} {}", term, curriculum_id);
        let conn = self.lock(op)?;
        let mut stmt = conn
            .prepare("SELECT fase, turno FROM oferta WHERE ano = ?1 AND semestre = ?2 AND id_curso = ?3 ORDER BY fase")
            .map_err(|e| PersistenceError::new(op, target.clone(), e))?;
        let rows = stmt
            .query_map(params![term.year, term.term, curriculum_id], |r| {
                Ok((r.get::<_, u8>(0)?, r.get::<_, String>(1)?))
            })
            .map_err(|e| PersistenceError::new(op, target.clone(), e))?;
        let mut out = Vec::new();
        for r in rows {
            let (phase, turno) = r.map_err(|e| PersistenceError::new(op, target.clone(), e))?;
            match turno.parse::<Shift>() {
                Ok(shift) => out.push(Offering {
                    year: term.year,
                    term: term.term,
                    curriculum_id: curriculum_id.to_string(),
                    phase,
                    shift,
                }),
                Err(e) => warn!(%term, curriculum_id, phase, "skipping offering: {}", e),
            }
        }
        Ok(out)
    }

    async fn list_timetable_entries(&self, term: TermKey, curriculum_id: &str) -> Result<Vec<PersistedRow>, PersistenceError> {
        let op = StoreOp::ListEntries;
        let target = format!("{} {}", term, curriculum_id);
        let conn = self.lock(op)?;
        let sql = format!(
            "SELECT {} FROM horario WHERE ano = ?1 AND semestre = ?2 AND id_curso = ?3 ORDER BY id",
            ROW_COLUMNS
        );
        let mut stmt = conn.prepare(&sql).map_err(|e| PersistenceError::new(op, target.clone(), e))?;
        let rows = stmt
            .query_map(params![term.year, term.term, curriculum_id], read_row)
            .map_err(|e| PersistenceError::new(op, target.clone(), e))?;
        let mut out = Vec::new();
        let mut skipped = Vec::new();
        for r in rows {
            match r.map_err(|e| PersistenceError::new(op, target.clone(), e))? {
                Ok(row) => out.push(row),
                Err(w) => {
                    warn!("skipping persisted row: {}", w);
                    skipped.push(w);
                }
            }
        }
        if !skipped.is_empty() {
            self.skipped.lock().map_err(|e| PersistenceError::new(op, target.clone(), e))?.append(&mut skipped);
        }
        Ok(out)
    }

    /// Todas las filas en una transacción: o entran todas o ninguna.
    async fn create_timetable_entries_bulk(&self, rows: &[PersistedRow]) -> Result<(), PersistenceError> {
        let op = StoreOp::Create;
        let mut conn = self.lock(op)?;
        let tx = conn.transaction().map_err(|e| PersistenceError::new(op, "bulk create", e))?;
        let sql = format!(
            "INSERT INTO horario ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            ROW_COLUMNS
        );
        for row in rows {
            write_row(&tx, row, &sql, op)?;
        }
        tx.commit().map_err(|e| PersistenceError::new(op, "bulk create", e))?;
        Ok(())
    }

    async fn update_timetable_entry(&self, id: &str, row: &PersistedRow) -> Result<(), PersistenceError> {
        let op = StoreOp::Update;
        let conn = self.lock(op)?;
        let changed = conn
            .execute(
                "UPDATE horario SET id_ccr = ?2, codigo_docente = ?3, dia_semana = ?4, ano = ?5, semestre = ?6,
                    fase = ?7, hora_inicio = ?8, duracao = ?9, comentario = ?10, permitir_conflito = ?11, id_curso = ?12
                 WHERE id = ?1",
                params![
                    id,
                    row.course_id,
                    row.instructor_id,
                    row.day,
                    row.year,
                    row.term,
                    row.phase,
                    row.start_time.format("%H:%M:%S").to_string(),
                    row.duration_slots,
                    row.comment,
                    row.allow_conflict as i64,
                    row.curriculum_id,
                ],
            )
            .map_err(|e| PersistenceError::new(op, id, e))?;
        if changed == 0 {
            return Err(PersistenceError::new(op, id, "row not found"));
        }
        Ok(())
    }

    async fn delete_timetable_entry(&self, id: &str) -> Result<(), PersistenceError> {
        let op = StoreOp::Delete;
        let conn = self.lock(op)?;
        conn.execute("DELETE FROM horario WHERE id = ?1", params![id])
            .map_err(|e| PersistenceError::new(op, id, e))?;
        Ok(())
    }

    fn drain_warnings(&self) -> Vec<DataIntegrityWarning> {
        match self.skipped.lock() {
            Ok(mut g) => std::mem::take(&mut *g),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        }
    }
}

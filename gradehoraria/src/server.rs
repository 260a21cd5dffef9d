use std::sync::atomic::{AtomicU64, Ordering};

use actix_web::{App, HttpResponse, HttpServer, Responder, web};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::algorithm::time::parse_time;
use crate::config::Config;
use crate::error::ScheduleError;
use crate::models::{Day, EntryPatch, TimetableEntry};
use crate::session::{ScheduleSession, SyncGate};
use crate::storage::SqliteStore;

/// Estado compartido entre handlers: una sesión de edición y su almacén.
pub struct AppState {
    pub session: Mutex<ScheduleSession>,
    pub store: SqliteStore,
    gate: SyncGate,
    next_id: AtomicU64,
}

impl AppState {
    pub fn new(session: ScheduleSession, store: SqliteStore) -> Self {
        let gate = session.sync_gate();
        AppState { session: Mutex::new(session), store, gate, next_id: AtomicU64::new(1) }
    }

    /// Id base nuevo: marca de tiempo + contador del proceso.
    fn new_base_id(&self) -> String {
        let n = self.next_id.fetch_add(1, Ordering::Relaxed);
        format!("h{}{:04}", chrono::Utc::now().timestamp_millis(), n)
    }
}

#[derive(Deserialize)]
struct NewEntryRequest {
    id: Option<String>,
    phase: u8,
    day: Day,
    /// "HH:MM" o "HH:MM:SS"
    start: String,
    course_id: String,
    instructor_ids: Vec<String>,
    #[serde(default = "default_duration")]
    duration_slots: u8,
    #[serde(default)]
    comment: String,
    #[serde(default)]
    allow_conflict: bool,
}

fn default_duration() -> u8 {
    2
}

#[derive(Deserialize)]
struct MoveRequest {
    day: Day,
    start: String,
    phase: u8,
}

#[derive(Deserialize)]
struct ResizeRequest {
    duration_slots: u8,
    phase: u8,
}

#[derive(Deserialize)]
struct PhaseQuery {
    phase: u8,
}

fn error_response(e: &ScheduleError) -> HttpResponse {
    let body = json!({"error": e.to_string()});
    match e {
        ScheduleError::Validation(_) => HttpResponse::BadRequest().json(body),
        ScheduleError::EntryNotFound(_) => HttpResponse::NotFound().json(body),
        ScheduleError::SyncInProgress => HttpResponse::Conflict().json(body),
        ScheduleError::Persistence(_) => HttpResponse::BadGateway().json(body),
    }
}

fn bad_time(raw: &str) -> HttpResponse {
    HttpResponse::BadRequest().json(json!({"error": format!("invalid time '{}', expected HH:MM", raw)}))
}

/// GET /entries
async fn entries_handler(state: web::Data<AppState>) -> impl Responder {
    let session = state.session.lock().await;
    let entries: Vec<&TimetableEntry> = session.entries().collect();
    HttpResponse::Ok().json(json!({"entries": entries, "warnings": session.warnings()}))
}

/// POST /entries
async fn add_entry_handler(state: web::Data<AppState>, body: web::Json<NewEntryRequest>) -> impl Responder {
    let req = body.into_inner();
    let Some(start) = parse_time(&req.start) else {
        return bad_time(&req.start);
    };
    let base_id = req.id.filter(|s| !s.trim().is_empty()).unwrap_or_else(|| state.new_base_id());
    let entry = TimetableEntry {
        base_id: base_id.clone(),
        course_id: req.course_id,
        course_name: String::new(),
        instructor_ids: req.instructor_ids,
        day: req.day,
        start_time: start,
        duration_slots: req.duration_slots,
        phase: req.phase,
        year: 0,
        term: 0,
        comment: req.comment,
        allow_conflict: req.allow_conflict,
        color: 0,
    };

    let mut session = state.session.lock().await;
    match session.add_entry(req.phase, req.day, start, entry) {
        Ok(()) => HttpResponse::Created().json(json!({"id": base_id, "entry": session.event_store().get(&base_id)})),
        Err(e) => error_response(&e),
    }
}

/// PATCH /entries/{id}
async fn edit_entry_handler(
    state: web::Data<AppState>,
    path: web::Path<String>,
    body: web::Json<EntryPatch>,
) -> impl Responder {
    let id = path.into_inner();
    let mut session = state.session.lock().await;
    match session.edit_entry(&id, &body) {
        Ok(updated) => HttpResponse::Ok().json(json!({"updated": updated})),
        Err(e) => error_response(&e),
    }
}

/// POST /entries/{id}/move
async fn move_entry_handler(
    state: web::Data<AppState>,
    path: web::Path<String>,
    body: web::Json<MoveRequest>,
) -> impl Responder {
    let id = path.into_inner();
    let Some(start) = parse_time(&body.start) else {
        return bad_time(&body.start);
    };
    let mut session = state.session.lock().await;
    match session.move_entry(&id, body.day, start, body.phase) {
        Ok(()) => HttpResponse::Ok().json(json!({"entry": session.event_store().get(&id)})),
        Err(e) => error_response(&e),
    }
}

/// POST /entries/{id}/resize
async fn resize_entry_handler(
    state: web::Data<AppState>,
    path: web::Path<String>,
    body: web::Json<ResizeRequest>,
) -> impl Responder {
    let id = path.into_inner();
    let mut session = state.session.lock().await;
    match session.resize_entry(&id, body.duration_slots, body.phase) {
        Ok(applied) => HttpResponse::Ok().json(json!({"id": id, "duration_slots": applied})),
        Err(e) => error_response(&e),
    }
}

/// DELETE /entries/{id}?phase=N
async fn delete_entry_handler(
    state: web::Data<AppState>,
    path: web::Path<String>,
    query: web::Query<PhaseQuery>,
) -> impl Responder {
    let id = path.into_inner();
    let mut session = state.session.lock().await;
    match session.delete_entry(&id, query.phase) {
        Ok(removed) => HttpResponse::Ok().json(json!({"removed": removed})),
        Err(e) => error_response(&e),
    }
}

/// GET /conflicts
async fn conflicts_handler(state: web::Data<AppState>) -> impl Responder {
    let session = state.session.lock().await;
    let conflicts = session.conflicts();
    HttpResponse::Ok().json(json!({"count": conflicts.len(), "conflicts": conflicts}))
}

/// POST /conflicts/for
/// Recibe una entrada completa (p. ej. la que se está arrastrando en la UI).
async fn conflicts_for_handler(state: web::Data<AppState>, body: web::Json<TimetableEntry>) -> impl Responder {
    let session = state.session.lock().await;
    let conflicts = session.conflicts_for(&body);
    HttpResponse::Ok().json(json!({"count": conflicts.len(), "conflicts": conflicts}))
}

/// GET /changes
async fn changes_handler(state: web::Data<AppState>) -> impl Responder {
    let session = state.session.lock().await;
    HttpResponse::Ok().json(session.pending_changes())
}

/// POST /sync
async fn sync_handler(state: web::Data<AppState>) -> impl Responder {
    if state.gate.is_busy() {
        return error_response(&ScheduleError::SyncInProgress);
    }
    let mut session = state.session.lock().await;
    match session.sync(&state.store).await {
        Ok(report) => HttpResponse::Ok().json(json!({"status": "ok", "applied": report.applied})),
        Err(e) => {
            warn!("sync request failed: {}", e);
            error_response(&e)
        }
    }
}

/// GET /credits
async fn credits_handler(state: web::Data<AppState>) -> impl Responder {
    let session = state.session.lock().await;
    HttpResponse::Ok().json(json!({"credits": session.credits_summary()}))
}

async fn help_handler() -> impl Responder {
    let example = json!({
        "phase": 3,
        "day": 1,
        "start": "19:00",
        "course_id": "GEX101",
        "instructor_ids": ["1234567"],
        "duration_slots": 2,
        "comment": "",
        "allow_conflict": false
    });

    let help = json!({
        "description": "API de edición de la grade horária. Las entradas se editan en memoria y se persisten con POST /sync.",
        "routes": [
            "GET /entries",
            "POST /entries",
            "PATCH /entries/{id}",
            "POST /entries/{id}/move",
            "POST /entries/{id}/resize",
            "DELETE /entries/{id}?phase=N",
            "GET /conflicts",
            "POST /conflicts/for",
            "GET /changes",
            "POST /sync",
            "GET /credits"
        ],
        "post_entries_example": example,
        "note": "day: 1 = segunda-feira ... 6 = sábado; duration_slots en franjas de 30 minutos."
    });

    HttpResponse::Ok().json(help)
}

pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/entries", web::get().to(entries_handler))
        .route("/entries", web::post().to(add_entry_handler))
        .route("/entries/{id}", web::patch().to(edit_entry_handler))
        .route("/entries/{id}", web::delete().to(delete_entry_handler))
        .route("/entries/{id}/move", web::post().to(move_entry_handler))
        .route("/entries/{id}/resize", web::post().to(resize_entry_handler))
        .route("/conflicts", web::get().to(conflicts_handler))
        .route("/conflicts/for", web::post().to(conflicts_for_handler))
        .route("/changes", web::get().to(changes_handler))
        .route("/sync", web::post().to(sync_handler))
        .route("/credits", web::get().to(credits_handler))
        .route("/help", web::get().to(help_handler));
}

pub async fn run_server(config: &Config, state: AppState) -> std::io::Result<()> {
    let data = web::Data::new(state);
    info!(bind = %config.bind_addr, "starting http server");
    HttpServer::new(move || App::new().app_data(data.clone()).configure(routes))
        .bind(config.bind_addr.as_str())?
        .run()
        .await
}

// Biblioteca raíz del crate `gradehoraria`.
// Grilla de horarios por fase, detección de conflictos de docentes,
// sincronización con el almacén y resumen de créditos.
pub mod algorithm;
pub mod config;
pub mod error;
pub mod models;
pub mod schedule;
pub mod server;
pub mod session;
pub mod storage;

pub use config::Config;
pub use error::{ConfigError, DataIntegrityWarning, PersistenceError, ScheduleError, ValidationError};
pub use schedule::EventStore;
pub use session::{ScheduleContext, ScheduleSession, SyncReport};
/// Ejecuta el servidor HTTP (reexport para facilitar uso desde `main`)
pub use server::run_server;
pub use storage::{MemoryStore, SqliteStore, TimetableStore};

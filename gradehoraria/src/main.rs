// --- Grade horária - servidor de edición ---

use std::io;

use gradehoraria::server::AppState;
use gradehoraria::{Config, ScheduleSession, SqliteStore, run_server};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn to_io(e: impl std::fmt::Display) -> io::Error {
    io::Error::other(e.to_string())
}

#[tokio::main]
async fn main() -> io::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("gradehoraria=info")))
        .init();

    let config = Config::from_env().map_err(|e| {
        error!("invalid configuration: {}", e);
        to_io(e)
    })?;
    info!(db = %config.db_path.display(), term = %config.context.term, curriculum = %config.context.curriculum_id, "=== Grade horária ===");

    let store = SqliteStore::open(&config.db_path).map_err(to_io)?;
    let session = ScheduleSession::load(&store, config.context.clone()).await.map_err(to_io)?;
    if !session.warnings().is_empty() {
        info!(count = session.warnings().len(), "some persisted rows were skipped, see warnings above");
    }

    run_server(&config, AppState::new(session, store)).await
}

// Configuración desde `.env` y variables de entorno.
use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use chrono::Datelike;

use crate::error::ConfigError;
use crate::models::TermKey;
use crate::session::ScheduleContext;

pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8080";
pub const DEFAULT_DB_PATH: &str = "data/gradehoraria.db";

pub fn load_dotenv() {
    let _ = dotenv::dotenv();
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub bind_addr: String,
    pub db_path: PathBuf,
    pub context: ScheduleContext,
}

impl Config {
    /// Lee `.env` (si existe) y luego el entorno del proceso.
    pub fn from_env() -> Result<Config, ConfigError> {
        load_dotenv();
        Config::from_lookup(|k| env::var(k).ok())
    }

    /// Igual que `from_env` pero con una fuente de variables arbitraria.
    pub fn from_lookup<F>(lookup: F) -> Result<Config, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |k: &str| lookup(k).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let bind_addr = get("GRADE_BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let db_path = db_path(get("GRADE_DB_PATH"), get("GRADE_DB_URL"))?;

        let (default_year, default_term) = current_term();
        let year = match get("GRADE_ANO") {
            Some(v) => parse_var::<i32>("GRADE_ANO", &v)?,
            None => default_year,
        };
        let term = match get("GRADE_SEMESTRE") {
            Some(v) => {
                let t = parse_var::<u8>("GRADE_SEMESTRE", &v)?;
                if t != 1 && t != 2 {
                    return Err(ConfigError::Invalid {
                        var: "GRADE_SEMESTRE",
                        value: v,
                        reason: "must be 1 or 2".to_string(),
                    });
                }
                t
            }
            None => default_term,
        };
        let curriculum_id = get("GRADE_CURSO").ok_or(ConfigError::Missing("GRADE_CURSO"))?;

        let mut watched_terms = Vec::new();
        if let Some(list) = get("GRADE_TERMOS") {
            for part in list.split(',').map(str::trim).filter(|p| !p.is_empty()) {
                let t = TermKey::from_str(part).map_err(|reason| ConfigError::Invalid {
                    var: "GRADE_TERMOS",
                    value: part.to_string(),
                    reason,
                })?;
                if !watched_terms.contains(&t) {
                    watched_terms.push(t);
                }
            }
        }

        let mut context = ScheduleContext::new(TermKey::new(year, term), curriculum_id);
        context.watched_terms = watched_terms;
        Ok(Config { bind_addr, db_path, context })
    }
}

/// `GRADE_DB_PATH` gana sobre `GRADE_DB_URL`; la URL sólo puede ser
/// `sqlite://` o `file://`.
fn db_path(path: Option<String>, url: Option<String>) -> Result<PathBuf, ConfigError> {
    if let Some(p) = path {
        return Ok(PathBuf::from(p));
    }
    match url {
        Some(u) => {
            if let Some(rest) = u.strip_prefix("sqlite://") {
                Ok(PathBuf::from(rest))
            } else if let Some(rest) = u.strip_prefix("file://") {
                Ok(PathBuf::from(rest))
            } else {
                Err(ConfigError::UnsupportedScheme(u))
            }
        }
        None => Ok(PathBuf::from(DEFAULT_DB_PATH)),
    }
}

fn parse_var<T>(var: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value.parse::<T>().map_err(|e| ConfigError::Invalid { var, value: value.to_string(), reason: e.to_string() })
}

/// Semestre en curso según la fecha local (enero-junio = 1).
fn current_term() -> (i32, u8) {
    let today = chrono::Local::now().date_naive();
    let term = if today.month() <= 6 { 1 } else { 2 };
    (today.year(), term)
}

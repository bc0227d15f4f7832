use std::env;
use std::time::Duration;

use crate::error::BoardError;
use crate::models::Coordinate;
use crate::services::board_service::BoardSettings;
use crate::services::geo_service::{RadiusKm, DEFAULT_RADIUS_KM};
use crate::services::location_service::PositionOptions;

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub backend: BackendConfig,
    pub board: BoardSettings,
    /// Static ambient position, for kiosks and machines without a browser fix.
    pub fixed_position: Option<Coordinate>,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone)]
pub enum BackendConfig {
    Sqlite {
        database_url: String,
        max_connections: u32,
    },
    Rest {
        base_url: String,
        anon_key: String,
        table: String,
    },
}

impl Config {
    pub fn from_env() -> Result<Self, BoardError> {
        let server = ServerConfig {
            host: env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: parse_var("PORT", 3000)?,
        };

        let backend = match env::var("BOARD_BACKEND")
            .unwrap_or_else(|_| "sqlite".to_string())
            .to_lowercase()
            .as_str()
        {
            "sqlite" => BackendConfig::Sqlite {
                database_url: env::var("DATABASE_URL")
                    .unwrap_or_else(|_| "sqlite://needs.db?mode=rwc".to_string()),
                max_connections: parse_var("DATABASE_MAX_CONNECTIONS", 5)?,
            },
            "rest" => BackendConfig::Rest {
                base_url: required_var("SUPABASE_URL")?,
                anon_key: required_var("SUPABASE_ANON_KEY")?,
                table: env::var("POSTS_TABLE").unwrap_or_else(|_| "tasks".to_string()),
            },
            other => {
                return Err(BoardError::Config(format!(
                    "BOARD_BACKEND must be 'sqlite' or 'rest', got '{}'",
                    other
                )))
            }
        };

        let board = BoardSettings {
            refresh_interval: Duration::from_secs(parse_var("REFRESH_INTERVAL_SECS", 5u64)?.max(1)),
            ambient: PositionOptions::ambient(
                Duration::from_millis(parse_var("AMBIENT_TIMEOUT_MS", 15_000)?),
                Duration::from_millis(parse_var("AMBIENT_MAX_AGE_MS", 300_000)?),
            ),
            fresh: PositionOptions::fresh(Duration::from_millis(parse_var(
                "FRESH_TIMEOUT_MS",
                8_000,
            )?)),
            require_session: parse_var("REQUIRE_SESSION_TO_PUBLISH", true)?,
            default_radius: RadiusKm::try_from(parse_var("DEFAULT_RADIUS_KM", DEFAULT_RADIUS_KM)?)?,
            viewer_idle: Duration::from_secs(parse_var("VIEWER_IDLE_SECS", 86_400u64)?),
        };

        let fixed_position = match (optional_var::<f64>("FIXED_LAT")?, optional_var::<f64>("FIXED_LNG")?) {
            (Some(lat), Some(lng)) => Some(Coordinate::new(lat, lng)?),
            (None, None) => None,
            _ => {
                return Err(BoardError::Config(
                    "FIXED_LAT and FIXED_LNG must be set together".to_string(),
                ))
            }
        };

        Ok(Config {
            server,
            backend,
            board,
            fixed_position,
        })
    }
}

fn required_var(key: &str) -> Result<String, BoardError> {
    env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| BoardError::Config(format!("{} must be set", key)))
}

fn optional_var<T: std::str::FromStr>(key: &str) -> Result<Option<T>, BoardError> {
    match env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| BoardError::Config(format!("{} has an invalid value '{}'", key, raw))),
        _ => Ok(None),
    }
}

fn parse_var<T: std::str::FromStr>(key: &str, default: T) -> Result<T, BoardError> {
    Ok(optional_var(key)?.unwrap_or(default))
}

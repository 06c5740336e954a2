//! Configuration module - environment variable parsing

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

use crate::game::vec3::Vec3;

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Server binding address
    pub server_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Allowed client origins for CORS, `*` for any
    pub client_origin: String,

    /// Optional JSON weapon catalog replacing the built-in one
    pub weapon_catalog_path: Option<PathBuf>,
    /// Respawn locations; empty means the built-in set
    pub spawn_points: Vec<Vec3>,
    /// Seed for spawn selection and pellet spread
    pub arena_seed: Option<u64>,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // Hosting platforms provide PORT, fall back to SERVER_ADDR or default
        let server_addr = if let Ok(port) = env::var("PORT") {
            format!("0.0.0.0:{}", port)
        } else {
            env::var("SERVER_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string())
        };

        let spawn_points = match env::var("SPAWN_POINTS") {
            Ok(raw) => parse_spawn_points(&raw)?,
            Err(_) => Vec::new(),
        };

        let arena_seed = match env::var("ARENA_SEED") {
            Ok(raw) => Some(raw.trim().parse().map_err(|_| ConfigError::InvalidSeed)?),
            Err(_) => None,
        };

        Ok(Self {
            server_addr: server_addr
                .parse()
                .map_err(|_| ConfigError::InvalidAddress)?,

            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            client_origin: env::var("CLIENT_ORIGIN").unwrap_or_else(|_| "*".to_string()),

            weapon_catalog_path: env::var_os("WEAPON_CATALOG_PATH").map(PathBuf::from),
            spawn_points,
            arena_seed,
        })
    }
}

/// Parse `x,y,z;x,y,z;...` into spawn points. Blank entries are skipped.
pub fn parse_spawn_points(raw: &str) -> Result<Vec<Vec3>, ConfigError> {
    raw.split(';')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let coords: Vec<f32> = entry
                .split(',')
                .map(|c| c.trim().parse::<f32>())
                .collect::<Result<_, _>>()
                .map_err(|_| ConfigError::InvalidSpawnPoints(entry.to_string()))?;

            match coords[..] {
                [x, y, z] if x.is_finite() && y.is_finite() && z.is_finite() => {
                    Ok(Vec3::new(x, y, z))
                }
                _ => Err(ConfigError::InvalidSpawnPoints(entry.to_string())),
            }
        })
        .collect()
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid server address format")]
    InvalidAddress,

    #[error("Invalid spawn point entry: {0:?} (expected x,y,z)")]
    InvalidSpawnPoints(String),

    #[error("ARENA_SEED must be an unsigned integer")]
    InvalidSeed,
}

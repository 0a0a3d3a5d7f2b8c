//! Configuration module for the gift registry backend.
//!
//! All configuration is loaded from environment variables with sensible defaults.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8080";

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Pre-shared key protecting the admin routes (required in production)
    pub api_psk: Option<String>,
    /// Path to the SQLite file backing the registry store
    pub db_path: PathBuf,
    /// Address to bind the server to
    pub bind_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Emit logs as JSON lines instead of human-readable text
    pub log_json: bool,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let api_psk = env::var("REGISTRY_API_PSK")
            .ok()
            .filter(|psk| !psk.trim().is_empty());

        let db_path = env::var("REGISTRY_DB_PATH")
            .unwrap_or_else(|_| "./data/registry.sqlite".to_string())
            .into();

        let bind_addr = match env::var("REGISTRY_BIND_ADDR") {
            Ok(raw) => raw.parse().unwrap_or_else(|_| {
                eprintln!("Invalid REGISTRY_BIND_ADDR {raw:?}, using {DEFAULT_BIND_ADDR}");
                default_bind_addr()
            }),
            Err(_) => default_bind_addr(),
        };

        let log_level = env::var("REGISTRY_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let log_json = env::var("REGISTRY_LOG_FORMAT")
            .map(|format| format.eq_ignore_ascii_case("json"))
            .unwrap_or(false);

        Self {
            api_psk,
            db_path,
            bind_addr,
            log_level,
            log_json,
        }
    }
}

fn default_bind_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8080))
}

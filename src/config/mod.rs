//! Configuration module for the records service.
//!
//! All configuration is loaded from environment variables with sensible defaults.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8080";
const DEFAULT_SOURCE_BASE: &str = "https://example.github.io/records/data/";

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to SQLite database file
    pub db_path: PathBuf,
    /// Address to bind the server to
    pub bind_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// CSV locator for the roster collection
    pub roster_url: String,
    /// CSV locator for the attendance collection
    pub attendance_url: String,
    /// Start with connectivity reported as offline
    pub offline: bool,
    /// Run a background sync of both collections at startup
    pub sync_on_start: bool,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let db_path = env::var("RECORDS_DB_PATH")
            .unwrap_or_else(|_| "./data/records.sqlite".to_string())
            .into();

        let bind_addr = parse_bind_addr(env::var("RECORDS_BIND_ADDR").ok());

        let log_level = env::var("RECORDS_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let base = env::var("RECORDS_SOURCE_BASE").unwrap_or_else(|_| DEFAULT_SOURCE_BASE.to_string());
        let roster_url =
            env::var("RECORDS_ROSTER_URL").unwrap_or_else(|_| format!("{}employees.csv", base));
        let attendance_url = env::var("RECORDS_ATTENDANCE_URL")
            .unwrap_or_else(|_| format!("{}attendance.csv", base));

        let offline = env::var("RECORDS_OFFLINE")
            .map(|v| parse_flag(&v))
            .unwrap_or(false);
        let sync_on_start = env::var("RECORDS_SYNC_ON_START")
            .map(|v| parse_flag(&v))
            .unwrap_or(true);

        Self {
            db_path,
            bind_addr,
            log_level,
            roster_url,
            attendance_url,
            offline,
            sync_on_start,
        }
    }
}

fn parse_bind_addr(raw: Option<String>) -> SocketAddr {
    let default: SocketAddr = ([127, 0, 0, 1], 8080).into();
    match raw {
        Some(value) => value.parse().unwrap_or_else(|_| {
            tracing::warn!(
                "Invalid RECORDS_BIND_ADDR {:?}, using {}",
                value,
                DEFAULT_BIND_ADDR
            );
            default
        }),
        None => default,
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

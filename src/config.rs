// src/config.rs

use std::env;

use dotenvy::dotenv;

/// Minimum number of options for SingleSelect / MultiSelect questions.
pub const MIN_CHOICE_OPTIONS: usize = 2;

/// Option bounds for Conditional questions.
pub const CONDITIONAL_MIN_OPTIONS: usize = 2;
pub const CONDITIONAL_MAX_OPTIONS: usize = 5;

/// Row bounds for Matrix questions.
pub const MATRIX_MIN_ROWS: usize = 2;
pub const MATRIX_MAX_ROWS: usize = 20;

/// Matrix questions are always scored on a fixed 1..=5 scale.
pub const MATRIX_SCALE_POINTS: u8 = 5;

/// Rows scored strictly below this value need an explanation when the
/// question asks for one.
pub const MATRIX_EXPLANATION_THRESHOLD: u8 = 3;

/// Upper bound for uploaded attachments (decoded bytes).
pub const DEFAULT_MAX_ATTACHMENT_BYTES: usize = 5 * 1024 * 1024;

pub const DEFAULT_PAGE_SIZE: usize = 20;
pub const MAX_PAGE_SIZE: usize = 100;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{name} has an invalid value: {value}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Postgres connection string. Without it the service keeps everything in memory.
    pub database_url: Option<String>,
    pub jwt_secret: String,
    pub jwt_expiration: u64,
    pub rust_log: String,
    pub port: u16,
    pub cors_origins: Vec<String>,
    pub max_attachment_bytes: usize,
    /// Base URL of the participant frontend, used to build invitation links.
    pub public_base_url: Option<String>,
    pub log_dir: String,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv().ok();

        let database_url = env::var("DATABASE_URL").ok().filter(|url| !url.is_empty());

        let jwt_secret = env::var("JWT_SECRET").map_err(|_| ConfigError::Missing("JWT_SECRET"))?;

        let jwt_expiration = parse_or("JWT_EXPIRATION", 3600)?;
        let port = parse_or("PORT", 3000)?;
        let max_attachment_bytes = parse_or("MAX_ATTACHMENT_BYTES", DEFAULT_MAX_ATTACHMENT_BYTES)?;

        let rust_log = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        let cors_origins = env::var("CORS_ORIGINS")
            .map(|value| {
                value
                    .split(',')
                    .map(str::trim)
                    .filter(|origin| !origin.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_else(|_| {
                vec![
                    "http://localhost:3000".to_string(),
                    "http://127.0.0.1:3000".to_string(),
                ]
            });

        let public_base_url = env::var("PUBLIC_BASE_URL").ok().filter(|url| !url.is_empty());
        let log_dir = env::var("LOG_DIR").unwrap_or_else(|_| "logs".to_string());

        Ok(Self {
            database_url,
            jwt_secret,
            jwt_expiration,
            rust_log,
            port,
            cors_origins,
            max_attachment_bytes,
            public_base_url,
            log_dir,
        })
    }

    /// Request body ceiling: a base64 attachment at the size limit plus JSON overhead.
    pub fn max_body_bytes(&self) -> usize {
        self.max_attachment_bytes / 3 * 4 + 1024 * 1024
    }
}

fn parse_or<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
        Err(_) => Ok(default),
    }
}

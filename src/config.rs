// src/config.rs

use std::{env, net::SocketAddr, path::PathBuf};

use dotenvy::dotenv;

/// Number of published posts shown on the home page.
pub const HOME_PAGE_SIZE: i64 = 50;

/// Upper bound for uploaded profile pictures.
pub const MAX_PROFILE_PIC_BYTES: usize = 5 * 1024 * 1024;

const DEFAULT_SESSION_TTL_SECONDS: u64 = 7 * 24 * 60 * 60;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    /// Key used to sign session tokens.
    pub session_secret: String,
    pub session_ttl_seconds: u64,
    /// Sets the `Secure` attribute on the session cookie (enable behind HTTPS).
    pub cookie_secure: bool,
    /// Directory that uploaded files are written to and served from under `/media`.
    pub media_root: PathBuf,
    pub bind_addr: SocketAddr,
    pub rust_log: String,
    pub admin_email: Option<String>,
    pub admin_password: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        dotenv().ok();

        let database_url = required("DATABASE_URL")?;
        let session_secret = required("SESSION_SECRET")?;

        let session_ttl_seconds = match env::var("SESSION_TTL_SECONDS") {
            Ok(raw) => raw
                .parse()
                .map_err(|_| format!("SESSION_TTL_SECONDS must be a number, got '{raw}'"))?,
            Err(_) => DEFAULT_SESSION_TTL_SECONDS,
        };

        let cookie_secure = env::var("COOKIE_SECURE")
            .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);

        let media_root = env::var("MEDIA_ROOT")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("media"));

        let bind_addr = match env::var("BIND_ADDR") {
            Ok(raw) => raw
                .parse()
                .map_err(|_| format!("BIND_ADDR must be host:port, got '{raw}'"))?,
            Err(_) => SocketAddr::from(([0, 0, 0, 0], 3000)),
        };

        let rust_log = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            database_url,
            session_secret,
            session_ttl_seconds,
            cookie_secure,
            media_root,
            bind_addr,
            rust_log,
            admin_email: optional("ADMIN_EMAIL"),
            admin_password: optional("ADMIN_PASSWORD"),
        })
    }
}

fn required(key: &str) -> Result<String, String> {
    env::var(key).map_err(|_| format!("{key} must be set"))
}

fn optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

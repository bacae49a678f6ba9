/// Server configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Port to listen on
    pub port: u16,
    /// Domain used for the session cookie
    pub cookie_domain: String,
    /// Origin allowed by CORS
    pub cors_origin: String,
    /// SQLite database path; in-memory storage when unset
    pub database_path: Option<String>,
}

impl Config {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            port: std::env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            cookie_domain: env_or("COOKIE_DOMAIN", &defaults.cookie_domain),
            cors_origin: env_or("CORS_ORIGIN", &defaults.cors_origin),
            database_path: std::env::var("DATABASE_PATH").ok(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 4000,
            cookie_domain: "localhost".to_string(),
            cors_origin: "http://localhost:3000".to_string(),
            database_path: None,
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Read the token secret from JWT_SECRET, or generate an ephemeral one.
///
/// A generated secret means sessions do not survive a restart, so a warning
/// is logged.
pub fn load_or_generate_secret() -> String {
    match std::env::var("JWT_SECRET") {
        Ok(secret) if !secret.is_empty() => secret,
        _ => {
            tracing::warn!(
                "JWT_SECRET not set; using an ephemeral secret, sessions will not survive restart"
            );
            uuid::Uuid::new_v4().to_string()
        }
    }
}

//! Application configuration

use std::env;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    // Server
    pub bind_address: String,
    pub cors_allowed_origins: Vec<String>,

    // Database
    pub database_url: String,
    pub database_max_connections: u32,

    // Redis (revocation store). Credentials go in the URL.
    pub redis_url: String,
    pub revocation_fail_open: bool,

    // Tokens
    pub jwt_secret: String,
    pub refresh_mask_key: String,
    pub access_token_ttl_minutes: i64,
    pub refresh_token_ttl_days: i64,

    // Refresh cookie
    pub refresh_cookie_name: String,
    pub cookie_domain: Option<String>,
    pub cookie_secure: bool,

    // Chat
    pub ws_mailbox_capacity: usize,
    pub ws_max_frame_bytes: usize,
}

fn parse_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            // Server
            bind_address: env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:8080".to_string()),
            cors_allowed_origins: env::var("CORS_ALLOWED_ORIGINS")
                .unwrap_or_else(|_| "http://localhost:3000".to_string())
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),

            // Database
            database_url: env::var("DATABASE_URL")
                .map_err(|_| ConfigError::Missing("DATABASE_URL"))?,
            database_max_connections: parse_or("DATABASE_MAX_CONNECTIONS", 10),

            // Redis
            redis_url: env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://localhost:6379".to_string()),
            revocation_fail_open: parse_or("REVOCATION_FAIL_OPEN", false),

            // Tokens
            jwt_secret: {
                let secret =
                    env::var("JWT_SECRET").map_err(|_| ConfigError::Missing("JWT_SECRET"))?;
                if secret.len() < 32 {
                    return Err(ConfigError::WeakSecret(
                        "JWT_SECRET must be at least 32 characters",
                    ));
                }
                secret
            },
            refresh_mask_key: env::var("REFRESH_MASK_KEY")
                .ok()
                .filter(|k| !k.is_empty())
                .ok_or(ConfigError::Missing("REFRESH_MASK_KEY"))?,
            access_token_ttl_minutes: parse_or("ACCESS_TOKEN_TTL_MINUTES", 60),
            refresh_token_ttl_days: parse_or("REFRESH_TOKEN_TTL_DAYS", 7),

            // Refresh cookie
            refresh_cookie_name: env::var("REFRESH_COOKIE_NAME")
                .unwrap_or_else(|_| "token".to_string()),
            cookie_domain: env::var("COOKIE_DOMAIN").ok().filter(|d| !d.is_empty()),
            cookie_secure: parse_or("COOKIE_SECURE", true),

            // Chat
            ws_mailbox_capacity: parse_or("WS_MAILBOX_CAPACITY", 256),
            ws_max_frame_bytes: parse_or("WS_MAX_FRAME_BYTES", 512),
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),
    #[error("Weak secret: {0}")]
    WeakSecret(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const VARS: &[&str] = &[
        "DATABASE_URL",
        "JWT_SECRET",
        "REFRESH_MASK_KEY",
        "ACCESS_TOKEN_TTL_MINUTES",
        "COOKIE_SECURE",
        "CORS_ALLOWED_ORIGINS",
    ];

    fn setup_minimal_config() {
        env::set_var("DATABASE_URL", "postgres://test");
        env::set_var(
            "JWT_SECRET",
            "test-jwt-secret-must-be-at-least-32-characters-long",
        );
        env::set_var("REFRESH_MASK_KEY", "mask");
    }

    fn cleanup_config() {
        for var in VARS {
            env::remove_var(var);
        }
    }

    #[test]
    #[serial]
    fn test_defaults() {
        setup_minimal_config();
        let config = Config::from_env().unwrap();
        assert_eq!(config.access_token_ttl_minutes, 60);
        assert_eq!(config.refresh_token_ttl_days, 7);
        assert_eq!(config.refresh_cookie_name, "token");
        assert!(config.cookie_secure);
        assert!(!config.revocation_fail_open);
        assert_eq!(config.cors_allowed_origins, vec!["http://localhost:3000"]);
        cleanup_config();
    }

    #[test]
    #[serial]
    fn test_overrides() {
        setup_minimal_config();
        env::set_var("ACCESS_TOKEN_TTL_MINUTES", "15");
        env::set_var("COOKIE_SECURE", "false");
        env::set_var("CORS_ALLOWED_ORIGINS", "https://a.example, https://b.example");
        let config = Config::from_env().unwrap();
        assert_eq!(config.access_token_ttl_minutes, 15);
        assert!(!config.cookie_secure);
        assert_eq!(config.cors_allowed_origins.len(), 2);
        cleanup_config();
    }

    #[test]
    #[serial]
    fn test_secret_validation() {
        setup_minimal_config();
        env::set_var("JWT_SECRET", "short");
        assert!(matches!(Config::from_env(), Err(ConfigError::WeakSecret(_))));

        env::remove_var("JWT_SECRET");
        assert!(matches!(
            Config::from_env(),
            Err(ConfigError::Missing("JWT_SECRET"))
        ));

        setup_minimal_config();
        env::set_var("REFRESH_MASK_KEY", "");
        assert!(matches!(
            Config::from_env(),
            Err(ConfigError::Missing("REFRESH_MASK_KEY"))
        ));
        cleanup_config();
    }
}

use figment::{
    Figment,
    providers::{Env, Format, Toml},
};
use serde::{Deserialize, Serialize};

pub const DEFAULT_API_BASE_PATH: &str = "/api";

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub cors: CorsConfig,
    pub api: ApiConfig,
    pub ban: BanConfig,
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connection_timeout: u64,
    pub acquire_timeout: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub address: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub json_format: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
    pub allow_credentials: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ApiConfig {
    pub base_path: String,
    pub enable_swagger: bool,
}

/// Failed-attempt ban policy.
///
/// `exempt_path_prefixes` are matched by exact prefix before any
/// fingerprinting happens, so hot static paths never pay the hashing cost.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct BanConfig {
    pub max_failed_attempts: i32,
    pub ban_duration_minutes: i64,
    pub exempt_path_prefixes: Vec<String>,
}

/// Sliding-window admission control for the online-users endpoint.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RateLimitConfig {
    pub window_seconds: u64,
    pub max_requests: usize,
    pub prune_threshold: usize,
    pub online_cache_seconds: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "postgres://localhost/gatekeeper_db".to_string(),
            max_connections: 16,
            min_connections: 4,
            connection_timeout: 5,
            acquire_timeout: 5,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8000,
            address: "127.0.0.1".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
        }
    }
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec!["*".to_string()],
            allow_credentials: false,
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_path: DEFAULT_API_BASE_PATH.to_string(),
            enable_swagger: true,
        }
    }
}

impl Default for BanConfig {
    fn default() -> Self {
        Self {
            max_failed_attempts: 5,
            ban_duration_minutes: 15,
            exempt_path_prefixes: vec![
                "/banned".to_string(),
                "/api/health".to_string(),
                "/api/auth/callback".to_string(),
                "/assets".to_string(),
            ],
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window_seconds: 60,
            max_requests: 60,
            prune_threshold: 1024,
            online_cache_seconds: 5,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            server: ServerConfig::default(),
            logging: LoggingConfig::default(),
            cors: CorsConfig::default(),
            api: ApiConfig::default(),
            ban: BanConfig::default(),
            rate_limit: RateLimitConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from multiple sources in priority order:
    /// 1. Gatekeeper.toml (base configuration file)
    /// 2. Environment variables (prefixed with GATEKEEPER_)
    /// 3. DATABASE_URL environment variable (for backwards compatibility)
    pub fn load() -> Result<Self, figment::Error> {
        let figment = Figment::new()
            // Start with defaults
            .merge(Toml::string(&toml::to_string(&Config::default()).unwrap()).nested())
            // Layer on Gatekeeper.toml if it exists
            .merge(Toml::file("Gatekeeper.toml").nested())
            // Layer on environment variables (e.g., GATEKEEPER_DATABASE_URL)
            .merge(Env::prefixed("GATEKEEPER_").split("_"))
            // Special case: DATABASE_URL for backwards compatibility
            .merge(Env::raw().only(&["DATABASE_URL"]).map(|_| "database.url".into()));

        figment.extract()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_ban_policy_matches_documented_constants() {
        let config = BanConfig::default();
        assert_eq!(config.max_failed_attempts, 5);
        assert_eq!(config.ban_duration_minutes, 15);
        assert!(config.exempt_path_prefixes.iter().any(|p| p == "/banned"));
    }

    #[test]
    fn default_rate_limit_is_sixty_per_minute() {
        let config = RateLimitConfig::default();
        assert_eq!(config.window_seconds, 60);
        assert_eq!(config.max_requests, 60);
    }

    #[test]
    fn defaults_round_trip_through_toml() {
        let rendered = toml::to_string(&Config::default()).expect("serializable defaults");
        let parsed: Config = toml::from_str(&rendered).expect("parseable defaults");
        assert_eq!(parsed.api.base_path, DEFAULT_API_BASE_PATH);
        assert_eq!(parsed.server.port, 8000);
    }
}

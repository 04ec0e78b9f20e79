/// Configuration management for the API server
///
/// Loaded from environment variables (a `.env` file is read first when
/// present).
///
/// # Environment Variables
///
/// - `API_HOST` / `API_PORT`: bind address (default `0.0.0.0:8080`)
/// - `API_CORS_ORIGINS`: comma-separated origins, `*` for any (default `*`)
/// - `API_PRODUCTION`: marks cookies `Secure` (default `false`)
/// - `STORE_BACKEND`: `postgres` or `memory` (default `postgres`)
/// - `DATABASE_URL`: required for the `postgres` backend
/// - `DATABASE_MAX_CONNECTIONS`: pool size (default 10)
/// - `STORE_CALL_TIMEOUT_MS`: per-call store timeout (default 5000)
/// - `JWT_SECRET`: signing key, at least 32 characters (required)
/// - `JWT_ACCESS_TTL_HOURS` / `JWT_REFRESH_TTL_DAYS`: token lifetimes (168 / 30)
/// - `PASSWORD_MEMORY_KIB` / `PASSWORD_ITERATIONS` / `PASSWORD_PARALLELISM`:
///   Argon2id cost (65536 / 3 / 4)
/// - `AUTH_EXPOSE_ONE_TIME_TOKENS`: return reset and verification tokens in
///   responses, for development without email delivery (default `false`)
/// - `UPLOAD_DIR`, `UPLOAD_MAX_BYTES`, `UPLOAD_PUBLIC_PATH`: banner storage
///   (`./uploads`, 5 MiB, `/uploads`)
///
/// # Example
///
/// ```no_run
/// use goaltrack_api::config::Config;
///
/// # fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// println!("Server will listen on {}", config.bind_address());
/// # Ok(())
/// # }
/// ```

use std::env;
use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use goaltrack_shared::auth::password::PasswordParams;
use serde::{Deserialize, Serialize};

/// Smallest accepted `JWT_SECRET`
pub const MIN_JWT_SECRET_LENGTH: usize = 32;

/// Complete application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub api: ApiConfig,
    pub store: StoreConfig,
    pub jwt: JwtConfig,
    pub auth: AuthConfig,
    pub uploads: UploadConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,

    /// Allowed CORS origins; `["*"]` allows any origin without credentials
    pub cors_origins: Vec<String>,

    /// Production mode sets the `Secure` flag on session cookies
    pub production: bool,
}

/// Which keyspace backend to run against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Postgres,
    /// Non-persistent, for local development and tests
    Memory,
}

impl FromStr for StoreBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(StoreBackend::Postgres),
            "memory" => Ok(StoreBackend::Memory),
            other => anyhow::bail!("Unknown STORE_BACKEND '{}', expected postgres or memory", other),
        }
    }
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    pub backend: StoreBackend,

    /// PostgreSQL connection URL, required for the postgres backend
    pub database_url: Option<String>,

    pub max_connections: u32,

    /// Upper bound for a single keyspace call
    pub call_timeout_ms: u64,
}

impl StoreConfig {
    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }
}

/// JWT configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtConfig {
    /// HS256 signing key
    ///
    /// Generate with: `openssl rand -hex 32`
    pub secret: String,
    pub access_ttl_hours: i64,
    pub refresh_ttl_days: i64,
}

impl JwtConfig {
    pub fn access_ttl(&self) -> chrono::Duration {
        chrono::Duration::hours(self.access_ttl_hours)
    }

    pub fn refresh_ttl(&self) -> chrono::Duration {
        chrono::Duration::days(self.refresh_ttl_days)
    }
}

/// Credential and account-flow configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub password: PasswordParams,

    /// Include one-time tokens in API responses
    pub expose_one_time_tokens: bool,
}

/// Banner upload configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    /// Directory banners are written to
    pub dir: PathBuf,
    pub max_bytes: usize,
    /// URL prefix the directory is served under
    pub public_path: String,
}

fn env_or<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    match env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("Invalid value for {}: {}", key, e)),
        _ => Ok(default),
    }
}

impl Config {
    /// Loads configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if `JWT_SECRET` is missing or too short, if the
    /// postgres backend is selected without `DATABASE_URL`, or if any variable
    /// fails to parse.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let cors_origins = env::var("API_CORS_ORIGINS")
            .unwrap_or_else(|_| "*".to_string())
            .split(',')
            .map(|origin| origin.trim().to_string())
            .filter(|origin| !origin.is_empty())
            .collect();

        let backend = env_or("STORE_BACKEND", StoreBackend::Postgres)?;
        let database_url = env::var("DATABASE_URL").ok().filter(|url| !url.is_empty());
        if backend == StoreBackend::Postgres && database_url.is_none() {
            anyhow::bail!("DATABASE_URL environment variable is required for the postgres backend");
        }

        let jwt_secret = env::var("JWT_SECRET")
            .map_err(|_| anyhow::anyhow!("JWT_SECRET environment variable is required"))?;

        if jwt_secret.len() < MIN_JWT_SECRET_LENGTH {
            anyhow::bail!(
                "JWT_SECRET must be at least {} characters long",
                MIN_JWT_SECRET_LENGTH
            );
        }

        let defaults = PasswordParams::default();

        Ok(Self {
            api: ApiConfig {
                host: env::var("API_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: env_or("API_PORT", 8080)?,
                cors_origins,
                production: env_or("API_PRODUCTION", false)?,
            },
            store: StoreConfig {
                backend,
                database_url,
                max_connections: env_or("DATABASE_MAX_CONNECTIONS", 10)?,
                call_timeout_ms: env_or("STORE_CALL_TIMEOUT_MS", 5000)?,
            },
            jwt: JwtConfig {
                secret: jwt_secret,
                access_ttl_hours: env_or("JWT_ACCESS_TTL_HOURS", 24 * 7)?,
                refresh_ttl_days: env_or("JWT_REFRESH_TTL_DAYS", 30)?,
            },
            auth: AuthConfig {
                password: PasswordParams {
                    memory_kib: env_or("PASSWORD_MEMORY_KIB", defaults.memory_kib)?,
                    iterations: env_or("PASSWORD_ITERATIONS", defaults.iterations)?,
                    parallelism: env_or("PASSWORD_PARALLELISM", defaults.parallelism)?,
                },
                expose_one_time_tokens: env_or("AUTH_EXPOSE_ONE_TIME_TOKENS", false)?,
            },
            uploads: UploadConfig {
                dir: env_or("UPLOAD_DIR", PathBuf::from("./uploads"))?,
                max_bytes: env_or("UPLOAD_MAX_BYTES", 5 * 1024 * 1024)?,
                public_path: upload_public_path(
                    &env::var("UPLOAD_PUBLIC_PATH").unwrap_or_else(|_| "/uploads".to_string()),
                )?,
            },
        })
    }

    /// Returns the server bind address
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.api.host, self.api.port)
    }
}

/// Normalizes the URL prefix banners are served under
///
/// The prefix is mounted next to `/api`, so it needs at least one segment of
/// its own and no route parameters.
fn upload_public_path(raw: &str) -> anyhow::Result<String> {
    let path = raw.trim().trim_end_matches('/');

    if !path.starts_with('/') {
        anyhow::bail!("UPLOAD_PUBLIC_PATH must start with '/', got '{}'", raw);
    }
    if path.contains([':', '*']) {
        anyhow::bail!("UPLOAD_PUBLIC_PATH must not contain ':' or '*', got '{}'", raw);
    }
    if path == "/api" || path.starts_with("/api/") {
        anyhow::bail!("UPLOAD_PUBLIC_PATH must not be under /api, got '{}'", raw);
    }

    Ok(path.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> Config {
        Config {
            api: ApiConfig {
                host: "127.0.0.1".to_string(),
                port: 8080,
                cors_origins: vec!["*".to_string()],
                production: false,
            },
            store: StoreConfig {
                backend: StoreBackend::Memory,
                database_url: None,
                max_connections: 10,
                call_timeout_ms: 250,
            },
            jwt: JwtConfig {
                secret: "test-secret-key-at-least-32-characters-long".to_string(),
                access_ttl_hours: 168,
                refresh_ttl_days: 30,
            },
            auth: AuthConfig {
                password: PasswordParams::default(),
                expose_one_time_tokens: false,
            },
            uploads: UploadConfig {
                dir: PathBuf::from("./uploads"),
                max_bytes: 5 * 1024 * 1024,
                public_path: "/uploads".to_string(),
            },
        }
    }

    #[test]
    fn test_bind_address() {
        assert_eq!(config().bind_address(), "127.0.0.1:8080");
    }

    #[test]
    fn test_durations() {
        let config = config();
        assert_eq!(config.jwt.access_ttl(), chrono::Duration::days(7));
        assert_eq!(config.jwt.refresh_ttl(), chrono::Duration::days(30));
        assert_eq!(config.store.call_timeout(), Duration::from_millis(250));
    }

    #[test]
    fn test_store_backend_parsing() {
        assert_eq!("memory".parse::<StoreBackend>().unwrap(), StoreBackend::Memory);
        assert_eq!("Postgres".parse::<StoreBackend>().unwrap(), StoreBackend::Postgres);
        assert!("cassandra".parse::<StoreBackend>().is_err());
    }

    #[test]
    fn test_upload_public_path() {
        assert_eq!(upload_public_path("/uploads").unwrap(), "/uploads");
        assert_eq!(upload_public_path(" /static/banners/ ").unwrap(), "/static/banners");

        for bad in ["", "/", "//", "uploads", "/api", "/api/files", "/files/:id", "/*rest"] {
            assert!(upload_public_path(bad).is_err(), "{:?} accepted", bad);
        }
    }
}

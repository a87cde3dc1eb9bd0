//! Configuration management

use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sqlx::postgres::{PgConnectOptions, PgSslMode};

// ============================================================================
// Server Configuration Constants
// ============================================================================

/// Default server host binding.
pub const DEFAULT_SERVER_HOST: &str = "127.0.0.1";

/// Default server port.
pub const DEFAULT_SERVER_PORT: u16 = 8080;

/// Default shutdown timeout in seconds.
pub const DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64 = 30;

// ============================================================================
// Database Configuration Constants
// ============================================================================

/// Default database URL for local development.
pub const DEFAULT_DATABASE_URL: &str = "postgresql://localhost/prices";

/// Default database port when connecting from `DB_*` variables.
pub const DEFAULT_DB_PORT: u16 = 5432;

/// Default maximum database connections in the pool.
pub const DEFAULT_DATABASE_MAX_CONNECTIONS: u32 = 10;

/// Default minimum database connections in the pool.
pub const DEFAULT_DATABASE_MIN_CONNECTIONS: u32 = 2;

/// Default database connection timeout in seconds.
pub const DEFAULT_DATABASE_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Default database idle timeout in seconds (10 minutes).
pub const DEFAULT_DATABASE_IDLE_TIMEOUT_SECS: u64 = 600;

// ============================================================================
// Ingest / Export Constants
// ============================================================================

/// Default cap on an uploaded request body (10 MiB).
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Default export archive name, without the `.zip` extension.
pub const DEFAULT_EXPORT_ARCHIVE_NAME: &str = "response";

/// Default name of the CSV entry inside the export archive.
pub const DEFAULT_EXPORT_ENTRY_NAME: &str = "data.csv";

/// Default CORS allowed origin for local development.
pub const DEFAULT_CORS_ALLOWED_ORIGIN: &str = "http://localhost:3000";

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub catalog: CatalogBackend,
    pub ingest: IngestConfig,
    pub export: ExportConfig,
    pub cors: CorsConfig,
}

/// Server-specific configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub shutdown_timeout_secs: u64,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    /// Discrete connection settings; used instead of `url` when present
    pub parts: Option<DatabaseParts>,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout_secs: u64,
    pub idle_timeout_secs: u64,
    pub run_migrations: bool,
}

/// Connection settings read from `DB_HOST`, `DB_PORT`, `DB_USER`,
/// `DB_PASSWD` and `DB_NAME`
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseParts {
    pub host: String,
    pub port: u16,
    pub user: Option<String>,
    #[serde(skip_serializing)]
    pub password: Option<String>,
    pub name: String,
}

impl std::fmt::Debug for DatabaseParts {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseParts")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("name", &self.name)
            .finish()
    }
}

impl DatabaseConfig {
    /// Connection options for the pool. Discrete parts are passed through
    /// as-is, so credentials never need URL escaping.
    pub fn connect_options(&self) -> Result<PgConnectOptions, sqlx::Error> {
        let Some(parts) = &self.parts else {
            return self.url.parse();
        };

        let mut options = PgConnectOptions::new()
            .host(&parts.host)
            .port(parts.port)
            .database(&parts.name)
            .ssl_mode(PgSslMode::Disable);
        if let Some(user) = &parts.user {
            options = options.username(user);
        }
        if let Some(password) = &parts.password {
            options = options.password(password);
        }
        Ok(options)
    }
}

/// Which catalog implementation backs the API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CatalogBackend {
    #[default]
    Postgres,
    Memory,
}

impl FromStr for CatalogBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(CatalogBackend::Postgres),
            "memory" => Ok(CatalogBackend::Memory),
            _ => anyhow::bail!("Invalid catalog backend: {}. Use postgres or memory", s),
        }
    }
}

/// Upload handling
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    pub max_upload_bytes: usize,
    /// Parent directory for per-request extraction directories
    pub scratch_dir: PathBuf,
}

/// Export archive naming
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    pub archive_name: String,
    pub entry_name: String,
}

/// CORS configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
    pub allow_credentials: bool,
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

fn env_string(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// `DB_*` settings, unless `DATABASE_URL` is set or `DB_HOST` is not.
fn database_parts_from_env() -> Option<DatabaseParts> {
    if std::env::var("DATABASE_URL").is_ok() {
        return None;
    }

    let host = std::env::var("DB_HOST").ok()?;
    Some(DatabaseParts {
        host,
        port: env_or("DB_PORT", DEFAULT_DB_PORT),
        user: std::env::var("DB_USER").ok(),
        password: std::env::var("DB_PASSWD").ok(),
        name: env_string("DB_NAME", "prices"),
    })
}

impl Config {
    /// Load configuration from `.env`, the environment and defaults
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_env()
    }

    /// Load configuration from the process environment only
    pub fn from_env() -> anyhow::Result<Self> {
        let catalog = match std::env::var("CATALOG_BACKEND") {
            Ok(value) => value.parse()?,
            Err(_) => CatalogBackend::default(),
        };

        let config = Config {
            server: ServerConfig {
                host: env_string("PRICES_HOST", DEFAULT_SERVER_HOST),
                port: env_or("PRICES_PORT", DEFAULT_SERVER_PORT),
                shutdown_timeout_secs: env_or(
                    "PRICES_SHUTDOWN_TIMEOUT",
                    DEFAULT_SHUTDOWN_TIMEOUT_SECS,
                ),
            },
            database: DatabaseConfig {
                url: env_string("DATABASE_URL", DEFAULT_DATABASE_URL),
                parts: database_parts_from_env(),
                max_connections: env_or(
                    "DATABASE_MAX_CONNECTIONS",
                    DEFAULT_DATABASE_MAX_CONNECTIONS,
                ),
                min_connections: env_or(
                    "DATABASE_MIN_CONNECTIONS",
                    DEFAULT_DATABASE_MIN_CONNECTIONS,
                ),
                connect_timeout_secs: env_or(
                    "DATABASE_CONNECT_TIMEOUT",
                    DEFAULT_DATABASE_CONNECT_TIMEOUT_SECS,
                ),
                idle_timeout_secs: env_or(
                    "DATABASE_IDLE_TIMEOUT",
                    DEFAULT_DATABASE_IDLE_TIMEOUT_SECS,
                ),
                run_migrations: env_or("DATABASE_RUN_MIGRATIONS", true),
            },
            catalog,
            ingest: IngestConfig {
                max_upload_bytes: env_or("INGEST_MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES),
                scratch_dir: std::env::var("INGEST_SCRATCH_DIR")
                    .map(PathBuf::from)
                    .unwrap_or_else(|_| std::env::temp_dir()),
            },
            export: ExportConfig {
                archive_name: env_string("EXPORT_ARCHIVE_NAME", DEFAULT_EXPORT_ARCHIVE_NAME),
                entry_name: env_string("EXPORT_ENTRY_NAME", DEFAULT_EXPORT_ENTRY_NAME),
            },
            cors: CorsConfig {
                allowed_origins: env_string("CORS_ALLOWED_ORIGINS", DEFAULT_CORS_ALLOWED_ORIGIN)
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect(),
                allow_credentials: env_or("CORS_ALLOW_CREDENTIALS", true),
            },
        };

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.server.port == 0 {
            anyhow::bail!("Server port must be greater than 0");
        }

        if self.catalog == CatalogBackend::Postgres {
            if self.database.parts.is_none() && self.database.url.is_empty() {
                anyhow::bail!("Database URL cannot be empty");
            }

            if self.database.max_connections == 0 {
                anyhow::bail!("Database max_connections must be greater than 0");
            }

            if self.database.min_connections > self.database.max_connections {
                anyhow::bail!(
                    "Database min_connections ({}) cannot be greater than max_connections ({})",
                    self.database.min_connections,
                    self.database.max_connections
                );
            }
        }

        if self.ingest.max_upload_bytes == 0 {
            anyhow::bail!("Ingest max_upload_bytes must be greater than 0");
        }

        if self.export.archive_name.trim().is_empty() {
            anyhow::bail!("Export archive name cannot be empty");
        }

        let entry = &self.export.entry_name;
        if entry.trim().is_empty() || entry.contains('/') || entry.contains('\\') {
            anyhow::bail!("Export entry name must be a bare file name, got '{}'", entry);
        }

        if self.cors.allowed_origins.is_empty() {
            tracing::warn!("No CORS origins configured - all origins will be allowed");
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: DEFAULT_SERVER_HOST.to_string(),
                port: DEFAULT_SERVER_PORT,
                shutdown_timeout_secs: DEFAULT_SHUTDOWN_TIMEOUT_SECS,
            },
            database: DatabaseConfig {
                url: DEFAULT_DATABASE_URL.to_string(),
                parts: None,
                max_connections: DEFAULT_DATABASE_MAX_CONNECTIONS,
                min_connections: DEFAULT_DATABASE_MIN_CONNECTIONS,
                connect_timeout_secs: DEFAULT_DATABASE_CONNECT_TIMEOUT_SECS,
                idle_timeout_secs: DEFAULT_DATABASE_IDLE_TIMEOUT_SECS,
                run_migrations: true,
            },
            catalog: CatalogBackend::default(),
            ingest: IngestConfig {
                max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
                scratch_dir: std::env::temp_dir(),
            },
            export: ExportConfig {
                archive_name: DEFAULT_EXPORT_ARCHIVE_NAME.to_string(),
                entry_name: DEFAULT_EXPORT_ENTRY_NAME.to_string(),
            },
            cors: CorsConfig {
                allowed_origins: vec![DEFAULT_CORS_ALLOWED_ORIGIN.to_string()],
                allow_credentials: true,
            },
        }
    }
}

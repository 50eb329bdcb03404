use std::env;
use std::net::{IpAddr, SocketAddr};

/// Largest decoded PDF accepted by the submission handler (50 MiB).
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;
/// Identity platforms cap account listing pages at 1000 entries.
pub const MAX_REVIEWER_PAGE_SIZE: u32 = 1000;

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the portal service.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub portal: PortalConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::parse(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
        let log_format = match env::var("APP_LOG_FORMAT") {
            Ok(raw) => LogFormat::parse(&raw)?,
            Err(_) if environment == AppEnvironment::Production => LogFormat::Json,
            Err(_) => LogFormat::Compact,
        };

        let portal = PortalConfig::from_env()?;

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig {
                log_level,
                log_format,
            },
            portal,
        })
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Json,
}

impl LogFormat {
    fn parse(raw: &str) -> Result<Self, ConfigError> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "compact" | "text" => Ok(Self::Compact),
            "json" => Ok(Self::Json),
            _ => Err(ConfigError::InvalidLogFormat(raw.to_string())),
        }
    }
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
    pub log_format: LogFormat,
}

/// Limits and layout shared by the portal handlers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortalConfig {
    /// Blob prefix that uploaded PDFs live under, without a trailing slash.
    pub upload_prefix: String,
    pub max_upload_bytes: usize,
    pub reviewer_page_size: u32,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            upload_prefix: "pdfs".to_string(),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            reviewer_page_size: MAX_REVIEWER_PAGE_SIZE,
        }
    }
}

impl PortalConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let upload_prefix = match env::var("PORTAL_UPLOAD_PREFIX") {
            Ok(raw) => {
                let trimmed = raw.trim().trim_matches('/');
                if trimmed.is_empty() {
                    return Err(ConfigError::InvalidUploadPrefix);
                }
                trimmed.to_string()
            }
            Err(_) => defaults.upload_prefix,
        };

        let max_upload_bytes = match env::var("PORTAL_MAX_UPLOAD_BYTES") {
            Ok(raw) => raw
                .trim()
                .parse::<usize>()
                .ok()
                .filter(|bytes| *bytes > 0)
                .ok_or(ConfigError::InvalidMaxUploadBytes)?,
            Err(_) => defaults.max_upload_bytes,
        };

        let reviewer_page_size = match env::var("PORTAL_REVIEWER_PAGE_SIZE") {
            Ok(raw) => raw
                .trim()
                .parse::<u32>()
                .ok()
                .filter(|size| (1..=MAX_REVIEWER_PAGE_SIZE).contains(size))
                .ok_or(ConfigError::InvalidReviewerPageSize)?,
            Err(_) => defaults.reviewer_page_size,
        };

        Ok(Self {
            upload_prefix,
            max_upload_bytes,
            reviewer_page_size,
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("APP_PORT must be a valid u16")]
    InvalidPort,
    #[error("APP_HOST must parse to an IPv4 or IPv6 address")]
    InvalidHost { source: std::net::AddrParseError },
    #[error("APP_LOG_FORMAT must be `compact` or `json` (found `{0}`)")]
    InvalidLogFormat(String),
    #[error("PORTAL_UPLOAD_PREFIX must not be empty")]
    InvalidUploadPrefix,
    #[error("PORTAL_MAX_UPLOAD_BYTES must be a positive integer")]
    InvalidMaxUploadBytes,
    #[error("PORTAL_REVIEWER_PAGE_SIZE must be between 1 and 1000")]
    InvalidReviewerPageSize,
}

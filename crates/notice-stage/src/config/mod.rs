use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use crate::workflows::stage_change::eligibility::SuspensionPolicy;
use crate::workflows::stage_change::notification::DEFAULT_SUBJECT_PREFIX;
use crate::workflows::stage_change::service::StageChangeSettings;
use crate::workflows::stage_change::transition::DEFAULT_STAGE_DAYS;

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub stage_change: StageChangeConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            stage_change: StageChangeConfig::from_env()?,
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

/// Tracing and metrics controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Engine tunables and delivery adapter settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageChangeConfig {
    pub default_stage_days: i64,
    pub block_permanent_suspension: bool,
    pub blocked_ts_reasons: Vec<String>,
    pub report_dir: PathBuf,
    pub notify_recipients: Vec<String>,
    pub notify_subject_prefix: String,
}

impl Default for StageChangeConfig {
    fn default() -> Self {
        Self {
            default_stage_days: DEFAULT_STAGE_DAYS,
            block_permanent_suspension: false,
            blocked_ts_reasons: Vec::new(),
            report_dir: PathBuf::from("reports"),
            notify_recipients: Vec::new(),
            notify_subject_prefix: DEFAULT_SUBJECT_PREFIX.to_string(),
        }
    }
}

fn list_var(name: &str) -> Vec<String> {
    env::var(name)
        .map(|raw| {
            raw.split(',')
                .map(str::trim)
                .filter(|item| !item.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

impl StageChangeConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let default_stage_days = match env::var("CPS_DEFAULT_STAGE_DAYS") {
            Ok(raw) => raw
                .trim()
                .parse::<i64>()
                .ok()
                .filter(|days| *days >= 0)
                .ok_or(ConfigError::InvalidStageDays)?,
            Err(_) => defaults.default_stage_days,
        };

        let block_permanent_suspension = match env::var("CPS_BLOCK_PERMANENT_SUSPENSION") {
            Ok(raw) => match raw.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" | "" => false,
                _ => {
                    return Err(ConfigError::InvalidFlag {
                        name: "CPS_BLOCK_PERMANENT_SUSPENSION",
                    })
                }
            },
            Err(_) => defaults.block_permanent_suspension,
        };

        Ok(Self {
            default_stage_days,
            block_permanent_suspension,
            blocked_ts_reasons: list_var("CPS_BLOCKED_TS_REASONS"),
            report_dir: env::var("CPS_REPORT_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.report_dir),
            notify_recipients: list_var("CPS_NOTIFY_RECIPIENTS"),
            notify_subject_prefix: env::var("CPS_NOTIFY_SUBJECT_PREFIX")
                .unwrap_or(defaults.notify_subject_prefix),
        })
    }

    pub fn suspension_policy(&self) -> SuspensionPolicy {
        SuspensionPolicy {
            block_permanent: self.block_permanent_suspension,
            blocked_temporary_reasons: self.blocked_ts_reasons.clone(),
        }
    }

    pub fn settings(&self) -> StageChangeSettings {
        StageChangeSettings {
            default_stage_days: self.default_stage_days,
            suspension_policy: self.suspension_policy(),
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidStageDays,
    InvalidFlag { name: &'static str },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidStageDays => {
                write!(f, "CPS_DEFAULT_STAGE_DAYS must be a non-negative integer")
            }
            ConfigError::InvalidFlag { name } => write!(f, "{name} must be true or false"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::InvalidPort
            | ConfigError::InvalidStageDays
            | ConfigError::InvalidFlag { .. } => None,
        }
    }
}

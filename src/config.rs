/// Run configuration for the air-quality alert service.
///
/// Two layers:
/// - credentials from the environment (`main` loads `.env` through
///   `dotenv` first), looked up through an injectable function so tests never
///   touch the process environment;
/// - everything else from an optional TOML file. A missing file means
///   defaults; an unreadable or invalid one is fatal.
///
/// The resulting `Config` is immutable and passed by reference for the rest
/// of the run.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::classify::Classifier;
use crate::error::ConfigError;
use crate::format::{EmptyPolicy, Messages, RenderMode};
use crate::ingest::airkorea::AIRKOREA_BASE_URL;
use crate::ingest::kma::{GridPoint, KMA_BASE_URL};
use crate::model::{Breakpoints, Thresholds};
use crate::notify::TELEGRAM_BASE_URL;
use crate::regions::{self, RegionTable};

/// Environment variable naming the config file.
pub const CONFIG_PATH_VAR: &str = "DUSTMON_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "./dustmon.toml";

pub const DUST_API_KEY: &str = "DUST_API_KEY";
pub const WEATHER_API_KEY: &str = "WEATHER_API_KEY";
pub const TELEGRAM_BOT_TOKEN: &str = "TELEGRAM_BOT_TOKEN";
pub const TELEGRAM_CHAT_ID: &str = "TELEGRAM_CHAT_ID";

// ---------------------------------------------------------------------------
// Credentials
// ---------------------------------------------------------------------------

/// Secrets read from the environment.
///
/// Each secret is checked when something asks for it: the API keys by the
/// jobs that call those APIs, the Telegram pair before any real delivery.
/// A dry run therefore needs no Telegram settings.
#[derive(Clone)]
pub struct Credentials {
    pub dust_api_key: Option<String>,
    pub weather_api_key: Option<String>,
    pub telegram_bot_token: Option<String>,
    pub telegram_chat_id: Option<String>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("dust_api_key", &self.dust_api_key.as_ref().map(|_| "***"))
            .field("weather_api_key", &self.weather_api_key.as_ref().map(|_| "***"))
            .field("telegram_bot_token", &self.telegram_bot_token.as_ref().map(|_| "***"))
            .field("telegram_chat_id", &self.telegram_chat_id)
            .finish()
    }
}

impl Credentials {
    /// Reads credentials through `lookup`. Empty values count as missing.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        Self {
            dust_api_key: get(DUST_API_KEY),
            weather_api_key: get(WEATHER_API_KEY),
            telegram_bot_token: get(TELEGRAM_BOT_TOKEN),
            telegram_chat_id: get(TELEGRAM_CHAT_ID),
        }
    }

    /// Reads credentials from the process environment. Call
    /// `dotenv::dotenv()` first for `.env` support.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Bot token and chat id.
    pub fn telegram(&self) -> Result<(&str, &str), ConfigError> {
        let token = self
            .telegram_bot_token
            .as_deref()
            .ok_or(ConfigError::MissingCredential(TELEGRAM_BOT_TOKEN))?;
        let chat_id = self
            .telegram_chat_id
            .as_deref()
            .ok_or(ConfigError::MissingCredential(TELEGRAM_CHAT_ID))?;
        Ok((token, chat_id))
    }

    pub fn dust_api_key(&self) -> Result<&str, ConfigError> {
        self.dust_api_key
            .as_deref()
            .ok_or(ConfigError::MissingCredential(DUST_API_KEY))
    }

    pub fn weather_api_key(&self) -> Result<&str, ConfigError> {
        self.weather_api_key
            .as_deref()
            .ok_or(ConfigError::MissingCredential(WEATHER_API_KEY))
    }
}

// ---------------------------------------------------------------------------
// File layout
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct FileConfig {
    thresholds: Thresholds,
    breakpoints: BreakpointSection,
    delivery: DeliverySection,
    query: QuerySection,
    forecast: ForecastSection,
    http: HttpSection,
    messages: Messages,
    /// Extra or replacement pivot-code → display-name entries.
    regions: HashMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
struct BreakpointSection {
    pm10: Breakpoints,
    pm25: Breakpoints,
}

impl Default for BreakpointSection {
    fn default() -> Self {
        Self {
            pm10: Breakpoints::PM10,
            pm25: Breakpoints::PM25,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct DeliverySection {
    render_mode: RenderMode,
    empty_policy: EmptyPolicy,
}

/// Page size for list queries. A nationwide realtime query covers
/// roughly 650 stations.
const DEFAULT_ROWS: u32 = 1000;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
struct QuerySection {
    sido: String,
    rows: u32,
    advisory_rows: u32,
}

impl Default for QuerySection {
    fn default() -> Self {
        Self {
            sido: regions::NATIONWIDE.to_string(),
            rows: DEFAULT_ROWS,
            advisory_rows: DEFAULT_ROWS,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
struct ForecastSection {
    nx: u32,
    ny: u32,
    location: String,
}

impl Default for ForecastSection {
    fn default() -> Self {
        Self {
            nx: 60,
            ny: 127,
            location: "서울".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
struct HttpSection {
    timeout_secs: u64,
    airkorea_base_url: String,
    kma_base_url: String,
    telegram_base_url: String,
}

impl Default for HttpSection {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            airkorea_base_url: AIRKOREA_BASE_URL.to_string(),
            kma_base_url: KMA_BASE_URL.to_string(),
            telegram_base_url: TELEGRAM_BASE_URL.to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Resolved configuration
// ---------------------------------------------------------------------------

/// Validated, immutable settings for one run.
#[derive(Debug, Clone)]
pub struct Config {
    pub thresholds: Thresholds,
    pub classifier: Classifier,
    pub regions: RegionTable,
    pub messages: Messages,
    pub render_mode: RenderMode,
    pub empty_policy: EmptyPolicy,
    /// Default `sidoName` for the realtime job.
    pub sido: String,
    pub rows: u32,
    pub advisory_rows: u32,
    pub grid: GridPoint,
    pub forecast_location: String,
    pub http_timeout: Duration,
    pub airkorea_base_url: String,
    pub kma_base_url: String,
    pub telegram_base_url: String,
}

impl Default for Config {
    fn default() -> Self {
        Self::from_file_config(FileConfig::default())
    }
}

impl Config {
    /// Loads the config file at `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let display = path.display().to_string();
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(source) => return Err(ConfigError::Io { path: display, source }),
        };
        Self::from_toml_str(&text, &display)
    }

    /// Loads the file named by `DUSTMON_CONFIG`, or `./dustmon.toml`.
    pub fn load_default() -> Result<Self, ConfigError> {
        let path = std::env::var(CONFIG_PATH_VAR).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load(Path::new(&path))
    }

    /// Parses and validates TOML text. `origin` names it in errors.
    pub fn from_toml_str(text: &str, origin: &str) -> Result<Self, ConfigError> {
        let file: FileConfig = toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: origin.to_string(),
            source,
        })?;
        let config = Self::from_file_config(file);
        config.validate()?;
        Ok(config)
    }

    fn from_file_config(file: FileConfig) -> Self {
        Self {
            thresholds: file.thresholds,
            classifier: Classifier {
                pm10: file.breakpoints.pm10,
                pm25: file.breakpoints.pm25,
            },
            regions: RegionTable::new(&file.regions),
            messages: file.messages,
            render_mode: file.delivery.render_mode,
            empty_policy: file.delivery.empty_policy,
            sido: file.query.sido,
            rows: file.query.rows,
            advisory_rows: file.query.advisory_rows,
            grid: GridPoint {
                nx: file.forecast.nx,
                ny: file.forecast.ny,
            },
            forecast_location: file.forecast.location,
            http_timeout: Duration::from_secs(file.http.timeout_secs),
            airkorea_base_url: file.http.airkorea_base_url,
            kma_base_url: file.http.kma_base_url,
            telegram_base_url: file.http.telegram_base_url,
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [("pm10", self.thresholds.pm10), ("pm25", self.thresholds.pm25)] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "thresholds.{} must be a non-negative number, got {}",
                    name, value
                )));
            }
        }
        for (name, bp) in [("pm10", self.classifier.pm10), ("pm25", self.classifier.pm25)] {
            if !bp.is_ascending() {
                return Err(ConfigError::Invalid(format!(
                    "breakpoints.{} must satisfy good < moderate < bad, got {:?}",
                    name, bp
                )));
            }
        }
        if !regions::is_known_sido(&self.sido) {
            return Err(ConfigError::Invalid(format!("query.sido '{}' is not a province name", self.sido)));
        }
        if self.rows == 0 || self.advisory_rows == 0 {
            return Err(ConfigError::Invalid("query rows must be at least 1".to_string()));
        }
        if self.http_timeout.is_zero() {
            return Err(ConfigError::Invalid("http.timeout_secs must be at least 1".to_string()));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

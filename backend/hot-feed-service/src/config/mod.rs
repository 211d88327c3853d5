pub mod filter_settings;

use crate::error::ConfigError;
use crate::services::tiers::{default_tiers, duration_ms, parse_tiers, RefreshTier};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

pub use filter_settings::{
    settings_channel, FilterPolicy, FilterSettings, SettingsHandle, SettingsPublisher,
    SettingsSource,
};

#[derive(Debug, Clone)]
pub struct Config {
    pub app: AppConfig,
    pub database: DatabaseConfig,
    pub firehose: FirehoseConfig,
    pub appview: AppViewConfig,
    pub classifier: ClassifierConfig,
    pub ranking: RankingConfig,
    pub eviction: EvictionConfig,
    pub filter: FilterConfig,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub env: String,
    pub port: u16,
    /// Public hostname, used for the did:web service identity
    pub hostname: String,
    /// DID of the account that publishes the feed records
    pub publisher_did: String,
    /// `FEEDGEN_SERVICE_DID`, defaulting to the did:web of `hostname`
    pub service_did_override: Option<String>,
}

impl AppConfig {
    pub fn service_did(&self) -> String {
        self.service_did_override
            .clone()
            .unwrap_or_else(|| format!("did:web:{}", self.hostname))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres,
    Memory,
}

#[derive(Clone)]
pub struct DatabaseConfig {
    pub backend: StoreBackend,
    pub url: String,
    pub max_connections: u32,
}

impl std::fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("backend", &self.backend)
            .field("url", &"[REDACTED]")
            .field("max_connections", &self.max_connections)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct FirehoseConfig {
    pub enabled: bool,
    /// Jetstream subscribe endpoint (ws:// or wss://)
    pub endpoint: String,
    /// Key under which the resumption cursor is persisted
    pub service_name: String,
    pub batch_size: usize,
    pub flush_interval: Duration,
    pub reconnect_backoff: Duration,
    pub max_reconnect_backoff: Duration,
}

impl Default for FirehoseConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: "wss://jetstream2.us-east.bsky.network/subscribe".to_string(),
            service_name: "jetstream".to_string(),
            batch_size: 100,
            flush_interval: Duration::from_secs(1),
            reconnect_backoff: Duration::from_secs(1),
            max_reconnect_backoff: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppViewConfig {
    pub base_url: String,
    pub timeout: Duration,
}

impl Default for AppViewConfig {
    fn default() -> Self {
        Self {
            base_url: "https://public.api.bsky.app".to_string(),
            timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Clone)]
pub struct ClassifierConfig {
    /// No key means the classification queue is not started
    pub api_key: Option<String>,
    pub api_base: String,
    pub model: String,
    /// Subject of the yes/no question, e.g. "cinema"
    pub topic: String,
    pub timeout: Duration,
    pub batch_size: usize,
    pub interval: Duration,
}

impl std::fmt::Debug for ClassifierConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClassifierConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("api_base", &self.api_base)
            .field("model", &self.model)
            .field("topic", &self.topic)
            .field("timeout", &self.timeout)
            .field("batch_size", &self.batch_size)
            .field("interval", &self.interval)
            .finish()
    }
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_base: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            topic: "cinema".to_string(),
            timeout: Duration::from_secs(30),
            batch_size: 10,
            interval: Duration::from_secs(2 * 60),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RankingConfig {
    pub tiers: Vec<RefreshTier>,
    pub refresh_interval: Duration,
    pub max_concurrency: usize,
    pub fetch_timeout: Duration,
}

impl Default for RankingConfig {
    fn default() -> Self {
        let tiers = default_tiers();
        let refresh_interval = shortest_delay(&tiers);
        Self {
            tiers,
            refresh_interval,
            max_concurrency: 16,
            fetch_timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Clone)]
pub struct EvictionConfig {
    pub interval: Duration,
    pub stale_age: Duration,
    pub score_floor: f64,
}

impl Default for EvictionConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60 * 60),
            stale_age: Duration::from_secs(24 * 60 * 60),
            score_floor: 0.1,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FilterConfig {
    /// JSON keyword policy; the built-in policy is used when unset
    pub settings_path: Option<PathBuf>,
    pub reload_interval: Duration,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            settings_path: None,
            reload_interval: Duration::from_secs(10),
        }
    }
}

impl FilterConfig {
    pub fn source(&self) -> SettingsSource {
        match &self.settings_path {
            Some(path) => SettingsSource::File(path.clone()),
            None => SettingsSource::Builtin,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let hostname = lookup("FEEDGEN_HOSTNAME").unwrap_or_else(|| "localhost".to_string());
        let publisher_did = lookup("FEEDGEN_PUBLISHER_DID")
            .unwrap_or_else(|| format!("did:web:{}", hostname));

        let backend = match lookup("STORE_BACKEND").as_deref() {
            None | Some("postgres") => StoreBackend::Postgres,
            Some("memory") => StoreBackend::Memory,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    name: "STORE_BACKEND",
                    reason: format!("expected 'postgres' or 'memory', got '{}'", other),
                })
            }
        };
        let database_url = match (backend, lookup("DATABASE_URL")) {
            (_, Some(url)) => url,
            (StoreBackend::Memory, None) => String::new(),
            (StoreBackend::Postgres, None) => return Err(ConfigError::Missing("DATABASE_URL")),
        };

        let firehose_defaults = FirehoseConfig::default();
        let appview_defaults = AppViewConfig::default();
        let classifier_defaults = ClassifierConfig::default();
        let ranking_defaults = RankingConfig::default();
        let eviction_defaults = EvictionConfig::default();
        let filter_defaults = FilterConfig::default();

        let tiers = match lookup("REFRESH_TIERS") {
            Some(raw) => parse_tiers(&raw).map_err(|reason| ConfigError::Invalid {
                name: "REFRESH_TIERS",
                reason,
            })?,
            None => ranking_defaults.tiers,
        };
        let refresh_interval = match lookup("REFRESH_INTERVAL_SECS") {
            Some(_) => secs(&lookup, "REFRESH_INTERVAL_SECS", Duration::ZERO)?,
            None => shortest_delay(&tiers),
        };

        let score_floor: f64 = parse_or(&lookup, "EVICTION_SCORE_FLOOR", eviction_defaults.score_floor)?;
        if !score_floor.is_finite() {
            return Err(ConfigError::Invalid {
                name: "EVICTION_SCORE_FLOOR",
                reason: "must be a finite number".to_string(),
            });
        }

        Ok(Config {
            app: AppConfig {
                env: lookup("APP_ENV").unwrap_or_else(|| "development".to_string()),
                port: parse_or(&lookup, "APP_PORT", 3000)?,
                hostname,
                publisher_did,
                service_did_override: lookup("FEEDGEN_SERVICE_DID").filter(|did| !did.is_empty()),
            },
            database: DatabaseConfig {
                backend,
                url: database_url,
                max_connections: parse_or(&lookup, "DATABASE_MAX_CONNECTIONS", 10)?,
            },
            firehose: FirehoseConfig {
                enabled: parse_or(&lookup, "FIREHOSE_ENABLED", firehose_defaults.enabled)?,
                endpoint: lookup("FIREHOSE_ENDPOINT").unwrap_or(firehose_defaults.endpoint),
                service_name: lookup("FIREHOSE_SERVICE_NAME")
                    .unwrap_or(firehose_defaults.service_name),
                batch_size: positive(&lookup, "FIREHOSE_BATCH_SIZE", firehose_defaults.batch_size)?,
                flush_interval: millis(
                    &lookup,
                    "FIREHOSE_FLUSH_INTERVAL_MS",
                    firehose_defaults.flush_interval,
                )?,
                reconnect_backoff: millis(
                    &lookup,
                    "FIREHOSE_RECONNECT_BACKOFF_MS",
                    firehose_defaults.reconnect_backoff,
                )?,
                max_reconnect_backoff: secs(
                    &lookup,
                    "FIREHOSE_MAX_RECONNECT_BACKOFF_SECS",
                    firehose_defaults.max_reconnect_backoff,
                )?,
            },
            appview: AppViewConfig {
                base_url: lookup("APPVIEW_URL").unwrap_or(appview_defaults.base_url),
                timeout: secs(&lookup, "APPVIEW_TIMEOUT_SECS", appview_defaults.timeout)?,
            },
            classifier: ClassifierConfig {
                api_key: lookup("OPENAI_API_KEY").filter(|key| !key.is_empty()),
                api_base: lookup("CLASSIFIER_API_BASE").unwrap_or(classifier_defaults.api_base),
                model: lookup("CLASSIFIER_MODEL").unwrap_or(classifier_defaults.model),
                topic: lookup("CLASSIFIER_TOPIC").unwrap_or(classifier_defaults.topic),
                timeout: secs(&lookup, "CLASSIFIER_TIMEOUT_SECS", classifier_defaults.timeout)?,
                batch_size: positive(
                    &lookup,
                    "CLASSIFIER_BATCH_SIZE",
                    classifier_defaults.batch_size,
                )?,
                interval: secs(
                    &lookup,
                    "CLASSIFIER_INTERVAL_SECS",
                    classifier_defaults.interval,
                )?,
            },
            ranking: RankingConfig {
                tiers,
                refresh_interval,
                max_concurrency: positive(
                    &lookup,
                    "REFRESH_MAX_CONCURRENCY",
                    ranking_defaults.max_concurrency,
                )?,
                fetch_timeout: secs(
                    &lookup,
                    "REFRESH_FETCH_TIMEOUT_SECS",
                    ranking_defaults.fetch_timeout,
                )?,
            },
            eviction: EvictionConfig {
                interval: secs(&lookup, "EVICTION_INTERVAL_SECS", eviction_defaults.interval)?,
                stale_age: secs(&lookup, "EVICTION_STALE_AGE_SECS", eviction_defaults.stale_age)?,
                score_floor,
            },
            filter: FilterConfig {
                settings_path: lookup("FILTER_SETTINGS_PATH").map(PathBuf::from),
                reload_interval: secs(
                    &lookup,
                    "FILTER_RELOAD_INTERVAL_SECS",
                    filter_defaults.reload_interval,
                )?,
            },
        })
    }
}

fn shortest_delay(tiers: &[RefreshTier]) -> Duration {
    tiers
        .iter()
        .map(|tier| tier.refresh_delay)
        .min()
        .unwrap_or(Duration::from_secs(5 * 60))
}

fn parse_or<F, T>(lookup: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(name) {
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            name,
            reason: e.to_string(),
        }),
        None => Ok(default),
    }
}

fn positive<F>(lookup: &F, name: &'static str, default: usize) -> Result<usize, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let value: usize = parse_or(lookup, name, default)?;
    if value == 0 {
        return Err(ConfigError::Invalid {
            name,
            reason: "must be greater than zero".to_string(),
        });
    }
    Ok(value)
}

fn secs<F>(lookup: &F, name: &'static str, default: Duration) -> Result<Duration, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let value: u64 = parse_or(lookup, name, default.as_secs())?;
    if value == 0 {
        return Err(ConfigError::Invalid {
            name,
            reason: "must be greater than zero".to_string(),
        });
    }
    in_range(name, Duration::from_secs(value))
}

fn millis<F>(lookup: &F, name: &'static str, default: Duration) -> Result<Duration, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let default_ms = u64::try_from(default.as_millis()).unwrap_or(u64::MAX);
    let value: u64 = parse_or(lookup, name, default_ms)?;
    if value == 0 {
        return Err(ConfigError::Invalid {
            name,
            reason: "must be greater than zero".to_string(),
        });
    }
    in_range(name, Duration::from_millis(value))
}

/// Durations are compared against millisecond timestamps, so they must fit an `i64`.
fn in_range(name: &'static str, duration: Duration) -> Result<Duration, ConfigError> {
    match duration_ms(duration) {
        Some(_) => Ok(duration),
        None => Err(ConfigError::Invalid {
            name,
            reason: "too large".to_string(),
        }),
    }
}

use std::env;
use std::str::FromStr;
use std::time::Duration;

use anyhow::Context;

use crate::alerts::EvaluatorConfig;
use crate::pricing::OfferCacheConfig;
use crate::wheel::WheelConfig;

const DEFAULT_PROVIDER_URL: &str = "https://api.duffel.com";

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Postgres connection string. `None` runs on the in-memory store.
    pub database_url: Option<String>,
    pub host: String,
    pub port: u16,
    /// Bearer token for `/admin` routes. `None` disables them.
    pub admin_token: Option<String>,

    pub provider_url: String,
    pub provider_token: String,
    pub notifier_webhook_url: Option<String>,

    pub cache: OfferCacheConfig,
    pub alerts: EvaluatorConfig,
    pub wheel: WheelConfig,
    pub schedule: ScheduleConfig,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleConfig {
    pub alert_sweep_interval: Duration,
    /// Run one sweep as soon as the scheduler starts.
    pub sweep_at_start: bool,
    /// Daily prune anchor, UTC.
    pub prune_hour: u32,
    pub prune_minute: u32,
    pub retention_days: u32,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            alert_sweep_interval: Duration::from_secs(2 * 60 * 60),
            sweep_at_start: true,
            prune_hour: 3,
            prune_minute: 0,
            retention_days: 365,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            host: "0.0.0.0".into(),
            port: 8080,
            admin_token: None,
            provider_url: DEFAULT_PROVIDER_URL.into(),
            provider_token: String::new(),
            notifier_webhook_url: None,
            cache: OfferCacheConfig::default(),
            alerts: EvaluatorConfig::default(),
            wheel: WheelConfig::default(),
            schedule: ScheduleConfig::default(),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let cache_defaults = OfferCacheConfig::default();
        let alert_defaults = EvaluatorConfig::default();
        let wheel_defaults = WheelConfig::default();
        let schedule_defaults = ScheduleConfig::default();

        let prune_hour: u32 = parse_env("HISTORY_PRUNE_HOUR", schedule_defaults.prune_hour)?;
        let prune_minute: u32 = parse_env("HISTORY_PRUNE_MINUTE", schedule_defaults.prune_minute)?;
        anyhow::ensure!(prune_hour < 24, "HISTORY_PRUNE_HOUR must be 0-23");
        anyhow::ensure!(prune_minute < 60, "HISTORY_PRUNE_MINUTE must be 0-59");
        let sweep_interval_secs: u64 = parse_env(
            "ALERT_SWEEP_INTERVAL_SECS",
            schedule_defaults.alert_sweep_interval.as_secs(),
        )?;
        anyhow::ensure!(sweep_interval_secs > 0, "ALERT_SWEEP_INTERVAL_SECS must be positive");

        Ok(Self {
            database_url: non_empty("DATABASE_URL"),
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: parse_env("PORT", 8080)?,
            admin_token: non_empty("ADMIN_TOKEN"),

            provider_url: env::var("OFFER_PROVIDER_URL").unwrap_or_else(|_| DEFAULT_PROVIDER_URL.into()),
            provider_token: non_empty("OFFER_PROVIDER_TOKEN")
                .ok_or_else(|| anyhow::anyhow!("OFFER_PROVIDER_TOKEN must be set"))?,
            notifier_webhook_url: non_empty("NOTIFIER_WEBHOOK_URL"),

            cache: OfferCacheConfig {
                search_ttl: chrono::Duration::seconds(parse_env(
                    "SEARCH_CACHE_TTL_SECS",
                    cache_defaults.search_ttl.num_seconds(),
                )?),
                provider_timeout: Duration::from_secs(parse_env(
                    "PROVIDER_TIMEOUT_SECS",
                    cache_defaults.provider_timeout.as_secs(),
                )?),
            },
            alerts: EvaluatorConfig {
                cooldown: chrono::Duration::hours(parse_env(
                    "ALERT_COOLDOWN_HOURS",
                    alert_defaults.cooldown.num_hours(),
                )?),
                concurrency: parse_env("ALERT_SWEEP_CONCURRENCY", alert_defaults.concurrency)?.max(1),
                default_lead_days: parse_env("ALERT_DEFAULT_LEAD_DAYS", alert_defaults.default_lead_days)?,
            },
            wheel: WheelConfig {
                fallback_airport: env::var("WHEEL_FALLBACK_AIRPORT")
                    .map(|v| v.trim().to_ascii_uppercase())
                    .unwrap_or(wheel_defaults.fallback_airport),
                candidates: parse_env("WHEEL_CANDIDATES", wheel_defaults.candidates)?,
                lead_days: parse_env("WHEEL_LEAD_DAYS", wheel_defaults.lead_days)?,
                trip_nights: parse_env("WHEEL_TRIP_NIGHTS", wheel_defaults.trip_nights)?,
                offers_per_candidate: wheel_defaults.offers_per_candidate,
            },
            schedule: ScheduleConfig {
                alert_sweep_interval: Duration::from_secs(sweep_interval_secs),
                sweep_at_start: parse_env("ALERT_SWEEP_AT_START", schedule_defaults.sweep_at_start)?,
                prune_hour,
                prune_minute,
                retention_days: parse_env("HISTORY_RETENTION_DAYS", schedule_defaults.retention_days)?,
            },
        })
    }

    /// Returns true if the admin routes are enabled.
    pub fn has_admin_auth(&self) -> bool {
        self.admin_token.is_some()
    }
}

fn non_empty(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_env<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match non_empty(key) {
        Some(raw) => raw.trim().parse().with_context(|| format!("invalid {key}: {raw}")),
        None => Ok(default),
    }
}

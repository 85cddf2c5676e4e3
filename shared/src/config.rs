use crate::TtlMs;
use std::str::FromStr;
use tracing::warn;

/// Cache tuning: default TTL, sweep cadence and per-type TTL overrides.
#[derive(Clone, Debug, PartialEq)]
pub struct CacheSettings {
    pub default_ttl: TtlMs,
    pub sweep_interval: TtlMs,
    /// `(cache_type, ttl)` pairs layered on top of the built-in table.
    pub ttl_overrides: Vec<(String, TtlMs)>,
}

/// Retry tuning for single operations and bulk fan-outs.
#[derive(Clone, Debug, PartialEq)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub base_delay: TtlMs,
    pub max_delay: TtlMs,
    pub jitter_ratio: f64,
}

pub struct Config {
    pub cache: CacheSettings,
    pub retry: RetrySettings,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            default_ttl: TtlMs(Config::DEFAULT_TTL_MS),
            sweep_interval: TtlMs(Config::DEFAULT_SWEEP_INTERVAL_MS),
            ttl_overrides: Vec::new(),
        }
    }
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: Config::DEFAULT_MAX_ATTEMPTS,
            base_delay: TtlMs(Config::DEFAULT_BASE_DELAY_MS),
            max_delay: TtlMs(Config::DEFAULT_MAX_DELAY_MS),
            jitter_ratio: Config::DEFAULT_JITTER_RATIO,
        }
    }
}

impl Config {
    const DEFAULT_TTL_MS: u64 = 5 * 60 * 1000;
    const DEFAULT_SWEEP_INTERVAL_MS: u64 = 5 * 60 * 1000;
    const DEFAULT_MAX_ATTEMPTS: u32 = 3;
    const DEFAULT_BASE_DELAY_MS: u64 = 1000;
    const DEFAULT_MAX_DELAY_MS: u64 = 30_000;
    const DEFAULT_JITTER_RATIO: f64 = 0.1;

    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let cache = CacheSettings {
            default_ttl: TtlMs(parse_or(
                &lookup,
                "BILLING_CACHE_DEFAULT_TTL_MS",
                Self::DEFAULT_TTL_MS,
            )),
            sweep_interval: TtlMs(parse_or(
                &lookup,
                "BILLING_CACHE_SWEEP_INTERVAL_MS",
                Self::DEFAULT_SWEEP_INTERVAL_MS,
            )),
            ttl_overrides: lookup("BILLING_CACHE_TTLS")
                .map(|raw| parse_ttl_overrides(&raw))
                .unwrap_or_default(),
        };

        let retry = RetrySettings {
            max_attempts: parse_or(
                &lookup,
                "BILLING_RETRY_MAX_ATTEMPTS",
                Self::DEFAULT_MAX_ATTEMPTS,
            ),
            base_delay: TtlMs(parse_or(
                &lookup,
                "BILLING_RETRY_BASE_DELAY_MS",
                Self::DEFAULT_BASE_DELAY_MS,
            )),
            max_delay: TtlMs(parse_or(
                &lookup,
                "BILLING_RETRY_MAX_DELAY_MS",
                Self::DEFAULT_MAX_DELAY_MS,
            )),
            jitter_ratio: parse_or(
                &lookup,
                "BILLING_RETRY_JITTER_RATIO",
                Self::DEFAULT_JITTER_RATIO,
            ),
        };

        Self { cache, retry }
    }
}

fn parse_or<F, T>(lookup: &F, name: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: FromStr + Copy,
{
    match lookup(name) {
        Some(raw) => raw.trim().parse::<T>().unwrap_or_else(|_| {
            warn!("{name}={raw:?} is not a valid value, falling back to the default");
            default
        }),
        None => default,
    }
}

/// Parses `type=ms,type=ms`. Negative durations clamp to zero, which
/// disables caching for that type.
fn parse_ttl_overrides(raw: &str) -> Vec<(String, TtlMs)> {
    raw.split(',')
        .map(str::trim)
        .filter(|pair| !pair.is_empty())
        .filter_map(|pair| {
            let Some((cache_type, ms)) = pair.split_once('=') else {
                warn!("Ignoring malformed cache TTL override {pair:?}");
                return None;
            };
            let cache_type = cache_type.trim();
            match ms.trim().parse::<i64>() {
                Ok(ms) if !cache_type.is_empty() => {
                    Some((cache_type.to_string(), TtlMs(ms.max(0) as u64)))
                }
                _ => {
                    warn!("Ignoring malformed cache TTL override {pair:?}");
                    None
                }
            }
        })
        .collect()
}

//! Engine configuration
//!
//! Precedence: environment > config file > defaults. The file is TOML,
//! found via `FORB_CONFIG` or `./forb.toml`.

use crate::cache::CacheSettings;
use forb_core::{Number, DEFAULT_PRECISION};
use forb_plugin::{Capability, CurrencyMeta};
use forb_std::FixedRateProvider;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

pub const CONFIG_ENV: &str = "FORB_CONFIG";
pub const CONFIG_FILENAME: &str = "forb.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid value for {var}: '{value}' ({reason})")]
    Env { var: String, value: String, reason: String },

    #[error("invalid setting {key}: {reason}")]
    Invalid { key: &'static str, reason: &'static str },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RatesConfig {
    pub ttl_secs: u64,
    pub fetch_timeout_secs: u64,
    pub retry_backoff_secs: u64,
}

impl Default for RatesConfig {
    fn default() -> Self {
        Self { ttl_secs: 60, fetch_timeout_secs: 5, retry_backoff_secs: 5 }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TraitsConfig {
    /// Gate applied to every trait in addition to its own
    pub max_input_size: Option<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Alternatives shown after the top interpretation; 0 shows all
    pub max_alternatives: usize,
}

/// A currency with a constant rate, declared in `[currencies.<CODE>]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixedCurrency {
    pub rate: Number,
    #[serde(default = "default_quote")]
    pub quote: String,
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default = "default_decimals")]
    pub decimals: u8,
}

fn default_quote() -> String {
    "USD".to_string()
}

fn default_decimals() -> u8 {
    2
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub rates: RatesConfig,
    pub traits: TraitsConfig,
    pub dispatch: DispatchConfig,
    pub precision: u32,
    pub target_currencies: Vec<String>,
    pub log_level: String,
    pub currencies: BTreeMap<String, FixedCurrency>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            rates: RatesConfig::default(),
            traits: TraitsConfig::default(),
            dispatch: DispatchConfig::default(),
            precision: DEFAULT_PRECISION,
            target_currencies: vec!["USD".to_string()],
            log_level: "info".to_string(),
            currencies: BTreeMap::new(),
        }
    }
}

impl EngineConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let cfg: Self =
            toml::from_str(raw).map_err(|source| ConfigError::Parse { path: PathBuf::from("<inline>"), source })?;
        cfg.validate()
    }

    pub fn load_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Io { path: path.to_path_buf(), source })?;
        let cfg: Self =
            toml::from_str(&raw).map_err(|source| ConfigError::Parse { path: path.to_path_buf(), source })?;
        cfg.validate()
    }

    /// Checks run on every loaded configuration, whichever layer set the value.
    pub fn validate(self) -> Result<Self, ConfigError> {
        if self.precision == 0 {
            return Err(ConfigError::Invalid { key: "precision", reason: "precision must be positive" });
        }
        if self.rates.fetch_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                key: "rates.fetch_timeout_secs",
                reason: "fetch timeout must be positive",
            });
        }
        Ok(self)
    }

    /// File from `FORB_CONFIG` or `./forb.toml` (defaults when neither
    /// exists), then environment overrides.
    pub fn discover() -> Result<Self, ConfigError> {
        let base = match find_config_file() {
            Some(path) => {
                debug!(path = %path.display(), "loading config");
                Self::load_file(&path)?
            }
            None => {
                debug!("no config file found, using defaults");
                Self::default()
            }
        };
        base.with_env_overrides(|var| std::env::var(var).ok())
    }

    /// Apply `FORB_*` overrides read through `lookup`, then validate.
    pub fn with_env_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = parse_var(&lookup, "FORB_RATE_TTL_SECS")? {
            self.rates.ttl_secs = v;
        }
        if let Some(v) = parse_var(&lookup, "FORB_FETCH_TIMEOUT_SECS")? {
            self.rates.fetch_timeout_secs = v;
        }
        if let Some(v) = parse_var(&lookup, "FORB_RETRY_BACKOFF_SECS")? {
            self.rates.retry_backoff_secs = v;
        }
        if let Some(v) = parse_var(&lookup, "FORB_TRAIT_MAX_INPUT")? {
            self.traits.max_input_size = Some(v);
        }
        if let Some(v) = parse_var(&lookup, "FORB_MAX_ALTERNATIVES")? {
            self.dispatch.max_alternatives = v;
        }
        if let Some(v) = parse_var(&lookup, "FORB_PRECISION")? {
            self.precision = v;
        }
        if let Some(list) = lookup("FORB_TARGET_CURRENCY") {
            self.target_currencies = list
                .split(',')
                .map(|c| c.trim().to_uppercase())
                .filter(|c| !c.is_empty())
                .collect();
        }
        self.validate()
    }

    pub fn cache_settings(&self) -> CacheSettings {
        CacheSettings {
            ttl: Duration::from_secs(self.rates.ttl_secs),
            fetch_timeout: Duration::from_secs(self.rates.fetch_timeout_secs),
            retry_backoff: Duration::from_secs(self.rates.retry_backoff_secs),
        }
    }

    /// One fixed-rate provider per `[currencies.<CODE>]` table
    pub fn currency_capabilities(&self) -> Vec<Capability> {
        self.currencies
            .iter()
            .map(|(code, c)| {
                let code = code.to_uppercase();
                let symbol = c.symbol.clone().unwrap_or_else(|| code.clone());
                let name = c.name.clone().unwrap_or_else(|| code.clone());
                let meta = CurrencyMeta::new(code, symbol, name, c.decimals)
                    .with_description("Fixed rate from configuration");
                Capability::currency(FixedRateProvider::new(meta, c.rate.clone(), c.quote.clone()))
            })
            .collect()
    }
}

fn find_config_file() -> Option<PathBuf> {
    if let Ok(path) = std::env::var(CONFIG_ENV) {
        return Some(PathBuf::from(path));
    }
    let local = PathBuf::from(CONFIG_FILENAME);
    local.exists().then_some(local)
}

fn parse_var<T, F>(lookup: &F, var: &str) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(var) else {
        return Ok(None);
    };
    raw.trim().parse().map(Some).map_err(|e: T::Err| ConfigError::Env {
        var: var.to_string(),
        value: raw.clone(),
        reason: e.to_string(),
    })
}

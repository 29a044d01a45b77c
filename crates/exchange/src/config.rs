//! Exchange configuration
//!
//! Loaded from JSON; every field has a default so `{}` is a valid configuration.

use bourse_core::{AssetType, CommissionSchedule, Currency, DEFAULT_FEE_BPS, Symbol, UserId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {error}")]
    Io { path: String, error: String },

    #[error("Failed to parse config: {0}")]
    Parse(String),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangeConfig {
    /// Commission charged to the seller, in basis points
    #[serde(default = "default_fee_bps")]
    pub fee_bps: u32,

    /// Fractional digits accepted for (and stored with) order prices
    #[serde(default = "default_price_scale")]
    pub price_scale: u32,

    /// Owner of the fiat account that collects commissions in `platform_currency`
    #[serde(default)]
    pub platform_user_id: UserId,

    /// Settlement currency of the platform account, and of sellers without a fiat account
    #[serde(default)]
    pub platform_currency: Currency,

    /// Commission accounts for other currencies, e.g. `{"EUR": 901}`
    #[serde(default)]
    pub fee_accounts: BTreeMap<Currency, UserId>,

    /// Return the existing order when a user repeats an idempotency key
    #[serde(default = "default_true")]
    pub dedupe_idempotency_keys: bool,

    /// Longest wait for a single ledger row lock
    #[serde(default = "default_row_lock_timeout_ms")]
    pub row_lock_timeout_ms: u64,

    #[serde(default)]
    pub matching: MatchingConfig,

    #[serde(default = "default_asset_types")]
    pub asset_types: Vec<AssetTypeConfig>,
}

fn default_fee_bps() -> u32 {
    DEFAULT_FEE_BPS
}

fn default_price_scale() -> u32 {
    8
}

fn default_true() -> bool {
    true
}

fn default_row_lock_timeout_ms() -> u64 {
    2_000
}

fn default_asset_types() -> Vec<AssetTypeConfig> {
    AssetType::defaults()
        .into_iter()
        .map(AssetTypeConfig::from)
        .collect()
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            fee_bps: default_fee_bps(),
            price_scale: default_price_scale(),
            platform_user_id: 0,
            platform_currency: Currency::default(),
            fee_accounts: BTreeMap::new(),
            dedupe_idempotency_keys: true,
            row_lock_timeout_ms: default_row_lock_timeout_ms(),
            matching: MatchingConfig::default(),
            asset_types: default_asset_types(),
        }
    }
}

impl ExchangeConfig {
    /// Load configuration from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Io {
            path: path.as_ref().display().to_string(),
            error: e.to_string(),
        })?;

        Self::from_json(&content)
    }

    /// Parse configuration from JSON string
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.fee_bps > 10_000 {
            return Err(ConfigError::Invalid(format!(
                "fee_bps {} exceeds 10000",
                self.fee_bps
            )));
        }
        if self.price_scale > 18 {
            return Err(ConfigError::Invalid(format!(
                "price_scale {} exceeds 18",
                self.price_scale
            )));
        }
        self.matching.validate()?;
        self.asset_types()?;

        let accounts = self.fee_accounts();
        let mut owners = BTreeMap::new();
        for (currency, user_id) in &accounts {
            if let Some(other) = owners.insert(*user_id, *currency) {
                return Err(ConfigError::Invalid(format!(
                    "user {user_id} cannot collect fees in both {other} and {currency}"
                )));
            }
        }
        Ok(())
    }

    /// Fee account per settlement currency, the platform account included
    pub fn fee_accounts(&self) -> BTreeMap<Currency, UserId> {
        let mut accounts = self.fee_accounts.clone();
        accounts
            .entry(self.platform_currency)
            .or_insert(self.platform_user_id);
        accounts
    }

    pub fn commission(&self) -> CommissionSchedule {
        CommissionSchedule::new(self.fee_bps)
    }

    pub fn row_lock_timeout(&self) -> Duration {
        Duration::from_millis(self.row_lock_timeout_ms)
    }

    /// Validated asset types
    pub fn asset_types(&self) -> Result<Vec<AssetType>, ConfigError> {
        self.asset_types
            .iter()
            .map(AssetTypeConfig::to_asset_type)
            .collect()
    }
}

/// Per-symbol matching serialization and worker pool sizing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchingConfig {
    /// How long a symbol lock is held before it is considered abandoned
    #[serde(default = "default_lease_ms")]
    pub lease_ms: u64,

    /// Longest wait for a busy symbol lock before the attempt is dropped
    #[serde(default = "default_wait_ms")]
    pub wait_ms: u64,

    #[serde(default = "default_poll_ms")]
    pub poll_ms: u64,

    #[serde(default = "default_workers")]
    pub workers: usize,

    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

fn default_lease_ms() -> u64 {
    5_000
}

fn default_wait_ms() -> u64 {
    2_000
}

fn default_poll_ms() -> u64 {
    50
}

fn default_workers() -> usize {
    4
}

fn default_queue_capacity() -> usize {
    1_024
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            lease_ms: default_lease_ms(),
            wait_ms: default_wait_ms(),
            poll_ms: default_poll_ms(),
            workers: default_workers(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

impl MatchingConfig {
    pub fn lease(&self) -> Duration {
        Duration::from_millis(self.lease_ms)
    }

    pub fn wait(&self) -> Duration {
        Duration::from_millis(self.wait_ms)
    }

    pub fn poll(&self) -> Duration {
        Duration::from_millis(self.poll_ms.max(1))
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.workers == 0 {
            return Err(ConfigError::Invalid("matching.workers must be > 0".into()));
        }
        if self.queue_capacity == 0 {
            return Err(ConfigError::Invalid(
                "matching.queue_capacity must be > 0".into(),
            ));
        }
        if self.lease_ms == 0 {
            return Err(ConfigError::Invalid("matching.lease_ms must be > 0".into()));
        }
        Ok(())
    }
}

/// Asset type entry as written in configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetTypeConfig {
    pub symbol: String,
    pub atomic_scale: u32,
    #[serde(default)]
    pub name: Option<String>,
}

impl AssetTypeConfig {
    pub fn to_asset_type(&self) -> Result<AssetType, ConfigError> {
        let symbol = Symbol::new(self.symbol.as_str())
            .map_err(|e| ConfigError::Invalid(format!("asset {:?}: {}", self.symbol, e)))?;
        let asset = AssetType::new(symbol, self.atomic_scale)
            .map_err(|e| ConfigError::Invalid(format!("asset {:?}: {}", self.symbol, e)))?;
        Ok(match &self.name {
            Some(name) => asset.with_name(name.clone()),
            None => asset,
        })
    }
}

impl From<AssetType> for AssetTypeConfig {
    fn from(asset: AssetType) -> Self {
        Self {
            symbol: asset.symbol.to_string(),
            atomic_scale: asset.atomic_scale,
            name: asset.name,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_json_uses_defaults() {
        let config = ExchangeConfig::from_json("{}").unwrap();
        assert_eq!(config, ExchangeConfig::default());
        assert_eq!(config.fee_bps, 150);
        assert_eq!(config.price_scale, 8);
        assert_eq!(config.matching.workers, 4);
        assert_eq!(config.asset_types().unwrap().len(), 6);
    }

    #[test]
    fn test_partial_override() {
        let json = r#"{
            "fee_bps": 25,
            "matching": { "workers": 2 },
            "asset_types": [{ "symbol": "doge", "atomic_scale": 8 }]
        }"#;
        let config = ExchangeConfig::from_json(json).unwrap();
        assert_eq!(config.fee_bps, 25);
        assert_eq!(config.matching.workers, 2);
        assert_eq!(config.matching.wait_ms, 2_000);

        let assets = config.asset_types().unwrap();
        assert_eq!(assets[0].symbol.as_str(), "DOGE");
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(matches!(
            ExchangeConfig::from_json(r#"{ "fee_bps": 20000 }"#),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            ExchangeConfig::from_json(r#"{ "matching": { "workers": 0 } }"#),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            ExchangeConfig::from_json(r#"{ "asset_types": [{ "symbol": "X", "atomic_scale": 0 }] }"#),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            ExchangeConfig::from_json("not json"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_fee_accounts_per_currency() {
        let config = ExchangeConfig::from_json(
            r#"{ "platform_user_id": 900, "fee_accounts": { "EUR": 901, "NGN": 902 } }"#,
        )
        .unwrap();
        let accounts = config.fee_accounts();
        assert_eq!(accounts.len(), 3);
        assert_eq!(accounts[&Currency::Usd], 900);
        assert_eq!(accounts[&Currency::Eur], 901);
        assert_eq!(accounts[&Currency::Ngn], 902);

        // One fiat account holds one currency
        assert!(matches!(
            ExchangeConfig::from_json(r#"{ "platform_user_id": 5, "fee_accounts": { "GBP": 5 } }"#),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_missing_file() {
        let err = ExchangeConfig::from_file("/nonexistent/bourse.json").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}

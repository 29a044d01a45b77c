//! Bootstrap - exchange setup from a JSON description
//!
//! Handles initial setup of a run:
//! - Registering asset types (through the exchange config)
//! - Opening funded fiat accounts and asset holdings
//! - Placing seed orders, then waiting for their matching attempts

use bourse_core::{Currency, FixedPoint, Order, Side, Symbol, UserId};
use bourse_exchange::{
    BalancesView, ConfigError, Exchange, ExchangeConfig, ExchangeError, InMemoryLedger,
    PlaceOrderRequest,
};
use bourse_ports::{LedgerStore, StoreError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Account {user_id}: {reason}")]
    InvalidAccount { user_id: UserId, reason: String },

    #[error("Seed order #{index} rejected: {source}")]
    SeedOrder {
        index: usize,
        #[source]
        source: ExchangeError,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// A user's starting balances
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountSeed {
    pub user_id: UserId,

    #[serde(default)]
    pub currency: Currency,

    /// Fiat minor units credited as available
    #[serde(default)]
    pub fiat_available: i64,

    /// Symbol to decimal amount, e.g. `{"BTC": "1.5"}`
    #[serde(default)]
    pub assets: BTreeMap<String, String>,
}

impl AccountSeed {
    pub fn new(user_id: UserId, currency: Currency, fiat_available: i64) -> Self {
        Self {
            user_id,
            currency,
            fiat_available,
            assets: BTreeMap::new(),
        }
    }

    pub fn with_asset(mut self, symbol: &str, amount: &str) -> Self {
        self.assets.insert(symbol.to_string(), amount.to_string());
        self
    }
}

/// Bootstrap configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BootstrapConfig {
    #[serde(default)]
    pub exchange: ExchangeConfig,

    #[serde(default)]
    pub accounts: Vec<AccountSeed>,

    /// Placed in order once the accounts exist
    #[serde(default)]
    pub seed_orders: Vec<PlaceOrderRequest>,
}

impl Default for BootstrapConfig {
    /// One buyer, one seller and a crossing pair on BTC
    fn default() -> Self {
        Self {
            exchange: ExchangeConfig::default(),
            accounts: vec![
                AccountSeed::new(1, Currency::Usd, 100_000),
                AccountSeed::new(2, Currency::Usd, 0).with_asset("BTC", "1"),
            ],
            seed_orders: vec![
                PlaceOrderRequest::new(1, "BTC", Side::Buy, "50000", "0.1"),
                PlaceOrderRequest::new(2, "BTC", Side::Sell, "50000", "0.1"),
            ],
        }
    }
}

impl BootstrapConfig {
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
        config.exchange.validate()?;
        Ok(config)
    }

    /// Configured user ids, fee accounts first
    pub fn user_ids(&self) -> Vec<UserId> {
        let mut ids: Vec<UserId> = Vec::new();
        let fee_users = self.exchange.fee_accounts().into_values();
        for user_id in fee_users.chain(self.accounts.iter().map(|a| a.user_id)) {
            if !ids.contains(&user_id) {
                ids.push(user_id);
            }
        }
        ids
    }
}

/// Exchange bootstrap - sets up the ledger and places seed orders
pub struct ExchangeBootstrap {
    /// The running exchange
    pub exchange: Exchange<InMemoryLedger>,
    /// Seed orders as accepted, in placement order
    pub orders: Vec<Order>,
    user_ids: Vec<UserId>,
}

impl ExchangeBootstrap {
    /// Create a new bootstrap with default configuration
    pub async fn new() -> Result<Self, BootstrapError> {
        Self::with_config(BootstrapConfig::default()).await
    }

    /// Create bootstrap with custom configuration.
    ///
    /// Must be called from within a tokio runtime.
    pub async fn with_config(config: BootstrapConfig) -> Result<Self, BootstrapError> {
        let exchange = Exchange::in_memory(&config.exchange)?;
        let user_ids = config.user_ids();

        for account in &config.accounts {
            seed_account(&exchange, account).await?;
        }

        let mut orders = Vec::with_capacity(config.seed_orders.len());
        for (index, seed) in config.seed_orders.iter().enumerate() {
            let order = exchange
                .place_order(seed.clone())
                .await
                .map_err(|source| BootstrapError::SeedOrder { index, source })?;
            orders.push(order);
        }

        // Seed orders only count once their matching attempts are done
        exchange.drain().await;
        log::info!(
            "Bootstrap complete: {} accounts, {} seed orders",
            config.accounts.len(),
            orders.len()
        );

        Ok(Self {
            exchange,
            orders,
            user_ids,
        })
    }

    /// Balances of every configured user that has an account
    pub async fn balances(&self) -> Result<Vec<BalancesView>, ExchangeError> {
        let mut views = Vec::with_capacity(self.user_ids.len());
        for &user_id in &self.user_ids {
            match self.exchange.balances(user_id).await {
                Ok(view) => views.push(view),
                Err(ExchangeError::UserNotFound(_)) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(views)
    }

    pub async fn shutdown(self) {
        self.exchange.shutdown().await;
    }
}

async fn seed_account(
    exchange: &Exchange<InMemoryLedger>,
    account: &AccountSeed,
) -> Result<(), BootstrapError> {
    let invalid = |reason: String| BootstrapError::InvalidAccount {
        user_id: account.user_id,
        reason,
    };

    if account.fiat_available < 0 {
        return Err(invalid(format!(
            "fiat balance must not be negative, got {}",
            account.fiat_available
        )));
    }
    let ledger = exchange.ledger();
    ledger.open_fiat_account(account.user_id, account.currency, account.fiat_available)?;

    for (symbol, amount) in &account.assets {
        let symbol = Symbol::new(symbol.as_str()).map_err(|e| invalid(format!("{symbol}: {e}")))?;
        let asset = ledger
            .asset_type(&symbol)
            .await?
            .ok_or_else(|| invalid(format!("unknown asset {symbol}")))?;
        let units = FixedPoint::parse_exact(amount, asset.atomic_scale)
            .map_err(|e| invalid(format!("{symbol} amount: {e}")))?
            .numerator();
        if units < 0 {
            return Err(invalid(format!("{symbol} amount must not be negative")));
        }
        ledger.set_asset_balance(account.user_id, symbol, units)?;
    }

    log::info!(
        "Opened account for user {} with {} {} and {} asset holdings",
        account.user_id,
        account.fiat_available,
        account.currency,
        account.assets.len()
    );
    Ok(())
}

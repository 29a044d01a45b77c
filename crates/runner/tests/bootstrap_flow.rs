//! Bootstrap integration tests
//!
//! Builds exchanges from JSON the way the binary does and checks the seeded state after
//! matching has run.

use bourse_core::{Currency, OrderStatus};
use bourse_runner::{AccountSeed, BootstrapConfig, BootstrapError, ExchangeBootstrap, summary};
use bourse_exchange::ExchangeError;

const CONFIG: &str = r#"{
    "exchange": {
        "fee_bps": 100,
        "platform_user_id": 900,
        "fee_accounts": { "EUR": 901 },
        "matching": { "workers": 2 }
    },
    "accounts": [
        { "user_id": 1, "currency": "EUR", "fiat_available": 50000 },
        { "user_id": 2, "currency": "EUR", "assets": { "ETH": "3", "SOL": "120.5" } }
    ],
    "seed_orders": [
        { "user_id": 2, "symbol": "eth", "side": "sell", "price": "1800", "amount": "2" },
        { "user_id": 1, "symbol": "ETH", "side": "buy", "price": "1850", "amount": "2",
          "idempotency_key": "boot-1" },
        { "user_id": 2, "symbol": "SOL", "side": "sell", "price": "150", "amount": "10" }
    ]
}"#;

#[tokio::test]
async fn test_bootstrap_from_json() {
    let _ = env_logger::builder().is_test(true).try_init();
    let config = BootstrapConfig::from_json(CONFIG).unwrap();
    let bootstrap = ExchangeBootstrap::with_config(config).await.unwrap();

    let statuses: Vec<OrderStatus> = {
        let mut statuses = Vec::new();
        for order in &bootstrap.orders {
            statuses.push(bootstrap.exchange.order(order.id).await.unwrap().status);
        }
        statuses
    };
    assert_eq!(
        statuses,
        vec![OrderStatus::Filled, OrderStatus::Filled, OrderStatus::Open]
    );

    // Priced at the buy order: 2 * 1850 = 3700, fee 1% = 37, collected in EUR
    let balances = bootstrap.balances().await.unwrap();
    let fees = balances.iter().find(|b| b.user_id == 901).unwrap();
    assert_eq!(fees.fiat_available, 37);
    assert_eq!(fees.currency, Currency::Eur);

    // The USD platform account never saw a USD trade
    assert!(balances.iter().all(|b| b.user_id != 900));

    let buyer = balances.iter().find(|b| b.user_id == 1).unwrap();
    assert_eq!(buyer.currency, Currency::Eur);
    assert_eq!(buyer.fiat_available, 46_300);
    assert_eq!(buyer.asset("ETH").unwrap().available, 2_000_000_000_000_000_000);

    let seller = balances.iter().find(|b| b.user_id == 2).unwrap();
    assert_eq!(seller.fiat_available, 3_663);
    assert_eq!(seller.asset("SOL").unwrap().locked, 10_000_000_000);
    assert_eq!(seller.asset("SOL").unwrap().available, 110_500_000_000);

    let lines = summary(&bootstrap).await.unwrap();
    assert!(lines.contains(&"ETH: 1 trades, volume 3700, fees 37".to_string()));

    bootstrap.shutdown().await;
}

#[tokio::test]
async fn test_rejected_seed_order_aborts() {
    let config = BootstrapConfig {
        accounts: vec![AccountSeed::new(1, Currency::Usd, 10)],
        ..BootstrapConfig::default()
    };

    let err = ExchangeBootstrap::with_config(config).await.err().unwrap();
    match err {
        BootstrapError::SeedOrder { index, source } => {
            assert_eq!(index, 0);
            assert!(matches!(source, ExchangeError::InsufficientBalance { .. }));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_seed_pair_in_different_currencies_stays_open() {
    let json = r#"{
        "accounts": [
            { "user_id": 1, "currency": "NGN", "fiat_available": 100000 },
            { "user_id": 2, "currency": "USD", "assets": { "BTC": "1" } }
        ],
        "seed_orders": [
            { "user_id": 1, "symbol": "BTC", "side": "buy", "price": "50000", "amount": "0.1" },
            { "user_id": 2, "symbol": "BTC", "side": "sell", "price": "50000", "amount": "0.1" }
        ]
    }"#;
    let bootstrap = ExchangeBootstrap::with_config(BootstrapConfig::from_json(json).unwrap())
        .await
        .unwrap();

    for order in &bootstrap.orders {
        let stored = bootstrap.exchange.order(order.id).await.unwrap();
        assert_eq!(stored.status, OrderStatus::Open);
    }
    let lines = summary(&bootstrap).await.unwrap();
    assert!(lines.iter().all(|l| !l.starts_with("BTC:")));

    bootstrap.shutdown().await;
}

#[test]
fn test_invalid_exchange_settings_rejected() {
    let err = BootstrapConfig::from_json(r#"{ "exchange": { "fee_bps": 20000 } }"#).unwrap_err();
    assert!(err.to_string().contains("Invalid config"));
}

#[test]
fn test_missing_file_reported() {
    let err = BootstrapConfig::from_file("/nonexistent/bourse.json").unwrap_err();
    assert!(err.to_string().contains("/nonexistent/bourse.json"));
}

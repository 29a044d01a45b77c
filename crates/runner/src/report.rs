//! Human-readable balance lines for the end-of-run summary

use bourse_core::{AssetType, Symbol};
use bourse_exchange::{BalancesView, ExchangeError, InMemoryLedger};
use bourse_ports::LedgerStore;
use std::collections::HashMap;

use crate::bootstrap::ExchangeBootstrap;

/// One line per user: fiat in minor units, holdings at the asset's display scale
pub fn describe(view: &BalancesView, assets: &HashMap<Symbol, AssetType>) -> String {
    let mut line = format!(
        "user {}: {} available {} locked {}",
        view.user_id, view.currency, view.fiat_available, view.fiat_locked
    );
    for holding in &view.assets {
        let (available, locked) = match assets.get(&holding.symbol) {
            Some(asset) => (
                asset.format_amount(holding.available),
                asset.format_amount(holding.locked),
            ),
            None => (holding.available.to_string(), holding.locked.to_string()),
        };
        line.push_str(&format!(
            " | {} available {} locked {}",
            holding.symbol, available, locked
        ));
    }
    line
}

/// Summary lines for every configured user, plus one per symbol that traded
pub async fn summary(bootstrap: &ExchangeBootstrap) -> Result<Vec<String>, ExchangeError> {
    let ledger: &InMemoryLedger = bootstrap.exchange.ledger();
    let assets: HashMap<Symbol, AssetType> = ledger
        .asset_types()
        .await?
        .into_iter()
        .map(|a| (a.symbol.clone(), a))
        .collect();

    let mut lines: Vec<String> = bootstrap
        .balances()
        .await?
        .iter()
        .map(|view| describe(view, &assets))
        .collect();

    let mut symbols: Vec<&Symbol> = assets.keys().collect();
    symbols.sort();
    for symbol in symbols {
        let trades = bootstrap.exchange.trades(symbol).await?;
        if trades.is_empty() {
            continue;
        }
        let volume: i64 = trades.iter().map(|t| t.volume_units).sum();
        let fees: i64 = trades.iter().map(|t| t.commission_fee_units).sum();
        lines.push(format!(
            "{}: {} trades, volume {}, fees {}",
            symbol,
            trades.len(),
            volume,
            fees
        ));
    }
    Ok(lines)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bourse_core::Currency;
    use bourse_exchange::AssetBalanceView;

    #[test]
    fn test_describe_formats_holdings() {
        let btc = AssetType::new(Symbol::new("BTC").unwrap(), 8).unwrap();
        let assets = HashMap::from([(btc.symbol.clone(), btc)]);
        let view = BalancesView {
            user_id: 2,
            currency: Currency::Usd,
            fiat_available: 4_925,
            fiat_locked: 0,
            assets: vec![AssetBalanceView {
                symbol: Symbol::new("BTC").unwrap(),
                available: 90_000_000,
                locked: 0,
            }],
        };

        assert_eq!(
            describe(&view, &assets),
            "user 2: USD available 4925 locked 0 | BTC available 0.90000000 locked 0.00000000"
        );
    }

    #[tokio::test]
    async fn test_summary_reports_trades() {
        let bootstrap = ExchangeBootstrap::new().await.unwrap();
        let lines = summary(&bootstrap).await.unwrap();

        assert_eq!(lines.len(), 4);
        assert_eq!(lines[3], "BTC: 1 trades, volume 5000, fees 75");
    }
}

use crate::values::{Symbol, format_units};
use serde::{Deserialize, Serialize};

/// Reference data for a tradable asset
///
/// One display unit of the asset is `10^atomic_scale` atomic units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetType {
    pub symbol: Symbol,
    pub atomic_scale: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl AssetType {
    pub fn new(symbol: Symbol, atomic_scale: u32) -> Result<Self, &'static str> {
        if atomic_scale == 0 {
            return Err("Atomic scale must be positive");
        }
        if atomic_scale > 18 {
            return Err("Atomic scale must be at most 18");
        }
        Ok(Self {
            symbol,
            atomic_scale,
            name: None,
        })
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Render atomic units as a display amount with `atomic_scale` fractional digits
    pub fn format_amount(&self, atomic_units: i64) -> String {
        format_units(atomic_units, self.atomic_scale, self.atomic_scale)
    }

    /// The assets every fresh exchange knows about
    pub fn defaults() -> Vec<AssetType> {
        [
            ("BTC", 8, "Bitcoin"),
            ("ETH", 18, "Ethereum"),
            ("USDT", 6, "Tether"),
            ("BNB", 8, "BNB"),
            ("ADA", 6, "Cardano"),
            ("SOL", 9, "Solana"),
        ]
        .into_iter()
        .filter_map(|(symbol, scale, name)| {
            let symbol = Symbol::new(symbol).ok()?;
            AssetType::new(symbol, scale).ok().map(|a| a.with_name(name))
        })
        .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let defaults = AssetType::defaults();
        assert_eq!(defaults.len(), 6);
        let eth = defaults.iter().find(|a| a.symbol.as_str() == "ETH").unwrap();
        assert_eq!(eth.atomic_scale, 18);
    }

    #[test]
    fn test_zero_scale_rejected() {
        let symbol = Symbol::new("XYZ").unwrap();
        assert!(AssetType::new(symbol, 0).is_err());
    }

    #[test]
    fn test_format_amount() {
        let btc = AssetType::new(Symbol::new("BTC").unwrap(), 8).unwrap();
        assert_eq!(btc.format_amount(150_000_000), "1.50000000");
        assert_eq!(btc.format_amount(1), "0.00000001");
    }
}

use serde::{Deserialize, Serialize};
use std::fmt;

/// Market symbol, one per tradeable asset (e.g. `BTC`), priced in fiat
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Symbol(String);

impl Symbol {
    pub const MAX_LEN: usize = 16;

    pub fn new(value: impl Into<String>) -> Result<Self, &'static str> {
        let s: String = value.into();
        let s = s.trim();
        if s.is_empty() {
            return Err("Symbol cannot be empty");
        }
        if s.len() > Self::MAX_LEN {
            return Err("Symbol too long (max 16 chars)");
        }
        if !s.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err("Symbol must be alphanumeric");
        }
        Ok(Symbol(s.to_ascii_uppercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for Symbol {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<&str> for Symbol {
    type Error = &'static str;
    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Symbol::new(value)
    }
}

impl TryFrom<String> for Symbol {
    type Error = &'static str;
    fn try_from(value: String) -> Result<Self, Self::Error> {
        Symbol::new(value)
    }
}

impl From<Symbol> for String {
    fn from(symbol: Symbol) -> String {
        symbol.0
    }
}

//! Bourse Runner - exchange bootstrap
//!
//! Stands up a complete in-memory exchange from a JSON description:
//!
//! - **Bootstrap**: asset types, funded accounts and seed orders
//! - **Report**: end-of-run balances and per-symbol trade totals
//!
//! ## Flow
//!
//! ```text
//!   config.json
//!        │
//!        ▼
//! ┌───────────────┐   accounts    ┌──────────────────┐
//! │   Bootstrap   │──────────────▶│  In-memory ledger │
//! └───────┬───────┘               └─────────▲────────┘
//!         │ seed orders                     │ settle
//!         ▼                                 │
//! ┌───────────────┐   order ids   ┌─────────┴────────┐
//! │ Order service │──────────────▶│  Match workers   │
//! └───────────────┘               └──────────────────┘
//! ```

pub mod bootstrap;
pub mod report;

// Re-export main types
pub use bootstrap::{AccountSeed, BootstrapConfig, BootstrapError, ExchangeBootstrap};
pub use report::{describe, summary};

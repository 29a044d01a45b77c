//! Bourse Exchange
//!
//! Order lifecycle and matching/settlement for a single-asset-class spot exchange.
//!
//! - **Order service**: creates orders with funds/asset reservation, cancels them with
//!   release, lists and renders them
//! - **Matching engine**: pairs an order with one resting counter-order and settles the
//!   trade atomically, commission going to the platform account
//! - **Match trigger**: per-symbol serialized matching attempts fed by a worker pool
//!
//! ```text
//!   place_order ──► OrderService ──commit──► MatchQueue ──► workers
//!                        │                                    │
//!                        ▼                                    ▼
//!                  LedgerStore ◄──── MatchingEngine ◄──── MatchTrigger
//!                  (row locks)                          (symbol lock)
//! ```

// Application layer
pub mod application;

// Infrastructure layer
pub mod infrastructure;

// Cross-cutting concerns
pub mod config;
pub mod error;
pub mod model;

// Re-export main types for convenience
pub use application::{
    Exchange, MatchOutcome, MatchTrigger, MatchingEngine, OrderService, RejectReason,
    TriggerOutcome,
};
pub use config::{AssetTypeConfig, ConfigError, ExchangeConfig, MatchingConfig};
pub use error::{ExchangeError, Result};
pub use infrastructure::{InMemoryLedger, InMemoryMatchLock, ManualClock, SystemClock};
pub use model::{AssetBalanceView, BalancesView, CreateOrder, OrderView, PlaceOrderRequest};

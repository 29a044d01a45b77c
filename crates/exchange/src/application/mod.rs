mod exchange;
mod matching;
mod order_service;
mod trigger;

pub use exchange::Exchange;
pub use matching::{MatchOutcome, MatchingEngine, RejectReason};
pub use order_service::OrderService;
pub use trigger::{MatchTrigger, TriggerOutcome};

mod account;
mod asset_type;
mod currency;
mod fee;
mod order;
mod order_status;
mod side;
mod trade;

pub use account::{AssetAccount, Balance, BalanceError, FiatAccount};
pub use asset_type::AssetType;
pub use currency::Currency;
pub use fee::{CommissionSchedule, DEFAULT_FEE_BPS, FeeError};
pub use order::{NewOrder, Order, StatusTransitionError};
pub use order_status::OrderStatus;
pub use side::Side;
pub use trade::{NewTrade, Settlement, Trade};

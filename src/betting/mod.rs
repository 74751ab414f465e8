//! Odds market, wager ledger, wallet and settlement.

pub mod events;
pub mod history;
pub mod odds;
pub mod service;
pub mod wallet;

pub use events::BettingObserver;
pub use history::{BettingHistory, Wager, WagerStatus};
pub use odds::{Odds, OddsCalculator, OddsConfig, BETTING_PATTERN_WEIGHT, MAX_ODDS, MIN_ODDS};
pub use service::BettingService;
pub use wallet::{VirtualWallet, DEFAULT_BALANCE};

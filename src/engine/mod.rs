// 9.0: settlement engine facade. coordinates the ledger, lending pools,
// oracle, matching and liquidation auctions behind one mutable state machine.
// deterministic and event-driven; callers stamp time and block height.

mod admin;
mod config;
mod core;
mod funds;
mod liquidations;
mod orders;
mod pool;
mod results;
mod views;

pub use config::EngineConfig;
pub use core::Engine;
pub use orders::SignedOrder;
pub use results::{
    AuctionFillOutcome, AuditReport, EngineError, LiquidationOutcome, MatchOutcome,
};

// margin-core: settlement and risk engine for a margined money market.
// ledger-first architecture: every balance lives in one shared ledger and
// every operation settles against it. all computation is deterministic with
// no external I/O; callers stamp time and block height.
//
// file map:
//   1.x  math.rs: unsigned 18-decimal fixed point money math
//   2.x  types.rs: newtype primitives: ids, sides, hashes, time, blocks
//   2.1  asset.rs: asset registry entries and per-asset risk knobs
//   2.2  market.rs: trading pairs and liquidation parameters
//   2.3  oracle.rs: guarded price feeds
//   3.x  order.rs: relayer-carried orders, hashing, fee terms
//   3.1  signature.rs: order signature schemes and verifiers
//   3.2  discount.rs: discount token fee tiers
//   4.x  matching.rs: batch fill planning: prices, fees, staged moves
//   5.x  balances.rs: shared ledger: common and per-market collateral paths
//   5.1  custody.rs: token movement boundary behind deposits and withdrawals
//   6.x  lending.rs: pooled lending: indices, shares, insurance, loss
//   6.1  interest.rs: interest rate models
//   7.x  collateral.rs: collateral account health evaluation
//   7.1  auction.rs: liquidation auction pricing and fill planning
//   8.x  events.rs: state transition events for audit
//   9.x  engine/: the facade: admin, funds, pool, orders, liquidations, views

// money and market structure
pub mod asset;
pub mod market;
pub mod math;
pub mod oracle;
pub mod types;

// orders and matching
pub mod discount;
pub mod matching;
pub mod order;
pub mod signature;

// balances, credit and risk
pub mod auction;
pub mod balances;
pub mod collateral;
pub mod custody;
pub mod interest;
pub mod lending;

// engine facade and events
pub mod engine;
pub mod events;

// re exports for convenience
pub use asset::*;
pub use auction::*;
pub use balances::*;
pub use collateral::*;
pub use custody::*;
pub use discount::*;
pub use engine::*;
pub use events::*;
pub use interest::*;
pub use lending::*;
pub use market::*;
pub use matching::*;
pub use math::*;
pub use oracle::*;
pub use order::*;
pub use signature::*;
pub use types::*;

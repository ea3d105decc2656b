// 8.0: every state change produces an event. used for audit trails, state
// reconstruction, and notifying external systems. the EventPayload enum
// lists all event types.

use crate::balances::BalancePath;
use crate::math::Fixed;
use crate::types::{AssetId, AuctionId, MarketId, OrderHash, Side, Timestamp, UserId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EventId(pub u64);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub timestamp: Timestamp,
    pub payload: EventPayload,
}

impl Event {
    pub fn new(id: EventId, timestamp: Timestamp, payload: EventPayload) -> Self {
        Self {
            id,
            timestamp,
            payload,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EventPayload {
    // Admin events
    AssetRegistered(AssetRegisteredEvent),
    MarketCreated(MarketCreatedEvent),

    // Fund events
    Deposited(DepositedEvent),
    Withdrawn(WithdrawnEvent),
    Transferred(TransferredEvent),

    // Pool events
    Supplied(SuppliedEvent),
    Unsupplied(UnsuppliedEvent),
    Borrowed(BorrowedEvent),
    Repaid(RepaidEvent),
    InterestAccrued(InterestAccruedEvent),
    InsuranceFunded(InsuranceFundedEvent),

    // Trade events
    OrderMatched(OrderMatchedEvent),
    OrderCancelled(OrderCancelledEvent),

    // Risk events
    AccountLiquidated(AccountLiquidatedEvent),
    AuctionCreated(AuctionCreatedEvent),
    AuctionFilled(AuctionFilledEvent),
    AuctionFinished(AuctionFinishedEvent),

    // Oracle events
    PriceUpdated(PriceUpdatedEvent),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetRegisteredEvent {
    pub asset: AssetId,
    pub symbol: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketCreatedEvent {
    pub market: MarketId,
    pub base_asset: AssetId,
    pub quote_asset: AssetId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepositedEvent {
    pub asset: AssetId,
    pub path: BalancePath,
    pub amount: Fixed,
    pub new_balance: Fixed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WithdrawnEvent {
    pub asset: AssetId,
    pub path: BalancePath,
    pub amount: Fixed,
    pub new_balance: Fixed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferredEvent {
    pub asset: AssetId,
    pub from: BalancePath,
    pub to: BalancePath,
    pub amount: Fixed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuppliedEvent {
    pub asset: AssetId,
    pub user: UserId,
    pub amount: Fixed,
    pub shares_minted: Fixed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnsuppliedEvent {
    pub asset: AssetId,
    pub user: UserId,
    pub amount: Fixed,
    pub shares_burned: Fixed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BorrowedEvent {
    pub asset: AssetId,
    pub user: UserId,
    pub market: MarketId,
    pub amount: Fixed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepaidEvent {
    pub asset: AssetId,
    pub user: UserId,
    pub market: MarketId,
    pub amount: Fixed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterestAccruedEvent {
    pub asset: AssetId,
    pub interest: Fixed,
    pub to_insurance: Fixed,
    pub borrow_index: Fixed,
    pub supply_index: Fixed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InsuranceFundedEvent {
    pub asset: AssetId,
    pub funder: UserId,
    pub amount: Fixed,
    pub insurance_balance: Fixed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderMatchedEvent {
    pub market: MarketId,
    pub taker_hash: OrderHash,
    pub maker_hash: OrderHash,
    pub taker: UserId,
    pub maker: UserId,
    pub taker_side: Side,
    pub base: Fixed,
    pub quote: Fixed,
    pub taker_fee: Fixed,
    pub maker_fee: Fixed,
    pub maker_rebate: Fixed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderCancelledEvent {
    pub hash: OrderHash,
    pub trader: UserId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountLiquidatedEvent {
    pub user: UserId,
    pub market: MarketId,
    /// Set when force-repay left residual debt and opened an auction
    pub auction: Option<AuctionId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuctionCreatedEvent {
    pub auction: AuctionId,
    pub user: UserId,
    pub market: MarketId,
    pub debt_asset: AssetId,
    pub collateral_asset: AssetId,
    pub debt_amount: Fixed,
    pub collateral_amount: Fixed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuctionFilledEvent {
    pub auction: AuctionId,
    pub filler: UserId,
    pub debt_filled: Fixed,
    pub collateral_out: Fixed,
    /// Shortfall compensation drawn from the insurance reserve
    pub insurance_used: Fixed,
    /// Shortfall socialized across pool suppliers after insurance ran dry
    pub socialized_loss: Fixed,
    /// Shortfall nobody absorbed; stays with the filler
    pub unbacked_loss: Fixed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuctionFinishedEvent {
    pub auction: AuctionId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceUpdatedEvent {
    pub asset: AssetId,
    pub price: Fixed,
}

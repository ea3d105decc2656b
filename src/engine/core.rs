// 9.0 engine/core.rs: main engine. holds the ledger, pools, markets,
// auctions and every registry the operations touch.

use super::config::EngineConfig;
use super::results::EngineError;
use crate::asset::Asset;
use crate::auction::Auction;
use crate::balances::Ledger;
use crate::collateral::AccountStatus;
use crate::custody::{NoopTokenTransfer, TokenTransfer};
use crate::discount::DiscountTable;
use crate::events::{Event, EventId, EventPayload};
use crate::interest::InterestRateModel;
use crate::lending::{LendingPool, PoolError};
use crate::market::{Market, MarketError};
use crate::matching::OrderTracker;
use crate::oracle::FeedOracle;
use crate::signature::{PermissiveVerifier, SignatureVerifier};
use crate::types::{AssetId, AuctionId, BlockNumber, MarketId, Timestamp, UserId};
use std::collections::HashMap;

/** 9.1: engine struct. every registry and balance store lives here */
#[derive(Debug)]
pub struct Engine {
    pub(super) config: EngineConfig,
    pub(super) assets: HashMap<AssetId, Asset>,
    pub(super) markets: HashMap<MarketId, Market>,
    pub(super) pools: HashMap<AssetId, LendingPool>,
    pub(super) models: HashMap<AssetId, Box<dyn InterestRateModel>>,
    pub(super) oracle: FeedOracle,
    pub(super) ledger: Ledger,
    pub(super) discount: DiscountTable,
    pub(super) verifier: Box<dyn SignatureVerifier>,
    pub(super) custody: Box<dyn TokenTransfer>,
    pub(super) tracker: OrderTracker,
    pub(super) statuses: HashMap<(UserId, MarketId), AccountStatus>,
    pub(super) auctions: HashMap<AuctionId, Auction>,
    pub(super) next_auction_id: u32,
    pub(super) events: Vec<Event>,
    pub(super) next_event_id: u64,
    pub(super) current_time: Timestamp,
    pub(super) current_block: BlockNumber,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            assets: HashMap::new(),
            markets: HashMap::new(),
            pools: HashMap::new(),
            models: HashMap::new(),
            oracle: FeedOracle::new(),
            ledger: Ledger::new(),
            // a flat table over an unregistered token never discounts
            discount: DiscountTable::flat(AssetId(0)),
            verifier: Box::new(PermissiveVerifier),
            custody: Box::new(NoopTokenTransfer),
            tracker: OrderTracker::new(),
            statuses: HashMap::new(),
            auctions: HashMap::new(),
            next_auction_id: 1,
            events: Vec::new(),
            next_event_id: 1,
            current_time: Timestamp::from_secs(0),
            current_block: BlockNumber(0),
        }
    }

    pub fn set_time(&mut self, timestamp: Timestamp) {
        self.current_time = timestamp;
    }

    pub fn time(&self) -> Timestamp {
        self.current_time
    }

    pub fn advance_time(&mut self, secs: u64) {
        self.current_time = Timestamp::from_secs(self.current_time.as_secs() + secs);
    }

    pub fn set_block(&mut self, block: BlockNumber) {
        self.current_block = block;
    }

    pub fn block(&self) -> BlockNumber {
        self.current_block
    }

    pub fn advance_blocks(&mut self, count: u64) {
        self.current_block = BlockNumber(self.current_block.0 + count);
    }

    pub fn asset(&self, asset_id: AssetId) -> Option<&Asset> {
        self.assets.get(&asset_id)
    }

    pub fn market(&self, market_id: MarketId) -> Option<&Market> {
        self.markets.get(&market_id)
    }

    pub fn pool(&self, asset_id: AssetId) -> Option<&LendingPool> {
        self.pools.get(&asset_id)
    }

    pub fn auction(&self, auction_id: AuctionId) -> Option<&Auction> {
        self.auctions.get(&auction_id)
    }

    pub fn status(&self, user: UserId, market_id: MarketId) -> AccountStatus {
        self.statuses
            .get(&(user, market_id))
            .copied()
            .unwrap_or_default()
    }

    pub fn recent_events(&self, count: usize) -> &[Event] {
        let start = self.events.len().saturating_sub(count);
        &self.events[start..]
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub(super) fn market_ref(&self, market_id: MarketId) -> Result<&Market, EngineError> {
        self.markets
            .get(&market_id)
            .ok_or(EngineError::Market(MarketError::NotFound(market_id)))
    }

    pub(super) fn pool_ref(&self, asset_id: AssetId) -> Result<&LendingPool, EngineError> {
        self.pools
            .get(&asset_id)
            .ok_or(EngineError::Pool(PoolError::NotFound(asset_id)))
    }

    pub(super) fn pool_mut(&mut self, asset_id: AssetId) -> Result<&mut LendingPool, EngineError> {
        self.pools
            .get_mut(&asset_id)
            .ok_or(EngineError::Pool(PoolError::NotFound(asset_id)))
    }

    pub(super) fn set_status(&mut self, user: UserId, market_id: MarketId, status: AccountStatus) {
        if status == AccountStatus::Normal {
            self.statuses.remove(&(user, market_id));
        } else {
            self.statuses.insert((user, market_id), status);
        }
    }

    pub(super) fn emit_event(&mut self, payload: EventPayload) {
        let event = Event::new(EventId(self.next_event_id), self.current_time, payload);
        self.next_event_id += 1;

        if self.config.verbose {
            println!("[Event {}] {:?}", event.id.0, event.payload);
        }

        self.events.push(event);

        if self.events.len() > self.config.max_events {
            let drain_count = self.events.len() - self.config.max_events;
            self.events.drain(0..drain_count);
        }
    }
}

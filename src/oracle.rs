// Price Oracle Integration
//
// The engine never trusts a raw price push. Each asset gets a guarded feed:
// hard min/max bounds, a per-update change-rate limit, and an expiry window.
// A rejected update leaves the last valid price in place. The engine is
// agnostic to where updates originate; anything that can stamp a price and a
// timestamp can drive a feed.

use crate::math::Fixed;
use crate::types::{AssetId, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Read side consumed by health evaluation, auctions and matching.
pub trait PriceOracle {
    /// USD value of 1.0 unit of `asset` at `now`.
    fn price(&self, asset: AssetId, now: Timestamp) -> Result<Fixed, OracleError>;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OracleError {
    #[error("no price feed registered for {0}")]
    NoFeed(AssetId),

    #[error("price for {asset} expired {age}s ago (limit {limit}s)")]
    PriceExpired {
        asset: AssetId,
        age: u64,
        limit: u64,
    },

    #[error("price {price} for {asset} outside [{min}, {max}]")]
    PriceExceedsLimit {
        asset: AssetId,
        price: Fixed,
        min: Fixed,
        max: Fixed,
    },

    #[error("price move for {asset} exceeds allowed rate {max_change_rate}")]
    ChangeRateExceeded {
        asset: AssetId,
        max_change_rate: Fixed,
    },
}

/// Guard parameters for a single feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedGuard {
    pub min_price: Fixed,
    pub max_price: Fixed,
    /// Largest relative move accepted in one update, e.g. 0.10 for 10%
    pub max_change_rate: Fixed,
    /// Seconds after which a price may no longer be read
    pub expire_after: u64,
}

impl Default for FeedGuard {
    fn default() -> Self {
        Self {
            min_price: Fixed::from_raw(1),
            max_price: Fixed::from_int(10_000_000),
            max_change_rate: Fixed::percent(10),
            expire_after: 3600,
        }
    }
}

/// One asset's guarded price feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceFeed {
    pub asset: AssetId,
    pub guard: FeedGuard,
    price: Fixed,
    updated_at: Timestamp,
}

impl PriceFeed {
    /// The initial price bypasses the change-rate check (there is nothing to
    /// change from) but still honors the min/max bounds.
    pub fn new(
        asset: AssetId,
        initial_price: Fixed,
        now: Timestamp,
        guard: FeedGuard,
    ) -> Result<Self, OracleError> {
        check_bounds(asset, initial_price, &guard)?;
        Ok(Self {
            asset,
            guard,
            price: initial_price,
            updated_at: now,
        })
    }

    pub fn set_price(&mut self, price: Fixed, now: Timestamp) -> Result<(), OracleError> {
        check_bounds(self.asset, price, &self.guard)?;

        let previous = self.price;
        let delta = price.max(previous).saturating_sub(price.min(previous));
        let allowed = previous
            .mul_floor(self.guard.max_change_rate)
            .unwrap_or(Fixed::ZERO);
        if delta > allowed {
            return Err(OracleError::ChangeRateExceeded {
                asset: self.asset,
                max_change_rate: self.guard.max_change_rate,
            });
        }

        self.price = price;
        self.updated_at = now;
        Ok(())
    }

    pub fn read(&self, now: Timestamp) -> Result<Fixed, OracleError> {
        let age = now.elapsed_since(self.updated_at);
        if age > self.guard.expire_after {
            return Err(OracleError::PriceExpired {
                asset: self.asset,
                age,
                limit: self.guard.expire_after,
            });
        }
        Ok(self.price)
    }

    /// Last accepted price, ignoring expiry. For reporting only.
    pub fn last_price(&self) -> Fixed {
        self.price
    }
}

fn check_bounds(asset: AssetId, price: Fixed, guard: &FeedGuard) -> Result<(), OracleError> {
    if price < guard.min_price || price > guard.max_price {
        return Err(OracleError::PriceExceedsLimit {
            asset,
            price,
            min: guard.min_price,
            max: guard.max_price,
        });
    }
    Ok(())
}

/// The engine's oracle: one guarded feed per asset.
#[derive(Debug, Clone, Default)]
pub struct FeedOracle {
    feeds: HashMap<AssetId, PriceFeed>,
}

impl FeedOracle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, feed: PriceFeed) {
        self.feeds.insert(feed.asset, feed);
    }

    pub fn feed(&self, asset: AssetId) -> Option<&PriceFeed> {
        self.feeds.get(&asset)
    }

    pub fn set_price(
        &mut self,
        asset: AssetId,
        price: Fixed,
        now: Timestamp,
    ) -> Result<(), OracleError> {
        let feed = self
            .feeds
            .get_mut(&asset)
            .ok_or(OracleError::NoFeed(asset))?;
        feed.set_price(price, now)
    }
}

impl PriceOracle for FeedOracle {
    fn price(&self, asset: AssetId, now: Timestamp) -> Result<Fixed, OracleError> {
        let feed = self.feeds.get(&asset).ok_or(OracleError::NoFeed(asset))?;
        feed.read(now)
    }
}

/// Static prices for tests: no guards, no expiry.
#[derive(Debug, Clone, Default)]
pub struct StaticOracle {
    prices: HashMap<AssetId, Fixed>,
}

impl StaticOracle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_price(mut self, asset: AssetId, price: Fixed) -> Self {
        self.prices.insert(asset, price);
        self
    }

    pub fn set(&mut self, asset: AssetId, price: Fixed) {
        self.prices.insert(asset, price);
    }
}

impl PriceOracle for StaticOracle {
    fn price(&self, asset: AssetId, _now: Timestamp) -> Result<Fixed, OracleError> {
        self.prices
            .get(&asset)
            .copied()
            .ok_or(OracleError::NoFeed(asset))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed_at_100(now: Timestamp) -> PriceFeed {
        PriceFeed::new(AssetId(1), Fixed::from_int(100), now, FeedGuard::default()).unwrap()
    }

    #[test]
    fn read_within_expiry() {
        let feed = feed_at_100(Timestamp::from_secs(1000));
        assert_eq!(
            feed.read(Timestamp::from_secs(1000 + 3600)).unwrap(),
            Fixed::from_int(100)
        );
    }

    #[test]
    fn read_after_expiry_fails() {
        let feed = feed_at_100(Timestamp::from_secs(1000));
        let result = feed.read(Timestamp::from_secs(1000 + 3601));
        assert!(matches!(result, Err(OracleError::PriceExpired { .. })));
    }

    #[test]
    fn change_rate_guard() {
        let mut feed = feed_at_100(Timestamp::from_secs(1000));

        // 10% move is the limit; exactly at the limit passes
        feed.set_price(Fixed::from_int(110), Timestamp::from_secs(1001))
            .unwrap();

        // 11% of 110 = 12.1, so 123 is past the limit
        let result = feed.set_price(Fixed::from_int(123), Timestamp::from_secs(1002));
        assert!(matches!(result, Err(OracleError::ChangeRateExceeded { .. })));

        // rejected update did not move the price
        assert_eq!(feed.last_price(), Fixed::from_int(110));
    }

    #[test]
    fn downward_moves_also_guarded() {
        let mut feed = feed_at_100(Timestamp::from_secs(1000));
        let result = feed.set_price(Fixed::from_int(80), Timestamp::from_secs(1001));
        assert!(matches!(result, Err(OracleError::ChangeRateExceeded { .. })));
    }

    #[test]
    fn bounds_guard() {
        let guard = FeedGuard {
            min_price: Fixed::from_int(1),
            max_price: Fixed::from_int(1000),
            ..FeedGuard::default()
        };
        let result = PriceFeed::new(
            AssetId(1),
            Fixed::from_int(5000),
            Timestamp::from_secs(0),
            guard,
        );
        assert!(matches!(result, Err(OracleError::PriceExceedsLimit { .. })));
    }

    #[test]
    fn oracle_routes_by_asset() {
        let now = Timestamp::from_secs(0);
        let mut oracle = FeedOracle::new();
        oracle.register(feed_at_100(now));

        assert_eq!(oracle.price(AssetId(1), now).unwrap(), Fixed::from_int(100));
        assert_eq!(
            oracle.price(AssetId(9), now),
            Err(OracleError::NoFeed(AssetId(9)))
        );
    }
}

// 5.1 custody.rs: token movement boundary. the engine never talks to token
// contracts; external movements route through a TokenTransfer adapter.

use crate::math::Fixed;
use crate::types::{AssetId, UserId};

/// External token movement. An implementation that refuses a movement must
/// leave the outside world unchanged; the engine then leaves its own state
/// unchanged too.
pub trait TokenTransfer: std::fmt::Debug {
    /// Funds arriving into custody, about to be credited to the ledger.
    fn transfer_in(
        &mut self,
        user: UserId,
        asset: AssetId,
        amount: Fixed,
    ) -> Result<(), TransferError>;

    /// Funds leaving custody, called once the matching debit is guaranteed.
    fn transfer_out(
        &mut self,
        user: UserId,
        asset: AssetId,
        amount: Fixed,
    ) -> Result<(), TransferError>;
}

/// Accepts every movement. Real settlement lives outside the engine.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTokenTransfer;

impl TokenTransfer for NoopTokenTransfer {
    fn transfer_in(
        &mut self,
        _user: UserId,
        _asset: AssetId,
        _amount: Fixed,
    ) -> Result<(), TransferError> {
        Ok(())
    }

    fn transfer_out(
        &mut self,
        _user: UserId,
        _asset: AssetId,
        _amount: Fixed,
    ) -> Result<(), TransferError> {
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransferError {
    #[error("custody refused moving {amount} of {asset} for {user}: {reason}")]
    Refused {
        user: UserId,
        asset: AssetId,
        amount: Fixed,
        reason: String,
    },
}

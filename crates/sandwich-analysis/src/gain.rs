//! Gain computation for a candidate frontrun/backrun pair.
//!
//! The frontrun leg is read as a buy (`amount1In` spent, `amount0Out`
//! received), the backrun leg as a sell (`amount0In` spent, `amount1Out`
//! received). Amounts are exact 256-bit integers; gas cost is
//! `effective_gas_price * gas_used` of each leg.

use std::fmt;

use alloy::primitives::{I256, U256};
use sandwich_data::types::Transaction;

use crate::classify::{ClassifiedTx, SwapArgs};
use crate::error::DetectError;

/// Why two transactions do not form a pair.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RejectReason {
    DifferentBlock,
    SameTransaction,
    OutOfOrder,
    /// Frontrun leg spends nothing on the buy side.
    FrontrunNotBuy,
    /// Backrun leg spends nothing on the sell side.
    BackrunNotSell,
    /// Quantity bought by the frontrun differs from the quantity sold back.
    AmountMismatch,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::DifferentBlock => "different block",
            Self::SameTransaction => "same transaction",
            Self::OutOfOrder => "frontrun not before backrun",
            Self::FrontrunNotBuy => "frontrun is not a buy",
            Self::BackrunNotSell => "backrun is not a sell",
            Self::AmountMismatch => "bought amount differs from sold amount",
        };
        f.write_str(text)
    }
}

/// Gain of a confirmed pair, all values in Wei.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GainBreakdown {
    /// Backrun output minus frontrun input.
    pub gross_gain: I256,
    pub frontrun_gas_cost: U256,
    pub backrun_gas_cost: U256,
    /// Gross gain minus both gas costs. May be negative.
    pub net_gain: I256,
    pub frontrun_amount_in: U256,
    pub frontrun_amount_out: U256,
    pub backrun_amount_out: U256,
}

/// Outcome of checking a candidate pair.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PairVerdict {
    Pair(GainBreakdown),
    NotAPair(RejectReason),
}

/// Gas cost of a transaction in Wei.
pub fn gas_cost(tx: &Transaction) -> U256 {
    U256::from(tx.receipt.effective_gas_price) * U256::from(tx.receipt.gas_used)
}

fn signed(value: U256, tx: &Transaction) -> Result<I256, DetectError> {
    I256::try_from(value).map_err(|_| DetectError::AmountOverflow { tx_hash: tx.hash })
}

fn swap_of<'c>(leg: &'c ClassifiedTx<'_>) -> Result<&'c SwapArgs, DetectError> {
    leg.swap.as_ref().ok_or(DetectError::MissingSwapEvent {
        tx_hash: leg.hash(),
    })
}

/// Checks whether `t1` then `t2` form a frontrun/backrun pair and computes its gain.
///
/// # Errors
/// Returns [`DetectError::MissingSwapEvent`] if either leg carries no swap, and
/// [`DetectError::AmountOverflow`] if the amounts leave the signed 256-bit range.
pub fn compute_gain(t1: &ClassifiedTx<'_>, t2: &ClassifiedTx<'_>) -> Result<PairVerdict, DetectError> {
    if t1.tx.block_hash != t2.tx.block_hash {
        return Ok(PairVerdict::NotAPair(RejectReason::DifferentBlock));
    }
    if t1.hash() == t2.hash() {
        return Ok(PairVerdict::NotAPair(RejectReason::SameTransaction));
    }
    if t1.index() >= t2.index() {
        return Ok(PairVerdict::NotAPair(RejectReason::OutOfOrder));
    }

    let (t1_in, t1_out) = swap_of(t1)?.buy_amounts();
    let (t2_in, t2_out) = swap_of(t2)?.sell_amounts();

    if t1_in.is_zero() {
        return Ok(PairVerdict::NotAPair(RejectReason::FrontrunNotBuy));
    }
    if t2_in.is_zero() {
        return Ok(PairVerdict::NotAPair(RejectReason::BackrunNotSell));
    }
    if t1_out != t2_in {
        return Ok(PairVerdict::NotAPair(RejectReason::AmountMismatch));
    }

    let overflow = DetectError::AmountOverflow { tx_hash: t2.hash() };
    let gross_gain = signed(t2_out, t2.tx)?
        .checked_sub(signed(t1_in, t1.tx)?)
        .ok_or_else(|| overflow.clone())?;

    let frontrun_gas_cost = gas_cost(t1.tx);
    let backrun_gas_cost = gas_cost(t2.tx);
    let frontrun_gas = signed(frontrun_gas_cost, t1.tx)?;
    let backrun_gas = signed(backrun_gas_cost, t2.tx)?;
    let net_gain = gross_gain
        .checked_sub(frontrun_gas)
        .and_then(|gain| gain.checked_sub(backrun_gas))
        .ok_or(overflow)?;

    Ok(PairVerdict::Pair(GainBreakdown {
        gross_gain,
        frontrun_gas_cost,
        backrun_gas_cost,
        net_gain,
        frontrun_amount_in: t1_in,
        frontrun_amount_out: t1_out,
        backrun_amount_out: t2_out,
    }))
}

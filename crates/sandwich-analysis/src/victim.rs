//! Victim search between the two legs of a confirmed pair.

use std::collections::{BTreeSet, HashSet};

use alloy::primitives::{Address, B256, U256};
use sandwich_data::types::Transaction;

use crate::classify::ClassifiedTx;

/// Victim transaction with the amount it spent on its buy.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Victim<'a> {
    pub tx: &'a Transaction,
    pub input_amount: U256,
}

/// Finds the most plausible victim strictly between `t1` and `t2`.
///
/// A candidate must be an unclaimed buy that shares neither sender nor
/// recipient with the attacker legs and touches at least one of
/// `involved_tokens`. The largest buy wins; on equal input the earliest
/// candidate is kept.
pub fn find_victim<'a>(
    candidates: &[ClassifiedTx<'a>],
    t1: &ClassifiedTx<'_>,
    t2: &ClassifiedTx<'_>,
    involved_tokens: &BTreeSet<Address>,
    claimed: &HashSet<B256>,
    reference_asset: Address,
) -> Option<Victim<'a>> {
    let mut best: Option<Victim<'a>> = None;

    for candidate in candidates {
        if candidate.index() <= t1.index() {
            continue;
        }
        if candidate.index() >= t2.index() {
            break;
        }
        if claimed.contains(&candidate.hash()) {
            continue;
        }
        let Some(swap) = candidate.swap.as_ref() else {
            continue;
        };
        let (input_amount, _) = swap.buy_amounts();
        if input_amount.is_zero() {
            continue;
        }

        let tx = candidate.tx;
        if tx.from == t1.tx.from || tx.from == t2.tx.from || tx.to == t1.tx.to || tx.to == t2.tx.to
        {
            tracing::trace!(tx_hash = %tx.hash, "victim candidate shares an attacker address");
            continue;
        }
        if candidate
            .touched_tokens(reference_asset)
            .is_disjoint(involved_tokens)
        {
            continue;
        }

        if best.map_or(true, |current| input_amount > current.input_amount) {
            best = Some(Victim { tx, input_amount });
        }
    }

    best
}

//! Greedy frontrun/backrun pair matching over one block.
//!
//! Eligible transactions are scanned in block order. For each unclaimed
//! frontrun candidate the later unclaimed transactions are tried in order, and
//! the first one that shares a token and passes the gain checks closes the
//! pair. Matching is first-found, not a global optimum: a different pairing
//! could detect more attacks or more total gain in rare ambiguous blocks.

use std::collections::{BTreeSet, HashSet};

use alloy::primitives::{Address, B256, I256};
use sandwich_data::decoder::addresses;
use sandwich_data::types::{Block, Transaction};

use crate::classify::eligible_transactions;
use crate::error::DetectError;
use crate::gain::{compute_gain, GainBreakdown, PairVerdict};
use crate::victim::{find_victim, Victim};

/// Detection settings.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DetectorConfig {
    /// Base asset every eligible swap must involve.
    pub reference_asset: Address,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            reference_asset: addresses::WETH,
        }
    }
}

/// A confirmed attack pair. Immutable once built.
#[derive(Clone, Debug, PartialEq)]
pub struct FrontrunPair<'a> {
    frontrun: &'a Transaction,
    backrun: &'a Transaction,
    victim: Option<Victim<'a>>,
    gain: GainBreakdown,
}

impl<'a> FrontrunPair<'a> {
    /// Builds a pair, checking that all legs share a block and are ordered.
    ///
    /// # Errors
    /// Returns [`DetectError::InconsistentPair`] if the legs come from different
    /// blocks or the victim is not strictly between frontrun and backrun.
    pub fn new(
        frontrun: &'a Transaction,
        backrun: &'a Transaction,
        gain: GainBreakdown,
        victim: Option<Victim<'a>>,
    ) -> Result<Self, DetectError> {
        let inconsistent = |reason: &str| DetectError::InconsistentPair {
            reason: format!("{reason} (frontrun {}, backrun {})", frontrun.hash, backrun.hash),
        };

        if frontrun.block_hash != backrun.block_hash {
            return Err(inconsistent("legs belong to different blocks"));
        }
        if frontrun.index >= backrun.index {
            return Err(inconsistent("frontrun does not precede backrun"));
        }
        if let Some(victim) = victim {
            if victim.tx.block_hash != frontrun.block_hash {
                return Err(inconsistent("victim belongs to another block"));
            }
            if victim.tx.index <= frontrun.index || victim.tx.index >= backrun.index {
                return Err(inconsistent("victim is not between the legs"));
            }
        }

        Ok(Self {
            frontrun,
            backrun,
            victim,
            gain,
        })
    }

    pub fn frontrun(&self) -> &'a Transaction {
        self.frontrun
    }

    pub fn backrun(&self) -> &'a Transaction {
        self.backrun
    }

    pub fn victim(&self) -> Option<Victim<'a>> {
        self.victim
    }

    pub fn gain(&self) -> &GainBreakdown {
        &self.gain
    }

    pub fn net_gain(&self) -> I256 {
        self.gain.net_gain
    }

    /// Hashes of every transaction holding a role in this pair.
    pub fn hashes(&self) -> impl Iterator<Item = B256> + '_ {
        [Some(self.frontrun.hash), Some(self.backrun.hash), self.victim.map(|v| v.tx.hash)]
            .into_iter()
            .flatten()
    }
}

/// Detection result for one block.
#[derive(Clone, Debug, PartialEq)]
pub struct BlockDetection<'a> {
    pub block_number: u64,
    pub block_hash: B256,
    /// Transactions in the block before filtering.
    pub original_tx_count: usize,
    /// Transactions that passed eligibility filtering.
    pub eligible_tx_count: usize,
    /// Confirmed pairs in discovery order.
    pub pairs: Vec<FrontrunPair<'a>>,
}

/// Runs classification, matching and victim search over blocks.
#[derive(Clone, Debug, Default)]
pub struct SandwichDetector {
    config: DetectorConfig,
}

impl SandwichDetector {
    pub fn new(config: DetectorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Detects frontrun/backrun pairs in one block.
    ///
    /// Each transaction takes at most one role in at most one pair. Once a
    /// frontrun candidate is matched it is claimed and the scan moves on to the
    /// next frontrun candidate.
    ///
    /// # Errors
    /// Returns a [`DetectError`] on a consistency breach; no partial result is
    /// returned for the block in that case.
    #[tracing::instrument(skip_all, fields(block_number = block.number))]
    pub fn detect_pairs<'a>(&self, block: &'a Block) -> Result<BlockDetection<'a>, DetectError> {
        let reference_asset = self.config.reference_asset;
        let eligible = eligible_transactions(block, reference_asset);
        let token_sets: Vec<BTreeSet<Address>> = eligible
            .iter()
            .map(|tx| tx.touched_tokens(reference_asset))
            .collect();

        tracing::debug!(
            original = block.transaction_count(),
            eligible = eligible.len(),
            "classified block transactions"
        );

        let mut claimed: HashSet<B256> = HashSet::new();
        let mut pairs = Vec::new();

        for (i, t1) in eligible.iter().enumerate() {
            if claimed.contains(&t1.hash()) {
                continue;
            }

            for (j, t2) in eligible.iter().enumerate().skip(i + 1) {
                if claimed.contains(&t2.hash()) {
                    continue;
                }

                let involved: BTreeSet<Address> = token_sets[i]
                    .intersection(&token_sets[j])
                    .copied()
                    .collect();
                if involved.is_empty() {
                    continue;
                }

                let gain = match compute_gain(t1, t2)? {
                    PairVerdict::Pair(gain) => gain,
                    PairVerdict::NotAPair(reason) => {
                        tracing::trace!(
                            frontrun = %t1.hash(),
                            backrun = %t2.hash(),
                            %reason,
                            "candidate pair rejected"
                        );
                        continue;
                    }
                };

                let victim = find_victim(&eligible, t1, t2, &involved, &claimed, reference_asset);
                let pair = FrontrunPair::new(t1.tx, t2.tx, gain, victim)?;

                tracing::info!(
                    frontrun = %t1.hash(),
                    backrun = %t2.hash(),
                    victim = ?victim.map(|v| v.tx.hash),
                    net_gain_wei = %gain.net_gain,
                    "frontrun pair detected"
                );

                claimed.extend(pair.hashes());
                pairs.push(pair);
                break;
            }
        }

        Ok(BlockDetection {
            block_number: block.number,
            block_hash: block.hash,
            original_tx_count: block.transaction_count(),
            eligible_tx_count: eligible.len(),
            pairs,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gain::gas_cost;
    use alloy::primitives::U256;
    use sandwich_data::types::Receipt;

    fn tx(index: u64, block_hash: B256) -> Transaction {
        Transaction {
            hash: B256::with_last_byte(index as u8),
            block_hash,
            block_number: 1,
            index,
            from: Address::repeat_byte(0xa1),
            to: None,
            gas_limit: 21_000,
            gas_price: 1,
            value: U256::ZERO,
            receipt: Receipt {
                effective_gas_price: 3,
                gas_used: 7,
                status: true,
                logs: Vec::new(),
            },
        }
    }

    fn gain_for(frontrun: &Transaction, backrun: &Transaction) -> GainBreakdown {
        GainBreakdown {
            gross_gain: I256::ZERO,
            frontrun_gas_cost: gas_cost(frontrun),
            backrun_gas_cost: gas_cost(backrun),
            net_gain: I256::ZERO,
            frontrun_amount_in: U256::from(1),
            frontrun_amount_out: U256::from(1),
            backrun_amount_out: U256::from(1),
        }
    }

    #[test]
    fn default_reference_asset_is_weth() {
        assert_eq!(DetectorConfig::default().reference_asset, addresses::WETH);
    }

    #[test]
    fn pair_rejects_mixed_blocks() {
        let t1 = tx(1, B256::repeat_byte(1));
        let t2 = tx(2, B256::repeat_byte(2));
        let err = FrontrunPair::new(&t1, &t2, gain_for(&t1, &t2), None).unwrap_err();

        assert!(matches!(err, DetectError::InconsistentPair { .. }));
    }

    #[test]
    fn pair_rejects_victim_outside_legs() {
        let hash = B256::repeat_byte(1);
        let (t1, t2, outside) = (tx(2, hash), tx(4, hash), tx(5, hash));
        let victim = Victim {
            tx: &outside,
            input_amount: U256::from(1),
        };

        assert!(FrontrunPair::new(&t1, &t2, gain_for(&t1, &t2), Some(victim)).is_err());
    }

    #[test]
    fn pair_lists_all_role_hashes() {
        let hash = B256::repeat_byte(1);
        let (t1, victim_tx, t2) = (tx(2, hash), tx(3, hash), tx(4, hash));
        let victim = Victim {
            tx: &victim_tx,
            input_amount: U256::from(1),
        };
        let pair = FrontrunPair::new(&t1, &t2, gain_for(&t1, &t2), Some(victim))
            .expect("ordered legs in one block");

        let hashes: Vec<B256> = pair.hashes().collect();
        assert_eq!(hashes, vec![t1.hash, t2.hash, victim_tx.hash]);
        assert_eq!(pair.gain().frontrun_gas_cost, U256::from(21));
    }

    #[test]
    fn empty_block_yields_no_pairs() {
        let block = Block {
            number: 9,
            hash: B256::repeat_byte(9),
            timestamp: 0,
            transactions: Vec::new(),
        };
        let detection = SandwichDetector::default()
            .detect_pairs(&block)
            .expect("empty block is consistent");

        assert_eq!(detection.original_tx_count, 0);
        assert_eq!(detection.eligible_tx_count, 0);
        assert!(detection.pairs.is_empty());
    }
}

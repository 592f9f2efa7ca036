//! Receipt log decoder using compile-time event ABIs.
//!
//! Logs are matched by `topic0` against a fixed set of `alloy::sol!` event
//! definitions instead of ABIs fetched from a block explorer at runtime. A log
//! whose signature is unknown, or whose payload fails to decode, becomes
//! [`ReceiptLog::Undecodable`] and is ignored by classification.
//!
//! Uniswap V3 `Swap` is decoded under the name `Swap` with its own argument
//! shape, so downstream it is seen as a non-standard swap.

use std::collections::BTreeMap;

use alloy::primitives::{Address, Log};
use alloy::sol_types::SolEvent;

use crate::types::{DecodedLog, ReceiptLog};

/// Ethereum mainnet contract addresses (compile-time constants).
pub mod addresses {
    use alloy::primitives::Address;

    /// Wrapped Ether (WETH) on mainnet
    pub const WETH: Address =
        alloy::primitives::address!("C02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2");
}

/// Compile-time event definitions.
pub mod events {
    use alloy::sol;

    sol! {
        interface IUniswapV2Pair {
            event Swap(
                address indexed sender,
                uint256 amount0In,
                uint256 amount1In,
                uint256 amount0Out,
                uint256 amount1Out,
                address indexed to
            );

            event Sync(uint112 reserve0, uint112 reserve1);
        }

        interface IUniswapV3Pool {
            event Swap(
                address indexed sender,
                address indexed recipient,
                int256 amount0,
                int256 amount1,
                uint160 sqrtPriceX96,
                uint128 liquidity,
                int24 tick
            );
        }

        interface IERC20 {
            event Transfer(address indexed from, address indexed to, uint256 value);

            event Approval(address indexed owner, address indexed spender, uint256 value);
        }

        interface IWETH9 {
            event Deposit(address indexed dst, uint256 wad);

            event Withdrawal(address indexed src, uint256 wad);
        }
    }
}

use events::{IUniswapV2Pair, IUniswapV3Pool, IERC20, IWETH9};

fn addr_text(address: Address) -> String {
    format!("{address:#x}")
}

fn args<const N: usize>(pairs: [(&str, String); N]) -> BTreeMap<String, String> {
    pairs
        .into_iter()
        .map(|(key, value)| (key.to_string(), value))
        .collect()
}

fn undecodable(log: &Log) -> ReceiptLog {
    ReceiptLog::Undecodable {
        address: log.address,
        topic0: log.data.topics().first().copied(),
    }
}

fn decode_named(log: &Log) -> Option<(&'static str, BTreeMap<String, String>)> {
    let topic0 = *log.data.topics().first()?;

    if topic0 == IUniswapV2Pair::Swap::SIGNATURE_HASH {
        let event = IUniswapV2Pair::Swap::decode_log_data(&log.data, true).ok()?;
        return Some((
            "Swap",
            args([
                ("sender", addr_text(event.sender)),
                ("amount0In", event.amount0In.to_string()),
                ("amount1In", event.amount1In.to_string()),
                ("amount0Out", event.amount0Out.to_string()),
                ("amount1Out", event.amount1Out.to_string()),
                ("to", addr_text(event.to)),
            ]),
        ));
    }
    if topic0 == IUniswapV3Pool::Swap::SIGNATURE_HASH {
        let event = IUniswapV3Pool::Swap::decode_log_data(&log.data, true).ok()?;
        return Some((
            "Swap",
            args([
                ("sender", addr_text(event.sender)),
                ("recipient", addr_text(event.recipient)),
                ("amount0", event.amount0.to_string()),
                ("amount1", event.amount1.to_string()),
                ("sqrtPriceX96", event.sqrtPriceX96.to_string()),
                ("liquidity", event.liquidity.to_string()),
                ("tick", event.tick.to_string()),
            ]),
        ));
    }
    if topic0 == IERC20::Transfer::SIGNATURE_HASH {
        let event = IERC20::Transfer::decode_log_data(&log.data, true).ok()?;
        return Some((
            "Transfer",
            args([
                ("from", addr_text(event.from)),
                ("to", addr_text(event.to)),
                ("value", event.value.to_string()),
            ]),
        ));
    }
    if topic0 == IERC20::Approval::SIGNATURE_HASH {
        let event = IERC20::Approval::decode_log_data(&log.data, true).ok()?;
        return Some((
            "Approval",
            args([
                ("owner", addr_text(event.owner)),
                ("spender", addr_text(event.spender)),
                ("value", event.value.to_string()),
            ]),
        ));
    }
    if topic0 == IWETH9::Deposit::SIGNATURE_HASH {
        let event = IWETH9::Deposit::decode_log_data(&log.data, true).ok()?;
        return Some((
            "Deposit",
            args([
                ("dst", addr_text(event.dst)),
                ("wad", event.wad.to_string()),
            ]),
        ));
    }
    if topic0 == IWETH9::Withdrawal::SIGNATURE_HASH {
        let event = IWETH9::Withdrawal::decode_log_data(&log.data, true).ok()?;
        return Some((
            "Withdrawal",
            args([
                ("src", addr_text(event.src)),
                ("wad", event.wad.to_string()),
            ]),
        ));
    }
    if topic0 == IUniswapV2Pair::Sync::SIGNATURE_HASH {
        let event = IUniswapV2Pair::Sync::decode_log_data(&log.data, true).ok()?;
        return Some((
            "Sync",
            args([
                ("reserve0", event.reserve0.to_string()),
                ("reserve1", event.reserve1.to_string()),
            ]),
        ));
    }

    None
}

/// Decode one raw receipt log.
///
/// Never fails: anything that cannot be matched to a known event is returned
/// as [`ReceiptLog::Undecodable`].
pub fn decode_log(log_index: u64, log: &Log) -> ReceiptLog {
    match decode_named(log) {
        Some((event, args)) => ReceiptLog::Decoded(DecodedLog {
            log_index,
            address: log.address,
            event: event.to_string(),
            args,
        }),
        None => {
            tracing::trace!(address = %log.address, log_index, "undecodable log");
            undecodable(log)
        }
    }
}

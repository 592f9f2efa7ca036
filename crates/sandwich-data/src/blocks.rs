//! Alloy RPC provider integration for fetching blocks with decoded receipts.
//!
//! Endpoints are carried in an explicit [`RpcEndpoints`] value. When one
//! endpoint keeps failing the fetcher rotates to the next one.

use alloy::consensus::Transaction as _;
use alloy::network::Ethereum;
use alloy::primitives::B256;
use alloy::providers::fillers::FillProvider;
use alloy::providers::{Provider, ProviderBuilder};
use alloy::rpc::types::eth::{BlockId, BlockNumberOrTag};
use eyre::{eyre, Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::decoder::decode_log;
use crate::types::{Block, Receipt, Transaction};

/// Environment variable holding comma-separated RPC URLs.
pub const RPC_URLS_ENV: &str = "SANDWICH_RPC_URLS";

const ATTEMPTS_PER_ENDPOINT: u32 = 3;
const BASE_BACKOFF_MS: u64 = 500;

type ProviderType = FillProvider<
    alloy::providers::fillers::JoinFill<
        alloy::providers::Identity,
        alloy::providers::fillers::JoinFill<
            alloy::providers::fillers::GasFiller,
            alloy::providers::fillers::JoinFill<
                alloy::providers::fillers::BlobGasFiller,
                alloy::providers::fillers::JoinFill<
                    alloy::providers::fillers::NonceFiller,
                    alloy::providers::fillers::ChainIdFiller,
                >,
            >,
        >,
    >,
    alloy::providers::RootProvider<Ethereum>,
>;

/// Ordered list of RPC endpoints, tried in turn.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RpcEndpoints {
    urls: Vec<String>,
}

impl RpcEndpoints {
    /// Builds an endpoint list, dropping blank entries.
    ///
    /// # Errors
    /// Returns error if no usable URL remains.
    pub fn new<I, S>(urls: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let urls: Vec<String> = urls
            .into_iter()
            .map(|url| url.as_ref().trim().to_string())
            .filter(|url| !url.is_empty())
            .collect();
        if urls.is_empty() {
            return Err(eyre!("at least one RPC URL is required"));
        }
        Ok(Self { urls })
    }

    /// Parses a comma-separated URL list.
    ///
    /// # Errors
    /// Returns error if the list contains no URL.
    pub fn parse(list: &str) -> Result<Self> {
        Self::new(list.split(','))
    }

    /// Reads endpoints from [`RPC_URLS_ENV`].
    ///
    /// # Errors
    /// Returns error if the variable is unset or empty.
    pub fn from_env() -> Result<Self> {
        let list = std::env::var(RPC_URLS_ENV)
            .wrap_err_with(|| format!("{RPC_URLS_ENV} is required for RPC access"))?;
        Self::parse(&list)
    }

    /// Configured URLs in priority order.
    pub fn urls(&self) -> &[String] {
        &self.urls
    }
}

/// Fetches full blocks with receipts and decodes their logs.
pub struct BlockFetcher {
    providers: Vec<(String, Arc<ProviderType>)>,
    active: AtomicUsize,
}

impl BlockFetcher {
    /// Creates a fetcher and tests connectivity of every endpoint.
    ///
    /// Endpoints that fail the `eth_blockNumber` probe are logged and left out.
    ///
    /// # Errors
    /// Returns error if a URL is malformed or no endpoint answers.
    #[tracing::instrument(skip_all, fields(endpoints = endpoints.urls().len()))]
    pub async fn new(endpoints: &RpcEndpoints) -> Result<Self> {
        let mut providers = Vec::new();
        for url in endpoints.urls() {
            let provider =
                ProviderBuilder::new().on_http(url.parse().wrap_err("invalid RPC URL format")?);
            let provider = Arc::new(provider);

            match provider.get_block_number().await {
                Ok(latest_block) => {
                    tracing::info!(rpc_url = %url, latest_block, "RPC connection successful");
                    providers.push((url.clone(), provider));
                }
                Err(e) => {
                    tracing::warn!(rpc_url = %url, error = %e, "RPC endpoint unreachable, skipping");
                }
            }
        }

        if providers.is_empty() {
            return Err(eyre!("no reachable RPC endpoint"));
        }

        Ok(Self {
            providers,
            active: AtomicUsize::new(0),
        })
    }

    /// URL of the endpoint currently in use.
    pub fn active_url(&self) -> &str {
        let idx = self.active.load(Ordering::Relaxed) % self.providers.len();
        &self.providers[idx].0
    }

    /// Fetches one block with all transactions and decoded receipts.
    ///
    /// Returns `Ok(None)` if the block does not exist.
    ///
    /// # Errors
    /// Returns error if an RPC call fails or a receipt is missing.
    #[tracing::instrument(skip(self), fields(rpc_url = %self.active_url()))]
    pub async fn fetch_block(&self, block_number: u64) -> Result<Option<Block>> {
        let idx = self.active.load(Ordering::Relaxed) % self.providers.len();
        let provider = self.providers[idx].1.clone();

        let rpc_block = provider
            .get_block(BlockId::Number(BlockNumberOrTag::Number(block_number)))
            .full()
            .await
            .wrap_err_with(|| format!("failed to fetch block {block_number}"))?;

        let rpc_block = match rpc_block {
            Some(block) => block,
            None => {
                tracing::debug!(block_number, "block not found");
                return Ok(None);
            }
        };

        let rpc_txs: Vec<_> = rpc_block.transactions.txns().cloned().collect();
        let tx_hashes: Vec<B256> = rpc_block.transactions.hashes().collect();

        let receipts = futures::future::try_join_all(tx_hashes.iter().map(|hash| {
            let provider = provider.clone();
            async move {
                provider
                    .get_transaction_receipt(*hash)
                    .await
                    .wrap_err_with(|| format!("failed to fetch receipt {hash}"))
            }
        }))
        .await?;

        let block_hash = rpc_block.header.hash;
        let mut transactions = Vec::with_capacity(rpc_txs.len());
        for (idx, (rpc_tx, receipt_opt)) in rpc_txs.iter().zip(receipts).enumerate() {
            let receipt = receipt_opt
                .ok_or_else(|| eyre!("receipt not found for transaction {}", tx_hashes[idx]))?;

            let logs = receipt
                .inner
                .logs()
                .iter()
                .enumerate()
                .map(|(pos, log)| {
                    let log_index = log.log_index.unwrap_or(pos as u64);
                    decode_log(log_index, &log.inner)
                })
                .collect();

            transactions.push(Transaction {
                hash: tx_hashes[idx],
                block_hash,
                block_number,
                index: receipt.transaction_index.unwrap_or(idx as u64),
                from: receipt.from,
                to: receipt.to,
                gas_limit: rpc_tx.gas_limit(),
                gas_price: rpc_tx
                    .gas_price()
                    .unwrap_or_else(|| rpc_tx.max_fee_per_gas()),
                value: rpc_tx.value(),
                receipt: Receipt {
                    effective_gas_price: receipt.effective_gas_price,
                    gas_used: receipt.gas_used,
                    status: receipt.status(),
                    logs,
                },
            });
        }

        Ok(Some(Block {
            number: rpc_block.header.number,
            hash: block_hash,
            timestamp: rpc_block.header.timestamp,
            transactions,
        }))
    }

    /// Fetches one block, retrying with backoff and rotating endpoints.
    ///
    /// Each endpoint gets up to 3 attempts with exponential backoff starting
    /// at 500ms before the next endpoint is tried.
    ///
    /// # Errors
    /// Returns the last error once every endpoint is exhausted.
    pub async fn fetch_block_with_retry(&self, block_number: u64) -> Result<Option<Block>> {
        let mut last_err = None;
        for _ in 0..self.providers.len() {
            for attempt in 0..ATTEMPTS_PER_ENDPOINT {
                match self.fetch_block(block_number).await {
                    Ok(block) => return Ok(block),
                    Err(e) => {
                        let backoff_ms = BASE_BACKOFF_MS * 2_u64.pow(attempt);
                        tracing::debug!(
                            block_number,
                            attempt = attempt + 1,
                            backoff_ms,
                            error = %e,
                            "retrying failed block fetch"
                        );
                        last_err = Some(e);
                        if attempt + 1 < ATTEMPTS_PER_ENDPOINT {
                            tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                        }
                    }
                }
            }
            self.rotate();
        }

        Err(last_err.unwrap_or_else(|| eyre!("no RPC endpoint configured")))
    }

    /// Fetches a list of blocks in order, skipping missing ones.
    ///
    /// # Errors
    /// Returns error if a block cannot be fetched from any endpoint.
    #[tracing::instrument(skip_all, fields(blocks = block_numbers.len()))]
    pub async fn fetch_blocks(&self, block_numbers: &[u64]) -> Result<Vec<Block>> {
        let pb = ProgressBar::new(block_numbers.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} blocks")
                .wrap_err("failed to create progress style")?,
        );

        let mut blocks = Vec::with_capacity(block_numbers.len());
        for &block_number in block_numbers {
            match self.fetch_block_with_retry(block_number).await? {
                Some(block) => {
                    pb.set_message(format!("{} txs", block.transaction_count()));
                    blocks.push(block);
                }
                None => tracing::warn!(block_number, "block not found in RPC"),
            }
            pb.inc(1);
        }

        pb.finish_with_message("✓ Fetched all blocks");
        Ok(blocks)
    }

    fn rotate(&self) {
        let next = self.active.fetch_add(1, Ordering::Relaxed) + 1;
        let idx = next % self.providers.len();
        tracing::warn!(rpc_url = %self.providers[idx].0, "switching RPC endpoint");
    }
}

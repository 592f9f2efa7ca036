use alloy::primitives::{Address, I256};
use clap::{ArgAction, Args, Parser, Subcommand};
use color_eyre::eyre::{eyre, Context, Result};
use comfy_table::presets::UTF8_BORDERS_ONLY;
use comfy_table::Table;
use indicatif::{ProgressBar, ProgressStyle};
use sandwich_analysis::report::{format_eth, pair_records, range_totals, summarize, RangeTotals};
use sandwich_analysis::{BlockDetection, DetectorConfig, SandwichDetector};
use sandwich_data::blocks::{BlockFetcher, RpcEndpoints, RPC_URLS_ENV};
use sandwich_data::decoder::addresses;
use sandwich_data::export::{
    append_pairs_csv, load_blocks, read_block_numbers, save_blocks, write_pair_json,
    write_pairs_csv, PairDocument,
};
use sandwich_data::store::Store;
use sandwich_data::types::{Block, BlockSummary, GainExtreme, PairRecord};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, Level};
use tracing_subscriber::EnvFilter;

const AGGREGATE_CSV: &str = "frontrun_records.csv";

#[derive(Debug, Clone)]
struct AppContext {
    db_path: String,
    rpc_endpoints: Option<RpcEndpoints>,
    detector: DetectorConfig,
}

impl AppContext {
    /// Endpoints from `--rpc-url` flags, falling back to the environment.
    fn endpoints(&self, flags: &[String]) -> Result<RpcEndpoints> {
        if !flags.is_empty() {
            return RpcEndpoints::new(flags);
        }
        self.rpc_endpoints
            .clone()
            .ok_or_else(|| eyre!("{RPC_URLS_ENV} or --rpc-url is required for RPC access"))
    }
}

#[derive(Parser, Debug)]
#[command(name = "sandwich-scan")]
#[command(about = "Detect sandwich (frontrun/backrun) attacks in Ethereum blocks")]
#[command(version)]
struct Cli {
    #[arg(long, short = 'v', action = ArgAction::Count, global = true)]
    verbose: u8,

    #[arg(long, short = 'q', global = true)]
    quiet: bool,

    #[arg(long, global = true, default_value = "data/sandwich.sqlite")]
    db_path: String,

    /// Base asset every eligible swap must involve (defaults to mainnet WETH).
    #[arg(long, global = true)]
    reference_asset: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Fetch blocks with decoded receipts over RPC into a JSON file.
    Fetch(FetchArgs),
    /// Run sandwich detection over blocks.
    Detect(DetectArgs),
    /// Show stored detection summaries.
    Status(StatusArgs),
}

/// Block selection shared by `fetch` and `detect`.
#[derive(Args, Debug)]
struct BlockSelection {
    #[arg(long, requires = "end_block")]
    start_block: Option<u64>,

    /// Ending block number (inclusive).
    #[arg(long, requires = "start_block")]
    end_block: Option<u64>,

    /// CSV file with a `block_number` column.
    #[arg(long, conflicts_with_all = ["start_block", "end_block"])]
    blocks_file: Option<PathBuf>,
}

impl BlockSelection {
    fn is_empty(&self) -> bool {
        self.start_block.is_none() && self.blocks_file.is_none()
    }

    fn block_numbers(&self) -> Result<Vec<u64>> {
        if let Some(path) = &self.blocks_file {
            return read_block_numbers(path);
        }
        match (self.start_block, self.end_block) {
            (Some(start), Some(end)) if start > end => Err(eyre!(
                "invalid range: start-block {} is greater than end-block {}",
                start,
                end
            )),
            (Some(start), Some(end)) => Ok((start..=end).collect()),
            _ => Err(eyre!(
                "select blocks with --start-block/--end-block or --blocks-file"
            )),
        }
    }
}

#[derive(Args, Debug)]
struct FetchArgs {
    #[command(flatten)]
    blocks: BlockSelection,

    /// Output JSON file.
    #[arg(long)]
    out: PathBuf,

    /// RPC endpoint, repeatable; tried in order.
    #[arg(long)]
    rpc_url: Vec<String>,
}

#[derive(Args, Debug)]
struct DetectArgs {
    /// JSON file of previously fetched blocks.
    #[arg(long, conflicts_with_all = ["start_block", "end_block", "blocks_file"])]
    input: Option<PathBuf>,

    #[command(flatten)]
    blocks: BlockSelection,

    /// Skip blocks numbered below this one.
    #[arg(long)]
    start_from: Option<u64>,

    /// Continue after the highest block already stored.
    #[arg(long, conflicts_with = "start_from")]
    resume: bool,

    /// Directory for per-block CSV/JSON files and the aggregate CSV.
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Output format: table (default) or json.
    #[arg(long, default_value = "table")]
    output: String,

    /// RPC endpoint, repeatable; tried in order.
    #[arg(long)]
    rpc_url: Vec<String>,
}

#[derive(Args, Debug)]
struct StatusArgs {
    #[arg(long)]
    block: Option<u64>,
}

/// Detection output of one block.
#[derive(Debug, Serialize)]
struct BlockReport {
    summary: BlockSummary,
    pairs: Vec<PairRecord>,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet)?;

    let reference_asset = match cli.reference_asset.as_deref() {
        Some(text) => text
            .parse::<Address>()
            .wrap_err_with(|| format!("invalid reference asset address '{text}'"))?,
        None => addresses::WETH,
    };

    let ctx = AppContext {
        db_path: cli.db_path,
        rpc_endpoints: RpcEndpoints::from_env().ok(),
        detector: DetectorConfig { reference_asset },
    };

    match cli.command {
        Commands::Fetch(args) => handle_fetch(&ctx, args).await,
        Commands::Detect(args) => handle_detect(&ctx, args).await,
        Commands::Status(args) => handle_status(&ctx, args).await,
    }
}

fn init_tracing(verbose: u8, quiet: bool) -> Result<()> {
    let level = if quiet {
        Level::WARN
    } else {
        match verbose {
            0 => Level::INFO,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        }
    };

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level.as_str()))
        .wrap_err("failed to initialize tracing filter")?;

    tracing_subscriber::fmt().with_env_filter(filter).init();
    Ok(())
}

async fn handle_fetch(ctx: &AppContext, args: FetchArgs) -> Result<()> {
    let block_numbers = args.blocks.block_numbers()?;
    let endpoints = ctx.endpoints(&args.rpc_url)?;
    let fetcher = BlockFetcher::new(&endpoints).await?;

    let blocks = fetcher.fetch_blocks(&block_numbers).await?;
    if let Some(parent) = args.out.parent() {
        ensure_dir(parent)?;
    }
    save_blocks(&args.out, &blocks)?;

    info!(
        requested = block_numbers.len(),
        fetched = blocks.len(),
        out = %args.out.display(),
        "fetch command completed"
    );

    Ok(())
}

async fn handle_detect(ctx: &AppContext, args: DetectArgs) -> Result<()> {
    if let Some(parent) = Path::new(&ctx.db_path).parent() {
        ensure_dir(parent)?;
    }
    let store = Store::new(&ctx.db_path).wrap_err("failed to open SQLite store")?;
    let detector = SandwichDetector::new(ctx.detector);

    let start_from = if args.resume {
        store.latest_block()?.map(|latest| latest + 1)
    } else {
        args.start_from
    };
    if let Some(dir) = &args.output_dir {
        ensure_dir(dir)?;
    }

    let mut reports = Vec::new();

    if let Some(input) = &args.input {
        let blocks = load_blocks(input)?;
        let pb = block_progress(blocks.len() as u64)?;
        for block in blocks
            .iter()
            .filter(|block| start_from.map_or(true, |from| block.number >= from))
        {
            if let Some(report) = analyze_block(&detector, &store, block, &args)? {
                reports.push(report);
            }
            pb.inc(1);
        }
        pb.finish_and_clear();
    } else {
        if args.blocks.is_empty() {
            return Err(eyre!(
                "select blocks with --input, --start-block/--end-block or --blocks-file"
            ));
        }
        let block_numbers: Vec<u64> = args
            .blocks
            .block_numbers()?
            .into_iter()
            .filter(|number| start_from.map_or(true, |from| *number >= from))
            .collect();
        let endpoints = ctx.endpoints(&args.rpc_url)?;
        let fetcher = BlockFetcher::new(&endpoints).await?;

        let pb = block_progress(block_numbers.len() as u64)?;
        for block_number in block_numbers {
            match fetcher.fetch_block_with_retry(block_number).await? {
                Some(block) => {
                    if let Some(report) = analyze_block(&detector, &store, &block, &args)? {
                        reports.push(report);
                    }
                }
                None => tracing::warn!(block_number, "block not found in RPC"),
            }
            pb.inc(1);
        }
        pb.finish_and_clear();
    }

    let summaries: Vec<BlockSummary> = reports.iter().map(|r| r.summary.clone()).collect();
    let totals = range_totals(&summaries);

    match args.output.to_lowercase().as_str() {
        "table" => print_detection_table(&reports, &totals),
        "json" => {
            let json = serde_json::to_string_pretty(&reports).wrap_err("failed to serialize JSON")?;
            println!("{json}");
        }
        _ => {
            return Err(eyre!(
                "unknown output format '{}'; use 'table' or 'json'",
                args.output
            ))
        }
    }

    info!(
        blocks_analyzed = totals.blocks_analyzed,
        transactions_scanned = totals.transactions_scanned,
        attacks = totals.attacks,
        victims = totals.victims,
        "detect command completed"
    );

    Ok(())
}

fn block_progress(len: u64) -> Result<ProgressBar> {
    let pb = ProgressBar::new(len);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} blocks")
            .wrap_err("failed to create progress style")?,
    );
    Ok(pb)
}

/// Detects, persists and exports one block.
///
/// A consistency error aborts only this block; it is logged and `None` is
/// returned so the run can continue.
fn analyze_block(
    detector: &SandwichDetector,
    store: &Store,
    block: &Block,
    args: &DetectArgs,
) -> Result<Option<BlockReport>> {
    let started = Instant::now();
    let detection = match detector.detect_pairs(block) {
        Ok(detection) => detection,
        Err(e) => {
            tracing::error!(block_number = block.number, error = %e, "detection aborted for block");
            return Ok(None);
        }
    };

    let records = pair_records(&detection);
    let summary = summarize(&detection);
    store
        .insert_detection(&summary, &records)
        .wrap_err_with(|| format!("failed to store detection for block {}", block.number))?;

    if let Some(dir) = &args.output_dir {
        write_block_outputs(dir, &detection, &records)?;
        append_pairs_csv(&dir.join(AGGREGATE_CSV), &records)?;
    }

    info!(
        block_number = block.number,
        transactions = summary.original_tx_count,
        eligible = summary.eligible_tx_count,
        attacks = summary.attack_count,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "block analyzed"
    );

    Ok(Some(BlockReport {
        summary,
        pairs: records,
    }))
}

/// Writes `block_<n>/block_<n>_stats.csv` and one `<attack>.json` per pair.
fn write_block_outputs(
    dir: &Path,
    detection: &BlockDetection<'_>,
    records: &[PairRecord],
) -> Result<()> {
    if detection.pairs.is_empty() {
        return Ok(());
    }

    let name = format!("block_{}", detection.block_number);
    let block_dir = dir.join(&name);
    ensure_dir(&block_dir)?;
    write_pairs_csv(&block_dir.join(format!("{name}_stats.csv")), records)?;

    for (idx, pair) in detection.pairs.iter().enumerate() {
        let victim = pair.victim();
        let document = PairDocument {
            t1: pair.frontrun(),
            t2: pair.backrun(),
            net_gains: pair.net_gain().to_string(),
            tv: victim.map(|v| v.tx),
            tv_input_amount: victim.map(|v| v.input_amount.to_string()),
        };
        write_pair_json(&block_dir, idx + 1, &document)?;
    }
    Ok(())
}

fn print_detection_table(reports: &[BlockReport], totals: &RangeTotals) {
    let mut pairs_table = Table::new();
    pairs_table.load_preset(UTF8_BORDERS_ONLY);
    pairs_table.set_header(vec![
        "Block", "Attack#", "Frontrun", "Backrun", "Victim", "Net Gain",
    ]);

    for report in reports {
        for (idx, record) in report.pairs.iter().enumerate() {
            pairs_table.add_row(vec![
                record.block_number.to_string(),
                (idx + 1).to_string(),
                truncate_hash(&record.frontrun_hash),
                truncate_hash(&record.backrun_hash),
                if record.victim_hash.is_empty() {
                    "-".to_string()
                } else {
                    truncate_hash(&record.victim_hash)
                },
                format_wei(&record.net_gain_wei),
            ]);
        }
    }

    let mut summary_table = Table::new();
    summary_table.load_preset(UTF8_BORDERS_ONLY);
    summary_table.set_header(vec![
        "Block",
        "Txs",
        "Eligible",
        "Attacks",
        "Attack %",
        "Max Gain",
        "Min Gain",
        "Victims",
        "Max Victim Input",
    ]);

    for report in reports {
        let s = &report.summary;
        let extreme = |gain: &Option<GainExtreme>| {
            gain.as_ref()
                .map(|g| format!("{} (#{})", format_wei(&g.gain_wei), g.attack_number))
                .unwrap_or_else(|| "-".to_string())
        };
        summary_table.add_row(vec![
            s.block_number.to_string(),
            s.original_tx_count.to_string(),
            s.eligible_tx_count.to_string(),
            s.attack_count.to_string(),
            format!("{:.4}%", s.attack_percentage),
            extreme(&s.max_gain),
            extreme(&s.min_gain),
            s.victim_count.to_string(),
            format_wei(&s.max_victim_input_wei),
        ]);
    }

    if totals.attacks > 0 {
        println!("\n{}\n", pairs_table);
    }
    println!("{}\n", summary_table);

    println!("Summary (blocks: {}):", totals.blocks_analyzed);
    println!("  Transactions scanned: {}", totals.transactions_scanned);
    println!("  Eligible swaps:       {}", totals.eligible_transactions);
    println!("  Attacks found:        {}", totals.attacks);
    println!("  Victims identified:   {}", totals.victims);
}

async fn handle_status(ctx: &AppContext, args: StatusArgs) -> Result<()> {
    let store = Store::new(&ctx.db_path).wrap_err("failed to open SQLite store")?;

    if let Some(block_number) = args.block {
        let summary = store
            .get_summary(block_number)?
            .ok_or_else(|| eyre!("block {block_number} has not been analyzed"))?;
        let pairs = store.get_pairs_for_block(block_number)?;
        print_detection_table(
            &[BlockReport { summary: summary.clone(), pairs }],
            &range_totals(&[summary]),
        );
        return Ok(());
    }

    let latest = store.latest_block().wrap_err("failed to query latest block")?;
    let summaries = match latest {
        Some(latest) => store.summary_range(0, latest)?,
        None => Vec::new(),
    };
    let totals = range_totals(&summaries);

    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["Metric", "Value"]);

    table.add_row(vec!["Database Path", ctx.db_path.as_str()]);
    match (summaries.first(), latest) {
        (Some(first), Some(latest)) => {
            table.add_row(vec!["Blocks Analyzed", &totals.blocks_analyzed.to_string()]);
            table.add_row(vec![
                "Block Range",
                &format!("{} - {}", first.block_number, latest),
            ]);
        }
        _ => {
            table.add_row(vec!["Blocks Analyzed", "0"]);
            table.add_row(vec!["Block Range", "No blocks in database"]);
        }
    }
    table.add_row(vec![
        "Transactions Scanned",
        &totals.transactions_scanned.to_string(),
    ]);
    table.add_row(vec!["Attacks", &totals.attacks.to_string()]);
    table.add_row(vec!["Victims", &totals.victims.to_string()]);

    println!("\n{}\n", table);

    info!(
        blocks = totals.blocks_analyzed,
        attacks = totals.attacks,
        db_path = %ctx.db_path,
        "status command completed"
    );

    Ok(())
}

/// Decimal Wei text as ETH, or the raw text if it does not parse.
fn format_wei(wei: &str) -> String {
    wei.parse::<I256>()
        .map(format_eth)
        .unwrap_or_else(|_| wei.to_string())
}

/// Truncate a hex hash/address for compact table display.
fn truncate_hash(hash: &str) -> String {
    if hash.len() > 14 {
        format!("{}…{}", &hash[..8], &hash[hash.len() - 4..])
    } else {
        hash.to_string()
    }
}

fn ensure_dir(path: &Path) -> Result<()> {
    if path.as_os_str().is_empty() {
        return Ok(());
    }
    std::fs::create_dir_all(path)
        .wrap_err_with(|| format!("failed to create directory {}", path.display()))?;
    Ok(())
}

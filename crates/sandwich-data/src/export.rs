//! File formats for offline analysis input and detection output.
//!
//! - decoded blocks as a pretty JSON array (analysis input),
//! - block number lists as CSV with a `block_number` header,
//! - pair records as CSV, one row per detected pair,
//! - one JSON document per detected pair.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use eyre::{eyre, Context, Result};
use serde::Serialize;

use crate::types::{Block, PairRecord, Transaction};

/// Header of the pair-record CSV files.
pub const PAIRS_CSV_HEADER: &str = "block_num,t1,t1_from,t1_to,t1_gas_cost_wei,t2,t2_from,t2_to,t2_gas_cost_wei,net_gains_wei,tv,tv_input_amount_wei";

/// Loads decoded blocks from a JSON array file.
///
/// # Errors
/// Returns error if the file cannot be read or is not a JSON block array.
pub fn load_blocks(path: &Path) -> Result<Vec<Block>> {
    let file =
        File::open(path).wrap_err_with(|| format!("failed to open {}", path.display()))?;
    serde_json::from_reader(BufReader::new(file))
        .wrap_err_with(|| format!("{} is not a JSON array of blocks", path.display()))
}

/// Saves decoded blocks as a pretty JSON array.
///
/// # Errors
/// Returns error if the file cannot be written.
pub fn save_blocks(path: &Path, blocks: &[Block]) -> Result<()> {
    let file =
        File::create(path).wrap_err_with(|| format!("failed to create {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, blocks).wrap_err("failed to serialize blocks")?;
    writer.flush()?;
    Ok(())
}

/// Reads block numbers from a CSV file with a `block_number` column.
///
/// Blank lines are skipped. Other columns are ignored.
///
/// # Errors
/// Returns error if the header lacks `block_number` or a value is not a number.
pub fn read_block_numbers(path: &Path) -> Result<Vec<u64>> {
    let file =
        File::open(path).wrap_err_with(|| format!("failed to open {}", path.display()))?;
    let mut lines = BufReader::new(file).lines();

    let header = lines
        .next()
        .ok_or_else(|| eyre!("{} is empty", path.display()))??;
    let column = header
        .split(',')
        .position(|name| name.trim() == "block_number")
        .ok_or_else(|| eyre!("{} has no block_number column", path.display()))?;

    let mut numbers = Vec::new();
    for (line_number, line) in lines.enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let value = line
            .split(',')
            .nth(column)
            .ok_or_else(|| eyre!("line {} is missing block_number", line_number + 2))?;
        let number = value.trim().parse::<u64>().wrap_err_with(|| {
            format!("invalid block number '{}' on line {}", value, line_number + 2)
        })?;
        numbers.push(number);
    }

    Ok(numbers)
}

fn csv_row(record: &PairRecord) -> String {
    [
        record.block_number.to_string(),
        record.frontrun_hash.clone(),
        record.frontrun_from.clone(),
        record.frontrun_to.clone(),
        record.frontrun_gas_cost_wei.clone(),
        record.backrun_hash.clone(),
        record.backrun_from.clone(),
        record.backrun_to.clone(),
        record.backrun_gas_cost_wei.clone(),
        record.net_gain_wei.clone(),
        record.victim_hash.clone(),
        record.victim_input_wei.clone(),
    ]
    .join(",")
}

/// Writes pair records as CSV, replacing any existing file.
///
/// # Errors
/// Returns error if the file cannot be written.
pub fn write_pairs_csv(path: &Path, records: &[PairRecord]) -> Result<()> {
    let file =
        File::create(path).wrap_err_with(|| format!("failed to create {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    writeln!(writer, "{PAIRS_CSV_HEADER}")?;
    for record in records {
        writeln!(writer, "{}", csv_row(record))?;
    }
    writer.flush()?;
    Ok(())
}

/// Appends pair records to a CSV file, writing the header if the file is new.
///
/// # Errors
/// Returns error if the file cannot be opened or written.
pub fn append_pairs_csv(path: &Path, records: &[PairRecord]) -> Result<()> {
    let is_new = !path.exists();
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .wrap_err_with(|| format!("failed to open {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    if is_new {
        writeln!(writer, "{PAIRS_CSV_HEADER}")?;
    }
    for record in records {
        writeln!(writer, "{}", csv_row(record))?;
    }
    writer.flush()?;
    Ok(())
}

/// JSON document written for one detected pair.
#[derive(Debug, Serialize)]
pub struct PairDocument<'a> {
    /// Frontrun transaction.
    pub t1: &'a Transaction,
    /// Backrun transaction.
    pub t2: &'a Transaction,
    /// Net gain in Wei (decimal text).
    pub net_gains: String,
    /// Victim transaction, if identified.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tv: Option<&'a Transaction>,
    /// Victim input amount in Wei (decimal text), if identified.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tv_input_amount: Option<String>,
}

/// Writes one pair document to `dir/{attack_number}.json`.
///
/// # Errors
/// Returns error if the file cannot be written.
pub fn write_pair_json(
    dir: &Path,
    attack_number: usize,
    document: &PairDocument<'_>,
) -> Result<PathBuf> {
    let path = dir.join(format!("{attack_number}.json"));
    let file =
        File::create(&path).wrap_err_with(|| format!("failed to create {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, document)
        .wrap_err("failed to serialize pair document")?;
    writer.flush()?;
    Ok(path)
}

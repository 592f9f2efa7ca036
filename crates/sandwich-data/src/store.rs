//! SQLite storage layer for detection results.
//!
//! Uses WAL mode for concurrent read performance and prepared statements
//! for batch insert throughput. Re-running detection on a block replaces its
//! earlier rows.

use chrono::Utc;
use eyre::{Context, Result};
use rusqlite::{Connection, OptionalExtension, Row};
use std::cell::RefCell;

use crate::types::{BlockSummary, FrequentAddresses, GainExtreme, PairRecord};

pub struct Store {
    conn: RefCell<Connection>,
}

const SUMMARY_COLUMNS: &str = "
    block_number, original_tx_count, eligible_tx_count, attack_count,
    attack_percentage, max_gain_wei, max_gain_attack, min_gain_wei, min_gain_attack,
    frequent_frontrun_from, frequent_frontrun_to, frequent_backrun_from,
    frequent_backrun_to, victim_count, max_victim_input_wei
";

const PAIR_COLUMNS: &str = "
    block_number, frontrun_hash, frontrun_from, frontrun_to, frontrun_gas_cost_wei,
    backrun_hash, backrun_from, backrun_to, backrun_gas_cost_wei, net_gain_wei,
    victim_hash, victim_input_wei
";

impl Store {
    /// Creates or opens a SQLite database with WAL mode enabled.
    ///
    /// # Errors
    /// Returns error if the database cannot be opened or migrations fail.
    pub fn new(path: &str) -> Result<Self> {
        let conn = Connection::open(path).wrap_err_with(|| format!("failed to open {path}"))?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
        let store = Self {
            conn: RefCell::new(conn),
        };
        store.run_migrations()?;
        Ok(store)
    }

    fn run_migrations(&self) -> Result<()> {
        self.conn.borrow_mut().execute_batch(
            "
            CREATE TABLE IF NOT EXISTS block_summaries (
                block_number INTEGER PRIMARY KEY,
                original_tx_count INTEGER NOT NULL,
                eligible_tx_count INTEGER NOT NULL,
                attack_count INTEGER NOT NULL,
                attack_percentage REAL NOT NULL,
                max_gain_wei TEXT,
                max_gain_attack INTEGER,
                min_gain_wei TEXT,
                min_gain_attack INTEGER,
                frequent_frontrun_from TEXT,
                frequent_frontrun_to TEXT,
                frequent_backrun_from TEXT,
                frequent_backrun_to TEXT,
                victim_count INTEGER NOT NULL,
                max_victim_input_wei TEXT NOT NULL,
                analyzed_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS frontrun_pairs (
                block_number INTEGER NOT NULL,
                attack_number INTEGER NOT NULL,
                frontrun_hash TEXT NOT NULL,
                frontrun_from TEXT NOT NULL,
                frontrun_to TEXT NOT NULL,
                frontrun_gas_cost_wei TEXT NOT NULL,
                backrun_hash TEXT NOT NULL,
                backrun_from TEXT NOT NULL,
                backrun_to TEXT NOT NULL,
                backrun_gas_cost_wei TEXT NOT NULL,
                net_gain_wei TEXT NOT NULL,
                victim_hash TEXT NOT NULL,
                victim_input_wei TEXT NOT NULL,
                PRIMARY KEY (block_number, attack_number)
            );
            ",
        )?;
        Ok(())
    }

    /// Stores one block's summary and its pair records in a single transaction.
    ///
    /// Existing rows for the same block are replaced.
    ///
    /// # Errors
    /// Returns error if database insert fails.
    pub fn insert_detection(&self, summary: &BlockSummary, records: &[PairRecord]) -> Result<usize> {
        let mut conn = self.conn.borrow_mut();
        let tx = conn.transaction()?;

        tx.execute(
            "DELETE FROM frontrun_pairs WHERE block_number = ?",
            rusqlite::params![summary.block_number],
        )?;

        let frequent = summary.frequent_addresses.as_ref();
        tx.execute(
            "
            INSERT OR REPLACE INTO block_summaries (
                block_number, original_tx_count, eligible_tx_count, attack_count,
                attack_percentage, max_gain_wei, max_gain_attack, min_gain_wei,
                min_gain_attack, frequent_frontrun_from, frequent_frontrun_to,
                frequent_backrun_from, frequent_backrun_to, victim_count,
                max_victim_input_wei, analyzed_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ",
            rusqlite::params![
                summary.block_number,
                summary.original_tx_count,
                summary.eligible_tx_count,
                summary.attack_count,
                summary.attack_percentage,
                summary.max_gain.as_ref().map(|g| g.gain_wei.clone()),
                summary.max_gain.as_ref().map(|g| g.attack_number),
                summary.min_gain.as_ref().map(|g| g.gain_wei.clone()),
                summary.min_gain.as_ref().map(|g| g.attack_number),
                frequent.map(|f| f.frontrun_from.clone()),
                frequent.map(|f| f.frontrun_to.clone()),
                frequent.map(|f| f.backrun_from.clone()),
                frequent.map(|f| f.backrun_to.clone()),
                summary.victim_count,
                summary.max_victim_input_wei,
                Utc::now().to_rfc3339(),
            ],
        )?;

        {
            let mut stmt = tx.prepare(
                "
                INSERT INTO frontrun_pairs (
                    block_number, attack_number, frontrun_hash, frontrun_from, frontrun_to,
                    frontrun_gas_cost_wei, backrun_hash, backrun_from, backrun_to,
                    backrun_gas_cost_wei, net_gain_wei, victim_hash, victim_input_wei
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                ",
            )?;

            for (idx, r) in records.iter().enumerate() {
                stmt.execute(rusqlite::params![
                    r.block_number,
                    idx + 1,
                    r.frontrun_hash,
                    r.frontrun_from,
                    r.frontrun_to,
                    r.frontrun_gas_cost_wei,
                    r.backrun_hash,
                    r.backrun_from,
                    r.backrun_to,
                    r.backrun_gas_cost_wei,
                    r.net_gain_wei,
                    r.victim_hash,
                    r.victim_input_wei,
                ])?;
            }
        }

        let count = records.len();
        tx.commit()?;
        Ok(count)
    }

    /// Summary stored for one block, if it was analyzed.
    ///
    /// # Errors
    /// Returns error if the query fails.
    pub fn get_summary(&self, block_number: u64) -> Result<Option<BlockSummary>> {
        let conn = self.conn.borrow();
        let summary = conn
            .query_row(
                &format!("SELECT {SUMMARY_COLUMNS} FROM block_summaries WHERE block_number = ?"),
                rusqlite::params![block_number],
                summary_from_row,
            )
            .optional()?;
        Ok(summary)
    }

    /// Summaries for blocks in `[start, end]`, ascending.
    ///
    /// # Errors
    /// Returns error if the query fails.
    pub fn summary_range(&self, start: u64, end: u64) -> Result<Vec<BlockSummary>> {
        let conn = self.conn.borrow();
        let mut stmt = conn.prepare(&format!(
            "SELECT {SUMMARY_COLUMNS} FROM block_summaries
             WHERE block_number BETWEEN ? AND ? ORDER BY block_number"
        ))?;
        let summaries = stmt
            .query_map(rusqlite::params![start, end], summary_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(summaries)
    }

    /// Pair records stored for one block, in attack order.
    ///
    /// # Errors
    /// Returns error if the query fails.
    pub fn get_pairs_for_block(&self, block_number: u64) -> Result<Vec<PairRecord>> {
        let conn = self.conn.borrow();
        let mut stmt = conn.prepare(&format!(
            "SELECT {PAIR_COLUMNS} FROM frontrun_pairs
             WHERE block_number = ? ORDER BY attack_number"
        ))?;
        let records = stmt
            .query_map(rusqlite::params![block_number], |row| {
                Ok(PairRecord {
                    block_number: row.get(0)?,
                    frontrun_hash: row.get(1)?,
                    frontrun_from: row.get(2)?,
                    frontrun_to: row.get(3)?,
                    frontrun_gas_cost_wei: row.get(4)?,
                    backrun_hash: row.get(5)?,
                    backrun_from: row.get(6)?,
                    backrun_to: row.get(7)?,
                    backrun_gas_cost_wei: row.get(8)?,
                    net_gain_wei: row.get(9)?,
                    victim_hash: row.get(10)?,
                    victim_input_wei: row.get(11)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }

    /// Highest analyzed block number, used to resume interrupted runs.
    ///
    /// # Errors
    /// Returns error if the query fails.
    pub fn latest_block(&self) -> Result<Option<u64>> {
        let latest = self.conn.borrow().query_row(
            "SELECT MAX(block_number) FROM block_summaries",
            [],
            |row| row.get::<_, Option<u64>>(0),
        )?;
        Ok(latest)
    }
}

fn summary_from_row(row: &Row<'_>) -> rusqlite::Result<BlockSummary> {
    let extreme = |gain: Option<String>, attack: Option<usize>| match (gain, attack) {
        (Some(gain_wei), Some(attack_number)) => Some(GainExtreme {
            gain_wei,
            attack_number,
        }),
        _ => None,
    };

    let frontrun_from: Option<String> = row.get(9)?;
    let frontrun_to: Option<String> = row.get(10)?;
    let backrun_from: Option<String> = row.get(11)?;
    let backrun_to: Option<String> = row.get(12)?;
    let frequent_addresses = match (frontrun_from, frontrun_to, backrun_from, backrun_to) {
        (Some(frontrun_from), Some(frontrun_to), Some(backrun_from), Some(backrun_to)) => {
            Some(FrequentAddresses {
                frontrun_from,
                frontrun_to,
                backrun_from,
                backrun_to,
            })
        }
        _ => None,
    };

    Ok(BlockSummary {
        block_number: row.get(0)?,
        original_tx_count: row.get(1)?,
        eligible_tx_count: row.get(2)?,
        attack_count: row.get(3)?,
        attack_percentage: row.get(4)?,
        max_gain: extreme(row.get(5)?, row.get(6)?),
        min_gain: extreme(row.get(7)?, row.get(8)?),
        frequent_addresses,
        victim_count: row.get(13)?,
        max_victim_input_wei: row.get(14)?,
    })
}

//! Round trips of detection output through SQLite and the export files.

mod common;

use common::*;
use sandwich_analysis::report::{pair_records, range_totals, summarize};
use sandwich_analysis::SandwichDetector;
use sandwich_data::export::{
    append_pairs_csv, load_blocks, save_blocks, write_pair_json, write_pairs_csv, PairDocument,
    PAIRS_CSV_HEADER,
};

fn sandwich_block() -> sandwich_data::Block {
    let (t1, t2) = scenario_a_legs();
    let victim = buy_tx(7, actor(0xc1), actor(0xd1), 30, 10);
    sample_block(vec![plain_tx(0), t1, victim, t2])
}

#[test]
fn saved_blocks_analyze_like_the_originals() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("blocks.json");
    let block = sandwich_block();

    save_blocks(&path, std::slice::from_ref(&block)).unwrap();
    let loaded = load_blocks(&path).unwrap();

    assert_eq!(loaded, vec![block.clone()]);
    let detector = SandwichDetector::default();
    assert_eq!(
        pair_records(&detector.detect_pairs(&loaded[0]).unwrap()),
        pair_records(&detector.detect_pairs(&block).unwrap())
    );
}

#[test]
fn detection_survives_the_store() {
    let store = test_store();
    let block = sandwich_block();
    let detection = SandwichDetector::default().detect_pairs(&block).unwrap();
    let summary = summarize(&detection);
    let records = pair_records(&detection);

    assert_eq!(store.insert_detection(&summary, &records).unwrap(), 1);

    let stored = store
        .get_summary(BLOCK_NUMBER)
        .unwrap()
        .expect("summary stored");
    assert_eq!(stored, summary);
    assert_eq!(stored.victim_count, 1);
    assert_eq!(stored.max_victim_input_wei, "30");
    assert_eq!(store.get_pairs_for_block(BLOCK_NUMBER).unwrap(), records);
    assert_eq!(store.latest_block().unwrap(), Some(BLOCK_NUMBER));
}

#[test]
fn store_totals_cover_every_analyzed_block() {
    let store = test_store();
    let attacked = sandwich_block();
    let mut quiet = sample_block((0..3).map(plain_tx).collect());
    quiet.number = BLOCK_NUMBER + 1;

    let detector = SandwichDetector::default();
    for block in [&attacked, &quiet] {
        let detection = detector.detect_pairs(block).unwrap();
        store
            .insert_detection(&summarize(&detection), &pair_records(&detection))
            .unwrap();
    }

    let summaries = store.summary_range(BLOCK_NUMBER, BLOCK_NUMBER + 1).unwrap();
    let totals = range_totals(&summaries);
    assert_eq!(totals.blocks_analyzed, 2);
    assert_eq!(totals.transactions_scanned, 7);
    assert_eq!(totals.eligible_transactions, 3);
    assert_eq!(totals.attacks, 1);
    assert_eq!(totals.victims, 1);
}

#[test]
fn pair_csv_files_hold_one_row_per_pair() {
    let dir = tempfile::tempdir().unwrap();
    let block = sandwich_block();
    let records = pair_records(&SandwichDetector::default().detect_pairs(&block).unwrap());

    let stats = dir.path().join("block_stats.csv");
    write_pairs_csv(&stats, &records).unwrap();

    let aggregate = dir.path().join("frontrun_records.csv");
    append_pairs_csv(&aggregate, &records).unwrap();
    append_pairs_csv(&aggregate, &records).unwrap();

    let stats_text = std::fs::read_to_string(&stats).unwrap();
    let lines: Vec<&str> = stats_text.lines().collect();
    assert_eq!(lines[0], PAIRS_CSV_HEADER);
    assert_eq!(lines.len(), 2);
    assert!(lines[1].starts_with(&format!("{BLOCK_NUMBER},")));
    assert!(lines[1].contains(",15,"));

    let aggregate_text = std::fs::read_to_string(&aggregate).unwrap();
    assert_eq!(aggregate_text.lines().count(), 3);
    assert_eq!(aggregate_text.matches(PAIRS_CSV_HEADER).count(), 1);
}

#[test]
fn pair_document_names_each_leg() {
    let dir = tempfile::tempdir().unwrap();
    let block = sandwich_block();
    let detection = SandwichDetector::default().detect_pairs(&block).unwrap();
    let pair = &detection.pairs[0];
    let victim = pair.victim().expect("victim");

    let document = PairDocument {
        t1: pair.frontrun(),
        t2: pair.backrun(),
        net_gains: pair.net_gain().to_string(),
        tv: Some(victim.tx),
        tv_input_amount: Some(victim.input_amount.to_string()),
    };
    let path = write_pair_json(dir.path(), 1, &document).unwrap();
    assert!(path.ends_with("1.json"));

    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(json["t1"]["index"], 5);
    assert_eq!(json["t2"]["index"], 9);
    assert_eq!(json["tv"]["index"], 7);
    assert_eq!(json["net_gains"], "15");
    assert_eq!(json["tv_input_amount"], "30");
}

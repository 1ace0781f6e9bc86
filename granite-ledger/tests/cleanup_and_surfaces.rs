mod common;

use assert_matches::assert_matches;
use granite_ledger::{errors::LedgerError, shred::entries_to_data_shreds, PerfSample};
use solana_sdk::{hash::Hash, pubkey::Pubkey};
use test_tools_core::init_logger;

use crate::common::{make_entries, setup, write_slot_entries};

#[test]
fn test_purge_slots_marks_them_cleaned_up() {
    init_logger!();
    let (_dir, ledger) = setup();

    for slot in 1..=5u64 {
        let entries = make_entries(&Hash::new_unique(), vec![]);
        write_slot_entries(&ledger, slot, Some(slot - 1), &entries);
        ledger.cache_block_time(slot, slot as i64).unwrap();
    }

    ledger.purge_slots(0, 3).unwrap();

    // Reads at or below the watermark report the slot as cleaned up
    assert_matches!(
        ledger.get_block_time(2),
        Err(LedgerError::SlotCleanedUp)
    );
    assert_matches!(
        ledger.get_rooted_block(3, false),
        Err(LedgerError::SlotCleanedUp)
    );

    // Reads above the watermark are unaffected
    assert_eq!(ledger.get_block_time(4).unwrap(), Some(4));
    assert!(ledger.meta(4).unwrap().is_some());

    // The purged content is gone
    assert!(ledger.meta(2).unwrap().is_none());
    assert!(ledger.get_data_shred(2, 0).unwrap().is_none());
}

#[test]
fn test_is_shred_duplicate() {
    init_logger!();
    let (_dir, ledger) = setup();

    let entries = make_entries(&Hash::new_unique(), vec![]);
    let shreds = entries_to_data_shreds(7, &entries, 0, 0, true).unwrap();
    let stored = &shreds[0];
    ledger.insert_shred(stored).unwrap();

    // Identical payload: not a duplicate
    assert!(ledger.is_shred_duplicate(stored).unwrap().is_none());

    // A different payload at the same coordinates is
    let other_entries = make_entries(&Hash::new_unique(), vec![]);
    let conflicting =
        entries_to_data_shreds(7, &other_entries, 0, 0, true).unwrap();
    let proof = ledger.is_shred_duplicate(&conflicting[0]).unwrap();
    assert_eq!(proof, Some(stored.payload().to_vec()));

    // Nothing stored at unseen coordinates
    let unseen = entries_to_data_shreds(8, &entries, 0, 0, true).unwrap();
    assert!(ledger.is_shred_duplicate(&unseen[0]).unwrap().is_none());
}

#[test]
fn test_code_shred_storage() {
    init_logger!();
    let (_dir, ledger) = setup();

    assert!(ledger.get_code_shred(6, 0).unwrap().is_none());

    for index in 0..3u32 {
        let code_shred =
            granite_ledger::shred::new_code_shred(6, index, 8, 3, index as u16, b"parity")
                .unwrap();
        ledger.insert_shred(&code_shred).unwrap();
    }

    assert!(ledger.get_code_shred(6, 1).unwrap().is_some());
    let shreds = ledger.get_code_shreds_for_slot(6, 0).unwrap();
    assert_eq!(shreds.len(), 3);
    assert_eq!(shreds[2].index(), 2);
    // The iterator does not leak into neighboring slots
    assert!(ledger.get_code_shreds_for_slot(7, 0).unwrap().is_empty());
}

#[test]
fn test_duplicate_slot_proofs() {
    init_logger!();
    let (_dir, ledger) = setup();

    assert!(ledger.get_first_duplicate_proof().unwrap().is_none());
    assert!(!ledger.has_duplicate_shreds_in_slot(9).unwrap());

    ledger
        .store_duplicate_slot(9, vec![1, 2, 3], vec![4, 5, 6])
        .unwrap();
    ledger
        .store_duplicate_slot(12, vec![7], vec![8])
        .unwrap();

    assert!(ledger.has_duplicate_shreds_in_slot(9).unwrap());
    let (slot, proof) = ledger.get_first_duplicate_proof().unwrap().unwrap();
    assert_eq!(slot, 9);
    assert_eq!(proof.shred1, vec![1, 2, 3]);
    assert_eq!(proof.shred2, vec![4, 5, 6]);
}

#[test]
fn test_bank_hash() {
    init_logger!();
    let (_dir, ledger) = setup();

    assert!(ledger.get_bank_hash(3).unwrap().is_none());
    assert!(!ledger.is_duplicate_confirmed(3).unwrap());

    let frozen_hash = Hash::new_unique();
    ledger.insert_bank_hash(3, frozen_hash, true).unwrap();
    assert_eq!(ledger.get_bank_hash(3).unwrap(), Some(frozen_hash));
    assert!(ledger.is_duplicate_confirmed(3).unwrap());
}

#[test]
fn test_latest_optimistic_slots() {
    init_logger!();
    let (_dir, ledger) = setup();

    for slot in [2u64, 5, 9] {
        ledger
            .insert_optimistic_slot(slot, &Hash::new_unique(), slot as i64)
            .unwrap();
    }

    let latest = ledger.get_latest_optimistic_slots(2).unwrap();
    let slots: Vec<u64> = latest.iter().map(|(slot, _, _)| *slot).collect();
    // Newest first, at most `num`
    assert_eq!(slots, vec![9, 5]);

    let (hash, timestamp) = ledger.get_optimistic_slot(5).unwrap().unwrap();
    assert_eq!(timestamp, 5);
    assert_eq!(latest[1].1, hash);
}

#[test]
fn test_perf_samples() {
    init_logger!();
    let (_dir, ledger) = setup();

    assert!(ledger.get_recent_perf_samples(5).unwrap().is_empty());

    for slot in [3u64, 6] {
        let sample = PerfSample {
            num_transactions: slot * 100,
            num_slots: slot,
            sample_period_secs: 60,
            num_non_vote_transactions: slot * 10,
        };
        ledger.write_perf_sample(slot, &sample).unwrap();
    }

    let samples = ledger.get_recent_perf_samples(1).unwrap();
    assert_eq!(samples.len(), 1);
    assert_eq!(samples[0].0, 6);
    assert_eq!(samples[0].1.num_transactions, 600);
}

#[test]
fn test_program_costs() {
    init_logger!();
    let (_dir, ledger) = setup();

    let program_a = Pubkey::new_unique();
    let program_b = Pubkey::new_unique();
    ledger.write_program_cost(&program_a, &1200).unwrap();
    ledger.write_program_cost(&program_b, &800).unwrap();

    let mut costs = ledger.read_program_costs().unwrap();
    costs.sort();
    let mut expected = vec![(program_a, 1200), (program_b, 800)];
    expected.sort();
    assert_eq!(costs, expected);

    ledger.delete_program_cost(&program_a).unwrap();
    assert_eq!(ledger.read_program_costs().unwrap().len(), 1);
}

#[test]
fn test_metrics_reporting_hooks() {
    init_logger!();
    let (_dir, ledger) = setup();

    let entries = make_entries(&Hash::new_unique(), vec![]);
    write_slot_entries(&ledger, 1, Some(0), &entries);
    let _ = ledger.get_slot_entries(1, 0).unwrap();

    // Smoke-check the reporting surfaces against a live database
    ledger.submit_rocksdb_cf_metrics_for_all_cfs();
    ledger.report_rpc_api_metrics();
}

#[test]
fn test_rewards_roundtrip() {
    init_logger!();
    let (_dir, ledger) = setup();

    assert!(ledger.get_rewards(4).unwrap().is_none());

    let rewards = vec![solana_transaction_status::Reward {
        pubkey: Pubkey::new_unique().to_string(),
        lamports: 42,
        post_balance: 1042,
        reward_type: Some(solana_transaction_status::RewardType::Staking),
        commission: Some(5),
    }];
    ledger.write_rewards(4, rewards.clone()).unwrap();
    assert_eq!(ledger.get_rewards(4).unwrap(), Some(rewards));
}

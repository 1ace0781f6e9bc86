mod common;

use assert_matches::assert_matches;
use granite_ledger::errors::LedgerError;
use solana_sdk::{hash::Hash, signature::Keypair};
use test_tools_core::init_logger;

use crate::common::{
    make_entries, setup, transfer_transaction, write_slot_entries,
};

#[test]
fn test_get_complete_block() {
    init_logger!();
    let (_dir, ledger) = setup();

    let genesis_hash = Hash::new_unique();
    let payer = Keypair::new();

    let slot_0_entries = make_entries(&genesis_hash, vec![]);
    write_slot_entries(&ledger, 0, None, &slot_0_entries);

    let slot_1_entries = make_entries(
        &slot_0_entries.last().unwrap().hash,
        vec![
            transfer_transaction(&payer),
            transfer_transaction(&payer),
        ],
    );
    write_slot_entries(&ledger, 1, Some(0), &slot_1_entries);
    ledger.cache_block_time(1, 100).unwrap();
    ledger.cache_block_height(1, 1).unwrap();

    let block = ledger.get_complete_block(1, true).unwrap();
    assert_eq!(block.parent_slot, 0);
    assert_eq!(
        block.blockhash,
        slot_1_entries.last().unwrap().hash.to_string()
    );
    assert_eq!(
        block.previous_blockhash,
        slot_0_entries.last().unwrap().hash.to_string()
    );
    assert_eq!(block.transactions.len(), 2);
    assert_eq!(block.block_time, Some(100));
    assert_eq!(block.block_height, Some(1));
    assert!(block.rewards.is_empty());

    // Re-reading an unchanged block yields the same composite value
    let again = ledger.get_complete_block(1, true).unwrap();
    assert_eq!(again, block);
}

#[test]
fn test_get_complete_block_zero_previous_blockhash() {
    init_logger!();
    let (_dir, ledger) = setup();

    let entries = make_entries(&Hash::new_unique(), vec![]);
    write_slot_entries(&ledger, 0, None, &entries);

    // Without a parent the previous blockhash degrades to the zero hash
    let block = ledger.get_complete_block(0, false).unwrap();
    assert_eq!(block.previous_blockhash, Hash::default().to_string());

    // ... but requiring it is an error
    assert_matches!(
        ledger.get_complete_block(0, true),
        Err(LedgerError::ParentEntriesUnavailable(0))
    );
}

#[test]
fn test_get_complete_block_unavailable_when_not_full() {
    init_logger!();
    let (_dir, ledger) = setup();

    // Unknown slot
    assert_matches!(
        ledger.get_complete_block(5, false),
        Err(LedgerError::SlotUnavailable(5))
    );

    // Known but incomplete slot
    let entries = make_entries(&Hash::new_unique(), vec![]);
    write_slot_entries(&ledger, 5, None, &entries);
    let mut meta = ledger.meta(5).unwrap().unwrap();
    meta.last_index = None;
    ledger.put_meta(5, &meta).unwrap();

    assert_matches!(
        ledger.get_complete_block(5, false),
        Err(LedgerError::SlotUnavailable(5))
    );
}

#[test]
fn test_get_complete_block_with_entry_summaries() {
    init_logger!();
    let (_dir, ledger) = setup();

    let payer = Keypair::new();
    let entries = make_entries(
        &Hash::new_unique(),
        vec![transfer_transaction(&payer), transfer_transaction(&payer)],
    );
    write_slot_entries(&ledger, 0, None, &entries);

    let block_with_entries = ledger
        .get_complete_block_with_entries(0, false, true, false)
        .unwrap();
    assert_eq!(block_with_entries.entries.len(), entries.len());
    for (summary, entry) in
        block_with_entries.entries.iter().zip(entries.iter())
    {
        assert_eq!(summary.num_hashes, entry.num_hashes);
        assert_eq!(summary.hash, entry.hash);
        assert_eq!(
            summary.num_transactions,
            entry.transactions.len() as u64
        );
    }
    // Transaction indexes across entries keep a running total
    assert_eq!(block_with_entries.entries[0].starting_transaction_index, 0);
    assert_eq!(block_with_entries.entries[1].starting_transaction_index, 1);
    assert_eq!(block_with_entries.entries[2].starting_transaction_index, 2);
}

#[test]
fn test_get_block_dead_slot_handling() {
    init_logger!();
    let (_dir, ledger) = setup();

    let entries = make_entries(&Hash::new_unique(), vec![]);
    write_slot_entries(&ledger, 2, None, &entries);
    ledger.set_dead_slot(2).unwrap();

    assert_matches!(
        ledger.get_slot_entries(2, 0),
        Err(LedgerError::DeadSlot(2))
    );
    // Explicitly allowing dead slots restores the read
    let block_with_entries = ledger
        .get_complete_block_with_entries(2, false, false, true)
        .unwrap();
    assert_eq!(
        block_with_entries.block.blockhash,
        entries.last().unwrap().hash.to_string()
    );

    ledger.remove_dead_slot(2).unwrap();
    assert!(!ledger.is_dead(2).unwrap());
    assert_eq!(ledger.get_slot_entries(2, 0).unwrap(), entries);
}

#[test]
fn test_get_rooted_block() {
    init_logger!();
    let (_dir, ledger) = setup();

    let entries = make_entries(&Hash::new_unique(), vec![]);
    write_slot_entries(&ledger, 3, None, &entries);

    assert_matches!(
        ledger.get_rooted_block(3, false),
        Err(LedgerError::SlotNotRooted(3))
    );

    ledger.set_roots([3u64].iter()).unwrap();
    let block = ledger.get_rooted_block(3, false).unwrap();
    assert_eq!(block.blockhash, entries.last().unwrap().hash.to_string());
}

#[test]
fn test_get_slot_entries_with_shred_info() {
    init_logger!();
    let (_dir, ledger) = setup();

    let entries = make_entries(&Hash::new_unique(), vec![]);
    write_slot_entries(&ledger, 4, None, &entries);
    let num_shreds = ledger.meta(4).unwrap().unwrap().received;

    let (read_entries, shred_count, is_full) =
        ledger.get_slot_entries_with_shred_info(4, 0, false).unwrap();
    assert_eq!(read_entries, entries);
    assert_eq!(shred_count, num_shreds);
    assert!(is_full);

    // Unknown slots read as empty, not as an error
    let (read_entries, shred_count, is_full) =
        ledger.get_slot_entries_with_shred_info(8, 0, false).unwrap();
    assert!(read_entries.is_empty());
    assert_eq!(shred_count, 0);
    assert!(!is_full);
}

mod common;

use test_tools_core::init_logger;

use crate::common::{full_slot_meta, setup};

#[test]
fn test_is_full() {
    init_logger!();
    let (_dir, ledger) = setup();

    // Absent slots are not full
    assert!(!ledger.is_full(1).unwrap());

    ledger
        .put_meta(1, &full_slot_meta(1, Some(0), vec![2], 1))
        .unwrap();
    assert!(ledger.is_full(1).unwrap());

    // Receiving shreds without the closing one leaves the slot incomplete
    let mut meta = full_slot_meta(2, Some(1), vec![], 4);
    meta.last_index = None;
    ledger.put_meta(2, &meta).unwrap();
    assert!(!ledger.is_full(2).unwrap());
}

#[test]
fn test_slot_range_connected() {
    init_logger!();
    let (_dir, ledger) = setup();

    ledger
        .put_meta(1, &full_slot_meta(1, Some(0), vec![2], 1))
        .unwrap();
    ledger
        .put_meta(2, &full_slot_meta(2, Some(1), vec![3], 1))
        .unwrap();
    ledger
        .put_meta(3, &full_slot_meta(3, Some(2), vec![], 1))
        .unwrap();

    assert!(ledger.slot_range_connected(1, 3).unwrap());
    assert!(ledger.slot_range_connected(1, 2).unwrap());

    // Make slot 2 incomplete; the range falls apart
    let mut meta = full_slot_meta(2, Some(1), vec![3], 1);
    meta.last_index = None;
    ledger.put_meta(2, &meta).unwrap();
    assert!(!ledger.slot_range_connected(1, 3).unwrap());
}

#[test]
fn test_slot_range_connected_same_slot() {
    init_logger!();
    let (_dir, ledger) = setup();

    // A slot is connected to itself, even when completely unknown
    assert!(ledger.slot_range_connected(7, 7).unwrap());
}

#[test]
fn test_slot_range_connected_absent_slots() {
    init_logger!();
    let (_dir, ledger) = setup();

    // Unknown starting slot
    assert!(!ledger.slot_range_connected(1, 3).unwrap());

    // Known start, but the chain never reaches the target
    ledger
        .put_meta(1, &full_slot_meta(1, Some(0), vec![2], 1))
        .unwrap();
    assert!(!ledger.slot_range_connected(1, 3).unwrap());
}

use granite_ledger::{shred, Ledger, SlotMeta};
use solana_entry::entry::Entry;
use solana_sdk::{
    clock::Slot,
    hash::Hash,
    pubkey::Pubkey,
    signature::Keypair,
    signer::Signer,
    system_instruction,
    transaction::Transaction,
};
use solana_transaction_status::TransactionStatusMeta;
use tempfile::TempDir;

pub fn setup() -> (TempDir, Ledger) {
    let dir = TempDir::new().unwrap();
    let ledger = Ledger::open(dir.path()).unwrap();
    (dir, ledger)
}

/// Metadata of a slot whose `num_shreds` shreds have all been observed and
/// form a single data block.
#[allow(dead_code)]
pub fn full_slot_meta(
    slot: Slot,
    parent_slot: Option<Slot>,
    next_slots: Vec<Slot>,
    num_shreds: u64,
) -> SlotMeta {
    let mut meta = SlotMeta::new(slot, parent_slot);
    meta.consumed = num_shreds;
    meta.received = num_shreds;
    meta.last_index = Some(num_shreds - 1);
    meta.next_slots = next_slots;
    meta.completed_data_indexes =
        [(num_shreds - 1) as u32].into_iter().collect();
    meta
}

#[allow(dead_code)]
pub fn transfer_transaction(from: &Keypair) -> Transaction {
    let to = Pubkey::new_unique();
    let ix = system_instruction::transfer(&from.pubkey(), &to, 42);
    Transaction::new_signed_with_payer(
        &[ix],
        Some(&from.pubkey()),
        &[from],
        Hash::new_unique(),
    )
}

/// Chains `transactions` into single-transaction entries, closed by a tick.
#[allow(dead_code)]
pub fn make_entries(
    start_hash: &Hash,
    transactions: Vec<Transaction>,
) -> Vec<Entry> {
    let mut entries = vec![];
    let mut hash = *start_hash;
    for transaction in transactions {
        let entry = Entry::new(&hash, 1, vec![transaction]);
        hash = entry.hash;
        entries.push(entry);
    }
    entries.push(Entry::new(&hash, 1, vec![]));
    entries
}

/// Writes `entries` into `slot` as one complete data block of shreds plus
/// the matching metadata, and stores a status for every transaction.
#[allow(dead_code)]
pub fn write_slot_entries(
    ledger: &Ledger,
    slot: Slot,
    parent_slot: Option<Slot>,
    entries: &[Entry],
) {
    let shreds =
        shred::entries_to_data_shreds(slot, entries, 0, 0, true).unwrap();
    for data_shred in &shreds {
        ledger.insert_shred(data_shred).unwrap();
    }

    let num_shreds = shreds.len() as u64;
    let mut meta = SlotMeta::new(slot, parent_slot);
    meta.consumed = num_shreds;
    meta.received = num_shreds;
    meta.first_shred_timestamp = 0;
    meta.last_index = Some(num_shreds - 1);
    meta.completed_data_indexes =
        [(num_shreds - 1) as u32].into_iter().collect();
    ledger.put_meta(slot, &meta).unwrap();

    let mut transaction_index = 0;
    for entry in entries {
        for transaction in &entry.transactions {
            let signature = transaction.signatures[0];
            let keys: Vec<Pubkey> =
                transaction.message.static_account_keys().to_vec();
            ledger
                .write_transaction_status(
                    slot,
                    signature,
                    keys.iter().collect(),
                    vec![],
                    TransactionStatusMeta::default(),
                    transaction_index,
                )
                .unwrap();
            transaction_index += 1;
        }
    }
}

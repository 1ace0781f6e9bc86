use byteorder::{BigEndian, ByteOrder};
use serde::{de::DeserializeOwned, Serialize};
use solana_sdk::{clock::Slot, pubkey::Pubkey, signature::Signature};
use solana_storage_proto::convert::generated;

use super::meta;

/// Column family for slot metadata
const META_CF: &str = "meta";
/// Column family for rooted slots
const ROOT_CF: &str = "root";
/// Column family for data shreds, the entry-bearing kind
const DATA_SHRED_CF: &str = "data_shred";
/// Column family for erasure coding shreds
const CODE_SHRED_CF: &str = "code_shred";
/// Column family for slots that were abandoned as dead
const DEAD_SLOTS_CF: &str = "dead_slots";
/// Column family for duplicate-slot proofs
const DUPLICATE_SLOTS_CF: &str = "duplicate_slots";
/// Column family for frozen bank hashes
const BANK_HASH_CF: &str = "bank_hash";
/// Column family for optimistically confirmed slots
const OPTIMISTIC_SLOTS_CF: &str = "optimistic_slots";
/// Column family for Blocktime
const BLOCKTIME_CF: &str = "blocktime";
/// Column family for Block Height
const BLOCK_HEIGHT_CF: &str = "block_height";
/// Column family for Rewards
const REWARDS_CF: &str = "rewards";
/// Column family for Performance Samples
const PERF_SAMPLES_CF: &str = "perf_samples";
/// Column family for per-program compute costs
const PROGRAM_COSTS_CF: &str = "program_costs";
/// Column family for Transaction Status
const TRANSACTION_STATUS_CF: &str = "transaction_status";
/// Column family for TransactionMemos
const TRANSACTION_MEMOS_CF: &str = "transaction_memos";
/// Column family for Address Signatures
const ADDRESS_SIGNATURES_CF: &str = "address_signatures";

#[derive(Debug)]
/// The slot metadata column
///
/// * index type: `u64` (see [`SlotColumn`])
/// * value type: [`meta::SlotMeta`]
pub struct SlotMeta;

#[derive(Debug)]
/// The root column
///
/// * index type: `u64` (see [`SlotColumn`])
/// * value type: `bool`
pub struct Root;

#[derive(Debug)]
/// The data shred column
///
/// * index type: `(`[`Slot`]`, u64)`
/// * value type: serialized shred payload bytes
pub struct ShredData;

#[derive(Debug)]
/// The code shred column
///
/// * index type: `(`[`Slot`]`, u64)`
/// * value type: serialized shred payload bytes
pub struct ShredCode;

#[derive(Debug)]
/// The dead slots column
///
/// * index type: `u64` (see [`SlotColumn`])
/// * value type: `bool`
pub struct DeadSlots;

#[derive(Debug)]
/// The duplicate slots column
///
/// * index type: `u64` (see [`SlotColumn`])
/// * value type: [`meta::DuplicateSlotProof`]
pub struct DuplicateSlots;

#[derive(Debug)]
/// The bank hash column
///
/// * index type: `u64` (see [`SlotColumn`])
/// * value type: [`meta::FrozenHashVersioned`]
pub struct BankHash;

#[derive(Debug)]
/// The optimistic slot column
///
/// * index type: `u64` (see [`SlotColumn`])
/// * value type: [`meta::OptimisticSlotMetaVersioned`]
pub struct OptimisticSlots;

/// The block time column
///
/// * index type: `u64` (see [`SlotColumn`])
/// * value type: [`UnixTimestamp`]
pub struct Blocktime;

#[derive(Debug)]
/// The block height column
///
/// * index type: `u64` (see [`SlotColumn`])
/// * value type: `u64`
pub struct BlockHeight;

#[derive(Debug)]
/// The rewards column
///
/// * index type: `u64` (see [`SlotColumn`])
/// * value type: [`generated::Rewards`]
pub struct Rewards;

#[derive(Debug)]
/// The performance samples column
///
/// * index type: `u64` (see [`SlotColumn`])
/// * value type: [`meta::PerfSample`]
pub struct PerfSamples;

#[derive(Debug)]
/// The program costs column
///
/// * index type: [`Pubkey`]
/// * value type: [`meta::ProgramCost`]
pub struct ProgramCosts;

#[derive(Debug)]
/// The transaction status column
///
/// * index type: `(`[`Signature`]`, `[`Slot`])`
/// * value type: [`generated::TransactionStatusMeta`]
pub struct TransactionStatus;

/// The transaction memos column
///
/// * index type: `(`[`Signature`]`, `[`Slot`])`
/// * value type: [`String`]
pub struct TransactionMemos;

#[derive(Debug)]
/// The address signatures column
///
/// * index type: `(`[`Pubkey`]`, `[`Slot`]`, u32, `[`Signature`]`)`
/// *                account addr,   slot,  tx index, tx signature
/// * value type: [`meta::AddressSignatureMeta`]
pub struct AddressSignatures;

// When adding a new column ...
// - Add struct above and implement `Column` and `ColumnName` traits
// - Add its name here and a descriptor in cf_descriptors()
// - Account for the column in purge_slots()

pub fn columns() -> Vec<&'static str> {
    vec![
        SlotMeta::NAME,
        Root::NAME,
        ShredData::NAME,
        ShredCode::NAME,
        DeadSlots::NAME,
        DuplicateSlots::NAME,
        BankHash::NAME,
        OptimisticSlots::NAME,
        Blocktime::NAME,
        BlockHeight::NAME,
        Rewards::NAME,
        PerfSamples::NAME,
        ProgramCosts::NAME,
        TransactionStatus::NAME,
        TransactionMemos::NAME,
        AddressSignatures::NAME,
    ]
}

// -----------------
// Traits
// -----------------
pub trait Column {
    type Index;

    fn key(index: Self::Index) -> Vec<u8>;
    fn index(key: &[u8]) -> Self::Index;
    // This trait method is primarily used by `Database::delete_range_cf()`, and is therefore only
    // relevant for columns keyed by Slot: ie. SlotColumns and columns that feature a Slot as the
    // first item in the key.
    fn as_index(slot: Slot) -> Self::Index;
    fn slot(index: Self::Index) -> Slot;
}

pub trait ColumnName {
    const NAME: &'static str;
}

pub trait TypedColumn: Column {
    type Type: Serialize + DeserializeOwned;
}

impl TypedColumn for SlotMeta {
    type Type = meta::SlotMeta;
}

impl TypedColumn for Root {
    type Type = bool;
}

impl TypedColumn for DeadSlots {
    type Type = bool;
}

impl TypedColumn for DuplicateSlots {
    type Type = meta::DuplicateSlotProof;
}

impl TypedColumn for BankHash {
    type Type = meta::FrozenHashVersioned;
}

impl TypedColumn for OptimisticSlots {
    type Type = meta::OptimisticSlotMetaVersioned;
}

impl TypedColumn for BlockHeight {
    type Type = u64;
}

impl TypedColumn for PerfSamples {
    type Type = meta::PerfSample;
}

impl TypedColumn for ProgramCosts {
    type Type = meta::ProgramCost;
}

impl TypedColumn for TransactionMemos {
    type Type = String;
}

impl TypedColumn for AddressSignatures {
    type Type = meta::AddressSignatureMeta;
}

pub trait ProtobufColumn: Column {
    type Type: prost::Message + Default;
}

impl ProtobufColumn for TransactionStatus {
    type Type = generated::TransactionStatusMeta;
}

impl ProtobufColumn for Rewards {
    type Type = generated::Rewards;
}

/// SlotColumn is a trait for slot-based column families.  Its index is
/// essentially Slot (or more generally speaking, has a 1:1 mapping to Slot).
///
/// The clean-up of any LedgerColumn that implements SlotColumn is managed by
/// the cleanup service, which will periodically deprecate and purge
/// oldest entries that are older than the latest root in order to maintain
/// the configured ledger size.
pub trait SlotColumn<Index = Slot> {}

impl<T: SlotColumn> Column for T {
    type Index = Slot;

    /// Converts a u64 Index to its RocksDB key.
    fn key(slot: u64) -> Vec<u8> {
        let mut key = vec![0; 8];
        BigEndian::write_u64(&mut key[..], slot);
        key
    }

    /// Converts a RocksDB key to its u64 Index.
    fn index(key: &[u8]) -> u64 {
        BigEndian::read_u64(&key[..8])
    }

    fn slot(index: Self::Index) -> Slot {
        index
    }

    /// Converts a Slot to its u64 Index.
    fn as_index(slot: Slot) -> u64 {
        slot
    }
}

impl SlotColumn for SlotMeta {}
impl ColumnName for SlotMeta {
    const NAME: &'static str = META_CF;
}

impl SlotColumn for Root {}
impl ColumnName for Root {
    const NAME: &'static str = ROOT_CF;
}

impl SlotColumn for DeadSlots {}
impl ColumnName for DeadSlots {
    const NAME: &'static str = DEAD_SLOTS_CF;
}

impl SlotColumn for DuplicateSlots {}
impl ColumnName for DuplicateSlots {
    const NAME: &'static str = DUPLICATE_SLOTS_CF;
}

impl SlotColumn for BankHash {}
impl ColumnName for BankHash {
    const NAME: &'static str = BANK_HASH_CF;
}

impl SlotColumn for OptimisticSlots {}
impl ColumnName for OptimisticSlots {
    const NAME: &'static str = OPTIMISTIC_SLOTS_CF;
}

impl SlotColumn for Blocktime {}
impl ColumnName for Blocktime {
    const NAME: &'static str = BLOCKTIME_CF;
}
impl TypedColumn for Blocktime {
    type Type = solana_sdk::clock::UnixTimestamp;
}

impl SlotColumn for BlockHeight {}
impl ColumnName for BlockHeight {
    const NAME: &'static str = BLOCK_HEIGHT_CF;
}

impl SlotColumn for Rewards {}
impl ColumnName for Rewards {
    const NAME: &'static str = REWARDS_CF;
}

impl SlotColumn for PerfSamples {}
impl ColumnName for PerfSamples {
    const NAME: &'static str = PERF_SAMPLES_CF;
}

// -----------------
// ShredData / ShredCode
// -----------------
const SHRED_INDEX_LEN: usize = 8 + 8;

fn shred_key((slot, index): (Slot, u64)) -> Vec<u8> {
    let mut key = vec![0; SHRED_INDEX_LEN];
    BigEndian::write_u64(&mut key[0..8], slot);
    BigEndian::write_u64(&mut key[8..16], index);
    key
}

fn shred_index(key: &[u8]) -> (Slot, u64) {
    let slot = BigEndian::read_u64(&key[0..8]);
    let index = BigEndian::read_u64(&key[8..16]);
    (slot, index)
}

impl Column for ShredData {
    type Index = (Slot, u64);

    fn key(index: Self::Index) -> Vec<u8> {
        shred_key(index)
    }

    fn index(key: &[u8]) -> Self::Index {
        shred_index(key)
    }

    fn slot(index: Self::Index) -> Slot {
        index.0
    }

    fn as_index(slot: Slot) -> Self::Index {
        (slot, 0)
    }
}

impl ColumnName for ShredData {
    const NAME: &'static str = DATA_SHRED_CF;
}

impl Column for ShredCode {
    type Index = (Slot, u64);

    fn key(index: Self::Index) -> Vec<u8> {
        shred_key(index)
    }

    fn index(key: &[u8]) -> Self::Index {
        shred_index(key)
    }

    fn slot(index: Self::Index) -> Slot {
        index.0
    }

    fn as_index(slot: Slot) -> Self::Index {
        (slot, 0)
    }
}

impl ColumnName for ShredCode {
    const NAME: &'static str = CODE_SHRED_CF;
}

// -----------------
// ProgramCosts
// -----------------
impl Column for ProgramCosts {
    type Index = Pubkey;

    fn key(pubkey: Self::Index) -> Vec<u8> {
        let mut key = vec![0; 32];
        key[0..32].copy_from_slice(&pubkey.as_ref()[0..32]);
        key
    }

    fn index(key: &[u8]) -> Self::Index {
        Pubkey::try_from(&key[..32]).unwrap()
    }

    // The ProgramCosts column is not keyed by slot so this method is meaningless
    // See Column::as_index() declaration for more details
    fn as_index(_index: u64) -> Self::Index {
        Pubkey::default()
    }

    fn slot(_index: Self::Index) -> Slot {
        unimplemented!()
    }
}

impl ColumnName for ProgramCosts {
    const NAME: &'static str = PROGRAM_COSTS_CF;
}

// -----------------
// ColumnIndexDeprecation
// -----------------
pub enum IndexError {
    UnpackError,
}

/// Helper trait to transition primary indexes out from the columns that are using them.
pub trait ColumnIndexDeprecation: Column {
    const DEPRECATED_INDEX_LEN: usize;
    const CURRENT_INDEX_LEN: usize;
    type DeprecatedIndex;

    fn deprecated_key(index: Self::DeprecatedIndex) -> Vec<u8>;
    fn try_deprecated_index(
        key: &[u8],
    ) -> std::result::Result<Self::DeprecatedIndex, IndexError>;

    fn try_current_index(
        key: &[u8],
    ) -> std::result::Result<Self::Index, IndexError>;
    fn convert_index(deprecated_index: Self::DeprecatedIndex) -> Self::Index;

    fn index(key: &[u8]) -> Self::Index {
        if let Ok(index) = Self::try_current_index(key) {
            index
        } else if let Ok(index) = Self::try_deprecated_index(key) {
            Self::convert_index(index)
        } else {
            // Way back in the day, the TransactionStatus column key was
            // broken. This fallback preserves the existing logic for ancient
            // keys, but realistically should never be executed.
            Self::as_index(0)
        }
    }
}

// -----------------
// TransactionStatus
// -----------------
impl Column for TransactionStatus {
    type Index = (Signature, Slot);

    fn key((signature, slot): Self::Index) -> Vec<u8> {
        let mut key = vec![0; Self::CURRENT_INDEX_LEN];
        key[0..64].copy_from_slice(&signature.as_ref()[0..64]);
        BigEndian::write_u64(&mut key[64..72], slot);
        key
    }

    fn index(key: &[u8]) -> (Signature, Slot) {
        <TransactionStatus as ColumnIndexDeprecation>::index(key)
    }

    fn slot(index: Self::Index) -> Slot {
        index.1
    }

    // The TransactionStatus column is not keyed by slot so this method is meaningless
    // See Column::as_index() declaration for more details
    fn as_index(_index: u64) -> Self::Index {
        (Signature::default(), 0)
    }
}

impl ColumnName for TransactionStatus {
    const NAME: &'static str = TRANSACTION_STATUS_CF;
}

impl ColumnIndexDeprecation for TransactionStatus {
    const DEPRECATED_INDEX_LEN: usize = 80;
    const CURRENT_INDEX_LEN: usize = 72;
    type DeprecatedIndex = (u64, Signature, Slot);

    fn deprecated_key(
        (index, signature, slot): Self::DeprecatedIndex,
    ) -> Vec<u8> {
        let mut key = vec![0; Self::DEPRECATED_INDEX_LEN];
        BigEndian::write_u64(&mut key[0..8], index);
        key[8..72].copy_from_slice(&signature.as_ref()[0..64]);
        BigEndian::write_u64(&mut key[72..80], slot);
        key
    }

    fn try_deprecated_index(
        key: &[u8],
    ) -> std::result::Result<Self::DeprecatedIndex, IndexError> {
        if key.len() != Self::DEPRECATED_INDEX_LEN {
            return Err(IndexError::UnpackError);
        }
        let primary_index = BigEndian::read_u64(&key[0..8]);
        let signature = Signature::try_from(&key[8..72]).unwrap();
        let slot = BigEndian::read_u64(&key[72..80]);
        Ok((primary_index, signature, slot))
    }

    fn try_current_index(
        key: &[u8],
    ) -> std::result::Result<Self::Index, IndexError> {
        if key.len() != Self::CURRENT_INDEX_LEN {
            return Err(IndexError::UnpackError);
        }
        let signature = Signature::try_from(&key[0..64]).unwrap();
        let slot = BigEndian::read_u64(&key[64..72]);
        Ok((signature, slot))
    }

    fn convert_index(deprecated_index: Self::DeprecatedIndex) -> Self::Index {
        let (_primary_index, signature, slot) = deprecated_index;
        (signature, slot)
    }
}

// -----------------
// TransactionMemos
// -----------------
impl Column for TransactionMemos {
    type Index = (Signature, Slot);

    fn key((signature, slot): Self::Index) -> Vec<u8> {
        let mut key = vec![0; Self::CURRENT_INDEX_LEN];
        key[0..64].copy_from_slice(&signature.as_ref()[0..64]);
        BigEndian::write_u64(&mut key[64..72], slot);
        key
    }

    fn index(key: &[u8]) -> Self::Index {
        <TransactionMemos as ColumnIndexDeprecation>::index(key)
    }

    fn slot(index: Self::Index) -> Slot {
        index.1
    }

    fn as_index(index: u64) -> Self::Index {
        (Signature::default(), index)
    }
}

impl ColumnName for TransactionMemos {
    const NAME: &'static str = TRANSACTION_MEMOS_CF;
}

impl ColumnIndexDeprecation for TransactionMemos {
    const DEPRECATED_INDEX_LEN: usize = 64;
    const CURRENT_INDEX_LEN: usize = 72;
    type DeprecatedIndex = Signature;

    fn deprecated_key(signature: Self::DeprecatedIndex) -> Vec<u8> {
        let mut key = vec![0; Self::DEPRECATED_INDEX_LEN];
        key[0..64].copy_from_slice(&signature.as_ref()[0..64]);
        key
    }

    fn try_deprecated_index(
        key: &[u8],
    ) -> std::result::Result<Self::DeprecatedIndex, IndexError> {
        Signature::try_from(&key[..64]).map_err(|_| IndexError::UnpackError)
    }

    fn try_current_index(
        key: &[u8],
    ) -> std::result::Result<Self::Index, IndexError> {
        if key.len() != Self::CURRENT_INDEX_LEN {
            return Err(IndexError::UnpackError);
        }
        let signature = Signature::try_from(&key[0..64]).unwrap();
        let slot = BigEndian::read_u64(&key[64..72]);
        Ok((signature, slot))
    }

    fn convert_index(deprecated_index: Self::DeprecatedIndex) -> Self::Index {
        (deprecated_index, 0)
    }
}

// -----------------
// AddressSignatures
// -----------------
impl Column for AddressSignatures {
    type Index = (Pubkey, Slot, u32, Signature);

    fn key(
        (pubkey, slot, transaction_index, signature): Self::Index,
    ) -> Vec<u8> {
        let mut key = vec![0; Self::CURRENT_INDEX_LEN];
        key[0..32].copy_from_slice(&pubkey.as_ref()[0..32]);
        BigEndian::write_u64(&mut key[32..40], slot);
        BigEndian::write_u32(&mut key[40..44], transaction_index);
        key[44..108].copy_from_slice(&signature.as_ref()[0..64]);
        key
    }

    fn index(key: &[u8]) -> Self::Index {
        <AddressSignatures as ColumnIndexDeprecation>::index(key)
    }

    fn slot(index: Self::Index) -> Slot {
        index.1
    }

    // The AddressSignatures column is not keyed by slot so this method is meaningless
    // See Column::as_index() declaration for more details
    fn as_index(_index: u64) -> Self::Index {
        (Pubkey::default(), 0, 0, Signature::default())
    }
}

impl ColumnName for AddressSignatures {
    const NAME: &'static str = ADDRESS_SIGNATURES_CF;
}

impl ColumnIndexDeprecation for AddressSignatures {
    const DEPRECATED_INDEX_LEN: usize = 112;
    const CURRENT_INDEX_LEN: usize = 108;
    type DeprecatedIndex = (u64, Pubkey, Slot, Signature);

    fn deprecated_key(
        (primary_index, pubkey, slot, signature): Self::DeprecatedIndex,
    ) -> Vec<u8> {
        let mut key = vec![0; Self::DEPRECATED_INDEX_LEN];
        BigEndian::write_u64(&mut key[0..8], primary_index);
        key[8..40].clone_from_slice(&pubkey.as_ref()[0..32]);
        BigEndian::write_u64(&mut key[40..48], slot);
        key[48..112].clone_from_slice(&signature.as_ref()[0..64]);
        key
    }

    fn try_deprecated_index(
        key: &[u8],
    ) -> std::result::Result<Self::DeprecatedIndex, IndexError> {
        if key.len() != Self::DEPRECATED_INDEX_LEN {
            return Err(IndexError::UnpackError);
        }
        let primary_index = BigEndian::read_u64(&key[0..8]);
        let pubkey = Pubkey::try_from(&key[8..40]).unwrap();
        let slot = BigEndian::read_u64(&key[40..48]);
        let signature = Signature::try_from(&key[48..112]).unwrap();
        Ok((primary_index, pubkey, slot, signature))
    }

    fn try_current_index(
        key: &[u8],
    ) -> std::result::Result<Self::Index, IndexError> {
        if key.len() != Self::CURRENT_INDEX_LEN {
            return Err(IndexError::UnpackError);
        }
        let pubkey = Pubkey::try_from(&key[0..32]).unwrap();
        let slot = BigEndian::read_u64(&key[32..40]);
        let transaction_index = BigEndian::read_u32(&key[40..44]);
        let signature = Signature::try_from(&key[44..108]).unwrap();
        Ok((pubkey, slot, transaction_index, signature))
    }

    fn convert_index(deprecated_index: Self::DeprecatedIndex) -> Self::Index {
        let (_primary_index, pubkey, slot, signature) = deprecated_index;
        (pubkey, slot, 0, signature)
    }
}

// -----------------
// Column Configuration
// -----------------

// Returns true if the column family enables compression.
pub fn should_enable_compression<C: 'static + Column + ColumnName>() -> bool {
    C::NAME == TransactionStatus::NAME
}

use solana_sdk::clock::Slot;
use thiserror::Error;

pub type LedgerResult<T> = std::result::Result<T, LedgerError>;

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("RocksDB error: {0}")]
    RocksDb(#[from] rocksdb::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("fs extra error: {0}")]
    FsExtraError(#[from] fs_extra::error::Error),
    #[error("serialization error: {0}")]
    Serialize(#[from] Box<bincode::ErrorKind>),
    #[error("protobuf encode error: {0}")]
    ProtobufEncodeError(#[from] prost::EncodeError),
    #[error("protobuf decode error: {0}")]
    ProtobufDecodeError(#[from] prost::DecodeError),
    #[error("unable to set open file descriptor limit")]
    UnableToSetOpenFileDescriptorLimit,
    #[error("try from slice error: {0}")]
    TryFromSliceError(#[from] std::array::TryFromSliceError),

    // Consistency violations
    #[error("slot cleaned up")]
    SlotCleanedUp,
    #[error("corrupted blockstore: {0}")]
    CorruptedBlockstore(String),
    #[error("missing value for known key in column {0}")]
    MissingColumnValue(&'static str),
    #[error("transaction status slot mismatch")]
    TransactionStatusSlotMismatch,
    #[error("transaction-index overflow")]
    TransactionIndexOverflow,

    // Not found / unavailable
    #[error("slot {0} unavailable")]
    SlotUnavailable(Slot),
    #[error("slot {0} not rooted")]
    SlotNotRooted(Slot),
    #[error("dead slot {0}")]
    DeadSlot(Slot),
    #[error("missing transaction metadata")]
    MissingTransactionMetadata,
    #[error("missing parent slot for slot {0}")]
    MissingParentSlot(Slot),
    #[error("parent entries unavailable for slot {0}")]
    ParentEntriesUnavailable(Slot),

    // Malformed data
    #[error("invalid data shred at (slot {0}, index {1})")]
    InvalidDataShred(Slot, u64),
    #[error("invalid shred data: {0}")]
    InvalidShredData(String),
    #[error("invalid entry data: {0}")]
    InvalidEntryData(String),
    #[error("failed to convert stored transaction status meta")]
    TransactionStatusMetaConversion,

    // Iterator invariants
    #[error("iterator is missing a key")]
    IteratorMissingKey,
    #[error("iterator is missing a value")]
    IteratorMissingValue,
}

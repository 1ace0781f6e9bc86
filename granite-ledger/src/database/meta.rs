use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use solana_sdk::{
    clock::{Slot, UnixTimestamp},
    hash::Hash,
};

/// Per-slot bookkeeping for the shreds observed so far.
#[derive(Clone, Debug, Default, Deserialize, Serialize, Eq, PartialEq)]
pub struct SlotMeta {
    /// The slot this metadata describes.
    pub slot: Slot,
    /// The total number of consecutive data shreds starting from index 0 we
    /// have received for this slot, i.e. the next missing data-shred index.
    pub consumed: u64,
    /// The index *plus one* of the highest shred received for this slot.
    /// Useful for checking if the slot has received any shreds yet, and to
    /// calculate the range where there is one or more holes:
    /// `(consumed..received)`.
    pub received: u64,
    /// The timestamp (ms) of the first time a shred was added for this slot.
    pub first_shred_timestamp: u64,
    /// The index of the shred that is flagged as the last shred for this
    /// slot, `None` until that shred has been observed.
    pub last_index: Option<u64>,
    /// The slot this one derives from, `None` for detached slots.
    pub parent_slot: Option<Slot>,
    /// The list of slots, each of which contains a block that derives
    /// from this one.
    pub next_slots: Vec<Slot>,
    /// Data-shred indices at which a data block ends.
    pub completed_data_indexes: BTreeSet<u32>,
}

impl SlotMeta {
    /// Whether all shreds for the slot have been observed.
    pub fn is_full(&self) -> bool {
        // A slot with no information about which shred closes it cannot be
        // full. Note: a full slot with zero shreds is not possible.
        let Some(last_index) = self.last_index else {
            return false;
        };

        // Should never happen
        if self.consumed > last_index + 1 {
            solana_metrics::datapoint_error!(
                "blockstore_error",
                (
                    "error",
                    format!(
                        "Observed a slot meta with consumed: {} > last_index + 1: {}",
                        self.consumed,
                        last_index + 1
                    ),
                    String
                )
            );
        }

        self.consumed == last_index + 1
    }

    pub fn is_parent_set(&self) -> bool {
        self.parent_slot.is_some()
    }

    pub fn new(slot: Slot, parent_slot: Option<Slot>) -> Self {
        SlotMeta {
            slot,
            parent_slot,
            ..SlotMeta::default()
        }
    }
}

/// Two shreds, same (slot, index, kind), different payloads.
#[derive(Debug, Deserialize, Serialize)]
pub struct DuplicateSlotProof {
    #[serde(with = "serde_bytes")]
    pub shred1: Vec<u8>,
    #[serde(with = "serde_bytes")]
    pub shred2: Vec<u8>,
}

impl DuplicateSlotProof {
    pub(crate) fn new(shred1: Vec<u8>, shred2: Vec<u8>) -> Self {
        DuplicateSlotProof { shred1, shred2 }
    }
}

#[derive(Deserialize, Serialize, Debug, PartialEq, Eq)]
pub enum FrozenHashVersioned {
    Current(FrozenHashStatus),
}

impl FrozenHashVersioned {
    pub fn frozen_hash(&self) -> Hash {
        match self {
            FrozenHashVersioned::Current(frozen_hash_status) => {
                frozen_hash_status.frozen_hash
            }
        }
    }

    pub fn is_duplicate_confirmed(&self) -> bool {
        match self {
            FrozenHashVersioned::Current(frozen_hash_status) => {
                frozen_hash_status.is_duplicate_confirmed
            }
        }
    }
}

#[derive(Deserialize, Serialize, Debug, PartialEq, Eq)]
pub struct FrozenHashStatus {
    pub frozen_hash: Hash,
    pub is_duplicate_confirmed: bool,
}

#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub enum OptimisticSlotMetaVersioned {
    V0(OptimisticSlotMeta),
}

impl OptimisticSlotMetaVersioned {
    pub fn new(hash: Hash, timestamp: UnixTimestamp) -> Self {
        OptimisticSlotMetaVersioned::V0(OptimisticSlotMeta { hash, timestamp })
    }

    pub fn hash(&self) -> Hash {
        match self {
            OptimisticSlotMetaVersioned::V0(meta) => meta.hash,
        }
    }

    pub fn timestamp(&self) -> UnixTimestamp {
        match self {
            OptimisticSlotMetaVersioned::V0(meta) => meta.timestamp,
        }
    }
}

#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct OptimisticSlotMeta {
    pub hash: Hash,
    pub timestamp: UnixTimestamp,
}

#[derive(Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct AddressSignatureMeta {
    pub writeable: bool,
}

/// Version of the [`PerfSample`] introduced in 1.15.x.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct PerfSample {
    pub num_transactions: u64,
    pub num_slots: u64,
    pub sample_period_secs: u16,
    pub num_non_vote_transactions: u64,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct ProgramCost {
    pub cost: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_meta_is_full() {
        let mut meta = SlotMeta::new(7, Some(6));
        assert!(!meta.is_full());

        meta.last_index = Some(4);
        meta.consumed = 4;
        assert!(!meta.is_full());

        meta.consumed = 5;
        assert!(meta.is_full());
    }

    #[test]
    fn test_slot_meta_roundtrip() {
        let mut meta = SlotMeta::new(10, Some(9));
        meta.consumed = 32;
        meta.received = 32;
        meta.last_index = Some(31);
        meta.next_slots = vec![11, 12];
        meta.completed_data_indexes = [4u32, 17, 31].into_iter().collect();

        let bytes = bincode::serialize(&meta).unwrap();
        let decoded: SlotMeta = bincode::deserialize(&bytes).unwrap();
        assert_eq!(decoded, meta);
    }
}

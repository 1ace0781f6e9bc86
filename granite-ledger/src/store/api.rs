use std::{
    cmp,
    collections::{BTreeSet, HashSet, VecDeque},
    fs,
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, RwLock, RwLockReadGuard,
    },
};

use bincode::deserialize;
use log::*;
use rocksdb::DBRawIterator;
use solana_entry::entry::Entry;
use solana_measure::measure::Measure;
use solana_sdk::{
    clock::{Slot, UnixTimestamp, DEFAULT_TICKS_PER_SECOND},
    hash::Hash,
    pubkey::Pubkey,
    signature::Signature,
    timing::timestamp,
    transaction::VersionedTransaction,
};
use solana_storage_proto::convert::generated;
use solana_transaction_status::{
    ConfirmedTransactionStatusWithSignature, ConfirmedTransactionWithStatusMeta,
    Reward, TransactionStatusMeta, TransactionWithStatusMeta,
    VersionedConfirmedBlock, VersionedTransactionWithStatusMeta,
};

use crate::{
    ancestor_iterator::AncestorIterator,
    database::{
        columns as cf,
        columns::{Column, ColumnName},
        db::Database,
        iterator::{IteratorDirection, IteratorMode},
        ledger_column::LedgerColumn,
        meta::{
            AddressSignatureMeta, DuplicateSlotProof, FrozenHashStatus,
            FrozenHashVersioned, OptimisticSlotMetaVersioned, PerfSample,
            ProgramCost, SlotMeta,
        },
        options::LedgerOptions,
    },
    errors::{LedgerError, LedgerResult},
    metrics::LedgerRpcApiMetrics,
    shred::{self, Shred, ShredType},
    store::utils::adjust_ulimit_nofile,
};

/// Inclusive (start, end) data-shred index pairs, each pair spanning one
/// complete data block.
pub type CompletedRanges = Vec<(u32, u32)>;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EntrySummary {
    pub num_hashes: u64,
    pub hash: Hash,
    pub num_transactions: u64,
    pub starting_transaction_index: usize,
}

#[derive(Clone, Debug, PartialEq)]
pub struct VersionedConfirmedBlockWithEntries {
    pub block: VersionedConfirmedBlock,
    pub entries: Vec<EntrySummary>,
}

#[derive(Default, Debug, PartialEq)]
pub struct SignatureInfosForAddress {
    pub infos: Vec<ConfirmedTransactionStatusWithSignature>,
    pub found_before: bool,
}

pub struct Ledger {
    ledger_path: PathBuf,
    db: Arc<Database>,

    meta_cf: LedgerColumn<cf::SlotMeta>,
    roots_cf: LedgerColumn<cf::Root>,
    data_shred_cf: LedgerColumn<cf::ShredData>,
    code_shred_cf: LedgerColumn<cf::ShredCode>,
    dead_slots_cf: LedgerColumn<cf::DeadSlots>,
    duplicate_slots_cf: LedgerColumn<cf::DuplicateSlots>,
    bank_hash_cf: LedgerColumn<cf::BankHash>,
    optimistic_slots_cf: LedgerColumn<cf::OptimisticSlots>,
    blocktime_cf: LedgerColumn<cf::Blocktime>,
    block_height_cf: LedgerColumn<cf::BlockHeight>,
    rewards_cf: LedgerColumn<cf::Rewards>,
    perf_samples_cf: LedgerColumn<cf::PerfSamples>,
    program_costs_cf: LedgerColumn<cf::ProgramCosts>,
    transaction_status_cf: LedgerColumn<cf::TransactionStatus>,
    transaction_memos_cf: LedgerColumn<cf::TransactionMemos>,
    address_signatures_cf: LedgerColumn<cf::AddressSignatures>,

    max_root: AtomicU64,

    pub lowest_cleanup_slot: RwLock<Slot>,
    rpc_api_metrics: LedgerRpcApiMetrics,
}

impl Ledger {
    pub fn db(self) -> Arc<Database> {
        self.db
    }

    pub fn ledger_path(&self) -> &PathBuf {
        &self.ledger_path
    }

    pub fn storage_size(&self) -> std::result::Result<u64, LedgerError> {
        self.db.storage_size()
    }

    /// Opens a Ledger in directory, provides "infinite" window of shreds
    pub fn open(ledger_path: &Path) -> std::result::Result<Self, LedgerError> {
        Self::do_open(ledger_path, LedgerOptions::default())
    }

    pub fn open_with_options(
        ledger_path: &Path,
        options: LedgerOptions,
    ) -> std::result::Result<Self, LedgerError> {
        Self::do_open(ledger_path, options)
    }

    fn do_open(
        ledger_path: &Path,
        options: LedgerOptions,
    ) -> std::result::Result<Self, LedgerError> {
        fs::create_dir_all(ledger_path)?;
        let ledger_path = ledger_path.join(
            options
                .column_options
                .shred_storage_type
                .blockstore_directory(),
        );
        adjust_ulimit_nofile(options.enforce_ulimit_nofile)?;

        // Open the database
        let mut measure = Measure::start("blockstore open");
        info!("Opening blockstore at {:?}", ledger_path);
        let db = Database::open(&ledger_path, options)?;

        let meta_cf = db.column();
        let roots_cf = db.column();
        let data_shred_cf = db.column();
        let code_shred_cf = db.column();
        let dead_slots_cf = db.column();
        let duplicate_slots_cf = db.column();
        let bank_hash_cf = db.column();
        let optimistic_slots_cf = db.column();
        let blocktime_cf = db.column();
        let block_height_cf = db.column();
        let rewards_cf = db.column();
        let perf_samples_cf = db.column();
        let program_costs_cf = db.column();
        let transaction_status_cf = db.column();
        let transaction_memos_cf = db.column();
        let address_signatures_cf = db.column();

        // Restore the last root as seen by the previous run
        let max_root = db
            .iter::<cf::Root>(IteratorMode::End)?
            .next()
            .map(|(slot, _)| slot)
            .unwrap_or(0);
        let max_root = AtomicU64::new(max_root);

        let db = Arc::new(db);

        measure.stop();
        info!("Opening blockstore done; {measure}");

        Ok(Ledger {
            ledger_path: ledger_path.to_path_buf(),
            db,

            meta_cf,
            roots_cf,
            data_shred_cf,
            code_shred_cf,
            dead_slots_cf,
            duplicate_slots_cf,
            bank_hash_cf,
            optimistic_slots_cf,
            blocktime_cf,
            block_height_cf,
            rewards_cf,
            perf_samples_cf,
            program_costs_cf,
            transaction_status_cf,
            transaction_memos_cf,
            address_signatures_cf,

            max_root,

            lowest_cleanup_slot: RwLock::<Slot>::default(),
            rpc_api_metrics: LedgerRpcApiMetrics::default(),
        })
    }

    /// Deletes the blockstore at the specified path.
    pub fn destroy(ledger_path: &Path) -> std::result::Result<(), LedgerError> {
        // Database::destroy() fails if the root directory doesn't exist
        fs::create_dir_all(ledger_path)?;
        Database::destroy(ledger_path)
    }

    /// Returns whether the blockstore has primary (read and write) access
    pub fn is_primary_access(&self) -> bool {
        self.db.is_primary_access()
    }

    /// Collects and reports the RocksDB column family properties for all the
    /// column families.
    pub fn submit_rocksdb_cf_metrics_for_all_cfs(&self) {
        self.meta_cf.submit_rocksdb_cf_metrics();
        self.roots_cf.submit_rocksdb_cf_metrics();
        self.data_shred_cf.submit_rocksdb_cf_metrics();
        self.code_shred_cf.submit_rocksdb_cf_metrics();
        self.dead_slots_cf.submit_rocksdb_cf_metrics();
        self.duplicate_slots_cf.submit_rocksdb_cf_metrics();
        self.bank_hash_cf.submit_rocksdb_cf_metrics();
        self.optimistic_slots_cf.submit_rocksdb_cf_metrics();
        self.blocktime_cf.submit_rocksdb_cf_metrics();
        self.block_height_cf.submit_rocksdb_cf_metrics();
        self.rewards_cf.submit_rocksdb_cf_metrics();
        self.perf_samples_cf.submit_rocksdb_cf_metrics();
        self.program_costs_cf.submit_rocksdb_cf_metrics();
        self.transaction_status_cf.submit_rocksdb_cf_metrics();
        self.transaction_memos_cf.submit_rocksdb_cf_metrics();
        self.address_signatures_cf.submit_rocksdb_cf_metrics();
    }

    pub fn report_rpc_api_metrics(&self) {
        self.rpc_api_metrics.report();
    }

    // -----------------
    // Locking Lowest Cleanup Slot
    // -----------------

    /// Acquires the `lowest_cleanup_slot` lock and returns the held guard.
    ///
    /// The function will return LedgerError::SlotCleanedUp if the input
    /// `slot` has already been cleaned-up.
    fn check_lowest_cleanup_slot(
        &self,
        slot: Slot,
    ) -> LedgerResult<RwLockReadGuard<Slot>> {
        // lowest_cleanup_slot is the last slot that was not cleaned up by the
        // cleanup service
        let lowest_cleanup_slot = self.lowest_cleanup_slot.read().unwrap();
        if *lowest_cleanup_slot > 0 && *lowest_cleanup_slot >= slot {
            return Err(LedgerError::SlotCleanedUp);
        }
        // Make caller hold this lock properly; otherwise the cleanup service
        // can purge/compact needed slots here at any given moment
        Ok(lowest_cleanup_slot)
    }

    /// Acquires the lock of `lowest_cleanup_slot` and returns the tuple of
    /// the held lock and the lowest available slot.
    ///
    /// This function ensures a consistent result by using lowest_cleanup_slot
    /// as the lower bound for reading columns that do not employ strong read
    /// consistency with slot-based delete_range.
    fn ensure_lowest_cleanup_slot(&self) -> (RwLockReadGuard<Slot>, Slot) {
        let lowest_cleanup_slot = self.lowest_cleanup_slot.read().unwrap();
        let lowest_available_slot = (*lowest_cleanup_slot).saturating_add(1);

        // Make caller hold this lock properly; otherwise the cleanup service
        // can purge/compact needed slots here at any given moment.
        // Blockstore callers, like rpc, can process concurrent read queries
        (lowest_cleanup_slot, lowest_available_slot)
    }

    // -----------------
    // SlotMeta
    // -----------------

    pub fn meta(&self, slot: Slot) -> LedgerResult<Option<SlotMeta>> {
        self.meta_cf.get(slot)
    }

    pub fn put_meta(&self, slot: Slot, meta: &SlotMeta) -> LedgerResult<()> {
        self.meta_cf.put(slot, meta)
    }

    pub fn is_full(&self, slot: Slot) -> LedgerResult<bool> {
        Ok(self
            .meta_cf
            .get(slot)?
            .map(|meta| meta.is_full())
            .unwrap_or(false))
    }

    fn slot_meta_iterator(
        &self,
        slot: Slot,
    ) -> LedgerResult<impl Iterator<Item = (Slot, SlotMeta)> + '_> {
        let meta_iter = self
            .db
            .iter::<cf::SlotMeta>(IteratorMode::From(
                slot,
                IteratorDirection::Forward,
            ))?;
        Ok(meta_iter.map(|(slot, slot_meta_bytes)| {
            (
                slot,
                deserialize(&slot_meta_bytes).unwrap_or_else(|e| {
                    panic!("Could not deserialize SlotMeta for slot {slot}: {e:?}")
                }),
            )
        }))
    }

    /// Determines whether a slot has been connected to the slot `ending_slot`
    /// through a chain of full slots.
    ///
    /// A slot is considered connected on its own, even when it has no
    /// metadata. Unlike the upstream reference, an absent or not-full slot on
    /// the walk is an immediate `false` rather than a silent skip.
    pub fn slot_range_connected(
        &self,
        starting_slot: Slot,
        ending_slot: Slot,
    ) -> LedgerResult<bool> {
        if starting_slot == ending_slot {
            return Ok(true);
        }

        let mut next_slots: VecDeque<_> = VecDeque::from([starting_slot]);
        let mut last_slot = None;
        while let Some(slot) = next_slots.pop_front() {
            let Some(slot_meta) = self.meta(slot)? else {
                return Ok(false);
            };
            if !slot_meta.is_full() {
                return Ok(false);
            }
            if let Some(last_slot) = last_slot {
                // Without forks each child continues directly after its parent
                debug_assert_eq!(slot, last_slot + 1);
            }
            match slot.cmp(&ending_slot) {
                cmp::Ordering::Less => {
                    next_slots.extend(slot_meta.next_slots.iter().copied())
                }
                cmp::Ordering::Equal => return Ok(true),
                // The traversal overshot the target without visiting it
                cmp::Ordering::Greater => {}
            }
            last_slot = Some(slot);
        }

        Ok(false)
    }

    // -----------------
    // Roots
    // -----------------

    pub fn is_root(&self, slot: Slot) -> LedgerResult<bool> {
        Ok(self.roots_cf.get(slot)?.is_some())
    }

    pub fn max_root(&self) -> Slot {
        self.max_root.load(Ordering::Relaxed)
    }

    /// Marks the given slots as rooted; `max_root` only ever moves forward.
    pub fn set_roots<'a>(
        &self,
        rooted_slots: impl Iterator<Item = &'a Slot>,
    ) -> LedgerResult<()> {
        let mut write_batch = self.db.batch()?;
        let mut max_new_rooted_slot = 0;
        for slot in rooted_slots {
            max_new_rooted_slot = cmp::max(max_new_rooted_slot, *slot);
            write_batch.put::<cf::Root>(*slot, &true)?;
        }

        self.db.write(write_batch)?;
        self.max_root.fetch_max(max_new_rooted_slot, Ordering::Relaxed);
        Ok(())
    }

    fn rooted_slot_iterator(
        &self,
        slot: Slot,
    ) -> LedgerResult<impl Iterator<Item = Slot> + '_> {
        let root_iterator = self.db.iter::<cf::Root>(IteratorMode::From(
            slot,
            IteratorDirection::Forward,
        ))?;
        Ok(root_iterator.map(|(rooted_slot, _)| rooted_slot))
    }

    fn lowest_slot_with_genesis(&self) -> LedgerResult<Slot> {
        for (slot, meta) in self.slot_meta_iterator(0)? {
            if meta.received > 0 {
                return Ok(slot);
            }
        }
        // This means blockstore is empty, should never get here aside from right at boot.
        Ok(self.max_root())
    }

    pub fn get_first_available_block(&self) -> LedgerResult<Slot> {
        self.rpc_api_metrics
            .num_get_first_available_block
            .fetch_add(1, Ordering::Relaxed);

        let mut root_iterator =
            self.rooted_slot_iterator(self.lowest_slot_with_genesis()?)?;
        let first_root = root_iterator.next().unwrap_or_default();
        // If the first root is slot 0, it is genesis. Genesis is always
        // complete, so it is correct to return it as first-available.
        if first_root == 0 {
            return Ok(0);
        }
        // Otherwise, the block at root-index 0 cannot ever be complete,
        // because it is missing its parent blockhash. A parent blockhash must
        // be calculated from the entries of the previous block. Therefore,
        // the first available complete block is that at root-index 1.
        Ok(root_iterator.next().unwrap_or_default())
    }

    /// A skipped slot is one that sits between roots without having been
    /// rooted itself.
    pub fn is_skipped(&self, slot: Slot) -> LedgerResult<bool> {
        let lowest_root = self
            .rooted_slot_iterator(0)?
            .next()
            .unwrap_or_default();
        Ok(self.roots_cf.get(slot)?.is_none()
            && slot < self.max_root()
            && slot > lowest_root)
    }

    /// The first (slot, index) pair above slot 0 that holds any shreds.
    pub fn lowest_slot(&self) -> LedgerResult<Slot> {
        for (slot, meta) in self.slot_meta_iterator(0)? {
            if slot > 0 && meta.received > 0 {
                return Ok(slot);
            }
        }
        // This means blockstore is empty, should never get here aside from
        // right at boot.
        Ok(self.max_root())
    }

    pub fn highest_slot(&self) -> LedgerResult<Option<Slot>> {
        Ok(self
            .db
            .iter::<cf::SlotMeta>(IteratorMode::End)?
            .next()
            .map(|(slot, _)| slot))
    }

    // -----------------
    // Dead slots
    // -----------------

    pub fn is_dead(&self, slot: Slot) -> LedgerResult<bool> {
        Ok(self.dead_slots_cf.get(slot)?.is_some())
    }

    pub fn set_dead_slot(&self, slot: Slot) -> LedgerResult<()> {
        self.dead_slots_cf.put(slot, &true)
    }

    pub fn remove_dead_slot(&self, slot: Slot) -> LedgerResult<()> {
        self.dead_slots_cf.delete(slot)
    }

    // -----------------
    // Shreds
    // -----------------

    pub fn get_data_shred(
        &self,
        slot: Slot,
        index: u64,
    ) -> LedgerResult<Option<Vec<u8>>> {
        self.data_shred_cf
            .get_bytes((slot, index))?
            .map(|payload| {
                if payload.len() != shred::SHRED_PAYLOAD_SIZE {
                    return Err(LedgerError::InvalidDataShred(slot, index));
                }
                Ok(payload)
            })
            .transpose()
    }

    pub fn get_code_shred(
        &self,
        slot: Slot,
        index: u64,
    ) -> LedgerResult<Option<Vec<u8>>> {
        self.code_shred_cf.get_bytes((slot, index))
    }

    fn slot_data_iterator(
        &self,
        slot: Slot,
        index: u64,
    ) -> LedgerResult<impl Iterator<Item = ((u64, u64), Box<[u8]>)> + '_> {
        let slot_iterator = self.db.iter::<cf::ShredData>(
            IteratorMode::From((slot, index), IteratorDirection::Forward),
        )?;
        Ok(slot_iterator
            .take_while(move |((shred_slot, _), _)| *shred_slot == slot))
    }

    fn slot_code_iterator(
        &self,
        slot: Slot,
        index: u64,
    ) -> LedgerResult<impl Iterator<Item = ((u64, u64), Box<[u8]>)> + '_> {
        let slot_iterator = self.db.iter::<cf::ShredCode>(
            IteratorMode::From((slot, index), IteratorDirection::Forward),
        )?;
        Ok(slot_iterator
            .take_while(move |((shred_slot, _), _)| *shred_slot == slot))
    }

    pub fn get_data_shreds_for_slot(
        &self,
        slot: Slot,
        start_index: u64,
    ) -> LedgerResult<Vec<Shred>> {
        self.slot_data_iterator(slot, start_index)?
            .map(|(_, bytes)| {
                Shred::new_from_serialized_shred(bytes.to_vec()).map_err(|err| {
                    LedgerError::InvalidShredData(format!(
                        "Could not reconstruct shred from shred payload: {err:?}"
                    ))
                })
            })
            .collect()
    }

    pub fn get_code_shreds_for_slot(
        &self,
        slot: Slot,
        start_index: u64,
    ) -> LedgerResult<Vec<Shred>> {
        self.slot_code_iterator(slot, start_index)?
            .map(|(_, bytes)| {
                Shred::new_from_serialized_shred(bytes.to_vec()).map_err(|err| {
                    LedgerError::InvalidShredData(format!(
                        "Could not reconstruct shred from shred payload: {err:?}"
                    ))
                })
            })
            .collect()
    }

    /// Stores a shred payload under its (slot, index, kind) coordinates.
    pub fn insert_shred(&self, shred: &Shred) -> LedgerResult<()> {
        let index = (shred.slot(), u64::from(shred.index()));
        match shred.shred_type() {
            ShredType::Data => {
                self.data_shred_cf.put_bytes(index, shred.payload())
            }
            ShredType::Code => {
                self.code_shred_cf.put_bytes(index, shred.payload())
            }
        }
    }

    /// Probes whether `shred` collides with a differing stored payload at the
    /// same coordinates. Returns the stored payload on mismatch.
    ///
    /// The retransmitter signature is not part of a shred's identity, so the
    /// stored copy's trailer is rewritten with the incoming signature before
    /// the comparison. When the incoming shred carries no signature the
    /// stored copy is compared unmodified.
    pub fn is_shred_duplicate(
        &self,
        shred: &Shred,
    ) -> LedgerResult<Option<Vec<u8>>> {
        let (slot, index) = (shred.slot(), u64::from(shred.index()));
        let other = match shred.shred_type() {
            ShredType::Data => self.get_data_shred(slot, index)?,
            ShredType::Code => self.get_code_shred(slot, index)?,
        };
        let Some(mut other) = other else {
            return Ok(None);
        };
        if let Some(signature) = shred.retransmitter_signature() {
            match Shred::new_from_serialized_shred(other.clone()) {
                Ok(mut stored) => {
                    if let Err(err) =
                        stored.set_retransmitter_signature(&signature)
                    {
                        error!(
                            "set retransmitter signature failed for stored \
                             shred ({slot}, {index}): {err:?}"
                        );
                    } else {
                        other = stored.into_payload();
                    }
                }
                Err(err) => error!(
                    "unable to parse stored shred ({slot}, {index}): {err:?}"
                ),
            }
        }
        Ok((other != shred.payload()).then_some(other))
    }

    /// Finds the missing data-shred indexes for the given `slot` within
    /// `[start_index, end_index)`, at most `max_missing` of them.
    ///
    /// Holes above a shred whose reference tick has not yet aged past
    /// `defer_threshold_ticks` are not reported.
    pub fn find_missing_data_indexes(
        &self,
        slot: Slot,
        first_timestamp: u64,
        defer_threshold_ticks: u64,
        start_index: u64,
        end_index: u64,
        max_missing: usize,
    ) -> LedgerResult<Vec<u64>> {
        let mut db_iterator =
            self.db.raw_iterator_cf(self.db.cf_handle::<cf::ShredData>())?;
        Self::find_missing_indexes::<cf::ShredData>(
            &mut db_iterator,
            slot,
            first_timestamp,
            defer_threshold_ticks,
            start_index,
            end_index,
            max_missing,
        )
    }

    fn find_missing_indexes<C>(
        db_iterator: &mut DBRawIterator,
        slot: Slot,
        first_timestamp: u64,
        defer_threshold_ticks: u64,
        start_index: u64,
        end_index: u64,
        max_missing: usize,
    ) -> LedgerResult<Vec<u64>>
    where
        C: Column<Index = (Slot, u64)> + ColumnName,
    {
        if start_index >= end_index || max_missing == 0 {
            return Ok(vec![]);
        }

        let mut missing_indexes = vec![];
        // System time is not monotonic
        let ticks_since_first_insert = DEFAULT_TICKS_PER_SECOND
            * timestamp().saturating_sub(first_timestamp)
            / 1000;

        // Seek to the first shred with index >= start_index
        db_iterator.seek(C::key((slot, start_index)));

        // The index of the first missing shred in the slot
        let mut prev_index = start_index;
        loop {
            if !db_iterator.valid() {
                let num_to_take = max_missing - missing_indexes.len();
                missing_indexes
                    .extend((prev_index..end_index).take(num_to_take));
                break;
            }
            let (current_slot, index) = C::index(
                db_iterator.key().ok_or(LedgerError::IteratorMissingKey)?,
            );

            let current_index = if current_slot > slot { end_index } else { index };

            let upper_index = cmp::min(current_index, end_index);
            // The tick that decides whether this hole has timed out yet
            let data =
                db_iterator.value().ok_or(LedgerError::IteratorMissingValue)?;
            let reference_tick =
                u64::from(shred::layout::get_reference_tick(data).unwrap_or(0));
            if ticks_since_first_insert < reference_tick + defer_threshold_ticks
            {
                // The higher index holes have not timed out yet
                break;
            }

            let num_to_take = max_missing - missing_indexes.len();
            missing_indexes
                .extend((prev_index..upper_index).take(num_to_take));

            if missing_indexes.len() == max_missing
                || current_slot > slot
                || current_index >= end_index
            {
                break;
            }

            prev_index = current_index + 1;
            db_iterator.next();
        }

        Ok(missing_indexes)
    }

    // -----------------
    // Duplicate slots
    // -----------------

    pub fn store_duplicate_slot(
        &self,
        slot: Slot,
        shred1: Vec<u8>,
        shred2: Vec<u8>,
    ) -> LedgerResult<()> {
        let duplicate_slot_proof = DuplicateSlotProof::new(shred1, shred2);
        self.duplicate_slots_cf.put(slot, &duplicate_slot_proof)
    }

    pub fn get_duplicate_slot(
        &self,
        slot: Slot,
    ) -> LedgerResult<Option<DuplicateSlotProof>> {
        self.duplicate_slots_cf.get(slot)
    }

    pub fn has_duplicate_shreds_in_slot(
        &self,
        slot: Slot,
    ) -> LedgerResult<bool> {
        Ok(self.duplicate_slots_cf.get(slot)?.is_some())
    }

    pub fn get_first_duplicate_proof(
        &self,
    ) -> LedgerResult<Option<(Slot, DuplicateSlotProof)>> {
        let mut iter = self.db.iter::<cf::DuplicateSlots>(
            IteratorMode::From(0, IteratorDirection::Forward),
        )?;
        Ok(iter.next().map(|(slot, proof_bytes)| {
            let proof = deserialize(&proof_bytes).unwrap_or_else(|e| {
                panic!("Could not deserialize DuplicateSlotProof for slot {slot}: {e:?}")
            });
            (slot, proof)
        }))
    }

    // -----------------
    // Bank hash
    // -----------------

    pub fn insert_bank_hash(
        &self,
        slot: Slot,
        frozen_hash: Hash,
        is_duplicate_confirmed: bool,
    ) -> LedgerResult<()> {
        let data = FrozenHashVersioned::Current(FrozenHashStatus {
            frozen_hash,
            is_duplicate_confirmed,
        });
        self.bank_hash_cf.put(slot, &data)
    }

    pub fn get_bank_hash(&self, slot: Slot) -> LedgerResult<Option<Hash>> {
        Ok(self
            .bank_hash_cf
            .get(slot)?
            .map(|versioned| versioned.frozen_hash()))
    }

    pub fn is_duplicate_confirmed(&self, slot: Slot) -> LedgerResult<bool> {
        Ok(self
            .bank_hash_cf
            .get(slot)?
            .map(|versioned| versioned.is_duplicate_confirmed())
            .unwrap_or(false))
    }

    // -----------------
    // Optimistic slots
    // -----------------

    pub fn insert_optimistic_slot(
        &self,
        slot: Slot,
        hash: &Hash,
        timestamp: UnixTimestamp,
    ) -> LedgerResult<()> {
        let slot_data = OptimisticSlotMetaVersioned::new(*hash, timestamp);
        self.optimistic_slots_cf.put(slot, &slot_data)
    }

    pub fn get_optimistic_slot(
        &self,
        slot: Slot,
    ) -> LedgerResult<Option<(Hash, UnixTimestamp)>> {
        Ok(self
            .optimistic_slots_cf
            .get(slot)?
            .map(|meta| (meta.hash(), meta.timestamp())))
    }

    /// Returns the latest `num` optimistically confirmed slots, newest first.
    pub fn get_latest_optimistic_slots(
        &self,
        num: usize,
    ) -> LedgerResult<Vec<(Slot, Hash, UnixTimestamp)>> {
        self.rpc_api_metrics
            .num_get_latest_optimistic_slots
            .fetch_add(1, Ordering::Relaxed);

        let iter = self.optimistic_slots_cf.iter(IteratorMode::End)?;
        Ok(iter
            .take(num)
            .map(|(slot, bytes)| {
                let meta: OptimisticSlotMetaVersioned = deserialize(&bytes)
                    .unwrap_or_else(|e| {
                        panic!("Could not deserialize OptimisticSlotMeta for slot {slot}: {e:?}")
                    });
                (slot, meta.hash(), meta.timestamp())
            })
            .collect())
    }

    // -----------------
    // Block time / height
    // -----------------

    pub fn get_block_time(
        &self,
        slot: Slot,
    ) -> LedgerResult<Option<UnixTimestamp>> {
        self.rpc_api_metrics
            .num_get_block_time
            .fetch_add(1, Ordering::Relaxed);
        let _lock = self.check_lowest_cleanup_slot(slot)?;
        self.blocktime_cf.get(slot)
    }

    pub fn cache_block_time(
        &self,
        slot: Slot,
        timestamp: UnixTimestamp,
    ) -> LedgerResult<()> {
        self.blocktime_cf.put(slot, &timestamp)
    }

    pub fn get_block_height(&self, slot: Slot) -> LedgerResult<Option<u64>> {
        self.rpc_api_metrics
            .num_get_block_height
            .fetch_add(1, Ordering::Relaxed);
        let _lock = self.check_lowest_cleanup_slot(slot)?;
        self.block_height_cf.get(slot)
    }

    pub fn cache_block_height(
        &self,
        slot: Slot,
        block_height: u64,
    ) -> LedgerResult<()> {
        self.block_height_cf.put(slot, &block_height)
    }

    // -----------------
    // Rewards
    // -----------------

    pub fn get_rewards(
        &self,
        slot: Slot,
    ) -> LedgerResult<Option<Vec<Reward>>> {
        let _lock = self.check_lowest_cleanup_slot(slot)?;
        Ok(self.rewards_cf.get_protobuf(slot)?.map(|rewards| {
            rewards.rewards.into_iter().map(Into::into).collect()
        }))
    }

    pub fn write_rewards(
        &self,
        slot: Slot,
        rewards: Vec<Reward>,
    ) -> LedgerResult<()> {
        let rewards: generated::Rewards = rewards.into();
        self.rewards_cf.put_protobuf(slot, &rewards)
    }

    // -----------------
    // Perf samples
    // -----------------

    pub fn get_recent_perf_samples(
        &self,
        num: usize,
    ) -> LedgerResult<Vec<(Slot, PerfSample)>> {
        self.rpc_api_metrics
            .num_get_recent_perf_samples
            .fetch_add(1, Ordering::Relaxed);

        let samples = self
            .db
            .iter::<cf::PerfSamples>(IteratorMode::End)?
            .take(num)
            .map(|(slot, data)| {
                deserialize::<PerfSample>(&data)
                    .map(|sample| (slot, sample))
                    .map_err(Into::into)
            });

        samples.collect()
    }

    pub fn write_perf_sample(
        &self,
        index: Slot,
        perf_sample: &PerfSample,
    ) -> LedgerResult<()> {
        self.perf_samples_cf.put(index, perf_sample)
    }

    // -----------------
    // Program costs
    // -----------------

    pub fn read_program_costs(&self) -> LedgerResult<Vec<(Pubkey, u64)>> {
        Ok(self
            .db
            .iter::<cf::ProgramCosts>(IteratorMode::End)?
            .map(|(pubkey, data)| {
                let program_cost: ProgramCost = deserialize(&data)
                    .unwrap_or_else(|e| {
                        panic!("Could not deserialize ProgramCost: {e:?}")
                    });
                (pubkey, program_cost.cost)
            })
            .collect())
    }

    pub fn write_program_cost(
        &self,
        key: &Pubkey,
        value: &u64,
    ) -> LedgerResult<()> {
        self.program_costs_cf
            .put(*key, &ProgramCost { cost: *value })
    }

    pub fn delete_program_cost(&self, key: &Pubkey) -> LedgerResult<()> {
        self.program_costs_cf.delete(*key)
    }

    // -----------------
    // Entries
    // -----------------

    /// Derives the contiguous shred-index ranges that form complete data
    /// blocks for `slot`, starting at `start_index`.
    fn get_completed_ranges(
        &self,
        slot: Slot,
        start_index: u64,
    ) -> LedgerResult<(CompletedRanges, Option<SlotMeta>)> {
        let (_lock, _) = self.ensure_lowest_cleanup_slot();

        let Some(slot_meta) = self.meta_cf.get(slot)? else {
            return Ok((vec![], None));
        };

        // Find all the ranges for the completed data blocks
        let completed_ranges = Self::get_completed_data_ranges(
            start_index as u32,
            &slot_meta.completed_data_indexes,
            slot_meta.consumed as u32,
        );

        Ok((completed_ranges, Some(slot_meta)))
    }

    /// Turns the completed-data boundaries within `[start_index, consumed)`
    /// into inclusive (begin, end) index pairs.
    fn get_completed_data_ranges(
        start_index: u32,
        completed_data_indexes: &BTreeSet<u32>,
        consumed: u32,
    ) -> CompletedRanges {
        // `consumed` is the next missing shred index, but shred `i` existing
        // in completed_data_indexes implies it's not missing
        assert!(!completed_data_indexes.contains(&consumed));
        completed_data_indexes
            .range(start_index..consumed)
            .scan(start_index, |begin, index| {
                let out = (*begin, *index);
                *begin = index + 1;
                Some(out)
            })
            .collect()
    }

    /// Fetches the data shreds of one completed range and deserializes their
    /// spliced payloads into entries.
    fn get_entries_in_data_block(
        &self,
        slot: Slot,
        start_index: u32,
        end_index: u32,
        slot_meta: Option<&SlotMeta>,
    ) -> LedgerResult<Vec<Entry>> {
        let keys: Vec<(Slot, u64)> = (start_index..=end_index)
            .map(|index| (slot, u64::from(index)))
            .collect();

        let data_shreds: Vec<Option<Vec<u8>>> = self
            .data_shred_cf
            .multi_get_bytes(keys)
            .into_iter()
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let data_shreds: Vec<Shred> = data_shreds
            .into_iter()
            .enumerate()
            .map(|(idx, shred_bytes)| {
                let Some(shred_bytes) = shred_bytes else {
                    let index = u64::from(start_index) + idx as u64;
                    if let Some(slot_meta) = slot_meta {
                        if slot > *self.lowest_cleanup_slot.read().unwrap() {
                            return Err(LedgerError::CorruptedBlockstore(format!(
                                "Shred with slot: {}, index: {}, consumed: {}, completed_indexes: {:?} must exist if shred index was included in a range: {} {}",
                                slot,
                                index,
                                slot_meta.consumed,
                                slot_meta.completed_data_indexes,
                                start_index,
                                end_index
                            )));
                        }
                    }
                    return Err(LedgerError::InvalidShredData(format!(
                        "Missing shred for slot {slot}, index {index}"
                    )));
                };
                Shred::new_from_serialized_shred(shred_bytes).map_err(|err| {
                    LedgerError::InvalidShredData(format!(
                        "Could not reconstruct shred from shred payload: {err:?}"
                    ))
                })
            })
            .collect::<LedgerResult<Vec<Shred>>>()?;

        let last_shred = data_shreds.last().unwrap();
        assert!(last_shred.data_complete() || last_shred.last_in_slot());

        let deshred_payload = shred::deshred(&data_shreds).map_err(|e| {
            LedgerError::InvalidShredData(format!(
                "could not reconstruct entries buffer from shreds: {e:?}"
            ))
        })?;

        bincode::deserialize::<Vec<Entry>>(&deshred_payload).map_err(|e| {
            LedgerError::InvalidEntryData(format!(
                "could not reconstruct entries: {e:?}"
            ))
        })
    }

    fn get_slot_entries_in_block(
        &self,
        slot: Slot,
        completed_ranges: CompletedRanges,
        slot_meta: Option<&SlotMeta>,
    ) -> LedgerResult<Vec<Entry>> {
        completed_ranges
            .into_iter()
            .map(|(start_index, end_index)| {
                self.get_entries_in_data_block(
                    slot, start_index, end_index, slot_meta,
                )
            })
            .collect::<LedgerResult<Vec<Vec<Entry>>>>()
            .map(|entries| entries.into_iter().flatten().collect())
    }

    pub fn get_slot_entries(
        &self,
        slot: Slot,
        shred_start_index: u64,
    ) -> LedgerResult<Vec<Entry>> {
        self.get_slot_entries_with_shred_info(slot, shred_start_index, false)
            .map(|x| x.0)
    }

    /// Returns the entry vector for the slot starting with `shred_start_index`,
    /// the number of shreds they cover, and whether the slot is full.
    pub fn get_slot_entries_with_shred_info(
        &self,
        slot: Slot,
        start_index: u64,
        allow_dead_slots: bool,
    ) -> LedgerResult<(Vec<Entry>, u64, bool)> {
        let (completed_ranges, slot_meta) =
            self.get_completed_ranges(slot, start_index)?;

        // Check if the slot is dead *after* fetching the completed ranges to
        // avoid a race where a slot is marked dead in between
        if self.is_dead(slot)? && !allow_dead_slots {
            return Err(LedgerError::DeadSlot(slot));
        } else if completed_ranges.is_empty() {
            return Ok((vec![], 0, false));
        }

        let slot_meta = slot_meta.unwrap();
        let num_shreds = completed_ranges
            .last()
            .map(|(_, end_index)| u64::from(*end_index) - start_index + 1)
            .unwrap_or(0);

        let entries =
            self.get_slot_entries_in_block(slot, completed_ranges, Some(&slot_meta))?;
        Ok((entries, num_shreds, slot_meta.is_full()))
    }

    // -----------------
    // Block
    // -----------------

    pub fn get_rooted_block(
        &self,
        slot: Slot,
        require_previous_blockhash: bool,
    ) -> LedgerResult<VersionedConfirmedBlock> {
        self.rpc_api_metrics
            .num_get_rooted_block
            .fetch_add(1, Ordering::Relaxed);
        let _lock = self.check_lowest_cleanup_slot(slot)?;

        if self.is_root(slot)? {
            return self.get_complete_block(slot, require_previous_blockhash);
        }
        Err(LedgerError::SlotNotRooted(slot))
    }

    pub fn get_complete_block(
        &self,
        slot: Slot,
        require_previous_blockhash: bool,
    ) -> LedgerResult<VersionedConfirmedBlock> {
        self.get_complete_block_with_entries(
            slot,
            require_previous_blockhash,
            false,
            false,
        )
        .map(|result| result.block)
    }

    pub fn get_complete_block_with_entries(
        &self,
        slot: Slot,
        require_previous_blockhash: bool,
        populate_entries: bool,
        allow_dead_slots: bool,
    ) -> LedgerResult<VersionedConfirmedBlockWithEntries> {
        self.rpc_api_metrics
            .num_get_complete_block
            .fetch_add(1, Ordering::Relaxed);

        let Some(slot_meta) = self.meta_cf.get(slot)? else {
            info!("SlotMeta not found for slot {}", slot);
            return Err(LedgerError::SlotUnavailable(slot));
        };
        if slot_meta.is_full() {
            let (slot_entries, _, _) = self.get_slot_entries_with_shred_info(
                slot,
                /*shred_start_index:*/ 0,
                allow_dead_slots,
            )?;
            if !slot_entries.is_empty() {
                let blockhash = slot_entries
                    .last()
                    .map(|entry| entry.hash)
                    .unwrap_or_else(|| panic!("Rooted slot {slot} must have blockhash"));

                let mut starting_transaction_index = 0;
                let mut entries = if populate_entries {
                    Vec::with_capacity(slot_entries.len())
                } else {
                    Vec::new()
                };
                let slot_transaction_iterator = slot_entries
                    .into_iter()
                    .flat_map(|entry| {
                        if populate_entries {
                            entries.push(EntrySummary {
                                num_hashes: entry.num_hashes,
                                hash: entry.hash,
                                num_transactions: entry.transactions.len()
                                    as u64,
                                starting_transaction_index,
                            });
                            starting_transaction_index +=
                                entry.transactions.len();
                        }
                        entry.transactions
                    })
                    .map(|transaction| {
                        if let Err(err) = transaction.sanitize() {
                            warn!(
                                "Ledger::get_block sanitize failed: {:?}, slot: {:?}, {:?}",
                                err, slot, transaction,
                            );
                        }
                        transaction
                    });

                let parent_slot_entries = slot_meta
                    .parent_slot
                    .map(|parent_slot| self.get_slot_entries(parent_slot, 0))
                    .transpose()?
                    .unwrap_or_default();
                if parent_slot_entries.is_empty() && require_previous_blockhash
                {
                    return Err(LedgerError::ParentEntriesUnavailable(slot));
                }
                let previous_blockhash = if !parent_slot_entries.is_empty() {
                    parent_slot_entries.last().unwrap().hash
                } else {
                    Hash::default()
                };

                let rewards = self
                    .rewards_cf
                    .get_protobuf(slot)?
                    .map(|rewards| {
                        rewards.rewards.into_iter().map(Into::into).collect()
                    })
                    .unwrap_or_default();

                // The Blocktime and BlockHeight column families are updated
                // asynchronously; they may not be written by the time the
                // complete slot entries are available. In these cases, these
                // columns will return None.
                let block_time = self.blocktime_cf.get(slot)?;
                let block_height = self.block_height_cf.get(slot)?;

                let block = VersionedConfirmedBlock {
                    previous_blockhash: previous_blockhash.to_string(),
                    blockhash: blockhash.to_string(),
                    parent_slot: slot_meta.parent_slot.unwrap_or_default(),
                    transactions: self.map_transactions_to_statuses(
                        slot,
                        slot_transaction_iterator,
                    )?,
                    rewards,
                    block_time,
                    block_height,
                };
                return Ok(VersionedConfirmedBlockWithEntries {
                    block,
                    entries,
                });
            }
        }
        Err(LedgerError::SlotUnavailable(slot))
    }

    fn map_transactions_to_statuses(
        &self,
        slot: Slot,
        iterator: impl Iterator<Item = VersionedTransaction>,
    ) -> LedgerResult<Vec<VersionedTransactionWithStatusMeta>> {
        iterator
            .map(|transaction| {
                let signature = transaction.signatures[0];
                Ok(VersionedTransactionWithStatusMeta {
                    transaction,
                    meta: self
                        .read_transaction_status((signature, slot))?
                        .ok_or(LedgerError::MissingTransactionMetadata)?,
                })
            })
            .collect()
    }

    /// The first signatures of the block's transactions, in transaction
    /// order.
    fn get_block_signatures(&self, slot: Slot) -> LedgerResult<Vec<Signature>> {
        let block = self.get_complete_block(slot, false).map_err(|err| {
            LedgerError::CorruptedBlockstore(format!(
                "Unable to get block: {err}"
            ))
        })?;

        Ok(block
            .transactions
            .into_iter()
            .filter_map(|transaction_with_meta| {
                transaction_with_meta
                    .transaction
                    .signatures
                    .into_iter()
                    .next()
            })
            .collect())
    }

    /// Like [`Self::get_block_signatures`] but in reverse transaction order.
    fn get_block_signatures_rev(
        &self,
        slot: Slot,
    ) -> LedgerResult<Vec<Signature>> {
        let block = self.get_complete_block(slot, false).map_err(|err| {
            LedgerError::CorruptedBlockstore(format!(
                "Unable to get block: {err}"
            ))
        })?;

        Ok(block
            .transactions
            .into_iter()
            .rev()
            .filter_map(|transaction_with_meta| {
                transaction_with_meta
                    .transaction
                    .signatures
                    .into_iter()
                    .next()
            })
            .collect())
    }

    // -----------------
    // TransactionStatus
    // -----------------

    /// Returns a transaction status if the transaction was observed in a
    /// rooted slot or one of the `confirmed_unrooted_slots`.
    pub fn get_transaction_status(
        &self,
        signature: Signature,
        confirmed_unrooted_slots: &HashSet<Slot>,
    ) -> LedgerResult<Option<(Slot, TransactionStatusMeta)>> {
        self.rpc_api_metrics
            .num_get_transaction_status
            .fetch_add(1, Ordering::Relaxed);

        self.get_transaction_status_with_counter(
            signature,
            confirmed_unrooted_slots,
        )
        .map(|(status, _)| status)
    }

    pub fn get_rooted_transaction_status(
        &self,
        signature: Signature,
    ) -> LedgerResult<Option<(Slot, TransactionStatusMeta)>> {
        self.rpc_api_metrics
            .num_get_rooted_transaction_status
            .fetch_add(1, Ordering::Relaxed);

        self.get_transaction_status(signature, &HashSet::default())
    }

    /// Returns a transaction status alongside the number of index keys the
    /// scan had to visit; the counter exists for tests.
    fn get_transaction_status_with_counter(
        &self,
        signature: Signature,
        confirmed_unrooted_slots: &HashSet<Slot>,
    ) -> LedgerResult<(Option<(Slot, TransactionStatusMeta)>, u64)> {
        let mut counter = 0;
        let (lock, _) = self.ensure_lowest_cleanup_slot();
        let first_available_block = self.get_first_available_block()?;

        let iterator = self
            .transaction_status_cf
            .iter_current_index_filtered(IteratorMode::From(
                (signature, first_available_block),
                IteratorDirection::Forward,
            ))?;

        for ((stat_signature, slot), _data) in iterator {
            counter += 1;
            if stat_signature != signature {
                break;
            }
            if !self.is_root(slot)?
                && !confirmed_unrooted_slots.contains(&slot)
            {
                continue;
            }
            let status = self
                .transaction_status_cf
                .get_protobuf((signature, slot))?
                .ok_or(LedgerError::MissingColumnValue(
                    cf::TransactionStatus::NAME,
                ))?;
            let status: TransactionStatusMeta = status
                .try_into()
                .map_err(|_| LedgerError::TransactionStatusMetaConversion)?;
            drop(lock);
            return Ok((Some((slot, status)), counter));
        }
        drop(lock);
        Ok((None, counter))
    }

    pub fn read_transaction_status(
        &self,
        index: (Signature, Slot),
    ) -> LedgerResult<Option<TransactionStatusMeta>> {
        let result = {
            let (_lock, _) = self.ensure_lowest_cleanup_slot();
            self.transaction_status_cf.get_protobuf(index)
        }?;
        Ok(result.and_then(|meta| meta.try_into().ok()))
    }

    pub fn write_transaction_status(
        &self,
        slot: Slot,
        signature: Signature,
        writable_keys: Vec<&Pubkey>,
        readonly_keys: Vec<&Pubkey>,
        status: TransactionStatusMeta,
        transaction_index: usize,
    ) -> LedgerResult<()> {
        let transaction_index = u32::try_from(transaction_index)
            .map_err(|_| LedgerError::TransactionIndexOverflow)?;
        for address in writable_keys {
            self.address_signatures_cf.put(
                (*address, slot, transaction_index, signature),
                &AddressSignatureMeta { writeable: true },
            )?;
        }
        for address in readonly_keys {
            self.address_signatures_cf.put(
                (*address, slot, transaction_index, signature),
                &AddressSignatureMeta { writeable: false },
            )?;
        }
        let status = status.into();
        self.transaction_status_cf
            .put_protobuf((signature, slot), &status)?;
        Ok(())
    }

    // -----------------
    // TransactionMemos
    // -----------------

    pub fn read_transaction_memos(
        &self,
        signature: Signature,
        slot: Slot,
    ) -> LedgerResult<Option<String>> {
        self.transaction_memos_cf.get((signature, slot))
    }

    pub fn write_transaction_memos(
        &self,
        signature: &Signature,
        slot: Slot,
        memos: String,
    ) -> LedgerResult<()> {
        self.transaction_memos_cf.put((*signature, slot), &memos)
    }

    // -----------------
    // Transaction
    // -----------------

    /// Returns a complete transaction if it was processed in a root, or in
    /// any slot on the ancestry of `highest_confirmed_slot` above the
    /// current max root.
    pub fn get_complete_transaction(
        &self,
        signature: Signature,
        highest_confirmed_slot: Slot,
    ) -> LedgerResult<Option<ConfirmedTransactionWithStatusMeta>> {
        self.rpc_api_metrics
            .num_get_complete_transaction
            .fetch_add(1, Ordering::Relaxed);

        let max_root = self.max_root();
        let confirmed_unrooted_slots =
            self.confirmed_unrooted_ancestors(highest_confirmed_slot, max_root)?;
        self.get_transaction_with_status(signature, &confirmed_unrooted_slots)
    }

    fn confirmed_unrooted_ancestors(
        &self,
        highest_confirmed_slot: Slot,
        max_root: Slot,
    ) -> LedgerResult<HashSet<Slot>> {
        let mut confirmed_unrooted_slots = HashSet::new();
        let mut ancestors =
            AncestorIterator::new_inclusive(highest_confirmed_slot, self);
        while let Some(slot) = ancestors.try_next()? {
            if slot <= max_root {
                break;
            }
            confirmed_unrooted_slots.insert(slot);
        }
        Ok(confirmed_unrooted_slots)
    }

    fn get_transaction_with_status(
        &self,
        signature: Signature,
        confirmed_unrooted_slots: &HashSet<Slot>,
    ) -> LedgerResult<Option<ConfirmedTransactionWithStatusMeta>> {
        if let Some((slot, meta)) =
            self.get_transaction_status(signature, confirmed_unrooted_slots)?
        {
            let transaction = self
                .find_transaction_in_slot(slot, signature)?
                .ok_or(LedgerError::TransactionStatusSlotMismatch)?; // Should not happen

            let block_time = self.get_block_time(slot)?;
            Ok(Some(ConfirmedTransactionWithStatusMeta {
                slot,
                tx_with_meta: TransactionWithStatusMeta::Complete(
                    VersionedTransactionWithStatusMeta { transaction, meta },
                ),
                block_time,
            }))
        } else {
            Ok(None)
        }
    }

    /// Linearly scans the slot's entries for the transaction with the given
    /// first signature. This is a performance hot-spot for large slots.
    fn find_transaction_in_slot(
        &self,
        slot: Slot,
        signature: Signature,
    ) -> LedgerResult<Option<VersionedTransaction>> {
        let slot_entries = self.get_slot_entries(slot, 0)?;
        Ok(slot_entries
            .iter()
            .cloned()
            .flat_map(|entry| entry.transactions)
            .map(|transaction| {
                if let Err(err) = transaction.sanitize() {
                    warn!(
                        "Ledger::find_transaction_in_slot sanitize failed: {:?}, slot: {:?}, {:?}",
                        err, slot, transaction,
                    );
                }
                transaction
            })
            .find(|transaction| transaction.signatures[0] == signature))
    }

    // -----------------
    // Signatures for address
    // -----------------

    /// All (slot, signature) pairs of the address within `slot`, in
    /// transaction-index order.
    fn find_address_signatures_for_slot(
        &self,
        pubkey: Pubkey,
        slot: Slot,
    ) -> LedgerResult<Vec<(Slot, Signature)>> {
        let (lock, lowest_available_slot) = self.ensure_lowest_cleanup_slot();
        let mut signatures: Vec<(Slot, Signature)> = vec![];
        if slot < lowest_available_slot {
            drop(lock);
            return Ok(signatures);
        }
        let index_iterator = self
            .address_signatures_cf
            .iter_current_index_filtered(IteratorMode::From(
                (
                    pubkey,
                    slot.max(lowest_available_slot),
                    0,
                    Signature::default(),
                ),
                IteratorDirection::Forward,
            ))?;
        for ((address, transaction_slot, _transaction_index, signature), _) in
            index_iterator
        {
            if transaction_slot > slot || address != pubkey {
                break;
            }
            signatures.push((slot, signature));
        }
        drop(lock);
        Ok(signatures)
    }

    /// Gets signatures of transactions that involved `address`, newest to
    /// oldest: at most `limit` of them, at or below `highest_slot`, starting
    /// below `before` and stopping at `until` (both exclusive) when provided.
    pub fn get_confirmed_signatures_for_address2(
        &self,
        address: Pubkey,
        highest_slot: Slot, // highest_confirmed_slot
        before: Option<Signature>,
        until: Option<Signature>,
        limit: usize,
    ) -> LedgerResult<SignatureInfosForAddress> {
        self.rpc_api_metrics
            .num_get_confirmed_signatures_for_address2
            .fetch_add(1, Ordering::Relaxed);

        // 1. Resolve which unrooted ancestors of `highest_slot` are still
        //    addressable
        let max_root = self.max_root();
        let confirmed_unrooted_slots =
            self.confirmed_unrooted_ancestors(highest_slot, max_root)?;

        // 2. Determine the slot to start searching backwards from, and the
        //    signatures of that slot that sit at or after `before`
        let (slot, before_excluded_signatures) = match before {
            None => (highest_slot, None),
            Some(before) => {
                let transaction_status = self
                    .get_transaction_status(before, &confirmed_unrooted_slots)?;
                match transaction_status {
                    None => return Ok(SignatureInfosForAddress::default()),
                    Some((slot, _)) => {
                        let mut slot_signatures =
                            self.get_block_signatures_rev(slot)?;
                        if let Some(pos) = slot_signatures
                            .iter()
                            .position(|&signature| signature == before)
                        {
                            slot_signatures.truncate(pos + 1);
                        }
                        (
                            slot,
                            Some(
                                slot_signatures
                                    .into_iter()
                                    .collect::<HashSet<_>>(),
                            ),
                        )
                    }
                }
            }
        };

        // 3. Determine the lowest slot to search, and the signatures of that
        //    slot that sit at or before `until`
        let (lowest_slot, until_excluded_signatures) = match until {
            None => (self.get_first_available_block()?, HashSet::new()),
            Some(until) => {
                let transaction_status = self
                    .get_transaction_status(until, &confirmed_unrooted_slots)?;
                match transaction_status {
                    None => (self.get_first_available_block()?, HashSet::new()),
                    Some((slot, _)) => {
                        let mut slot_signatures =
                            self.get_block_signatures(slot)?;
                        if let Some(pos) = slot_signatures
                            .iter()
                            .position(|&signature| signature == until)
                        {
                            slot_signatures.truncate(pos + 1);
                        }
                        (slot, slot_signatures.into_iter().collect())
                    }
                }
            }
        };

        // 4. Collect the still-included signatures within the starting slot
        let mut address_signatures: Vec<(Slot, Signature)> = vec![];
        if slot >= lowest_slot {
            let mut signatures =
                self.find_address_signatures_for_slot(address, slot)?;
            signatures.reverse();
            address_signatures.extend(signatures.into_iter().filter(
                |(_, signature)| {
                    before_excluded_signatures
                        .as_ref()
                        .map(|excluded| !excluded.contains(signature))
                        .unwrap_or(true)
                        && !until_excluded_signatures.contains(signature)
                },
            ));
        }

        // 5. Iterate backwards through the remaining slots
        {
            let (lock, _) = self.ensure_lowest_cleanup_slot();
            let index_iterator = self
                .address_signatures_cf
                .iter_current_index_filtered(IteratorMode::From(
                    (address, slot, 0, Signature::default()),
                    IteratorDirection::Reverse,
                ))?;
            for (
                (key_address, key_slot, _transaction_index, signature),
                _,
            ) in index_iterator
            {
                if address_signatures.len() >= limit {
                    break;
                }
                if key_address != address {
                    break;
                }
                if key_slot < lowest_slot {
                    break;
                }
                if !self.is_root(key_slot)?
                    && !confirmed_unrooted_slots.contains(&key_slot)
                {
                    continue;
                }
                if until_excluded_signatures.contains(&signature) {
                    continue;
                }
                address_signatures.push((key_slot, signature));
            }
            drop(lock);
        }
        address_signatures.truncate(limit);

        // 6. Resolve status / memo / block time for everything retained
        let mut infos = vec![];
        for (slot, signature) in address_signatures.into_iter() {
            let transaction_status =
                self.read_transaction_status((signature, slot))?;
            let err = transaction_status.and_then(|meta| meta.status.err());
            let memo = self.read_transaction_memos(signature, slot)?;
            let block_time = self.get_block_time(slot)?;
            infos.push(ConfirmedTransactionStatusWithSignature {
                signature,
                slot,
                err,
                memo,
                block_time,
            });
        }

        Ok(SignatureInfosForAddress {
            infos,
            found_before: true,
        })
    }

    // -----------------
    // Cleanup
    // -----------------

    /// Removes ledger content for slots `[from, to]` and advances the
    /// cleanup watermark. The write-lock on `lowest_cleanup_slot` is held
    /// across the deletion so readers holding the read guard never observe a
    /// partially-cleaned slot.
    ///
    /// Roots are kept; the signature-keyed columns are reclaimed lazily by
    /// compaction.
    pub fn purge_slots(&self, from: Slot, to: Slot) -> LedgerResult<()> {
        let mut lowest_cleanup_slot = self.lowest_cleanup_slot.write().unwrap();
        *lowest_cleanup_slot = cmp::max(*lowest_cleanup_slot, to);

        let mut batch = self.db.batch()?;
        self.db.delete_range_cf::<cf::SlotMeta>(&mut batch, from, to)?;
        self.db.delete_range_cf::<cf::ShredData>(&mut batch, from, to)?;
        self.db.delete_range_cf::<cf::ShredCode>(&mut batch, from, to)?;
        self.db.delete_range_cf::<cf::DeadSlots>(&mut batch, from, to)?;
        self.db
            .delete_range_cf::<cf::DuplicateSlots>(&mut batch, from, to)?;
        self.db.delete_range_cf::<cf::BankHash>(&mut batch, from, to)?;
        self.db
            .delete_range_cf::<cf::OptimisticSlots>(&mut batch, from, to)?;
        self.db.delete_range_cf::<cf::Blocktime>(&mut batch, from, to)?;
        self.db
            .delete_range_cf::<cf::BlockHeight>(&mut batch, from, to)?;
        self.db.delete_range_cf::<cf::Rewards>(&mut batch, from, to)?;
        self.db
            .delete_range_cf::<cf::PerfSamples>(&mut batch, from, to)?;
        self.db.write(batch)?;

        // Shred files dominate the storage footprint; reclaim them eagerly
        // instead of waiting for compaction
        self.db.delete_file_in_range_cf::<cf::ShredData>(from, to)?;
        self.db.delete_file_in_range_cf::<cf::ShredCode>(from, to)?;
        Ok(())
    }
}

// -----------------
// Tests
// -----------------
#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use assert_matches::assert_matches;
    use tempfile::TempDir;
    use test_tools_core::init_logger;

    use super::*;

    fn setup() -> (TempDir, Ledger) {
        let dir = TempDir::new().unwrap();
        let ledger = Ledger::open(dir.path()).unwrap();
        (dir, ledger)
    }

    #[test]
    fn test_get_completed_data_ranges() {
        init_logger!();

        let completed_data_indexes: BTreeSet<u32> =
            [2, 4, 9, 11].into_iter().collect();

        // Consumed is 1, which means we're missing shred with index 1, should
        // return an empty list
        let mut expected: Vec<(u32, u32)> = vec![];
        assert_eq!(
            Ledger::get_completed_data_ranges(0, &completed_data_indexes, 1),
            expected,
        );

        // Test all ranges up to consumed == 3
        expected = vec![(0, 2)];
        assert_eq!(
            Ledger::get_completed_data_ranges(0, &completed_data_indexes, 3),
            expected,
        );

        expected = vec![(0, 2), (3, 4)];
        assert_eq!(
            Ledger::get_completed_data_ranges(0, &completed_data_indexes, 5),
            expected,
        );

        expected = vec![(0, 2), (3, 4), (5, 9), (10, 11)];
        assert_eq!(
            Ledger::get_completed_data_ranges(0, &completed_data_indexes, 12),
            expected,
        );

        // Starting from the middle of a range only yields the boundaries at
        // or above the start
        expected = vec![(4, 4), (5, 9), (10, 11)];
        assert_eq!(
            Ledger::get_completed_data_ranges(4, &completed_data_indexes, 12),
            expected,
        );

        expected = vec![(5, 9), (10, 11)];
        assert_eq!(
            Ledger::get_completed_data_ranges(5, &completed_data_indexes, 12),
            expected,
        );
    }

    #[test]
    #[should_panic]
    fn test_get_completed_data_ranges_consumed_precondition() {
        let completed_data_indexes: BTreeSet<u32> =
            [2, 4, 9].into_iter().collect();
        // `consumed` may never be a completed boundary itself
        Ledger::get_completed_data_ranges(0, &completed_data_indexes, 4);
    }

    #[test]
    fn test_check_lowest_cleanup_slot() {
        init_logger!();
        let (_dir, ledger) = setup();

        assert!(ledger.check_lowest_cleanup_slot(5).is_ok());

        *ledger.lowest_cleanup_slot.write().unwrap() = 5;

        assert_matches!(
            ledger.check_lowest_cleanup_slot(5),
            Err(LedgerError::SlotCleanedUp)
        );
        assert_matches!(
            ledger.check_lowest_cleanup_slot(4),
            Err(LedgerError::SlotCleanedUp)
        );
        assert!(ledger.check_lowest_cleanup_slot(6).is_ok());
    }

    #[test]
    fn test_ensure_lowest_cleanup_slot_saturates() {
        init_logger!();
        let (_dir, ledger) = setup();

        {
            let (_lock, lowest_available_slot) =
                ledger.ensure_lowest_cleanup_slot();
            assert_eq!(lowest_available_slot, 1);
        }

        *ledger.lowest_cleanup_slot.write().unwrap() = u64::MAX;
        let (_lock, lowest_available_slot) =
            ledger.ensure_lowest_cleanup_slot();
        assert_eq!(lowest_available_slot, u64::MAX);
    }

    #[test]
    fn test_max_root_is_monotonic() {
        init_logger!();
        let (_dir, ledger) = setup();

        assert_eq!(ledger.max_root(), 0);
        ledger.set_roots([2u64, 5, 3].iter()).unwrap();
        assert_eq!(ledger.max_root(), 5);
        ledger.set_roots([4u64].iter()).unwrap();
        assert_eq!(ledger.max_root(), 5);
    }

    #[test]
    fn test_max_root_restored_on_open() {
        init_logger!();
        let dir = TempDir::new().unwrap();
        {
            let ledger = Ledger::open(dir.path()).unwrap();
            ledger.set_roots([7u64, 11].iter()).unwrap();
        }
        let reopened = Ledger::open(dir.path()).unwrap();
        assert_eq!(reopened.max_root(), 11);
    }

    #[test]
    fn test_get_transaction_status_with_counter_stops_on_signature_change() {
        init_logger!();
        let (_dir, ledger) = setup();

        let signature = Signature::from([3u8; 64]);
        let other_signature = Signature::from([4u8; 64]);
        ledger
            .write_transaction_status(
                4,
                signature,
                vec![],
                vec![],
                TransactionStatusMeta::default(),
                0,
            )
            .unwrap();
        ledger
            .write_transaction_status(
                7,
                other_signature,
                vec![],
                vec![],
                TransactionStatusMeta::default(),
                0,
            )
            .unwrap();

        // Not rooted and not confirmed-unrooted: skipped entirely
        let (status, _) = ledger
            .get_transaction_status_with_counter(signature, &HashSet::new())
            .unwrap();
        assert!(status.is_none());

        // Present once its slot is declared confirmed-unrooted
        let confirmed_unrooted: HashSet<Slot> = [4u64].into_iter().collect();
        let (status, counter) = ledger
            .get_transaction_status_with_counter(signature, &confirmed_unrooted)
            .unwrap();
        let (slot, _meta) = status.unwrap();
        assert_eq!(slot, 4);
        assert_eq!(counter, 1);

        // The scan for an absent signature stops as soon as the keyspace
        // leaves that signature
        let absent = Signature::from([2u8; 64]);
        let (status, counter) = ledger
            .get_transaction_status_with_counter(absent, &confirmed_unrooted)
            .unwrap();
        assert!(status.is_none());
        assert_eq!(counter, 1);
    }
}

use std::{
    cell::RefCell,
    sync::atomic::{AtomicU64, AtomicUsize, Ordering},
    time::{Duration, Instant},
};

use rocksdb::perf::{
    set_perf_stats, PerfContext, PerfMetric, PerfStatsLevel,
};
use solana_metrics::datapoint_info;
use solana_sdk::timing::timestamp;

use crate::database::options::LedgerColumnOptions;

/// Sentinel value reported when reading a RocksDB property fails.
pub const BLOCKSTORE_METRICS_ERROR: i64 = -1;

// The minimum time duration between two RocksDB perf samples of the same operation.
const PERF_SAMPLING_MIN_DURATION: Duration = Duration::from_secs(1);

pub const PERF_METRIC_OP_NAME_GET: &str = "get";
pub const PERF_METRIC_OP_NAME_MULTI_GET: &str = "multi_get";
pub const PERF_METRIC_OP_NAME_PUT: &str = "put";

#[derive(Debug, Default)]
/// A struct that holds the current status of RocksDB perf sampling.
pub struct PerfSamplingStatus {
    // The number of RocksDB operations since the last perf sample.
    op_count: AtomicUsize,
    // The timestamp of the latest operation with perf stats collection.
    last_sample_time_ms: AtomicU64,
}

impl PerfSamplingStatus {
    fn should_sample(&self, sample_count_interval: usize) -> bool {
        if sample_count_interval == 0 {
            return false;
        }

        // Rate-limiting based on the number of samples.
        if self.op_count.fetch_add(1, Ordering::Relaxed)
            < sample_count_interval
        {
            return false;
        }
        self.op_count.store(0, Ordering::Relaxed);

        // Rate-limiting based on the time duration.
        let current_time_ms = timestamp();
        let old_time_ms = self.last_sample_time_ms.load(Ordering::Relaxed);
        if old_time_ms + (PERF_SAMPLING_MIN_DURATION.as_millis() as u64)
            > current_time_ms
        {
            return false;
        }

        // If the `last_sample_time_ms` has a different value than
        // `old_time_ms`, it means some other thread has performed the sampling
        // and updated the last sample time.  In this case, the current thread
        // will skip the current sample.
        self.last_sample_time_ms
            .compare_exchange_weak(
                old_time_ms,
                current_time_ms,
                Ordering::Relaxed,
                Ordering::Relaxed,
            )
            .is_ok()
    }
}

// Thread local instance of RocksDB's PerfContext.
thread_local! {static PER_THREAD_ROCKS_PERF_CONTEXT: RefCell<PerfContext> = RefCell::new(PerfContext::default());}

/// The function enables RocksDB PerfContext once for every `sample_interval`.
///
/// PerfContext is a thread-local struct defined in RocksDB for collecting
/// per-thread read / write performance metrics.
///
/// When this function enables PerfContext, the function will return the
/// sampling start time, and the PerfContext of the subsequent RocksDB
/// operation will be collected.
pub(crate) fn maybe_enable_rocksdb_perf(
    sample_interval: usize,
    perf_status: &PerfSamplingStatus,
) -> Option<Instant> {
    if perf_status.should_sample(sample_interval) {
        set_perf_stats(PerfStatsLevel::EnableTime);
        PER_THREAD_ROCKS_PERF_CONTEXT.with(|perf_context| {
            perf_context.borrow_mut().reset();
        });
        return Some(Instant::now());
    }
    None
}

/// Reports the collected PerfContext and disables the perf stats.
pub(crate) fn report_rocksdb_read_perf(
    cf_name: &'static str,
    op_name: &'static str,
    total_op_duration: &Duration,
    column_options: &LedgerColumnOptions,
) {
    PER_THREAD_ROCKS_PERF_CONTEXT.with(|perf_context_cell| {
        set_perf_stats(PerfStatsLevel::Disable);
        let perf_context = perf_context_cell.borrow();
        datapoint_info!(
            "blockstore_rocksdb_read_perf",
            ("cf_name", cf_name, String),
            ("op_name", op_name, String),
            (
                "storage_type",
                column_options.get_storage_type_string(),
                String
            ),
            ("total_op_nanos", total_op_duration.as_nanos() as i64, i64),
            (
                "user_key_comparison_count",
                perf_context.metric(PerfMetric::UserKeyComparisonCount) as i64,
                i64
            ),
            (
                "block_read_count",
                perf_context.metric(PerfMetric::BlockReadCount) as i64,
                i64
            ),
            (
                "block_read_byte",
                perf_context.metric(PerfMetric::BlockReadByte) as i64,
                i64
            ),
            (
                "block_read_nanos",
                perf_context.metric(PerfMetric::BlockReadTime) as i64,
                i64
            ),
            (
                "block_checksum_nanos",
                perf_context.metric(PerfMetric::BlockChecksumTime) as i64,
                i64
            ),
            (
                "get_from_memtable_nanos",
                perf_context.metric(PerfMetric::GetFromMemtableTime) as i64,
                i64
            ),
            (
                "seek_on_memtable_count",
                perf_context.metric(PerfMetric::SeekOnMemtableCount) as i64,
                i64
            ),
        );
    });
}

pub(crate) fn report_rocksdb_write_perf(
    cf_name: &'static str,
    op_name: &'static str,
    total_op_duration: &Duration,
    column_options: &LedgerColumnOptions,
) {
    PER_THREAD_ROCKS_PERF_CONTEXT.with(|perf_context_cell| {
        set_perf_stats(PerfStatsLevel::Disable);
        let perf_context = perf_context_cell.borrow();
        datapoint_info!(
            "blockstore_rocksdb_write_perf",
            ("cf_name", cf_name, String),
            ("op_name", op_name, String),
            (
                "storage_type",
                column_options.get_storage_type_string(),
                String
            ),
            ("total_op_nanos", total_op_duration.as_nanos() as i64, i64),
            (
                "write_wal_nanos",
                perf_context.metric(PerfMetric::WriteWalTime) as i64,
                i64
            ),
            (
                "write_memtable_nanos",
                perf_context.metric(PerfMetric::WriteMemtableTime) as i64,
                i64
            ),
            (
                "write_pre_and_post_process_nanos",
                perf_context.metric(PerfMetric::WritePreAndPostProcessTime)
                    as i64,
                i64
            ),
        );
    });
}

/// RocksDB per column-family properties, gathered on demand and reported
/// as a single datapoint.
pub struct BlockstoreRocksDbColumnFamilyMetrics {
    pub total_sst_files_size: i64,
    pub size_all_mem_tables: i64,
    pub num_snapshots: i64,
    pub oldest_snapshot_time: i64,
    pub actual_delayed_write_rate: i64,
    pub is_write_stopped: i64,
    pub block_cache_capacity: i64,
    pub block_cache_usage: i64,
    pub block_cache_pinned_usage: i64,
    pub estimate_table_readers_mem: i64,
    pub mem_table_flush_pending: i64,
    pub compaction_pending: i64,
    pub num_running_compactions: i64,
    pub num_running_flushes: i64,
    pub estimate_oldest_key_time: i64,
    pub background_errors: i64,
}

impl BlockstoreRocksDbColumnFamilyMetrics {
    pub fn report_metrics(
        &self,
        cf_name: &'static str,
        column_options: &LedgerColumnOptions,
    ) {
        datapoint_info!(
            "blockstore_rocksdb_cfs",
            ("cf_name", cf_name, String),
            (
                "storage_type",
                column_options.get_storage_type_string(),
                String
            ),
            ("total_sst_files_size", self.total_sst_files_size, i64),
            ("size_all_mem_tables", self.size_all_mem_tables, i64),
            ("num_snapshots", self.num_snapshots, i64),
            ("oldest_snapshot_time", self.oldest_snapshot_time, i64),
            (
                "actual_delayed_write_rate",
                self.actual_delayed_write_rate,
                i64
            ),
            ("is_write_stopped", self.is_write_stopped, i64),
            ("block_cache_capacity", self.block_cache_capacity, i64),
            ("block_cache_usage", self.block_cache_usage, i64),
            (
                "block_cache_pinned_usage",
                self.block_cache_pinned_usage,
                i64
            ),
            (
                "estimate_table_readers_mem",
                self.estimate_table_readers_mem,
                i64
            ),
            ("mem_table_flush_pending", self.mem_table_flush_pending, i64),
            ("compaction_pending", self.compaction_pending, i64),
            ("num_running_compactions", self.num_running_compactions, i64),
            ("num_running_flushes", self.num_running_flushes, i64),
            (
                "estimate_oldest_key_time",
                self.estimate_oldest_key_time,
                i64
            ),
            ("background_errors", self.background_errors, i64),
        );
    }
}

/// A metrics struct to track the number of times each public reader
/// operation is called.
#[derive(Default)]
pub struct LedgerRpcApiMetrics {
    pub num_get_complete_block: AtomicU64,
    pub num_get_rooted_block: AtomicU64,
    pub num_get_block_time: AtomicU64,
    pub num_get_block_height: AtomicU64,
    pub num_get_complete_transaction: AtomicU64,
    pub num_get_transaction_status: AtomicU64,
    pub num_get_rooted_transaction_status: AtomicU64,
    pub num_get_confirmed_signatures_for_address2: AtomicU64,
    pub num_get_first_available_block: AtomicU64,
    pub num_get_recent_perf_samples: AtomicU64,
    pub num_get_latest_optimistic_slots: AtomicU64,
}

impl LedgerRpcApiMetrics {
    pub fn report(&self) {
        datapoint_info!(
            "blockstore_rpc_api",
            (
                "num_get_complete_block",
                self.num_get_complete_block.swap(0, Ordering::Relaxed) as i64,
                i64
            ),
            (
                "num_get_rooted_block",
                self.num_get_rooted_block.swap(0, Ordering::Relaxed) as i64,
                i64
            ),
            (
                "num_get_block_time",
                self.num_get_block_time.swap(0, Ordering::Relaxed) as i64,
                i64
            ),
            (
                "num_get_block_height",
                self.num_get_block_height.swap(0, Ordering::Relaxed) as i64,
                i64
            ),
            (
                "num_get_complete_transaction",
                self.num_get_complete_transaction.swap(0, Ordering::Relaxed)
                    as i64,
                i64
            ),
            (
                "num_get_transaction_status",
                self.num_get_transaction_status.swap(0, Ordering::Relaxed)
                    as i64,
                i64
            ),
            (
                "num_get_rooted_transaction_status",
                self.num_get_rooted_transaction_status
                    .swap(0, Ordering::Relaxed) as i64,
                i64
            ),
            (
                "num_get_confirmed_signatures_for_address2",
                self.num_get_confirmed_signatures_for_address2
                    .swap(0, Ordering::Relaxed) as i64,
                i64
            ),
            (
                "num_get_first_available_block",
                self.num_get_first_available_block.swap(0, Ordering::Relaxed)
                    as i64,
                i64
            ),
            (
                "num_get_recent_perf_samples",
                self.num_get_recent_perf_samples.swap(0, Ordering::Relaxed)
                    as i64,
                i64
            ),
            (
                "num_get_latest_optimistic_slots",
                self.num_get_latest_optimistic_slots
                    .swap(0, Ordering::Relaxed) as i64,
                i64
            ),
        );
    }
}

use rocksdb::Options;

use super::options::AccessType;

/// Maximum size of the RocksDB info log files before rotation.
const MAX_LOG_FILE_SIZE: usize = 50 * 1024 * 1024;
/// Number of rotated RocksDB info log files to keep around.
const KEEP_LOG_FILE_NUM: usize = 10;
/// Maximum total size of the write ahead log.
const MAX_TOTAL_WAL_SIZE: u64 = 4 * 1024 * 1024 * 1024;

pub fn get_rocksdb_options(access_type: &AccessType) -> Options {
    let mut options = Options::default();

    // Create missing items to support a clean start
    options.create_if_missing(true);
    options.create_missing_column_families(true);

    // rocksdb builds two threadpools: low and high priority. The low priority
    // pool is used for compactions whereas the high priority pool is used for
    // memtable flushes. Separate pools are created so that compactions are
    // unable to stall memtable flushes (which could stall memtable writes).
    #[allow(deprecated)]
    {
        options.set_max_background_compactions(num_cpus::get() as i32);
        options.set_max_background_flushes(((num_cpus::get() / 4).max(1)) as i32);
    }
    options.set_max_total_wal_size(MAX_TOTAL_WAL_SIZE);

    if should_disable_auto_compactions(access_type) {
        options.set_disable_auto_compactions(true);
    }

    // Logs grow at < 5 MB / hour, so this provides several days of logs
    options.set_max_log_file_size(MAX_LOG_FILE_SIZE);
    options.set_keep_log_file_num(KEEP_LOG_FILE_NUM);

    // Allow Rocks to open/keep open as many files as it needs for performance;
    // however, this is also explicitly required for a secondary instance.
    // See https://github.com/facebook/rocksdb/wiki/Secondary-instance
    options.set_max_open_files(-1);

    options
}

// Returns whether automatic compactions should be disabled for the entire
// database based upon the given access type.
pub fn should_disable_auto_compactions(access_type: &AccessType) -> bool {
    // Leave automatic compactions enabled (do not disable) in Primary mode;
    // disable in all other modes to prevent accidental cleaning
    !matches!(access_type, AccessType::Primary)
}

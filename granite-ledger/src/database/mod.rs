pub mod cf_descriptors;
pub mod columns;
pub mod db;
pub mod iterator;
pub mod ledger_column;
pub mod meta;
pub mod options;
pub mod rocks_db;
pub mod rocksdb_options;
pub mod write_batch;

use std::time::Instant;

use solana_sdk::{hash::Hash, pubkey::Pubkey, signature::Signature};

/// A transaction awaiting confirmation, as tracked by the forwarder.
#[derive(Clone, Debug)]
pub struct TransactionInfo {
    pub signature: Signature,
    /// The serialized transaction as it goes out on the wire.
    pub wire_transaction: Vec<u8>,
    /// The block height after which the transaction's blockhash is expired.
    pub last_valid_block_height: u64,
    /// (nonce account, nonce value) for durable-nonce transactions.
    pub durable_nonce_info: Option<(Pubkey, Hash)>,
    /// Caller-provided cap on resends; unlimited when absent.
    pub max_retries: Option<usize>,
    pub retries: usize,
    /// When the transaction last went out, `None` until the first send.
    pub last_sent_time: Option<Instant>,
}

impl TransactionInfo {
    pub fn new(
        signature: Signature,
        wire_transaction: Vec<u8>,
        last_valid_block_height: u64,
        durable_nonce_info: Option<(Pubkey, Hash)>,
        max_retries: Option<usize>,
    ) -> Self {
        Self {
            signature,
            wire_transaction,
            last_valid_block_height,
            durable_nonce_info,
            max_retries,
            retries: 0,
            last_sent_time: None,
        }
    }
}

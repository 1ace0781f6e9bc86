use solana_sdk::pubkey::Pubkey;
use thiserror::Error;

pub type ForwarderResult<T> = std::result::Result<T, ForwarderError>;

#[derive(Error, Debug)]
pub enum ForwarderError {
    #[error("RPC client error: {0}")]
    RpcClient(#[from] solana_rpc_client_api::client_error::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("leader schedule unavailable")]
    LeaderScheduleUnavailable,
    #[error("leader schedule does not cover slot index {0}")]
    LeaderScheduleExhausted(usize),
    #[error("no known TPU address for leader {0}")]
    MissingTpuAddress(Pubkey),
}

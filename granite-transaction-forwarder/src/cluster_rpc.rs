use solana_rpc_client::rpc_client::RpcClient;
use solana_rpc_client_api::response::RpcLeaderSchedule;
use solana_sdk::{
    epoch_info::EpochInfo, hash::Hash, signature::Signature,
};
use solana_transaction_status::TransactionStatus;

use crate::errors::ForwarderResult;

/// The cluster RPC oracle the forwarder consults.
///
/// Statuses come back in the order of the supplied signatures; the processor
/// relies on that alignment.
pub trait ClusterRpc: Send + Sync {
    fn get_epoch_info(&self) -> ForwarderResult<EpochInfo>;
    fn get_latest_blockhash(&self) -> ForwarderResult<Hash>;
    fn get_leader_schedule(&self) -> ForwarderResult<Option<RpcLeaderSchedule>>;
    fn get_block_height(&self) -> ForwarderResult<u64>;
    /// Recent statuses only; transaction history is not searched.
    fn get_signature_statuses(
        &self,
        signatures: &[Signature],
    ) -> ForwarderResult<Vec<Option<TransactionStatus>>>;
}

pub struct RemoteClusterRpc {
    rpc_client: RpcClient,
}

impl RemoteClusterRpc {
    pub fn new(rpc_client: RpcClient) -> Self {
        Self { rpc_client }
    }

    pub fn new_with_url(url: String) -> Self {
        Self::new(RpcClient::new(url))
    }
}

impl ClusterRpc for RemoteClusterRpc {
    fn get_epoch_info(&self) -> ForwarderResult<EpochInfo> {
        Ok(self.rpc_client.get_epoch_info()?)
    }

    fn get_latest_blockhash(&self) -> ForwarderResult<Hash> {
        Ok(self.rpc_client.get_latest_blockhash()?)
    }

    fn get_leader_schedule(
        &self,
    ) -> ForwarderResult<Option<RpcLeaderSchedule>> {
        Ok(self.rpc_client.get_leader_schedule(None)?)
    }

    fn get_block_height(&self) -> ForwarderResult<u64> {
        Ok(self.rpc_client.get_block_height()?)
    }

    fn get_signature_statuses(
        &self,
        signatures: &[Signature],
    ) -> ForwarderResult<Vec<Option<TransactionStatus>>> {
        Ok(self.rpc_client.get_signature_statuses(signatures)?.value)
    }
}

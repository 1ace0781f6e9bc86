use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        RwLock,
    },
};

use solana_rpc_client_api::response::RpcLeaderSchedule;
use solana_sdk::{
    epoch_info::EpochInfo, hash::Hash, signature::Signature,
};
use solana_transaction_status::TransactionStatus;

use crate::{cluster_rpc::ClusterRpc, errors::ForwarderResult};

/// In-process stand-in for [`ClusterRpc`], used by tests.
pub struct ClusterRpcStub {
    pub epoch_info: RwLock<EpochInfo>,
    pub latest_blockhash: RwLock<Hash>,
    pub leader_schedule: RwLock<Option<RpcLeaderSchedule>>,
    pub block_height: AtomicU64,
    pub signature_statuses: RwLock<HashMap<Signature, TransactionStatus>>,
}

impl ClusterRpcStub {
    pub fn new(slots_in_epoch: u64) -> Self {
        Self {
            epoch_info: RwLock::new(EpochInfo {
                epoch: 0,
                slot_index: 0,
                slots_in_epoch,
                absolute_slot: 0,
                block_height: 0,
                transaction_count: None,
            }),
            latest_blockhash: RwLock::new(Hash::new_unique()),
            leader_schedule: RwLock::new(Some(RpcLeaderSchedule::default())),
            block_height: AtomicU64::default(),
            signature_statuses: RwLock::default(),
        }
    }

    pub fn set_leader_schedule(
        &self,
        leader: &solana_sdk::pubkey::Pubkey,
        slots: Vec<usize>,
    ) {
        let mut schedule = RpcLeaderSchedule::default();
        schedule.insert(leader.to_string(), slots);
        *self.leader_schedule.write().unwrap() = Some(schedule);
    }

    pub fn set_signature_status(
        &self,
        signature: Signature,
        status: TransactionStatus,
    ) {
        self.signature_statuses
            .write()
            .unwrap()
            .insert(signature, status);
    }
}

impl ClusterRpc for ClusterRpcStub {
    fn get_epoch_info(&self) -> ForwarderResult<EpochInfo> {
        Ok(self.epoch_info.read().unwrap().clone())
    }

    fn get_latest_blockhash(&self) -> ForwarderResult<Hash> {
        Ok(*self.latest_blockhash.read().unwrap())
    }

    fn get_leader_schedule(
        &self,
    ) -> ForwarderResult<Option<RpcLeaderSchedule>> {
        Ok(self.leader_schedule.read().unwrap().clone())
    }

    fn get_block_height(&self) -> ForwarderResult<u64> {
        Ok(self.block_height.load(Ordering::Relaxed))
    }

    fn get_signature_statuses(
        &self,
        signatures: &[Signature],
    ) -> ForwarderResult<Vec<Option<TransactionStatus>>> {
        let statuses = self.signature_statuses.read().unwrap();
        Ok(signatures
            .iter()
            .map(|signature| statuses.get(signature).cloned())
            .collect())
    }
}

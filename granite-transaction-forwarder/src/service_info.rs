use std::{
    collections::HashMap,
    net::SocketAddr,
    sync::Arc,
    time::Instant,
};

use granite_metrics::observe_service_info_refresh_time;
use log::*;
use solana_sdk::{
    clock::{Slot, DEFAULT_MS_PER_SLOT, NUM_CONSECUTIVE_LEADER_SLOTS},
    epoch_info::EpochInfo,
    hash::Hash,
    pubkey::Pubkey,
    signature::Signature,
};
use solana_transaction_status::TransactionStatus;

use crate::{
    cluster_rpc::ClusterRpc,
    errors::{ForwarderError, ForwarderResult},
    tpu_info::ClusterTpuInfo,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SlotLeader {
    pub slot: Slot,
    pub leader: Pubkey,
}

/// Periodically refreshed snapshot of the cluster state the forwarder needs:
/// epoch info, the latest blockhash, the epoch's leader schedule and the
/// leaders' TPU addresses.
pub struct ServiceInfo {
    rpc: Arc<dyn ClusterRpc>,
    tpu_info: Arc<dyn ClusterTpuInfo>,
    pub epoch_info: EpochInfo,
    /// When `epoch_info` was captured; leader arithmetic extrapolates from
    /// this instant.
    epoch_info_instant: Instant,
    pub latest_blockhash: Hash,
    /// First absolute slot of the epoch the schedule covers.
    start_slot: Slot,
    /// The epoch's leaders ordered by slot ascending.
    slot_leaders: Vec<SlotLeader>,
    leader_addresses: HashMap<Pubkey, SocketAddr>,
}

impl ServiceInfo {
    pub fn try_new(
        rpc: Arc<dyn ClusterRpc>,
        tpu_info: Arc<dyn ClusterTpuInfo>,
    ) -> ForwarderResult<Self> {
        let epoch_info = rpc.get_epoch_info()?;
        let latest_blockhash = rpc.get_latest_blockhash()?;
        let mut info = Self {
            rpc,
            tpu_info,
            epoch_info,
            epoch_info_instant: Instant::now(),
            latest_blockhash,
            start_slot: 0,
            slot_leaders: vec![],
            leader_addresses: HashMap::new(),
        };
        info.update_leader_schedule()?;
        info.update_leader_addresses();
        Ok(info)
    }

    /// Re-fetches epoch info and blockhash, and rebuilds the leader schedule
    /// and address map.
    pub fn refresh(&mut self) -> ForwarderResult<()> {
        observe_service_info_refresh_time(|| {
            self.epoch_info = self.rpc.get_epoch_info()?;
            self.epoch_info_instant = Instant::now();
            self.latest_blockhash = self.rpc.get_latest_blockhash()?;
            self.update_leader_schedule()?;
            self.update_leader_addresses();
            Ok(())
        })
    }

    fn update_leader_schedule(&mut self) -> ForwarderResult<()> {
        let schedule = self
            .rpc
            .get_leader_schedule()?
            .ok_or(ForwarderError::LeaderScheduleUnavailable)?;

        // The RPC returns {leader -> [epoch slot indexes]}; flatten and sort
        // into the by-slot form the leader arithmetic indexes into
        let start_slot =
            self.epoch_info.absolute_slot - self.epoch_info.slot_index;
        let mut slot_leaders = Vec::new();
        for (leader, slots) in schedule {
            let leader: Pubkey = match leader.parse() {
                Ok(leader) => leader,
                Err(err) => {
                    warn!("unparseable leader pubkey {leader}: {err:?}");
                    continue;
                }
            };
            for slot_index in slots {
                slot_leaders.push(SlotLeader {
                    slot: start_slot + slot_index as u64,
                    leader,
                });
            }
        }
        slot_leaders.sort_by_key(|slot_leader| slot_leader.slot);

        self.start_slot = start_slot;
        self.slot_leaders = slot_leaders;
        Ok(())
    }

    fn update_leader_addresses(&mut self) {
        let mut leader_addresses = HashMap::new();
        for slot_leader in &self.slot_leaders {
            if leader_addresses.contains_key(&slot_leader.leader) {
                continue;
            }
            match self.tpu_info.tpu_socket_addr(&slot_leader.leader) {
                Some(addr) => {
                    leader_addresses.insert(slot_leader.leader, addr);
                }
                None => debug!(
                    "leader {} has no TPU address in gossip",
                    slot_leader.leader
                ),
            }
        }
        // The previous map is released here
        self.leader_addresses = leader_addresses;
    }

    /// TPU addresses for the leaders of the next `num_leaders` leader
    /// rotations, starting with the one estimated to be current.
    pub fn get_leader_addresses(
        &self,
        num_leaders: usize,
    ) -> ForwarderResult<Vec<SocketAddr>> {
        let slots_elapsed = self.epoch_info_instant.elapsed().as_millis()
            as u64
            / DEFAULT_MS_PER_SLOT;
        let mut addresses = Vec::with_capacity(num_leaders);
        for i in 0..num_leaders {
            let slot_index = (self.epoch_info.slot_index + slots_elapsed)
                as usize
                + NUM_CONSECUTIVE_LEADER_SLOTS as usize * i;
            let slot_leader = self
                .slot_leaders
                .get(slot_index)
                .ok_or(ForwarderError::LeaderScheduleExhausted(slot_index))?;
            let address = self
                .leader_addresses
                .get(&slot_leader.leader)
                .ok_or(ForwarderError::MissingTpuAddress(slot_leader.leader))?;
            addresses.push(*address);
        }
        Ok(addresses)
    }

    /// First absolute slot of the epoch the current schedule covers.
    pub fn start_slot(&self) -> Slot {
        self.start_slot
    }

    pub fn get_block_height(&self) -> ForwarderResult<u64> {
        self.rpc.get_block_height()
    }

    pub fn get_signature_statuses(
        &self,
        signatures: &[Signature],
    ) -> ForwarderResult<Vec<Option<TransactionStatus>>> {
        self.rpc.get_signature_statuses(signatures)
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;
    use crate::{cluster_rpc_stub::ClusterRpcStub, tpu_info::GossipTpuInfo};

    fn tpu_addr(port: u16) -> SocketAddr {
        format!("127.0.0.1:{port}").parse().unwrap()
    }

    #[test]
    fn test_leader_addresses_follow_rotations() {
        let rpc = Arc::new(ClusterRpcStub::new(32));
        let leader_a = Pubkey::new_unique();
        let leader_b = Pubkey::new_unique();
        {
            let mut schedule =
                solana_rpc_client_api::response::RpcLeaderSchedule::default();
            schedule.insert(leader_a.to_string(), (0..4).collect());
            schedule.insert(leader_b.to_string(), (4..8).collect());
            *rpc.leader_schedule.write().unwrap() = Some(schedule);
        }

        let tpu_info = Arc::new(GossipTpuInfo::default());
        tpu_info.insert(leader_a, tpu_addr(8001));
        tpu_info.insert(leader_b, tpu_addr(8002));

        let info = ServiceInfo::try_new(rpc, tpu_info).unwrap();
        assert_eq!(info.start_slot(), 0);

        // Current leader plus the next rotation
        let addresses = info.get_leader_addresses(2).unwrap();
        assert_eq!(addresses, vec![tpu_addr(8001), tpu_addr(8002)]);
    }

    #[test]
    fn test_leader_addresses_require_schedule_coverage() {
        let rpc = Arc::new(ClusterRpcStub::new(4));
        let leader = Pubkey::new_unique();
        rpc.set_leader_schedule(&leader, (0..4).collect());

        let tpu_info = Arc::new(GossipTpuInfo::default());
        tpu_info.insert(leader, tpu_addr(8001));

        let info = ServiceInfo::try_new(rpc, tpu_info).unwrap();

        // The second rotation starts at slot index 4, beyond the schedule
        assert_matches!(
            info.get_leader_addresses(2),
            Err(ForwarderError::LeaderScheduleExhausted(4))
        );
    }

    #[test]
    fn test_leader_addresses_require_tpu_address() {
        let rpc = Arc::new(ClusterRpcStub::new(32));
        let leader = Pubkey::new_unique();
        rpc.set_leader_schedule(&leader, (0..32).collect());

        // Gossip knows nothing about the leader
        let tpu_info = Arc::new(GossipTpuInfo::default());
        let info = ServiceInfo::try_new(rpc, tpu_info).unwrap();

        assert_matches!(
            info.get_leader_addresses(1),
            Err(ForwarderError::MissingTpuAddress(pubkey)) if pubkey == leader
        );
    }

    #[test]
    fn test_refresh_picks_up_new_leaders() {
        let rpc = Arc::new(ClusterRpcStub::new(32));
        let leader_a = Pubkey::new_unique();
        rpc.set_leader_schedule(&leader_a, (0..32).collect());

        let tpu_info = Arc::new(GossipTpuInfo::default());
        tpu_info.insert(leader_a, tpu_addr(8001));

        let mut info =
            ServiceInfo::try_new(rpc.clone(), tpu_info.clone()).unwrap();
        assert_eq!(
            info.get_leader_addresses(1).unwrap(),
            vec![tpu_addr(8001)]
        );

        // The schedule moves to a different leader
        let leader_b = Pubkey::new_unique();
        rpc.set_leader_schedule(&leader_b, (0..32).collect());
        tpu_info.insert(leader_b, tpu_addr(9001));
        info.refresh().unwrap();

        assert_eq!(
            info.get_leader_addresses(1).unwrap(),
            vec![tpu_addr(9001)]
        );
    }
}

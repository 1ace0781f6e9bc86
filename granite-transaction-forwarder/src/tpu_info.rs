use std::{collections::HashMap, net::SocketAddr, sync::RwLock};

use solana_sdk::pubkey::Pubkey;

/// Narrow view of the gossip table: resolves a leader to the TPU endpoint at
/// which it accepts transactions.
pub trait ClusterTpuInfo: Send + Sync {
    fn tpu_socket_addr(&self, leader: &Pubkey) -> Option<SocketAddr>;
}

/// Table-backed [`ClusterTpuInfo`], refreshed externally from gossip.
#[derive(Default)]
pub struct GossipTpuInfo {
    table: RwLock<HashMap<Pubkey, SocketAddr>>,
}

impl GossipTpuInfo {
    pub fn insert(&self, leader: Pubkey, addr: SocketAddr) {
        self.table.write().unwrap().insert(leader, addr);
    }

    pub fn remove(&self, leader: &Pubkey) {
        self.table.write().unwrap().remove(leader);
    }
}

impl ClusterTpuInfo for GossipTpuInfo {
    fn tpu_socket_addr(&self, leader: &Pubkey) -> Option<SocketAddr> {
        self.table.read().unwrap().get(leader).copied()
    }
}

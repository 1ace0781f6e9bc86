use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, RwLock,
    },
    thread::{self, sleep, Builder, JoinHandle},
    time::{Duration, Instant},
};

use crossbeam_channel::{Receiver, RecvTimeoutError};
use granite_metrics as metrics;
use granite_metrics::DropReason;
use indexmap::IndexMap;
use log::*;
use solana_sdk::signature::Signature;

use crate::{
    batch_sender::BatchSender, errors::ForwarderResult,
    service_info::ServiceInfo, transaction_info::TransactionInfo,
};

/// Ceiling on how many transactions are tracked for confirmation at once.
pub const MAX_PENDING_POOL_SIZE: usize = 10_000;
/// Number of transactions a wire batch carries.
pub const DEFAULT_BATCH_SIZE: usize = 1;
/// How long the receiver waits before flushing a non-empty batch.
pub const DEFAULT_BATCH_SEND_RATE: Duration = Duration::from_millis(1);
/// Cadence of the processor pass over the pending pool; also the minimum
/// time between two sends of the same transaction.
pub const DEFAULT_PROCESS_TRANSACTIONS_RATE: Duration = Duration::from_secs(2);
/// Cadence at which the cluster snapshot is re-fetched.
pub const DEFAULT_SERVICE_INFO_REFRESH_RATE: Duration =
    Duration::from_secs(60);
/// Transactions are forwarded to this many upcoming leaders.
pub const NUM_LEADERS_TO_FORWARD: usize = 2;

const WORKER_SLEEP_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Clone, Debug)]
pub struct ForwarderConfig {
    pub batch_size: usize,
    pub batch_send_rate: Duration,
    pub process_transactions_rate: Duration,
    pub service_info_refresh_rate: Duration,
    pub max_pending_pool_size: usize,
    pub num_leaders_to_forward: usize,
}

impl Default for ForwarderConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            batch_send_rate: DEFAULT_BATCH_SEND_RATE,
            process_transactions_rate: DEFAULT_PROCESS_TRANSACTIONS_RATE,
            service_info_refresh_rate: DEFAULT_SERVICE_INFO_REFRESH_RATE,
            max_pending_pool_size: MAX_PENDING_POOL_SIZE,
            num_leaders_to_forward: NUM_LEADERS_TO_FORWARD,
        }
    }
}

// Insertion order matters: the processor aligns the pool positionally with
// the signature-status response.
type PendingTransactions = IndexMap<Signature, TransactionInfo>;

/// Forwards client transactions to the upcoming leaders and retries them
/// until they root, fail, expire or exhaust their retries.
///
/// Three cooperating workers: the service-info refresher, the receiver and
/// the processor. A worker that hits a fatal error stores `exit` on its way
/// out so the others wind down too.
pub struct TransactionForwarder {
    exit: Arc<AtomicBool>,
    thread_hdls: Vec<JoinHandle<()>>,
}

impl TransactionForwarder {
    pub fn new(
        config: ForwarderConfig,
        service_info: ServiceInfo,
        batch_sender: Arc<dyn BatchSender>,
        transaction_receiver: Receiver<TransactionInfo>,
        exit: Arc<AtomicBool>,
    ) -> Self {
        let service_info = Arc::new(RwLock::new(service_info));
        let pending_transactions =
            Arc::new(RwLock::new(PendingTransactions::default()));

        let refresh_thread = Builder::new()
            .name("granFwdInfo".to_string())
            .spawn({
                let service_info = service_info.clone();
                let exit = exit.clone();
                let refresh_rate = config.service_info_refresh_rate;
                move || {
                    info!("TransactionForwarder info refresher has started");
                    Self::run_refresh_service_info(
                        &service_info,
                        refresh_rate,
                        &exit,
                    );
                    info!("TransactionForwarder info refresher has stopped");
                }
            })
            .unwrap();

        let receive_thread = Builder::new()
            .name("granFwdRecv".to_string())
            .spawn({
                let service_info = service_info.clone();
                let pending_transactions = pending_transactions.clone();
                let batch_sender = batch_sender.clone();
                let config = config.clone();
                let exit = exit.clone();
                move || {
                    info!("TransactionForwarder receiver has started");
                    Self::run_receive_transactions(
                        &transaction_receiver,
                        &service_info,
                        &pending_transactions,
                        batch_sender.as_ref(),
                        &config,
                        &exit,
                    );
                    info!("TransactionForwarder receiver has stopped");
                }
            })
            .unwrap();

        let process_thread = Builder::new()
            .name("granFwdProc".to_string())
            .spawn({
                let service_info = service_info.clone();
                let pending_transactions = pending_transactions.clone();
                let batch_sender = batch_sender.clone();
                let config = config.clone();
                let exit = exit.clone();
                move || {
                    info!("TransactionForwarder processor has started");
                    Self::run_process_transactions(
                        &service_info,
                        &pending_transactions,
                        batch_sender.as_ref(),
                        &config,
                        &exit,
                    );
                    info!("TransactionForwarder processor has stopped");
                }
            })
            .unwrap();

        Self {
            exit,
            thread_hdls: vec![refresh_thread, receive_thread, process_thread],
        }
    }

    pub fn exit(&self) {
        self.exit.store(true, Ordering::Relaxed);
    }

    pub fn join(self) -> thread::Result<()> {
        for thread_hdl in self.thread_hdls {
            thread_hdl.join()?;
        }
        Ok(())
    }

    // -----------------
    // Service info refresher
    // -----------------
    fn run_refresh_service_info(
        service_info: &RwLock<ServiceInfo>,
        refresh_rate: Duration,
        exit: &AtomicBool,
    ) {
        let mut last_refresh = Instant::now();
        while !exit.load(Ordering::Relaxed) {
            if last_refresh.elapsed() >= refresh_rate {
                last_refresh = Instant::now();
                let result = service_info.write().unwrap().refresh();
                if let Err(err) = result {
                    error!("refreshing service info failed: {err:?}");
                    exit.store(true, Ordering::Relaxed);
                    return;
                }
            }
            sleep(WORKER_SLEEP_INTERVAL.min(refresh_rate));
        }
    }

    // -----------------
    // Receiver
    // -----------------
    fn run_receive_transactions(
        transaction_receiver: &Receiver<TransactionInfo>,
        service_info: &RwLock<ServiceInfo>,
        pending_transactions: &RwLock<PendingTransactions>,
        batch_sender: &dyn BatchSender,
        config: &ForwarderConfig,
        exit: &AtomicBool,
    ) {
        let mut batch: Vec<TransactionInfo> =
            Vec::with_capacity(config.batch_size);
        let mut last_batch_sent = Instant::now();

        while !exit.load(Ordering::Relaxed) {
            match transaction_receiver.recv_timeout(config.batch_send_rate) {
                Ok(transaction_info) => {
                    metrics::inc_received_transactions(1);
                    let duplicate = batch.iter().any(|info| {
                        info.signature == transaction_info.signature
                    }) || pending_transactions
                        .read()
                        .unwrap()
                        .contains_key(&transaction_info.signature);
                    if !duplicate {
                        batch.push(transaction_info);
                    }
                }
                Err(RecvTimeoutError::Timeout) => {}
                // A closed channel ends the receiver
                Err(RecvTimeoutError::Disconnected) => break,
            }

            if batch.len() >= config.batch_size
                || (last_batch_sent.elapsed() >= config.batch_send_rate
                    && !batch.is_empty())
            {
                if let Err(err) = Self::send_transactions(
                    service_info,
                    batch_sender,
                    &batch,
                    config.num_leaders_to_forward,
                ) {
                    error!("failed to forward transaction batch: {err:?}");
                    exit.store(true, Ordering::Relaxed);
                    return;
                }
                last_batch_sent = Instant::now();
                Self::track_sent_transactions(
                    pending_transactions,
                    &mut batch,
                    config.max_pending_pool_size,
                );
            }
        }
    }

    /// Moves the batch into the pending pool, stamping the send time.
    /// Inserts silently stop once the pool is at capacity.
    fn track_sent_transactions(
        pending_transactions: &RwLock<PendingTransactions>,
        batch: &mut Vec<TransactionInfo>,
        max_pending_pool_size: usize,
    ) {
        let now = Instant::now();
        let mut pending = pending_transactions.write().unwrap();
        for mut transaction_info in batch.drain(..) {
            if pending.len() >= max_pending_pool_size {
                break;
            }
            if pending.contains_key(&transaction_info.signature) {
                continue;
            }
            transaction_info.last_sent_time = Some(now);
            pending.insert(transaction_info.signature, transaction_info);
        }
        metrics::set_pending_transactions(pending.len());
    }

    // -----------------
    // Processor
    // -----------------
    fn run_process_transactions(
        service_info: &RwLock<ServiceInfo>,
        pending_transactions: &RwLock<PendingTransactions>,
        batch_sender: &dyn BatchSender,
        config: &ForwarderConfig,
        exit: &AtomicBool,
    ) {
        let mut last_processed = Instant::now();
        while !exit.load(Ordering::Relaxed) {
            sleep(WORKER_SLEEP_INTERVAL.min(config.process_transactions_rate));
            if last_processed.elapsed() < config.process_transactions_rate {
                continue;
            }
            last_processed = Instant::now();
            let result = metrics::observe_process_pending_time(|| {
                Self::process_pending_transactions(
                    service_info,
                    pending_transactions,
                    batch_sender,
                    config,
                )
            });
            if let Err(err) = result {
                error!("processing pending transactions failed: {err:?}");
                exit.store(true, Ordering::Relaxed);
                return;
            }
        }
    }

    /// One processor pass: poll statuses for everything pending, drop what
    /// is done for and resend what stalled.
    fn process_pending_transactions(
        service_info: &RwLock<ServiceInfo>,
        pending_transactions: &RwLock<PendingTransactions>,
        batch_sender: &dyn BatchSender,
        config: &ForwarderConfig,
    ) -> ForwarderResult<()> {
        let mut pending = pending_transactions.write().unwrap();
        if pending.is_empty() {
            return Ok(());
        }

        // Both lookups happen under a single write-lock on the service info
        // so retry decisions are linearized relative to the send stamps
        let (block_height, statuses) = {
            let service_info = service_info.write().unwrap();
            let signatures: Vec<Signature> = pending.keys().copied().collect();
            let block_height = service_info.get_block_height()?;
            let statuses = service_info.get_signature_statuses(&signatures)?;
            (block_height, statuses)
        };

        // Statuses come back in the order of the supplied signatures, which
        // is the pool's insertion order
        let now = Instant::now();
        let mut dropped: Vec<(Signature, DropReason)> = vec![];
        let mut to_retry: Vec<Signature> = vec![];
        for ((signature, transaction_info), status) in
            pending.iter_mut().zip(statuses.into_iter())
        {
            match status {
                Some(status) => {
                    if status.confirmations.is_none() {
                        dropped.push((*signature, DropReason::Rooted));
                    } else if status.err.is_some() {
                        dropped.push((*signature, DropReason::Failed));
                    } else if transaction_info.last_valid_block_height
                        < block_height
                    {
                        dropped.push((*signature, DropReason::Expired));
                    }
                }
                None => {
                    let retries_exhausted = transaction_info
                        .max_retries
                        .map(|max_retries| {
                            transaction_info.retries >= max_retries
                        })
                        .unwrap_or(false);
                    if retries_exhausted {
                        dropped
                            .push((*signature, DropReason::RetriesExhausted));
                    } else {
                        let stalled = transaction_info
                            .last_sent_time
                            .map(|last_sent_time| {
                                now.duration_since(last_sent_time)
                                    >= config.process_transactions_rate
                            })
                            .unwrap_or(true);
                        if stalled {
                            if transaction_info.last_sent_time.is_some() {
                                transaction_info.retries += 1;
                            }
                            transaction_info.last_sent_time = Some(now);
                            to_retry.push(*signature);
                        }
                    }
                }
            }
        }

        for (signature, reason) in &dropped {
            pending.shift_remove(signature);
            metrics::inc_dropped_transaction(*reason);
        }

        if !to_retry.is_empty() {
            metrics::inc_retried_transactions(to_retry.len());
            let retry_infos: Vec<&TransactionInfo> = to_retry
                .iter()
                .filter_map(|signature| pending.get(signature))
                .collect();
            for chunk in retry_infos.chunks(config.batch_size) {
                let wire_transactions: Vec<&[u8]> = chunk
                    .iter()
                    .map(|info| info.wire_transaction.as_slice())
                    .collect();
                Self::send_wire_transactions(
                    service_info,
                    batch_sender,
                    &wire_transactions,
                    config.num_leaders_to_forward,
                )?;
            }
        }
        metrics::set_pending_transactions(pending.len());

        Ok(())
    }

    // -----------------
    // Sender
    // -----------------
    fn send_transactions(
        service_info: &RwLock<ServiceInfo>,
        batch_sender: &dyn BatchSender,
        transactions: &[TransactionInfo],
        num_leaders: usize,
    ) -> ForwarderResult<()> {
        let wire_transactions: Vec<&[u8]> = transactions
            .iter()
            .map(|info| info.wire_transaction.as_slice())
            .collect();
        Self::send_wire_transactions(
            service_info,
            batch_sender,
            &wire_transactions,
            num_leaders,
        )
    }

    /// Pushes the wire batch to the current and upcoming leaders.
    fn send_wire_transactions(
        service_info: &RwLock<ServiceInfo>,
        batch_sender: &dyn BatchSender,
        wire_transactions: &[&[u8]],
        num_leaders: usize,
    ) -> ForwarderResult<()> {
        if wire_transactions.is_empty() {
            return Ok(());
        }
        let timer = metrics::batch_send_start();
        let leader_addresses = {
            let service_info = service_info.read().unwrap();
            service_info.get_leader_addresses(num_leaders)?
        };
        for address in &leader_addresses {
            batch_sender.send_wire_batch(wire_transactions, address)?;
        }
        metrics::inc_forwarded_transactions(wire_transactions.len());
        timer.stop_and_record();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::{
        net::SocketAddr,
        sync::Mutex,
    };

    use solana_sdk::pubkey::Pubkey;
    use solana_transaction_status::TransactionStatus;
    use test_tools_core::init_logger;

    use super::*;
    use crate::{
        cluster_rpc_stub::ClusterRpcStub, tpu_info::GossipTpuInfo,
    };

    #[derive(Default)]
    struct RecordingBatchSender {
        sent: Mutex<Vec<(SocketAddr, usize)>>,
    }

    impl RecordingBatchSender {
        fn num_batches(&self) -> usize {
            self.sent.lock().unwrap().len()
        }
    }

    impl BatchSender for RecordingBatchSender {
        fn send_wire_batch(
            &self,
            wire_transactions: &[&[u8]],
            addr: &SocketAddr,
        ) -> ForwarderResult<()> {
            self.sent
                .lock()
                .unwrap()
                .push((*addr, wire_transactions.len()));
            Ok(())
        }
    }

    fn tpu_addr(port: u16) -> SocketAddr {
        format!("127.0.0.1:{port}").parse().unwrap()
    }

    fn setup_cluster() -> (Arc<ClusterRpcStub>, Arc<RwLock<ServiceInfo>>) {
        let rpc = Arc::new(ClusterRpcStub::new(256));
        let leader = Pubkey::new_unique();
        rpc.set_leader_schedule(&leader, (0..256).collect());
        let tpu_info = Arc::new(GossipTpuInfo::default());
        tpu_info.insert(leader, tpu_addr(8000));
        let service_info =
            ServiceInfo::try_new(rpc.clone(), tpu_info).unwrap();
        (rpc, Arc::new(RwLock::new(service_info)))
    }

    fn transaction_info(last_valid_block_height: u64) -> TransactionInfo {
        let signature = Signature::new_unique();
        TransactionInfo::new(
            signature,
            vec![1, 2, 3],
            last_valid_block_height,
            None,
            None,
        )
    }

    fn rooted_status() -> TransactionStatus {
        TransactionStatus {
            slot: 1,
            confirmations: None,
            status: Ok(()),
            err: None,
            confirmation_status: None,
        }
    }

    fn failed_status() -> TransactionStatus {
        let err =
            solana_sdk::transaction::TransactionError::AccountNotFound;
        TransactionStatus {
            slot: 1,
            confirmations: Some(1),
            status: Err(err.clone()),
            err: Some(err),
            confirmation_status: None,
        }
    }

    fn confirmed_status() -> TransactionStatus {
        TransactionStatus {
            slot: 1,
            confirmations: Some(1),
            status: Ok(()),
            err: None,
            confirmation_status: None,
        }
    }

    fn insert_pending(
        pending: &RwLock<PendingTransactions>,
        transaction_info: TransactionInfo,
        sent: bool,
    ) {
        let mut transaction_info = transaction_info;
        if sent {
            transaction_info.last_sent_time = Some(Instant::now());
        }
        pending
            .write()
            .unwrap()
            .insert(transaction_info.signature, transaction_info);
    }

    #[test]
    fn test_processor_drops_rooted_transaction() {
        init_logger!();
        let (rpc, service_info) = setup_cluster();
        let pending = RwLock::new(PendingTransactions::default());
        let batch_sender = RecordingBatchSender::default();
        let config = ForwarderConfig::default();

        let info = transaction_info(100);
        rpc.set_signature_status(info.signature, rooted_status());
        insert_pending(&pending, info, true);

        TransactionForwarder::process_pending_transactions(
            &service_info,
            &pending,
            &batch_sender,
            &config,
        )
        .unwrap();

        assert!(pending.read().unwrap().is_empty());
        assert_eq!(batch_sender.num_batches(), 0);
    }

    #[test]
    fn test_processor_drops_failed_transaction() {
        init_logger!();
        let (rpc, service_info) = setup_cluster();
        let pending = RwLock::new(PendingTransactions::default());
        let batch_sender = RecordingBatchSender::default();
        let config = ForwarderConfig::default();

        let info = transaction_info(100);
        rpc.set_signature_status(info.signature, failed_status());
        insert_pending(&pending, info, true);

        TransactionForwarder::process_pending_transactions(
            &service_info,
            &pending,
            &batch_sender,
            &config,
        )
        .unwrap();

        assert!(pending.read().unwrap().is_empty());
        assert_eq!(batch_sender.num_batches(), 0);
    }

    #[test]
    fn test_processor_drops_expired_transaction() {
        init_logger!();
        let (rpc, service_info) = setup_cluster();
        let pending = RwLock::new(PendingTransactions::default());
        let batch_sender = RecordingBatchSender::default();
        let config = ForwarderConfig::default();

        // Still confirmed-but-unrooted while its blockhash already expired
        let info = transaction_info(10);
        rpc.set_signature_status(info.signature, confirmed_status());
        rpc.block_height.store(11, Ordering::Relaxed);
        insert_pending(&pending, info, true);

        TransactionForwarder::process_pending_transactions(
            &service_info,
            &pending,
            &batch_sender,
            &config,
        )
        .unwrap();

        assert!(pending.read().unwrap().is_empty());
    }

    #[test]
    fn test_processor_resends_unseen_transaction() {
        init_logger!();
        let (_rpc, service_info) = setup_cluster();
        let pending = RwLock::new(PendingTransactions::default());
        let batch_sender = RecordingBatchSender::default();
        let config = ForwarderConfig::default();

        let info = transaction_info(100);
        let signature = info.signature;
        // Never sent before
        insert_pending(&pending, info, false);

        TransactionForwarder::process_pending_transactions(
            &service_info,
            &pending,
            &batch_sender,
            &config,
        )
        .unwrap();

        // One batch per upcoming leader
        assert_eq!(batch_sender.num_batches(), NUM_LEADERS_TO_FORWARD);
        let pending = pending.read().unwrap();
        let tracked = pending.get(&signature).unwrap();
        // The first send does not count as a retry
        assert_eq!(tracked.retries, 0);
        assert!(tracked.last_sent_time.is_some());
    }

    #[test]
    fn test_processor_respects_retry_cap() {
        init_logger!();
        let (_rpc, service_info) = setup_cluster();
        let pending = RwLock::new(PendingTransactions::default());
        let batch_sender = RecordingBatchSender::default();
        let config = ForwarderConfig::default();

        let mut info = transaction_info(100);
        info.max_retries = Some(0);
        insert_pending(&pending, info, false);

        TransactionForwarder::process_pending_transactions(
            &service_info,
            &pending,
            &batch_sender,
            &config,
        )
        .unwrap();

        assert!(pending.read().unwrap().is_empty());
        assert_eq!(batch_sender.num_batches(), 0);
    }

    #[test]
    fn test_processor_skips_recently_sent_transaction() {
        init_logger!();
        let (_rpc, service_info) = setup_cluster();
        let pending = RwLock::new(PendingTransactions::default());
        let batch_sender = RecordingBatchSender::default();
        let config = ForwarderConfig::default();

        // Stamped as sent just now: nothing to do this tick
        insert_pending(&pending, transaction_info(100), true);

        TransactionForwarder::process_pending_transactions(
            &service_info,
            &pending,
            &batch_sender,
            &config,
        )
        .unwrap();

        assert_eq!(pending.read().unwrap().len(), 1);
        assert_eq!(batch_sender.num_batches(), 0);
    }

    #[test]
    fn test_pending_pool_is_bounded() {
        init_logger!();
        let pending = RwLock::new(PendingTransactions::default());

        let mut batch: Vec<TransactionInfo> =
            (0..4).map(|_| transaction_info(100)).collect();
        TransactionForwarder::track_sent_transactions(
            &pending,
            &mut batch,
            2,
        );

        // Inserts beyond the cap are skipped silently, the batch is drained
        assert_eq!(pending.read().unwrap().len(), 2);
        assert!(batch.is_empty());
    }

    #[test]
    fn test_forwarder_end_to_end_receive_and_track() {
        init_logger!();
        let (_rpc, service_info) = setup_cluster();
        let service_info = Arc::try_unwrap(service_info)
            .unwrap_or_else(|_| panic!("service info still shared"))
            .into_inner()
            .unwrap();
        let batch_sender = Arc::new(RecordingBatchSender::default());
        let (transaction_sender, transaction_receiver) =
            crossbeam_channel::unbounded();
        let exit = Arc::new(AtomicBool::new(false));

        let config = ForwarderConfig {
            // Keep the processor quiet during the test
            process_transactions_rate: Duration::from_secs(60),
            ..Default::default()
        };
        let forwarder = TransactionForwarder::new(
            config,
            service_info,
            batch_sender.clone(),
            transaction_receiver,
            exit.clone(),
        );

        let info = transaction_info(100);
        let signature = info.signature;
        transaction_sender.send(info.clone()).unwrap();
        // A duplicate of something already pending is not re-tracked
        transaction_sender.send(info).unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        while batch_sender.num_batches() < NUM_LEADERS_TO_FORWARD
            && Instant::now() < deadline
        {
            sleep(Duration::from_millis(10));
        }
        assert!(batch_sender.num_batches() >= NUM_LEADERS_TO_FORWARD);

        // Closing the channel ends the receiver; the exit flag stops the rest
        drop(transaction_sender);
        forwarder.exit();
        forwarder.join().unwrap();

        let _ = signature;
    }
}

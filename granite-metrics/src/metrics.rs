use std::sync::Once;

pub use prometheus::HistogramTimer;
use prometheus::{
    Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts,
    Registry,
};

// -----------------
// Buckets
// -----------------
// Prometheus collects durations in seconds. The forwarding stages span five
// orders of magnitude, so the buckets grow geometrically: eleven buckets at
// 5^(i-1) seconds, i.e. 0.2s, 1s, 5s, ... 5^9s.
fn forwarding_buckets() -> Vec<f64> {
    prometheus::exponential_buckets(0.2, 5.0, 11)
        .expect("valid bucket parameters")
}

lazy_static::lazy_static! {
    pub(crate) static ref REGISTRY: Registry = Registry::new_custom(Some("gnt".to_string()), None).unwrap();

    // -----------------
    // Transaction forwarding
    // -----------------
    static ref RECEIVED_TRANSACTIONS_COUNT: IntCounter = IntCounter::new(
        "forwarder_received_transactions_count",
        "Transactions drained from the inbound channel",
    ).unwrap();

    static ref FORWARDED_TRANSACTIONS_COUNT: IntCounter = IntCounter::new(
        "forwarder_forwarded_transactions_count",
        "Transactions pushed to leader TPU addresses",
    ).unwrap();

    static ref RETRIED_TRANSACTIONS_COUNT: IntCounter = IntCounter::new(
        "forwarder_retried_transactions_count",
        "Pending transactions re-sent by the processor",
    ).unwrap();

    static ref DROPPED_TRANSACTIONS_VEC_COUNT: IntCounterVec = IntCounterVec::new(
        Opts::new(
            "forwarder_dropped_transactions_count",
            "Pending transactions dropped by the processor, by reason",
        ),
        &["reason"],
    ).unwrap();

    static ref PENDING_TRANSACTIONS_GAUGE: IntGauge = IntGauge::new(
        "forwarder_pending_transactions",
        "Transactions currently awaiting confirmation",
    ).unwrap();

    static ref BATCH_SEND_TIME_HISTOGRAM: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            "forwarder_batch_send_time",
            "Time spent pushing one batch to the leaders",
        ).buckets(forwarding_buckets()),
    ).unwrap();

    static ref PROCESS_PENDING_TIME_HISTOGRAM: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            "forwarder_process_pending_time",
            "Time spent in one processor pass over the pending pool",
        ).buckets(forwarding_buckets()),
    ).unwrap();

    static ref SERVICE_INFO_REFRESH_TIME_HISTOGRAM: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            "forwarder_service_info_refresh_time",
            "Time spent refreshing epoch info, blockhash and leader addresses",
        ).buckets(forwarding_buckets()),
    ).unwrap();
}

pub(crate) fn register() {
    static REGISTER: Once = Once::new();
    REGISTER.call_once(|| {
        macro_rules! register {
            ($collector:ident) => {
                REGISTRY
                    .register(Box::new($collector.clone()))
                    .expect("collector can't be registered");
            };
        }
        register!(RECEIVED_TRANSACTIONS_COUNT);
        register!(FORWARDED_TRANSACTIONS_COUNT);
        register!(RETRIED_TRANSACTIONS_COUNT);
        register!(DROPPED_TRANSACTIONS_VEC_COUNT);
        register!(PENDING_TRANSACTIONS_GAUGE);
        register!(BATCH_SEND_TIME_HISTOGRAM);
        register!(PROCESS_PENDING_TIME_HISTOGRAM);
        register!(SERVICE_INFO_REFRESH_TIME_HISTOGRAM);
    });
}

/// Why the processor removed a transaction from the pending pool.
#[derive(Clone, Copy, Debug)]
pub enum DropReason {
    Rooted,
    Failed,
    Expired,
    RetriesExhausted,
}

impl DropReason {
    fn as_str(&self) -> &'static str {
        match self {
            DropReason::Rooted => "rooted",
            DropReason::Failed => "failed",
            DropReason::Expired => "expired",
            DropReason::RetriesExhausted => "retries_exhausted",
        }
    }
}

pub fn inc_received_transactions(count: usize) {
    RECEIVED_TRANSACTIONS_COUNT.inc_by(count as u64);
}

pub fn inc_forwarded_transactions(count: usize) {
    FORWARDED_TRANSACTIONS_COUNT.inc_by(count as u64);
}

pub fn inc_retried_transactions(count: usize) {
    RETRIED_TRANSACTIONS_COUNT.inc_by(count as u64);
}

pub fn inc_dropped_transaction(reason: DropReason) {
    DROPPED_TRANSACTIONS_VEC_COUNT
        .with_label_values(&[reason.as_str()])
        .inc();
}

pub fn set_pending_transactions(count: usize) {
    PENDING_TRANSACTIONS_GAUGE.set(count as i64);
}

pub fn batch_send_start() -> HistogramTimer {
    BATCH_SEND_TIME_HISTOGRAM.start_timer()
}

pub fn observe_process_pending_time<T, F>(f: F) -> T
where
    F: FnOnce() -> T,
{
    PROCESS_PENDING_TIME_HISTOGRAM.observe_closure_duration(f)
}

pub fn observe_service_info_refresh_time<T, F>(f: F) -> T
where
    F: FnOnce() -> T,
{
    SERVICE_INFO_REFRESH_TIME_HISTOGRAM.observe_closure_duration(f)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forwarding_buckets_grow_by_powers_of_five() {
        let buckets = forwarding_buckets();
        assert_eq!(buckets.len(), 11);
        for (i, bucket) in buckets.iter().enumerate() {
            let expected = 5f64.powi(i as i32 - 1);
            assert!((bucket - expected).abs() < 1e-9 * expected);
        }
    }
}

use prometheus::{
    Encoder, Gauge, Histogram, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge,
    Opts, Registry, TextEncoder,
};
use std::sync::Arc;

#[derive(Clone)]
pub struct Metrics {
    pub registry: Registry,
    pub payment_requests_total: IntCounter,
    pub payment_success_total: IntCounter,
    pub payment_failure_total: IntCounter,
    pub duplicate_events_skipped_total: IntCounterVec,
    pub retries_total: IntCounterVec,
    pub dlq_published_total: IntCounterVec,
    pub outbox_pending_total: IntGauge,
    pub outbox_oldest_pending_age_seconds: Gauge,
    pub outbox_failed_total: IntCounter,
    pub invariant_violations_total: IntCounter,
    pub payment_e2e_seconds: HistogramVec,
    pub payment_latency_seconds: Histogram,
}

impl Metrics {
    pub fn new(service: &str) -> anyhow::Result<Arc<Self>> {
        let registry = Registry::new();
        let label = |name: &str, help: &str| {
            Opts::new(name, help).const_label("service", service)
        };

        let payment_requests_total =
            IntCounter::with_opts(label("payment_requests_total", "Total payment requests"))?;
        let payment_success_total =
            IntCounter::with_opts(label("payment_success_total", "Payments reaching SETTLED"))?;
        let payment_failure_total =
            IntCounter::with_opts(label("payment_failure_total", "Payments reaching FAILED or REVERSED"))?;
        let duplicate_events_skipped_total = IntCounterVec::new(
            label("duplicate_events_skipped_total", "Events dropped by inbox dedup"),
            &["topic"],
        )?;
        let retries_total = IntCounterVec::new(
            label("retries_total", "In-worker retries against a dependency"),
            &["dependency"],
        )?;
        let dlq_published_total = IntCounterVec::new(
            label("dlq_published_total", "Envelopes parked on a DLQ topic"),
            &["topic", "error_type"],
        )?;
        let outbox_pending_total = IntGauge::with_opts(label(
            "outbox_pending_total",
            "Outbox rows in PENDING or PROCESSING",
        ))?;
        let outbox_oldest_pending_age_seconds = Gauge::with_opts(label(
            "outbox_oldest_pending_age_seconds",
            "Age of the oldest unpublished outbox row",
        ))?;
        let outbox_failed_total =
            IntCounter::with_opts(label("outbox_failed_total", "Outbox rows marked FAILED"))?;
        let invariant_violations_total = IntCounter::with_opts(label(
            "invariant_violations_total",
            "Events rejected by a state-machine or ledger invariant",
        ))?;
        let payment_e2e_seconds = HistogramVec::new(
            HistogramOpts::new(
                "payment_e2e_seconds",
                "Seconds from CREATED to a terminal state",
            )
            .const_label("service", service),
            &["terminal_state"],
        )?;
        let payment_latency_seconds = Histogram::with_opts(
            HistogramOpts::new("payment_latency_seconds", "POST /payments handler latency")
                .const_label("service", service),
        )?;

        registry.register(Box::new(payment_requests_total.clone()))?;
        registry.register(Box::new(payment_success_total.clone()))?;
        registry.register(Box::new(payment_failure_total.clone()))?;
        registry.register(Box::new(duplicate_events_skipped_total.clone()))?;
        registry.register(Box::new(retries_total.clone()))?;
        registry.register(Box::new(dlq_published_total.clone()))?;
        registry.register(Box::new(outbox_pending_total.clone()))?;
        registry.register(Box::new(outbox_oldest_pending_age_seconds.clone()))?;
        registry.register(Box::new(outbox_failed_total.clone()))?;
        registry.register(Box::new(invariant_violations_total.clone()))?;
        registry.register(Box::new(payment_e2e_seconds.clone()))?;
        registry.register(Box::new(payment_latency_seconds.clone()))?;

        Ok(Arc::new(Self {
            registry,
            payment_requests_total,
            payment_success_total,
            payment_failure_total,
            duplicate_events_skipped_total,
            retries_total,
            dlq_published_total,
            outbox_pending_total,
            outbox_oldest_pending_age_seconds,
            outbox_failed_total,
            invariant_violations_total,
            payment_e2e_seconds,
            payment_latency_seconds,
        }))
    }

    pub fn duplicate_skipped(&self, topic: &str) {
        self.duplicate_events_skipped_total.with_label_values(&[topic]).inc();
    }

    pub fn dlq_published(&self, topic: &str, error_type: &str) {
        self.dlq_published_total.with_label_values(&[topic, error_type]).inc();
    }

    pub fn render(&self) -> String {
        let encoder = TextEncoder::new();
        let mut buf = Vec::new();
        if encoder.encode(&self.registry.gather(), &mut buf).is_err() {
            return String::new();
        }
        String::from_utf8(buf).unwrap_or_default()
    }
}

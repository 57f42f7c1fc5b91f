//! Prometheus metrics for the risk service.
//!
//! All metrics live in a dedicated registry owned by [`ServiceMetrics`] and
//! are exposed in text format on `GET /metrics`.

use crate::error::ErrorKind;
use crate::types::analysis::RiskAnalysis;
use crate::types::transaction::Transaction;
use prometheus::{
    Encoder, Histogram, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry,
    TextEncoder,
};
use std::time::Duration;

/// Metric handles for the webhook pipeline
pub struct ServiceMetrics {
    registry: Registry,
    /// Risk scores of analyzed transactions, by currency and country
    risk_score: HistogramVec,
    /// Analysis outcomes: success, degraded, or an error kind
    analyses_total: IntCounterVec,
    /// Admin webhook delivery failures
    notify_failures_total: IntCounter,
    /// End-to-end webhook handling latency
    request_duration_seconds: Histogram,
    /// Whether fallback scores are recorded alongside genuine ones
    record_degraded: bool,
}

impl ServiceMetrics {
    /// Create and register all metrics. Call once at startup.
    pub fn new(record_degraded: bool) -> prometheus::Result<Self> {
        let registry = Registry::new_custom(Some("txn".into()), None)?;

        let risk_score = HistogramVec::new(
            HistogramOpts::new("risk_score", "Risk score of analyzed transactions").buckets(
                vec![0.1, 0.2, 0.3, 0.4, 0.5, 0.6, 0.7, 0.8, 0.9, 1.0],
            ),
            &["currency", "country"],
        )?;
        registry.register(Box::new(risk_score.clone()))?;

        let analyses_total = IntCounterVec::new(
            Opts::new("analyses_total", "Risk analyses by outcome"),
            &["outcome"],
        )?;
        registry.register(Box::new(analyses_total.clone()))?;

        let notify_failures_total = IntCounter::new(
            "notify_failures_total",
            "Admin webhook notifications that failed to deliver",
        )?;
        registry.register(Box::new(notify_failures_total.clone()))?;

        let request_duration_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "request_duration_seconds",
                "Webhook handling latency in seconds",
            )
            .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]),
        )?;
        registry.register(Box::new(request_duration_seconds.clone()))?;

        Ok(Self {
            registry,
            risk_score,
            analyses_total,
            notify_failures_total,
            request_duration_seconds,
            record_degraded,
        })
    }

    /// Record a successful analysis.
    ///
    /// Fallback analyses count as `degraded` and only reach the score
    /// histogram when `record_degraded` is set.
    pub fn record_analysis(&self, tx: &Transaction, analysis: &RiskAnalysis) {
        let outcome = if analysis.is_degraded() {
            "degraded"
        } else {
            "success"
        };
        self.analyses_total.with_label_values(&[outcome]).inc();

        if !analysis.is_degraded() || self.record_degraded {
            self.risk_score
                .with_label_values(&[tx.currency.as_str(), tx.country.as_str()])
                .observe(analysis.risk_score());
        }
    }

    /// Record a classified analysis failure
    pub fn record_failure(&self, kind: ErrorKind) {
        self.analyses_total.with_label_values(&[kind.as_str()]).inc();
    }

    pub fn record_notify_failure(&self) {
        self.notify_failures_total.inc();
    }

    pub fn record_request_duration(&self, elapsed: Duration) {
        self.request_duration_seconds.observe(elapsed.as_secs_f64());
    }

    /// Number of analyses recorded with the given outcome label
    pub fn analyses_with_outcome(&self, outcome: &str) -> u64 {
        self.analyses_total.with_label_values(&[outcome]).get()
    }

    /// Number of scores observed for a currency/country pair
    pub fn score_count(&self, currency: &str, country: &str) -> u64 {
        self.risk_score
            .with_label_values(&[currency, country])
            .get_sample_count()
    }

    /// Encode all metrics in the Prometheus text exposition format
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

//! Prometheus metrics for the ingress operator
//!
//! # Exported metrics
//! - `seldon_ingress_reconcile_duration_seconds` (histogram): reconcile duration labeled by controller.
//! - `seldon_ingress_reconcile_errors_total` (counter): reconcile errors labeled by controller and kind.
//! - `seldon_ingress_apply_total` (counter): Ingress writes labeled by protocol and outcome.

use std::sync::atomic::AtomicU64;

use once_cell::sync::Lazy;
use prometheus_client::encoding::EncodeLabelSet;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::histogram::{exponential_buckets, Histogram};
use prometheus_client::registry::Registry;

/// Controller label value used by this operator
pub const CONTROLLER: &str = "seldondeployment-ingress";

/// Labels for operator reconcile metrics
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct ReconcileLabels {
    pub controller: String,
}

/// Labels for operator error metrics
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct ErrorLabels {
    pub controller: String,
    /// Error kind, see `Error::kind`
    pub kind: String,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct ApplyLabels {
    /// "http" or "grpc"
    pub protocol: String,
    /// "created", "updated" or "unchanged"
    pub outcome: String,
}

/// Histogram tracking reconcile duration (seconds)
pub static RECONCILE_DURATION_SECONDS: Lazy<Family<ReconcileLabels, Histogram>> = Lazy::new(|| {
    fn reconcile_histogram() -> Histogram {
        // 1ms .. ~32s across 16 buckets.
        Histogram::new(exponential_buckets(0.001, 2.0, 16))
    }

    Family::new_with_constructor(reconcile_histogram)
});

/// Counter tracking reconcile errors
pub static RECONCILE_ERRORS_TOTAL: Lazy<Family<ErrorLabels, Counter<u64, AtomicU64>>> =
    Lazy::new(Family::default);

/// Counter tracking Ingress apply outcomes
pub static INGRESS_APPLY_TOTAL: Lazy<Family<ApplyLabels, Counter<u64, AtomicU64>>> =
    Lazy::new(Family::default);

/// Counters are registered without `_total`; the encoder appends it.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let mut registry = Registry::default();

    registry.register(
        "seldon_ingress_reconcile_duration_seconds",
        "Duration of reconcile loops in seconds",
        RECONCILE_DURATION_SECONDS.clone(),
    );
    registry.register(
        "seldon_ingress_reconcile_errors",
        "Total number of reconcile errors",
        RECONCILE_ERRORS_TOTAL.clone(),
    );
    registry.register(
        "seldon_ingress_apply",
        "Ingress apply outcomes by protocol",
        INGRESS_APPLY_TOTAL.clone(),
    );

    registry
});

pub fn observe_reconcile_duration(seconds: f64) {
    RECONCILE_DURATION_SECONDS
        .get_or_create(&ReconcileLabels {
            controller: CONTROLLER.to_string(),
        })
        .observe(seconds);
}

pub fn inc_reconcile_error(kind: &str) {
    RECONCILE_ERRORS_TOTAL
        .get_or_create(&ErrorLabels {
            controller: CONTROLLER.to_string(),
            kind: kind.to_string(),
        })
        .inc();
}

pub fn inc_ingress_apply(protocol: &str, outcome: &str) {
    INGRESS_APPLY_TOTAL
        .get_or_create(&ApplyLabels {
            protocol: protocol.to_string(),
            outcome: outcome.to_string(),
        })
        .inc();
}

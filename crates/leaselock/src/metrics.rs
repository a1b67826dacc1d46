//! Metrics for lock operations
//!
//! Counters are recorded through the `metrics` facade; installing a recorder
//! is up to the host application.

use metrics::{counter, describe_counter};

pub const ACQUIRE_TOTAL: &str = "leaselock_acquire_total";
pub const RELEASE_TOTAL: &str = "leaselock_release_total";
pub const TOUCH_TOTAL: &str = "leaselock_touch_total";
pub const STORE_ERRORS_TOTAL: &str = "leaselock_store_errors_total";

/// Register metric descriptions
/// Should be called once after the host installs its recorder
pub fn describe_metrics() {
    describe_counter!(
        ACQUIRE_TOTAL,
        "Lock acquisition attempts by outcome (acquired, contended)"
    );
    describe_counter!(
        RELEASE_TOTAL,
        "Lock releases by outcome (released, lost)"
    );
    describe_counter!(TOUCH_TOTAL, "Lease renewals by outcome (renewed, lost)");
    describe_counter!(
        STORE_ERRORS_TOTAL,
        "Store adapter failures by operation"
    );
}

pub(crate) fn record_acquire(acquired: bool) {
    let outcome = if acquired { "acquired" } else { "contended" };
    counter!(ACQUIRE_TOTAL, "outcome" => outcome).increment(1);
}

pub(crate) fn record_release(released: bool) {
    let outcome = if released { "released" } else { "lost" };
    counter!(RELEASE_TOTAL, "outcome" => outcome).increment(1);
}

pub(crate) fn record_touch(renewed: bool) {
    let outcome = if renewed { "renewed" } else { "lost" };
    counter!(TOUCH_TOTAL, "outcome" => outcome).increment(1);
}

pub(crate) fn record_store_error(operation: &'static str) {
    counter!(STORE_ERRORS_TOTAL, "operation" => operation).increment(1);
}

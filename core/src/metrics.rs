//! Ledger metrics.
//!
//! # Exported Metrics
//!
//! ## Counters
//! - `roster_registrations_total` - Successful registrations
//! - `roster_registrations_over_capacity_total` - Registrations that left an event over capacity
//! - `roster_deregistrations_total` - Participants removed through the ledger
//! - `roster_imported_participants_total` - Participants created by bulk import
//! - `roster_check_ins_total{result}` - Check-in attempts by result
//! - `roster_consistency_faults_total{kind}` - Consistency faults surfaced to callers
//! - `roster_compensations_total{result}` - Rollbacks of half-applied writes

use metrics::{counter, describe_counter};

/// Successful registrations.
pub const REGISTRATIONS: &str = "roster_registrations_total";
/// Registrations that left an event over capacity.
pub const OVER_CAPACITY: &str = "roster_registrations_over_capacity_total";
/// Participants removed through the ledger.
pub const DEREGISTRATIONS: &str = "roster_deregistrations_total";
/// Participants created by bulk import.
pub const IMPORTED: &str = "roster_imported_participants_total";
/// Check-in attempts by result.
pub const CHECK_INS: &str = "roster_check_ins_total";
/// Consistency faults surfaced to callers.
pub const CONSISTENCY_FAULTS: &str = "roster_consistency_faults_total";
/// Rollbacks of half-applied writes.
pub const COMPENSATIONS: &str = "roster_compensations_total";

/// Register descriptions for all ledger metrics.
///
/// Call once at startup, after installing a recorder.
pub fn describe() {
    describe_counter!(REGISTRATIONS, "Successful event registrations");
    describe_counter!(
        OVER_CAPACITY,
        "Registrations accepted while the event was already at or over capacity"
    );
    describe_counter!(DEREGISTRATIONS, "Participants removed through the ledger");
    describe_counter!(IMPORTED, "Participants created by bulk import");
    describe_counter!(CHECK_INS, "Check-in attempts by result");
    describe_counter!(CONSISTENCY_FAULTS, "Consistency faults surfaced to callers by kind");
    describe_counter!(COMPENSATIONS, "Rollbacks of half-applied writes by result");
}

pub(crate) fn consistency_fault(kind: &'static str) {
    counter!(CONSISTENCY_FAULTS, "kind" => kind).increment(1);
}

pub(crate) fn compensation(succeeded: bool) {
    let result = if succeeded { "succeeded" } else { "failed" };
    counter!(COMPENSATIONS, "result" => result).increment(1);
}

pub(crate) fn check_in(result: &'static str) {
    counter!(CHECK_INS, "result" => result).increment(1);
}

pub(crate) fn registered(over_capacity: bool) {
    counter!(REGISTRATIONS).increment(1);
    if over_capacity {
        counter!(OVER_CAPACITY).increment(1);
    }
}

pub(crate) fn deregistered() {
    counter!(DEREGISTRATIONS).increment(1);
}

pub(crate) fn imported(count: usize) {
    counter!(IMPORTED).increment(u64::try_from(count).unwrap_or(u64::MAX));
}

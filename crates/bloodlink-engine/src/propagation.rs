//! Inter-facility propagation target selection.
//!
//! When the origin facility cannot cover a request, the alert is offered to
//! the nearest other facilities. Selection is best-effort and re-entrant:
//! the alert's propagation record guarantees a facility is never offered
//! the same alert twice.

use bloodlink_core::{Alert, Facility};

use crate::matching;

/// Selects up to `fanout` propagation targets for `alert`, nearest first,
/// centered on the origin facility and bounded by the alert's radius.
///
/// Excludes the origin itself, inactive facilities, and any facility
/// already present in the alert's propagation record. An empty result is a
/// normal outcome, not an error.
pub fn select_targets(
    origin: &Facility,
    alert: &Alert,
    candidates: Vec<Facility>,
    fanout: usize,
) -> Vec<Facility> {
    let eligible: Vec<Facility> = candidates
        .into_iter()
        .filter(|f| f.id != origin.id && f.active && !alert.was_propagated_to(&f.id))
        .collect();

    matching::nearest(&origin.location, alert.radius_km, fanout, eligible)
}

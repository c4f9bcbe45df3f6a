//! Geospatial and compatibility candidate selection.
//!
//! Pure functions over actor/facility snapshots: no I/O, no mutation. The
//! directory supplies candidate sets; these filters narrow them.

use bloodlink_core::{Actor, BloodType, GeoPoint, Positioned};

/// Candidates within `radius_km` of `center`, inclusive of the boundary.
/// Candidates without a stored location are excluded.
pub fn within_radius<T: Positioned>(center: &GeoPoint, radius_km: f64, candidates: Vec<T>) -> Vec<T> {
    candidates
        .into_iter()
        .filter(|c| match c.position() {
            Some(pos) => center.within_radius(&pos, radius_km),
            None => false,
        })
        .collect()
}

/// Candidates within `radius_km` of `center`, ordered nearest first and
/// capped at `limit`.
pub fn nearest<T: Positioned>(
    center: &GeoPoint,
    radius_km: f64,
    limit: usize,
    candidates: Vec<T>,
) -> Vec<T> {
    let mut scored: Vec<(f64, T)> = candidates
        .into_iter()
        .filter_map(|c| {
            let pos = c.position()?;
            let distance = center.distance_km(&pos);
            (distance <= radius_km).then_some((distance, c))
        })
        .collect();
    scored.sort_by(|a, b| a.0.total_cmp(&b.0));
    scored.into_iter().take(limit).map(|(_, c)| c).collect()
}

/// Donors eligible for a blood request: exact blood-type match, active
/// account, reachable push channel.
pub fn compatible_donors(candidates: Vec<Actor>, blood_type: BloodType) -> Vec<Actor> {
    candidates
        .into_iter()
        .filter(|d| d.blood_type == Some(blood_type) && d.active && d.reachable())
        .collect()
}

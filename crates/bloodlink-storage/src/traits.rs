//! Boundary traits the engine uses to reach persisted state.
//!
//! Implementations must be thread-safe (`Send + Sync`). The contract every
//! backend must honor: `update` is a compare-and-swap on the alert's
//! `version` field, so that all mutations of one alert's embedded state
//! (responses, propagation record, status) are serialized per alert.

use async_trait::async_trait;
use time::OffsetDateTime;

use bloodlink_core::{Actor, Alert, BloodType, Facility};

use crate::error::StorageError;

/// Persistence for the alert aggregate.
///
/// # Example
///
/// ```ignore
/// use bloodlink_storage::{AlertStore, StorageError};
///
/// async fn load(store: &dyn AlertStore, id: &str) -> Result<bloodlink_core::Alert, StorageError> {
///     store
///         .get(id)
///         .await?
///         .ok_or_else(|| StorageError::not_found("alert", id))
/// }
/// ```
#[async_trait]
pub trait AlertStore: Send + Sync {
    /// Inserts a freshly created alert.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::AlreadyExists` if an alert with the same id
    /// exists.
    async fn insert(&self, alert: &Alert) -> Result<(), StorageError>;

    /// Reads an alert by id. Returns `None` if it does not exist.
    async fn get(&self, id: &str) -> Result<Option<Alert>, StorageError>;

    /// Replaces the stored alert if its version still equals
    /// `expected_version`, and returns the stored copy with the version
    /// incremented.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::VersionConflict` when another writer got there
    /// first; the caller should re-fetch and retry.
    /// Returns `StorageError::NotFound` if the alert does not exist.
    async fn update(&self, alert: &Alert, expected_version: u64) -> Result<Alert, StorageError>;

    /// Transitions every `active` alert whose expiry has passed `now` to
    /// `expired`, returning the ids that were transitioned.
    ///
    /// Idempotent: already-expired alerts are untouched.
    async fn expire_due(&self, now: OffsetDateTime) -> Result<Vec<String>, StorageError>;

    /// Alerts bound to a facility, either as origin or through propagation,
    /// newest first.
    async fn alerts_for_facility(&self, facility_id: &str) -> Result<Vec<Alert>, StorageError>;
}

/// Read access to actor and facility snapshots.
///
/// Candidate queries return full snapshots; geospatial narrowing is a pure
/// computation performed by the engine over these snapshots.
#[async_trait]
pub trait ActorDirectory: Send + Sync {
    /// Reads an actor by id. Returns `None` if unknown.
    async fn actor(&self, id: &str) -> Result<Option<Actor>, StorageError>;

    /// Reads a facility by id. Returns `None` if unknown.
    async fn facility(&self, id: &str) -> Result<Option<Facility>, StorageError>;

    /// The facility operated by the given actor account, if any.
    async fn facility_for_operator(
        &self,
        operator_id: &str,
    ) -> Result<Option<Facility>, StorageError>;

    /// Donor candidates with the given blood type. Includes inactive and
    /// unreachable donors; compatibility filtering happens in the engine.
    async fn donors_by_blood_type(
        &self,
        blood_type: BloodType,
    ) -> Result<Vec<Actor>, StorageError>;

    /// All active facilities.
    async fn active_facilities(&self) -> Result<Vec<Facility>, StorageError>;

    /// Adds `units` of `blood_type` to a facility's inventory.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the facility does not exist.
    async fn restock(
        &self,
        facility_id: &str,
        blood_type: BloodType,
        units: u32,
    ) -> Result<(), StorageError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    // Compile-time test that AlertStore is object-safe
    fn _assert_alert_store_object_safe(_: &dyn AlertStore) {}

    // Compile-time test that ActorDirectory is object-safe
    fn _assert_directory_object_safe(_: &dyn ActorDirectory) {}
}

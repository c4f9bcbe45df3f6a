//! Storage trait for the durable notification log.

use async_trait::async_trait;

use bloodlink_storage::StorageError;

use crate::types::NotificationRecord;

/// Append-only audit log of delivery attempts.
///
/// Appends carry a final outcome; afterwards only the `read` and
/// `superseded` flags may change.
#[async_trait]
pub trait NotificationLog: Send + Sync {
    /// Appends one delivery record.
    async fn append(&self, record: &NotificationRecord) -> Result<(), StorageError>;

    /// A recipient's records, newest first, capped at `limit`.
    async fn history(
        &self,
        recipient: &str,
        limit: usize,
    ) -> Result<Vec<NotificationRecord>, StorageError>;

    /// Marks a record read.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if no record has that id.
    async fn mark_read(&self, id: &str) -> Result<(), StorageError>;

    /// Marks every unread record tied to `alert_id` as superseded. Returns
    /// the number of records touched.
    async fn mark_superseded_for_alert(&self, alert_id: &str) -> Result<u64, StorageError>;
}

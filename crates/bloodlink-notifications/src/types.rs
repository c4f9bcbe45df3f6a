use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use bloodlink_core::new_id;

use crate::templates::RenderedMessage;

/// Notification event kind. Closed vocabulary; every kind has a fixed
/// template in `templates`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    NewAlert,
    AlertCancelled,
    DonorAccepted,
    DonationConfirmed,
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NewAlert => write!(f, "NEW_ALERT"),
            Self::AlertCancelled => write!(f, "ALERT_CANCELLED"),
            Self::DonorAccepted => write!(f, "DONOR_ACCEPTED"),
            Self::DonationConfirmed => write!(f, "DONATION_CONFIRMED"),
        }
    }
}

/// Delivery outcome of one notification attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationOutcome {
    Pending,
    Sent,
    Failed,
}

/// Append-only audit entry for one delivery attempt.
///
/// Records never mutate after append except the `read` and `superseded`
/// flags and the outcome moving off `pending`; a final outcome never moves
/// backward.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationRecord {
    pub id: String,
    pub recipient: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub alert: Option<String>,

    pub event: EventKind,
    pub title: String,
    pub body: String,

    /// Structured payload handed to the transport alongside the rendered
    /// text.
    #[serde(default)]
    pub data: serde_json::Value,

    pub outcome: NotificationOutcome,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(default)]
    pub read: bool,

    /// Set when the alert this record announced was cancelled before the
    /// recipient read it.
    #[serde(default)]
    pub superseded: bool,

    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl NotificationRecord {
    /// A pending record for one attempt at delivering `message` about
    /// `alert` to `recipient`.
    pub fn pending(
        recipient: &str,
        alert: Option<&str>,
        event: EventKind,
        message: &RenderedMessage,
        now: OffsetDateTime,
    ) -> Self {
        Self {
            id: new_id(),
            recipient: recipient.to_string(),
            alert: alert.map(String::from),
            event,
            title: message.title.clone(),
            body: message.body.clone(),
            data: message.data.clone(),
            outcome: NotificationOutcome::Pending,
            error: None,
            read: false,
            superseded: false,
            created_at: now,
        }
    }

    pub fn sent(mut self) -> Self {
        self.outcome = NotificationOutcome::Sent;
        self.error = None;
        self
    }

    pub fn failed(mut self, error: impl Into<String>) -> Self {
        self.outcome = NotificationOutcome::Failed;
        self.error = Some(error.into());
        self
    }
}

/// Aggregate outcome of one dispatch batch.
///
/// `skipped` counts recipients without a push channel; they were never
/// attempted and count toward neither `successful` nor `failed`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchSummary {
    pub successful: u32,
    pub failed: u32,
    pub skipped: u32,
    pub total: u32,
}

impl DispatchSummary {
    /// Folds another batch into this one.
    pub fn merge(&mut self, other: DispatchSummary) {
        self.successful += other.successful;
        self.failed += other.failed;
        self.skipped += other.skipped;
        self.total += other.total;
    }
}

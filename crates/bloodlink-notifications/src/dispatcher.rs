//! Settle-all notification fan-out.

use std::sync::Arc;

use futures_util::future::join_all;
use time::OffsetDateTime;
use tracing::{debug, error, info};

use bloodlink_core::Actor;

use crate::log::NotificationLog;
use crate::templates::{render, MessageContext, RenderedMessage};
use crate::transport::PushTransport;
use crate::types::{DispatchSummary, EventKind, NotificationRecord};

/// Fans a rendered event out to a recipient set, one delivery attempt per
/// recipient, and records every attempt in the notification log.
///
/// Attempts are independent: recipients are settled concurrently and one
/// failure never blocks or fails the others. A recipient's log record is
/// written before the summary accounts for that recipient.
pub struct Dispatcher<L, T>
where
    L: NotificationLog,
    T: PushTransport,
{
    log: Arc<L>,
    transport: Arc<T>,
}

enum Attempt {
    Sent,
    Failed,
}

impl<L, T> Dispatcher<L, T>
where
    L: NotificationLog,
    T: PushTransport,
{
    pub fn new(log: Arc<L>, transport: Arc<T>) -> Self {
        Self { log, transport }
    }

    /// Dispatches `event` to every recipient.
    ///
    /// Recipients without a push channel are skipped silently: not
    /// attempted, not logged, counted only in `skipped`. The returned
    /// summary always satisfies `successful + failed + skipped == total`.
    pub async fn dispatch(
        &self,
        recipients: &[Actor],
        ctx: &MessageContext,
        event: EventKind,
    ) -> DispatchSummary {
        let message = render(event, ctx);

        let mut skipped = 0u32;
        let mut attempts = Vec::new();
        for recipient in recipients {
            match recipient.push_token.as_deref().filter(|t| !t.is_empty()) {
                Some(token) => attempts.push(self.attempt(
                    recipient.id.clone(),
                    token.to_string(),
                    ctx.alert_id.clone(),
                    event,
                    message.clone(),
                )),
                None => {
                    debug!(recipient = %recipient.id, "Recipient has no push token, skipping");
                    skipped += 1;
                }
            }
        }

        let outcomes = join_all(attempts).await;
        let successful = outcomes
            .iter()
            .filter(|o| matches!(o, Attempt::Sent))
            .count() as u32;
        let failed = outcomes.len() as u32 - successful;

        let summary = DispatchSummary {
            successful,
            failed,
            skipped,
            total: recipients.len() as u32,
        };
        info!(
            event = %event,
            successful = summary.successful,
            failed = summary.failed,
            skipped = summary.skipped,
            "Dispatched notifications"
        );
        summary
    }

    /// Dispatches `event` to a single recipient.
    pub async fn notify_one(
        &self,
        recipient: &Actor,
        ctx: &MessageContext,
        event: EventKind,
    ) -> DispatchSummary {
        self.dispatch(std::slice::from_ref(recipient), ctx, event)
            .await
    }

    async fn attempt(
        &self,
        recipient_id: String,
        token: String,
        alert_id: String,
        event: EventKind,
        message: RenderedMessage,
    ) -> Attempt {
        let now = OffsetDateTime::now_utc();
        let record = NotificationRecord::pending(&recipient_id, Some(&alert_id), event, &message, now);

        let (record, attempt) = match self.transport.send(&token, &message).await {
            Ok(result) if result.delivered => (record.sent(), Attempt::Sent),
            Ok(result) => {
                let reason = result.error.unwrap_or_else(|| "delivery rejected".into());
                debug!(recipient = %recipient_id, error = %reason, "Push delivery rejected");
                (record.failed(reason), Attempt::Failed)
            }
            Err(e) => {
                debug!(recipient = %recipient_id, error = %e, "Push transport error");
                (record.failed(e.to_string()), Attempt::Failed)
            }
        };

        if let Err(e) = self.log.append(&record).await {
            error!(
                recipient = %recipient_id,
                error = %e,
                "Failed to append notification record"
            );
        }
        attempt
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bloodlink_core::{ActorRole, BloodType, Urgency};
    use bloodlink_storage::StorageError;
    use tokio::sync::RwLock;

    use crate::transport::{SendResult, TransportError};
    use crate::types::NotificationOutcome;

    struct VecLog(RwLock<Vec<NotificationRecord>>);

    impl VecLog {
        fn new() -> Self {
            Self(RwLock::new(Vec::new()))
        }
    }

    #[async_trait]
    impl NotificationLog for VecLog {
        async fn append(&self, record: &NotificationRecord) -> Result<(), StorageError> {
            self.0.write().await.push(record.clone());
            Ok(())
        }

        async fn history(
            &self,
            recipient: &str,
            limit: usize,
        ) -> Result<Vec<NotificationRecord>, StorageError> {
            let mut records: Vec<_> = self
                .0
                .read()
                .await
                .iter()
                .filter(|r| r.recipient == recipient)
                .cloned()
                .collect();
            records.reverse();
            records.truncate(limit);
            Ok(records)
        }

        async fn mark_read(&self, _id: &str) -> Result<(), StorageError> {
            Ok(())
        }

        async fn mark_superseded_for_alert(&self, _alert_id: &str) -> Result<u64, StorageError> {
            Ok(0)
        }
    }

    struct StaticTransport {
        delivered: bool,
    }

    #[async_trait]
    impl PushTransport for StaticTransport {
        async fn send(
            &self,
            _token: &str,
            _message: &RenderedMessage,
        ) -> Result<SendResult, TransportError> {
            if self.delivered {
                Ok(SendResult::delivered())
            } else {
                Ok(SendResult::rejected("device unreachable"))
            }
        }
    }

    struct ErroringTransport;

    #[async_trait]
    impl PushTransport for ErroringTransport {
        async fn send(
            &self,
            _token: &str,
            _message: &RenderedMessage,
        ) -> Result<SendResult, TransportError> {
            Err(TransportError::SendFailed("connection refused".into()))
        }
    }

    fn donor(id: &str, token: Option<&str>) -> Actor {
        Actor {
            id: id.into(),
            role: ActorRole::Donor,
            name: format!("Donor {id}"),
            location: None,
            blood_type: Some(BloodType::OPos),
            hospital: None,
            active: true,
            push_token: token.map(String::from),
        }
    }

    fn ctx() -> MessageContext {
        MessageContext {
            alert_id: "alert-1".into(),
            blood_type: BloodType::OPos,
            urgency: Urgency::High,
            hospital: "Central Hospital".into(),
            donor_name: None,
        }
    }

    #[tokio::test]
    async fn test_dispatch_counts_and_records() {
        let log = Arc::new(VecLog::new());
        let dispatcher = Dispatcher::new(log.clone(), Arc::new(StaticTransport { delivered: true }));

        let recipients = vec![
            donor("d1", Some("tok1")),
            donor("d2", None),
            donor("d3", Some("tok3")),
        ];
        let summary = dispatcher
            .dispatch(&recipients, &ctx(), EventKind::NewAlert)
            .await;

        assert_eq!(summary.successful, 2);
        assert_eq!(summary.failed, 0);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.total, 3);

        // One record per attempt, none for the skipped recipient.
        let records = log.0.read().await;
        assert_eq!(records.len(), 2);
        assert!(records
            .iter()
            .all(|r| r.outcome == NotificationOutcome::Sent));
        assert!(records.iter().all(|r| r.alert.as_deref() == Some("alert-1")));
        assert!(!records.iter().any(|r| r.recipient == "d2"));
    }

    #[tokio::test]
    async fn test_rejected_delivery_recorded_as_failed() {
        let log = Arc::new(VecLog::new());
        let dispatcher =
            Dispatcher::new(log.clone(), Arc::new(StaticTransport { delivered: false }));

        let summary = dispatcher
            .dispatch(&[donor("d1", Some("tok1"))], &ctx(), EventKind::NewAlert)
            .await;

        assert_eq!(summary.successful, 0);
        assert_eq!(summary.failed, 1);

        let records = log.0.read().await;
        assert_eq!(records[0].outcome, NotificationOutcome::Failed);
        assert_eq!(records[0].error.as_deref(), Some("device unreachable"));
    }

    #[tokio::test]
    async fn test_transport_error_never_propagates() {
        let log = Arc::new(VecLog::new());
        let dispatcher = Dispatcher::new(log.clone(), Arc::new(ErroringTransport));

        let recipients = vec![donor("d1", Some("tok1")), donor("d2", Some("tok2"))];
        let summary = dispatcher
            .dispatch(&recipients, &ctx(), EventKind::AlertCancelled)
            .await;

        // Both attempts fail independently; dispatch itself never errors.
        assert_eq!(summary.failed, 2);
        assert_eq!(summary.successful, 0);
        let records = log.0.read().await;
        assert_eq!(records.len(), 2);
        assert!(records
            .iter()
            .all(|r| r.error.as_deref() == Some("Send failed: connection refused")));
    }

    #[tokio::test]
    async fn test_notify_one() {
        let log = Arc::new(VecLog::new());
        let dispatcher = Dispatcher::new(log.clone(), Arc::new(StaticTransport { delivered: true }));

        let summary = dispatcher
            .notify_one(&donor("d1", Some("tok1")), &ctx(), EventKind::DonorAccepted)
            .await;
        assert_eq!(summary.successful, 1);
        assert_eq!(summary.total, 1);

        let records = log.0.read().await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].event, EventKind::DonorAccepted);
    }
}

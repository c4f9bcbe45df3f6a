use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use time::OffsetDateTime;
use tokio::sync::RwLock;

use bloodlink_core::{Actor, ActorRole, Alert, AlertStatus, BloodType, Facility};
use bloodlink_notifications::{NotificationLog, NotificationRecord};
use bloodlink_storage::{ActorDirectory, AlertStore, StorageError};

/// In-memory backend implementing `AlertStore`, `ActorDirectory`, and
/// `NotificationLog`.
///
/// Alerts, actors, and facilities live in `DashMap`s; the notification log
/// is an append-only vector behind an async `RwLock`. Alert updates hold the
/// entry lock for the duration of the version check and swap.
#[derive(Debug, Default)]
pub struct MemoryStore {
    alerts: DashMap<String, Alert>,
    actors: DashMap<String, Actor>,
    facilities: DashMap<String, Facility>,
    notifications: RwLock<Vec<NotificationRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers or replaces an actor snapshot.
    pub fn put_actor(&self, actor: Actor) {
        self.actors.insert(actor.id.clone(), actor);
    }

    /// Registers or replaces a facility snapshot.
    pub fn put_facility(&self, facility: Facility) {
        self.facilities.insert(facility.id.clone(), facility);
    }

    /// Number of stored notification records (for tests and monitoring).
    pub async fn notification_count(&self) -> usize {
        self.notifications.read().await.len()
    }
}

#[async_trait]
impl AlertStore for MemoryStore {
    async fn insert(&self, alert: &Alert) -> Result<(), StorageError> {
        match self.alerts.entry(alert.id.clone()) {
            Entry::Occupied(_) => Err(StorageError::already_exists("alert", &alert.id)),
            Entry::Vacant(slot) => {
                slot.insert(alert.clone());
                Ok(())
            }
        }
    }

    async fn get(&self, id: &str) -> Result<Option<Alert>, StorageError> {
        Ok(self.alerts.get(id).map(|a| a.clone()))
    }

    async fn update(&self, alert: &Alert, expected_version: u64) -> Result<Alert, StorageError> {
        let mut entry = self
            .alerts
            .get_mut(&alert.id)
            .ok_or_else(|| StorageError::not_found("alert", &alert.id))?;

        if entry.version != expected_version {
            return Err(StorageError::version_conflict(
                &alert.id,
                expected_version,
                entry.version,
            ));
        }

        let mut stored = alert.clone();
        stored.version = expected_version + 1;
        *entry = stored.clone();
        Ok(stored)
    }

    async fn expire_due(&self, now: OffsetDateTime) -> Result<Vec<String>, StorageError> {
        let mut expired = Vec::new();
        for mut entry in self.alerts.iter_mut() {
            if entry.status == AlertStatus::Active && entry.is_expired_at(now) {
                entry.status = AlertStatus::Expired;
                entry.version += 1;
                expired.push(entry.id.clone());
            }
        }
        Ok(expired)
    }

    async fn alerts_for_facility(&self, facility_id: &str) -> Result<Vec<Alert>, StorageError> {
        let mut alerts: Vec<Alert> = self
            .alerts
            .iter()
            .filter(|a| {
                a.facility.as_deref() == Some(facility_id) || a.was_propagated_to(facility_id)
            })
            .map(|a| a.clone())
            .collect();
        alerts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(alerts)
    }
}

#[async_trait]
impl ActorDirectory for MemoryStore {
    async fn actor(&self, id: &str) -> Result<Option<Actor>, StorageError> {
        Ok(self.actors.get(id).map(|a| a.clone()))
    }

    async fn facility(&self, id: &str) -> Result<Option<Facility>, StorageError> {
        Ok(self.facilities.get(id).map(|f| f.clone()))
    }

    async fn facility_for_operator(
        &self,
        operator_id: &str,
    ) -> Result<Option<Facility>, StorageError> {
        Ok(self
            .facilities
            .iter()
            .find(|f| f.operator == operator_id)
            .map(|f| f.clone()))
    }

    async fn donors_by_blood_type(
        &self,
        blood_type: BloodType,
    ) -> Result<Vec<Actor>, StorageError> {
        Ok(self
            .actors
            .iter()
            .filter(|a| a.role == ActorRole::Donor && a.blood_type == Some(blood_type))
            .map(|a| a.clone())
            .collect())
    }

    async fn active_facilities(&self) -> Result<Vec<Facility>, StorageError> {
        Ok(self
            .facilities
            .iter()
            .filter(|f| f.active)
            .map(|f| f.clone())
            .collect())
    }

    async fn restock(
        &self,
        facility_id: &str,
        blood_type: BloodType,
        units: u32,
    ) -> Result<(), StorageError> {
        let mut facility = self
            .facilities
            .get_mut(facility_id)
            .ok_or_else(|| StorageError::not_found("facility", facility_id))?;
        facility.inventory.add_units(blood_type, units);
        Ok(())
    }
}

#[async_trait]
impl NotificationLog for MemoryStore {
    async fn append(&self, record: &NotificationRecord) -> Result<(), StorageError> {
        self.notifications.write().await.push(record.clone());
        Ok(())
    }

    async fn history(
        &self,
        recipient: &str,
        limit: usize,
    ) -> Result<Vec<NotificationRecord>, StorageError> {
        let records = self.notifications.read().await;
        Ok(records
            .iter()
            .rev()
            .filter(|r| r.recipient == recipient)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn mark_read(&self, id: &str) -> Result<(), StorageError> {
        let mut records = self.notifications.write().await;
        let record = records
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| StorageError::not_found("notification", id))?;
        record.read = true;
        Ok(())
    }

    async fn mark_superseded_for_alert(&self, alert_id: &str) -> Result<u64, StorageError> {
        let mut records = self.notifications.write().await;
        let mut touched = 0;
        for record in records
            .iter_mut()
            .filter(|r| r.alert.as_deref() == Some(alert_id) && !r.read && !r.superseded)
        {
            record.superseded = true;
            touched += 1;
        }
        Ok(touched)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use time::macros::datetime;
    use time::Duration;

    use bloodlink_core::{AlertDraft, GeoPoint, ResponseStatus, Urgency};
    use bloodlink_notifications::{EventKind, RenderedMessage};

    fn alert_at(created: OffsetDateTime) -> Alert {
        AlertDraft {
            requester: "doc-1".into(),
            facility: Some("bank-1".into()),
            blood_type: BloodType::OPos,
            urgency: Urgency::High,
            quantity: Some(1),
            description: None,
            origin: GeoPoint::new(3.87, 11.52).unwrap(),
            radius_km: 10.0,
        }
        .build(created, Duration::hours(24))
        .unwrap()
    }

    fn record_for(recipient: &str, alert: &str) -> NotificationRecord {
        NotificationRecord::pending(
            recipient,
            Some(alert),
            EventKind::NewAlert,
            &RenderedMessage {
                title: "t".into(),
                body: "b".into(),
                data: serde_json::Value::Null,
            },
            OffsetDateTime::now_utc(),
        )
        .sent()
    }

    #[tokio::test]
    async fn test_insert_and_get() {
        let store = MemoryStore::new();
        let alert = alert_at(datetime!(2026-01-10 08:00:00 UTC));

        store.insert(&alert).await.unwrap();
        let loaded = store.get(&alert.id).await.unwrap().unwrap();
        assert_eq!(loaded, alert);

        let err = store.insert(&alert).await.unwrap_err();
        assert!(matches!(err, StorageError::AlreadyExists { .. }));

        assert!(store.get("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_cas_increments_version() {
        let store = MemoryStore::new();
        let mut alert = alert_at(datetime!(2026-01-10 08:00:00 UTC));
        store.insert(&alert).await.unwrap();

        alert.upsert_response(
            "d1",
            ResponseStatus::Accepted,
            None,
            datetime!(2026-01-10 09:00:00 UTC),
        );
        let stored = store.update(&alert, 0).await.unwrap();
        assert_eq!(stored.version, 1);

        // Re-using the stale version must conflict.
        let err = store.update(&alert, 0).await.unwrap_err();
        assert!(matches!(
            err,
            StorageError::VersionConflict {
                expected: 0,
                actual: 1,
                ..
            }
        ));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_concurrent_writers_both_land_with_retry() {
        let store = Arc::new(MemoryStore::new());
        let alert = alert_at(datetime!(2026-01-10 08:00:00 UTC));
        store.insert(&alert).await.unwrap();

        let mut handles = Vec::new();
        for donor in ["d1", "d2"] {
            let store = store.clone();
            let id = alert.id.clone();
            handles.push(tokio::spawn(async move {
                loop {
                    let mut current = store.get(&id).await.unwrap().unwrap();
                    let expected = current.version;
                    current.upsert_response(
                        donor,
                        ResponseStatus::Accepted,
                        None,
                        OffsetDateTime::now_utc(),
                    );
                    match store.update(&current, expected).await {
                        Ok(_) => break,
                        Err(StorageError::VersionConflict { .. }) => continue,
                        Err(e) => panic!("unexpected error: {e}"),
                    }
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let final_alert = store.get(&alert.id).await.unwrap().unwrap();
        assert_eq!(final_alert.responses.len(), 2);
        assert_eq!(final_alert.stats.total_accepted, 2);
    }

    #[tokio::test]
    async fn test_expire_due_is_idempotent() {
        let store = MemoryStore::new();
        let due = alert_at(datetime!(2026-01-10 08:00:00 UTC));
        let fresh = alert_at(datetime!(2026-01-12 08:00:00 UTC));
        store.insert(&due).await.unwrap();
        store.insert(&fresh).await.unwrap();

        let now = datetime!(2026-01-11 09:00:00 UTC);
        let expired = store.expire_due(now).await.unwrap();
        assert_eq!(expired, vec![due.id.clone()]);

        let reloaded = store.get(&due.id).await.unwrap().unwrap();
        assert_eq!(reloaded.status, AlertStatus::Expired);
        assert_eq!(reloaded.version, 1);

        // Second sweep finds nothing new.
        assert!(store.expire_due(now).await.unwrap().is_empty());
        let untouched = store.get(&fresh.id).await.unwrap().unwrap();
        assert_eq!(untouched.status, AlertStatus::Active);
    }

    #[tokio::test]
    async fn test_alerts_for_facility_covers_origin_and_propagation() {
        let store = MemoryStore::new();
        let mut first = alert_at(datetime!(2026-01-10 08:00:00 UTC));
        first.facility = Some("bank-1".into());
        let mut second = alert_at(datetime!(2026-01-10 10:00:00 UTC));
        second.facility = Some("bank-2".into());
        second.record_propagation("bank-1");
        let mut unrelated = alert_at(datetime!(2026-01-10 11:00:00 UTC));
        unrelated.facility = Some("bank-3".into());

        store.insert(&first).await.unwrap();
        store.insert(&second).await.unwrap();
        store.insert(&unrelated).await.unwrap();

        let listed = store.alerts_for_facility("bank-1").await.unwrap();
        let ids: Vec<_> = listed.iter().map(|a| a.id.as_str()).collect();
        // Newest first.
        assert_eq!(ids, vec![second.id.as_str(), first.id.as_str()]);
    }

    #[tokio::test]
    async fn test_directory_queries() {
        let store = MemoryStore::new();
        store.put_actor(Actor {
            id: "d1".into(),
            role: ActorRole::Donor,
            name: "Donor 1".into(),
            location: None,
            blood_type: Some(BloodType::OPos),
            hospital: None,
            active: true,
            push_token: Some("tok".into()),
        });
        store.put_actor(Actor {
            id: "doc-1".into(),
            role: ActorRole::Doctor,
            name: "Doc".into(),
            location: None,
            blood_type: None,
            hospital: Some("Central".into()),
            active: true,
            push_token: None,
        });
        store.put_facility(Facility {
            id: "bank-1".into(),
            operator: "op-1".into(),
            name: "Central Blood Bank".into(),
            location: GeoPoint::new(3.87, 11.52).unwrap(),
            address: "Main street".into(),
            phone: None,
            inventory: Default::default(),
            active: true,
        });

        let donors = store.donors_by_blood_type(BloodType::OPos).await.unwrap();
        assert_eq!(donors.len(), 1);
        assert!(store
            .donors_by_blood_type(BloodType::ANeg)
            .await
            .unwrap()
            .is_empty());

        let facility = store.facility_for_operator("op-1").await.unwrap().unwrap();
        assert_eq!(facility.id, "bank-1");
        assert!(store.facility_for_operator("nobody").await.unwrap().is_none());

        store.restock("bank-1", BloodType::OPos, 2).await.unwrap();
        let facility = store.facility("bank-1").await.unwrap().unwrap();
        assert!(facility.inventory.has_stock(BloodType::OPos, 2));

        let err = store.restock("missing", BloodType::OPos, 1).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_notification_log() {
        let store = MemoryStore::new();
        store.append(&record_for("u1", "a1")).await.unwrap();
        store.append(&record_for("u1", "a2")).await.unwrap();
        store.append(&record_for("u2", "a1")).await.unwrap();

        let history = store.history("u1", 10).await.unwrap();
        assert_eq!(history.len(), 2);
        // Newest first.
        assert_eq!(history[0].alert.as_deref(), Some("a2"));
        assert_eq!(store.history("u1", 1).await.unwrap().len(), 1);

        let id = history[0].id.clone();
        store.mark_read(&id).await.unwrap();
        assert!(store.mark_read("missing").await.unwrap_err().is_not_found());

        // a2's record is now read, so only the two unread a1 records flip.
        let touched = store.mark_superseded_for_alert("a1").await.unwrap();
        assert_eq!(touched, 2);
        assert_eq!(store.mark_superseded_for_alert("a1").await.unwrap(), 0);
    }
}

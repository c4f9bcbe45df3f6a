//! The alert lifecycle orchestrator.
//!
//! Every operation is an independent unit of work over persisted state.
//! Per-alert mutations go through an optimistic compare-and-swap retry
//! loop, so concurrent responses to one alert serialize without a shared
//! lock, and no lock is ever held across a transport call.

use std::sync::Arc;

use time::OffsetDateTime;
use tracing::{info, warn};

use bloodlink_core::{
    Actor, ActorRole, Alert, AlertDraft, AlertStatus, BloodType, CoreError, Facility, GeoPoint,
    ResponseStatus, Urgency, MAX_RADIUS_KM, MIN_RADIUS_KM,
};
use bloodlink_notifications::{
    DispatchSummary, Dispatcher, EventKind, MessageContext, NotificationLog, NotificationRecord,
    PushTransport,
};
use bloodlink_storage::{ActorDirectory, AlertStore, StorageError};

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::{matching, propagation};

/// Upper bound on CAS retries for one logical mutation.
const MAX_UPDATE_RETRIES: u32 = 5;

/// Caller-supplied fields for a new alert.
#[derive(Debug, Clone)]
pub struct CreateAlertRequest {
    /// Origin blood bank, when the request is bound to one.
    pub facility: Option<String>,
    pub blood_type: BloodType,
    /// Defaults to `medium` when omitted.
    pub urgency: Option<Urgency>,
    pub quantity: Option<u32>,
    pub description: Option<String>,
    pub origin: GeoPoint,
    /// Defaults to the configured radius when omitted.
    pub radius_km: Option<f64>,
}

/// A lifecycle transition result: the updated alert plus the notification
/// summary for the fan-out it triggered. Dispatch failures live only here
/// and in the notification log; they never fail the transition.
#[derive(Debug, Clone)]
pub struct AlertOutcome {
    pub alert: Alert,
    pub notifications: DispatchSummary,
}

/// Result of a propagation round.
#[derive(Debug, Clone)]
pub struct PropagationOutcome {
    pub alert: Alert,
    /// Facilities newly offered the alert this round.
    pub facilities: Vec<Facility>,
    pub notifications: DispatchSummary,
}

/// The alert lifecycle engine.
pub struct AlertService<S, D, L, T>
where
    S: AlertStore,
    D: ActorDirectory,
    L: NotificationLog,
    T: PushTransport,
{
    store: Arc<S>,
    directory: Arc<D>,
    log: Arc<L>,
    dispatcher: Dispatcher<L, T>,
    config: EngineConfig,
}

impl<S, D, L, T> AlertService<S, D, L, T>
where
    S: AlertStore,
    D: ActorDirectory,
    L: NotificationLog,
    T: PushTransport,
{
    pub fn new(
        store: Arc<S>,
        directory: Arc<D>,
        log: Arc<L>,
        transport: Arc<T>,
        config: EngineConfig,
    ) -> Self {
        Self {
            dispatcher: Dispatcher::new(log.clone(), transport),
            store,
            directory,
            log,
            config,
        }
    }

    // ==================== Lifecycle operations ====================

    /// Creates an alert and runs the initial donor/facility fan-out.
    ///
    /// Only doctors may create alerts. Validation failures abort before
    /// anything is persisted; dispatch failures are recorded and surfaced
    /// only through the returned summary.
    pub async fn create_alert(
        &self,
        requester_id: &str,
        request: CreateAlertRequest,
    ) -> Result<AlertOutcome, EngineError> {
        let requester = self.require_actor(requester_id).await?;
        if requester.role != ActorRole::Doctor {
            return Err(EngineError::forbidden("only doctors may create alerts"));
        }

        let facility = match &request.facility {
            Some(id) => Some(self.require_facility(id).await?),
            None => None,
        };

        let draft = AlertDraft {
            requester: requester.id.clone(),
            facility: facility.as_ref().map(|f| f.id.clone()),
            blood_type: request.blood_type,
            urgency: request.urgency.unwrap_or_default(),
            quantity: request.quantity,
            description: request.description,
            origin: request.origin,
            radius_km: request
                .radius_km
                .unwrap_or(self.config.alert.default_radius_km),
        };
        let alert = draft.build(OffsetDateTime::now_utc(), self.config.ttl())?;
        self.store.insert(&alert).await?;
        info!(
            alert_id = %alert.id,
            blood_type = %alert.blood_type,
            urgency = %alert.urgency,
            radius_km = alert.radius_km,
            "Alert created"
        );

        let hospital = self.hospital_for(&alert).await;
        let mut summary = self
            .fan_out_to_donors(&alert, alert.radius_km, &hospital)
            .await;

        if let Some(facility) = &facility {
            summary.merge(
                self.notify_operator(facility, &alert, &hospital, EventKind::NewAlert)
                    .await,
            );
        }

        Ok(AlertOutcome {
            alert,
            notifications: summary,
        })
    }

    /// Records or updates a donor's response to an active alert.
    ///
    /// Idempotent per donor: a repeat call updates the existing response in
    /// place, so stats never double-count. An accepted response notifies
    /// the alert's requester.
    pub async fn record_response(
        &self,
        alert_id: &str,
        donor_id: &str,
        status: ResponseStatus,
        message: Option<String>,
    ) -> Result<Alert, EngineError> {
        let donor = self.require_actor(donor_id).await?;
        if donor.role != ActorRole::Donor {
            return Err(EngineError::forbidden("only donors may respond to alerts"));
        }

        let donor_blood_type = donor.blood_type;
        let saved = self
            .mutate_active(alert_id, |alert| {
                if donor_blood_type != Some(alert.blood_type) {
                    return Err(EngineError::incompatible(format!(
                        "donor blood type does not match required {}",
                        alert.blood_type
                    )));
                }
                alert.upsert_response(
                    &donor.id,
                    status,
                    message.clone(),
                    OffsetDateTime::now_utc(),
                );
                Ok(())
            })
            .await?;
        info!(alert_id, donor_id, status = ?status, "Response recorded");

        if status == ResponseStatus::Accepted {
            let hospital = self.hospital_for(&saved).await;
            match self.directory.actor(&saved.requester).await {
                Ok(Some(requester)) => {
                    let ctx = MessageContext::for_alert(&saved, &hospital)
                        .with_donor(donor.name.clone());
                    self.dispatcher
                        .notify_one(&requester, &ctx, EventKind::DonorAccepted)
                        .await;
                }
                Ok(None) => warn!(alert_id, "Alert requester account missing"),
                Err(e) => warn!(alert_id, error = %e, "Requester lookup failed"),
            }
        }

        Ok(saved)
    }

    /// Cancels an active alert.
    ///
    /// Allowed for the requesting doctor and the origin facility's
    /// operator. Donors with a pending or accepted response are notified;
    /// unread notification records for the alert are marked superseded.
    pub async fn cancel_alert(
        &self,
        alert_id: &str,
        actor_id: &str,
    ) -> Result<AlertOutcome, EngineError> {
        let actor = self.require_actor(actor_id).await?;
        let current = self.load_live(alert_id).await?;
        self.authorize_lifecycle(&actor, &current, "cancel").await?;

        let saved = self
            .mutate_active(alert_id, |alert| {
                alert
                    .transition(AlertStatus::Cancelled)
                    .map_err(EngineError::from)
            })
            .await?;
        info!(alert_id, actor = %actor.id, "Alert cancelled");

        // Supersede before dispatching, so the cancellation notices written
        // below are not themselves flagged.
        match self.log.mark_superseded_for_alert(&saved.id).await {
            Ok(count) if count > 0 => {
                info!(alert_id, count, "Marked unread notifications superseded");
            }
            Ok(_) => {}
            Err(e) => warn!(alert_id, error = %e, "Failed to supersede notifications"),
        }

        let recipients = self.donor_actors(&saved.engaged_donors()).await;
        let hospital = self.hospital_for(&saved).await;
        let ctx = MessageContext::for_alert(&saved, &hospital);
        let summary = self
            .dispatcher
            .dispatch(&recipients, &ctx, EventKind::AlertCancelled)
            .await;

        Ok(AlertOutcome {
            alert: saved,
            notifications: summary,
        })
    }

    /// Confirms blood reception and closes the alert.
    ///
    /// Validated by the origin facility's operator; an alert with no bound
    /// facility may be closed by its requester. Received units restock the
    /// facility, accepted donors and the requester are notified.
    pub async fn fulfill_alert(
        &self,
        alert_id: &str,
        actor_id: &str,
    ) -> Result<AlertOutcome, EngineError> {
        let actor = self.require_actor(actor_id).await?;
        let current = self.load_live(alert_id).await?;
        match &current.facility {
            Some(facility_id) => {
                let facility = self.require_facility(facility_id).await?;
                if facility.operator != actor.id {
                    return Err(EngineError::forbidden(
                        "only the origin facility may confirm reception",
                    ));
                }
            }
            None => {
                if actor.id != current.requester {
                    return Err(EngineError::forbidden(
                        "only the requester may fulfill an unbound alert",
                    ));
                }
            }
        }

        let saved = self
            .mutate_active(alert_id, |alert| {
                alert
                    .transition(AlertStatus::Fulfilled)
                    .map_err(EngineError::from)
            })
            .await?;
        info!(alert_id, "Alert fulfilled");

        if let Some(facility_id) = &saved.facility {
            let units = saved.quantity.unwrap_or(1);
            if let Err(e) = self
                .directory
                .restock(facility_id, saved.blood_type, units)
                .await
            {
                warn!(alert_id, facility = %facility_id, error = %e, "Inventory restock failed");
            }
        }

        let hospital = self.hospital_for(&saved).await;
        let ctx = MessageContext::for_alert(&saved, &hospital);
        let donors = self.donor_actors(&saved.accepted_donors()).await;
        let mut summary = self
            .dispatcher
            .dispatch(&donors, &ctx, EventKind::DonationConfirmed)
            .await;
        match self.directory.actor(&saved.requester).await {
            Ok(Some(requester)) => summary.merge(
                self.dispatcher
                    .notify_one(&requester, &ctx, EventKind::DonationConfirmed)
                    .await,
            ),
            Ok(None) => warn!(alert_id, "Alert requester account missing"),
            Err(e) => warn!(alert_id, error = %e, "Requester lookup failed"),
        }

        Ok(AlertOutcome {
            alert: saved,
            notifications: summary,
        })
    }

    /// Fans the alert out to compatible donors around its origin.
    ///
    /// Explicitly triggered by the origin facility (or the requester);
    /// `radius_km` overrides the alert's stored radius for this round only.
    pub async fn notify_donors(
        &self,
        alert_id: &str,
        actor_id: &str,
        radius_km: Option<f64>,
    ) -> Result<DispatchSummary, EngineError> {
        let actor = self.require_actor(actor_id).await?;
        let alert = self.load_live(alert_id).await?;
        self.authorize_lifecycle(&actor, &alert, "notify donors for")
            .await?;
        if !alert.is_active() {
            return Err(EngineError::invalid_state(format!(
                "alert {alert_id} is {}",
                alert.status
            )));
        }

        let radius = radius_km.unwrap_or(alert.radius_km);
        if !radius.is_finite() || !(MIN_RADIUS_KM..=MAX_RADIUS_KM).contains(&radius) {
            return Err(CoreError::RadiusOutOfBounds(radius).into());
        }

        let hospital = self.hospital_for(&alert).await;
        Ok(self.fan_out_to_donors(&alert, radius, &hospital).await)
    }

    /// Offers the alert to the nearest facilities when the origin cannot
    /// cover it.
    ///
    /// Best-effort: an empty selection is a normal outcome. Re-entrant: a
    /// facility already in the alert's propagation record is never offered
    /// or notified again.
    pub async fn propagate_alert(
        &self,
        alert_id: &str,
        actor_id: &str,
    ) -> Result<PropagationOutcome, EngineError> {
        let origin = self
            .directory
            .facility_for_operator(actor_id)
            .await?
            .ok_or_else(|| {
                EngineError::forbidden("only facility operators may propagate alerts")
            })?;
        let alert = self.load_live(alert_id).await?;
        if alert.facility.as_deref() != Some(origin.id.as_str()) {
            return Err(EngineError::forbidden(
                "alert is not assigned to your facility",
            ));
        }
        if !alert.is_active() {
            return Err(EngineError::invalid_state(format!(
                "alert {alert_id} is {}",
                alert.status
            )));
        }

        let needed = alert.quantity.unwrap_or(1);
        if origin.inventory.has_stock(alert.blood_type, needed) {
            return Err(EngineError::invalid_state(format!(
                "facility {} has {} unit(s) of {} in stock, no propagation needed",
                origin.id, needed, alert.blood_type
            )));
        }

        let candidates = self.directory.active_facilities().await?;
        let targets = propagation::select_targets(
            &origin,
            &alert,
            candidates,
            self.config.propagation.fanout,
        );
        if targets.is_empty() {
            info!(alert_id, "No eligible facilities for propagation");
            return Ok(PropagationOutcome {
                alert,
                facilities: Vec::new(),
                notifications: DispatchSummary::default(),
            });
        }

        let target_ids: Vec<String> = targets.iter().map(|f| f.id.clone()).collect();
        let mut newly_recorded = Vec::new();
        let saved = self
            .mutate_active(alert_id, |alert| {
                newly_recorded.clear();
                for id in &target_ids {
                    if alert.record_propagation(id) {
                        newly_recorded.push(id.clone());
                    }
                }
                Ok(())
            })
            .await?;

        // A concurrent round may have recorded some targets first; only the
        // ones this round added get notified.
        let facilities: Vec<Facility> = targets
            .into_iter()
            .filter(|f| newly_recorded.contains(&f.id))
            .collect();
        info!(alert_id, count = facilities.len(), "Alert propagated");

        let mut operators = Vec::new();
        for facility in &facilities {
            match self.directory.actor(&facility.operator).await {
                Ok(Some(operator)) => operators.push(operator),
                Ok(None) => warn!(facility = %facility.id, "Facility operator account missing"),
                Err(e) => warn!(facility = %facility.id, error = %e, "Operator lookup failed"),
            }
        }
        let ctx = MessageContext::for_alert(&saved, &origin.name);
        let summary = self
            .dispatcher
            .dispatch(&operators, &ctx, EventKind::NewAlert)
            .await;

        Ok(PropagationOutcome {
            alert: saved,
            facilities,
            notifications: summary,
        })
    }

    // ==================== Queries ====================

    /// Reads an alert, settling lazy expiry first: an alert past its expiry
    /// is never returned as `active`.
    pub async fn get_alert(&self, alert_id: &str) -> Result<Alert, EngineError> {
        self.load_live(alert_id).await
    }

    /// Alerts bound to a facility (origin or propagated), newest first.
    pub async fn alerts_for_facility(
        &self,
        facility_id: &str,
    ) -> Result<Vec<Alert>, EngineError> {
        let now = OffsetDateTime::now_utc();
        let mut alerts = self.store.alerts_for_facility(facility_id).await?;
        // Read-time view of lapsed alerts; the sweep persists the transition.
        for alert in &mut alerts {
            if alert.is_active() && alert.is_expired_at(now) {
                alert.status = AlertStatus::Expired;
            }
        }
        Ok(alerts)
    }

    /// A recipient's notification history, newest first.
    pub async fn notification_history(
        &self,
        recipient_id: &str,
        limit: usize,
    ) -> Result<Vec<NotificationRecord>, EngineError> {
        Ok(self.log.history(recipient_id, limit).await?)
    }

    /// Marks a notification record read.
    pub async fn mark_notification_read(&self, id: &str) -> Result<(), EngineError> {
        Ok(self.log.mark_read(id).await?)
    }

    /// Transitions every lapsed active alert to `expired`. Returns the
    /// number transitioned. Idempotent; no notification fan-out.
    pub async fn expire_due(&self) -> Result<u64, EngineError> {
        let expired = self.store.expire_due(OffsetDateTime::now_utc()).await?;
        if !expired.is_empty() {
            info!(count = expired.len(), "Expired lapsed alerts");
        }
        Ok(expired.len() as u64)
    }

    // ==================== Internals ====================

    /// Loads an alert, transitioning it to `expired` first when its
    /// lifetime has lapsed.
    async fn load_live(&self, alert_id: &str) -> Result<Alert, EngineError> {
        let now = OffsetDateTime::now_utc();
        for _ in 0..=MAX_UPDATE_RETRIES {
            let Some(mut alert) = self.store.get(alert_id).await? else {
                return Err(EngineError::not_found("alert", alert_id));
            };
            if alert.is_active() && alert.is_expired_at(now) {
                let expected = alert.version;
                alert.transition(AlertStatus::Expired)?;
                match self.store.update(&alert, expected).await {
                    Ok(saved) => {
                        info!(alert_id, "Alert lapsed");
                        return Ok(saved);
                    }
                    Err(StorageError::VersionConflict { .. }) => continue,
                    Err(e) => return Err(e.into()),
                }
            }
            return Ok(alert);
        }
        Err(StorageError::internal(format!("could not settle expiry for alert {alert_id}")).into())
    }

    /// Applies `apply` to the alert under optimistic concurrency: fetch,
    /// mutate, compare-and-swap on the version, retry on conflict. This
    /// serializes all mutations of one alert's embedded state, so two
    /// concurrent responses from different donors both land and a
    /// double-submit from one donor resolves last-write-wins.
    async fn mutate_active<F>(&self, alert_id: &str, mut apply: F) -> Result<Alert, EngineError>
    where
        F: FnMut(&mut Alert) -> Result<(), EngineError>,
    {
        let mut conflicts = 0;
        loop {
            let mut alert = self.load_live(alert_id).await?;
            if !alert.is_active() {
                return Err(EngineError::invalid_state(format!(
                    "alert {alert_id} is {}",
                    alert.status
                )));
            }
            let expected = alert.version;
            apply(&mut alert)?;
            match self.store.update(&alert, expected).await {
                Ok(saved) => return Ok(saved),
                Err(StorageError::VersionConflict { .. }) if conflicts < MAX_UPDATE_RETRIES => {
                    conflicts += 1;
                    warn!(alert_id, conflicts, "Version conflict on alert update, retrying");
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    async fn require_actor(&self, id: &str) -> Result<Actor, EngineError> {
        self.directory
            .actor(id)
            .await?
            .ok_or_else(|| EngineError::not_found("actor", id))
    }

    async fn require_facility(&self, id: &str) -> Result<Facility, EngineError> {
        self.directory
            .facility(id)
            .await?
            .ok_or_else(|| EngineError::not_found("facility", id))
    }

    /// Requester and origin-facility operator may drive an alert's
    /// lifecycle; everyone else is rejected.
    async fn authorize_lifecycle(
        &self,
        actor: &Actor,
        alert: &Alert,
        action: &str,
    ) -> Result<(), EngineError> {
        if actor.id == alert.requester {
            return Ok(());
        }
        if let Some(facility_id) = &alert.facility
            && let Some(facility) = self.directory.facility(facility_id).await?
            && facility.operator == actor.id
        {
            return Ok(());
        }
        Err(EngineError::forbidden(format!(
            "not allowed to {action} this alert"
        )))
    }

    /// Compatible donors in range of the alert origin, dispatched NEW_ALERT.
    /// Candidate-query failures are recovered into an empty summary; they
    /// never fail the calling transition.
    async fn fan_out_to_donors(
        &self,
        alert: &Alert,
        radius_km: f64,
        hospital: &str,
    ) -> DispatchSummary {
        let donors = match self.directory.donors_by_blood_type(alert.blood_type).await {
            Ok(donors) => donors,
            Err(e) => {
                warn!(alert_id = %alert.id, error = %e, "Donor candidate query failed");
                return DispatchSummary::default();
            }
        };
        let compatible = matching::compatible_donors(donors, alert.blood_type);
        let in_range = matching::within_radius(&alert.origin, radius_km, compatible);
        info!(
            alert_id = %alert.id,
            blood_type = %alert.blood_type,
            candidates = in_range.len(),
            "Matched donors for alert"
        );
        let ctx = MessageContext::for_alert(alert, hospital);
        self.dispatcher
            .dispatch(&in_range, &ctx, EventKind::NewAlert)
            .await
    }

    async fn notify_operator(
        &self,
        facility: &Facility,
        alert: &Alert,
        hospital: &str,
        event: EventKind,
    ) -> DispatchSummary {
        match self.directory.actor(&facility.operator).await {
            Ok(Some(operator)) => {
                let ctx = MessageContext::for_alert(alert, hospital);
                self.dispatcher.notify_one(&operator, &ctx, event).await
            }
            Ok(None) => {
                warn!(facility = %facility.id, "Facility operator account missing");
                DispatchSummary::default()
            }
            Err(e) => {
                warn!(facility = %facility.id, error = %e, "Operator lookup failed");
                DispatchSummary::default()
            }
        }
    }

    /// Resolves donor ids to actor snapshots, dropping accounts the
    /// directory no longer knows.
    async fn donor_actors(&self, ids: &[&str]) -> Vec<Actor> {
        let mut actors = Vec::with_capacity(ids.len());
        for id in ids {
            match self.directory.actor(id).await {
                Ok(Some(actor)) => actors.push(actor),
                Ok(None) => warn!(donor = %id, "Responding donor account missing"),
                Err(e) => warn!(donor = %id, error = %e, "Donor lookup failed"),
            }
        }
        actors
    }

    /// Display name for the hospital an alert is serving.
    async fn hospital_for(&self, alert: &Alert) -> String {
        if let Some(facility_id) = &alert.facility
            && let Ok(Some(facility)) = self.directory.facility(facility_id).await
        {
            return facility.name;
        }
        if let Ok(Some(requester)) = self.directory.actor(&alert.requester).await
            && let Some(hospital) = requester.hospital
        {
            return hospital;
        }
        "the requesting hospital".to_string()
    }
}

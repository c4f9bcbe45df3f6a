//! The Alert aggregate: an urgent blood request with its embedded donor
//! responses, derived statistics, and propagation record.

use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};

use crate::blood::{BloodType, Urgency};
use crate::error::{CoreError, Result};
use crate::geo::GeoPoint;
use crate::id::new_id;

/// Search radius bounds in kilometers.
pub const MIN_RADIUS_KM: f64 = 1.0;
pub const MAX_RADIUS_KM: f64 = 50.0;

/// Free-text description cap.
pub const DESCRIPTION_MAX_CHARS: usize = 500;

/// Default alert lifetime.
pub const DEFAULT_TTL_HOURS: i64 = 24;

/// Alert lifecycle status. `Active` is the only non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertStatus {
    Active,
    Fulfilled,
    Cancelled,
    Expired,
}

impl AlertStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Active)
    }
}

impl std::fmt::Display for AlertStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Active => write!(f, "active"),
            Self::Fulfilled => write!(f, "fulfilled"),
            Self::Cancelled => write!(f, "cancelled"),
            Self::Expired => write!(f, "expired"),
        }
    }
}

/// A donor's decision against one alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStatus {
    Pending,
    Accepted,
    Declined,
}

/// One donor's response, owned by the alert. At most one per donor;
/// a repeat response overwrites in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub donor: String,
    pub status: ResponseStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub responded_at: OffsetDateTime,
}

/// Derived response counts. Always recomputed from the response collection,
/// never incrementally patched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertStats {
    pub total_notified: u32,
    pub total_accepted: u32,
    pub total_declined: u32,
}

impl AlertStats {
    /// Pure function of a response collection.
    pub fn compute(responses: &[Response]) -> Self {
        Self {
            total_notified: responses.len() as u32,
            total_accepted: responses
                .iter()
                .filter(|r| r.status == ResponseStatus::Accepted)
                .count() as u32,
            total_declined: responses
                .iter()
                .filter(|r| r.status == ResponseStatus::Declined)
                .count() as u32,
        }
    }
}

/// Validated input for creating an alert.
#[derive(Debug, Clone)]
pub struct AlertDraft {
    pub requester: String,
    pub facility: Option<String>,
    pub blood_type: BloodType,
    pub urgency: Urgency,
    pub quantity: Option<u32>,
    pub description: Option<String>,
    pub origin: GeoPoint,
    pub radius_km: f64,
}

impl AlertDraft {
    /// Validates the draft and builds an `active` alert expiring at
    /// `now + ttl`.
    pub fn build(self, now: OffsetDateTime, ttl: Duration) -> Result<Alert> {
        if !self.radius_km.is_finite()
            || !(MIN_RADIUS_KM..=MAX_RADIUS_KM).contains(&self.radius_km)
        {
            return Err(CoreError::RadiusOutOfBounds(self.radius_km));
        }
        if let Some(desc) = &self.description
            && desc.chars().count() > DESCRIPTION_MAX_CHARS
        {
            return Err(CoreError::DescriptionTooLong {
                max: DESCRIPTION_MAX_CHARS,
                actual: desc.chars().count(),
            });
        }
        if self.quantity == Some(0) {
            return Err(CoreError::InvalidQuantity);
        }

        Ok(Alert {
            id: new_id(),
            requester: self.requester,
            facility: self.facility,
            blood_type: self.blood_type,
            urgency: self.urgency,
            quantity: self.quantity,
            description: self.description,
            origin: self.origin,
            radius_km: self.radius_km,
            status: AlertStatus::Active,
            responses: Vec::new(),
            stats: AlertStats::default(),
            propagated_to: Vec::new(),
            created_at: now,
            expires_at: now + ttl,
            version: 0,
        })
    }
}

/// An urgent blood request with a bounded lifetime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub id: String,

    /// Doctor who raised the request.
    pub requester: String,

    /// Origin blood bank, when the request is bound to one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub facility: Option<String>,

    pub blood_type: BloodType,
    pub urgency: Urgency,

    /// Requested units.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quantity: Option<u32>,

    /// Free-text patient/context info, capped at 500 characters.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    pub origin: GeoPoint,
    pub radius_km: f64,

    pub status: AlertStatus,

    /// Responses in arrival order, at most one per donor.
    #[serde(default)]
    pub responses: Vec<Response>,

    #[serde(default)]
    pub stats: AlertStats,

    /// Facilities already offered this alert, in offer order. Guards against
    /// propagation cycles and re-notification.
    #[serde(default)]
    pub propagated_to: Vec<String>,

    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,

    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,

    /// Optimistic concurrency version, incremented by the store on every
    /// successful update.
    #[serde(default)]
    pub version: u64,
}

impl Alert {
    pub fn is_active(&self) -> bool {
        self.status == AlertStatus::Active
    }

    /// Whether the alert's lifetime has lapsed at `now`.
    pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
        now >= self.expires_at
    }

    /// Records or overwrites the donor's response, then recomputes stats.
    ///
    /// Find-or-append keyed by donor id: a second response from the same
    /// donor updates the existing entry in place (last-write-wins), so the
    /// collection never holds two entries for one donor.
    pub fn upsert_response(
        &mut self,
        donor: &str,
        status: ResponseStatus,
        message: Option<String>,
        now: OffsetDateTime,
    ) {
        match self.responses.iter_mut().find(|r| r.donor == donor) {
            Some(existing) => {
                existing.status = status;
                existing.message = message;
                existing.responded_at = now;
            }
            None => self.responses.push(Response {
                donor: donor.to_string(),
                status,
                message,
                responded_at: now,
            }),
        }
        self.stats = AlertStats::compute(&self.responses);
    }

    /// The donor's current response, if any.
    pub fn response_of(&self, donor: &str) -> Option<&Response> {
        self.responses.iter().find(|r| r.donor == donor)
    }

    /// Donor ids with an accepted response.
    pub fn accepted_donors(&self) -> Vec<&str> {
        self.responses
            .iter()
            .filter(|r| r.status == ResponseStatus::Accepted)
            .map(|r| r.donor.as_str())
            .collect()
    }

    /// Donor ids that have not declined (pending or accepted).
    pub fn engaged_donors(&self) -> Vec<&str> {
        self.responses
            .iter()
            .filter(|r| r.status != ResponseStatus::Declined)
            .map(|r| r.donor.as_str())
            .collect()
    }

    /// Adds a facility to the propagation record. Returns false without
    /// mutating when the facility was already offered this alert.
    pub fn record_propagation(&mut self, facility: &str) -> bool {
        if self.was_propagated_to(facility) {
            return false;
        }
        self.propagated_to.push(facility.to_string());
        true
    }

    pub fn was_propagated_to(&self, facility: &str) -> bool {
        self.propagated_to.iter().any(|f| f == facility)
    }

    /// Moves the alert to a terminal state. Only `active` alerts transition;
    /// terminal states are closed.
    pub fn transition(&mut self, to: AlertStatus) -> Result<()> {
        if self.status.is_terminal() || to == AlertStatus::Active {
            return Err(CoreError::invalid_transition(
                self.status.to_string(),
                to.to_string(),
            ));
        }
        self.status = to;
        Ok(())
    }
}

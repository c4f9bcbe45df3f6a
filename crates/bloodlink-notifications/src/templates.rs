//! Fixed per-event message templates.
//!
//! Every `EventKind` maps to exactly one title/body pair; the match below is
//! exhaustive, so adding an event without a template fails to compile.

use serde_json::json;

use bloodlink_core::{Alert, BloodType, Urgency};

use crate::types::EventKind;

/// Rendered notification content plus the structured payload sent with it.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedMessage {
    pub title: String,
    pub body: String,
    pub data: serde_json::Value,
}

/// Everything the template table needs about the triggering alert.
#[derive(Debug, Clone)]
pub struct MessageContext {
    pub alert_id: String,
    pub blood_type: BloodType,
    pub urgency: Urgency,
    /// Display name of the hospital/facility the request is for.
    pub hospital: String,
    /// Responding donor's name, for DONOR_ACCEPTED.
    pub donor_name: Option<String>,
}

impl MessageContext {
    pub fn for_alert(alert: &Alert, hospital: impl Into<String>) -> Self {
        Self {
            alert_id: alert.id.clone(),
            blood_type: alert.blood_type,
            urgency: alert.urgency,
            hospital: hospital.into(),
            donor_name: None,
        }
    }

    pub fn with_donor(mut self, name: impl Into<String>) -> Self {
        self.donor_name = Some(name.into());
        self
    }
}

/// Renders the fixed template for `event`.
pub fn render(event: EventKind, ctx: &MessageContext) -> RenderedMessage {
    let (title, body) = match event {
        EventKind::NewAlert => (
            "Urgent need for blood".to_string(),
            format!(
                "{} needed at {} ({})",
                ctx.blood_type,
                ctx.hospital,
                ctx.urgency.label()
            ),
        ),
        EventKind::AlertCancelled => (
            "Alert cancelled".to_string(),
            format!(
                "The {} emergency at {} has been resolved",
                ctx.blood_type, ctx.hospital
            ),
        ),
        EventKind::DonorAccepted => (
            "Donor available".to_string(),
            format!(
                "{} accepted your {} alert",
                ctx.donor_name.as_deref().unwrap_or("A donor"),
                ctx.blood_type
            ),
        ),
        EventKind::DonationConfirmed => (
            "Donation received".to_string(),
            format!(
                "{} blood for {} received successfully",
                ctx.blood_type, ctx.hospital
            ),
        ),
    };

    RenderedMessage {
        title,
        body,
        data: json!({
            "alertId": ctx.alert_id,
            "type": event,
            "bloodType": ctx.blood_type,
            "hospital": ctx.hospital,
        }),
    }
}

//! Snapshots of external actors (users and blood banks).
//!
//! These entities are owned by the excluded account/auth collaborators; the
//! engine only reads the fields it needs for matching, role checks, and
//! notification routing.

use serde::{Deserialize, Serialize};

use crate::blood::{BloodInventory, BloodType};
use crate::geo::{GeoPoint, Positioned};

/// Role of an authenticated actor, as supplied by the auth collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActorRole {
    Doctor,
    Donor,
    Facility,
}

/// Snapshot of a user account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Actor {
    pub id: String,
    pub role: ActorRole,
    pub name: String,

    /// Last known location; absent for accounts that never shared one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<GeoPoint>,

    /// Blood type, present for donors.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blood_type: Option<BloodType>,

    /// Hospital name, present for doctors.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hospital: Option<String>,

    pub active: bool,

    /// Push channel token; absent means the account cannot be notified.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub push_token: Option<String>,
}

impl Actor {
    /// Whether the actor can receive push notifications.
    pub fn reachable(&self) -> bool {
        self.push_token.as_deref().is_some_and(|t| !t.is_empty())
    }
}

impl Positioned for Actor {
    fn position(&self) -> Option<GeoPoint> {
        self.location
    }
}

/// Snapshot of a blood bank.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Facility {
    pub id: String,

    /// Actor id of the account operating this facility.
    pub operator: String,

    pub name: String,
    pub location: GeoPoint,
    pub address: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,

    #[serde(default)]
    pub inventory: BloodInventory,

    pub active: bool,
}

impl Positioned for Facility {
    fn position(&self) -> Option<GeoPoint> {
        Some(self.location)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn donor(token: Option<&str>) -> Actor {
        Actor {
            id: "d1".into(),
            role: ActorRole::Donor,
            name: "Test Donor".into(),
            location: None,
            blood_type: Some(BloodType::OPos),
            hospital: None,
            active: true,
            push_token: token.map(String::from),
        }
    }

    #[test]
    fn test_reachable_requires_nonempty_token() {
        assert!(donor(Some("fcm-token")).reachable());
        assert!(!donor(Some("")).reachable());
        assert!(!donor(None).reachable());
    }

    #[test]
    fn test_actor_without_location_has_no_position() {
        assert!(donor(None).position().is_none());
    }

    #[test]
    fn test_role_serde_lowercase() {
        assert_eq!(
            serde_json::to_string(&ActorRole::Doctor).unwrap(),
            "\"doctor\""
        );
        let role: ActorRole = serde_json::from_str("\"facility\"").unwrap();
        assert_eq!(role, ActorRole::Facility);
    }
}

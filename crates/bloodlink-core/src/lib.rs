pub mod actor;
pub mod alert;
pub mod blood;
pub mod error;
pub mod geo;
pub mod id;

pub use actor::{Actor, ActorRole, Facility};
pub use alert::{
    Alert, AlertDraft, AlertStats, AlertStatus, Response, ResponseStatus, DEFAULT_TTL_HOURS,
    DESCRIPTION_MAX_CHARS, MAX_RADIUS_KM, MIN_RADIUS_KM,
};
pub use blood::{BloodInventory, BloodType, Urgency};
pub use error::{CoreError, ErrorCategory, Result};
pub use geo::{GeoPoint, Positioned, EARTH_RADIUS_KM};
pub use id::new_id;

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// The 8 ABO/Rh blood group combinations.
///
/// Matching is literal type equality; this engine does not model
/// universal-donor/acceptor cross-type chemistry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BloodType {
    #[serde(rename = "A+")]
    APos,
    #[serde(rename = "A-")]
    ANeg,
    #[serde(rename = "B+")]
    BPos,
    #[serde(rename = "B-")]
    BNeg,
    #[serde(rename = "AB+")]
    AbPos,
    #[serde(rename = "AB-")]
    AbNeg,
    #[serde(rename = "O+")]
    OPos,
    #[serde(rename = "O-")]
    ONeg,
}

impl BloodType {
    /// All valid blood types, in conventional order.
    pub const ALL: [BloodType; 8] = [
        Self::APos,
        Self::ANeg,
        Self::BPos,
        Self::BNeg,
        Self::AbPos,
        Self::AbNeg,
        Self::OPos,
        Self::ONeg,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::APos => "A+",
            Self::ANeg => "A-",
            Self::BPos => "B+",
            Self::BNeg => "B-",
            Self::AbPos => "AB+",
            Self::AbNeg => "AB-",
            Self::OPos => "O+",
            Self::ONeg => "O-",
        }
    }
}

impl fmt::Display for BloodType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for BloodType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "A+" => Ok(Self::APos),
            "A-" => Ok(Self::ANeg),
            "B+" => Ok(Self::BPos),
            "B-" => Ok(Self::BNeg),
            "AB+" => Ok(Self::AbPos),
            "AB-" => Ok(Self::AbNeg),
            "O+" => Ok(Self::OPos),
            "O-" => Ok(Self::ONeg),
            other => Err(CoreError::invalid_blood_type(other)),
        }
    }
}

/// Alert urgency, ordered from least to most urgent.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl Urgency {
    /// Human-readable label used in notification bodies.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Low => "low urgency",
            Self::Medium => "medium urgency",
            Self::High => "high urgency",
            Self::Critical => "CRITICAL URGENCY",
        }
    }
}

impl fmt::Display for Urgency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
            Self::Critical => write!(f, "critical"),
        }
    }
}

impl FromStr for Urgency {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            "critical" => Ok(Self::Critical),
            other => Err(CoreError::invalid_urgency(other)),
        }
    }
}

/// Units on hand per blood type at a facility.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BloodInventory(HashMap<BloodType, u32>);

impl BloodInventory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Units currently stocked for the given type (0 when untracked).
    pub fn units_of(&self, blood_type: BloodType) -> u32 {
        self.0.get(&blood_type).copied().unwrap_or(0)
    }

    /// Whether at least `quantity` units of `blood_type` are on hand.
    pub fn has_stock(&self, blood_type: BloodType, quantity: u32) -> bool {
        self.units_of(blood_type) >= quantity
    }

    pub fn add_units(&mut self, blood_type: BloodType, quantity: u32) {
        *self.0.entry(blood_type).or_insert(0) += quantity;
    }

    pub fn set_units(&mut self, blood_type: BloodType, quantity: u32) {
        self.0.insert(blood_type, quantity);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blood_type_round_trip() {
        for bt in BloodType::ALL {
            let parsed: BloodType = bt.as_str().parse().unwrap();
            assert_eq!(parsed, bt);
        }
    }

    #[test]
    fn test_blood_type_invalid() {
        let err = "C+".parse::<BloodType>().unwrap_err();
        assert!(matches!(err, CoreError::InvalidBloodType(_)));
        assert!("o+".parse::<BloodType>().is_err());
        assert!("".parse::<BloodType>().is_err());
    }

    #[test]
    fn test_blood_type_serde_wire_names() {
        let json = serde_json::to_string(&BloodType::AbNeg).unwrap();
        assert_eq!(json, "\"AB-\"");
        let back: BloodType = serde_json::from_str("\"O+\"").unwrap();
        assert_eq!(back, BloodType::OPos);
    }

    #[test]
    fn test_urgency_ordering() {
        assert!(Urgency::Low < Urgency::Medium);
        assert!(Urgency::Medium < Urgency::High);
        assert!(Urgency::High < Urgency::Critical);
    }

    #[test]
    fn test_urgency_default_is_medium() {
        assert_eq!(Urgency::default(), Urgency::Medium);
    }

    #[test]
    fn test_urgency_serde_lowercase() {
        assert_eq!(
            serde_json::to_string(&Urgency::Critical).unwrap(),
            "\"critical\""
        );
        let back: Urgency = serde_json::from_str("\"high\"").unwrap();
        assert_eq!(back, Urgency::High);
    }

    #[test]
    fn test_urgency_parse_invalid() {
        assert!(matches!(
            "urgent".parse::<Urgency>(),
            Err(CoreError::InvalidUrgency(_))
        ));
    }

    #[test]
    fn test_inventory_stock() {
        let mut inv = BloodInventory::new();
        assert!(!inv.has_stock(BloodType::OPos, 1));
        assert_eq!(inv.units_of(BloodType::OPos), 0);

        inv.add_units(BloodType::OPos, 3);
        assert!(inv.has_stock(BloodType::OPos, 3));
        assert!(!inv.has_stock(BloodType::OPos, 4));
        assert!(!inv.has_stock(BloodType::ONeg, 1));

        inv.add_units(BloodType::OPos, 2);
        assert_eq!(inv.units_of(BloodType::OPos), 5);
    }
}

//! Hazard records as produced by the reporting flow

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Hazard store identity
pub type HazardId = u64;

/// Closed set of hazard kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HazardType {
    #[serde(rename = "BLACKSPOT")]
    BlackSpot,
    #[serde(rename = "BAD_ROAD")]
    BadRoad,
    #[serde(rename = "ACCIDENT")]
    Accident,
    #[serde(rename = "PEDESTRIANS")]
    Pedestrians,
}

impl HazardType {
    pub const ALL: [HazardType; 4] = [
        HazardType::BlackSpot,
        HazardType::BadRoad,
        HazardType::Accident,
        HazardType::Pedestrians,
    ];

    /// Wire tag, as stored
    pub fn as_str(&self) -> &'static str {
        match self {
            HazardType::BlackSpot => "BLACKSPOT",
            HazardType::BadRoad => "BAD_ROAD",
            HazardType::Accident => "ACCIDENT",
            HazardType::Pedestrians => "PEDESTRIANS",
        }
    }

    /// Name shown to drivers
    pub fn display_name(&self) -> &'static str {
        match self {
            HazardType::BlackSpot => "Black Spot",
            HazardType::BadRoad => "Bad Road",
            HazardType::Accident => "Accident",
            HazardType::Pedestrians => "Pedestrians",
        }
    }
}

impl fmt::Display for HazardType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

impl FromStr for HazardType {
    type Err = anyhow::Error;

    /// Accepts the wire tag or the display name, case-insensitive
    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_uppercase().replace([' ', '-'], "_");
        match normalized.as_str() {
            "BLACKSPOT" | "BLACK_SPOT" => Ok(HazardType::BlackSpot),
            "BAD_ROAD" | "BADROAD" => Ok(HazardType::BadRoad),
            "ACCIDENT" => Ok(HazardType::Accident),
            "PEDESTRIANS" => Ok(HazardType::Pedestrians),
            _ => Err(anyhow!("unknown hazard type: {}", s)),
        }
    }
}

/// Severity on a 1..=5 scale
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Severity(u8);

impl Severity {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 5;

    pub fn new(value: u8) -> Result<Self> {
        if (Self::MIN..=Self::MAX).contains(&value) {
            Ok(Self(value))
        } else {
            Err(anyhow!(
                "severity {} out of range {}..={}",
                value,
                Self::MIN,
                Self::MAX
            ))
        }
    }

    pub fn value(&self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for Severity {
    type Error = anyhow::Error;

    fn try_from(value: u8) -> Result<Self> {
        Self::new(value)
    }
}

impl From<Severity> for u8 {
    fn from(severity: Severity) -> u8 {
        severity.0
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A reported road hazard. Read-only to the alert pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hazard {
    pub id: HazardId,
    #[serde(rename = "type")]
    pub hazard_type: HazardType,
    pub severity: Severity,
    pub latitude: f64,
    pub longitude: f64,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl Hazard {
    pub fn new(
        id: HazardId,
        hazard_type: HazardType,
        severity: Severity,
        latitude: f64,
        longitude: f64,
    ) -> Self {
        Self {
            id,
            hazard_type,
            severity,
            latitude,
            longitude,
            created_at: Utc::now(),
            expires_at: None,
        }
    }

    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    pub fn with_expires_at(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    /// Distance in meters from this hazard to a coordinate
    pub fn distance_to(&self, latitude: f64, longitude: f64) -> f64 {
        crate::geo::haversine_distance(self.latitude, self.longitude, latitude, longitude)
    }
}

impl fmt::Display for Hazard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} - ({}, {})",
            self.hazard_type.display_name(),
            self.latitude,
            self.longitude
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_range() {
        assert!(Severity::new(0).is_err());
        assert!(Severity::new(6).is_err());
        for v in 1..=5 {
            assert_eq!(Severity::new(v).unwrap().value(), v);
        }
    }

    #[test]
    fn test_hazard_type_from_str() {
        assert_eq!("ACCIDENT".parse::<HazardType>().unwrap(), HazardType::Accident);
        assert_eq!("bad road".parse::<HazardType>().unwrap(), HazardType::BadRoad);
        assert_eq!("Black Spot".parse::<HazardType>().unwrap(), HazardType::BlackSpot);
        assert_eq!("black-spot".parse::<HazardType>().unwrap(), HazardType::BlackSpot);
        assert!("pothole".parse::<HazardType>().is_err());
    }

    #[test]
    fn test_hazard_json_shape() {
        let hazard = Hazard::new(7, HazardType::BadRoad, Severity::new(3).unwrap(), -1.2921, 36.8219);
        let json = serde_json::to_value(&hazard).unwrap();
        assert_eq!(json["type"], "BAD_ROAD");
        assert_eq!(json["severity"], 3);
        assert!(json.get("expires_at").is_none());
    }

    #[test]
    fn test_hazard_rejects_bad_severity_on_load() {
        let raw = r#"{"id":1,"type":"ACCIDENT","severity":9,"latitude":0.0,"longitude":0.0,"created_at":"2026-01-01T00:00:00Z"}"#;
        assert!(serde_json::from_str::<Hazard>(raw).is_err());
    }

    #[test]
    fn test_display() {
        let hazard = Hazard::new(1, HazardType::Accident, Severity::new(5).unwrap(), 1.5, 2.5);
        assert_eq!(hazard.to_string(), "Accident - (1.5, 2.5)");
    }
}

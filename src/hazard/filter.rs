//! Severity threshold for alert-worthy hazards

use super::locator::NearbyHazard;
use super::model::Severity;

/// Hazards below this severity never produce a notification
pub const DEFAULT_SEVERITY_THRESHOLD: u8 = 2;

/// Keep hazards whose severity is at least `threshold`, preserving order
pub fn filter_by_severity(hazards: Vec<NearbyHazard>, threshold: u8) -> Vec<NearbyHazard> {
    hazards
        .into_iter()
        .filter(|n| meets_threshold(n.hazard.severity, threshold))
        .collect()
}

pub fn meets_threshold(severity: Severity, threshold: u8) -> bool {
    severity.value() >= threshold
}

//! Output formatting for CLI commands

use serde::Serialize;

use crate::engine::AlertReport;
use crate::geo::format_distance;

/// Format output as JSON or plain text based on --json flag
pub fn format_output<T: Serialize>(data: &T, json: bool, text: impl FnOnce(&T) -> String) -> String {
    if json {
        serde_json::to_string_pretty(data).unwrap_or_else(|_| "{}".to_string())
    } else {
        text(data)
    }
}

/// Human-readable pipeline report
pub fn format_report(report: &AlertReport) -> String {
    let mut lines = vec![format!(
        "{}: found {}, {} after dedup, {} notified ({} succeeded)",
        report.phone_number,
        report.found_count,
        report.deduped_count,
        report.notified_count,
        report.success_count()
    )];

    for (hazard, outcome) in report.hazards.iter().zip(&report.outcomes) {
        lines.push(format!(
            "  [{}] #{} {} (severity {}, {}) via {}: {}",
            if outcome.success { "OK" } else { "FAIL" },
            outcome.hazard_id,
            outcome.hazard_type.display_name(),
            outcome.severity,
            format_distance(hazard.distance_m),
            outcome.channel,
            outcome.message
        ));
    }
    lines.join("\n")
}

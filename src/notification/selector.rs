//! Severity to channel mapping
//!
//! - 4-5: VOICE (urgent, a call gets attention while driving)
//! - 2-3: SMS
//!
//! Severity 1 is dropped by the severity filter before this point.

use super::channel::Channel;
use crate::hazard::Severity;

/// Lowest severity that warrants a voice call
pub const VOICE_SEVERITY: u8 = 4;

pub fn select_channel(severity: Severity) -> Channel {
    if severity.value() >= VOICE_SEVERITY {
        Channel::Voice
    } else {
        Channel::Sms
    }
}

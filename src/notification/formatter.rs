//! 提醒文案模板

use crate::hazard::{Hazard, HazardType};

/// 语音播报文案
pub fn voice_message(hazard: &Hazard) -> String {
    voice_prompt(hazard.hazard_type)
}

pub fn voice_prompt(hazard_type: HazardType) -> String {
    format!(
        "Alert. {} ahead. Reduce speed immediately.",
        hazard_type.display_name()
    )
}

/// 语音失败后的兜底短信文案（高严重度）
pub fn voice_fallback_sms(hazard: &Hazard) -> String {
    format!(
        "🚨 {}: Reduce speed immediately.",
        hazard.hazard_type.display_name().to_uppercase()
    )
}

/// 普通短信文案（严重度 2-3）
pub fn sms_message(hazard: &Hazard) -> String {
    format!("⚠️ {}: Ahead. Slow down.", hazard.hazard_type.display_name())
}

/// 语音回调返回的 XML，让电话播报提醒内容
pub fn voice_callback_xml(message: &str) -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?><Response><Say voice=\"en-US-Standard-C\" playBeep=\"false\">{}</Say></Response>",
        escape_xml(message)
    )
}

fn escape_xml(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

//! 通知分发器 - 按渠道发送，语音失败时回退短信
//!
//! - 短信：先经疲劳保护预约，放行后才调用短信渠道
//! - 语音：直接外呼（不经疲劳保护）；失败则走短信路径（经疲劳保护）
//!
//! 传输层与历史写入的异常都在这里转为失败结果，不向上传播。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use super::channel::{Channel, NotificationChannel, SendResult};
use super::fatigue::FatigueGuard;
use super::formatter::{sms_message, voice_fallback_sms, voice_message};
use crate::hazard::{Hazard, HazardId, HazardType, Severity};

/// 疲劳保护拒绝时的结果文本
pub const SUPPRESSED_MESSAGE: &str = "suppressed: recent alert";

/// 单个危险的发送结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchOutcome {
    pub hazard_id: HazardId,
    pub hazard_type: HazardType,
    pub severity: Severity,
    /// 选定的渠道（回退后实际使用的渠道见 message 前缀）
    pub channel: Channel,
    pub success: bool,
    pub message: String,
}

/// 通知分发器
pub struct NotificationDispatcher {
    sms: Arc<dyn NotificationChannel>,
    voice: Arc<dyn NotificationChannel>,
    guard: FatigueGuard,
    /// 是否为 dry-run 模式
    dry_run: bool,
}

impl NotificationDispatcher {
    pub fn new(
        sms: Arc<dyn NotificationChannel>,
        voice: Arc<dyn NotificationChannel>,
        guard: FatigueGuard,
    ) -> Self {
        Self {
            sms,
            voice,
            guard,
            dry_run: false,
        }
    }

    /// 设置 dry-run 模式（不调用任何传输层）
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn guard(&self) -> &FatigueGuard {
        &self.guard
    }

    /// 发送一条危险提醒
    pub fn dispatch(&self, phone: &str, hazard: &Hazard, channel: Channel) -> DispatchOutcome {
        self.dispatch_at(phone, hazard, channel, Utc::now())
    }

    /// 同 `dispatch`，使用指定的当前时间
    pub fn dispatch_at(
        &self,
        phone: &str,
        hazard: &Hazard,
        channel: Channel,
        now: DateTime<Utc>,
    ) -> DispatchOutcome {
        let (success, message) = match channel {
            Channel::Sms => {
                let (ok, response) = self.send_sms_gated(phone, hazard, &sms_message(hazard), now);
                (ok, format!("SMS: {}", response))
            }
            Channel::Voice => self.send_voice_with_fallback(phone, hazard, now),
        };

        DispatchOutcome {
            hazard_id: hazard.id,
            hazard_type: hazard.hazard_type,
            severity: hazard.severity,
            channel,
            success,
            message,
        }
    }

    /// 短信路径：预约成功后发送；发送结果不影响已写入的预约
    ///
    /// dry-run 只读历史判断是否会被抑制，不写入预约
    fn send_sms_gated(
        &self,
        phone: &str,
        hazard: &Hazard,
        message: &str,
        now: DateTime<Utc>,
    ) -> (bool, String) {
        let allowed = if self.dry_run {
            self.guard
                .has_recent_alert(phone, hazard.id, now)
                .map(|recent| !recent)
        } else {
            self.guard.try_reserve_at(phone, hazard.id, Channel::Sms, now)
        };

        match allowed {
            Ok(true) => self.call_channel(self.sms.as_ref(), phone, message).into_parts(),
            Ok(false) => (false, SUPPRESSED_MESSAGE.to_string()),
            Err(e) => {
                warn!(phone = %phone, hazard_id = hazard.id, error = %e, "Failed to record alert reservation");
                (false, format!("history error: {}", e))
            }
        }
    }

    /// 语音路径：外呼失败则回退到短信路径；dry-run 跳过外呼时不回退
    fn send_voice_with_fallback(&self, phone: &str, hazard: &Hazard, now: DateTime<Utc>) -> (bool, String) {
        let result = self.call_channel(self.voice.as_ref(), phone, &voice_message(hazard));
        if result.is_sent() {
            // 成功的外呼只记账，不做疲劳检查
            if let Err(e) = self
                .guard
                .history()
                .record(phone, hazard.id, Channel::Voice, now)
            {
                warn!(phone = %phone, hazard_id = hazard.id, error = %e, "Failed to record voice alert");
            }
        }

        match result {
            SendResult::Sent(response) => (true, format!("VOICE CALL: {}", response)),
            skipped @ SendResult::Skipped(_) => {
                let (_, response) = skipped.into_parts();
                (false, format!("VOICE CALL: {}", response))
            }
            SendResult::Failed(response) => {
                info!(phone = %phone, hazard_id = hazard.id, response = %response, "Voice call failed, falling back to SMS");
                let (ok, sms_response) = self.send_sms_gated(phone, hazard, &voice_fallback_sms(hazard), now);
                (ok, format!("VOICE FAILED, SMS FALLBACK: {}", sms_response))
            }
        }
    }

    fn call_channel(&self, channel: &dyn NotificationChannel, phone: &str, message: &str) -> SendResult {
        if self.dry_run {
            info!(channel = channel.name(), kind = %channel.kind(), phone = %phone, message = %message, "[DRY-RUN] Would send");
            return SendResult::Skipped("dry-run".to_string());
        }

        match channel.send(phone, message) {
            Ok(result) => result,
            Err(e) => {
                warn!(channel = channel.name(), kind = %channel.kind(), error = %e, "Channel send failed");
                SendResult::Failed(e.to_string())
            }
        }
    }
}

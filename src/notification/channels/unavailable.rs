//! 未配置渠道 - 缺少凭据时占位，每次发送都返回失败结果

use anyhow::Result;
use tracing::warn;

use crate::notification::channel::{Channel, NotificationChannel, SendResult};

pub struct UnavailableChannel {
    kind: Channel,
    reason: String,
}

impl UnavailableChannel {
    pub fn new(kind: Channel, reason: impl Into<String>) -> Self {
        Self {
            kind,
            reason: reason.into(),
        }
    }
}

impl NotificationChannel for UnavailableChannel {
    fn name(&self) -> &str {
        "unavailable"
    }

    fn kind(&self) -> Channel {
        self.kind
    }

    fn send(&self, phone: &str, _message: &str) -> Result<SendResult> {
        warn!(channel = %self.kind, phone = %phone, reason = %self.reason, "Transport unavailable");
        Ok(SendResult::Failed(format!("transport unavailable: {}", self.reason)))
    }
}

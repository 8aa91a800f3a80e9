//! 通知渠道 trait 定义

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 通知媒介
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Channel {
    Sms,
    Voice,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Sms => "SMS",
            Channel::Voice => "VOICE",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Channel {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_uppercase().as_str() {
            "SMS" => Ok(Channel::Sms),
            "VOICE" => Ok(Channel::Voice),
            other => Err(anyhow::anyhow!("unknown channel: {}", other)),
        }
    }
}

/// 发送结果
#[derive(Debug, Clone, PartialEq)]
pub enum SendResult {
    /// 发送成功（附带传输层响应）
    Sent(String),
    /// 跳过（dry-run 等）
    Skipped(String),
    /// 发送失败（接收方被拒、凭据缺失等）
    Failed(String),
}

impl SendResult {
    pub fn is_sent(&self) -> bool {
        matches!(self, SendResult::Sent(_))
    }

    /// 转为 (success, 响应文本)
    pub fn into_parts(self) -> (bool, String) {
        match self {
            SendResult::Sent(response) => (true, response),
            SendResult::Skipped(reason) => (false, format!("skipped: {}", reason)),
            SendResult::Failed(reason) => (false, reason),
        }
    }
}

/// 通知渠道 trait
///
/// 每个实现只负责一种媒介；`Err` 表示传输层异常，由分发器转为失败结果
pub trait NotificationChannel: Send + Sync {
    /// 渠道名称（用于日志）
    fn name(&self) -> &str;

    /// 渠道媒介
    fn kind(&self) -> Channel;

    /// 同步发送消息到指定号码
    fn send(&self, phone: &str, message: &str) -> Result<SendResult>;
}

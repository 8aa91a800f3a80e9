//! 提醒疲劳保护 - 同一号码、同一危险在冷却窗口内只放行一次
//!
//! 预约在真正发送之前写入历史：发送失败也会占用本次窗口。
//! 检查与写入通过 `AlertHistory::record_if_absent` 原子完成，并发调用不会重复放行。
//! 保护粒度是 (phone, hazard)，不按号码全局限流，也不区分渠道。

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tracing::{debug, info};

use super::channel::Channel;
use super::history::AlertHistory;
use crate::hazard::HazardId;

/// 默认冷却窗口（分钟）
pub const DEFAULT_COOLDOWN_MINUTES: i64 = 30;

/// 疲劳保护
#[derive(Clone)]
pub struct FatigueGuard {
    history: Arc<dyn AlertHistory>,
    cooldown: Duration,
}

impl FatigueGuard {
    /// 使用默认 30 分钟冷却窗口
    pub fn new(history: Arc<dyn AlertHistory>) -> Self {
        Self {
            history,
            cooldown: Duration::minutes(DEFAULT_COOLDOWN_MINUTES),
        }
    }

    /// 设置冷却窗口
    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    pub fn history(&self) -> &Arc<dyn AlertHistory> {
        &self.history
    }

    /// 尝试预约一次发送：放行返回 `true` 并已写入记录，窗口内重复返回 `false`
    pub fn try_reserve(&self, phone: &str, hazard_id: HazardId, channel: Channel) -> Result<bool> {
        self.try_reserve_at(phone, hazard_id, channel, Utc::now())
    }

    /// 同 `try_reserve`，使用指定的当前时间
    pub fn try_reserve_at(
        &self,
        phone: &str,
        hazard_id: HazardId,
        channel: Channel,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let since = now - self.cooldown;
        match self
            .history
            .record_if_absent(phone, hazard_id, channel, since, now)?
        {
            Some(record) => {
                debug!(
                    phone = %record.phone_number,
                    hazard_id = record.hazard_id,
                    channel = %record.channel,
                    "Alert reserved"
                );
                Ok(true)
            }
            None => {
                info!(
                    phone = %phone,
                    hazard_id,
                    cooldown_mins = self.cooldown.num_minutes(),
                    "Alert suppressed (recent alert within cooldown)"
                );
                Ok(false)
            }
        }
    }

    /// 窗口内是否已有记录（只读，不预约）
    pub fn has_recent_alert(&self, phone: &str, hazard_id: HazardId, now: DateTime<Utc>) -> Result<bool> {
        self.history.exists(phone, hazard_id, now - self.cooldown)
    }
}

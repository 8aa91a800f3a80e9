//! 通知层 - 渠道选择、疲劳保护与分发
//!
//! # 组成
//! 1. `select_channel`：严重度 ≥ 4 走语音，其余走短信
//! 2. `FatigueGuard`：同一 (phone, hazard) 在冷却窗口内只放行一次
//! 3. `NotificationDispatcher`：调用渠道，语音失败回退短信
//!
//! # 使用示例
//! ```ignore
//! use saferoute::notification::{FatigueGuard, InMemoryAlertHistory, NotificationDispatcher};
//!
//! let guard = FatigueGuard::new(Arc::new(InMemoryAlertHistory::new()));
//! let dispatcher = NotificationDispatcher::new(sms, voice, guard);
//! let outcome = dispatcher.dispatch("+254712345678", &hazard, Channel::Voice);
//! ```

pub mod channel;
pub mod channels;
pub mod dispatcher;
pub mod fatigue;
pub mod formatter;
pub mod history;
pub mod selector;

pub use channel::{Channel, NotificationChannel, SendResult};
pub use dispatcher::{DispatchOutcome, NotificationDispatcher, SUPPRESSED_MESSAGE};
pub use fatigue::{FatigueGuard, DEFAULT_COOLDOWN_MINUTES};
pub use formatter::{sms_message, voice_callback_xml, voice_fallback_sms, voice_message, voice_prompt};
pub use history::{AlertHistory, AlertRecord, InMemoryAlertHistory, JsonlAlertHistory};
pub use selector::{select_channel, VOICE_SEVERITY};

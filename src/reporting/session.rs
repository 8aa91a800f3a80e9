//! USSD 会话存储 - 按号码保存菜单状态，超过 TTL 自动失效
//!
//! 每次写入都会刷新时间戳；读取时顺带清理过期会话。

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tracing::debug;

use crate::hazard::HazardType;

/// 默认会话 TTL（秒）
pub const DEFAULT_SESSION_TTL_SECS: u64 = 180;

/// 菜单状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuState {
    /// 主菜单
    Menu,
    /// "Get Alerts" 占位页
    Alerts,
    /// 选择危险类型
    HazardType,
    /// 确认提交
    Confirm,
    /// 取消后的选择页
    Cancelled,
}

/// 单个号码的会话
#[derive(Debug, Clone, PartialEq)]
pub struct UssdSession {
    pub state: MenuState,
    pub hazard_type: Option<HazardType>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl UssdSession {
    pub fn new() -> Self {
        Self {
            state: MenuState::Menu,
            hazard_type: None,
            latitude: None,
            longitude: None,
        }
    }

    /// 回到主菜单并清空已选数据
    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

impl Default for UssdSession {
    fn default() -> Self {
        Self::new()
    }
}

/// 带 TTL 的会话存储
pub struct SessionStore {
    /// phone -> (session, last_touched)
    sessions: Mutex<HashMap<String, (UssdSession, Instant)>>,
    ttl: Duration,
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, (UssdSession, Instant)>> {
        self.sessions.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// 取出会话；不存在或已过期时返回新会话
    pub fn get_or_create(&self, phone: &str) -> UssdSession {
        self.get_or_create_at(phone, Instant::now())
    }

    pub fn get_or_create_at(&self, phone: &str, now: Instant) -> UssdSession {
        let mut sessions = self.lock();
        Self::cleanup_expired(&mut sessions, now, self.ttl);
        sessions
            .get(phone)
            .map(|(session, _)| session.clone())
            .unwrap_or_default()
    }

    /// 保存会话并刷新时间戳
    pub fn put(&self, phone: &str, session: UssdSession) {
        self.put_at(phone, session, Instant::now());
    }

    pub fn put_at(&self, phone: &str, session: UssdSession, now: Instant) {
        self.lock().insert(phone.to_string(), (session, now));
    }

    pub fn remove(&self, phone: &str) {
        self.lock().remove(phone);
    }

    /// 当前保存的会话数（含尚未清理的过期会话）
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn cleanup_expired(sessions: &mut HashMap<String, (UssdSession, Instant)>, now: Instant, ttl: Duration) {
        let before = sessions.len();
        sessions.retain(|_, (_, touched)| now.saturating_duration_since(*touched) < ttl);
        let removed = before - sessions.len();
        if removed > 0 {
            debug!(removed, "Expired USSD sessions cleaned up");
        }
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(Duration::from_secs(DEFAULT_SESSION_TTL_SECS))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PHONE: &str = "+254712345678";

    #[test]
    fn test_new_phone_starts_at_menu() {
        let store = SessionStore::default();
        assert_eq!(store.get_or_create(PHONE).state, MenuState::Menu);
        assert!(store.is_empty());
    }

    #[test]
    fn test_put_then_get() {
        let store = SessionStore::default();
        let mut session = UssdSession::new();
        session.state = MenuState::HazardType;
        store.put(PHONE, session.clone());

        assert_eq!(store.get_or_create(PHONE), session);
        assert_eq!(store.get_or_create("+254700000000").state, MenuState::Menu);
    }

    #[test]
    fn test_session_expires_after_ttl() {
        let store = SessionStore::new(Duration::from_secs(60));
        let start = Instant::now();
        let mut session = UssdSession::new();
        session.state = MenuState::Confirm;
        store.put_at(PHONE, session, start);

        let fresh = store.get_or_create_at(PHONE, start + Duration::from_secs(30));
        assert_eq!(fresh.state, MenuState::Confirm);

        let expired = store.get_or_create_at(PHONE, start + Duration::from_secs(61));
        assert_eq!(expired.state, MenuState::Menu);
        assert!(store.is_empty());
    }

    #[test]
    fn test_reset_clears_selection() {
        let mut session = UssdSession::new();
        session.state = MenuState::Confirm;
        session.hazard_type = Some(HazardType::Accident);
        session.reset();
        assert_eq!(session, UssdSession::new());
    }
}

//! USSD 上报菜单 - 主菜单 → 选择危险类型 → 确认提交
//!
//! 网关每次请求都带上完整输入（如 `1*2*1`），这里只看最后一段。
//! 空输入表示新拨号，会话回到主菜单。
//! 回复以 `CON ` 开头表示会话继续，`END ` 开头表示会话结束。

use std::sync::Arc;
use tracing::{info, warn};

use super::report::{HazardReport, ReportSink};
use super::session::{MenuState, SessionStore, UssdSession};
use crate::hazard::HazardType;

/// 上报位置（没有定位时使用的默认区域）
#[derive(Debug, Clone, PartialEq)]
pub struct ReportLocation {
    pub latitude: f64,
    pub longitude: f64,
    pub label: String,
}

impl Default for ReportLocation {
    fn default() -> Self {
        Self {
            latitude: -1.2921,
            longitude: 36.8219,
            label: "Nairobi area".to_string(),
        }
    }
}

/// 菜单选项到危险类型
pub fn hazard_type_for_code(code: &str) -> Option<HazardType> {
    match code {
        "1" => Some(HazardType::Accident),
        "2" => Some(HazardType::BadRoad),
        "3" => Some(HazardType::Pedestrians),
        "4" => Some(HazardType::BlackSpot),
        _ => None,
    }
}

fn main_menu() -> String {
    "CON Welcome to SafeRoute\nReport hazards on the road\n\n1. Report Hazard\n2. Get Alerts\n3. Exit".to_string()
}

fn hazard_menu() -> String {
    "CON Select hazard type:\n\n1. Accident\n2. Bad Road\n3. Pedestrians\n4. Black Spot\n0. Back".to_string()
}

fn alerts_page() -> String {
    "CON SafeRoute Alerts\n\nAlerts feature coming soon.\nPlease report hazards to help drivers.\n\n1. Back to Menu\n2. Exit"
        .to_string()
}

fn cancelled_page() -> String {
    "CON Report Cancelled\n\n1. Report Another Hazard\n2. Main Menu\n3. Exit".to_string()
}

fn goodbye() -> String {
    "END Thank you for using SafeRoute!".to_string()
}

/// USSD 菜单状态机
pub struct UssdMenu {
    sessions: SessionStore,
    sink: Arc<dyn ReportSink>,
    location: ReportLocation,
}

impl UssdMenu {
    pub fn new(sessions: SessionStore, sink: Arc<dyn ReportSink>) -> Self {
        Self {
            sessions,
            sink,
            location: ReportLocation::default(),
        }
    }

    pub fn with_location(mut self, location: ReportLocation) -> Self {
        self.location = location;
        self
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// 处理一次网关请求，返回 `CON ...` / `END ...` 文本
    pub fn handle(&self, phone: &str, text: &str) -> String {
        let phone = phone.trim();
        if phone.is_empty() {
            return "END Error: Phone number required".to_string();
        }

        let input = text.trim().rsplit('*').next().unwrap_or("").trim();
        let mut session = self.sessions.get_or_create(phone);
        if text.trim().is_empty() {
            session.reset();
        }

        info!(phone = %phone, input = %text, state = ?session.state, "USSD request");
        let response = match session.state {
            MenuState::Menu => self.on_main_menu(input, &mut session),
            MenuState::Alerts => self.on_alerts(input, &mut session),
            MenuState::HazardType => self.on_hazard_selection(input, &mut session),
            MenuState::Confirm => self.on_confirmation(phone, input, &mut session),
            MenuState::Cancelled => self.on_cancelled(input, &mut session),
        };

        if response.starts_with("END") {
            self.sessions.remove(phone);
        } else {
            self.sessions.put(phone, session);
        }
        response
    }

    fn on_main_menu(&self, input: &str, session: &mut UssdSession) -> String {
        match input {
            "1" => {
                session.state = MenuState::HazardType;
                hazard_menu()
            }
            "2" => {
                session.state = MenuState::Alerts;
                alerts_page()
            }
            "3" => goodbye(),
            _ => main_menu(),
        }
    }

    fn on_alerts(&self, input: &str, session: &mut UssdSession) -> String {
        match input {
            "1" => {
                session.reset();
                main_menu()
            }
            "2" => goodbye(),
            _ => alerts_page(),
        }
    }

    fn on_hazard_selection(&self, input: &str, session: &mut UssdSession) -> String {
        if input == "0" {
            session.reset();
            return main_menu();
        }

        match hazard_type_for_code(input) {
            Some(hazard_type) => {
                session.hazard_type = Some(hazard_type);
                session.latitude = Some(self.location.latitude);
                session.longitude = Some(self.location.longitude);
                session.state = MenuState::Confirm;
                format!(
                    "CON Confirm Report\n\nHazard: {}\nLocation: {}\n\n1. Confirm & Submit\n0. Cancel",
                    hazard_type.display_name(),
                    self.location.label
                )
            }
            None => hazard_menu(),
        }
    }

    fn on_confirmation(&self, phone: &str, input: &str, session: &mut UssdSession) -> String {
        match input {
            "1" => self.submit(phone, session),
            "0" => {
                session.reset();
                session.state = MenuState::Cancelled;
                cancelled_page()
            }
            _ => format!(
                "CON Confirm Report\n\nHazard: {}\n\n1. Confirm & Submit\n0. Cancel",
                session.hazard_type.map(|t| t.display_name()).unwrap_or("Unknown")
            ),
        }
    }

    fn on_cancelled(&self, input: &str, session: &mut UssdSession) -> String {
        match input {
            "1" => {
                session.state = MenuState::HazardType;
                hazard_menu()
            }
            "2" => {
                session.reset();
                main_menu()
            }
            "3" => goodbye(),
            _ => cancelled_page(),
        }
    }

    fn submit(&self, phone: &str, session: &UssdSession) -> String {
        let Some(hazard_type) = session.hazard_type else {
            return "END Error: Invalid session state".to_string();
        };
        let report = HazardReport::new(
            phone,
            hazard_type,
            session.latitude.unwrap_or(self.location.latitude),
            session.longitude.unwrap_or(self.location.longitude),
        );

        match self.sink.submit(&report) {
            Ok(()) => {
                info!(phone = %phone, hazard_type = %hazard_type.as_str(), "Hazard report submitted");
                format!(
                    "END Thank you!\nYour {} report\nhas been received.\n\nNearby drivers will\nbe alerted.",
                    hazard_type.display_name()
                )
            }
            Err(e) => {
                warn!(phone = %phone, error = %e, "Failed to save hazard report");
                "END Error saving report. Please try again.".to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reporting::report::InMemoryReportSink;
    use anyhow::{anyhow, Result};

    const PHONE: &str = "+254712345678";

    struct FailingSink;

    impl ReportSink for FailingSink {
        fn submit(&self, _report: &HazardReport) -> Result<()> {
            Err(anyhow!("disk full"))
        }

        fn list(&self) -> Result<Vec<HazardReport>> {
            Ok(Vec::new())
        }
    }

    fn menu() -> (UssdMenu, Arc<InMemoryReportSink>) {
        let sink = Arc::new(InMemoryReportSink::new());
        (UssdMenu::new(SessionStore::default(), sink.clone()), sink)
    }

    #[test]
    fn test_full_report_flow() {
        let (menu, sink) = menu();

        assert!(menu.handle(PHONE, "").starts_with("CON Welcome to SafeRoute"));
        assert!(menu.handle(PHONE, "1").starts_with("CON Select hazard type:"));
        let confirm = menu.handle(PHONE, "1*2");
        assert!(confirm.contains("Hazard: Bad Road"));
        assert!(confirm.contains("Location: Nairobi area"));

        let done = menu.handle(PHONE, "1*2*1");
        assert!(done.starts_with("END Thank you!"));
        assert!(done.contains("Your Bad Road report"));

        let reports = sink.list().unwrap();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].hazard_type, HazardType::BadRoad);
        assert_eq!(reports[0].phone_number, PHONE);
        assert_eq!(reports[0].latitude, -1.2921);
        assert!(menu.sessions().is_empty());
    }

    #[test]
    fn test_exit_from_main_menu() {
        let (menu, _) = menu();
        menu.handle(PHONE, "");
        assert_eq!(menu.handle(PHONE, "3"), "END Thank you for using SafeRoute!");
        assert!(menu.sessions().is_empty());
    }

    #[test]
    fn test_back_from_hazard_menu() {
        let (menu, _) = menu();
        menu.handle(PHONE, "1");
        assert!(menu.handle(PHONE, "1*0").starts_with("CON Welcome to SafeRoute"));
    }

    #[test]
    fn test_invalid_hazard_code_repeats_menu() {
        let (menu, _) = menu();
        menu.handle(PHONE, "1");
        assert!(menu.handle(PHONE, "1*9").starts_with("CON Select hazard type:"));
    }

    #[test]
    fn test_cancel_then_report_another() {
        let (menu, sink) = menu();
        menu.handle(PHONE, "1");
        menu.handle(PHONE, "1*1");
        assert!(menu.handle(PHONE, "1*1*0").starts_with("CON Report Cancelled"));
        assert!(menu.handle(PHONE, "1*1*0*1").starts_with("CON Select hazard type:"));
        menu.handle(PHONE, "1*1*0*1*4");
        assert!(menu.handle(PHONE, "1*1*0*1*4*1").contains("Your Black Spot report"));
        assert_eq!(sink.list().unwrap()[0].hazard_type, HazardType::BlackSpot);
    }

    #[test]
    fn test_empty_text_restarts_session() {
        let (menu, _) = menu();
        menu.handle(PHONE, "1");
        menu.handle(PHONE, "1*3");
        assert!(menu.handle(PHONE, "").starts_with("CON Welcome to SafeRoute"));
        assert!(menu.handle(PHONE, "3").starts_with("END"));
    }

    #[test]
    fn test_missing_phone() {
        let (menu, _) = menu();
        assert_eq!(menu.handle("  ", ""), "END Error: Phone number required");
    }

    #[test]
    fn test_sink_failure_ends_session() {
        let menu = UssdMenu::new(SessionStore::default(), Arc::new(FailingSink));
        menu.handle(PHONE, "1");
        menu.handle(PHONE, "1*1");
        assert_eq!(menu.handle(PHONE, "1*1*1"), "END Error saving report. Please try again.");
        assert!(menu.sessions().is_empty());
    }

    #[test]
    fn test_hazard_codes() {
        assert_eq!(hazard_type_for_code("1"), Some(HazardType::Accident));
        assert_eq!(hazard_type_for_code("4"), Some(HazardType::BlackSpot));
        assert_eq!(hazard_type_for_code("0"), None);
    }
}

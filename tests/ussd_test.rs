use saferoute::reporting::{JsonlReportStore, ReportLocation, ReportSink, SessionStore, UssdMenu};
use saferoute::HazardType;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

#[test]
fn test_report_written_to_jsonl() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(JsonlReportStore::in_dir(dir.path()));
    let menu = UssdMenu::new(SessionStore::new(Duration::from_secs(180)), store.clone()).with_location(
        ReportLocation {
            latitude: 0.3476,
            longitude: 32.5825,
            label: "Kampala".to_string(),
        },
    );

    let phone = "+256700000001";
    for text in ["", "1"] {
        assert!(menu.handle(phone, text).starts_with("CON"));
    }
    assert!(menu.handle(phone, "1*3").contains("Location: Kampala"));
    assert!(menu.handle(phone, "1*3*1").starts_with("END Thank you!"));

    let reports = store.list().unwrap();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].hazard_type, HazardType::Pedestrians);
    assert_eq!(reports[0].latitude, 0.3476);
}

#[test]
fn test_sessions_are_per_phone() {
    let dir = TempDir::new().unwrap();
    let menu = UssdMenu::new(SessionStore::default(), Arc::new(JsonlReportStore::in_dir(dir.path())));

    menu.handle("+254700000001", "1");
    // 另一个号码仍在主菜单
    assert!(menu.handle("+254700000002", "1").starts_with("CON Select hazard type:"));
    assert!(menu.handle("+254700000001", "1*2").contains("Hazard: Bad Road"));
    assert_eq!(menu.sessions().len(), 2);
}

//! SafeRoute - 道路危险提醒：定位附近危险、去重，并通过短信或语音通知司机

pub mod cli;
pub mod config;
pub mod engine;
pub mod geo;
pub mod hazard;
pub mod notification;
pub mod reporting;

pub use config::Config;
pub use engine::{run_alert_pipeline, AlertEngine, AlertReport, EngineConfig, EngineError, HazardSummary};
pub use geo::{format_distance, haversine_distance, is_within};
pub use hazard::{
    ClusterMode, Hazard, HazardDeduplicator, HazardId, HazardLocator, HazardStore, HazardType,
    InMemoryHazardStore, JsonHazardStore, NearbyHazard, Severity,
};
pub use notification::{
    select_channel, AlertHistory, AlertRecord, Channel, DispatchOutcome, FatigueGuard,
    InMemoryAlertHistory, JsonlAlertHistory, NotificationChannel, NotificationDispatcher, SendResult,
};
pub use reporting::{HazardReport, ReportSink, SessionStore, UssdMenu};

//! 提醒编排器 - locate → dedup → severity filter → 逐个选渠道并分发
//!
//! 顺序固定：定位结果按距离排序，去重保留代表元素顺序，编排器不再重排。
//! 单个危险发送失败不会中止后续危险的处理。

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, OnceLock};
use thiserror::Error;
use tracing::{debug, info};

use crate::hazard::{
    filter_by_severity, ClusterMode, HazardDeduplicator, HazardId, HazardLocator, HazardStore,
    HazardType, NearbyHazard, Severity, DEFAULT_DEDUP_RADIUS_METERS, DEFAULT_RADIUS_METERS,
    DEFAULT_SEVERITY_THRESHOLD,
};
use crate::notification::{select_channel, DispatchOutcome, NotificationDispatcher};

/// 号码格式：可选 `+`，6-15 位数字
const PHONE_PATTERN: &str = r"^\+?[0-9]{6,15}$";

/// 编排器错误
#[derive(Debug, Error)]
pub enum EngineError {
    /// 号码、坐标或半径不合法，流水线未运行
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// 危险数据源不可用
    #[error("hazard store unavailable: {0:#}")]
    Store(anyhow::Error),
}

/// 流水线参数
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    pub radius_m: f64,
    pub dedup_radius_m: f64,
    pub severity_threshold: u8,
    pub cluster_mode: ClusterMode,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            radius_m: DEFAULT_RADIUS_METERS,
            dedup_radius_m: DEFAULT_DEDUP_RADIUS_METERS,
            severity_threshold: DEFAULT_SEVERITY_THRESHOLD,
            cluster_mode: ClusterMode::Greedy,
        }
    }
}

/// 报告中的危险摘要
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HazardSummary {
    pub id: HazardId,
    #[serde(rename = "type")]
    pub hazard_type: HazardType,
    pub severity: Severity,
    pub lat: f64,
    pub lon: f64,
    /// 与司机的距离（米）
    pub distance_m: f64,
}

impl From<&NearbyHazard> for HazardSummary {
    fn from(nearby: &NearbyHazard) -> Self {
        Self {
            id: nearby.hazard.id,
            hazard_type: nearby.hazard.hazard_type,
            severity: nearby.hazard.severity,
            lat: nearby.hazard.latitude,
            lon: nearby.hazard.longitude,
            distance_m: nearby.distance_m,
        }
    }
}

/// 一次流水线运行的结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertReport {
    pub phone_number: String,
    /// 半径内找到的危险数
    pub found_count: usize,
    /// 去重后的危险数
    pub deduped_count: usize,
    /// 尝试发送的次数（含失败与被抑制的）
    pub notified_count: usize,
    /// 通过严重度过滤、尝试发送的危险
    pub hazards: Vec<HazardSummary>,
    pub outcomes: Vec<DispatchOutcome>,
}

impl AlertReport {
    /// 发送成功的结果数
    pub fn success_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.success).count()
    }
}

/// 提醒编排器
pub struct AlertEngine {
    locator: HazardLocator,
    deduplicator: HazardDeduplicator,
    dispatcher: NotificationDispatcher,
    config: EngineConfig,
}

impl AlertEngine {
    pub fn new(store: Arc<dyn HazardStore>, dispatcher: NotificationDispatcher, config: EngineConfig) -> Self {
        let deduplicator = HazardDeduplicator::new()
            .with_radius(config.dedup_radius_m)
            .with_mode(config.cluster_mode);
        Self {
            locator: HazardLocator::new(store),
            deduplicator,
            dispatcher,
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn dispatcher(&self) -> &NotificationDispatcher {
        &self.dispatcher
    }

    /// 为一位司机运行完整流水线；`radius_m` 为 None 或 0 时用配置半径
    pub fn run(
        &self,
        phone: &str,
        latitude: f64,
        longitude: f64,
        radius_m: Option<f64>,
    ) -> Result<AlertReport, EngineError> {
        self.run_at(phone, latitude, longitude, radius_m, Utc::now())
    }

    /// 同 `run`，使用指定的当前时间（影响疲劳窗口）
    pub fn run_at(
        &self,
        phone: &str,
        latitude: f64,
        longitude: f64,
        radius_m: Option<f64>,
        now: DateTime<Utc>,
    ) -> Result<AlertReport, EngineError> {
        let phone = phone.trim();
        let radius_m = radius_m
            .filter(|r| *r != 0.0)
            .unwrap_or(self.config.radius_m);
        validate_input(phone, latitude, longitude, radius_m)?;

        let nearby = self
            .locator
            .locate(latitude, longitude, radius_m)
            .map_err(EngineError::Store)?;
        let found_count = nearby.len();

        let deduped = self.deduplicator.deduplicate(&nearby);
        let deduped_count = deduped.len();

        let alertable = filter_by_severity(deduped, self.config.severity_threshold);
        debug!(
            phone = %phone,
            found = found_count,
            deduped = deduped_count,
            alertable = alertable.len(),
            "Pipeline stages complete"
        );

        let outcomes: Vec<DispatchOutcome> = alertable
            .iter()
            .map(|nearby| {
                let channel = select_channel(nearby.hazard.severity);
                self.dispatcher.dispatch_at(phone, &nearby.hazard, channel, now)
            })
            .collect();

        let report = AlertReport {
            phone_number: phone.to_string(),
            found_count,
            deduped_count,
            notified_count: outcomes.len(),
            hazards: alertable.iter().map(HazardSummary::from).collect(),
            outcomes,
        };

        info!(
            phone = %phone,
            found = report.found_count,
            deduped = report.deduped_count,
            notified = report.notified_count,
            succeeded = report.success_count(),
            "Alert pipeline finished"
        );
        Ok(report)
    }
}

fn phone_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(PHONE_PATTERN).ok()).as_ref()
}

/// 校验号码格式
pub fn is_valid_phone(phone: &str) -> bool {
    phone_pattern().is_some_and(|re| re.is_match(phone))
}

fn validate_input(phone: &str, latitude: f64, longitude: f64, radius_m: f64) -> Result<(), EngineError> {
    if phone.is_empty() {
        return Err(EngineError::InvalidInput("phone number is required".to_string()));
    }
    if !is_valid_phone(phone) {
        return Err(EngineError::InvalidInput(format!("malformed phone number: {}", phone)));
    }
    if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
        return Err(EngineError::InvalidInput(format!("latitude out of range: {}", latitude)));
    }
    if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
        return Err(EngineError::InvalidInput(format!("longitude out of range: {}", longitude)));
    }
    if !radius_m.is_finite() || radius_m <= 0.0 {
        return Err(EngineError::InvalidInput(format!("radius must be positive: {}", radius_m)));
    }
    Ok(())
}

/// 一次性入口：使用默认配置运行流水线
pub fn run_alert_pipeline(
    store: Arc<dyn HazardStore>,
    dispatcher: NotificationDispatcher,
    phone: &str,
    latitude: f64,
    longitude: f64,
    radius_m: Option<f64>,
) -> Result<AlertReport, EngineError> {
    AlertEngine::new(store, dispatcher, EngineConfig::default()).run(phone, latitude, longitude, radius_m)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hazard::{Hazard, InMemoryHazardStore};
    use crate::notification::{
        Channel, FatigueGuard, InMemoryAlertHistory, NotificationChannel, SendResult,
    };
    use anyhow::Result;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const PHONE: &str = "+254712345678";
    const DRIVER: (f64, f64) = (37.7749, -122.4194);

    struct CountingChannel {
        kind: Channel,
        sends: AtomicUsize,
    }

    impl CountingChannel {
        fn new(kind: Channel) -> Self {
            Self {
                kind,
                sends: AtomicUsize::new(0),
            }
        }
    }

    impl NotificationChannel for CountingChannel {
        fn name(&self) -> &str {
            "counting"
        }

        fn kind(&self) -> Channel {
            self.kind
        }

        fn send(&self, _phone: &str, _message: &str) -> Result<SendResult> {
            self.sends.fetch_add(1, Ordering::SeqCst);
            Ok(SendResult::Sent("ok".to_string()))
        }
    }

    struct BrokenStore;

    impl HazardStore for BrokenStore {
        fn list_all(&self) -> Result<Vec<Hazard>> {
            Err(anyhow::anyhow!("database is locked"))
        }
    }

    fn hazard(id: u64, hazard_type: HazardType, severity: u8, lat_offset: f64) -> Hazard {
        Hazard::new(id, hazard_type, Severity::new(severity).unwrap(), DRIVER.0 + lat_offset, DRIVER.1)
    }

    fn engine(hazards: Vec<Hazard>) -> (AlertEngine, Arc<CountingChannel>, Arc<CountingChannel>) {
        let sms = Arc::new(CountingChannel::new(Channel::Sms));
        let voice = Arc::new(CountingChannel::new(Channel::Voice));
        let dispatcher = NotificationDispatcher::new(
            sms.clone(),
            voice.clone(),
            FatigueGuard::new(Arc::new(InMemoryAlertHistory::new())),
        );
        let store = Arc::new(InMemoryHazardStore::with_hazards(hazards));
        (AlertEngine::new(store, dispatcher, EngineConfig::default()), sms, voice)
    }

    #[test]
    fn test_counts_and_channels() {
        let (engine, sms, voice) = engine(vec![
            hazard(1, HazardType::Accident, 5, 0.0009),
            hazard(2, HazardType::BadRoad, 3, 0.0005),
            hazard(3, HazardType::Pedestrians, 1, 0.0002),
            // 与 2 号同类型且相距约 28m，被去重
            hazard(4, HazardType::BadRoad, 2, 0.00075),
        ]);

        let report = engine.run(PHONE, DRIVER.0, DRIVER.1, None).unwrap();
        assert_eq!(report.found_count, 4);
        assert_eq!(report.deduped_count, 3);
        assert_eq!(report.notified_count, 2);
        assert_eq!(report.hazards.iter().map(|h| h.id).collect::<Vec<_>>(), vec![2, 1]);
        assert_eq!(report.outcomes[0].channel, Channel::Sms);
        assert_eq!(report.outcomes[1].channel, Channel::Voice);
        assert_eq!(report.success_count(), 2);
        assert_eq!(sms.sends.load(Ordering::SeqCst), 1);
        assert_eq!(voice.sends.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_radius_override() {
        let (engine, _, _) = engine(vec![hazard(1, HazardType::Accident, 5, 0.0036)]);
        assert_eq!(engine.run(PHONE, DRIVER.0, DRIVER.1, None).unwrap().found_count, 0);
        assert_eq!(engine.run(PHONE, DRIVER.0, DRIVER.1, Some(500.0)).unwrap().found_count, 1);
    }

    #[test]
    fn test_zero_radius_uses_configured_default() {
        // 约 200m，在默认 300m 内
        let (engine, _, _) = engine(vec![hazard(1, HazardType::BadRoad, 3, 0.0018)]);
        assert_eq!(engine.run(PHONE, DRIVER.0, DRIVER.1, Some(50.0)).unwrap().found_count, 0);
        assert_eq!(engine.run(PHONE, DRIVER.0, DRIVER.1, Some(0.0)).unwrap().found_count, 1);
    }

    #[test]
    fn test_no_hazards() {
        let (engine, _, _) = engine(Vec::new());
        let report = engine.run(PHONE, DRIVER.0, DRIVER.1, None).unwrap();
        assert_eq!(report.found_count, 0);
        assert!(report.outcomes.is_empty());
    }

    #[test]
    fn test_invalid_input_rejected() {
        let (engine, sms, _) = engine(vec![hazard(1, HazardType::BadRoad, 3, 0.0)]);

        for (phone, lat, lon, radius) in [
            ("", DRIVER.0, DRIVER.1, None),
            ("call me", DRIVER.0, DRIVER.1, None),
            (PHONE, 91.0, DRIVER.1, None),
            (PHONE, DRIVER.0, f64::NAN, None),
            (PHONE, DRIVER.0, DRIVER.1, Some(-5.0)),
        ] {
            let err = engine.run(phone, lat, lon, radius).unwrap_err();
            assert!(matches!(err, EngineError::InvalidInput(_)), "{:?}", err);
        }
        assert_eq!(sms.sends.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_store_failure_is_typed() {
        let dispatcher = NotificationDispatcher::new(
            Arc::new(CountingChannel::new(Channel::Sms)),
            Arc::new(CountingChannel::new(Channel::Voice)),
            FatigueGuard::new(Arc::new(InMemoryAlertHistory::new())),
        );
        let engine = AlertEngine::new(Arc::new(BrokenStore), dispatcher, EngineConfig::default());
        let err = engine.run(PHONE, DRIVER.0, DRIVER.1, None).unwrap_err();
        assert!(matches!(err, EngineError::Store(_)));
        assert!(err.to_string().contains("database is locked"));
    }

    #[test]
    fn test_phone_pattern() {
        assert!(is_valid_phone("+254712345678"));
        assert!(is_valid_phone("0712345678"));
        assert!(!is_valid_phone("+2547-1234"));
        assert!(!is_valid_phone("12345"));
    }

    #[test]
    fn test_report_serializes_camel_case() {
        let (engine, _, _) = engine(vec![hazard(7, HazardType::Accident, 4, 0.0)]);
        let report = engine.run(PHONE, DRIVER.0, DRIVER.1, None).unwrap();
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["foundCount"], 1);
        assert_eq!(json["hazards"][0]["type"], "ACCIDENT");
        assert_eq!(json["outcomes"][0]["hazardId"], 7);
        assert_eq!(json["outcomes"][0]["channel"], "VOICE");
    }
}

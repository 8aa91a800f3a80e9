//! 配置加载
//!
//! 优先级：
//! 1. `--config` 指定的文件，否则 `~/.config/saferoute/config.json`（不存在时用默认值）
//! 2. 环境变量覆盖凭据与数据目录：`AT_USERNAME` `AT_API_KEY` `AT_SENDER_ID`
//!    `AT_VOICE_NUMBER` `AT_SANDBOX` `SAFEROUTE_DATA_DIR`
//!
//! 缺少凭据不算配置错误，渠道会以 `UnavailableChannel` 形式创建。

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration as StdDuration;
use tracing::{debug, info};

use crate::engine::EngineConfig;
use crate::hazard::{ClusterMode, JsonHazardStore, DEFAULT_DEDUP_RADIUS_METERS, DEFAULT_RADIUS_METERS, DEFAULT_SEVERITY_THRESHOLD};
use crate::notification::channels::{AfricasTalkingClient, AfricasTalkingConfig, UnavailableChannel};
use crate::notification::channels::africastalking::DEFAULT_TIMEOUT_SECS;
use crate::notification::{Channel, FatigueGuard, JsonlAlertHistory, NotificationChannel, DEFAULT_COOLDOWN_MINUTES};
use crate::reporting::{JsonlReportStore, ReportLocation, SessionStore, DEFAULT_SESSION_TTL_SECS};

/// Africa's Talking 凭据
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportSettings {
    pub username: Option<String>,
    pub api_key: Option<String>,
    pub sender_id: Option<String>,
    pub voice_number: Option<String>,
    pub sandbox: bool,
}

/// 上报默认位置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocationSettings {
    pub latitude: f64,
    pub longitude: f64,
    pub label: String,
}

impl Default for LocationSettings {
    fn default() -> Self {
        let location = ReportLocation::default();
        Self {
            latitude: location.latitude,
            longitude: location.longitude,
            label: location.label,
        }
    }
}

/// 全局配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub radius_meters: f64,
    pub dedup_radius_meters: f64,
    pub severity_threshold: u8,
    pub cooldown_minutes: i64,
    pub cluster_mode: ClusterMode,
    pub report_location: LocationSettings,
    pub ussd_session_ttl_secs: u64,
    pub transport_timeout_secs: u64,
    /// 数据目录（默认 `~/.config/saferoute`）
    pub data_dir: Option<PathBuf>,
    pub africastalking: TransportSettings,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            radius_meters: DEFAULT_RADIUS_METERS,
            dedup_radius_meters: DEFAULT_DEDUP_RADIUS_METERS,
            severity_threshold: DEFAULT_SEVERITY_THRESHOLD,
            cooldown_minutes: DEFAULT_COOLDOWN_MINUTES,
            cluster_mode: ClusterMode::Greedy,
            report_location: LocationSettings::default(),
            ussd_session_ttl_secs: DEFAULT_SESSION_TTL_SECS,
            transport_timeout_secs: DEFAULT_TIMEOUT_SECS,
            data_dir: None,
            africastalking: TransportSettings::default(),
        }
    }
}

/// `~/.config/saferoute`
pub fn default_config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config/saferoute")
}

impl Config {
    /// 加载配置文件并应用环境变量覆盖
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path
            .map(Path::to_path_buf)
            .unwrap_or_else(|| default_config_dir().join("config.json"));

        let mut config = if path.exists() {
            debug!(path = %path.display(), "Loading config file");
            Self::from_file(&path)?
        } else {
            debug!(path = %path.display(), "Config file not found, using defaults");
            Self::default()
        };

        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        serde_json::from_str(&content).with_context(|| format!("parsing config {}", path.display()))
    }

    /// 用环境变量覆盖凭据；空字符串视为未设置
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let at = &mut self.africastalking;

        if let Some(v) = get("AT_USERNAME") {
            at.username = Some(v);
        }
        if let Some(v) = get("AT_API_KEY") {
            at.api_key = Some(v);
        }
        if let Some(v) = get("AT_SENDER_ID") {
            at.sender_id = Some(v);
        }
        if let Some(v) = get("AT_VOICE_NUMBER") {
            at.voice_number = Some(v);
        }
        if let Some(v) = get("AT_SANDBOX") {
            at.sandbox = matches!(v.trim().to_lowercase().as_str(), "1" | "true" | "yes");
        }
        if let Some(v) = get("SAFEROUTE_DATA_DIR") {
            self.data_dir = Some(PathBuf::from(v));
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.radius_meters.is_finite() && self.radius_meters > 0.0) {
            return Err(anyhow!("radius_meters must be positive, got {}", self.radius_meters));
        }
        if !(self.dedup_radius_meters.is_finite() && self.dedup_radius_meters >= 0.0) {
            return Err(anyhow!("dedup_radius_meters must not be negative, got {}", self.dedup_radius_meters));
        }
        if !(1..=5).contains(&self.severity_threshold) {
            return Err(anyhow!("severity_threshold must be 1-5, got {}", self.severity_threshold));
        }
        if self.cooldown_minutes < 0 {
            return Err(anyhow!("cooldown_minutes must not be negative, got {}", self.cooldown_minutes));
        }
        Ok(())
    }

    pub fn data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(default_config_dir)
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            radius_m: self.radius_meters,
            dedup_radius_m: self.dedup_radius_meters,
            severity_threshold: self.severity_threshold,
            cluster_mode: self.cluster_mode,
        }
    }

    pub fn cooldown(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.cooldown_minutes)
    }

    pub fn report_location(&self) -> ReportLocation {
        ReportLocation {
            latitude: self.report_location.latitude,
            longitude: self.report_location.longitude,
            label: self.report_location.label.clone(),
        }
    }

    pub fn hazard_store(&self) -> JsonHazardStore {
        JsonHazardStore::in_dir(&self.data_dir())
    }

    pub fn alert_history(&self) -> JsonlAlertHistory {
        JsonlAlertHistory::in_dir(&self.data_dir())
    }

    pub fn report_store(&self) -> JsonlReportStore {
        JsonlReportStore::in_dir(&self.data_dir())
    }

    pub fn session_store(&self) -> SessionStore {
        SessionStore::new(StdDuration::from_secs(self.ussd_session_ttl_secs))
    }

    /// 基于文件历史的疲劳保护
    pub fn fatigue_guard(&self) -> FatigueGuard {
        FatigueGuard::new(Arc::new(self.alert_history())).with_cooldown(self.cooldown())
    }

    /// 创建短信与语音渠道；凭据缺失时返回不可用渠道
    pub fn build_channels(&self) -> (Arc<dyn NotificationChannel>, Arc<dyn NotificationChannel>) {
        let at = &self.africastalking;
        let (Some(username), Some(api_key)) = (at.username.as_deref(), at.api_key.as_deref()) else {
            let reason = "AT_USERNAME/AT_API_KEY not set";
            info!("Africa's Talking credentials missing, transports unavailable");
            return (
                Arc::new(UnavailableChannel::new(Channel::Sms, reason)),
                Arc::new(UnavailableChannel::new(Channel::Voice, reason)),
            );
        };

        let mut transport = AfricasTalkingConfig::new(username, api_key);
        transport.sender_id = at.sender_id.clone();
        transport.voice_number = at.voice_number.clone();
        transport.sandbox = at.sandbox;
        transport.timeout_secs = self.transport_timeout_secs;

        match AfricasTalkingClient::new(transport) {
            Ok(client) => {
                let (sms, voice) = client.into_channels();
                (Arc::new(sms), Arc::new(voice))
            }
            Err(e) => {
                let reason = e.to_string();
                (
                    Arc::new(UnavailableChannel::new(Channel::Sms, reason.clone())),
                    Arc::new(UnavailableChannel::new(Channel::Voice, reason)),
                )
            }
        }
    }
}

//! 危险上报记录与存储

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::info;

use crate::hazard::HazardType;

/// 一条上报（JSONL 格式）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HazardReport {
    pub phone_number: String,
    pub hazard_type: HazardType,
    pub latitude: f64,
    pub longitude: f64,
    pub created_at: DateTime<Utc>,
}

impl HazardReport {
    pub fn new(phone: &str, hazard_type: HazardType, latitude: f64, longitude: f64) -> Self {
        Self {
            phone_number: phone.to_string(),
            hazard_type,
            latitude,
            longitude,
            created_at: Utc::now(),
        }
    }
}

/// 上报接收方
pub trait ReportSink: Send + Sync {
    fn submit(&self, report: &HazardReport) -> Result<()>;

    /// 全部上报，按提交顺序
    fn list(&self) -> Result<Vec<HazardReport>>;
}

/// 内存接收方
#[derive(Debug, Default)]
pub struct InMemoryReportSink {
    reports: Mutex<Vec<HazardReport>>,
}

impl InMemoryReportSink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ReportSink for InMemoryReportSink {
    fn submit(&self, report: &HazardReport) -> Result<()> {
        self.reports
            .lock()
            .map_err(|_| anyhow::anyhow!("report sink lock poisoned"))?
            .push(report.clone());
        Ok(())
    }

    fn list(&self) -> Result<Vec<HazardReport>> {
        Ok(self
            .reports
            .lock()
            .map_err(|_| anyhow::anyhow!("report sink lock poisoned"))?
            .clone())
    }
}

/// JSONL 文件存储：`<data_dir>/reports.jsonl`
pub struct JsonlReportStore {
    path: PathBuf,
}

impl JsonlReportStore {
    pub const FILE_NAME: &'static str = "reports.jsonl";

    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn in_dir(data_dir: &Path) -> Self {
        Self::new(data_dir.join(Self::FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ReportSink for JsonlReportStore {
    fn submit(&self, report: &HazardReport) -> Result<()> {
        use fs2::FileExt;

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        file.lock_exclusive()?;
        let result = writeln!(file, "{}", serde_json::to_string(report)?).and_then(|_| file.flush());
        file.unlock()?;
        result?;

        info!(phone = %report.phone_number, hazard_type = %report.hazard_type.as_str(), "Hazard report saved");
        Ok(())
    }

    fn list(&self) -> Result<Vec<HazardReport>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let file = File::open(&self.path)?;
        Ok(BufReader::new(file)
            .lines()
            .filter_map(|line| line.ok())
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| serde_json::from_str(&line).ok())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_jsonl_store_appends() {
        let dir = TempDir::new().unwrap();
        let store = JsonlReportStore::in_dir(dir.path());
        assert!(store.list().unwrap().is_empty());

        store
            .submit(&HazardReport::new("+254712345678", HazardType::Accident, -1.2921, 36.8219))
            .unwrap();
        store
            .submit(&HazardReport::new("+254712345679", HazardType::BadRoad, -1.2921, 36.8219))
            .unwrap();

        let reports = store.list().unwrap();
        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].hazard_type, HazardType::Accident);
        assert_eq!(reports[1].phone_number, "+254712345679");
    }

    #[test]
    fn test_in_memory_sink() {
        let sink = InMemoryReportSink::new();
        sink.submit(&HazardReport::new("+254712345678", HazardType::Pedestrians, 0.0, 0.0))
            .unwrap();
        assert_eq!(sink.list().unwrap().len(), 1);
    }
}

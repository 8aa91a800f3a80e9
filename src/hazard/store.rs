//! 路况危险存储 - 内存实现与本地 JSON 文件实现

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use tracing::debug;

use super::model::{Hazard, HazardId, HazardType, Severity};

/// 危险存储接口
///
/// 不下推任何过滤条件，调用方自行按距离过滤
pub trait HazardStore: Send + Sync {
    /// 返回全部危险记录（按存储顺序）
    fn list_all(&self) -> Result<Vec<Hazard>>;
}

/// 内存存储（测试和演示用）
#[derive(Debug, Default)]
pub struct InMemoryHazardStore {
    hazards: RwLock<Vec<Hazard>>,
}

impl InMemoryHazardStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_hazards(hazards: Vec<Hazard>) -> Self {
        Self {
            hazards: RwLock::new(hazards),
        }
    }

    pub fn insert(&self, hazard: Hazard) {
        if let Ok(mut hazards) = self.hazards.write() {
            hazards.push(hazard);
        }
    }
}

impl HazardStore for InMemoryHazardStore {
    fn list_all(&self) -> Result<Vec<Hazard>> {
        let hazards = self
            .hazards
            .read()
            .map_err(|_| anyhow::anyhow!("hazard store lock poisoned"))?;
        Ok(hazards.clone())
    }
}

/// JSON 文件存储：`<data_dir>/hazards.json`，内容为 Hazard 数组
pub struct JsonHazardStore {
    path: PathBuf,
}

impl JsonHazardStore {
    pub const FILE_NAME: &'static str = "hazards.json";

    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// 在数据目录下创建
    pub fn in_dir(data_dir: &Path) -> Self {
        Self::new(data_dir.join(Self::FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 新增一条危险记录，id 取当前最大值 + 1
    pub fn add(
        &self,
        hazard_type: HazardType,
        severity: Severity,
        latitude: f64,
        longitude: f64,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<Hazard> {
        use fs2::FileExt;

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        // 独立的锁文件，保证 读-改-写 期间不被并发写入覆盖
        let lock_path = self.path.with_extension("lock");
        let lock = OpenOptions::new()
            .create(true)
            .write(true)
            .open(&lock_path)?;
        lock.lock_exclusive()?;

        let mut hazards = self.read_file()?;
        let id: HazardId = hazards.iter().map(|h| h.id).max().unwrap_or(0) + 1;
        let mut hazard = Hazard::new(id, hazard_type, severity, latitude, longitude);
        hazard.expires_at = expires_at;
        hazards.push(hazard.clone());

        let temp_path = self.path.with_extension("tmp");
        fs::write(&temp_path, serde_json::to_string_pretty(&hazards)?)?;
        fs::rename(&temp_path, &self.path)?;

        lock.unlock()?;
        debug!(hazard_id = id, hazard_type = %hazard_type.as_str(), "Hazard added to store");
        Ok(hazard)
    }

    fn read_file(&self) -> Result<Vec<Hazard>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let content = fs::read_to_string(&self.path)
            .with_context(|| format!("reading {}", self.path.display()))?;
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }
        let hazards = serde_json::from_str(&content)
            .with_context(|| format!("parsing {}", self.path.display()))?;
        Ok(hazards)
    }
}

impl HazardStore for JsonHazardStore {
    fn list_all(&self) -> Result<Vec<Hazard>> {
        self.read_file()
    }
}

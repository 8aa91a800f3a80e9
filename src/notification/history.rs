//! 提醒历史 - 记录每次放行的发送，供疲劳保护查询
//!
//! 历史只追加，不更新也不删除（保留策略不在本模块范围内）。

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::channel::Channel;
use crate::hazard::HazardId;

/// 提醒记录（JSONL 格式）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertRecord {
    /// 接收方号码
    pub phone_number: String,
    /// 危险 ID
    pub hazard_id: HazardId,
    /// 发送渠道
    pub channel: Channel,
    /// 发送时间
    pub sent_at: DateTime<Utc>,
}

impl AlertRecord {
    fn matches(&self, phone: &str, hazard_id: HazardId, since: DateTime<Utc>) -> bool {
        self.phone_number == phone && self.hazard_id == hazard_id && self.sent_at >= since
    }
}

/// 提醒历史接口
pub trait AlertHistory: Send + Sync {
    /// 是否存在 `sent_at >= since` 的 (phone, hazard) 记录；不区分渠道
    fn exists(&self, phone: &str, hazard_id: HazardId, since: DateTime<Utc>) -> Result<bool>;

    /// 无条件追加一条记录
    fn record(
        &self,
        phone: &str,
        hazard_id: HazardId,
        channel: Channel,
        sent_at: DateTime<Utc>,
    ) -> Result<AlertRecord>;

    /// 原子地检查并写入：窗口内已有记录返回 `None`，否则写入并返回新记录
    fn record_if_absent(
        &self,
        phone: &str,
        hazard_id: HazardId,
        channel: Channel,
        since: DateTime<Utc>,
        sent_at: DateTime<Utc>,
    ) -> Result<Option<AlertRecord>>;

    /// 最近的记录（按时间升序，最多 `limit` 条），可按号码过滤
    fn recent(&self, phone: Option<&str>, limit: usize) -> Result<Vec<AlertRecord>>;
}

fn new_record(phone: &str, hazard_id: HazardId, channel: Channel, sent_at: DateTime<Utc>) -> AlertRecord {
    AlertRecord {
        phone_number: phone.to_string(),
        hazard_id,
        channel,
        sent_at,
    }
}

fn tail(mut records: Vec<AlertRecord>, phone: Option<&str>, limit: usize) -> Vec<AlertRecord> {
    if let Some(phone) = phone {
        records.retain(|r| r.phone_number == phone);
    }
    records.sort_by_key(|r| r.sent_at);
    let start = records.len().saturating_sub(limit);
    records.split_off(start)
}

/// 内存历史（进程内共享，互斥锁保证原子性）
#[derive(Debug, Default)]
pub struct InMemoryAlertHistory {
    records: Mutex<Vec<AlertRecord>>,
}

impl InMemoryAlertHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.lock().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Vec<AlertRecord>>> {
        self.records
            .lock()
            .map_err(|_| anyhow!("alert history lock poisoned"))
    }
}

impl AlertHistory for InMemoryAlertHistory {
    fn exists(&self, phone: &str, hazard_id: HazardId, since: DateTime<Utc>) -> Result<bool> {
        Ok(self.lock()?.iter().any(|r| r.matches(phone, hazard_id, since)))
    }

    fn record(
        &self,
        phone: &str,
        hazard_id: HazardId,
        channel: Channel,
        sent_at: DateTime<Utc>,
    ) -> Result<AlertRecord> {
        let record = new_record(phone, hazard_id, channel, sent_at);
        self.lock()?.push(record.clone());
        Ok(record)
    }

    fn record_if_absent(
        &self,
        phone: &str,
        hazard_id: HazardId,
        channel: Channel,
        since: DateTime<Utc>,
        sent_at: DateTime<Utc>,
    ) -> Result<Option<AlertRecord>> {
        let mut records = self.lock()?;
        if records.iter().any(|r| r.matches(phone, hazard_id, since)) {
            return Ok(None);
        }
        let record = new_record(phone, hazard_id, channel, sent_at);
        records.push(record.clone());
        Ok(Some(record))
    }

    fn recent(&self, phone: Option<&str>, limit: usize) -> Result<Vec<AlertRecord>> {
        Ok(tail(self.lock()?.clone(), phone, limit))
    }
}

/// JSONL 文件历史：`<data_dir>/alert_history.jsonl`
///
/// 所有写入都在文件独占锁内完成，多进程共享同一文件时检查与写入仍是原子的
pub struct JsonlAlertHistory {
    path: PathBuf,
}

impl JsonlAlertHistory {
    pub const FILE_NAME: &'static str = "alert_history.jsonl";

    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn in_dir(data_dir: &Path) -> Self {
        Self::new(data_dir.join(Self::FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn open_locked(&self) -> Result<File> {
        use fs2::FileExt;

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&self.path)?;
        file.lock_exclusive()?;
        Ok(file)
    }

    /// 读取全部记录，跳过无法解析的行
    fn read_records(file: &File) -> Vec<AlertRecord> {
        BufReader::new(file)
            .lines()
            .filter_map(|line| line.ok())
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| serde_json::from_str(&line).ok())
            .collect()
    }

    fn append(mut file: &File, record: &AlertRecord) -> Result<()> {
        writeln!(file, "{}", serde_json::to_string(record)?)?;
        file.flush()?;
        Ok(())
    }
}

impl AlertHistory for JsonlAlertHistory {
    fn exists(&self, phone: &str, hazard_id: HazardId, since: DateTime<Utc>) -> Result<bool> {
        if !self.path.exists() {
            return Ok(false);
        }
        let file = File::open(&self.path)?;
        Ok(Self::read_records(&file)
            .iter()
            .any(|r| r.matches(phone, hazard_id, since)))
    }

    fn record(
        &self,
        phone: &str,
        hazard_id: HazardId,
        channel: Channel,
        sent_at: DateTime<Utc>,
    ) -> Result<AlertRecord> {
        use fs2::FileExt;

        let file = self.open_locked()?;
        let record = new_record(phone, hazard_id, channel, sent_at);
        let result = Self::append(&file, &record);
        file.unlock()?;
        result.map(|_| record)
    }

    fn record_if_absent(
        &self,
        phone: &str,
        hazard_id: HazardId,
        channel: Channel,
        since: DateTime<Utc>,
        sent_at: DateTime<Utc>,
    ) -> Result<Option<AlertRecord>> {
        use fs2::FileExt;

        let file = self.open_locked()?;
        if Self::read_records(&file)
            .iter()
            .any(|r| r.matches(phone, hazard_id, since))
        {
            file.unlock()?;
            return Ok(None);
        }

        let record = new_record(phone, hazard_id, channel, sent_at);
        let result = Self::append(&file, &record);
        file.unlock()?;
        result.map(|_| Some(record))
    }

    fn recent(&self, phone: Option<&str>, limit: usize) -> Result<Vec<AlertRecord>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let file = File::open(&self.path)?;
        Ok(tail(Self::read_records(&file), phone, limit))
    }
}

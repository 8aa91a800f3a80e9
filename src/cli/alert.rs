//! Alert 命令 - 为司机运行提醒流水线（单个或批量）
//!
//! 传输层使用阻塞 HTTP 客户端，引擎的创建、使用和释放都放在 blocking 线程中。

use anyhow::{anyhow, Context, Result};
use clap::Args;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{info, warn};

use super::output::{format_output, format_report};
use crate::config::Config;
use crate::engine::{AlertEngine, AlertReport};
use crate::geo::{format_distance, haversine_distance};
use crate::notification::NotificationDispatcher;

/// Alert 命令参数
#[derive(Args)]
pub struct AlertArgs {
    /// 司机手机号（如 +254712345678）
    #[arg(long)]
    pub phone: String,

    /// 纬度
    #[arg(long, allow_hyphen_values = true)]
    pub lat: f64,

    /// 经度
    #[arg(long, allow_hyphen_values = true)]
    pub lon: f64,

    /// 搜索半径（米），默认取配置
    #[arg(long)]
    pub radius: Option<f64>,

    /// 只打印不发送
    #[arg(long)]
    pub dry_run: bool,

    /// 输出 JSON 格式
    #[arg(long)]
    pub json: bool,
}

/// Batch 命令参数
#[derive(Args)]
pub struct BatchArgs {
    /// 司机位置文件（JSON 数组：phone/latitude/longitude/radius_meters）
    pub file: PathBuf,

    /// 只打印不发送
    #[arg(long)]
    pub dry_run: bool,

    /// 输出 JSON 格式
    #[arg(long)]
    pub json: bool,
}

/// Distance 命令参数
#[derive(Args)]
pub struct DistanceArgs {
    #[arg(allow_hyphen_values = true)]
    pub lat1: f64,
    #[arg(allow_hyphen_values = true)]
    pub lon1: f64,
    #[arg(allow_hyphen_values = true)]
    pub lat2: f64,
    #[arg(allow_hyphen_values = true)]
    pub lon2: f64,

    /// 输出 JSON 格式
    #[arg(long)]
    pub json: bool,
}

/// 批量文件中的一位司机
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriverPosition {
    pub phone: String,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub radius_meters: Option<f64>,
}

/// 批量结果中的一项
#[derive(Debug, Serialize)]
pub struct BatchEntry {
    pub phone: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<AlertReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
struct DistanceOutput {
    meters: f64,
    formatted: String,
}

fn build_engine(config: &Config, dry_run: bool) -> AlertEngine {
    let (sms, voice) = config.build_channels();
    let dispatcher = NotificationDispatcher::new(sms, voice, config.fatigue_guard()).with_dry_run(dry_run);
    AlertEngine::new(Arc::new(config.hazard_store()), dispatcher, config.engine_config())
}

/// 处理 alert 命令
pub async fn handle_alert(args: AlertArgs, config: Config) -> Result<()> {
    let json = args.json;
    let report = tokio::task::spawn_blocking(move || -> Result<AlertReport> {
        let engine = build_engine(&config, args.dry_run);
        Ok(engine.run(&args.phone, args.lat, args.lon, args.radius)?)
    })
    .await
    .map_err(|e| anyhow!("alert task failed: {}", e))??;

    println!("{}", format_output(&report, json, format_report));
    Ok(())
}

/// 处理 batch 命令：每位司机一个 blocking 任务，共享同一份历史
pub async fn handle_batch(args: BatchArgs, config: Config) -> Result<()> {
    let content = tokio::fs::read_to_string(&args.file)
        .await
        .with_context(|| format!("reading {}", args.file.display()))?;
    let drivers: Vec<DriverPosition> = serde_json::from_str(&content)
        .with_context(|| format!("parsing {}", args.file.display()))?;
    info!(drivers = drivers.len(), "Starting batch run");

    let dry_run = args.dry_run;
    let engine = tokio::task::spawn_blocking(move || Arc::new(build_engine(&config, dry_run)))
        .await
        .map_err(|e| anyhow!("engine setup failed: {}", e))?;

    let mut tasks = JoinSet::new();
    for (index, driver) in drivers.into_iter().enumerate() {
        let engine = engine.clone();
        tasks.spawn_blocking(move || {
            let result = engine.run(&driver.phone, driver.latitude, driver.longitude, driver.radius_meters);
            (index, driver.phone, result)
        });
    }

    let mut entries = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        let (index, phone, result) = joined.map_err(|e| anyhow!("batch task failed: {}", e))?;
        let entry = match result {
            Ok(report) => BatchEntry {
                phone,
                report: Some(report),
                error: None,
            },
            Err(e) => {
                warn!(phone = %phone, error = %e, "Batch entry failed");
                BatchEntry {
                    phone,
                    report: None,
                    error: Some(e.to_string()),
                }
            }
        };
        entries.push((index, entry));
    }
    entries.sort_by_key(|(index, _)| *index);
    let entries: Vec<BatchEntry> = entries.into_iter().map(|(_, entry)| entry).collect();

    // 阻塞客户端不能在异步上下文中释放
    tokio::task::spawn_blocking(move || drop(engine))
        .await
        .map_err(|e| anyhow!("engine teardown failed: {}", e))?;

    println!(
        "{}",
        format_output(&entries, args.json, |entries| {
            entries
                .iter()
                .map(|entry| match (&entry.report, &entry.error) {
                    (Some(report), _) => format_report(report),
                    (None, Some(error)) => format!("{}: error: {}", entry.phone, error),
                    (None, None) => format!("{}: no result", entry.phone),
                })
                .collect::<Vec<_>>()
                .join("\n")
        })
    );
    Ok(())
}

/// 处理 distance 命令
pub fn handle_distance(args: DistanceArgs) -> Result<()> {
    let meters = haversine_distance(args.lat1, args.lon1, args.lat2, args.lon2);
    let output = DistanceOutput {
        meters,
        formatted: format_distance(meters),
    };
    println!("{}", format_output(&output, args.json, |o| o.formatted.clone()));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_driver_file_radius_optional() {
        let drivers: Vec<DriverPosition> = serde_json::from_str(
            r#"[{"phone":"+254712345678","latitude":-1.29,"longitude":36.82},
                {"phone":"+254712345679","latitude":-1.30,"longitude":36.80,"radius_meters":500}]"#,
        )
        .unwrap();
        assert_eq!(drivers[0].radius_meters, None);
        assert_eq!(drivers[1].radius_meters, Some(500.0));
    }
}

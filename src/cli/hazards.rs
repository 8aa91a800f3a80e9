//! Hazards / History 命令 - 查看与维护本地数据文件

use anyhow::{anyhow, Result};
use chrono::{Duration, Utc};
use clap::{Args, Subcommand};

use super::output::format_output;
use crate::config::Config;
use crate::hazard::{HazardStore, HazardType, Severity};
use crate::notification::AlertHistory;

#[derive(Subcommand)]
pub enum HazardsCommand {
    /// 列出所有危险
    List {
        /// 输出 JSON 格式
        #[arg(long)]
        json: bool,
    },
    /// 新增一条危险
    Add(AddHazardArgs),
}

#[derive(Args)]
pub struct AddHazardArgs {
    /// 类型：accident, bad_road, pedestrians, blackspot
    #[arg(long = "type")]
    pub hazard_type: HazardType,

    /// 严重度 1-5
    #[arg(long)]
    pub severity: u8,

    #[arg(long, allow_hyphen_values = true)]
    pub lat: f64,

    #[arg(long, allow_hyphen_values = true)]
    pub lon: f64,

    /// 多少小时后过期
    #[arg(long)]
    pub expires_in_hours: Option<i64>,

    /// 输出 JSON 格式
    #[arg(long)]
    pub json: bool,
}

/// History 命令参数
#[derive(Args)]
pub struct HistoryArgs {
    /// 只看某个号码
    #[arg(long)]
    pub phone: Option<String>,

    /// 显示最近 N 条
    #[arg(long, short, default_value = "20")]
    pub limit: usize,

    /// 输出 JSON 格式
    #[arg(long)]
    pub json: bool,
}

/// 处理 hazards 命令
pub fn handle_hazards(command: HazardsCommand, config: &Config) -> Result<()> {
    let store = config.hazard_store();
    match command {
        HazardsCommand::List { json } => {
            let hazards = store.list_all()?;
            println!(
                "{}",
                format_output(&hazards, json, |hazards| {
                    if hazards.is_empty() {
                        return format!("No hazards in {}", store.path().display());
                    }
                    hazards
                        .iter()
                        .map(|h| format!("#{} {} severity {}", h.id, h, h.severity))
                        .collect::<Vec<_>>()
                        .join("\n")
                })
            );
        }
        HazardsCommand::Add(args) => {
            let severity = Severity::new(args.severity)?;
            if !(-90.0..=90.0).contains(&args.lat) || !(-180.0..=180.0).contains(&args.lon) {
                return Err(anyhow!("coordinates out of range: ({}, {})", args.lat, args.lon));
            }
            let expires_at = args.expires_in_hours.map(|h| Utc::now() + Duration::hours(h));
            let hazard = store.add(args.hazard_type, severity, args.lat, args.lon, expires_at)?;
            println!(
                "{}",
                format_output(&hazard, args.json, |h| format!("Added #{}: {}", h.id, h))
            );
        }
    }
    Ok(())
}

/// 处理 history 命令
pub fn handle_history(args: HistoryArgs, config: &Config) -> Result<()> {
    let records = config.alert_history().recent(args.phone.as_deref(), args.limit)?;
    println!(
        "{}",
        format_output(&records, args.json, |records| {
            if records.is_empty() {
                return "No alerts sent".to_string();
            }
            records
                .iter()
                .map(|r| {
                    format!(
                        "{} {} hazard #{} via {}",
                        r.sent_at.format("%Y-%m-%d %H:%M:%S"),
                        r.phone_number,
                        r.hazard_id,
                        r.channel
                    )
                })
                .collect::<Vec<_>>()
                .join("\n")
        })
    );
    Ok(())
}

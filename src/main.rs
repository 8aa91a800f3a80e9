//! SafeRoute CLI
//!
//! 道路危险提醒：为司机查找附近危险并发送短信/语音提醒

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::debug;
use tracing_subscriber::{fmt, EnvFilter};

use saferoute::cli::{
    handle_alert, handle_batch, handle_distance, handle_hazards, handle_history, handle_ussd,
    handle_voice_xml, AlertArgs, BatchArgs, DistanceArgs, HazardsCommand, HistoryArgs, UssdArgs,
    VoiceXmlArgs,
};
use saferoute::Config;

#[derive(Parser)]
#[command(name = "saferoute")]
#[command(about = "SafeRoute - 道路危险提醒（短信/语音）")]
#[command(version)]
struct Cli {
    /// 配置文件路径（默认 ~/.config/saferoute/config.json）
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 为一位司机运行提醒流水线
    Alert(AlertArgs),
    /// 批量为多位司机运行提醒流水线
    Batch(BatchArgs),
    /// 计算两点间距离
    Distance(DistanceArgs),
    /// 管理危险数据
    Hazards {
        #[command(subcommand)]
        command: HazardsCommand,
    },
    /// 查看已发送的提醒
    History(HistoryArgs),
    /// 模拟 USSD 上报流程
    Ussd(UssdArgs),
    /// 输出语音回调 XML
    VoiceXml(VoiceXmlArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    // 通过 RUST_LOG 控制日志级别，默认 info；日志写 stderr，stdout 留给 --json 输出
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("saferoute=info"));

    fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .init();

    let cli = Cli::parse();

    // distance / voice-xml 不需要配置
    let load_config = || -> Result<Config> {
        let config = Config::load(cli.config.as_deref())?;
        debug!(data_dir = %config.data_dir().display(), "Config loaded");
        Ok(config)
    };

    match cli.command {
        Commands::Alert(args) => handle_alert(args, load_config()?).await?,
        Commands::Batch(args) => handle_batch(args, load_config()?).await?,
        Commands::Distance(args) => handle_distance(args)?,
        Commands::Hazards { command } => handle_hazards(command, &load_config()?)?,
        Commands::History(args) => handle_history(args, &load_config()?)?,
        Commands::Ussd(args) => handle_ussd(args, &load_config()?)?,
        Commands::VoiceXml(args) => handle_voice_xml(args)?,
    }

    Ok(())
}

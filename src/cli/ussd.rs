//! USSD / voice-xml 命令 - 本地模拟网关请求

use anyhow::{anyhow, Result};
use clap::Args;
use serde::Serialize;
use std::sync::Arc;

use super::output::format_output;
use crate::config::Config;
use crate::hazard::HazardType;
use crate::notification::{voice_callback_xml, voice_prompt};
use crate::reporting::UssdMenu;

/// USSD 命令参数
#[derive(Args)]
pub struct UssdArgs {
    /// 拨号的手机号
    #[arg(long)]
    pub phone: String,

    /// 完整按键序列，如 `1*2*1`；依次模拟 "", "1", "1*2", "1*2*1" 四次请求
    #[arg(default_value = "")]
    pub input: String,

    /// 输出 JSON 格式
    #[arg(long)]
    pub json: bool,
}

/// voice-xml 命令参数
#[derive(Args)]
pub struct VoiceXmlArgs {
    /// 按危险类型生成播报内容
    #[arg(long = "type", conflicts_with = "message")]
    pub hazard_type: Option<HazardType>,

    /// 自定义播报内容
    #[arg(long)]
    pub message: Option<String>,
}

#[derive(Debug, Serialize)]
struct UssdStep {
    text: String,
    response: String,
}

/// 把完整输入展开成网关的逐次请求文本
pub fn ussd_steps(input: &str) -> Vec<String> {
    let mut steps = vec![String::new()];
    let mut current = String::new();
    for part in input.split('*').filter(|p| !p.is_empty()) {
        if !current.is_empty() {
            current.push('*');
        }
        current.push_str(part);
        steps.push(current.clone());
    }
    steps
}

/// 处理 ussd 命令
pub fn handle_ussd(args: UssdArgs, config: &Config) -> Result<()> {
    let menu = UssdMenu::new(config.session_store(), Arc::new(config.report_store()))
        .with_location(config.report_location());

    let steps: Vec<UssdStep> = ussd_steps(args.input.trim())
        .into_iter()
        .map(|text| {
            let response = menu.handle(&args.phone, &text);
            UssdStep { text, response }
        })
        .collect();

    println!(
        "{}",
        format_output(&steps, args.json, |steps| {
            steps
                .iter()
                .map(|s| format!("> {:?}\n{}", s.text, s.response))
                .collect::<Vec<_>>()
                .join("\n\n")
        })
    );
    Ok(())
}

/// 处理 voice-xml 命令
pub fn handle_voice_xml(args: VoiceXmlArgs) -> Result<()> {
    let message = match (args.message, args.hazard_type) {
        (Some(message), _) => message,
        (None, Some(hazard_type)) => voice_prompt(hazard_type),
        (None, None) => return Err(anyhow!("either --type or --message is required")),
    };
    println!("{}", voice_callback_xml(&message));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ussd_steps() {
        assert_eq!(ussd_steps(""), vec![""]);
        assert_eq!(ussd_steps("1*2*1"), vec!["", "1", "1*2", "1*2*1"]);
    }
}

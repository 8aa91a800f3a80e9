//! Africa's Talking 渠道 - 短信与语音外呼
//!
//! 短信：`POST /version1/messaging`（表单 username/to/message/from）
//! 语音：`POST /call`（表单 username/from/to），播报内容由语音回调地址返回
//! （见 `formatter::voice_callback_xml`）。

use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::notification::channel::{Channel, NotificationChannel, SendResult};

const SMS_URL: &str = "https://api.africastalking.com/version1/messaging";
const SMS_SANDBOX_URL: &str = "https://api.sandbox.africastalking.com/version1/messaging";
const VOICE_URL: &str = "https://voice.africastalking.com/call";
const VOICE_SANDBOX_URL: &str = "https://voice.sandbox.africastalking.com/call";

/// 默认超时（秒）
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Africa's Talking 配置
#[derive(Debug, Clone)]
pub struct AfricasTalkingConfig {
    /// 账号用户名（沙箱为 "sandbox"）
    pub username: String,
    /// API key
    pub api_key: String,
    /// 短信发送方 ID（可选）
    pub sender_id: Option<String>,
    /// 外呼使用的虚拟号码
    pub voice_number: Option<String>,
    /// 是否使用沙箱环境
    pub sandbox: bool,
    /// 请求超时（秒）
    pub timeout_secs: u64,
}

impl AfricasTalkingConfig {
    pub fn new(username: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            api_key: api_key.into(),
            sender_id: None,
            voice_number: None,
            sandbox: false,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    fn sms_url(&self) -> &'static str {
        if self.sandbox {
            SMS_SANDBOX_URL
        } else {
            SMS_URL
        }
    }

    fn voice_url(&self) -> &'static str {
        if self.sandbox {
            VOICE_SANDBOX_URL
        } else {
            VOICE_URL
        }
    }
}

/// 共享的 HTTP 客户端
pub struct AfricasTalkingClient {
    client: reqwest::blocking::Client,
    config: AfricasTalkingConfig,
}

impl AfricasTalkingClient {
    pub fn new(config: AfricasTalkingConfig) -> Result<Self> {
        if config.username.is_empty() || config.api_key.is_empty() {
            return Err(anyhow!("Africa's Talking username and api_key are required"));
        }

        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| anyhow!("Cannot create HTTP client: {}", e))?;

        Ok(Self { client, config })
    }

    /// 创建短信和语音两个渠道，共用同一个客户端
    pub fn into_channels(self) -> (AfricasTalkingSms, AfricasTalkingVoice) {
        let shared = Arc::new(self);
        (
            AfricasTalkingSms {
                client: shared.clone(),
            },
            AfricasTalkingVoice { client: shared },
        )
    }

    fn post_form(&self, url: &str, form: &[(&str, &str)]) -> Result<(reqwest::StatusCode, String)> {
        let response = self
            .client
            .post(url)
            .header("apiKey", &self.config.api_key)
            .header("Accept", "application/json")
            .form(form)
            .send()
            .map_err(|e| anyhow!("HTTP request failed: {}", e))?;

        let status = response.status();
        let body = response.text().unwrap_or_default();
        Ok((status, body))
    }
}

/// 短信渠道
pub struct AfricasTalkingSms {
    client: Arc<AfricasTalkingClient>,
}

impl NotificationChannel for AfricasTalkingSms {
    fn name(&self) -> &str {
        "africastalking_sms"
    }

    fn kind(&self) -> Channel {
        Channel::Sms
    }

    fn send(&self, phone: &str, message: &str) -> Result<SendResult> {
        let config = &self.client.config;
        let mut form = vec![
            ("username", config.username.as_str()),
            ("to", phone),
            ("message", message),
        ];
        if let Some(sender_id) = config.sender_id.as_deref() {
            form.push(("from", sender_id));
        }

        let (status, body) = self.client.post_form(config.sms_url(), &form)?;
        if !status.is_success() {
            warn!(channel = "sms", status = %status, "SMS request rejected");
            return Ok(SendResult::Failed(format!("HTTP {}: {}", status, body.trim())));
        }

        let result = parse_sms_response(&body);
        match &result {
            SendResult::Sent(response) => info!(channel = "sms", phone = %phone, response = %response, "SMS sent"),
            other => warn!(channel = "sms", phone = %phone, result = ?other, "SMS not delivered"),
        }
        Ok(result)
    }
}

/// 语音渠道
pub struct AfricasTalkingVoice {
    client: Arc<AfricasTalkingClient>,
}

impl NotificationChannel for AfricasTalkingVoice {
    fn name(&self) -> &str {
        "africastalking_voice"
    }

    fn kind(&self) -> Channel {
        Channel::Voice
    }

    fn send(&self, phone: &str, message: &str) -> Result<SendResult> {
        let config = &self.client.config;
        let Some(from) = config.voice_number.as_deref() else {
            return Ok(SendResult::Failed(
                "transport unavailable: voice number not configured".to_string(),
            ));
        };

        debug!(channel = "voice", phone = %phone, prompt = %message, "Placing voice call");
        let form = [
            ("username", config.username.as_str()),
            ("from", from),
            ("to", phone),
        ];

        let (status, body) = self.client.post_form(config.voice_url(), &form)?;
        if !status.is_success() {
            warn!(channel = "voice", status = %status, "Voice request rejected");
            return Ok(SendResult::Failed(format!("HTTP {}: {}", status, body.trim())));
        }

        let result = parse_voice_response(&body);
        match &result {
            SendResult::Sent(response) => info!(channel = "voice", phone = %phone, response = %response, "Voice call queued"),
            other => warn!(channel = "voice", phone = %phone, result = ?other, "Voice call not placed"),
        }
        Ok(result)
    }
}

#[derive(Debug, Deserialize)]
struct SmsResponse {
    #[serde(rename = "SMSMessageData")]
    data: SmsMessageData,
}

#[derive(Debug, Deserialize)]
struct SmsMessageData {
    #[serde(rename = "Message", default)]
    message: String,
    #[serde(rename = "Recipients", default)]
    recipients: Vec<SmsRecipient>,
}

#[derive(Debug, Deserialize)]
struct SmsRecipient {
    #[serde(default)]
    status: String,
    #[serde(rename = "messageId", default)]
    message_id: String,
}

/// 解析短信接口响应：首个接收方状态为 Success 视为成功
fn parse_sms_response(body: &str) -> SendResult {
    let parsed: SmsResponse = match serde_json::from_str(body) {
        Ok(p) => p,
        Err(e) => return SendResult::Failed(format!("unexpected SMS response: {}", e)),
    };

    match parsed.data.recipients.first() {
        Some(r) if r.status == "Success" => {
            SendResult::Sent(format!("{} ({})", parsed.data.message, r.message_id))
        }
        Some(r) => SendResult::Failed(format!("recipient rejected: {}", r.status)),
        None => SendResult::Failed(format!("no recipients: {}", parsed.data.message)),
    }
}

#[derive(Debug, Deserialize)]
struct VoiceResponse {
    #[serde(default)]
    entries: Vec<VoiceEntry>,
    #[serde(rename = "errorMessage", default)]
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VoiceEntry {
    #[serde(default)]
    status: String,
    #[serde(rename = "sessionId", default)]
    session_id: Option<String>,
}

/// 解析语音接口响应：首个条目状态为 Queued 视为成功
fn parse_voice_response(body: &str) -> SendResult {
    let parsed: VoiceResponse = match serde_json::from_str(body) {
        Ok(p) => p,
        Err(e) => return SendResult::Failed(format!("unexpected voice response: {}", e)),
    };

    match parsed.entries.first() {
        Some(e) if e.status == "Queued" => SendResult::Sent(format!(
            "call queued ({})",
            e.session_id.as_deref().unwrap_or("no session id")
        )),
        Some(e) => SendResult::Failed(format!("call rejected: {}", e.status)),
        None => SendResult::Failed(format!(
            "call failed: {}",
            parsed.error_message.as_deref().unwrap_or("no entries")
        )),
    }
}

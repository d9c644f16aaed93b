// src/welcome.rs - 欢迎语（外部 AI 服务），不可用时降级到固定文案

use anyhow::{anyhow, Result};
use std::time::Duration;
use tokio::process::Command;

/// 服务返回空内容时的文案
pub const EMPTY_WELCOME: &str = "Welcome! We're glad you're here. Scan to connect.";
/// 服务出错或超时时的文案
pub const OFFLINE_WELCOME: &str = "Welcome to our home! Scan the QR code below to connect to our guest WiFi.";
/// 卡片上最多显示的字符数
const MAX_CHARS: usize = 120;

#[allow(async_fn_in_trait)]
pub trait WelcomeSource {
    async fn welcome(&self, ssid: &str) -> Result<String>;
}

/// 发给生成服务的提示词
pub fn prompt(ssid: &str) -> String {
    format!(
        "Create a short, warm, and friendly welcome message for a guest using my WiFi network named \"{ssid}\". \
         Keep it under 15 words. Example: \"Welcome home! Relax and stay connected with our high-speed guest network.\""
    )
}

/// 调用外部命令生成欢迎语，提示词作为最后一个参数，取 stdout
#[derive(Debug, Clone)]
pub struct CommandWelcome {
    program: String,
    args: Vec<String>,
}

impl CommandWelcome {
    /// argv 为空时返回 None（未配置）
    pub fn from_argv(argv: &[String]) -> Option<Self> {
        let (program, args) = argv.split_first()?;
        Some(Self {
            program: program.clone(),
            args: args.to_vec(),
        })
    }
}

impl WelcomeSource for CommandWelcome {
    async fn welcome(&self, ssid: &str) -> Result<String> {
        let out = Command::new(&self.program)
            .args(&self.args)
            .arg(prompt(ssid))
            .kill_on_drop(true)
            .output()
            .await?;
        if !out.status.success() {
            let stderr = String::from_utf8_lossy(&out.stderr);
            return Err(anyhow!(
                "{} 退出码 {:?}: {}",
                self.program,
                out.status.code(),
                stderr.lines().last().unwrap_or("")
            ));
        }
        Ok(String::from_utf8_lossy(&out.stdout).to_string())
    }
}

/// 固定文案，测试或离线时使用
#[derive(Debug, Clone)]
pub struct StaticWelcome(pub String);

impl WelcomeSource for StaticWelcome {
    async fn welcome(&self, _ssid: &str) -> Result<String> {
        Ok(self.0.clone())
    }
}

/// 取欢迎语，任何失败都降级为固定文案，绝不返回错误
pub async fn welcome_or_fallback<W: WelcomeSource>(source: &W, ssid: &str, timeout: Duration) -> String {
    match tokio::time::timeout(timeout, source.welcome(ssid)).await {
        Ok(Ok(text)) => match clean(&text) {
            Some(t) => t,
            None => EMPTY_WELCOME.to_string(),
        },
        Ok(Err(e)) => {
            tracing::warn!(error = %e, "欢迎语生成失败，使用默认文案");
            OFFLINE_WELCOME.to_string()
        }
        Err(_) => {
            tracing::warn!(timeout_secs = timeout.as_secs(), "欢迎语生成超时，使用默认文案");
            OFFLINE_WELCOME.to_string()
        }
    }
}

/// 取第一段非空文本，去掉外层引号并截断
fn clean(text: &str) -> Option<String> {
    let line = text.lines().map(str::trim).find(|l| !l.is_empty())?;
    let line = line.trim_matches(|c| c == '"' || c == '“' || c == '”').trim();
    if line.is_empty() {
        return None;
    }
    Some(line.chars().take(MAX_CHARS).collect())
}

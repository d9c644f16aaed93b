// src/types.rs - 核心数据类型

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// 加密类型（WIFI-URI 只区分这三种）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Security {
    Wpa,
    Wep,
    Open,
}

impl Security {
    pub fn needs_password(&self) -> bool {
        !matches!(self, Security::Open)
    }

    /// 载荷中 `T:` 字段的值，开放网络没有该字段
    pub fn wifi_token(&self) -> Option<&'static str> {
        match self {
            Security::Wpa => Some("WPA"),
            Security::Wep => Some("WEP"),
            Security::Open => None,
        }
    }
}

impl std::fmt::Display for Security {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Security::Wpa => write!(f, "WPA"),
            Security::Wep => write!(f, "WEP"),
            Security::Open => write!(f, "nopass"),
        }
    }
}

impl From<&str> for Security {
    /// 宽松解析：nmcli 的 "WPA2 WPA3"、表单的 "nopass" 都能识别
    fn from(s: &str) -> Self {
        let up = s.trim().to_uppercase();
        if up.contains("WPA") || up.contains("SAE") {
            Security::Wpa
        } else if up.contains("WEP") {
            Security::Wep
        } else {
            Security::Open
        }
    }
}

impl std::str::FromStr for Security {
    type Err = String;

    /// 严格解析，供命令行参数使用
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "WPA" | "WPA2" | "WPA3" => Ok(Security::Wpa),
            "WEP" => Ok(Security::Wep),
            "NOPASS" | "OPEN" | "NONE" => Ok(Security::Open),
            other => Err(format!("未知加密类型: {other}（可选 WPA / WEP / nopass）")),
        }
    }
}

/// 表单提交的网络凭据，核心只读不改
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkCredential {
    pub ssid: String,
    pub password: Option<String>,
    pub security: Security,
    pub hidden: bool,
}

impl NetworkCredential {
    pub fn new(ssid: impl Into<String>, password: Option<String>, security: Security, hidden: bool) -> Self {
        Self {
            ssid: ssid.into(),
            password,
            security,
            hidden,
        }
    }

    /// 表单层的前置校验：SSID 非空，非开放网络必须有密码
    pub fn validate(&self) -> Result<()> {
        if self.ssid.is_empty() {
            return Err(Error::InvalidCredential("SSID 不能为空".into()));
        }
        if self.security.needs_password() && self.password.as_deref().unwrap_or("").is_empty() {
            return Err(Error::InvalidCredential(format!(
                "{} 网络必须填写密码",
                self.security
            )));
        }
        Ok(())
    }

    /// 实际参与编码的密码，开放网络一律忽略
    pub fn effective_password(&self) -> Option<&str> {
        if self.security.needs_password() {
            self.password.as_deref()
        } else {
            None
        }
    }
}

/// 卡片上哪些字段可见，只影响展示，不影响载荷
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayOptions {
    pub hide_ssid: bool,
    pub hide_password: bool,
}

/// 扫描到的单个接入点
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessPoint {
    pub ssid: String,
    pub security: Security,
    pub signal: u8, // 0–100
    pub in_use: bool,
}

impl AccessPoint {
    /// 列表显示用的单行文本
    pub fn display_line(&self) -> String {
        let lock = if self.security.needs_password() { "🔒" } else { "  " };
        let active = if self.in_use { "●" } else { " " };
        format!(
            "{active} {lock} {:<24} {:>6}  {:>3}%",
            self.ssid,
            self.security.to_string(),
            self.signal
        )
    }
}

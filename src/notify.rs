// src/notify.rs - 桌面通知，降级到日志

use crate::error::Error;
use std::path::Path;
use tokio::process::Command;

#[derive(Debug, Clone, Copy)]
pub enum Urgency {
    Low,
    Normal,
    Critical,
}

impl Urgency {
    fn as_arg(self) -> &'static str {
        match self {
            Urgency::Low => "low",
            Urgency::Normal => "normal",
            Urgency::Critical => "critical",
        }
    }
}

/// 发一条通知；notify-send 不可用或失败时写日志
pub async fn send(urgency: Urgency, title: &str, body: &str) {
    if !deliver("notify-send", urgency, title, body).await {
        match urgency {
            Urgency::Critical => tracing::error!(title, body, "通知"),
            _ => tracing::info!(title, body, "通知"),
        }
    }
}

/// 调用通知程序，返回是否送达
async fn deliver(program: &str, urgency: Urgency, title: &str, body: &str) -> bool {
    Command::new(program)
        .args(["-u", urgency.as_arg(), &format!("GuestPass: {title}"), body])
        .kill_on_drop(true)
        .status()
        .await
        .map(|s| s.success())
        .unwrap_or(false)
}

pub async fn normal(title: &str, body: &str) {
    send(Urgency::Normal, title, body).await
}

pub async fn critical(title: &str, body: &str) {
    send(Urgency::Critical, title, body).await
}

/// 导出成功
pub async fn exported(path: &Path) {
    normal("已导出", &path.display().to_string()).await;
}

/// 导出失败，并给出可替代的操作
pub async fn export_failed(err: &Error) {
    critical("导出失败", &format!("{err}\n{}", suggestion(err))).await;
}

/// 失败后给用户的建议
pub fn suggestion(err: &Error) -> &'static str {
    match err {
        Error::CaptureFailed(_) | Error::ExportFailed(_) => "可以改用 guestpass print 直接打印",
        Error::ExportInProgress => "请等待当前导出完成后重试",
        Error::CapacityExceeded { .. } => "请缩短网络名或密码，或降低纠错等级",
        Error::InvalidCredential(_) => "请检查网络名和密码",
        Error::PrintFailed(_) => "请改为导出 PNG 或 PDF 后手动打印",
        Error::Io(_) => "请检查输出目录是否可写",
    }
}

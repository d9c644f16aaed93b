// src/print.rs - 系统打印：打印前临时设置文档标题，结束后恢复

use crate::error::{Error, Result};
use std::path::Path;
use tokio::process::Command;

#[allow(async_fn_in_trait)]
pub trait PrintFacility {
    fn title(&self) -> String;
    fn set_title(&mut self, title: String);
    async fn print(&mut self, document: &Path) -> Result<()>;
}

/// 打印任务使用的标题
pub fn print_title(ssid: &str) -> String {
    format!("GuestPass {ssid}")
}

/// 设置临时标题 → 打印 → 恢复原标题（打印失败也会恢复）
pub async fn print_with_title<P: PrintFacility>(facility: &mut P, title: &str, document: &Path) -> Result<()> {
    let previous = facility.title();
    facility.set_title(title.to_string());
    let result = facility.print(document).await;
    facility.set_title(previous);

    match &result {
        Ok(()) => tracing::info!(document = %document.display(), "已提交打印"),
        Err(e) => tracing::warn!(error = %e, "打印失败"),
    }
    result
}

/// 通过 CUPS 的 `lp` 提交打印，标题作为任务名
#[derive(Debug, Clone)]
pub struct LpPrinter {
    program: String,
    title: String,
}

impl Default for LpPrinter {
    fn default() -> Self {
        Self::new("lp")
    }
}

impl LpPrinter {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            title: String::new(),
        }
    }
}

impl PrintFacility for LpPrinter {
    fn title(&self) -> String {
        self.title.clone()
    }

    fn set_title(&mut self, title: String) {
        self.title = title;
    }

    async fn print(&mut self, document: &Path) -> Result<()> {
        let mut cmd = Command::new(&self.program);
        if !self.title.is_empty() {
            cmd.args(["-t", &self.title]);
        }
        let out = cmd
            .arg("--")
            .arg(document)
            .output()
            .await
            .map_err(|e| Error::PrintFailed(format!("无法启动 {}: {e}", self.program)))?;

        if out.status.success() {
            Ok(())
        } else {
            let msg = String::from_utf8_lossy(&out.stderr)
                .lines()
                .last()
                .unwrap_or("未知错误")
                .to_string();
            Err(Error::PrintFailed(msg))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recording {
        title: String,
        seen: Vec<String>,
        fail: bool,
    }

    impl PrintFacility for Recording {
        fn title(&self) -> String {
            self.title.clone()
        }

        fn set_title(&mut self, title: String) {
            self.title = title;
        }

        async fn print(&mut self, _document: &Path) -> Result<()> {
            self.seen.push(self.title.clone());
            if self.fail {
                Err(Error::PrintFailed("paper jam".into()))
            } else {
                Ok(())
            }
        }
    }

    #[tokio::test]
    async fn title_is_transient() {
        let mut p = Recording { title: "Untitled".into(), ..Default::default() };
        print_with_title(&mut p, &print_title("Home_5G"), Path::new("card.pdf")).await.unwrap();
        assert_eq!(p.seen, vec!["GuestPass Home_5G"]);
        assert_eq!(p.title, "Untitled");
    }

    #[tokio::test]
    async fn title_is_restored_on_failure() {
        let mut p = Recording { title: "Untitled".into(), fail: true, ..Default::default() };
        let err = print_with_title(&mut p, "GuestPass x", Path::new("card.pdf")).await.unwrap_err();
        assert!(matches!(err, Error::PrintFailed(_)));
        assert_eq!(p.title, "Untitled");
    }

    #[tokio::test]
    async fn lp_exit_status_is_reported() {
        let mut ok = LpPrinter::new("true");
        assert!(print_with_title(&mut ok, "t", Path::new("/dev/null")).await.is_ok());

        let mut bad = LpPrinter::new("false");
        let err = print_with_title(&mut bad, "t", Path::new("/dev/null")).await.unwrap_err();
        assert!(matches!(err, Error::PrintFailed(_)));

        let mut missing = LpPrinter::new("guestpass-no-such-printer");
        assert!(print_with_title(&mut missing, "t", Path::new("/dev/null")).await.is_err());
    }
}

// src/config.rs - 配置加载，支持文件覆盖

use crate::capture::MAX_CAPTURE_SCALE;
use crate::export::PageUnit;
use crate::qr::ErrorCorrection;
use crate::raster::{RasterOptions, MAX_RASTER_PX};
use crate::scan::Discovery;
use anyhow::{anyhow, bail, Context, Result};
use image::{Rgb, Rgba};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// 二维码纠错等级
    pub error_correction: ErrorCorrection,
    /// 二维码目标边长（像素）
    pub target_resolution_px: u32,
    /// 静区模块数
    pub quiet_zone: u32,
    /// 深色模块颜色 (#rrggbb)
    pub dark_color: String,
    /// 浅色模块颜色 (#rrggbb)
    pub light_color: String,
    /// 截图倍率，打印建议 2–3
    pub capture_scale: f32,
    /// 截图时强制使用的卡片背景色
    pub card_background: String,
    /// JPEG 质量 0.0–1.0
    pub jpeg_quality: f32,
    /// PDF 页面单位
    pub page_unit: PageUnit,
    /// page_unit = "mm" 时的页面宽度，高度按卡片比例推出
    pub page_width_mm: f32,
    /// 导出目录，为空时用当前目录
    pub output_dir: Option<PathBuf>,
    /// 生成欢迎语的外部命令，如 ["llm", "-m", "fast"]；为空则不生成
    pub welcome_command: Vec<String>,
    /// 欢迎语超时（秒）
    pub welcome_timeout_secs: u64,
    /// 会话历史最多保留条数
    pub history_limit: usize,
    /// 附近网络的发现方式
    pub discovery: Discovery,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            error_correction: ErrorCorrection::Medium,
            target_resolution_px: 400,
            quiet_zone: 2,
            dark_color: "#000000".into(),
            light_color: "#ffffff".into(),
            capture_scale: 3.0,
            card_background: "#ffffff".into(),
            jpeg_quality: 0.8,
            page_unit: PageUnit::Px,
            page_width_mm: 148.0,
            output_dir: None,
            welcome_command: vec![],
            welcome_timeout_secs: 8,
            history_limit: 20,
            discovery: Discovery::Nmcli,
        }
    }
}

impl Config {
    /// 按优先级查找并加载配置文件
    pub fn load() -> Result<Self> {
        for path in config_candidates() {
            if path.exists() {
                return Self::load_from(&path);
            }
        }
        Ok(Config::default())
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("无法读取配置文件 {}", path.display()))?;
        let cfg: Config = toml::from_str(&text)
            .with_context(|| format!("配置文件格式错误 {}", path.display()))?;
        cfg.validate()?;
        tracing::debug!(path = %path.display(), "已加载配置");
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        parse_hex_color(&self.dark_color)?;
        parse_hex_color(&self.light_color)?;
        parse_hex_color(&self.card_background)?;
        if !(self.capture_scale.is_finite() && (1.0..=MAX_CAPTURE_SCALE).contains(&self.capture_scale)) {
            bail!("capture_scale 必须在 1 到 {MAX_CAPTURE_SCALE} 之间，当前为 {}", self.capture_scale);
        }
        if self.target_resolution_px > MAX_RASTER_PX {
            bail!("target_resolution_px 不能超过 {MAX_RASTER_PX}，当前为 {}", self.target_resolution_px);
        }
        if self.quiet_zone > 100 {
            bail!("quiet_zone 不能超过 100 个模块，当前为 {}", self.quiet_zone);
        }
        if !(self.jpeg_quality > 0.0 && self.jpeg_quality <= 1.0) {
            bail!("jpeg_quality 必须在 (0, 1] 之间，当前为 {}", self.jpeg_quality);
        }
        if !(self.page_width_mm.is_finite() && self.page_width_mm > 0.0) {
            bail!("page_width_mm 必须为正数");
        }
        Ok(())
    }

    pub fn raster_options(&self) -> Result<RasterOptions> {
        Ok(RasterOptions {
            target_px: self.target_resolution_px,
            quiet_zone: self.quiet_zone,
            dark: parse_hex_color(&self.dark_color)?,
            light: parse_hex_color(&self.light_color)?,
        })
    }

    pub fn background(&self) -> Result<Rgba<u8>> {
        let Rgb([r, g, b]) = parse_hex_color(&self.card_background)?;
        Ok(Rgba([r, g, b, 255]))
    }

    pub fn output_dir(&self) -> PathBuf {
        self.output_dir.clone().unwrap_or_else(|| PathBuf::from("."))
    }

    /// 返回会话历史文件路径（随登录会话清空）
    pub fn history_path() -> PathBuf {
        runtime_dir().join("guestpass-history.json")
    }
}

/// 解析 `#rrggbb`
pub fn parse_hex_color(s: &str) -> Result<Rgb<u8>> {
    let hex = s.trim().strip_prefix('#').unwrap_or(s.trim());
    if hex.len() != 6 || !hex.is_ascii() {
        return Err(anyhow!("颜色格式应为 #rrggbb: {s}"));
    }
    let channel = |i: usize| {
        u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| anyhow!("颜色格式应为 #rrggbb: {s}"))
    };
    Ok(Rgb([channel(0)?, channel(2)?, channel(4)?]))
}

fn runtime_dir() -> PathBuf {
    std::env::var("XDG_RUNTIME_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| std::env::temp_dir())
}

fn config_candidates() -> Vec<PathBuf> {
    let mut v = vec![];
    // 同目录下的 config.toml
    if let Ok(exe) = std::env::current_exe() {
        if let Some(dir) = exe.parent() {
            v.push(dir.join("config.toml"));
        }
    }
    // ~/.config/guestpass/config.toml
    if let Some(dir) = dirs::config_dir() {
        v.push(dir.join("guestpass/config.toml"));
    }
    v
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let cfg = Config::default();
        cfg.validate().unwrap();
        let opts = cfg.raster_options().unwrap();
        assert_eq!(opts, RasterOptions::default());
        assert_eq!(cfg.background().unwrap(), Rgba([255, 255, 255, 255]));
    }

    #[test]
    fn partial_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "error_correction = \"high\"\nquiet_zone = 4\npage_unit = \"mm\"\nwelcome_command = [\"echo\", \"hi\"]\n",
        )
        .unwrap();
        let cfg = Config::load_from(&path).unwrap();
        assert_eq!(cfg.error_correction, ErrorCorrection::High);
        assert_eq!(cfg.quiet_zone, 4);
        assert_eq!(cfg.page_unit, PageUnit::Mm);
        assert_eq!(cfg.welcome_command, vec!["echo", "hi"]);
        assert_eq!(cfg.target_resolution_px, 400);
    }

    #[test]
    fn rejects_bad_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "dark_color = \"black\"\n").unwrap();
        assert!(Config::load_from(&path).is_err());

        std::fs::write(&path, "jpeg_quality = 1.5\n").unwrap();
        assert!(Config::load_from(&path).is_err());

        std::fs::write(&path, "capture_scale = 0.5\n").unwrap();
        assert!(Config::load_from(&path).is_err());

        std::fs::write(&path, "capture_scale = 10000000.0\n").unwrap();
        assert!(Config::load_from(&path).is_err());

        std::fs::write(&path, "quiet_zone = 3000000000\n").unwrap();
        assert!(Config::load_from(&path).is_err());

        std::fs::write(&path, "target_resolution_px = 100000\n").unwrap();
        assert!(Config::load_from(&path).is_err());
    }

    #[test]
    fn parses_hex_colors() {
        assert_eq!(parse_hex_color("#1e293b").unwrap(), Rgb([0x1e, 0x29, 0x3b]));
        assert_eq!(parse_hex_color("FFFFFF").unwrap(), Rgb([255, 255, 255]));
        assert!(parse_hex_color("#fff").is_err());
        assert!(parse_hex_color("#gggggg").is_err());
    }
}

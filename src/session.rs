// src/session.rs - 单张卡片的导出会话：同一时间最多一个导出在进行

use crate::capture::{self, Renderer};
use crate::card::GuestCard;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::export::{self, PageSize, PageUnit, RasterFormat};
use crate::layout::Layout;
use image::Rgba;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportKind {
    Raster(RasterFormat),
    Pdf,
}

impl ExportKind {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportKind::Raster(f) => f.extension(),
            ExportKind::Pdf => "pdf",
        }
    }
}

/// 导出产物：完整字节 + 确定性的文件名
#[derive(Debug, Clone)]
pub struct ExportArtifact {
    pub kind: ExportKind,
    pub file_name: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExportSettings {
    pub scale: f32,
    pub background: Rgba<u8>,
    pub jpeg_quality: f32,
    pub page_unit: PageUnit,
    pub page_width_mm: f32,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            scale: 3.0,
            background: Rgba([255, 255, 255, 255]),
            jpeg_quality: export::DEFAULT_JPEG_QUALITY,
            page_unit: PageUnit::Px,
            page_width_mm: 148.0,
        }
    }
}

impl ExportSettings {
    pub fn from_config(cfg: &Config) -> anyhow::Result<Self> {
        Ok(Self {
            scale: cfg.capture_scale,
            background: cfg.background()?,
            jpeg_quality: cfg.jpeg_quality,
            page_unit: cfg.page_unit,
            page_width_mm: cfg.page_width_mm,
        })
    }
}

pub struct CardSession<R: Renderer> {
    card: GuestCard,
    layout: Layout,
    renderer: R,
    settings: ExportSettings,
    in_flight: Mutex<()>,
}

impl<R: Renderer> CardSession<R> {
    /// 使用默认卡片排版
    pub fn new(card: GuestCard, renderer: R, settings: ExportSettings) -> Self {
        let layout = card.layout();
        Self::with_layout(card, layout, renderer, settings)
    }

    /// 使用外部展示层给出的排版
    pub fn with_layout(card: GuestCard, layout: Layout, renderer: R, settings: ExportSettings) -> Self {
        Self {
            card,
            layout,
            renderer,
            settings,
            in_flight: Mutex::new(()),
        }
    }

    pub fn card(&self) -> &GuestCard {
        &self.card
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn is_exporting(&self) -> bool {
        self.in_flight.try_lock().is_err()
    }

    /// PDF 页面：px 单位直接用卡片逻辑尺寸，mm 单位按卡片比例推高度
    pub fn page_size(&self) -> PageSize {
        match self.settings.page_unit {
            PageUnit::Px => PageSize::px(self.layout.width as f32, self.layout.height as f32),
            PageUnit::Mm => PageSize::from_aspect(self.settings.page_width_mm, self.layout.aspect_ratio(), PageUnit::Mm),
        }
    }

    /// 导出到内存。已有导出进行中时立即拒绝，不排队、不并发
    pub async fn export(&self, kind: ExportKind) -> Result<ExportArtifact> {
        let _guard = self.acquire()?;
        self.run_export(kind).await
    }

    /// 导出并原子写入目录，返回文件路径
    pub async fn export_to(&self, kind: ExportKind, dir: &Path) -> Result<PathBuf> {
        let _guard = self.acquire()?;
        let artifact = self.run_export(kind).await?;
        export::save_artifact(dir, &artifact.file_name, &artifact.bytes)
    }

    fn acquire(&self) -> Result<tokio::sync::MutexGuard<'_, ()>> {
        self.in_flight.try_lock().map_err(|_| {
            tracing::warn!(ssid = %self.card.credential.ssid, "导出进行中，拒绝新的导出请求");
            Error::ExportInProgress
        })
    }

    async fn run_export(&self, kind: ExportKind) -> Result<ExportArtifact> {
        let snapshot = capture::capture(&self.renderer, &self.layout, self.settings.scale, self.settings.background).await?;
        let ssid = &self.card.credential.ssid;

        let bytes = match kind {
            ExportKind::Raster(format) => {
                let quality = self.settings.jpeg_quality;
                tokio::task::spawn_blocking(move || export::export_raster(&snapshot, format, Some(quality)))
                    .await
                    .map_err(|e| export::export_failed("编码线程", e))??
            }
            ExportKind::Pdf => {
                let page = self.page_size();
                let title = format!("GuestPass {ssid}");
                tokio::task::spawn_blocking(move || export::export_pdf(&snapshot, page, &title))
                    .await
                    .map_err(|e| export::export_failed("编码线程", e))??
            }
        };

        let file_name = export::artifact_file_name(ssid, kind.extension());
        tracing::info!(file = %file_name, bytes = bytes.len(), "导出完成");
        Ok(ExportArtifact { kind, file_name, bytes })
    }
}

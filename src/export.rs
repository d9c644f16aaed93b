// src/export.rs - 截图 → PNG / JPEG / PDF 文件

use crate::capture::CardSnapshot;
use crate::error::{Error, Result};
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageFormat};
use pdf_writer::{Content, Filter, Finish, Name, Pdf, Rect, Ref, TextStr};
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use std::path::{Path, PathBuf};

/// 文件名前缀
pub const FILE_PREFIX: &str = "GuestPass_";
/// 网络名清洗后为空时的占位名
pub const PLACEHOLDER_NAME: &str = "network";
/// 默认 JPEG 质量
pub const DEFAULT_JPEG_QUALITY: f32 = 0.8;
/// PDF 页面比例与截图比例允许的相对误差
const ASPECT_TOLERANCE: f32 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RasterFormat {
    Png,
    Jpeg,
}

impl RasterFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            RasterFormat::Png => "png",
            RasterFormat::Jpeg => "jpg",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageUnit {
    /// 1px = 0.75pt（96 dpi）
    #[default]
    Px,
    Mm,
}

impl PageUnit {
    fn to_points(self, v: f32) -> f32 {
        match self {
            PageUnit::Px => v * 0.75,
            PageUnit::Mm => v * 72.0 / 25.4,
        }
    }
}

/// PDF 物理页面尺寸
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageSize {
    pub width: f32,
    pub height: f32,
    pub unit: PageUnit,
}

impl PageSize {
    pub fn px(width: f32, height: f32) -> Self {
        Self { width, height, unit: PageUnit::Px }
    }

    pub fn mm(width: f32, height: f32) -> Self {
        Self { width, height, unit: PageUnit::Mm }
    }

    /// 给定宽度，按宽高比推出高度
    pub fn from_aspect(width: f32, aspect_ratio: f32, unit: PageUnit) -> Self {
        Self {
            width,
            height: width / aspect_ratio.max(f32::MIN_POSITIVE),
            unit,
        }
    }

    pub fn points(&self) -> (f32, f32) {
        (self.unit.to_points(self.width), self.unit.to_points(self.height))
    }
}

/// 截图编码为 PNG（无损）或 JPEG（quality 0.0–1.0，默认 0.8；PNG 忽略）
pub fn export_raster(snapshot: &CardSnapshot, format: RasterFormat, quality: Option<f32>) -> Result<Vec<u8>> {
    let bytes = match format {
        RasterFormat::Png => {
            let mut buf = Cursor::new(Vec::new());
            DynamicImage::ImageRgb8(snapshot.image.clone())
                .write_to(&mut buf, ImageFormat::Png)
                .map_err(|e| export_failed("PNG 编码", e))?;
            buf.into_inner()
        }
        RasterFormat::Jpeg => {
            let q = quality.unwrap_or(DEFAULT_JPEG_QUALITY);
            if !(q > 0.0 && q <= 1.0) {
                return Err(export_failed("JPEG 编码", format!("质量参数越界: {q}")));
            }
            let mut buf = Vec::new();
            let q = (q * 100.0).round().clamp(1.0, 100.0) as u8;
            JpegEncoder::new_with_quality(&mut buf, q)
                .encode_image(&snapshot.image)
                .map_err(|e| export_failed("JPEG 编码", e))?;
            buf
        }
    };
    tracing::debug!(bytes = bytes.len(), ?format, "截图已编码");
    Ok(bytes)
}

/// 单页 PDF，截图作为满版图片铺满 (width, height)。
/// 比例必须事先匹配；超出误差直接报错而不是拉伸。
pub fn export_pdf(snapshot: &CardSnapshot, page: PageSize, title: &str) -> Result<Vec<u8>> {
    let (w_pt, h_pt) = page.points();
    if !(w_pt.is_finite() && h_pt.is_finite() && w_pt > 0.0 && h_pt > 0.0) {
        return Err(export_failed("PDF 生成", format!("页面尺寸无效: {page:?}")));
    }
    let page_aspect = w_pt / h_pt;
    let snap_aspect = snapshot.aspect_ratio();
    if ((page_aspect - snap_aspect) / snap_aspect).abs() > ASPECT_TOLERANCE {
        return Err(export_failed(
            "PDF 生成",
            format!("页面比例 {page_aspect:.3} 与截图比例 {snap_aspect:.3} 不符"),
        ));
    }

    let catalog_id = Ref::new(1);
    let page_tree_id = Ref::new(2);
    let page_id = Ref::new(3);
    let image_id = Ref::new(4);
    let content_id = Ref::new(5);
    let info_id = Ref::new(6);
    let image_name = Name(b"Im1");

    let mut pdf = Pdf::new();
    pdf.catalog(catalog_id).pages(page_tree_id);
    pdf.pages(page_tree_id).kids([page_id]).count(1);
    pdf.document_info(info_id).title(TextStr(title));

    let mut pdf_page = pdf.page(page_id);
    pdf_page.media_box(Rect::new(0.0, 0.0, w_pt, h_pt));
    pdf_page.parent(page_tree_id);
    pdf_page.contents(content_id);
    pdf_page.resources().x_objects().pair(image_name, image_id);
    pdf_page.finish();

    // 原始 RGB 像素 zlib 压缩后以 FlateDecode 嵌入，保持无损
    let compressed = miniz_oxide::deflate::compress_to_vec_zlib(snapshot.image.as_raw(), 6);
    let mut image = pdf.image_xobject(image_id, &compressed);
    image.filter(Filter::FlateDecode);
    image.width(snapshot.width() as i32);
    image.height(snapshot.height() as i32);
    image.color_space().device_rgb();
    image.bits_per_component(8);
    image.finish();

    let mut content = Content::new();
    content.save_state();
    content.transform([w_pt, 0.0, 0.0, h_pt, 0.0, 0.0]);
    content.x_object(image_name);
    content.restore_state();
    pdf.stream(content_id, &content.finish());

    let bytes = pdf.finish();
    tracing::debug!(bytes = bytes.len(), w_pt, h_pt, "PDF 已生成");
    Ok(bytes)
}

/// 清洗网络名：只保留 [A-Za-z0-9 _-]，去首尾空白，空了用占位名
pub fn sanitize_name(ssid: &str) -> String {
    let kept: String = ssid
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, ' ' | '_' | '-'))
        .collect();
    let trimmed = kept.trim();
    if trimmed.is_empty() {
        PLACEHOLDER_NAME.to_string()
    } else {
        trimmed.to_string()
    }
}

/// `GuestPass_<name>.<ext>`
pub fn artifact_file_name(ssid: &str, extension: &str) -> String {
    format!("{FILE_PREFIX}{}.{extension}", sanitize_name(ssid))
}

/// 原子写：先写临时文件再 rename，调用方只会看到完整文件或没有文件
pub fn save_artifact(dir: &Path, file_name: &str, bytes: &[u8]) -> Result<PathBuf> {
    std::fs::create_dir_all(dir).map_err(|e| export_failed(&format!("创建目录 {}", dir.display()), e))?;
    let path = dir.join(file_name);
    let tmp = dir.join(format!(".{file_name}.tmp"));

    let written = std::fs::write(&tmp, bytes).and_then(|_| std::fs::rename(&tmp, &path));
    if let Err(e) = written {
        let _ = std::fs::remove_file(&tmp);
        tracing::error!(path = %path.display(), error = %e, "写入导出文件失败");
        return Err(Error::ExportFailed(format!("写入 {} 失败: {e}", path.display())));
    }
    tracing::info!(path = %path.display(), bytes = bytes.len(), "已保存");
    Ok(path)
}

/// 记录日志并返回 ExportFailed
pub(crate) fn export_failed(stage: &str, cause: impl std::fmt::Display) -> Error {
    tracing::error!(stage, cause = %cause, "导出失败");
    Error::ExportFailed(format!("{stage}: {cause}"))
}

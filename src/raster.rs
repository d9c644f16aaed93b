// src/raster.rs - 矩阵 → 位图

use crate::error::{Error, Result};
use crate::qr::SymbolMatrix;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use std::io::Cursor;

/// 每个模块至少 2 个物理像素，否则缩放后难以识别
pub const MIN_MODULE_PX: u32 = 2;
/// 输出位图单边上限
pub const MAX_RASTER_PX: u32 = 16384;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RasterOptions {
    /// 目标输出边长（像素），实际边长按模块对齐
    pub target_px: u32,
    /// 四周空白模块数，可为 0
    pub quiet_zone: u32,
    pub dark: Rgb<u8>,
    pub light: Rgb<u8>,
}

impl Default for RasterOptions {
    fn default() -> Self {
        Self {
            target_px: 400,
            quiet_zone: 2,
            dark: Rgb([0, 0, 0]),
            light: Rgb([255, 255, 255]),
        }
    }
}

/// 二维码位图及其像素尺寸
#[derive(Debug, Clone, PartialEq)]
pub struct RasterArtifact {
    pub image: RgbImage,
    pub module_px: u32,
}

impl RasterArtifact {
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// 无损 PNG 字节
    pub fn to_png(&self) -> Result<Vec<u8>> {
        let mut buf = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(self.image.clone()).write_to(&mut buf, ImageFormat::Png)?;
        Ok(buf.into_inner())
    }

    /// 可直接嵌入的 `data:image/png;base64,...`
    pub fn to_data_uri(&self) -> Result<String> {
        let png = self.to_png()?;
        Ok(format!("data:image/png;base64,{}", STANDARD.encode(png)))
    }
}

/// max(floor(target / moduleCount), 2)
pub fn module_px(target_px: u32, module_count: usize) -> u32 {
    let count = u32::try_from(module_count.max(1)).unwrap_or(u32::MAX);
    (target_px / count).max(MIN_MODULE_PX)
}

/// 边长 = (moduleCount + 2 × quietZone) × modulePx，超过 MAX_RASTER_PX 时报错
pub fn rasterize(matrix: &SymbolMatrix, opts: &RasterOptions) -> Result<RasterArtifact> {
    let px = module_px(opts.target_px, matrix.module_count());
    let count = u32::try_from(matrix.module_count()).unwrap_or(u32::MAX);
    let side = opts
        .quiet_zone
        .checked_mul(2)
        .and_then(|q| q.checked_add(count))
        .and_then(|n| n.checked_mul(px))
        .filter(|&side| side <= MAX_RASTER_PX)
        .ok_or_else(|| {
            tracing::warn!(target_px = opts.target_px, quiet_zone = opts.quiet_zone, "二维码尺寸过大");
            Error::ExportFailed(format!(
                "二维码边长超出 {MAX_RASTER_PX} 像素（target_px = {}, quiet_zone = {}）",
                opts.target_px, opts.quiet_zone
            ))
        })?;

    let mut img = RgbImage::from_pixel(side, side, opts.light);
    for (y, row) in matrix.rows().enumerate() {
        for (x, &dark) in row.iter().enumerate() {
            if !dark {
                continue;
            }
            let x0 = (x as u32 + opts.quiet_zone) * px;
            let y0 = (y as u32 + opts.quiet_zone) * px;
            for dy in 0..px {
                for dx in 0..px {
                    img.put_pixel(x0 + dx, y0 + dy, opts.dark);
                }
            }
        }
    }

    tracing::debug!(side, module_px = px, quiet_zone = opts.quiet_zone, "二维码已栅格化");
    Ok(RasterArtifact { image: img, module_px: px })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::qr::{generate_raw, ErrorCorrection};

    #[test]
    fn module_size_never_below_floor() {
        for target in [0, 1, 10, 57, 100, 400, 4000] {
            for count in [0, 21, 25, 57, 177, 1000] {
                assert!(module_px(target, count) >= MIN_MODULE_PX, "{target}/{count}");
            }
        }
        assert_eq!(module_px(400, 25), 16);
        assert_eq!(module_px(400, 29), 13);
        assert_eq!(module_px(100, 177), 2);
    }

    #[test]
    fn output_side_includes_quiet_zone() {
        let m = generate_raw(b"WIFI:S:Home_5G;T:WPA;P:Sunshine123;;", ErrorCorrection::Medium).unwrap();
        let opts = RasterOptions { quiet_zone: 2, ..Default::default() };
        let r = rasterize(&m, &opts).unwrap();
        let n = m.module_count() as u32;
        assert_eq!(r.width(), (n + 4) * r.module_px);
        assert_eq!(r.width(), r.height());
        // 静区是浅色，左上角定位图案是深色
        assert_eq!(*r.image.get_pixel(0, 0), opts.light);
        let inner = 2 * r.module_px;
        assert_eq!(*r.image.get_pixel(inner, inner), opts.dark);
    }

    #[test]
    fn zero_quiet_zone_starts_with_finder() {
        let m = generate_raw(b"hello", ErrorCorrection::Low).unwrap();
        let opts = RasterOptions { quiet_zone: 0, target_px: 42, ..Default::default() };
        let r = rasterize(&m, &opts).unwrap();
        assert_eq!(r.module_px, 2);
        assert_eq!(r.width(), 21 * 2);
        assert_eq!(*r.image.get_pixel(0, 0), opts.dark);
    }

    #[test]
    fn custom_palette_is_applied() {
        let m = generate_raw(b"palette", ErrorCorrection::Low).unwrap();
        let opts = RasterOptions {
            dark: Rgb([20, 30, 90]),
            light: Rgb([250, 245, 230]),
            ..Default::default()
        };
        let r = rasterize(&m, &opts).unwrap();
        assert!(r.image.pixels().all(|p| *p == opts.dark || *p == opts.light));
    }

    #[test]
    fn oversized_output_is_an_error() {
        let m = generate_raw(b"hello", ErrorCorrection::Low).unwrap();
        let huge_margin = RasterOptions { quiet_zone: 3_000_000_000, target_px: 42, ..Default::default() };
        assert!(matches!(rasterize(&m, &huge_margin), Err(Error::ExportFailed(_))));

        let huge_target = RasterOptions { target_px: u32::MAX, ..Default::default() };
        assert!(matches!(rasterize(&m, &huge_target), Err(Error::ExportFailed(_))));

        let too_wide = RasterOptions { quiet_zone: 0, target_px: 21 * (MAX_RASTER_PX / 21 + 1), ..Default::default() };
        assert!(matches!(rasterize(&m, &too_wide), Err(Error::ExportFailed(_))));
    }

    #[test]
    fn data_uri_is_png() {
        let m = generate_raw(b"uri", ErrorCorrection::Low).unwrap();
        let r = rasterize(&m, &RasterOptions::default()).unwrap();
        let png = r.to_png().unwrap();
        assert_eq!(&png[..8], b"\x89PNG\r\n\x1a\n");
        let uri = r.to_data_uri().unwrap();
        assert!(uri.starts_with("data:image/png;base64,iVBORw0KGgo"));
    }
}

// src/capture.rs - 卡片截图：Renderer 能力 + 纯软件渲染后端

use crate::error::{Error, Result};
use crate::font;
use crate::layout::{BlendMode, Content, Layout, Node, Rect};
use image::{Rgb, RgbImage, Rgba, RgbaImage};

/// 卡片的高分辨率截图，用完即弃
#[derive(Debug, Clone, PartialEq)]
pub struct CardSnapshot {
    pub image: RgbImage,
    pub scale: f32,
    /// 布局的逻辑像素尺寸（未乘 scale）
    pub layout_width: u32,
    pub layout_height: u32,
}

impl CardSnapshot {
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn aspect_ratio(&self) -> f32 {
        self.width() as f32 / self.height().max(1) as f32
    }
}

/// 截图倍率上限
pub const MAX_CAPTURE_SCALE: f32 = 8.0;
/// 截图单边像素上限
pub const MAX_CAPTURE_PX: u32 = 16384;

/// 布局尺寸乘以 scale 后的像素尺寸；倍率不在 [1, MAX_CAPTURE_SCALE] 或任一边超过 MAX_CAPTURE_PX 时报错
pub fn scaled_size(layout: &Layout, scale: f32) -> Result<(u32, u32)> {
    if !scale.is_finite() || !(1.0..=MAX_CAPTURE_SCALE).contains(&scale) {
        return Err(Error::CaptureFailed(format!(
            "截图倍率无效: {scale}（允许 1 到 {MAX_CAPTURE_SCALE}）"
        )));
    }
    let side = |v: u32| {
        let px = (f64::from(v) * f64::from(scale)).round();
        if px > f64::from(MAX_CAPTURE_PX) {
            None
        } else {
            Some((px as u32).max(1))
        }
    };
    match (side(layout.width), side(layout.height)) {
        (Some(w), Some(h)) => Ok((w, h)),
        _ => Err(Error::CaptureFailed(format!(
            "截图尺寸过大: {}x{} × {scale}，单边上限 {MAX_CAPTURE_PX} 像素",
            layout.width, layout.height
        ))),
    }
}

/// 给定布局，按 scale 倍输出位图。浏览器、无头浏览器或纯软件实现都可以替换进来
#[allow(async_fn_in_trait)]
pub trait Renderer {
    async fn render(&self, layout: &Layout, scale: f32) -> Result<CardSnapshot>;
}

/// 截取一张卡片：先在副本上去掉阴影/动画/混合模式并强制不透明背景，再交给渲染器。
/// 原布局不会被修改。
pub async fn capture<R: Renderer>(
    renderer: &R,
    layout: &Layout,
    scale: f32,
    background: Rgba<u8>,
) -> Result<CardSnapshot> {
    if !layout.attached {
        tracing::warn!("渲染目标未挂载，无法截图");
        return Err(Error::CaptureFailed("渲染目标未挂载或不可见".into()));
    }
    if let Err(e) = scaled_size(layout, scale) {
        tracing::warn!(scale, error = %e, "截图尺寸无效");
        return Err(e);
    }
    if scale < 2.0 {
        tracing::debug!(scale, "低于 2x 的截图打印效果较差");
    }

    let detached = layout.normalized(background);
    match renderer.render(&detached, scale).await {
        Ok(snap) => {
            tracing::debug!(width = snap.width(), height = snap.height(), scale, "卡片截图完成");
            Ok(snap)
        }
        Err(e) => {
            tracing::warn!(error = %e, "卡片截图失败");
            Err(e)
        }
    }
}

/// 不依赖浏览器的渲染后端，直接在内存里绘制布局
#[derive(Debug, Clone, Copy, Default)]
pub struct SoftwareRenderer;

impl Renderer for SoftwareRenderer {
    async fn render(&self, layout: &Layout, scale: f32) -> Result<CardSnapshot> {
        if layout.width == 0 || layout.height == 0 {
            return Err(Error::CaptureFailed("布局尺寸为 0".into()));
        }
        // 跨域且未授权的图片读不到像素，和浏览器一样直接拒绝
        if layout.nodes.iter().any(|n| match &n.content {
            Content::Image { origin, .. } => !origin.readable(),
            _ => false,
        }) {
            return Err(Error::CaptureFailed("布局中含有不可读取的跨域图片".into()));
        }

        let (w, h) = scaled_size(layout, scale)?;
        let layout = layout.clone();
        tokio::task::spawn_blocking(move || paint(&layout, scale, w, h))
            .await
            .map_err(|e| Error::CaptureFailed(format!("渲染线程异常: {e}")))
    }
}

fn scaled(v: i64, scale: f32) -> i64 {
    (v as f32 * scale).round() as i64
}

fn paint(layout: &Layout, scale: f32, w: u32, h: u32) -> CardSnapshot {
    let bg = layout.background.unwrap_or(Rgba([0, 0, 0, 0]));
    let mut canvas = RgbaImage::from_pixel(w, h, bg);

    for node in &layout.nodes {
        paint_node(&mut canvas, node, scale);
    }

    // 没有 alpha 的格式需要实底，透明部分压到白色上
    let flat = RgbImage::from_fn(w, h, |x, y| {
        let p = canvas.get_pixel(x, y);
        let a = p[3] as f32 / 255.0;
        let mix = |c: u8| (c as f32 * a + 255.0 * (1.0 - a)).round() as u8;
        Rgb([mix(p[0]), mix(p[1]), mix(p[2])])
    });

    CardSnapshot {
        image: flat,
        scale,
        layout_width: layout.width,
        layout_height: layout.height,
    }
}

fn paint_node(canvas: &mut RgbaImage, node: &Node, scale: f32) {
    let opacity = node.effective_opacity();
    if opacity <= 0.0 {
        return;
    }

    if let Some(shadow) = node.shadow {
        let spread = shadow.spread as i32;
        let rect = Rect::new(
            node.rect.x + shadow.offset_x - spread,
            node.rect.y + shadow.offset_y - spread,
            node.rect.width + 2 * shadow.spread,
            node.rect.height + 2 * shadow.spread,
        );
        fill_rect(canvas, rect, node.radius + shadow.spread, scale, shadow.color, opacity, BlendMode::Normal);
    }

    match &node.content {
        Content::Fill(color) => {
            fill_rect(canvas, node.rect, node.radius, scale, *color, opacity, node.blend);
        }
        Content::Image { pixels, .. } => {
            draw_image(canvas, node, pixels, scale, opacity);
        }
        Content::Text { text, color, size } => {
            draw_text(canvas, node.rect.x, node.rect.y, text, *color, *size, scale, opacity, node.blend);
        }
    }
}

/// 逻辑矩形 → 画布上的像素范围 [x0, x1) × [y0, y1)，已裁剪
fn pixel_bounds(canvas: &RgbaImage, rect: Rect, scale: f32) -> (i64, i64, i64, i64, i64, i64) {
    let x0 = scaled(rect.x as i64, scale);
    let y0 = scaled(rect.y as i64, scale);
    let x1 = scaled(rect.x as i64 + rect.width as i64, scale);
    let y1 = scaled(rect.y as i64 + rect.height as i64, scale);
    (
        x0,
        y0,
        x0.max(0),
        y0.max(0),
        x1.min(canvas.width() as i64),
        y1.min(canvas.height() as i64),
    )
}

fn inside_rounded(px: f32, py: f32, w: f32, h: f32, r: f32) -> bool {
    if r <= 0.0 {
        return true;
    }
    let r = r.min(w / 2.0).min(h / 2.0);
    let cx = px.clamp(r, w - r);
    let cy = py.clamp(r, h - r);
    let (dx, dy) = (px - cx, py - cy);
    dx * dx + dy * dy <= r * r
}

fn fill_rect(
    canvas: &mut RgbaImage,
    rect: Rect,
    radius: u32,
    scale: f32,
    color: Rgba<u8>,
    opacity: f32,
    blend: BlendMode,
) {
    let (ox, oy, x0, y0, x1, y1) = pixel_bounds(canvas, rect, scale);
    let (w, h) = (rect.width as f32 * scale, rect.height as f32 * scale);
    let r = radius as f32 * scale;
    for y in y0..y1 {
        for x in x0..x1 {
            let (lx, ly) = ((x - ox) as f32 + 0.5, (y - oy) as f32 + 0.5);
            if inside_rounded(lx, ly, w, h, r) {
                blend_pixel(canvas.get_pixel_mut(x as u32, y as u32), color, opacity, blend);
            }
        }
    }
}

/// 最近邻缩放，二维码模块边缘保持锐利
fn draw_image(canvas: &mut RgbaImage, node: &Node, pixels: &RgbaImage, scale: f32, opacity: f32) {
    if pixels.width() == 0 || pixels.height() == 0 {
        return;
    }
    let (ox, oy, x0, y0, x1, y1) = pixel_bounds(canvas, node.rect, scale);
    let (w, h) = ((node.rect.width as f32 * scale).max(1.0), (node.rect.height as f32 * scale).max(1.0));
    let r = node.radius as f32 * scale;
    for y in y0..y1 {
        for x in x0..x1 {
            let (lx, ly) = ((x - ox) as f32 + 0.5, (y - oy) as f32 + 0.5);
            if !inside_rounded(lx, ly, w, h, r) {
                continue;
            }
            let sx = ((lx / w) * pixels.width() as f32) as u32;
            let sy = ((ly / h) * pixels.height() as f32) as u32;
            let src = *pixels.get_pixel(sx.min(pixels.width() - 1), sy.min(pixels.height() - 1));
            blend_pixel(canvas.get_pixel_mut(x as u32, y as u32), src, opacity, node.blend);
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn draw_text(
    canvas: &mut RgbaImage,
    x: i32,
    y: i32,
    text: &str,
    color: Rgba<u8>,
    size: u32,
    scale: f32,
    opacity: f32,
    blend: BlendMode,
) {
    let unit = size as f32 * scale;
    let step = font::advance(size) as f32 * scale;
    let (bx, by) = (x as f32 * scale, y as f32 * scale);
    for (i, c) in text.chars().enumerate() {
        let gx = bx + i as f32 * step;
        for col in 0..font::GLYPH_W {
            for row in 0..font::GLYPH_H {
                if !font::is_set(c, col, row) {
                    continue;
                }
                let px0 = (gx + col as f32 * unit).round() as i64;
                let py0 = (by + row as f32 * unit).round() as i64;
                let px1 = (gx + (col + 1) as f32 * unit).round() as i64;
                let py1 = (by + (row + 1) as f32 * unit).round() as i64;
                for py in py0.max(0)..py1.min(canvas.height() as i64) {
                    for px in px0.max(0)..px1.min(canvas.width() as i64) {
                        blend_pixel(canvas.get_pixel_mut(px as u32, py as u32), color, opacity, blend);
                    }
                }
            }
        }
    }
}

fn blend_pixel(dst: &mut Rgba<u8>, src: Rgba<u8>, opacity: f32, mode: BlendMode) {
    let a = src[3] as f32 / 255.0 * opacity;
    if a <= 0.0 {
        return;
    }
    for i in 0..3 {
        let s = src[i] as f32;
        let d = dst[i] as f32;
        let mixed = match mode {
            BlendMode::Normal => s,
            BlendMode::Multiply => s * d / 255.0,
            BlendMode::Screen => 255.0 - (255.0 - s) * (255.0 - d) / 255.0,
        };
        dst[i] = (d * (1.0 - a) + mixed * a).round().clamp(0.0, 255.0) as u8;
    }
    let da = dst[3] as f32 / 255.0;
    dst[3] = ((a + da * (1.0 - a)) * 255.0).round().clamp(0.0, 255.0) as u8;
}

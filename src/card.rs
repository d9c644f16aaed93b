// src/card.rs - 一次生成的结果（载荷 + 矩阵 + 位图 + 欢迎语）以及默认卡片排版

use crate::error::Result;
use crate::font;
use crate::layout::{BlendMode, Layout, Node, Origin, Rect, Shadow};
use crate::payload::{self, EncodedPayload};
use crate::qr::{self, ErrorCorrection, SymbolMatrix};
use crate::raster::{self, RasterArtifact, RasterOptions};
use crate::types::{DisplayOptions, NetworkCredential};
use crate::welcome::{self, WelcomeSource};
use image::{DynamicImage, Rgba};
use std::time::Duration;

/// 卡片逻辑尺寸（像素）
pub const CARD_WIDTH: u32 = 800;
pub const CARD_HEIGHT: u32 = 460;

const PAD: i32 = 48;
const QR_PANEL: u32 = 300;
const RIGHT_X: i32 = PAD + QR_PANEL as i32 + 40;
const RIGHT_W: u32 = CARD_WIDTH - RIGHT_X as u32 - PAD as u32;

const fn rgb(hex: u32) -> Rgba<u8> {
    Rgba([(hex >> 16) as u8, (hex >> 8) as u8, hex as u8, 255])
}

const WHITE: Rgba<u8> = rgb(0xffffff);
const PANEL: Rgba<u8> = rgb(0xf1f3f5);
const MUTED: Rgba<u8> = rgb(0x94a3b8);
const BADGE_BG: Rgba<u8> = rgb(0xeef2ff);
const INDIGO: Rgba<u8> = rgb(0x4f46e5);
const INK: Rgba<u8> = rgb(0x0f172a);
const SLATE: Rgba<u8> = rgb(0x64748b);
const DIVIDER: Rgba<u8> = rgb(0xf1f5f9);
const VALUE: Rgba<u8> = rgb(0x1e293b);
const FIELD_BG: Rgba<u8> = rgb(0xf8fafc);
const ACCENT: Rgba<u8> = rgb(0x6366f1);
const FOOTER: Rgba<u8> = rgb(0xcbd5e1);

/// 不可变的生成结果，由一个展示实例独占使用
#[derive(Debug, Clone)]
pub struct GuestCard {
    pub credential: NetworkCredential,
    pub display: DisplayOptions,
    pub payload: EncodedPayload,
    pub matrix: SymbolMatrix,
    pub qr: RasterArtifact,
    pub welcome: Option<String>,
}

impl GuestCard {
    /// 编码 → 矩阵 → 位图，全同步，不依赖欢迎语
    pub fn build(
        credential: NetworkCredential,
        display: DisplayOptions,
        ec: ErrorCorrection,
        raster_opts: &RasterOptions,
    ) -> Result<Self> {
        let payload = payload::encode(&credential);
        let matrix = qr::generate(&payload, ec)?;
        let qr = raster::rasterize(&matrix, raster_opts)?;
        tracing::info!(
            ssid = %credential.ssid,
            version = matrix.version(),
            modules = matrix.module_count(),
            "已生成二维码"
        );
        Ok(Self {
            credential,
            display,
            payload,
            matrix,
            qr,
            welcome: None,
        })
    }

    pub fn with_welcome(mut self, welcome: impl Into<String>) -> Self {
        self.welcome = Some(welcome.into());
        self
    }

    /// 默认卡片排版：左侧二维码，右侧网络信息
    pub fn layout(&self) -> Layout {
        let cred = &self.credential;
        let mut layout = Layout::new(CARD_WIDTH, CARD_HEIGHT);

        // 卡片底板：带阴影和入场动画，截图时会被归一化掉
        layout.push(
            Node::fill(Rect::new(0, 0, CARD_WIDTH, CARD_HEIGHT), WHITE)
                .rounded(40)
                .shadow(Shadow {
                    offset_x: 0,
                    offset_y: 24,
                    spread: 16,
                    color: Rgba([15, 23, 42, 60]),
                })
                .animated(0.35),
        );

        // 左侧二维码面板
        layout.push(Node::fill(Rect::new(PAD, PAD, QR_PANEL, QR_PANEL), PANEL).rounded(40));
        let qr_img = DynamicImage::ImageRgb8(self.qr.image.clone()).to_rgba8();
        layout.push(
            Node::image(Rect::new(PAD + 24, PAD + 24, QR_PANEL - 48, QR_PANEL - 48), qr_img, Origin::Local)
                .blend(BlendMode::Multiply),
        );
        let caption = "SCAN TO CONNECT";
        let (cw, _) = font::measure(caption, 2);
        layout.push(Node::text(
            PAD + (QR_PANEL as i32 - cw as i32) / 2,
            PAD + QR_PANEL as i32 + 22,
            caption,
            MUTED,
            2,
        ));

        // 右侧：徽标
        let badge = "GUEST WIFI";
        let (bw, _) = font::measure(badge, 2);
        layout.push(Node::fill(Rect::new(RIGHT_X, PAD + 4, bw + 32, 30), BADGE_BG).rounded(15));
        layout.push(Node::text(RIGHT_X + 16, PAD + 12, badge, INDIGO, 2));

        let mut y = PAD + 52;
        if !self.display.hide_ssid {
            layout.push(Node::text(RIGHT_X, y, fit(&cred.ssid, 4, RIGHT_W), INK, 4));
            y += 40;
        }

        if let Some(msg) = &self.welcome {
            for line in font::wrap(&format!("\"{msg}\""), 2, RIGHT_W).into_iter().take(2) {
                layout.push(Node::text(RIGHT_X, y, line, SLATE, 2));
                y += 20;
            }
        }

        y = y.max(PAD + 150);
        layout.push(Node::fill(Rect::new(RIGHT_X, y, RIGHT_W, 2), DIVIDER));
        y += 18;

        if !self.display.hide_ssid {
            layout.push(Node::text(RIGHT_X, y, "NETWORK NAME", MUTED, 2));
            y += 22;
            layout.push(Node::text(RIGHT_X, y, fit(&cred.ssid, 3, RIGHT_W), VALUE, 3));
            y += 34;
        }

        if let Some(pass) = cred.effective_password().filter(|_| !self.display.hide_password) {
            layout.push(Node::text(RIGHT_X, y + 14, "PASSWORD", MUTED, 2));
            let label_w = font::measure("PASSWORD", 2).0 as i32 + 16;
            let box_w = RIGHT_W - label_w as u32;
            let shown = fit(pass, 3, box_w - 32);
            let (tw, _) = font::measure(&shown, 3);
            layout.push(Node::fill(Rect::new(RIGHT_X + label_w, y, (tw + 32).min(box_w), 42), FIELD_BG).rounded(16));
            layout.push(Node::text(RIGHT_X + label_w + 16, y + 11, shown, INK, 3));
            y += 56;
        }

        let security_line = match cred.security.wifi_token() {
            Some(token) => format!("SECURE {token} NETWORK"),
            None => "OPEN NETWORK".to_string(),
        };
        layout.push(Node::text(RIGHT_X, y + 4, security_line, ACCENT, 2));

        // 页脚
        let footer_y = CARD_HEIGHT as i32 - PAD;
        layout.push(Node::text(RIGHT_X, footer_y, "GUESTPASS GENERATOR", FOOTER, 1));
        let right = "FAST & SECURE";
        let (rw, _) = font::measure(right, 1);
        let right_x = RIGHT_X + RIGHT_W as i32 - rw as i32;
        layout.push(Node::text(right_x, footer_y, right, FOOTER, 1));
        layout.push(Node::fill(Rect::new(right_x - 14, footer_y + 2, 4, 4), FOOTER).rounded(2));

        layout
    }
}

/// 生成一张卡片：先出二维码，再（可选）取欢迎语；欢迎语失败不影响结果
pub async fn generate<W: WelcomeSource>(
    credential: NetworkCredential,
    display: DisplayOptions,
    ec: ErrorCorrection,
    raster_opts: &RasterOptions,
    welcome_source: Option<&W>,
    welcome_timeout: Duration,
) -> Result<GuestCard> {
    let card = GuestCard::build(credential, display, ec, raster_opts)?;
    match welcome_source {
        Some(src) => {
            let msg = welcome::welcome_or_fallback(src, &card.credential.ssid, welcome_timeout).await;
            Ok(card.with_welcome(msg))
        }
        None => Ok(card),
    }
}

/// 超出宽度时截断并以 ".." 结尾
fn fit(text: &str, size: u32, max_width: u32) -> String {
    let max_chars = (max_width / font::advance(size).max(1)) as usize;
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut s: String = text.chars().take(max_chars.saturating_sub(2)).collect();
    s.push_str("..");
    s
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::Content;
    use crate::types::Security;
    use crate::welcome::StaticWelcome;

    fn texts(layout: &Layout) -> Vec<String> {
        layout
            .nodes
            .iter()
            .filter_map(|n| match &n.content {
                Content::Text { text, .. } => Some(text.clone()),
                _ => None,
            })
            .collect()
    }

    fn wpa() -> NetworkCredential {
        NetworkCredential::new("Home_5G", Some("Sunshine123".into()), Security::Wpa, false)
    }

    #[test]
    fn build_produces_payload_and_qr() {
        let card = GuestCard::build(wpa(), DisplayOptions::default(), ErrorCorrection::Medium, &RasterOptions::default())
            .unwrap();
        assert_eq!(card.payload.as_str(), "WIFI:S:Home_5G;T:WPA;P:Sunshine123;;");
        assert_eq!(card.qr.width(), (card.matrix.module_count() as u32 + 4) * card.qr.module_px);
        assert!(card.welcome.is_none());
    }

    #[test]
    fn display_flags_do_not_touch_payload() {
        let shown = GuestCard::build(wpa(), DisplayOptions::default(), ErrorCorrection::Medium, &RasterOptions::default())
            .unwrap();
        let hidden = GuestCard::build(
            wpa(),
            DisplayOptions { hide_ssid: true, hide_password: true },
            ErrorCorrection::Medium,
            &RasterOptions::default(),
        )
        .unwrap();
        assert_eq!(shown.payload, hidden.payload);
        assert_eq!(shown.matrix, hidden.matrix);

        let t = texts(&hidden.layout());
        assert!(!t.iter().any(|s| s.contains("Home_5G")));
        assert!(!t.iter().any(|s| s.contains("Sunshine123")));
        let t = texts(&shown.layout());
        assert!(t.iter().any(|s| s == "Home_5G"));
        assert!(t.iter().any(|s| s == "Sunshine123"));
    }

    #[test]
    fn open_network_card_has_no_password_row() {
        let cred = NetworkCredential::new("Cafe;Free", Some("leftover".into()), Security::Open, false);
        let card = GuestCard::build(cred, DisplayOptions::default(), ErrorCorrection::Medium, &RasterOptions::default())
            .unwrap();
        let t = texts(&card.layout());
        assert!(!t.iter().any(|s| s == "PASSWORD" || s.contains("leftover")));
        assert!(t.iter().any(|s| s == "OPEN NETWORK"));
    }

    #[test]
    fn layout_carries_screen_effects_for_capture_to_strip() {
        let card = GuestCard::build(wpa(), DisplayOptions::default(), ErrorCorrection::Medium, &RasterOptions::default())
            .unwrap();
        let layout = card.layout();
        assert_eq!((layout.width, layout.height), (CARD_WIDTH, CARD_HEIGHT));
        assert!(layout.nodes.iter().any(|n| n.shadow.is_some()));
        assert!(layout.nodes.iter().any(|n| n.blend == BlendMode::Multiply));
        assert!(layout.nodes.iter().all(|n| n.rect.x + n.rect.width as i32 <= CARD_WIDTH as i32));
    }

    #[test]
    fn long_names_are_truncated() {
        assert_eq!(fit("short", 3, 364), "short");
        let long = "x".repeat(100);
        let out = fit(&long, 4, 364);
        assert!(out.ends_with(".."));
        assert!(font::measure(&out, 4).0 <= 364);
    }

    #[tokio::test]
    async fn generate_attaches_welcome() {
        let src = StaticWelcome("Make yourself at home".into());
        let card = generate(
            wpa(),
            DisplayOptions::default(),
            ErrorCorrection::Medium,
            &RasterOptions::default(),
            Some(&src),
            Duration::from_secs(1),
        )
        .await
        .unwrap();
        assert_eq!(card.welcome.as_deref(), Some("Make yourself at home"));
        assert!(texts(&card.layout()).iter().any(|s| s.contains("Make yourself")));
    }

    #[tokio::test]
    async fn generate_surfaces_capacity_errors_before_welcome() {
        let cred = NetworkCredential::new("n".repeat(4000), None, Security::Open, false);
        let err = generate(
            cred,
            DisplayOptions::default(),
            ErrorCorrection::High,
            &RasterOptions::default(),
            None::<&StaticWelcome>,
            Duration::from_secs(1),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, crate::error::Error::CapacityExceeded { .. }));
    }
}

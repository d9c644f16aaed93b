//! End-to-end tests: credential → payload → symbol → card → exported artifact.

use guestpass::capture::{CardSnapshot, Renderer, SoftwareRenderer};
use guestpass::layout::Layout;
use guestpass::welcome::StaticWelcome;
use guestpass::{
    card, encode, generate, CardSession, DisplayOptions, Error, ErrorCorrection, ExportKind, ExportSettings,
    GuestCard, NetworkCredential, PageUnit, RasterFormat, RasterOptions, Security,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn small_raster() -> RasterOptions {
    RasterOptions {
        target_px: 150,
        ..Default::default()
    }
}

fn home() -> NetworkCredential {
    NetworkCredential::new("Home_5G", Some("Sunshine123".into()), Security::Wpa, false)
}

// ============================================================================
// Payload scenarios
// ============================================================================

#[test]
fn test_wpa_network_payload_and_symbol() {
    let cred = home();
    cred.validate().unwrap();
    let payload = encode(&cred);
    assert_eq!(payload.as_str(), "WIFI:S:Home_5G;T:WPA;P:Sunshine123;;");

    let matrix = generate(&payload, ErrorCorrection::Medium).unwrap();
    assert_eq!(matrix.module_count(), 17 + 4 * matrix.version() as usize);
}

#[test]
fn test_open_network_escapes_ssid_and_drops_password() {
    let cred = NetworkCredential::new("Cafe;Free", Some(String::new()), Security::Open, false);
    cred.validate().unwrap();
    assert_eq!(encode(&cred).as_str(), "WIFI:S:Cafe\\;Free;;");
}

#[test]
fn test_hidden_wep_network() {
    let cred = NetworkCredential::new("Back Office", Some("p@ss:word".into()), Security::Wep, true);
    cred.validate().unwrap();
    assert_eq!(
        encode(&cred).as_str(),
        "WIFI:S:Back Office;T:WEP;P:p@ss\\:word;H:true;;"
    );
}

#[test]
fn test_display_flags_do_not_change_the_symbol() {
    let shown = GuestCard::build(home(), DisplayOptions::default(), ErrorCorrection::Medium, &small_raster()).unwrap();
    let hidden = GuestCard::build(
        home(),
        DisplayOptions {
            hide_ssid: true,
            hide_password: true,
        },
        ErrorCorrection::Medium,
        &small_raster(),
    )
    .unwrap();
    assert_eq!(shown.payload, hidden.payload);
    assert_eq!(shown.matrix, hidden.matrix);
    assert_ne!(shown.layout(), hidden.layout());
}

#[test]
fn test_oversized_password_reports_capacity() {
    let cred = NetworkCredential::new("X", Some("y".repeat(3000)), Security::Wpa, false);
    match GuestCard::build(cred, DisplayOptions::default(), ErrorCorrection::High, &small_raster()) {
        Err(Error::CapacityExceeded { level, .. }) => assert_eq!(level, ErrorCorrection::High),
        other => panic!("expected CapacityExceeded, got {other:?}"),
    }
}

// ============================================================================
// Card generation and export
// ============================================================================

#[tokio::test]
async fn test_card_with_welcome_exports_every_format() {
    let welcome = StaticWelcome("Make yourself at home".into());
    let card = card::generate(
        home(),
        DisplayOptions::default(),
        ErrorCorrection::Medium,
        &small_raster(),
        Some(&welcome),
        Duration::from_secs(1),
    )
    .await
    .unwrap();
    assert_eq!(card.welcome.as_deref(), Some("Make yourself at home"));

    let dir = tempfile::tempdir().unwrap();
    let session = CardSession::new(
        card,
        SoftwareRenderer,
        ExportSettings {
            scale: 1.0,
            ..Default::default()
        },
    );

    let png = session
        .export_to(ExportKind::Raster(RasterFormat::Png), dir.path())
        .await
        .unwrap();
    assert_eq!(png.file_name().unwrap(), "GuestPass_Home_5G.png");
    let img = image::open(&png).unwrap();
    assert_eq!((img.width(), img.height()), (800, 460));

    let jpeg = session.export(ExportKind::Raster(RasterFormat::Jpeg)).await.unwrap();
    assert_eq!(jpeg.file_name, "GuestPass_Home_5G.jpg");
    assert_eq!(&jpeg.bytes[..2], &[0xFF, 0xD8]);

    let pdf = session.export(ExportKind::Pdf).await.unwrap();
    assert_eq!(pdf.file_name, "GuestPass_Home_5G.pdf");
    assert!(pdf.bytes.starts_with(b"%PDF-"));
    let text = String::from_utf8_lossy(&pdf.bytes);
    assert_eq!(text.matches("/Type /Page").count() - text.matches("/Type /Pages").count(), 1);
}

#[tokio::test]
async fn test_pdf_in_millimetres_matches_card_aspect() {
    let card = GuestCard::build(home(), DisplayOptions::default(), ErrorCorrection::Medium, &small_raster()).unwrap();
    let session = CardSession::new(
        card,
        SoftwareRenderer,
        ExportSettings {
            scale: 1.0,
            page_unit: PageUnit::Mm,
            page_width_mm: 148.0,
            ..Default::default()
        },
    );
    let page = session.page_size();
    let aspect = page.width / page.height;
    assert!((aspect - 800.0 / 460.0).abs() < 1e-3);
    assert!(session.export(ExportKind::Pdf).await.is_ok());
}

#[tokio::test]
async fn test_detached_layout_fails_capture() {
    let card = GuestCard::build(home(), DisplayOptions::default(), ErrorCorrection::Medium, &small_raster()).unwrap();
    let mut layout = card.layout();
    layout.attached = false;
    let session = CardSession::with_layout(card, layout, SoftwareRenderer, ExportSettings::default());
    let err = session.export(ExportKind::Pdf).await.unwrap_err();
    assert!(matches!(err, Error::CaptureFailed(_)));
    assert!(!session.is_exporting());
}

// ============================================================================
// At most one export in flight per card
// ============================================================================

/// Delegates to the software renderer but holds each render open for a while,
/// counting how many renders overlap.
#[derive(Clone, Default)]
struct CountingRenderer {
    active: Arc<AtomicUsize>,
    max_active: Arc<AtomicUsize>,
    calls: Arc<AtomicUsize>,
}

impl Renderer for CountingRenderer {
    async fn render(&self, layout: &Layout, scale: f32) -> guestpass::Result<CardSnapshot> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(50)).await;
        let result = SoftwareRenderer.render(layout, scale).await;
        self.active.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

#[tokio::test]
async fn test_second_export_is_rejected_while_first_runs() {
    let renderer = CountingRenderer::default();
    let card = GuestCard::build(home(), DisplayOptions::default(), ErrorCorrection::Medium, &small_raster()).unwrap();
    let session = CardSession::new(
        card,
        renderer.clone(),
        ExportSettings {
            scale: 1.0,
            ..Default::default()
        },
    );

    let (first, second) = tokio::join!(
        session.export(ExportKind::Raster(RasterFormat::Png)),
        session.export(ExportKind::Pdf),
    );
    assert!(first.is_ok());
    assert!(matches!(second, Err(Error::ExportInProgress)));
    assert_eq!(renderer.calls.load(Ordering::SeqCst), 1);
    assert_eq!(renderer.max_active.load(Ordering::SeqCst), 1);

    // 完成后可以再次导出
    assert!(session.export(ExportKind::Pdf).await.is_ok());
    assert_eq!(renderer.calls.load(Ordering::SeqCst), 2);
}

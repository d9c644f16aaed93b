// src/lib.rs - 访客 Wi-Fi 卡片：凭据 → 二维码 → 卡片截图 → PNG/JPEG/PDF

pub mod capture;
pub mod card;
pub mod config;
pub mod error;
pub mod export;
pub mod font;
pub mod history;
pub mod layout;
pub mod notify;
pub mod payload;
pub mod print;
pub mod qr;
pub mod raster;
pub mod scan;
pub mod session;
pub mod types;
pub mod welcome;

pub use capture::{capture, CardSnapshot, Renderer, SoftwareRenderer};
pub use card::GuestCard;
pub use config::Config;
pub use error::{Error, Result};
pub use export::{export_pdf, export_raster, PageSize, PageUnit, RasterFormat};
pub use payload::{encode, EncodedPayload};
pub use qr::{generate, ErrorCorrection, SymbolMatrix};
pub use raster::{rasterize, RasterArtifact, RasterOptions};
pub use session::{CardSession, ExportArtifact, ExportKind, ExportSettings};
pub use types::{DisplayOptions, NetworkCredential, Security};

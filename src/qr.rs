// src/qr.rs - 用 qrcode crate 把载荷编码成二维码矩阵

use crate::error::{Error, Result};
use crate::payload::EncodedPayload;
use qrcode::types::QrError;
use qrcode::{Color, EcLevel, QrCode, Version};
use serde::{Deserialize, Serialize};

/// 纠错等级，默认 Medium（标准四档中的第二档）
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorCorrection {
    Low,
    #[default]
    Medium,
    Quartile,
    High,
}

impl From<ErrorCorrection> for EcLevel {
    fn from(ec: ErrorCorrection) -> Self {
        match ec {
            ErrorCorrection::Low => EcLevel::L,
            ErrorCorrection::Medium => EcLevel::M,
            ErrorCorrection::Quartile => EcLevel::Q,
            ErrorCorrection::High => EcLevel::H,
        }
    }
}

impl std::fmt::Display for ErrorCorrection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ErrorCorrection::Low => "L",
            ErrorCorrection::Medium => "M",
            ErrorCorrection::Quartile => "Q",
            ErrorCorrection::High => "H",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for ErrorCorrection {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "l" | "low" => Ok(ErrorCorrection::Low),
            "m" | "medium" => Ok(ErrorCorrection::Medium),
            "q" | "quartile" => Ok(ErrorCorrection::Quartile),
            "h" | "high" => Ok(ErrorCorrection::High),
            other => Err(format!("未知纠错等级: {other}（可选 L / M / Q / H）")),
        }
    }
}

/// 正方形模块矩阵，`true` 表示深色模块
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolMatrix {
    modules: Vec<bool>,
    width: usize,
    version: i16,
    ec_level: ErrorCorrection,
}

impl SymbolMatrix {
    /// 每边模块数，由载荷长度和纠错等级唯一决定
    pub fn module_count(&self) -> usize {
        self.width
    }

    pub fn version(&self) -> i16 {
        self.version
    }

    pub fn error_correction(&self) -> ErrorCorrection {
        self.ec_level
    }

    /// 越界坐标视为浅色，方便计算静区
    pub fn is_dark(&self, x: usize, y: usize) -> bool {
        x < self.width && y < self.width && self.modules[y * self.width + x]
    }

    pub fn rows(&self) -> impl Iterator<Item = &[bool]> {
        self.modules.chunks(self.width)
    }

    /// 用半高块字符在终端里画二维码（两行模块合成一行字符）
    pub fn to_terminal(&self, quiet_zone: usize) -> String {
        let total = self.width + 2 * quiet_zone;
        let dark = |x: usize, y: usize| -> bool {
            x >= quiet_zone && y >= quiet_zone && self.is_dark(x - quiet_zone, y - quiet_zone)
        };

        let mut lines = Vec::with_capacity(total / 2 + 1);
        for y in (0..total).step_by(2) {
            // 每行加两个前导空格，稍微居中
            let mut line = String::from("  ");
            for x in 0..total {
                let top = dark(x, y);
                let bottom = y + 1 < total && dark(x, y + 1);
                // 深色终端下浅色模块用实心块显示
                line.push(match (top, bottom) {
                    (false, false) => '█',
                    (false, true) => '▀',
                    (true, false) => '▄',
                    (true, true) => ' ',
                });
            }
            lines.push(line);
        }
        lines.join("\n")
    }
}

/// 载荷 → 矩阵。编码模式（数字/字母数字/字节）由 qrcode 自动选最紧凑的分段
pub fn generate(payload: &EncodedPayload, ec: ErrorCorrection) -> Result<SymbolMatrix> {
    generate_raw(payload.as_bytes(), ec)
}

/// 对任意字节生成矩阵；超出版本 40 容量时返回 CapacityExceeded，绝不截断
pub fn generate_raw(data: &[u8], ec: ErrorCorrection) -> Result<SymbolMatrix> {
    let code = QrCode::with_error_correction_level(data, ec.into()).map_err(|e| match e {
        QrError::DataTooLong => {
            tracing::warn!(len = data.len(), level = %ec, "载荷超出二维码容量");
            Error::CapacityExceeded { len: data.len(), level: ec }
        }
        other => {
            tracing::error!(error = %other, "二维码编码失败");
            Error::ExportFailed(other.to_string())
        }
    })?;

    let version = match code.version() {
        Version::Normal(v) | Version::Micro(v) => v,
    };
    let modules = code.to_colors().into_iter().map(|c| c == Color::Dark).collect();

    tracing::debug!(version, width = code.width(), level = %ec, "已生成二维码矩阵");
    Ok(SymbolMatrix {
        modules,
        width: code.width(),
        version,
        ec_level: ec,
    })
}

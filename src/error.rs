// src/error.rs - 库内统一错误类型

use crate::qr::ErrorCorrection;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// 生成、截取、导出各阶段可能出现的错误，全部可由调用方恢复
#[derive(Debug, Error)]
pub enum Error {
    /// 载荷超出最大版本在该纠错等级下的容量
    #[error("载荷过长（{len} 字节），超出 {level} 纠错等级的最大容量")]
    CapacityExceeded { len: usize, level: ErrorCorrection },

    /// 渲染目标不可用，或跨域图片不可读取
    #[error("截取卡片失败: {0}")]
    CaptureFailed(String),

    /// 图片或 PDF 编码失败
    #[error("导出失败: {0}")]
    ExportFailed(String),

    /// 同一张卡片已有导出在进行中
    #[error("已有导出正在进行，请稍后再试")]
    ExportInProgress,

    /// 表单层校验未通过
    #[error("无效的网络配置: {0}")]
    InvalidCredential(String),

    #[error("打印失败: {0}")]
    PrintFailed(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<image::ImageError> for Error {
    fn from(err: image::ImageError) -> Self {
        Error::ExportFailed(err.to_string())
    }
}

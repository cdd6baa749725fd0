//! 数据源读取相关错误

use reqwest::StatusCode;
use std::path::PathBuf;

/// 数据源错误类型
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// HTTP 请求错误
    #[error("HTTP 请求失败: {0}")]
    Http(#[from] reqwest::Error),

    /// HTTP 状态码错误
    #[error("HTTP 状态码 {status}: {url}")]
    StatusCode { status: StatusCode, url: String },

    /// 打开本地文件失败
    #[error("打开文件失败({path}): {source}")]
    OpenFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// 读取失败
    #[error("读取数据失败: {0}")]
    Read(#[from] std::io::Error),

    /// 请求的起始位置超出资源长度
    #[error("读取位置越界: position={position}, length={length}")]
    PositionOutOfRange { position: u64, length: u64 },

    /// 地址无法解析为本地路径
    #[error("无效的本地地址: {0}")]
    InvalidLocalUri(String),

    /// 未调用 open 就读取
    #[error("数据源尚未打开")]
    NotOpened,
}

impl SourceError {
    /// 判断错误是否可重试
    pub fn is_retryable(&self) -> bool {
        match self {
            SourceError::Http(_) => true,
            SourceError::StatusCode { status, .. } => {
                *status == StatusCode::REQUEST_TIMEOUT
                    || *status == StatusCode::TOO_MANY_REQUESTS
                    || status.is_server_error()
            }
            _ => false,
        }
    }
}

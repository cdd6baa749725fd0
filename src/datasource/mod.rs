//! 字节数据源抽象
//!
//! 播放器内部 I/O 通过 `DataSourceFactory` 创建 `DataSource` 读取字节；
//! 本地文件、内置资源、网络三条路径各有实现，缓存层以装饰器形式包在网络路径外面。

mod file;
mod http;
mod resource;

pub use file::{FileDataSource, FileDataSourceFactory};
pub use http::{
    DEFAULT_CONNECT_TIMEOUT_MS, DEFAULT_READ_TIMEOUT_MS, HttpConfig, HttpDataSource,
    HttpDataSourceFactory,
};
pub use resource::ResourceBundle;

use std::fmt;
use std::sync::Arc;

use crate::error::SourceError;

/// 一次读取请求：资源地址 + 字节区间
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataSpec {
    pub uri: String,
    pub position: u64,
    /// None 表示读到资源末尾
    pub length: Option<u64>,
    /// 缓存 key，缺省使用 uri
    pub key: Option<String>,
}

impl DataSpec {
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            position: 0,
            length: None,
            key: None,
        }
    }

    pub fn at(mut self, position: u64) -> Self {
        self.position = position;
        self
    }

    pub fn with_length(mut self, length: u64) -> Self {
        self.length = Some(length);
        self
    }

    pub fn cache_key(&self) -> &str {
        self.key.as_deref().unwrap_or(&self.uri)
    }

    /// 同一资源，从 `position` 开始、保留原有终点的子区间
    pub fn subrange(&self, position: u64) -> Self {
        let length = self
            .length
            .map(|len| self.position.saturating_add(len).saturating_sub(position));
        Self {
            uri: self.uri.clone(),
            position,
            length,
            key: self.key.clone(),
        }
    }
}

/// 顺序读取的数据源
pub trait DataSource: Send {
    /// 打开并定位到 `spec.position`；返回剩余可读字节数（已知时）
    fn open(&mut self, spec: &DataSpec) -> Result<Option<u64>, SourceError>;

    /// 返回 0 表示读到末尾
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, SourceError>;

    fn close(&mut self);
}

pub trait DataSourceFactory: Send + Sync + fmt::Debug {
    fn create(&self) -> Box<dyn DataSource>;
}

pub type SharedFactory = Arc<dyn DataSourceFactory>;

/// 读完整个区间，测试和命令行预取使用
pub fn read_to_end(source: &mut dyn DataSource, out: &mut Vec<u8>) -> Result<u64, SourceError> {
    let mut buf = [0u8; 64 * 1024];
    let mut total = 0u64;
    loop {
        let n = source.read(&mut buf)?;
        if n == 0 {
            break;
        }
        out.extend_from_slice(&buf[..n]);
        total += n as u64;
    }
    Ok(total)
}

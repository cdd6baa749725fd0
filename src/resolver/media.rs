use std::fmt;

use crate::datasource::{DataSource, DataSpec, SharedFactory};
use crate::error::SourceError;
use crate::model::TrackType;

/// 字节数据从哪里来
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataPath {
    /// 内置资源
    Resource,
    /// 本地文件
    Local,
    /// 网络；`cached` 表示外面包了缓存层
    Network { cached: bool },
}

/// 播放源的容器/流格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    /// 普通渐进式容器
    Progressive { constant_bitrate_seeking: bool },
    Dash,
    Hls,
    SmoothStreaming,
}

impl MediaKind {
    pub fn for_type(kind: TrackType) -> Self {
        match kind {
            TrackType::Default => MediaKind::Progressive {
                constant_bitrate_seeking: true,
            },
            TrackType::Dash => MediaKind::Dash,
            TrackType::Hls => MediaKind::Hls,
            TrackType::SmoothStreaming => MediaKind::SmoothStreaming,
        }
    }

    /// 分段自适应流
    pub fn is_segmented(self) -> bool {
        !matches!(self, MediaKind::Progressive { .. })
    }
}

/// 交给播放器的可播放句柄
#[derive(Clone)]
pub struct MediaSource {
    pub uri: String,
    pub kind: MediaKind,
    pub path: DataPath,
    pub user_agent: String,
    pub content_type: Option<String>,
    pub queue_id: u64,
    pub data_source: SharedFactory,
}

impl fmt::Debug for MediaSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaSource")
            .field("uri", &self.uri)
            .field("kind", &self.kind)
            .field("path", &self.path)
            .field("user_agent", &self.user_agent)
            .field("queue_id", &self.queue_id)
            .finish_non_exhaustive()
    }
}

impl MediaSource {
    /// 从 `position` 开始打开数据源（分段流时即为清单文件）
    pub fn open(&self, position: u64) -> Result<Box<dyn DataSource>, SourceError> {
        let mut source = self.data_source.create();
        source.open(&DataSpec::new(&self.uri).at(position))?;
        Ok(source)
    }
}

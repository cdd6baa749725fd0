//! 播放源解析：曲目 -> 可播放句柄
//!
//! 数据路径三选一（内置资源 / 本地文件 / 网络），只有网络路径经过缓存；
//! 媒体格式按 `TrackType` 分派一次。

mod media;

pub use media::{DataPath, MediaKind, MediaSource};

use once_cell::sync::Lazy;
use std::sync::Arc;
use std::time::Duration;

use crate::cache::CacheStore;
use crate::datasource::{
    DEFAULT_CONNECT_TIMEOUT_MS, DEFAULT_READ_TIMEOUT_MS, FileDataSourceFactory, HttpConfig,
    HttpDataSourceFactory, ResourceBundle, SharedFactory,
};
use crate::error::ResolveError;
use crate::model::{Track, TrackSource};

/// 曲目未指定 user-agent 时使用
pub static DEFAULT_USER_AGENT: Lazy<String> =
    Lazy::new(|| format!("trackplayer/{}", env!("CARGO_PKG_VERSION")));

/// 给网络数据源包缓存层的能力
pub trait CachingWrap {
    fn wrap(&self, upstream: SharedFactory) -> SharedFactory;

    fn is_caching(&self) -> bool;
}

impl CachingWrap for CacheStore {
    fn wrap(&self, upstream: SharedFactory) -> SharedFactory {
        CacheStore::wrap(self, upstream)
    }

    fn is_caching(&self) -> bool {
        self.is_enabled()
    }
}

/// 不加缓存
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCaching;

impl CachingWrap for NoCaching {
    fn wrap(&self, upstream: SharedFactory) -> SharedFactory {
        upstream
    }

    fn is_caching(&self) -> bool {
        false
    }
}

#[derive(Debug, Clone)]
pub struct ResolverConfig {
    pub user_agent: String,
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
    pub resources: Option<ResourceBundle>,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.clone(),
            connect_timeout: Duration::from_millis(DEFAULT_CONNECT_TIMEOUT_MS),
            read_timeout: Duration::from_millis(DEFAULT_READ_TIMEOUT_MS),
            resources: None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct MediaResolver {
    config: ResolverConfig,
}

impl MediaResolver {
    pub fn new(config: ResolverConfig) -> Self {
        Self { config }
    }

    /// 构建播放句柄。内置资源打不开属于构造期故障，直接返回错误。
    pub fn resolve(
        &self,
        track: &Track,
        caching: &dyn CachingWrap,
    ) -> Result<MediaSource, ResolveError> {
        let user_agent = track
            .user_agent()
            .map(str::to_owned)
            .unwrap_or_else(|| self.config.user_agent.clone());

        let (path, data_source): (DataPath, SharedFactory) = match track.source() {
            TrackSource::Resource { name } => {
                let bundle = self
                    .config
                    .resources
                    .as_ref()
                    .ok_or_else(|| ResolveError::NoResourceBundle(name.clone()))?;
                let file = bundle.open(name)?;
                (DataPath::Resource, Arc::new(FileDataSourceFactory::pinned(file)))
            }
            source if source.is_local() => {
                let file = source
                    .local_path()
                    .ok_or_else(|| ResolveError::InvalidLocalPath(source.uri().into()))?;
                (DataPath::Local, Arc::new(FileDataSourceFactory::pinned(file)))
            }
            _ => {
                let mut http = HttpConfig::new(user_agent.clone());
                http.headers = track.headers().clone();
                http.connect_timeout = self.config.connect_timeout;
                http.read_timeout = self.config.read_timeout;
                http.allow_cross_protocol_redirects = true;
                let upstream: SharedFactory = Arc::new(HttpDataSourceFactory::new(http));
                (
                    DataPath::Network {
                        cached: caching.is_caching(),
                    },
                    caching.wrap(upstream),
                )
            }
        };

        let kind = MediaKind::for_type(track.kind());
        tracing::debug!(
            uri = %track.uri(),
            queue_id = track.queue_id(),
            ?kind,
            ?path,
            "构建播放源"
        );

        Ok(MediaSource {
            uri: track.uri(),
            kind,
            path,
            user_agent,
            content_type: track.content_type().map(str::to_owned),
            queue_id: track.queue_id(),
            data_source,
        })
    }
}

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::datasource::ResourceBundle;
use crate::model::RepeatMode;
use crate::resolver::{DEFAULT_USER_AGENT, ResolverConfig};
use crate::settings::PlayerSettings;

/// 缓存固定放在数据目录下的这个子目录
pub const CACHE_DIR_NAME: &str = "TrackPlayer";

/// 会话启动参数
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub cache_root: PathBuf,
    /// 字节；<= 0 关闭缓存
    pub cache_capacity_bytes: i64,
    pub resolver: ResolverConfig,
    pub volume: f32,
    pub repeat_mode: RepeatMode,
    pub auto_update_metadata: bool,
    pub stop_with_app: bool,
}

impl SessionConfig {
    pub fn new(data_dir: &Path) -> Self {
        Self::from_settings(data_dir, &PlayerSettings::default())
    }

    pub fn from_settings(data_dir: &Path, settings: &PlayerSettings) -> Self {
        let resolver = ResolverConfig {
            user_agent: settings
                .user_agent
                .clone()
                .filter(|ua| !ua.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_USER_AGENT.clone()),
            connect_timeout: Duration::from_millis(settings.http_connect_timeout_ms),
            read_timeout: Duration::from_millis(settings.http_read_timeout_ms),
            resources: settings.resources_dir.clone().map(ResourceBundle::new),
        };

        Self {
            cache_root: data_dir.join(CACHE_DIR_NAME),
            cache_capacity_bytes: settings.cache_capacity_bytes(),
            resolver,
            volume: settings.volume,
            repeat_mode: settings.repeat_mode,
            auto_update_metadata: settings.auto_update_metadata,
            stop_with_app: settings.stop_with_app,
        }
    }

    pub fn with_cache_capacity(mut self, bytes: i64) -> Self {
        self.cache_capacity_bytes = bytes;
        self
    }
}

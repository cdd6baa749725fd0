use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::datasource::{DEFAULT_CONNECT_TIMEOUT_MS, DEFAULT_READ_TIMEOUT_MS};
use crate::error::SettingsError;
use crate::model::RepeatMode;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerSettings {
    // 缓存设置（KiB，<= 0 关闭缓存）
    #[serde(default)]
    pub max_cache_size_kb: i64,

    // 网络设置
    #[serde(default)]
    pub user_agent: Option<String>,
    #[serde(default = "default_http_connect_timeout_ms")]
    pub http_connect_timeout_ms: u64,
    #[serde(default = "default_http_read_timeout_ms")]
    pub http_read_timeout_ms: u64,

    // 会话设置
    #[serde(default = "default_auto_update_metadata")]
    pub auto_update_metadata: bool,
    #[serde(default)]
    pub stop_with_app: bool,
    #[serde(default = "default_volume")]
    pub volume: f32,
    #[serde(default)]
    pub repeat_mode: RepeatMode,

    /// 内置资源目录，None 时不支持资源引用
    #[serde(default)]
    pub resources_dir: Option<PathBuf>,
}

impl Default for PlayerSettings {
    fn default() -> Self {
        Self {
            max_cache_size_kb: 0,
            user_agent: None,
            http_connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT_MS,
            http_read_timeout_ms: DEFAULT_READ_TIMEOUT_MS,
            auto_update_metadata: true,
            stop_with_app: false,
            volume: 1.0,
            repeat_mode: RepeatMode::Off,
            resources_dir: None,
        }
    }
}

// 默认值函数（用于 serde default）
fn default_http_connect_timeout_ms() -> u64 { DEFAULT_CONNECT_TIMEOUT_MS }
fn default_http_read_timeout_ms() -> u64 { DEFAULT_READ_TIMEOUT_MS }
fn default_auto_update_metadata() -> bool { true }
fn default_volume() -> f32 { 1.0 }

impl PlayerSettings {
    /// 缓存容量（字节）
    pub fn cache_capacity_bytes(&self) -> i64 {
        self.max_cache_size_kb.saturating_mul(1024)
    }
}

pub fn load_settings(data_dir: &Path) -> PlayerSettings {
    let p = settings_path(data_dir);
    let Ok(bytes) = fs::read(&p) else {
        return PlayerSettings::default();
    };
    match serde_json::from_slice(&bytes) {
        Ok(s) => s,
        Err(e) => {
            tracing::warn!(path = %p.display(), err = %e, "设置文件损坏，使用默认设置");
            PlayerSettings::default()
        }
    }
}

/// 环境变量覆盖：`TRACKPLAYER_CACHE_MAX_KB`、`TRACKPLAYER_USER_AGENT`
pub fn apply_env_overrides(mut s: PlayerSettings) -> PlayerSettings {
    if let Some(kb) = env::var("TRACKPLAYER_CACHE_MAX_KB")
        .ok()
        .and_then(|v| v.trim().parse::<i64>().ok())
    {
        s.max_cache_size_kb = kb;
    }
    if let Some(ua) = env::var("TRACKPLAYER_USER_AGENT")
        .ok()
        .filter(|v| !v.trim().is_empty())
    {
        s.user_agent = Some(ua);
    }
    s
}

pub fn save_settings(data_dir: &Path, s: &PlayerSettings) -> Result<(), SettingsError> {
    fs::create_dir_all(data_dir).map_err(|source| SettingsError::Save { source })?;
    let p = settings_path(data_dir);
    let tmp = p.with_extension("json.tmp");
    let bytes = serde_json::to_vec_pretty(s).map_err(|source| SettingsError::Encode { source })?;
    fs::write(&tmp, bytes).map_err(|source| SettingsError::Save { source })?;
    if let Err(e) = fs::rename(&tmp, &p) {
        let _ = fs::remove_file(&p);
        fs::rename(&tmp, &p).map_err(|_| SettingsError::Save { source: e })?;
    }
    Ok(())
}

/// 系统数据目录（data_local_dir），不可用时退到临时目录
pub fn default_data_dir() -> PathBuf {
    ProjectDirs::from("dev", "trackplayer", "trackplayer")
        .map(|p| p.data_local_dir().to_path_buf())
        .unwrap_or_else(|| std::env::temp_dir().join("trackplayer"))
}

fn settings_path(data_dir: &Path) -> PathBuf {
    data_dir.join("settings.json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_use_defaults() {
        let s: PlayerSettings = serde_json::from_str(r#"{"max_cache_size_kb": 2048}"#).unwrap();
        assert_eq!(s.cache_capacity_bytes(), 2048 * 1024);
        assert_eq!(s.http_read_timeout_ms, 8_000);
        assert!(s.auto_update_metadata);
        assert!((s.volume - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn negative_capacity_stays_non_positive() {
        let s = PlayerSettings {
            max_cache_size_kb: -1,
            ..PlayerSettings::default()
        };
        assert!(s.cache_capacity_bytes() <= 0);
    }
}

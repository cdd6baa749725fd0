mod track;

pub use track::{Locator, Track, TrackDescriptor, TrackMetadata, TrackSource, TrackType};

use serde::{Deserialize, Serialize};

/// 循环模式，直接透传给底层播放器
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepeatMode {
    #[default]
    Off,
    Track,
    Queue,
}

impl RepeatMode {
    /// 宿主侧使用的整数编码（0/1/2），未知值按 Off 处理
    pub fn from_code(code: i64) -> Self {
        match code {
            1 => RepeatMode::Track,
            2 => RepeatMode::Queue,
            _ => RepeatMode::Off,
        }
    }

    pub fn code(self) -> i64 {
        match self {
            RepeatMode::Off => 0,
            RepeatMode::Track => 1,
            RepeatMode::Queue => 2,
        }
    }
}

/// 对外暴露的播放状态
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackState {
    #[default]
    Idle,
    Buffering,
    Playing,
    Paused,
    Stopped,
    Ended,
}

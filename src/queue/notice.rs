use crate::model::{Track, TrackMetadata};

/// 发给外部观察者（元数据/通知栏等）的事件
#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackNotice {
    /// 队列被清空
    QueueReset,
    /// 当前曲目变化。`reset` 时后两项为空。
    TrackChanged {
        previous_index: Option<usize>,
        previous_position_ms: Option<u64>,
        next_index: Option<usize>,
        next_track: Option<Track>,
    },
    /// 开启自动更新元数据时，切歌后附带新曲目的元数据
    MetadataChanged {
        index: usize,
        metadata: TrackMetadata,
    },
    /// 时间线播放完毕
    PlaybackEnded {
        track_index: Option<usize>,
        position_ms: u64,
    },
    /// 播放器报告的致命错误
    PlayerError { code: i32, message: String },
}

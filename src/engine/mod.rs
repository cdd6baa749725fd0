//! 底层播放器抽象
//!
//! 解码/输出由平台播放器负责，这里只约定它暴露的操作集合和回调事件。

mod null;

pub use null::NullPlayer;

use crate::model::RepeatMode;
use crate::resolver::MediaSource;

/// 播放器自身的状态
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EngineState {
    #[default]
    Idle,
    Buffering,
    Ready,
    Ended,
}

/// 播放器回调给队列控制器的事件
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayerEvent {
    /// 开始播放某个条目（含自然切歌）
    Started,
    /// 播放到时间线末尾
    Ended,
    /// 致命错误，播放器已停止
    FatalError { code: i32, message: String },
}

/// 带内部时间线的播放器。索引与队列一一对应。
pub trait Player {
    fn prepare(&mut self);
    fn play(&mut self);
    fn pause(&mut self);
    fn stop(&mut self);
    fn seek_to(&mut self, position_ms: u64);
    /// 跳到 `index`；`position_ms` 为 None 时使用条目的默认起点
    fn seek_to_item(&mut self, index: usize, position_ms: Option<u64>);

    fn insert_sources(&mut self, index: usize, sources: Vec<MediaSource>);
    fn remove_item(&mut self, index: usize);
    fn clear_items(&mut self);
    fn item_count(&self) -> usize;

    fn current_index(&self) -> Option<usize>;
    fn position_ms(&self) -> u64;
    fn duration_ms(&self) -> Option<u64>;
    fn buffered_position_ms(&self) -> u64;
    fn state(&self) -> EngineState;
    fn play_when_ready(&self) -> bool;

    fn volume(&self) -> f32;
    fn set_volume(&mut self, volume: f32);
    fn rate(&self) -> f32;
    fn set_rate(&mut self, rate: f32);
    fn repeat_mode(&self) -> RepeatMode;
    fn set_repeat_mode(&mut self, mode: RepeatMode);

    fn release(&mut self);
}

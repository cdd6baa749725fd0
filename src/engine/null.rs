use super::{EngineState, Player};
use crate::model::RepeatMode;
use crate::resolver::MediaSource;

/// 不出声的内存播放器：只维护时间线和状态，用于测试和命令行演示
#[derive(Debug)]
pub struct NullPlayer {
    items: Vec<MediaSource>,
    current: Option<usize>,
    position_ms: u64,
    duration_ms: Option<u64>,
    buffered_ms: u64,
    state: EngineState,
    play_when_ready: bool,
    volume: f32,
    rate: f32,
    repeat_mode: RepeatMode,
    prepare_count: usize,
    released: bool,
}

impl Default for NullPlayer {
    fn default() -> Self {
        Self::new()
    }
}

impl NullPlayer {
    pub fn new() -> Self {
        Self {
            items: Vec::new(),
            current: None,
            position_ms: 0,
            duration_ms: None,
            buffered_ms: 0,
            state: EngineState::Idle,
            play_when_ready: false,
            volume: 1.0,
            rate: 1.0,
            repeat_mode: RepeatMode::Off,
            prepare_count: 0,
            released: false,
        }
    }

    /// `prepare` 被调用的次数
    pub fn prepare_count(&self) -> usize {
        self.prepare_count
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    pub fn items(&self) -> &[MediaSource] {
        &self.items
    }

    pub fn uris(&self) -> Vec<String> {
        self.items.iter().map(|m| m.uri.clone()).collect()
    }

    /// 模拟播放器切到某个条目
    pub fn set_current_index(&mut self, index: Option<usize>) {
        self.current = index.filter(|i| *i < self.items.len());
    }

    pub fn set_position_ms(&mut self, position_ms: u64) {
        self.position_ms = position_ms;
        self.buffered_ms = self.buffered_ms.max(position_ms);
    }

    pub fn set_duration_ms(&mut self, duration_ms: Option<u64>) {
        self.duration_ms = duration_ms;
    }

    pub fn set_state(&mut self, state: EngineState) {
        self.state = state;
    }
}

impl Player for NullPlayer {
    fn prepare(&mut self) {
        self.prepare_count += 1;
        self.state = if self.items.is_empty() {
            EngineState::Ended
        } else {
            EngineState::Ready
        };
    }

    fn play(&mut self) {
        self.play_when_ready = true;
    }

    fn pause(&mut self) {
        self.play_when_ready = false;
    }

    fn stop(&mut self) {
        self.state = EngineState::Idle;
        self.buffered_ms = 0;
    }

    fn seek_to(&mut self, position_ms: u64) {
        self.position_ms = position_ms;
    }

    fn seek_to_item(&mut self, index: usize, position_ms: Option<u64>) {
        if index < self.items.len() {
            self.current = Some(index);
            self.position_ms = position_ms.unwrap_or(0);
            self.buffered_ms = self.position_ms;
        }
    }

    fn insert_sources(&mut self, index: usize, sources: Vec<MediaSource>) {
        let index = index.min(self.items.len());
        let count = sources.len();
        let tail = self.items.split_off(index);
        self.items.extend(sources);
        self.items.extend(tail);
        self.current = match self.current {
            Some(cur) if index <= cur => Some(cur + count),
            None if !self.items.is_empty() => Some(0),
            other => other,
        };
    }

    fn remove_item(&mut self, index: usize) {
        if index >= self.items.len() {
            return;
        }
        self.items.remove(index);
        self.current = match self.current {
            _ if self.items.is_empty() => None,
            Some(cur) if index < cur => Some(cur - 1),
            // 移除当前条目时停在原位置（即下一首），越界则退到最后一首
            Some(cur) if index == cur => {
                self.position_ms = 0;
                Some(cur.min(self.items.len() - 1))
            }
            other => other,
        };
    }

    fn clear_items(&mut self) {
        self.items.clear();
        self.current = None;
        self.position_ms = 0;
        self.buffered_ms = 0;
    }

    fn item_count(&self) -> usize {
        self.items.len()
    }

    fn current_index(&self) -> Option<usize> {
        self.current
    }

    fn position_ms(&self) -> u64 {
        self.position_ms
    }

    fn duration_ms(&self) -> Option<u64> {
        self.duration_ms
    }

    fn buffered_position_ms(&self) -> u64 {
        self.buffered_ms
    }

    fn state(&self) -> EngineState {
        self.state
    }

    fn play_when_ready(&self) -> bool {
        self.play_when_ready
    }

    fn volume(&self) -> f32 {
        self.volume
    }

    fn set_volume(&mut self, volume: f32) {
        self.volume = volume.clamp(0.0, 1.0);
    }

    fn rate(&self) -> f32 {
        self.rate
    }

    fn set_rate(&mut self, rate: f32) {
        if rate.is_finite() && rate > 0.0 {
            self.rate = rate;
        }
    }

    fn repeat_mode(&self) -> RepeatMode {
        self.repeat_mode
    }

    fn set_repeat_mode(&mut self, mode: RepeatMode) {
        self.repeat_mode = mode;
    }

    fn release(&mut self) {
        self.clear_items();
        self.state = EngineState::Idle;
        self.play_when_ready = false;
        self.released = true;
    }
}

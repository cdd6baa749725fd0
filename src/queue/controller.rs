use tokio::sync::mpsc;

use super::PlaybackNotice;
use crate::cache::CacheStore;
use crate::engine::{EngineState, Player, PlayerEvent};
use crate::error::QueueError;
use crate::model::{PlaybackState, RepeatMode, Track};
use crate::resolver::{MediaResolver, MediaSource};

/// 队列控制器，只在会话的所属线程上使用
///
/// 队列长度始终等于播放器时间线长度；`prepared` 表示自上次
/// reset/stop/结束/致命错误以来播放器是否已收到 prepare。
pub struct QueueController<P: Player> {
    player: P,
    resolver: MediaResolver,
    cache: CacheStore,
    queue: Vec<Track>,
    prepared: bool,
    last_known_window: Option<usize>,
    last_known_position: Option<u64>,
    auto_update_metadata: bool,
    notices: mpsc::UnboundedSender<PlaybackNotice>,
}

impl<P: Player> QueueController<P> {
    pub fn new(
        player: P,
        resolver: MediaResolver,
        cache: CacheStore,
        notices: mpsc::UnboundedSender<PlaybackNotice>,
    ) -> Self {
        Self {
            player,
            resolver,
            cache,
            queue: Vec::new(),
            prepared: false,
            last_known_window: None,
            last_known_position: None,
            auto_update_metadata: false,
            notices,
        }
    }

    pub fn with_auto_update_metadata(mut self, enabled: bool) -> Self {
        self.auto_update_metadata = enabled;
        self
    }

    /// 会话开始时清空队列和时间线
    pub fn initialize(&mut self) {
        self.reset_queue();
    }

    pub fn player(&self) -> &P {
        &self.player
    }

    pub fn player_mut(&mut self) -> &mut P {
        &mut self.player
    }

    pub fn is_prepared(&self) -> bool {
        self.prepared
    }

    pub fn last_known_window(&self) -> Option<usize> {
        self.last_known_window
    }

    fn notify(&self, notice: PlaybackNotice) {
        let _ = self.notices.send(notice);
    }

    fn debug_check_timeline(&self) {
        debug_assert_eq!(
            self.queue.len(),
            self.player.item_count(),
            "队列与播放器时间线长度不一致"
        );
    }

    fn ensure_prepared(&mut self) {
        if !self.prepared {
            tracing::debug!(len = self.queue.len(), "prepare 播放源");
            self.player.prepare();
            self.prepared = true;
        }
    }

    /// 插入单首曲目，`index` 为 None 时追加到末尾
    pub fn add(&mut self, track: Track, index: Option<usize>) -> Result<usize, QueueError> {
        self.add_all(vec![track], index)
    }

    /// 批量插入。所有播放源先构建完成再一次性插入，失败时队列不变。
    pub fn add_all(
        &mut self,
        tracks: Vec<Track>,
        index: Option<usize>,
    ) -> Result<usize, QueueError> {
        let len = self.queue.len();
        let index = index.unwrap_or(len);
        if index > len {
            return Err(QueueError::IndexOutOfRange { index, len });
        }
        if tracks.is_empty() {
            return Ok(index);
        }

        let sources = tracks
            .iter()
            .map(|t| self.resolver.resolve(t, &self.cache))
            .collect::<Result<Vec<MediaSource>, _>>()?;

        let count = tracks.len();
        let tail = self.queue.split_off(index);
        self.queue.extend(tracks);
        self.queue.extend(tail);
        self.player.insert_sources(index, sources);
        if let Some(w) = self.last_known_window
            && w >= index
        {
            self.last_known_window = Some(w + count);
        }
        tracing::debug!(index, count, len = self.queue.len(), "曲目已加入队列");

        self.ensure_prepared();
        self.debug_check_timeline();
        Ok(index)
    }

    /// 删除若干索引，从大到小处理；当前曲目和越界索引静默跳过。
    /// 返回实际删除的最小索引。
    pub fn remove(&mut self, indexes: &[i64]) -> Option<usize> {
        let current = self.player.current_index();
        let mut sorted = indexes.to_vec();
        sorted.sort_unstable();
        sorted.dedup();

        let mut lowest = None;
        for &raw in sorted.iter().rev() {
            let Ok(index) = usize::try_from(raw) else {
                tracing::debug!(index = raw, "跳过负数索引");
                continue;
            };
            if Some(index) == current || index >= self.queue.len() {
                tracing::debug!(index, ?current, len = self.queue.len(), "跳过无法删除的索引");
                continue;
            }

            self.queue.remove(index);
            self.player.remove_item(index);
            lowest = Some(index);

            if let Some(w) = self.last_known_window
                && index < w
            {
                self.last_known_window = Some(w - 1);
            }
        }

        self.debug_check_timeline();
        lowest
    }

    /// 删除当前曲目之后的所有曲目
    pub fn remove_upcoming(&mut self) {
        let Some(current) = self.player.current_index() else {
            return;
        };
        for i in (current + 1..self.queue.len()).rev() {
            self.queue.remove(i);
            self.player.remove_item(i);
        }
        self.debug_check_timeline();
    }

    fn reset_queue(&mut self) {
        self.queue.clear();
        self.player.clear_items();
        self.player.prepare();
        // 时间线已空，下次插入需要重新 prepare
        self.prepared = false;

        self.last_known_window = None;
        self.last_known_position = None;

        self.notify(PlaybackNotice::QueueReset);
        self.debug_check_timeline();
    }

    /// 停止并清空队列，随后把重置前的曲目和位置通知观察者
    pub fn reset(&mut self) {
        let track = self.current_track_index();
        let position = self.player.position_ms();

        self.player.stop();
        self.reset_queue();
        tracing::info!(?track, position, "播放队列已重置");

        self.notify(PlaybackNotice::TrackChanged {
            previous_index: track,
            previous_position_ms: Some(position),
            next_index: None,
            next_track: None,
        });
    }

    pub fn play(&mut self) {
        self.ensure_prepared();
        self.player.play();
    }

    pub fn pause(&mut self) {
        self.player.pause();
    }

    pub fn stop(&mut self) {
        self.player.stop();
        self.prepared = false;
    }

    pub fn seek_to(&mut self, position_ms: u64) {
        self.ensure_prepared();
        self.player.seek_to(position_ms);
    }

    pub fn skip(&mut self, index: usize) -> Result<(), QueueError> {
        let len = self.queue.len();
        if index >= len {
            return Err(QueueError::IndexOutOfRange { index, len });
        }
        self.jump_to(index);
        Ok(())
    }

    pub fn skip_to_next(&mut self) -> Result<(), QueueError> {
        let len = self.queue.len();
        let next = match self.current_track_index() {
            Some(cur) if cur + 1 < len => cur + 1,
            Some(_) if self.player.repeat_mode() == RepeatMode::Queue => 0,
            _ => return Err(QueueError::QueueExhausted),
        };
        self.jump_to(next);
        Ok(())
    }

    pub fn skip_to_previous(&mut self) -> Result<(), QueueError> {
        let len = self.queue.len();
        let previous = match self.current_track_index() {
            Some(cur) if cur > 0 => cur - 1,
            Some(_) if self.player.repeat_mode() == RepeatMode::Queue => len - 1,
            _ => return Err(QueueError::NoPreviousTrack),
        };
        self.jump_to(previous);
        Ok(())
    }

    fn jump_to(&mut self, index: usize) {
        let previous_index = self.current_track_index();
        let previous_position = self.player.position_ms();

        self.player.seek_to_item(index, None);
        self.last_known_window = Some(index);
        self.last_known_position = Some(0);
        tracing::debug!(?previous_index, index, "切换曲目");

        self.notify_track_changed(previous_index, Some(previous_position), Some(index));
    }

    fn notify_track_changed(
        &self,
        previous_index: Option<usize>,
        previous_position_ms: Option<u64>,
        next_index: Option<usize>,
    ) {
        let next_track = next_index.and_then(|i| self.queue.get(i)).cloned();
        if self.auto_update_metadata
            && let (Some(index), Some(track)) = (next_index, next_track.as_ref())
        {
            self.notify(PlaybackNotice::MetadataChanged {
                index,
                metadata: track.metadata().clone(),
            });
        }
        self.notify(PlaybackNotice::TrackChanged {
            previous_index,
            previous_position_ms,
            next_index,
            next_track,
        });
    }

    /// 播放器回调
    pub fn on_player_event(&mut self, event: PlayerEvent) {
        match event {
            PlayerEvent::Started => self.detect_transition(),
            PlayerEvent::Ended => {
                self.prepared = false;
                tracing::debug!("播放结束");
                self.notify(PlaybackNotice::PlaybackEnded {
                    track_index: self.current_track_index(),
                    position_ms: self.player.position_ms(),
                });
            }
            PlayerEvent::FatalError { code, message } => {
                self.prepared = false;
                tracing::warn!(code, message = %message, "播放器报告错误");
                self.notify(PlaybackNotice::PlayerError { code, message });
            }
        }
    }

    fn detect_transition(&mut self) {
        let current = self.player.current_index();
        if current != self.last_known_window {
            // 自然切歌时上一首已播完，位置按其时长计
            let previous_position = match self.last_known_window {
                Some(w) => self
                    .queue
                    .get(w)
                    .and_then(|t| t.metadata().duration_ms)
                    .or(self.last_known_position),
                None => self.last_known_position,
            };
            let next = current.filter(|i| *i < self.queue.len());
            self.notify_track_changed(self.last_known_window, previous_position, next);
        }
        self.last_known_window = current;
        self.last_known_position = Some(self.player.position_ms());
    }

    pub fn set_repeat_mode(&mut self, mode: RepeatMode) {
        self.player.set_repeat_mode(mode);
    }

    pub fn repeat_mode(&self) -> RepeatMode {
        self.player.repeat_mode()
    }

    pub fn track(&self, index: usize) -> Option<&Track> {
        self.queue.get(index)
    }

    pub fn queue(&self) -> &[Track] {
        &self.queue
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// 播放器当前索引；不在队列范围内时为 None
    pub fn current_track_index(&self) -> Option<usize> {
        self.player
            .current_index()
            .filter(|i| *i < self.queue.len())
    }

    pub fn position_ms(&self) -> u64 {
        self.player.position_ms()
    }

    pub fn duration_ms(&self) -> Option<u64> {
        self.player.duration_ms().or_else(|| {
            self.current_track_index()
                .and_then(|i| self.queue[i].metadata().duration_ms)
        })
    }

    pub fn buffered_position_ms(&self) -> u64 {
        self.player.buffered_position_ms()
    }

    pub fn state(&self) -> PlaybackState {
        match self.player.state() {
            EngineState::Idle if self.queue.is_empty() => PlaybackState::Idle,
            EngineState::Idle => PlaybackState::Stopped,
            EngineState::Buffering => PlaybackState::Buffering,
            EngineState::Ready if self.player.play_when_ready() => PlaybackState::Playing,
            EngineState::Ready => PlaybackState::Paused,
            EngineState::Ended if self.queue.is_empty() => PlaybackState::Idle,
            EngineState::Ended => PlaybackState::Ended,
        }
    }
}

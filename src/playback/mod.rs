//! 播放门面：外部命令层调用的窄接口
//!
//! 传输控制转给队列控制器，音量/循环模式直通播放器，缓存查询转给缓存。

mod config;

pub use config::{CACHE_DIR_NAME, SessionConfig};

use tokio::sync::mpsc;

use crate::cache::CacheStore;
use crate::engine::{Player, PlayerEvent};
use crate::error::PlaybackError;
use crate::model::{PlaybackState, RepeatMode, Track};
use crate::queue::{PlaybackNotice, QueueController};
use crate::resolver::MediaResolver;

pub struct Playback<P: Player> {
    controller: QueueController<P>,
    cache: CacheStore,
    destroyed: bool,
}

impl<P: Player> Playback<P> {
    /// 打开缓存、配置播放器并清空队列
    pub fn new(
        mut player: P,
        config: SessionConfig,
        notices: mpsc::UnboundedSender<PlaybackNotice>,
    ) -> Self {
        let cache = CacheStore::open(&config.cache_root, config.cache_capacity_bytes);
        player.set_volume(config.volume);
        player.set_repeat_mode(config.repeat_mode);

        let mut controller = QueueController::new(
            player,
            MediaResolver::new(config.resolver),
            cache.clone(),
            notices,
        )
        .with_auto_update_metadata(config.auto_update_metadata);
        controller.initialize();

        tracing::info!(cache_enabled = cache.is_enabled(), "播放会话已创建");
        Self {
            controller,
            cache,
            destroyed: false,
        }
    }

    fn alive(&mut self) -> Result<&mut QueueController<P>, PlaybackError> {
        if self.destroyed {
            return Err(PlaybackError::Destroyed);
        }
        Ok(&mut self.controller)
    }

    pub fn controller(&self) -> &QueueController<P> {
        &self.controller
    }

    pub fn player(&self) -> &P {
        self.controller.player()
    }

    pub fn player_mut(&mut self) -> &mut P {
        self.controller.player_mut()
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    pub fn add(&mut self, tracks: Vec<Track>, index: Option<usize>) -> Result<usize, PlaybackError> {
        Ok(self.alive()?.add_all(tracks, index)?)
    }

    pub fn remove(&mut self, indexes: &[i64]) -> Result<Option<usize>, PlaybackError> {
        Ok(self.alive()?.remove(indexes))
    }

    pub fn remove_upcoming(&mut self) -> Result<(), PlaybackError> {
        self.alive()?.remove_upcoming();
        Ok(())
    }

    pub fn play(&mut self) -> Result<(), PlaybackError> {
        self.alive()?.play();
        Ok(())
    }

    pub fn pause(&mut self) -> Result<(), PlaybackError> {
        self.alive()?.pause();
        Ok(())
    }

    pub fn stop(&mut self) -> Result<(), PlaybackError> {
        self.alive()?.stop();
        Ok(())
    }

    pub fn seek_to(&mut self, position_ms: u64) -> Result<(), PlaybackError> {
        self.alive()?.seek_to(position_ms);
        Ok(())
    }

    pub fn reset(&mut self) -> Result<(), PlaybackError> {
        self.alive()?.reset();
        Ok(())
    }

    pub fn skip(&mut self, index: usize) -> Result<(), PlaybackError> {
        Ok(self.alive()?.skip(index)?)
    }

    pub fn skip_to_next(&mut self) -> Result<(), PlaybackError> {
        Ok(self.alive()?.skip_to_next()?)
    }

    pub fn skip_to_previous(&mut self) -> Result<(), PlaybackError> {
        Ok(self.alive()?.skip_to_previous()?)
    }

    pub fn set_repeat_mode(&mut self, mode: RepeatMode) -> Result<(), PlaybackError> {
        self.alive()?.set_repeat_mode(mode);
        Ok(())
    }

    pub fn repeat_mode(&self) -> RepeatMode {
        self.controller.repeat_mode()
    }

    pub fn set_volume(&mut self, volume: f32) -> Result<(), PlaybackError> {
        self.alive()?.player_mut().set_volume(volume);
        Ok(())
    }

    pub fn volume(&self) -> f32 {
        self.controller.player().volume()
    }

    pub fn set_rate(&mut self, rate: f32) -> Result<(), PlaybackError> {
        self.alive()?.player_mut().set_rate(rate);
        Ok(())
    }

    pub fn rate(&self) -> f32 {
        self.controller.player().rate()
    }

    pub fn track(&self, index: usize) -> Option<Track> {
        self.controller.track(index).cloned()
    }

    pub fn queue(&self) -> Vec<Track> {
        self.controller.queue().to_vec()
    }

    pub fn current_track_index(&self) -> Option<usize> {
        self.controller.current_track_index()
    }

    pub fn position_ms(&self) -> u64 {
        self.controller.position_ms()
    }

    pub fn duration_ms(&self) -> Option<u64> {
        self.controller.duration_ms()
    }

    pub fn buffered_position_ms(&self) -> u64 {
        self.controller.buffered_position_ms()
    }

    pub fn state(&self) -> PlaybackState {
        if self.destroyed {
            return PlaybackState::Idle;
        }
        self.controller.state()
    }

    pub fn is_cached(&self, url: &str) -> bool {
        self.cache.is_cached(url)
    }

    pub fn cache_size_bytes(&self) -> u64 {
        self.cache.size_bytes()
    }

    /// 返回删除的条目数；缓存未启用时为 0
    pub fn clear_cache(&self) -> usize {
        if !self.cache.is_enabled() {
            tracing::debug!("缓存未启用，无需清理");
            return 0;
        }
        self.cache.clear()
    }

    pub fn on_player_event(&mut self, event: PlayerEvent) {
        if self.destroyed {
            tracing::debug!(?event, "会话已销毁，忽略播放器事件");
            return;
        }
        self.controller.on_player_event(event);
    }

    /// 释放播放器和缓存；只生效一次
    pub fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        self.destroyed = true;
        self.controller.player_mut().release();
        self.cache.release();
        tracing::info!("播放会话已销毁");
    }
}

impl<P: Player> Drop for Playback<P> {
    fn drop(&mut self) {
        self.destroy();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::NullPlayer;
    use crate::model::TrackDescriptor;

    fn session(capacity: i64) -> (
        tempfile::TempDir,
        Playback<NullPlayer>,
        mpsc::UnboundedReceiver<PlaybackNotice>,
    ) {
        let dir = tempfile::tempdir().expect("tempdir");
        let (tx, rx) = mpsc::unbounded_channel();
        let config = SessionConfig::new(dir.path()).with_cache_capacity(capacity);
        let playback = Playback::new(NullPlayer::new(), config, tx);
        (dir, playback, rx)
    }

    #[test]
    fn volume_and_repeat_pass_through() {
        let (_dir, mut p, _rx) = session(0);
        p.set_volume(0.3).expect("volume");
        assert!((p.player().volume() - 0.3).abs() < f32::EPSILON);
        p.set_repeat_mode(RepeatMode::Track).expect("repeat");
        assert_eq!(p.player().repeat_mode(), RepeatMode::Track);
        assert_eq!(p.repeat_mode(), RepeatMode::Track);
    }

    #[test]
    fn disabled_cache_reports_empty() {
        let (_dir, p, _rx) = session(0);
        assert!(!p.is_cached("https://example.com/a.mp3"));
        assert_eq!(p.cache_size_bytes(), 0);
        assert_eq!(p.clear_cache(), 0);
    }

    #[test]
    fn cache_root_is_fixed_subdir() {
        let (dir, p, _rx) = session(1024 * 1024);
        assert_eq!(p.cache.root(), Some(dir.path().join(CACHE_DIR_NAME)));
    }

    #[test]
    fn destroy_is_once_and_rejects_later_calls() {
        let (_dir, mut p, _rx) = session(1024 * 1024);
        p.add(
            vec![Track::new(TrackDescriptor::from_url("https://example.com/a.mp3"))],
            None,
        )
        .expect("add");

        p.destroy();
        p.destroy();
        assert!(p.player().is_released());
        assert!(!p.cache.is_enabled());
        assert!(matches!(p.play(), Err(PlaybackError::Destroyed)));
        assert_eq!(p.state(), PlaybackState::Idle);
    }

    #[test]
    fn destroy_without_cache() {
        let (_dir, mut p, _rx) = session(-1);
        p.destroy();
        assert!(p.is_destroyed());
    }
}

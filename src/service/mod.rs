//! 会话所属线程
//!
//! 队列控制器不做内部同步：所有命令和播放器事件都经同一个通道
//! 送到专用线程上串行处理，调用方通过 `PlaybackHandle` 以请求/响应方式使用。

mod messages;

pub use messages::{PlaybackCommand, Reply};

use std::sync::Arc;
use std::thread;
use tokio::sync::{mpsc, oneshot};

use crate::engine::{Player, PlayerEvent};
use crate::error::PlaybackError;
use crate::model::{PlaybackState, RepeatMode, Track};
use crate::playback::{Playback, SessionConfig};
use crate::queue::PlaybackNotice;
use crate::startup::ReadinessGate;
use messages::ServiceMessage;

/// 播放器回调入口，交给底层播放器持有
#[derive(Debug, Clone)]
pub struct PlayerEventSink {
    tx: mpsc::UnboundedSender<ServiceMessage>,
}

impl PlayerEventSink {
    pub fn send(&self, event: PlayerEvent) {
        let _ = self.tx.send(ServiceMessage::Player(event));
    }
}

struct HandleInner {
    tx: mpsc::UnboundedSender<ServiceMessage>,
}

impl Drop for HandleInner {
    fn drop(&mut self) {
        let _ = self.tx.send(ServiceMessage::Shutdown);
    }
}

/// 会话句柄；最后一个克隆释放时会话线程收尾退出
#[derive(Clone)]
pub struct PlaybackHandle {
    inner: Arc<HandleInner>,
}

impl std::fmt::Debug for PlaybackHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackHandle")
            .field("closed", &self.inner.tx.is_closed())
            .finish()
    }
}

/// 启动会话。宿主未就绪时，会话线程在 `gate` 就绪后才创建；
/// 期间发出的命令在通道里排队。
pub fn spawn_playback_service<P, F>(
    gate: &ReadinessGate,
    config: SessionConfig,
    make_player: F,
) -> (PlaybackHandle, mpsc::UnboundedReceiver<PlaybackNotice>)
where
    P: Player + 'static,
    F: FnOnce(PlayerEventSink) -> P + Send + 'static,
{
    let (tx, rx) = mpsc::unbounded_channel::<ServiceMessage>();
    let (tx_notice, rx_notice) = mpsc::unbounded_channel::<PlaybackNotice>();
    let sink = PlayerEventSink { tx: tx.clone() };

    gate.run_when_ready(move || {
        let spawned = thread::Builder::new()
            .name("trackplayer-session".to_owned())
            .spawn(move || {
                let stop_with_app = config.stop_with_app;
                let player = make_player(sink);
                let playback = Playback::new(player, config, tx_notice);
                tracing::info!("播放会话线程已启动");
                run(playback, rx, stop_with_app);
            });
        if let Err(e) = spawned {
            tracing::error!(err = %e, "启动播放会话线程失败");
        }
    });

    let handle = PlaybackHandle {
        inner: Arc::new(HandleInner { tx }),
    };
    (handle, rx_notice)
}

fn run<P: Player>(
    mut playback: Playback<P>,
    mut rx: mpsc::UnboundedReceiver<ServiceMessage>,
    stop_with_app: bool,
) {
    let mut lingering = false;

    while let Some(msg) = rx.blocking_recv() {
        match msg {
            ServiceMessage::Command(cmd) => handle_command(&mut playback, cmd),
            ServiceMessage::Player(event) => {
                let terminal = matches!(event, PlayerEvent::Ended | PlayerEvent::FatalError { .. });
                playback.on_player_event(event);
                if lingering && terminal {
                    tracing::info!("后台播放结束");
                    break;
                }
            }
            ServiceMessage::Shutdown => {
                if stop_with_app || playback.state() != PlaybackState::Playing {
                    break;
                }
                // 宿主退出后继续播放到结束
                tracing::info!("宿主已退出，继续播放至结束");
                lingering = true;
            }
        }
    }

    playback.destroy();
    tracing::info!("播放会话线程已退出");
}

fn respond<T>(reply: Reply<T>, value: Result<T, PlaybackError>) {
    let _ = reply.send(value);
}

fn handle_command<P: Player>(playback: &mut Playback<P>, cmd: PlaybackCommand) {
    match cmd {
        PlaybackCommand::Add {
            tracks,
            index,
            reply,
        } => {
            let result = playback.add(tracks, index);
            match &result {
                Err(PlaybackError::Queue(e)) if e.is_caller_error() => {
                    tracing::debug!(?index, err = %e, "添加曲目参数无效");
                }
                Err(e) => tracing::warn!(?index, err = %e, "添加曲目失败"),
                Ok(_) => {}
            }
            respond(reply, result);
        }
        PlaybackCommand::Remove { indexes, reply } => respond(reply, playback.remove(&indexes)),
        PlaybackCommand::RemoveUpcoming { reply } => respond(reply, playback.remove_upcoming()),
        PlaybackCommand::Play { reply } => respond(reply, playback.play()),
        PlaybackCommand::Pause { reply } => respond(reply, playback.pause()),
        PlaybackCommand::Stop { reply } => respond(reply, playback.stop()),
        PlaybackCommand::SeekTo { position_ms, reply } => {
            respond(reply, playback.seek_to(position_ms))
        }
        PlaybackCommand::Reset { reply } => respond(reply, playback.reset()),
        PlaybackCommand::Skip { index, reply } => respond(reply, playback.skip(index)),
        PlaybackCommand::SkipToNext { reply } => respond(reply, playback.skip_to_next()),
        PlaybackCommand::SkipToPrevious { reply } => respond(reply, playback.skip_to_previous()),
        PlaybackCommand::SetRepeatMode { mode, reply } => {
            respond(reply, playback.set_repeat_mode(mode))
        }
        PlaybackCommand::GetRepeatMode { reply } => respond(reply, Ok(playback.repeat_mode())),
        PlaybackCommand::SetVolume { volume, reply } => respond(reply, playback.set_volume(volume)),
        PlaybackCommand::GetVolume { reply } => respond(reply, Ok(playback.volume())),
        PlaybackCommand::SetRate { rate, reply } => respond(reply, playback.set_rate(rate)),
        PlaybackCommand::GetRate { reply } => respond(reply, Ok(playback.rate())),
        PlaybackCommand::GetTrack { index, reply } => respond(reply, Ok(playback.track(index))),
        PlaybackCommand::GetQueue { reply } => respond(reply, Ok(playback.queue())),
        PlaybackCommand::GetCurrentTrack { reply } => {
            respond(reply, Ok(playback.current_track_index()))
        }
        PlaybackCommand::GetPosition { reply } => respond(reply, Ok(playback.position_ms())),
        PlaybackCommand::GetDuration { reply } => respond(reply, Ok(playback.duration_ms())),
        PlaybackCommand::GetBufferedPosition { reply } => {
            respond(reply, Ok(playback.buffered_position_ms()))
        }
        PlaybackCommand::GetState { reply } => respond(reply, Ok(playback.state())),
        PlaybackCommand::IsCached { url, reply } => respond(reply, Ok(playback.is_cached(&url))),
        PlaybackCommand::GetCacheSize { reply } => respond(reply, Ok(playback.cache_size_bytes())),
        PlaybackCommand::ClearCache { reply } => respond(reply, Ok(playback.clear_cache())),
        PlaybackCommand::Destroy { reply } => {
            playback.destroy();
            respond(reply, Ok(()));
        }
    }
}

impl PlaybackHandle {
    async fn request<T>(
        &self,
        make: impl FnOnce(Reply<T>) -> PlaybackCommand,
    ) -> Result<T, PlaybackError> {
        let (reply, rx) = oneshot::channel();
        self.inner
            .tx
            .send(ServiceMessage::Command(make(reply)))
            .map_err(|_| PlaybackError::ServiceClosed)?;
        rx.await.map_err(|_| PlaybackError::ServiceClosed)?
    }

    /// `index` 为 None 时追加到末尾
    pub async fn add(&self, tracks: Vec<Track>, index: Option<usize>) -> Result<usize, PlaybackError> {
        self.request(|reply| PlaybackCommand::Add {
            tracks,
            index,
            reply,
        })
        .await
    }

    pub async fn remove(&self, indexes: Vec<i64>) -> Result<Option<usize>, PlaybackError> {
        self.request(|reply| PlaybackCommand::Remove { indexes, reply })
            .await
    }

    pub async fn remove_upcoming(&self) -> Result<(), PlaybackError> {
        self.request(|reply| PlaybackCommand::RemoveUpcoming { reply })
            .await
    }

    pub async fn play(&self) -> Result<(), PlaybackError> {
        self.request(|reply| PlaybackCommand::Play { reply }).await
    }

    pub async fn pause(&self) -> Result<(), PlaybackError> {
        self.request(|reply| PlaybackCommand::Pause { reply }).await
    }

    pub async fn stop(&self) -> Result<(), PlaybackError> {
        self.request(|reply| PlaybackCommand::Stop { reply }).await
    }

    pub async fn seek_to(&self, position_ms: u64) -> Result<(), PlaybackError> {
        self.request(|reply| PlaybackCommand::SeekTo { position_ms, reply })
            .await
    }

    pub async fn reset(&self) -> Result<(), PlaybackError> {
        self.request(|reply| PlaybackCommand::Reset { reply }).await
    }

    pub async fn skip(&self, index: usize) -> Result<(), PlaybackError> {
        self.request(|reply| PlaybackCommand::Skip { index, reply })
            .await
    }

    pub async fn skip_to_next(&self) -> Result<(), PlaybackError> {
        self.request(|reply| PlaybackCommand::SkipToNext { reply })
            .await
    }

    pub async fn skip_to_previous(&self) -> Result<(), PlaybackError> {
        self.request(|reply| PlaybackCommand::SkipToPrevious { reply })
            .await
    }

    pub async fn set_repeat_mode(&self, mode: RepeatMode) -> Result<(), PlaybackError> {
        self.request(|reply| PlaybackCommand::SetRepeatMode { mode, reply })
            .await
    }

    pub async fn repeat_mode(&self) -> Result<RepeatMode, PlaybackError> {
        self.request(|reply| PlaybackCommand::GetRepeatMode { reply })
            .await
    }

    pub async fn set_volume(&self, volume: f32) -> Result<(), PlaybackError> {
        self.request(|reply| PlaybackCommand::SetVolume { volume, reply })
            .await
    }

    pub async fn volume(&self) -> Result<f32, PlaybackError> {
        self.request(|reply| PlaybackCommand::GetVolume { reply })
            .await
    }

    pub async fn set_rate(&self, rate: f32) -> Result<(), PlaybackError> {
        self.request(|reply| PlaybackCommand::SetRate { rate, reply })
            .await
    }

    pub async fn rate(&self) -> Result<f32, PlaybackError> {
        self.request(|reply| PlaybackCommand::GetRate { reply }).await
    }

    pub async fn track(&self, index: usize) -> Result<Option<Track>, PlaybackError> {
        self.request(|reply| PlaybackCommand::GetTrack { index, reply })
            .await
    }

    pub async fn queue(&self) -> Result<Vec<Track>, PlaybackError> {
        self.request(|reply| PlaybackCommand::GetQueue { reply })
            .await
    }

    pub async fn current_track_index(&self) -> Result<Option<usize>, PlaybackError> {
        self.request(|reply| PlaybackCommand::GetCurrentTrack { reply })
            .await
    }

    pub async fn position_ms(&self) -> Result<u64, PlaybackError> {
        self.request(|reply| PlaybackCommand::GetPosition { reply })
            .await
    }

    pub async fn duration_ms(&self) -> Result<Option<u64>, PlaybackError> {
        self.request(|reply| PlaybackCommand::GetDuration { reply })
            .await
    }

    pub async fn buffered_position_ms(&self) -> Result<u64, PlaybackError> {
        self.request(|reply| PlaybackCommand::GetBufferedPosition { reply })
            .await
    }

    pub async fn state(&self) -> Result<PlaybackState, PlaybackError> {
        self.request(|reply| PlaybackCommand::GetState { reply })
            .await
    }

    pub async fn is_cached(&self, url: impl Into<String>) -> Result<bool, PlaybackError> {
        let url = url.into();
        self.request(|reply| PlaybackCommand::IsCached { url, reply })
            .await
    }

    pub async fn cache_size_bytes(&self) -> Result<u64, PlaybackError> {
        self.request(|reply| PlaybackCommand::GetCacheSize { reply })
            .await
    }

    pub async fn clear_cache(&self) -> Result<usize, PlaybackError> {
        self.request(|reply| PlaybackCommand::ClearCache { reply })
            .await
    }

    pub async fn destroy(&self) -> Result<(), PlaybackError> {
        self.request(|reply| PlaybackCommand::Destroy { reply })
            .await
    }
}

use tokio::sync::oneshot;

use crate::engine::PlayerEvent;
use crate::error::PlaybackError;
use crate::model::{PlaybackState, RepeatMode, Track};

pub type Reply<T> = oneshot::Sender<Result<T, PlaybackError>>;

/// 外部命令层发往会话线程的请求
#[derive(Debug)]
pub enum PlaybackCommand {
    Add {
        tracks: Vec<Track>,
        index: Option<usize>,
        reply: Reply<usize>,
    },
    Remove {
        indexes: Vec<i64>,
        reply: Reply<Option<usize>>,
    },
    RemoveUpcoming { reply: Reply<()> },
    Play { reply: Reply<()> },
    Pause { reply: Reply<()> },
    Stop { reply: Reply<()> },
    SeekTo { position_ms: u64, reply: Reply<()> },
    Reset { reply: Reply<()> },
    Skip { index: usize, reply: Reply<()> },
    SkipToNext { reply: Reply<()> },
    SkipToPrevious { reply: Reply<()> },
    SetRepeatMode { mode: RepeatMode, reply: Reply<()> },
    GetRepeatMode { reply: Reply<RepeatMode> },
    SetVolume { volume: f32, reply: Reply<()> },
    GetVolume { reply: Reply<f32> },
    SetRate { rate: f32, reply: Reply<()> },
    GetRate { reply: Reply<f32> },
    GetTrack { index: usize, reply: Reply<Option<Track>> },
    GetQueue { reply: Reply<Vec<Track>> },
    GetCurrentTrack { reply: Reply<Option<usize>> },
    GetPosition { reply: Reply<u64> },
    GetDuration { reply: Reply<Option<u64>> },
    GetBufferedPosition { reply: Reply<u64> },
    GetState { reply: Reply<PlaybackState> },
    IsCached { url: String, reply: Reply<bool> },
    GetCacheSize { reply: Reply<u64> },
    ClearCache { reply: Reply<usize> },
    Destroy { reply: Reply<()> },
}

#[derive(Debug)]
pub(crate) enum ServiceMessage {
    Command(PlaybackCommand),
    Player(PlayerEvent),
    /// 所有句柄都已释放
    Shutdown,
}

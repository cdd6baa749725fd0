//! 统一错误处理模块
//!
//! 按故障类别拆分：数据源 / 缓存 / 构建播放源 / 队列 / 播放门面，
//! 最外层由 `AppError` 汇总给命令行宿主。

mod app;
mod cache;
mod playback;
mod queue;
mod resolve;
mod source;

pub use app::{AppError, SettingsError};
pub use cache::CacheError;
pub use playback::PlaybackError;
pub use queue::QueueError;
pub use resolve::ResolveError;
pub use source::SourceError;

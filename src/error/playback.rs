//! 播放门面 / 服务线程相关错误

use super::QueueError;

/// 播放操作错误类型
#[derive(Debug, thiserror::Error)]
pub enum PlaybackError {
    /// 队列错误
    #[error("队列操作失败: {0}")]
    Queue(#[from] QueueError),

    /// 播放服务线程已退出
    #[error("播放服务已关闭")]
    ServiceClosed,

    /// 会话已销毁
    #[error("播放会话已销毁")]
    Destroyed,
}

//! 播放队列相关错误

use super::ResolveError;

/// 队列操作错误类型
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    /// 插入/跳转索引越界
    #[error("索引越界: index={index}, len={len}")]
    IndexOutOfRange { index: usize, len: usize },

    /// 已经是最后一首
    #[error("队列已播放到末尾")]
    QueueExhausted,

    /// 已经是第一首
    #[error("没有上一首")]
    NoPreviousTrack,

    /// 构建播放源失败
    #[error("构建播放源失败: {0}")]
    Resolve(#[from] ResolveError),
}

impl QueueError {
    /// 调用方传参错误（而非资源故障）
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            QueueError::IndexOutOfRange { .. }
                | QueueError::QueueExhausted
                | QueueError::NoPreviousTrack
        )
    }
}

//! 媒体缓存相关错误
//!
//! 缓存只是性能优化：这些错误在缓存层内部记录日志后吞掉，
//! 只有显式构造（`CacheStore::try_open`）会把它交给调用方。

/// 缓存操作错误类型
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// 缓存目录不可用
    #[error("缓存目录不可用")]
    DirUnavailable,

    /// 索引保存失败
    #[error("保存缓存索引失败: {0}")]
    SaveIndex(String),

    /// 写入缓存片段失败
    #[error("写入缓存片段失败({key}): {source}")]
    WriteSpan {
        key: String,
        #[source]
        source: std::io::Error,
    },

    /// 文件操作失败
    #[error("文件操作失败: {0}")]
    FileOp(#[from] std::io::Error),

    /// 序列化失败
    #[error("序列化失败: {0}")]
    Serialization(#[from] serde_json::Error),
}

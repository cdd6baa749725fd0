//! 构建播放源相关错误（构造期故障）

use std::path::PathBuf;

/// 构建播放源错误类型
///
/// 出现在 `add` 调用内部时，整个 `add` 失败且队列保持不变。
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    /// 内置资源不存在
    #[error("内置资源不存在: {0}")]
    ResourceNotFound(String),

    /// 内置资源无法打开
    #[error("打开内置资源失败({name}): {source}")]
    ResourceUnreadable {
        name: String,
        #[source]
        source: std::io::Error,
    },

    /// 未配置内置资源目录
    #[error("未配置内置资源目录，无法加载资源: {0}")]
    NoResourceBundle(String),

    /// 描述符不是对象
    #[error("无效的曲目描述符: {0}")]
    InvalidDescriptor(String),

    /// 本地地址无法转换为路径
    #[error("无效的本地地址: {0}")]
    InvalidLocalPath(PathBuf),
}

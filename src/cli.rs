use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(
    name = "trackplayer",
    version,
    about = "播放队列与媒体缓存的命令行宿主"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// 覆盖数据目录（默认走系统 data_local_dir）
    #[arg(long, env = "TRACKPLAYER_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// 覆盖日志目录（默认 `{data_dir}/logs`）
    #[arg(long, env = "TRACKPLAYER_LOG_DIR")]
    pub log_dir: Option<PathBuf>,

    /// 覆盖日志过滤（等价于设置 RUST_LOG）
    #[arg(long, env = "RUST_LOG")]
    pub log_filter: Option<String>,

    /// 日志同时输出到 stderr
    #[arg(short, long)]
    pub verbose: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// 媒体缓存维护
    Cache {
        #[command(subcommand)]
        command: CacheCommand,
    },

    /// 经缓存路径读取远程资源
    Fetch {
        url: String,

        /// 起始字节
        #[arg(long, default_value_t = 0)]
        offset: u64,

        /// 读取长度（默认读到末尾）
        #[arg(long)]
        length: Option<u64>,
    },

    /// 用静音播放器跑一遍队列操作
    Demo {
        /// 曲目地址，或 JSON 描述符
        #[arg(required = true)]
        tracks: Vec<String>,
    },

    /// 打印生效的设置
    Settings {
        /// 写回 settings.json
        #[arg(long)]
        write: bool,
    },
}

#[derive(Debug, Subcommand)]
pub enum CacheCommand {
    /// 已占用字节数
    Size,
    /// 已缓存的 key
    List,
    /// 清空缓存
    Clear,
    /// 是否缓存了某个地址
    Has { url: String },
}

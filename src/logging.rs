//! 日志初始化：按天滚动的文件日志，命令行可加一路 stderr

use std::fs;
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

const LOG_FILE_PREFIX: &str = "trackplayer.log";
const FALLBACK_DIR_NAME: &str = "trackplayer-logs";
/// 网络库只保留告警，缓存和队列的 debug 需要显式打开
const DEFAULT_DIRECTIVES: &str = "info,reqwest=warn,hyper=warn";

/// 持有到进程退出，保证日志刷盘
pub struct LogGuard(#[allow(dead_code)] Option<WorkerGuard>);

#[derive(Debug, Clone, Default)]
pub struct LogConfig {
    pub dir: Option<PathBuf>,
    pub filter: Option<String>,
    /// 同时输出到 stderr
    pub stderr: bool,
}

/// 日志目录：显式指定 > `{data_dir}/logs`，建不出来时退到临时目录
fn resolve_log_dir(data_dir: &Path, dir: Option<PathBuf>) -> PathBuf {
    let wanted = dir.unwrap_or_else(|| data_dir.join("logs"));
    if fs::create_dir_all(&wanted).is_ok() {
        return wanted;
    }
    let fallback = std::env::temp_dir().join(FALLBACK_DIR_NAME);
    let _ = fs::create_dir_all(&fallback);
    fallback
}

/// 过滤规则：命令行 > RUST_LOG > 默认
fn filter_directives(cli: Option<&str>, env: Option<&str>) -> String {
    [cli, env]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|s| !s.is_empty())
        .unwrap_or(DEFAULT_DIRECTIVES)
        .to_owned()
}

pub fn init(data_dir: &Path, cfg: LogConfig) -> LogGuard {
    let log_dir = resolve_log_dir(data_dir, cfg.dir);

    let file_appender = tracing_appender::rolling::daily(&log_dir, LOG_FILE_PREFIX);
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    let env = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let directives = filter_directives(cfg.filter.as_deref(), env.as_deref());
    let filter = EnvFilter::try_new(&directives).unwrap_or_else(|e| {
        eprintln!("日志过滤规则无效({directives}): {e}，使用默认规则");
        EnvFilter::new(DEFAULT_DIRECTIVES)
    });

    // 会话线程和读取线程交错写日志，带上线程名便于区分
    let file_layer = fmt::layer()
        .with_ansi(false)
        .with_target(true)
        .with_thread_names(true)
        .with_writer(file_writer);
    let stderr_layer = cfg
        .stderr
        .then(|| fmt::layer().with_target(false).with_writer(std::io::stderr));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(stderr_layer)
        .try_init();
    tracing::info!(log_dir = %log_dir.display(), directives = %directives, "tracing 已初始化");

    LogGuard(Some(guard))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_prefers_cli_then_env() {
        assert_eq!(filter_directives(Some("debug"), Some("warn")), "debug");
        assert_eq!(filter_directives(Some("  "), Some("warn")), "warn");
        assert_eq!(filter_directives(None, None), DEFAULT_DIRECTIVES);
        assert_eq!(filter_directives(None, Some("")), DEFAULT_DIRECTIVES);
    }

    #[test]
    fn log_dir_defaults_under_data_dir() {
        let dir = tempfile::tempdir().expect("tempdir");
        let resolved = resolve_log_dir(dir.path(), None);
        assert_eq!(resolved, dir.path().join("logs"));
        assert!(resolved.is_dir());

        let custom = dir.path().join("elsewhere");
        assert_eq!(resolve_log_dir(dir.path(), Some(custom.clone())), custom);
    }

    #[test]
    fn unusable_log_dir_falls_back_to_temp() {
        let dir = tempfile::tempdir().expect("tempdir");
        let blocker = dir.path().join("file");
        fs::write(&blocker, b"x").expect("write");

        let resolved = resolve_log_dir(dir.path(), Some(blocker.join("logs")));
        assert_eq!(resolved, std::env::temp_dir().join(FALLBACK_DIR_NAME));
    }
}

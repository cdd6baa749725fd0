use clap::Parser;
use std::path::Path;
use std::time::Duration;
use trackplayer::cache::CacheStore;
use trackplayer::cli::{CacheCommand, Cli, Command};
use trackplayer::datasource::{DataSpec, read_to_end};
use trackplayer::engine::NullPlayer;
use trackplayer::error::{AppError, SourceError};
use trackplayer::logging;
use trackplayer::model::{Track, TrackDescriptor};
use trackplayer::playback::SessionConfig;
use trackplayer::resolver::MediaResolver;
use trackplayer::service::spawn_playback_service;
use trackplayer::settings::{self, PlayerSettings};
use trackplayer::startup::ReadinessGate;

const FETCH_ATTEMPTS: u32 = 3;
const FETCH_BACKOFF_MS: u64 = 250;
const FETCH_BACKOFF_MAX_MS: u64 = 4000;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let cli = Cli::parse();

    let data_dir = cli
        .data_dir
        .clone()
        .unwrap_or_else(settings::default_data_dir);

    let _log_guard = logging::init(
        &data_dir,
        logging::LogConfig {
            dir: cli.log_dir.clone(),
            filter: cli.log_filter.clone(),
            stderr: cli.verbose,
        },
    );
    tracing::info!(data_dir = %data_dir.display(), "trackplayer 启动");

    let player_settings = settings::apply_env_overrides(settings::load_settings(&data_dir));
    let config = SessionConfig::from_settings(&data_dir, &player_settings);

    match cli.command {
        Command::Cache { command } => run_cache(&config, command),
        Command::Fetch {
            url,
            offset,
            length,
        } => fetch(config, url, offset, length).await,
        Command::Demo { tracks } => demo(config, tracks).await,
        Command::Settings { write } => show_settings(&data_dir, &player_settings, write),
    }
}

fn open_cache(config: &SessionConfig) -> Result<CacheStore, AppError> {
    let cache = CacheStore::open(&config.cache_root, config.cache_capacity_bytes);
    if !cache.is_enabled() {
        return Err(AppError::Other(
            "缓存未启用（max_cache_size_kb <= 0 或缓存目录不可用）".to_owned(),
        ));
    }
    Ok(cache)
}

fn run_cache(config: &SessionConfig, command: CacheCommand) -> Result<(), AppError> {
    let cache = open_cache(config)?;
    match command {
        CacheCommand::Size => println!("{}", cache.size_bytes()),
        CacheCommand::List => {
            for key in cache.keys() {
                println!("{key}");
            }
        }
        CacheCommand::Clear => {
            let removed = cache.clear();
            println!("已删除 {removed} 条缓存记录");
        }
        CacheCommand::Has { url } => println!("{}", cache.is_cached(&url)),
    }
    cache.release();
    Ok(())
}

async fn fetch(
    config: SessionConfig,
    url: String,
    offset: u64,
    length: Option<u64>,
) -> Result<(), AppError> {
    let cache = CacheStore::open(&config.cache_root, config.cache_capacity_bytes);
    let resolver = MediaResolver::new(config.resolver);
    let track = Track::new(TrackDescriptor::from_url(url.clone()));
    let media = resolver.resolve(&track, &cache)?;
    tracing::info!(url = %url, offset, ?length, path = ?media.path, "开始读取");

    let mut spec = DataSpec::new(&media.uri).at(offset);
    if let Some(len) = length {
        spec = spec.with_length(len);
    }
    let mut attempt = 0;
    let bytes = loop {
        attempt += 1;
        let factory = media.data_source.clone();
        let spec = spec.clone();
        // 阻塞 I/O 放到专用线程
        let result = tokio::task::spawn_blocking(move || -> Result<u64, SourceError> {
            let mut source = factory.create();
            let mut out = Vec::new();
            let result = source
                .open(&spec)
                .and_then(|_| read_to_end(source.as_mut(), &mut out));
            source.close();
            result
        })
        .await
        .map_err(|e| AppError::Other(format!("读取任务异常退出: {e}")))?;

        match result {
            Err(e) if e.is_retryable() && attempt < FETCH_ATTEMPTS => {
                tracing::warn!(attempt, err = %e, "读取失败，重试");
                sleep_backoff(attempt).await;
            }
            other => break other?,
        }
    };

    println!("读取 {bytes} 字节，已缓存: {}", cache.is_cached(&url));
    cache.release();
    Ok(())
}

async fn sleep_backoff(attempt: u32) {
    let ms = FETCH_BACKOFF_MS
        .saturating_mul(2u64.saturating_pow(attempt.min(6)))
        .min(FETCH_BACKOFF_MAX_MS);
    tokio::time::sleep(Duration::from_millis(ms)).await;
}

fn parse_track(arg: &str) -> Result<Track, AppError> {
    if arg.trim_start().starts_with('{') {
        let value: serde_json::Value = serde_json::from_str(arg)?;
        return Ok(Track::from_value(value)?);
    }
    Ok(Track::new(TrackDescriptor::from_url(arg)))
}

async fn demo(config: SessionConfig, args: Vec<String>) -> Result<(), AppError> {
    let tracks = args
        .iter()
        .map(String::as_str)
        .map(parse_track)
        .collect::<Result<Vec<_>, _>>()?;
    let count = tracks.len();

    let (handle, mut notices) =
        spawn_playback_service(&ReadinessGate::ready(), config, |_| NullPlayer::new());

    let index = handle.add(tracks, None).await?;
    println!("已加入队列，起始索引 {index}");
    handle.play().await?;

    // 循环模式为 Queue 时 skip_to_next 不会失败，按曲目数限定
    for _ in 0..count {
        let current = handle.current_track_index().await?;
        if let Some(i) = current
            && let Some(track) = handle.track(i).await?
        {
            println!(
                "[{i}] {} ({})",
                track.metadata().title.as_deref().unwrap_or("-"),
                track.uri()
            );
        }
        if handle.skip_to_next().await.is_err() {
            break;
        }
    }

    println!("状态: {:?}", handle.state().await?);
    handle.reset().await?;
    handle.destroy().await?;
    drop(handle);

    loop {
        tokio::select! {
            notice = notices.recv() => {
                let Some(notice) = notice else { break };
                tracing::debug!(?notice, "notice");
                println!("{notice:?}");
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("收到中断信号，停止输出");
                break;
            }
        }
    }
    Ok(())
}

fn show_settings(data_dir: &Path, s: &PlayerSettings, write: bool) -> Result<(), AppError> {
    println!("{}", serde_json::to_string_pretty(s)?);
    if write {
        settings::save_settings(data_dir, s)?;
        println!("已写入 {}", data_dir.join("settings.json").display());
    }
    Ok(())
}

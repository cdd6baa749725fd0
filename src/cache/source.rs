use std::fmt;
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom, Take, Write};
use tempfile::NamedTempFile;

use super::{CacheStore, SpanHit};
use crate::datasource::{DataSource, DataSourceFactory, DataSpec, SharedFactory};
use crate::error::SourceError;

/// 为网络数据源加缓存的工厂
pub struct CacheDataSourceFactory {
    cache: CacheStore,
    upstream: SharedFactory,
}

impl CacheDataSourceFactory {
    pub fn new(cache: CacheStore, upstream: SharedFactory) -> Self {
        Self { cache, upstream }
    }
}

impl fmt::Debug for CacheDataSourceFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheDataSourceFactory")
            .field("cache", &self.cache)
            .field("upstream", &self.upstream)
            .finish()
    }
}

impl DataSourceFactory for CacheDataSourceFactory {
    fn create(&self) -> Box<dyn DataSource> {
        Box::new(CacheDataSource::new(self.cache.clone(), self.upstream.create()))
    }
}

struct SpanWriter {
    file: NamedTempFile,
    start: u64,
    written: u64,
}

impl SpanWriter {
    fn append(&mut self, data: &[u8]) -> std::io::Result<()> {
        self.file.write_all(data)?;
        self.written += data.len() as u64;
        Ok(())
    }
}

enum Current {
    Idle,
    Cached(Take<BufReader<File>>),
    Upstream(Option<SpanWriter>),
    Ended,
}

enum Step {
    Read(usize),
    SpanExhausted,
    CacheFailed(std::io::Error),
    UpstreamEnded,
}

/// 优先从缓存区间读取，未命中部分回源并边读边写入缓存。
///
/// 缓存读失败时本次请求剩余部分改为直接回源，不再写缓存。
pub struct CacheDataSource {
    cache: CacheStore,
    upstream: Box<dyn DataSource>,
    spec: Option<DataSpec>,
    position: u64,
    remaining: Option<u64>,
    current: Current,
    /// 回源读到此位置就停下，后面接着读已缓存的区间
    upstream_end: Option<u64>,
    ignore_cache: bool,
}

impl CacheDataSource {
    pub fn new(cache: CacheStore, upstream: Box<dyn DataSource>) -> Self {
        Self {
            cache,
            upstream,
            spec: None,
            position: 0,
            remaining: None,
            current: Current::Idle,
            upstream_end: None,
            ignore_cache: false,
        }
    }

    fn key(&self) -> Option<String> {
        self.spec.as_ref().map(|s| s.cache_key().to_owned())
    }

    fn open_cached(&mut self, hit: &SpanHit) -> std::io::Result<()> {
        let mut file = File::open(&hit.path)?;
        file.seek(SeekFrom::Start(self.position - hit.position))?;
        let mut limit = hit.end() - self.position;
        if let Some(remaining) = self.remaining {
            limit = limit.min(remaining);
        }
        self.current = Current::Cached(BufReader::new(file).take(limit));
        Ok(())
    }

    /// 从当前位置打开下一段：命中缓存读缓存，否则回源。
    ///
    /// 回源只读到下一个已缓存区间的起点，避免重复缓存同一段字节。
    /// 返回上游给出的到资源末尾的剩余长度；回源被截断时为 None。
    fn open_at_position(&mut self) -> Result<Option<u64>, SourceError> {
        let Some(spec) = self.spec.as_ref() else {
            return Err(SourceError::NotOpened);
        };
        let mut sub = spec.subrange(self.position);
        self.upstream_end = None;

        if self.remaining == Some(0) {
            self.current = Current::Ended;
            return Ok(Some(0));
        }

        if !self.ignore_cache
            && let Some(hit) = self.cache.lookup(sub.cache_key(), self.position)
        {
            match self.open_cached(&hit) {
                Ok(()) => {
                    tracing::debug!(key = %sub.cache_key(), position = self.position, "命中缓存区间");
                    return Ok(None);
                }
                Err(e) => {
                    tracing::warn!(key = %sub.cache_key(), err = %e, "读取缓存区间失败，改为回源");
                    self.ignore_cache = true;
                }
            }
        }

        let next_cached = if self.ignore_cache {
            None
        } else {
            self.cache.next_span_start(sub.cache_key(), self.position)
        };
        let capped = next_cached.filter(|&next| {
            sub.length
                .is_none_or(|len| self.position.saturating_add(len) > next)
        });
        if let Some(next) = capped {
            sub = sub.with_length(next - self.position);
        }

        let upstream_remaining = self.upstream.open(&sub)?;
        self.upstream_end = capped;
        let writer = if self.ignore_cache {
            None
        } else {
            self.cache.begin_span().map(|file| SpanWriter {
                file,
                start: self.position,
                written: 0,
            })
        };
        self.current = Current::Upstream(writer);

        if capped.is_some() {
            return Ok(None);
        }
        if sub.length.is_none()
            && let Some(len) = upstream_remaining
        {
            self.cache
                .record_content_length(sub.cache_key(), self.position + len);
        }
        Ok(upstream_remaining)
    }

    /// 缓存区间读完后接着读下一段；没有更多数据时返回 false
    fn advance(&mut self) -> Result<bool, SourceError> {
        self.current = Current::Idle;
        if self.remaining == Some(0) {
            self.current = Current::Ended;
            return Ok(false);
        }
        if let Some(key) = self.key()
            && let Some(total) = self.cache.content_length(&key)
            && self.position >= total
        {
            self.current = Current::Ended;
            return Ok(false);
        }

        match self.open_at_position() {
            Ok(_) => Ok(true),
            Err(SourceError::StatusCode { status, .. })
                if status == reqwest::StatusCode::RANGE_NOT_SATISFIABLE =>
            {
                self.current = Current::Ended;
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    fn finish_writer(&mut self) {
        let Current::Upstream(writer) = &mut self.current else {
            return;
        };
        let Some(writer) = writer.take() else {
            return;
        };
        let Some(key) = self.spec.as_ref().map(|s| s.cache_key().to_owned()) else {
            return;
        };
        if writer.written > 0 {
            self.cache
                .commit_span(&key, writer.start, writer.written, writer.file);
        }
    }
}

impl DataSource for CacheDataSource {
    fn open(&mut self, spec: &DataSpec) -> Result<Option<u64>, SourceError> {
        self.close();
        self.spec = Some(spec.clone());
        self.position = spec.position;
        self.ignore_cache = false;

        let known_total = self.cache.content_length(spec.cache_key());
        if let Some(total) = known_total
            && spec.position > total
        {
            return Err(SourceError::PositionOutOfRange {
                position: spec.position,
                length: total,
            });
        }
        self.remaining = spec
            .length
            .or_else(|| known_total.map(|total| total - spec.position));

        let upstream_remaining = self.open_at_position()?;
        if self.remaining.is_none() {
            self.remaining = upstream_remaining;
        }
        Ok(self.remaining)
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, SourceError> {
        if buf.is_empty() {
            return Ok(0);
        }
        loop {
            let step = match &mut self.current {
                Current::Idle => return Err(SourceError::NotOpened),
                Current::Ended => return Ok(0),
                Current::Cached(reader) => match reader.read(buf) {
                    Ok(0) => Step::SpanExhausted,
                    Ok(n) => Step::Read(n),
                    Err(e) => Step::CacheFailed(e),
                },
                Current::Upstream(writer) => {
                    let n = self.upstream.read(buf)?;
                    if n == 0 {
                        Step::UpstreamEnded
                    } else {
                        let failed = match writer.as_mut() {
                            Some(w) => w.append(&buf[..n]).err(),
                            None => None,
                        };
                        if let Some(e) = failed {
                            tracing::warn!(err = %e, "写入缓存失败，本次请求不再缓存");
                            *writer = None;
                            self.ignore_cache = true;
                        }
                        Step::Read(n)
                    }
                }
            };

            match step {
                Step::Read(n) => {
                    self.position += n as u64;
                    self.remaining = self.remaining.map(|r| r.saturating_sub(n as u64));
                    return Ok(n);
                }
                Step::SpanExhausted => {
                    if !self.advance()? {
                        return Ok(0);
                    }
                }
                Step::CacheFailed(e) => {
                    tracing::warn!(err = %e, "读取缓存区间失败，改为回源");
                    self.ignore_cache = true;
                    self.current = Current::Idle;
                    self.open_at_position()?;
                }
                Step::UpstreamEnded if self.upstream_end == Some(self.position) => {
                    self.finish_writer();
                    self.upstream.close();
                    if !self.advance()? {
                        return Ok(0);
                    }
                }
                Step::UpstreamEnded => {
                    self.finish_writer();
                    if let Some(spec) = self.spec.as_ref()
                        && spec.length.is_none()
                    {
                        self.cache
                            .record_content_length(spec.cache_key(), self.position);
                    }
                    self.current = Current::Ended;
                    return Ok(0);
                }
            }
        }
    }

    fn close(&mut self) {
        self.finish_writer();
        if matches!(self.current, Current::Upstream(_) | Current::Ended) {
            self.upstream.close();
        }
        self.current = Current::Idle;
        self.spec = None;
        self.remaining = None;
        self.upstream_end = None;
    }
}

impl Drop for CacheDataSource {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datasource::{FileDataSourceFactory, read_to_end};
    use std::sync::Arc;

    fn read_all(source: &mut dyn DataSource, spec: &DataSpec) -> Vec<u8> {
        source.open(spec).expect("open");
        let mut out = Vec::new();
        read_to_end(source, &mut out).expect("read");
        source.close();
        out
    }

    #[test]
    fn read_through_fills_cache() {
        let media = tempfile::tempdir().expect("tempdir");
        let file = media.path().join("a.bin");
        std::fs::write(&file, b"0123456789").expect("write");
        let uri = file.display().to_string();

        let cache_dir = tempfile::tempdir().expect("tempdir");
        let cache = CacheStore::open(cache_dir.path(), 1024);
        let factory = cache.wrap(Arc::new(FileDataSourceFactory::new()));

        let mut source = factory.create();
        assert_eq!(read_all(source.as_mut(), &DataSpec::new(&uri)), b"0123456789");
        assert!(cache.is_cached(&uri));
        assert_eq!(cache.cached_bytes(&uri), 10);

        // 删除源文件后仍能从缓存读出
        std::fs::remove_file(&file).expect("remove");
        let mut source = factory.create();
        assert_eq!(
            read_all(source.as_mut(), &DataSpec::new(&uri).at(4).with_length(3)),
            b"456"
        );
    }

    #[test]
    fn partial_hit_continues_from_upstream() {
        let media = tempfile::tempdir().expect("tempdir");
        let file = media.path().join("a.bin");
        std::fs::write(&file, b"abcdefghij").expect("write");
        let uri = file.display().to_string();

        let cache_dir = tempfile::tempdir().expect("tempdir");
        let cache = CacheStore::open(cache_dir.path(), 1024);
        let factory = cache.wrap(Arc::new(FileDataSourceFactory::new()));

        let mut source = factory.create();
        assert_eq!(
            read_all(source.as_mut(), &DataSpec::new(&uri).with_length(4)),
            b"abcd"
        );
        assert_eq!(cache.cached_bytes(&uri), 4);

        let mut source = factory.create();
        assert_eq!(read_all(source.as_mut(), &DataSpec::new(&uri)), b"abcdefghij");
        assert_eq!(cache.cached_bytes(&uri), 10);
    }

    #[test]
    fn upstream_stops_at_next_cached_span() {
        let media = tempfile::tempdir().expect("tempdir");
        let file = media.path().join("a.bin");
        std::fs::write(&file, b"0123456789").expect("write");
        let uri = file.display().to_string();

        let cache_dir = tempfile::tempdir().expect("tempdir");
        let cache = CacheStore::open(cache_dir.path(), 1024);
        let factory = cache.wrap(Arc::new(FileDataSourceFactory::new()));

        let mut source = factory.create();
        assert_eq!(read_all(source.as_mut(), &DataSpec::new(&uri).at(5)), b"56789");
        let mut source = factory.create();
        assert_eq!(read_all(source.as_mut(), &DataSpec::new(&uri)), b"0123456789");

        assert_eq!(cache.cached_bytes(&uri), 10);
        assert_eq!(cache.size_bytes(), 10);

        // 两段区间拼起来能完整读出
        std::fs::remove_file(&file).expect("remove");
        let mut source = factory.create();
        assert_eq!(read_all(source.as_mut(), &DataSpec::new(&uri)), b"0123456789");
    }

    fn read_n(source: &mut dyn DataSource, n: usize) -> Vec<u8> {
        let mut out = vec![0u8; n];
        let mut filled = 0;
        while filled < n {
            let got = source.read(&mut out[filled..]).expect("read");
            assert!(got > 0, "unexpected end of data");
            filled += got;
        }
        out
    }

    #[test]
    fn clear_during_cached_read_keeps_reading() {
        let media = tempfile::tempdir().expect("tempdir");
        let file = media.path().join("a.bin");
        std::fs::write(&file, b"0123456789").expect("write");
        let uri = file.display().to_string();

        let cache_dir = tempfile::tempdir().expect("tempdir");
        let cache = CacheStore::open(cache_dir.path(), 1024);
        let factory = cache.wrap(Arc::new(FileDataSourceFactory::new()));
        let mut source = factory.create();
        read_all(source.as_mut(), &DataSpec::new(&uri));
        assert!(cache.is_cached(&uri));

        let mut source = factory.create();
        source.open(&DataSpec::new(&uri)).expect("open");
        assert_eq!(read_n(source.as_mut(), 3), b"012");

        cache.clear();
        let mut rest = Vec::new();
        read_to_end(source.as_mut(), &mut rest).expect("read");
        source.close();

        assert_eq!(rest, b"3456789");
        assert!(!cache.is_cached(&uri));
        assert_eq!(cache.size_bytes(), 0);
    }

    #[test]
    fn release_during_upstream_read_keeps_reading() {
        let media = tempfile::tempdir().expect("tempdir");
        let file = media.path().join("a.bin");
        std::fs::write(&file, b"0123456789").expect("write");
        let uri = file.display().to_string();

        let cache_dir = tempfile::tempdir().expect("tempdir");
        let cache = CacheStore::open(cache_dir.path(), 1024);
        let factory = cache.wrap(Arc::new(FileDataSourceFactory::new()));

        let mut source = factory.create();
        source.open(&DataSpec::new(&uri)).expect("open");
        assert_eq!(read_n(source.as_mut(), 4), b"0123");

        cache.release();
        let mut rest = Vec::new();
        read_to_end(source.as_mut(), &mut rest).expect("read");
        source.close();

        assert_eq!(rest, b"456789");
        assert!(!cache.is_cached(&uri));
        // 未提交的临时文件随数据源一起清理，只剩索引
        let leftovers = std::fs::read_dir(cache_dir.path())
            .expect("read_dir")
            .filter_map(Result::ok)
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .filter(|name| name != "index.json")
            .collect::<Vec<_>>();
        assert!(leftovers.is_empty(), "stray files: {leftovers:?}");
    }

    #[test]
    fn disabled_cache_passes_through() {
        let media = tempfile::tempdir().expect("tempdir");
        let file = media.path().join("a.bin");
        std::fs::write(&file, b"xyz").expect("write");
        let uri = file.display().to_string();

        let cache = CacheStore::disabled();
        let factory = cache.wrap(Arc::new(FileDataSourceFactory::new()));
        let mut source = factory.create();
        assert_eq!(read_all(source.as_mut(), &DataSpec::new(&uri)), b"xyz");
        assert!(!cache.is_cached(&uri));
    }

    #[test]
    fn caches_http_responses() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("GET", "/song.mp3")
            .with_status(200)
            .with_body("abcdef")
            .expect(1)
            .create();
        let uri = format!("{}/song.mp3", server.url());

        let cache_dir = tempfile::tempdir().expect("tempdir");
        let cache = CacheStore::open(cache_dir.path(), 1024);
        let upstream = Arc::new(crate::datasource::HttpDataSourceFactory::new(
            crate::datasource::HttpConfig::new("trackplayer-test"),
        ));
        let factory = cache.wrap(upstream);

        for _ in 0..2 {
            let mut source = factory.create();
            assert_eq!(read_all(source.as_mut(), &DataSpec::new(&uri)), b"abcdef");
        }
        mock.assert();
    }
}

use std::sync::Arc;
use tokio::sync::mpsc;
use trackplayer::cache::CacheStore;
use trackplayer::datasource::{
    DataSourceFactory, DataSpec, HttpConfig, HttpDataSourceFactory, read_to_end,
};
use trackplayer::engine::NullPlayer;
use trackplayer::model::{Track, TrackDescriptor};
use trackplayer::playback::{CACHE_DIR_NAME, Playback, SessionConfig};
use trackplayer::resolver::{DataPath, MediaResolver};

fn read(factory: &dyn DataSourceFactory, spec: &DataSpec) -> Vec<u8> {
    let mut source = factory.create();
    source.open(spec).expect("open");
    let mut out = Vec::new();
    read_to_end(source.as_mut(), &mut out).expect("read");
    source.close();
    out
}

#[test]
fn clear_cache_then_not_cached() {
    let mut server = mockito::Server::new();
    let _mock = server
        .mock("GET", "/a.mp3")
        .with_status(200)
        .with_body("0123456789")
        .create();
    let url = format!("{}/a.mp3", server.url());

    let dir = tempfile::tempdir().expect("tempdir");
    let cache_root = dir.path().join(CACHE_DIR_NAME);

    // 通过解析出的播放源读取，数据写进会话使用的同一个缓存目录
    {
        let cache = CacheStore::open(&cache_root, 1024 * 1024);
        let media = MediaResolver::default()
            .resolve(&Track::new(TrackDescriptor::from_url(&url)), &cache)
            .expect("resolve");
        assert_eq!(media.path, DataPath::Network { cached: true });
        assert_eq!(
            read(media.data_source.as_ref(), &DataSpec::new(&url)),
            b"0123456789"
        );
        cache.release();
    }

    let (tx, _rx) = mpsc::unbounded_channel();
    let config = SessionConfig::new(dir.path()).with_cache_capacity(1024 * 1024);
    let mut playback = Playback::new(NullPlayer::new(), config, tx);
    assert!(playback.is_cached(&url));
    assert_eq!(playback.cache_size_bytes(), 10);

    assert_eq!(playback.clear_cache(), 1);
    assert!(!playback.is_cached(&url));
    assert_eq!(playback.cache_size_bytes(), 0);

    playback.destroy();
    assert!(!playback.is_cached(&url));
}

#[test]
fn eviction_keeps_total_under_capacity() {
    let mut server = mockito::Server::new();
    let mut urls = Vec::new();
    let mut mocks = Vec::new();
    for name in ["a", "b", "c"] {
        let path = format!("/{name}.mp3");
        mocks.push(
            server
                .mock("GET", path.as_str())
                .with_status(200)
                .with_body("xxxxxxxx")
                .create(),
        );
        urls.push(format!("{}{path}", server.url()));
    }

    let dir = tempfile::tempdir().expect("tempdir");
    let cache = CacheStore::open(dir.path(), 20);
    let factory = cache.wrap(Arc::new(HttpDataSourceFactory::new(HttpConfig::new(
        "trackplayer-test",
    ))));

    for url in &urls {
        assert_eq!(read(factory.as_ref(), &DataSpec::new(url)).len(), 8);
        assert!(cache.size_bytes() <= 20);
    }
    assert!(!cache.is_cached(&urls[0]));
    assert!(cache.is_cached(&urls[1]));
    assert!(cache.is_cached(&urls[2]));
}

#[test]
fn cached_range_served_without_upstream() {
    let mut server = mockito::Server::new();
    let mock = server
        .mock("GET", "/r.mp3")
        .with_status(200)
        .with_body("abcdefghij")
        .expect(1)
        .create();
    let url = format!("{}/r.mp3", server.url());

    let dir = tempfile::tempdir().expect("tempdir");
    let cache = CacheStore::open(dir.path(), 1024);
    let factory = cache.wrap(Arc::new(HttpDataSourceFactory::new(HttpConfig::new(
        "trackplayer-test",
    ))));

    assert_eq!(read(factory.as_ref(), &DataSpec::new(&url)), b"abcdefghij");
    assert_eq!(
        read(factory.as_ref(), &DataSpec::new(&url).at(3).with_length(4)),
        b"defg"
    );
    assert_eq!(read(factory.as_ref(), &DataSpec::new(&url).at(10)), b"");
    mock.assert();
}

//! 曲目描述符与队列中的 `Track`

use reqwest::Url;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::ResolveError;

/// 媒体类型；在构建播放源时只分派一次
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackType {
    #[default]
    Default,
    Dash,
    Hls,
    SmoothStreaming,
}

impl TrackType {
    /// 大小写不敏感；无法识别的值回退到 `Default`
    pub fn parse_lossy(s: &str) -> Self {
        let normalized = s
            .trim()
            .chars()
            .filter(|c| *c != '-' && *c != '_')
            .collect::<String>()
            .to_ascii_lowercase();
        match normalized.as_str() {
            "dash" => TrackType::Dash,
            "hls" => TrackType::Hls,
            "smoothstreaming" => TrackType::SmoothStreaming,
            _ => TrackType::Default,
        }
    }
}

impl fmt::Display for TrackType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackType::Default => write!(f, "default"),
            TrackType::Dash => write!(f, "dash"),
            TrackType::Hls => write!(f, "hls"),
            TrackType::SmoothStreaming => write!(f, "smoothstreaming"),
        }
    }
}

/// 描述符里的 `url` 字段：普通地址，或内置资源引用
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Locator {
    Uri(String),
    Resource { resource: String },
}

/// 宿主传入的原始曲目描述符
///
/// 未识别的字段保存在 `extra` 里，原样回传给宿主。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackDescriptor {
    pub url: Locator,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub content_type: Option<String>,
    #[serde(default)]
    pub user_agent: Option<String>,
    #[serde(default)]
    pub headers: Option<BTreeMap<String, String>>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub artist: Option<String>,
    #[serde(default)]
    pub album: Option<String>,
    #[serde(default)]
    pub artwork: Option<String>,
    /// 秒
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TrackDescriptor {
    pub fn from_url(url: impl Into<String>) -> Self {
        Self {
            url: Locator::Uri(url.into()),
            kind: None,
            content_type: None,
            user_agent: None,
            headers: None,
            title: None,
            artist: None,
            album: None,
            artwork: None,
            duration: None,
            extra: Map::new(),
        }
    }

    pub fn from_resource(name: impl Into<String>) -> Self {
        Self {
            url: Locator::Resource {
                resource: name.into(),
            },
            ..Self::from_url(String::new())
        }
    }

    pub fn with_type(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }
}

/// 曲目展示信息
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackMetadata {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub artwork: Option<String>,
    pub duration_ms: Option<u64>,
}

/// 曲目数据的位置
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TrackSource {
    Uri { uri: String },
    Resource { name: String },
}

impl TrackSource {
    /// 用作缓存 key 和播放器条目地址
    pub fn uri(&self) -> String {
        match self {
            TrackSource::Uri { uri } => uri.clone(),
            TrackSource::Resource { name } => format!("resource:///{name}"),
        }
    }

    pub fn is_resource(&self) -> bool {
        matches!(self, TrackSource::Resource { .. })
    }

    /// 无 scheme、`file` scheme 或盘符（单字母 scheme）视为本地
    pub fn is_local(&self) -> bool {
        match self {
            TrackSource::Resource { .. } => true,
            TrackSource::Uri { uri } => match Url::parse(uri) {
                Ok(url) => url.scheme() == "file" || url.scheme().len() == 1,
                Err(_) => true,
            },
        }
    }

    /// 本地地址对应的文件路径
    pub fn local_path(&self) -> Option<PathBuf> {
        let TrackSource::Uri { uri } = self else {
            return None;
        };
        match Url::parse(uri) {
            Ok(url) if url.scheme() == "file" => url.to_file_path().ok(),
            Ok(url) if url.scheme().len() == 1 => Some(PathBuf::from(uri)),
            Ok(_) => None,
            Err(_) => Some(PathBuf::from(uri)),
        }
    }
}

static LAST_QUEUE_ID: AtomicU64 = AtomicU64::new(0);

/// 基于创建时间、严格递增的队列 id
fn next_queue_id() -> u64 {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64;
    let prev = LAST_QUEUE_ID
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
            Some(now.max(last.saturating_add(1)))
        })
        .unwrap_or(now);
    now.max(prev.saturating_add(1))
}

/// 队列中的曲目，构造后不可变
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    source: TrackSource,
    kind: TrackType,
    content_type: Option<String>,
    user_agent: Option<String>,
    headers: BTreeMap<String, String>,
    metadata: TrackMetadata,
    queue_id: u64,
    original: TrackDescriptor,
}

impl Track {
    pub fn new(descriptor: TrackDescriptor) -> Self {
        let source = match &descriptor.url {
            Locator::Uri(uri) => TrackSource::Uri { uri: uri.clone() },
            Locator::Resource { resource } => TrackSource::Resource {
                name: resource.clone(),
            },
        };
        let kind = descriptor
            .kind
            .as_deref()
            .map(TrackType::parse_lossy)
            .unwrap_or_default();
        let metadata = TrackMetadata {
            title: descriptor.title.clone(),
            artist: descriptor.artist.clone(),
            album: descriptor.album.clone(),
            artwork: descriptor.artwork.clone(),
            duration_ms: descriptor
                .duration
                .filter(|d| d.is_finite() && *d >= 0.0)
                .map(|d| (d * 1000.0) as u64),
        };

        Self {
            source,
            kind,
            content_type: descriptor.content_type.clone(),
            user_agent: descriptor.user_agent.clone().filter(|ua| !ua.is_empty()),
            headers: descriptor.headers.clone().unwrap_or_default(),
            metadata,
            queue_id: next_queue_id(),
            original: descriptor,
        }
    }

    /// 从宿主传入的 JSON 构造单个曲目
    pub fn from_value(value: Value) -> Result<Self, ResolveError> {
        if !value.is_object() {
            return Err(ResolveError::InvalidDescriptor(value.to_string()));
        }
        let descriptor = serde_json::from_value::<TrackDescriptor>(value)
            .map_err(|e| ResolveError::InvalidDescriptor(e.to_string()))?;
        Ok(Self::new(descriptor))
    }

    /// 批量构造；任何一项不是合法对象时整体失败
    pub fn from_values(values: Vec<Value>) -> Result<Vec<Self>, ResolveError> {
        values.into_iter().map(Self::from_value).collect()
    }

    pub fn source(&self) -> &TrackSource {
        &self.source
    }

    pub fn uri(&self) -> String {
        self.source.uri()
    }

    pub fn kind(&self) -> TrackType {
        self.kind
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    pub fn user_agent(&self) -> Option<&str> {
        self.user_agent.as_deref()
    }

    pub fn headers(&self) -> &BTreeMap<String, String> {
        &self.headers
    }

    pub fn metadata(&self) -> &TrackMetadata {
        &self.metadata
    }

    pub fn queue_id(&self) -> u64 {
        self.queue_id
    }

    pub fn original(&self) -> &TrackDescriptor {
        &self.original
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_descriptor_with_extras() {
        let track = Track::from_value(json!({
            "url": "https://cdn.example.com/a.m3u8",
            "type": "HLS",
            "userAgent": "",
            "headers": { "Authorization": "Bearer x" },
            "title": "A",
            "duration": 12.5,
            "customId": 7
        }))
        .unwrap();

        assert_eq!(track.kind(), TrackType::Hls);
        assert_eq!(track.user_agent(), None);
        assert_eq!(
            track.headers().get("Authorization").map(String::as_str),
            Some("Bearer x")
        );
        assert_eq!(track.metadata().duration_ms, Some(12_500));
        assert_eq!(track.original().extra.get("customId"), Some(&json!(7)));
    }

    #[test]
    fn resource_locator_is_recognized() {
        let track = Track::from_value(json!({ "url": { "resource": "intro" } })).unwrap();
        assert!(track.source().is_resource());
        assert_eq!(track.uri(), "resource:///intro");
    }

    #[test]
    fn unknown_type_falls_back_to_default() {
        assert_eq!(TrackType::parse_lossy("smooth-streaming"), TrackType::SmoothStreaming);
        assert_eq!(TrackType::parse_lossy("SmoothStreaming"), TrackType::SmoothStreaming);
        assert_eq!(TrackType::parse_lossy("mp3"), TrackType::Default);
    }

    #[test]
    fn local_detection() {
        let local = |uri: &str| TrackSource::Uri { uri: uri.to_owned() }.is_local();
        assert!(local("/music/a.mp3"));
        assert!(local("file:///music/a.mp3"));
        assert!(local("C:\\music\\a.mp3"));
        assert!(!local("https://example.com/a.mp3"));
        assert_eq!(
            TrackSource::Uri {
                uri: "/music/a.mp3".to_owned()
            }
            .local_path(),
            Some(PathBuf::from("/music/a.mp3"))
        );
    }

    #[test]
    fn queue_ids_strictly_increase() {
        let a = Track::new(TrackDescriptor::from_url("a"));
        let b = Track::new(TrackDescriptor::from_url("b"));
        let c = Track::new(TrackDescriptor::from_url("c"));
        assert!(a.queue_id() < b.queue_id());
        assert!(b.queue_id() < c.queue_id());
    }

    #[test]
    fn batch_rejects_non_object() {
        let err = Track::from_values(vec![json!({ "url": "a" }), json!(3)]).unwrap_err();
        assert!(matches!(err, ResolveError::InvalidDescriptor(_)));
    }
}

use once_cell::sync::OnceCell;
use reqwest::StatusCode;
use reqwest::blocking::Client;
use reqwest::header::{CONTENT_LENGTH, HeaderMap, HeaderName, HeaderValue, RANGE};
use reqwest::redirect::Policy;
use std::collections::BTreeMap;
use std::io::{self, Read};
use std::sync::Arc;
use std::time::Duration;

use super::{DataSource, DataSourceFactory, DataSpec};
use crate::error::SourceError;

pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 8_000;
pub const DEFAULT_READ_TIMEOUT_MS: u64 = 8_000;

const MAX_REDIRECTS: usize = 20;

/// 网络数据源配置
#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub user_agent: String,
    pub headers: BTreeMap<String, String>,
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
    /// 允许 http <-> https 之间的跳转
    pub allow_cross_protocol_redirects: bool,
}

impl HttpConfig {
    pub fn new(user_agent: impl Into<String>) -> Self {
        Self {
            user_agent: user_agent.into(),
            headers: BTreeMap::new(),
            connect_timeout: Duration::from_millis(DEFAULT_CONNECT_TIMEOUT_MS),
            read_timeout: Duration::from_millis(DEFAULT_READ_TIMEOUT_MS),
            allow_cross_protocol_redirects: false,
        }
    }
}

fn build_client(config: &HttpConfig) -> Result<Client, SourceError> {
    let mut headers = HeaderMap::new();
    for (name, value) in &config.headers {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(n), Ok(v)) => {
                headers.insert(n, v);
            }
            _ => tracing::warn!(header = %name, "忽略无效的请求头"),
        }
    }

    let allow_cross = config.allow_cross_protocol_redirects;
    let policy = Policy::custom(move |attempt| {
        if attempt.previous().len() >= MAX_REDIRECTS {
            return attempt.stop();
        }
        let switched = attempt
            .previous()
            .last()
            .is_some_and(|prev| prev.scheme() != attempt.url().scheme());
        if switched && !allow_cross {
            attempt.stop()
        } else {
            attempt.follow()
        }
    });

    let client = Client::builder()
        .user_agent(config.user_agent.clone())
        .default_headers(headers)
        .connect_timeout(config.connect_timeout)
        .timeout(config.read_timeout)
        .redirect(policy)
        .build()?;
    Ok(client)
}

/// 网络数据源；按 Range 请求读取
pub struct HttpDataSource {
    client: Arc<OnceCell<Client>>,
    config: Arc<HttpConfig>,
    body: Option<Box<dyn Read + Send>>,
}

impl HttpDataSource {
    fn client(&self) -> Result<&Client, SourceError> {
        // 在读取线程上惰性创建，避免在异步上下文里构造阻塞客户端
        self.client.get_or_try_init(|| build_client(&self.config))
    }
}

impl DataSource for HttpDataSource {
    fn open(&mut self, spec: &DataSpec) -> Result<Option<u64>, SourceError> {
        self.close();

        let client = self.client()?;
        let mut req = client.get(&spec.uri);
        if spec.position > 0 || spec.length.is_some() {
            let range = match spec.length {
                Some(len) if len > 0 => {
                    format!("bytes={}-{}", spec.position, spec.position.saturating_add(len - 1))
                }
                _ => format!("bytes={}-", spec.position),
            };
            req = req.header(RANGE, range);
        }

        let resp = req.send()?;
        let status = resp.status();
        if !status.is_success() {
            return Err(SourceError::StatusCode {
                status,
                url: spec.uri.clone(),
            });
        }

        let content_length = resp
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok());

        let mut body: Box<dyn Read + Send> = Box::new(resp);
        let mut remaining = content_length;

        // 服务端忽略了 Range，手动跳过前缀
        if status != StatusCode::PARTIAL_CONTENT && spec.position > 0 {
            let skipped = io::copy(&mut (&mut body).take(spec.position), &mut io::sink())?;
            if skipped < spec.position {
                return Err(SourceError::PositionOutOfRange {
                    position: spec.position,
                    length: skipped,
                });
            }
            remaining = remaining.map(|len| len.saturating_sub(spec.position));
        }

        if let Some(len) = spec.length {
            body = Box::new(body.take(len));
            remaining = Some(remaining.map_or(len, |r| r.min(len)));
        }

        tracing::debug!(
            uri = %spec.uri,
            position = spec.position,
            status = status.as_u16(),
            remaining = ?remaining,
            "网络数据源已打开"
        );
        self.body = Some(body);
        Ok(remaining)
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, SourceError> {
        let body = self.body.as_mut().ok_or(SourceError::NotOpened)?;
        Ok(body.read(buf)?)
    }

    fn close(&mut self) {
        self.body = None;
    }
}

/// 同一工厂创建的数据源共享一个 HTTP 客户端
#[derive(Debug, Clone)]
pub struct HttpDataSourceFactory {
    config: Arc<HttpConfig>,
    client: Arc<OnceCell<Client>>,
}

impl HttpDataSourceFactory {
    pub fn new(config: HttpConfig) -> Self {
        Self {
            config: Arc::new(config),
            client: Arc::new(OnceCell::new()),
        }
    }
}

impl DataSourceFactory for HttpDataSourceFactory {
    fn create(&self) -> Box<dyn DataSource> {
        Box::new(HttpDataSource {
            client: Arc::clone(&self.client),
            config: Arc::clone(&self.config),
            body: None,
        })
    }
}

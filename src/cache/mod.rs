//! 媒体缓存
//!
//! 以 key（默认为资源 URI）为单位缓存已读取的字节区间，总量受容量上限约束，
//! 超出时按最近最少使用淘汰整条记录。容量 <= 0 时缓存关闭，所有调用直接透传。

mod index;
mod source;

pub use source::{CacheDataSource, CacheDataSourceFactory};

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use tempfile::NamedTempFile;

use crate::datasource::SharedFactory;
use crate::error::CacheError;
use index::{CacheEntry, CacheIndex, CacheSpan, INDEX_FILE, span_file_name};

/// 命中的缓存区间
#[derive(Debug, Clone)]
pub(crate) struct SpanHit {
    pub path: PathBuf,
    pub position: u64,
    pub length: u64,
}

impl SpanHit {
    pub fn end(&self) -> u64 {
        self.position + self.length
    }
}

struct CacheInner {
    dir: PathBuf,
    index_path: PathBuf,
    index: CacheIndex,
    max_bytes: u64,
    /// 命中只更新内存里的访问时间，等下次写盘时一起保存
    dirty: bool,
}

impl CacheInner {
    fn open(root: &Path, max_bytes: u64) -> Result<Self, CacheError> {
        fs::create_dir_all(root).map_err(|e| {
            tracing::warn!(dir = %root.display(), err = %e, "创建缓存目录失败");
            CacheError::DirUnavailable
        })?;
        let index_path = root.join(INDEX_FILE);
        let index = CacheIndex::load(root, &index_path);

        let mut inner = Self {
            dir: root.to_path_buf(),
            index_path,
            index,
            max_bytes,
            dirty: false,
        };
        inner.evict_for(0, None);
        inner.persist_index()?;
        Ok(inner)
    }

    fn persist_index(&mut self) -> Result<(), CacheError> {
        self.index.persist(&self.dir, &self.index_path)?;
        self.dirty = false;
        Ok(())
    }

    fn persist_index_logged(&mut self) {
        if let Err(e) = self.persist_index() {
            tracing::warn!(err = %e, "保存缓存索引失败");
        }
    }

    fn touch(&mut self, key: &str) {
        let stamp = self.index.tick();
        if let Some(entry) = self.index.entries.get_mut(key) {
            entry.last_access = stamp;
        }
    }

    /// 删除一条记录的全部区间文件，返回释放的字节数。
    /// 删除失败的区间保留在索引里。
    fn remove_entry(&mut self, key: &str) -> Result<u64, CacheError> {
        let dir = &self.dir;
        let Some(entry) = self.index.entries.get_mut(key) else {
            return Ok(0);
        };

        let mut freed = 0u64;
        let mut failed = None;
        entry.spans.retain(|span| match fs::remove_file(dir.join(&span.file_name)) {
            Ok(()) => {
                freed += span.length;
                false
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                freed += span.length;
                false
            }
            Err(e) => {
                failed = Some(e);
                true
            }
        });
        if entry.spans.is_empty() {
            self.index.entries.remove(key);
        }

        match failed {
            Some(e) => Err(CacheError::FileOp(e)),
            None => Ok(freed),
        }
    }

    /// 按 LRU 淘汰，直到能放下 `incoming` 字节；`keep` 对应的记录不参与淘汰
    fn evict_for(&mut self, incoming: u64, keep: Option<&str>) {
        let mut total = self.index.total_bytes();
        if total.saturating_add(incoming) <= self.max_bytes {
            return;
        }

        let mut order = self
            .index
            .entries
            .iter()
            .filter(|(k, _)| Some(k.as_str()) != keep)
            .map(|(k, e)| (e.last_access, k.clone()))
            .collect::<Vec<_>>();
        order.sort();

        for (_, key) in order {
            if total.saturating_add(incoming) <= self.max_bytes {
                break;
            }
            match self.remove_entry(&key) {
                Ok(freed) => {
                    total = total.saturating_sub(freed);
                    tracing::debug!(key = %key, freed, "淘汰缓存记录");
                }
                Err(e) => tracing::warn!(key = %key, err = %e, "淘汰缓存记录失败"),
            }
        }
    }

    fn lookup(&mut self, key: &str, position: u64) -> Option<SpanHit> {
        let hit = self.index.entries.get(key)?.span_at(position).map(|s| SpanHit {
            path: self.dir.join(&s.file_name),
            position: s.position,
            length: s.length,
        })?;
        self.touch(key);
        self.dirty = true;
        Some(hit)
    }

    /// `position` 之后最近的已缓存区间起点
    fn next_span_start(&self, key: &str, position: u64) -> Option<u64> {
        self.index
            .entries
            .get(key)?
            .spans
            .iter()
            .map(|s| s.position)
            .filter(|&p| p > position)
            .min()
    }

    fn commit_span(
        &mut self,
        key: &str,
        position: u64,
        length: u64,
        tmp: NamedTempFile,
    ) -> Result<(), CacheError> {
        if length == 0 {
            return Ok(());
        }
        if length > self.max_bytes {
            tracing::debug!(key, length, max = self.max_bytes, "区间大于缓存容量，不写入");
            return Ok(());
        }

        let replaced = self
            .index
            .entries
            .get(key)
            .and_then(|e| e.spans.iter().find(|s| s.position == position))
            .map(|s| s.length)
            .unwrap_or(0);
        let incoming = length.saturating_sub(replaced);
        self.evict_for(incoming, Some(key));
        if self.index.total_bytes().saturating_add(incoming) > self.max_bytes {
            tracing::debug!(key, length, "缓存空间不足，放弃写入区间");
            return Ok(());
        }

        let file_name = span_file_name(key, position);
        tmp.persist(self.dir.join(&file_name))
            .map_err(|e| CacheError::WriteSpan {
                key: key.to_owned(),
                source: e.error,
            })?;

        let stamp = self.index.tick();
        let entry = self
            .index
            .entries
            .entry(key.to_owned())
            .or_insert_with(|| CacheEntry::new(stamp));
        entry.spans.retain(|s| s.position != position);
        entry.spans.push(CacheSpan {
            position,
            length,
            file_name,
        });
        entry.spans.sort_by_key(|s| s.position);
        entry.last_access = stamp;

        tracing::debug!(key, position, length, "写入缓存区间");
        self.persist_index()
    }
}

/// 缓存句柄，可在多个数据源之间共享
#[derive(Clone)]
pub struct CacheStore {
    inner: Arc<Mutex<Option<CacheInner>>>,
}

impl fmt::Debug for CacheStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let guard = self.lock();
        match guard.as_ref() {
            Some(inner) => f
                .debug_struct("CacheStore")
                .field("dir", &inner.dir)
                .field("max_bytes", &inner.max_bytes)
                .field("entries", &inner.index.entries.len())
                .finish(),
            None => f.write_str("CacheStore(disabled)"),
        }
    }
}

impl CacheStore {
    /// 关闭状态的缓存
    pub fn disabled() -> Self {
        Self {
            inner: Arc::new(Mutex::new(None)),
        }
    }

    /// 打开缓存；容量 <= 0 或目录不可用时返回关闭状态的缓存
    pub fn open(root: &Path, capacity_bytes: i64) -> Self {
        if capacity_bytes <= 0 {
            tracing::info!(capacity_bytes, "缓存容量为 0，缓存关闭");
            return Self::disabled();
        }
        match Self::try_open(root, capacity_bytes.unsigned_abs()) {
            Ok(store) => store,
            Err(e) => {
                tracing::warn!(dir = %root.display(), err = %e, "打开缓存失败，缓存关闭");
                Self::disabled()
            }
        }
    }

    pub fn try_open(root: &Path, capacity_bytes: u64) -> Result<Self, CacheError> {
        if capacity_bytes == 0 {
            return Ok(Self::disabled());
        }
        let inner = CacheInner::open(root, capacity_bytes)?;
        tracing::info!(
            dir = %root.display(),
            capacity_bytes,
            entries = inner.index.entries.len(),
            "媒体缓存已打开"
        );
        Ok(Self {
            inner: Arc::new(Mutex::new(Some(inner))),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Option<CacheInner>> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn is_enabled(&self) -> bool {
        self.lock().is_some()
    }

    pub fn root(&self) -> Option<PathBuf> {
        self.lock().as_ref().map(|i| i.dir.clone())
    }

    pub fn capacity_bytes(&self) -> u64 {
        self.lock().as_ref().map(|i| i.max_bytes).unwrap_or(0)
    }

    /// 至少缓存了一个字节区间
    pub fn is_cached(&self, key: &str) -> bool {
        self.lock()
            .as_ref()
            .and_then(|i| i.index.entries.get(key))
            .is_some_and(|e| !e.spans.is_empty())
    }

    /// 已缓存的字节数
    pub fn cached_bytes(&self, key: &str) -> u64 {
        self.lock()
            .as_ref()
            .and_then(|i| i.index.entries.get(key))
            .map(CacheEntry::size_bytes)
            .unwrap_or(0)
    }

    pub fn size_bytes(&self) -> u64 {
        self.lock()
            .as_ref()
            .map(|i| i.index.total_bytes())
            .unwrap_or(0)
    }

    pub fn keys(&self) -> Vec<String> {
        let guard = self.lock();
        let mut keys = guard
            .as_ref()
            .map(|i| i.index.entries.keys().cloned().collect::<Vec<_>>())
            .unwrap_or_default();
        keys.sort();
        keys
    }

    pub fn remove(&self, key: &str) -> Result<(), CacheError> {
        let mut guard = self.lock();
        let Some(inner) = guard.as_mut() else {
            return Ok(());
        };
        let result = inner.remove_entry(key).map(|_| ());
        inner.persist_index_logged();
        result
    }

    /// 逐条删除；单条失败记日志后跳过。返回成功删除的条数。
    pub fn clear(&self) -> usize {
        let mut guard = self.lock();
        let Some(inner) = guard.as_mut() else {
            return 0;
        };

        let keys = inner.index.entries.keys().cloned().collect::<Vec<_>>();
        let mut removed = 0usize;
        for key in keys {
            match inner.remove_entry(&key) {
                Ok(_) => removed += 1,
                Err(e) => tracing::warn!(key = %key, err = %e, "删除缓存记录失败"),
            }
        }
        inner.persist_index_logged();
        tracing::info!(removed, "缓存已清空");
        removed
    }

    /// 保存未落盘的访问记录并关闭缓存；重复调用无副作用
    pub fn release(&self) {
        let Some(mut inner) = self.lock().take() else {
            tracing::debug!("缓存已释放或未启用");
            return;
        };
        if !inner.dirty {
            tracing::info!(dir = %inner.dir.display(), "媒体缓存已释放");
            return;
        }
        match inner.persist_index() {
            Ok(()) => tracing::info!(dir = %inner.dir.display(), "媒体缓存已释放"),
            Err(e) => tracing::warn!(err = %e, "释放缓存时保存索引失败"),
        }
    }

    /// 在上游数据源外包一层缓存；缓存关闭时原样返回
    pub fn wrap(&self, upstream: SharedFactory) -> SharedFactory {
        if !self.is_enabled() {
            return upstream;
        }
        Arc::new(CacheDataSourceFactory::new(self.clone(), upstream))
    }

    pub(crate) fn lookup(&self, key: &str, position: u64) -> Option<SpanHit> {
        self.lock().as_mut()?.lookup(key, position)
    }

    pub(crate) fn next_span_start(&self, key: &str, position: u64) -> Option<u64> {
        self.lock().as_ref()?.next_span_start(key, position)
    }

    pub(crate) fn content_length(&self, key: &str) -> Option<u64> {
        self.lock()
            .as_ref()?
            .index
            .entries
            .get(key)?
            .content_length
    }

    pub(crate) fn record_content_length(&self, key: &str, length: u64) {
        let mut guard = self.lock();
        let Some(inner) = guard.as_mut() else {
            return;
        };
        let Some(entry) = inner.index.entries.get_mut(key) else {
            return;
        };
        if entry.content_length != Some(length) {
            entry.content_length = Some(length);
            inner.persist_index_logged();
        }
    }

    pub(crate) fn begin_span(&self) -> Option<NamedTempFile> {
        let guard = self.lock();
        let inner = guard.as_ref()?;
        match NamedTempFile::new_in(&inner.dir) {
            Ok(f) => Some(f),
            Err(e) => {
                tracing::warn!(err = %e, "创建缓存临时文件失败");
                None
            }
        }
    }

    pub(crate) fn commit_span(&self, key: &str, position: u64, length: u64, tmp: NamedTempFile) {
        let mut guard = self.lock();
        let Some(inner) = guard.as_mut() else {
            return;
        };
        if let Err(e) = inner.commit_span(key, position, length, tmp) {
            tracing::warn!(key, err = %e, "写入缓存区间失败");
        }
    }
}

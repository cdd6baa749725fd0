use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

use crate::error::CacheError;

pub(super) const INDEX_VERSION: u32 = 1;
pub(super) const INDEX_FILE: &str = "index.json";

/// 缓存索引，按 key 记录已缓存的字节区间
#[derive(Debug, Serialize, Deserialize, Default)]
pub(super) struct CacheIndex {
    #[serde(default)]
    pub version: u32,
    /// LRU 逻辑时钟，每次访问递增
    #[serde(default)]
    pub clock: u64,
    #[serde(default)]
    pub entries: HashMap<String, CacheEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(super) struct CacheEntry {
    pub spans: Vec<CacheSpan>,
    /// 资源总长度（读到过末尾或上游告知时记录）
    #[serde(default)]
    pub content_length: Option<u64>,
    pub last_access: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(super) struct CacheSpan {
    pub position: u64,
    pub length: u64,
    pub file_name: String,
}

impl CacheSpan {
    pub fn end(&self) -> u64 {
        self.position + self.length
    }

    pub fn contains(&self, position: u64) -> bool {
        position >= self.position && position < self.end()
    }
}

impl CacheEntry {
    pub fn new(stamp: u64) -> Self {
        Self {
            spans: Vec::new(),
            content_length: None,
            last_access: stamp,
        }
    }

    pub fn size_bytes(&self) -> u64 {
        self.spans.iter().map(|s| s.length).sum()
    }

    /// 覆盖 `position` 且向后延伸最远的区间
    pub fn span_at(&self, position: u64) -> Option<&CacheSpan> {
        self.spans
            .iter()
            .filter(|s| s.contains(position))
            .max_by_key(|s| s.end())
    }
}

impl CacheIndex {
    pub fn fresh() -> Self {
        Self {
            version: INDEX_VERSION,
            clock: 0,
            entries: HashMap::new(),
        }
    }

    /// 读取索引；版本不符时清空目录，丢弃文件已丢失的区间，删除孤儿文件
    pub fn load(dir: &Path, index_path: &Path) -> Self {
        let loaded = fs::read(index_path)
            .ok()
            .and_then(|b| serde_json::from_slice::<CacheIndex>(&b).ok());

        let mut index = match loaded {
            Some(idx) if idx.version == INDEX_VERSION => idx,
            Some(idx) => {
                tracing::info!(
                    found = idx.version,
                    expected = INDEX_VERSION,
                    "缓存索引版本不符，清空缓存目录"
                );
                Self::fresh()
            }
            None => Self::fresh(),
        };

        for entry in index.entries.values_mut() {
            entry.spans.retain(|s| dir.join(&s.file_name).is_file());
        }
        index.entries.retain(|_, e| !e.spans.is_empty());

        let referenced = index
            .entries
            .values()
            .flat_map(|e| e.spans.iter().map(|s| s.file_name.clone()))
            .collect::<HashSet<_>>();
        let (files, bytes) = sweep_dir(dir, &referenced);
        if files > 0 {
            tracing::debug!(files, bytes, "清理未被索引引用的缓存文件");
        }

        index
    }

    pub fn tick(&mut self) -> u64 {
        self.clock = self.clock.wrapping_add(1);
        self.clock
    }

    pub fn total_bytes(&self) -> u64 {
        self.entries.values().map(CacheEntry::size_bytes).sum()
    }

    pub fn persist(&self, dir: &Path, index_path: &Path) -> Result<(), CacheError> {
        let bytes = serde_json::to_vec_pretty(self)?;
        let mut tmp = NamedTempFile::new_in(dir)?;
        tmp.write_all(&bytes)?;
        tmp.persist(index_path)
            .map_err(|e| CacheError::SaveIndex(e.error.to_string()))?;
        Ok(())
    }
}

pub(super) fn span_file_name(key: &str, position: u64) -> String {
    let mut hasher = Md5::new();
    hasher.update(key.as_bytes());
    format!("{}.{position}.span", hex::encode(hasher.finalize()))
}

/// 删除目录下除索引和 `keep` 之外的文件
fn sweep_dir(dir: &Path, keep: &HashSet<String>) -> (usize, u64) {
    let mut removed_files = 0usize;
    let mut removed_bytes = 0u64;

    let Ok(rd) = fs::read_dir(dir) else {
        return (0, 0);
    };
    for ent in rd.flatten() {
        let p = ent.path();
        if p.is_dir() {
            continue;
        }
        let Some(name) = p.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if name == INDEX_FILE || keep.contains(name) {
            continue;
        }

        if let Ok(md) = ent.metadata() {
            removed_bytes = removed_bytes.saturating_add(md.len());
        }
        if fs::remove_file(&p).is_ok() {
            removed_files += 1;
        }
    }

    (removed_files, removed_bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn span_lookup_prefers_longest_reach() {
        let mut entry = CacheEntry::new(1);
        entry.spans.push(CacheSpan {
            position: 0,
            length: 10,
            file_name: "a".to_owned(),
        });
        entry.spans.push(CacheSpan {
            position: 5,
            length: 20,
            file_name: "b".to_owned(),
        });

        assert_eq!(entry.span_at(7).map(|s| s.file_name.as_str()), Some("b"));
        assert_eq!(entry.span_at(2).map(|s| s.file_name.as_str()), Some("a"));
        assert!(entry.span_at(25).is_none());
        assert_eq!(entry.size_bytes(), 30);
    }

    #[test]
    fn load_drops_missing_spans_and_orphans() {
        let dir = tempfile::tempdir().expect("tempdir");
        let index_path = dir.path().join(INDEX_FILE);

        let mut index = CacheIndex::fresh();
        let present = span_file_name("k", 0);
        fs::write(dir.path().join(&present), b"abc").expect("write");
        fs::write(dir.path().join("stray.tmp"), b"zzz").expect("write");
        let mut entry = CacheEntry::new(1);
        entry.spans.push(CacheSpan {
            position: 0,
            length: 3,
            file_name: present.clone(),
        });
        entry.spans.push(CacheSpan {
            position: 3,
            length: 3,
            file_name: span_file_name("k", 3),
        });
        index.entries.insert("k".to_owned(), entry);
        index.persist(dir.path(), &index_path).expect("persist");

        let loaded = CacheIndex::load(dir.path(), &index_path);
        assert_eq!(loaded.entries["k"].spans.len(), 1);
        assert!(dir.path().join(&present).exists());
        assert!(!dir.path().join("stray.tmp").exists());
    }

    #[test]
    fn version_mismatch_starts_fresh() {
        let dir = tempfile::tempdir().expect("tempdir");
        let index_path = dir.path().join(INDEX_FILE);
        fs::write(&index_path, br#"{"version":99,"entries":{}}"#).expect("write");
        fs::write(dir.path().join("old.bin"), b"x").expect("write");

        let loaded = CacheIndex::load(dir.path(), &index_path);
        assert_eq!(loaded.version, INDEX_VERSION);
        assert!(loaded.entries.is_empty());
        assert!(!dir.path().join("old.bin").exists());
    }
}

use std::fs::{self, File};
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use crate::error::ResolveError;

/// 随程序分发的内置资源目录
///
/// 资源按名字引用，可以省略扩展名（`intro` 匹配 `intro.mp3`）。
#[derive(Debug, Clone)]
pub struct ResourceBundle {
    root: PathBuf,
}

impl ResourceBundle {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// 找到并试打开资源；打不开属于构造期故障
    pub fn open(&self, name: &str) -> Result<PathBuf, ResolveError> {
        let rel = Path::new(name);
        let is_plain = !name.is_empty()
            && rel
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !is_plain {
            return Err(ResolveError::ResourceNotFound(name.to_owned()));
        }

        let path = self
            .locate(name)
            .ok_or_else(|| ResolveError::ResourceNotFound(name.to_owned()))?;

        match File::open(&path) {
            Ok(_) => Ok(path),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(ResolveError::ResourceNotFound(name.to_owned()))
            }
            Err(source) => Err(ResolveError::ResourceUnreadable {
                name: name.to_owned(),
                source,
            }),
        }
    }

    fn locate(&self, name: &str) -> Option<PathBuf> {
        let exact = self.root.join(name);
        if exact.is_file() {
            return Some(exact);
        }

        let mut candidates = fs::read_dir(&self.root)
            .ok()?
            .flatten()
            .map(|ent| ent.path())
            .filter(|p| p.is_file() && p.file_stem().is_some_and(|s| s == name))
            .collect::<Vec<_>>();
        candidates.sort();
        candidates.into_iter().next()
    }
}

use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom, Take};
use std::path::PathBuf;

use super::{DataSource, DataSourceFactory, DataSpec};
use crate::error::SourceError;
use crate::model::TrackSource;

/// 本地文件数据源
///
/// `pinned` 为 Some 时忽略 `spec.uri`，固定读取该路径（内置资源使用）。
pub struct FileDataSource {
    pinned: Option<PathBuf>,
    reader: Option<Take<BufReader<File>>>,
}

impl FileDataSource {
    pub fn new() -> Self {
        Self {
            pinned: None,
            reader: None,
        }
    }

    pub fn pinned(path: PathBuf) -> Self {
        Self {
            pinned: Some(path),
            reader: None,
        }
    }

    fn path_for(&self, spec: &DataSpec) -> Result<PathBuf, SourceError> {
        if let Some(p) = self.pinned.as_ref() {
            return Ok(p.clone());
        }
        TrackSource::Uri {
            uri: spec.uri.clone(),
        }
        .local_path()
        .ok_or_else(|| SourceError::InvalidLocalUri(spec.uri.clone()))
    }
}

impl Default for FileDataSource {
    fn default() -> Self {
        Self::new()
    }
}

impl DataSource for FileDataSource {
    fn open(&mut self, spec: &DataSpec) -> Result<Option<u64>, SourceError> {
        self.close();

        let path = self.path_for(spec)?;
        let mut file = File::open(&path).map_err(|source| SourceError::OpenFile {
            path: path.clone(),
            source,
        })?;
        let length = file.metadata()?.len();
        if spec.position > length {
            return Err(SourceError::PositionOutOfRange {
                position: spec.position,
                length,
            });
        }
        file.seek(SeekFrom::Start(spec.position))?;

        let available = length - spec.position;
        let remaining = spec.length.map_or(available, |len| len.min(available));
        self.reader = Some(BufReader::new(file).take(remaining));
        Ok(Some(remaining))
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, SourceError> {
        let reader = self.reader.as_mut().ok_or(SourceError::NotOpened)?;
        Ok(reader.read(buf)?)
    }

    fn close(&mut self) {
        self.reader = None;
    }
}

#[derive(Debug, Clone, Default)]
pub struct FileDataSourceFactory {
    pinned: Option<PathBuf>,
}

impl FileDataSourceFactory {
    pub fn new() -> Self {
        Self { pinned: None }
    }

    pub fn pinned(path: PathBuf) -> Self {
        Self { pinned: Some(path) }
    }
}

impl DataSourceFactory for FileDataSourceFactory {
    fn create(&self) -> Box<dyn DataSource> {
        match self.pinned.clone() {
            Some(p) => Box::new(FileDataSource::pinned(p)),
            None => Box::new(FileDataSource::new()),
        }
    }
}

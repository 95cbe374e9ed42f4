//! 共享目录存储访问：上传写入、列表、下载打开与删除。

use axum::body::Bytes;
use futures_util::stream::{self, Stream, StreamExt, TryStreamExt};
use serde::Serialize;
use std::fmt::Display;
use std::fs::Metadata;
use std::io;
use std::path::{Path, PathBuf};
use std::pin::pin;
use tokio::fs::{self, File};
use tokio::io::{AsyncWriteExt, ErrorKind};
use tracing::{debug, warn};

use crate::atomic::StagedFile;
use crate::config::STAGING_DIR_NAME;
use crate::sandbox::{ResolvedPath, Sandbox};

#[derive(Clone, Debug)]
pub struct Storage {
    sandbox: Sandbox,
    staging: PathBuf,
}

impl Storage {
    /// 创建（如不存在）并规范化共享目录与暂存目录。
    pub async fn open(root: PathBuf, staging: Option<PathBuf>) -> io::Result<Self> {
        ensure_root(&root).await?;
        let root = fs::canonicalize(&root).await?;
        let staging = staging.unwrap_or_else(|| default_staging_dir(&root));
        ensure_root(&staging).await?;
        let staging = fs::canonicalize(&staging).await?;
        if staging.starts_with(&root) {
            return Err(io::Error::new(
                ErrorKind::InvalidInput,
                "staging directory must not live inside the shared directory",
            ));
        }
        Ok(Self {
            sandbox: Sandbox::new(root),
            staging,
        })
    }

    pub fn root_path(&self) -> &Path {
        self.sandbox.root()
    }

    pub fn staging_path(&self) -> &Path {
        &self.staging
    }

    pub fn sandbox(&self) -> &Sandbox {
        &self.sandbox
    }

    /// 以流式方式写入上传内容，完成后原子覆盖同名文件。
    ///
    /// `max_size` 为 0 表示不限制。流中途出错时临时文件被删除，
    /// 目标文件保持原样。
    pub async fn write_upload<S, E>(
        &self,
        target: &ResolvedPath,
        body: S,
        max_size: u64,
    ) -> Result<u64, StorageError>
    where
        S: Stream<Item = Result<Bytes, E>>,
        E: Display,
    {
        let mut body = pin!(body);
        let mut staged = StagedFile::new(&self.staging, target.as_path()).await?;
        let mut written: u64 = 0;

        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(|err| StorageError::Interrupted(err.to_string()))?;
            if chunk.is_empty() {
                continue;
            }
            written += chunk.len() as u64;
            if max_size > 0 && written > max_size {
                return Err(StorageError::TooLarge(max_size));
            }
            staged.file_mut()?.write_all(&chunk).await?;
        }

        staged.finalize().await?;
        Ok(written)
    }

    /// 非递归列出共享目录，单个条目 stat 失败时大小记为 0。
    pub async fn list_entries(&self) -> Result<Vec<FileEntry>, StorageError> {
        let root = self.root_path().to_path_buf();
        let dir = fs::read_dir(&root).await?;

        let names = stream::try_unfold(dir, |mut dir| async move {
            let next = dir.next_entry().await?;
            Ok::<_, io::Error>(next.map(|entry| (entry, dir)))
        });
        let entries = names
            .and_then(|entry| async move {
                let name = entry.file_name().to_string_lossy().into_owned();
                let stat = fs::metadata(entry.path()).await.map(|meta| meta.len());
                Ok::<_, io::Error>(entry_from_stat(name, stat))
            })
            .try_collect::<Vec<_>>()
            .await?;

        Ok(entries)
    }

    /// 打开文件用于下载；路径上任一符号链接或非普通文件都被拒绝。
    pub async fn open_entry(
        &self,
        target: &ResolvedPath,
    ) -> Result<(File, Metadata), StorageError> {
        self.checked_file(target).await?;
        let file = File::open(target.as_path()).await?;
        let metadata = file.metadata().await?;
        Ok((file, metadata))
    }

    /// 删除普通文件；与下载相同的路径检查。
    pub async fn delete_entry(&self, target: &ResolvedPath) -> Result<(), StorageError> {
        self.checked_file(target).await?;
        fs::remove_file(target.as_path()).await?;
        Ok(())
    }

    /// 从根目录逐级 `symlink_metadata`，拒绝任何符号链接，
    /// 中间段必须是目录、末段必须是普通文件。
    async fn checked_file(&self, target: &ResolvedPath) -> Result<(), StorageError> {
        let relative = target
            .as_path()
            .strip_prefix(self.root_path())
            .map_err(|_| StorageError::InvalidPath)?;
        let mut current = self.root_path().to_path_buf();
        let mut components = relative.components().peekable();

        while let Some(component) = components.next() {
            current.push(component.as_os_str());
            let metadata = fs::symlink_metadata(&current).await?;
            if metadata.file_type().is_symlink() {
                warn!(path = ?current, "refusing to follow symlink");
                return Err(StorageError::InvalidPath);
            }
            let is_leaf = components.peek().is_none();
            if (is_leaf && !metadata.is_file()) || (!is_leaf && !metadata.is_dir()) {
                return Err(StorageError::NotFound);
            }
        }

        Ok(())
    }

    /// 删除暂存目录中修改时间早于 `ttl` 的残留文件，返回删除数量。
    pub async fn sweep_staging(&self, ttl: std::time::Duration) -> io::Result<u64> {
        let now = std::time::SystemTime::now();
        let mut removed = 0;
        let mut dir = fs::read_dir(&self.staging).await?;
        while let Some(entry) = dir.next_entry().await? {
            let Ok(metadata) = entry.metadata().await else {
                continue;
            };
            if !metadata.is_file() {
                continue;
            }
            let age = metadata
                .modified()
                .ok()
                .and_then(|modified| now.duration_since(modified).ok());
            if age.is_some_and(|age| age >= ttl) {
                let path = entry.path();
                match fs::remove_file(&path).await {
                    Ok(()) => {
                        debug!(path = ?path, "removed stale staging file");
                        removed += 1;
                    }
                    Err(err) => warn!(path = ?path, error = %err, "failed to remove staging file"),
                }
            }
        }
        Ok(removed)
    }
}

/// 幂等创建目录（含父级）。
pub async fn ensure_root(path: &Path) -> io::Result<()> {
    fs::create_dir_all(path).await
}

fn default_staging_dir(root: &Path) -> PathBuf {
    match root.parent() {
        Some(parent) => parent.join(STAGING_DIR_NAME),
        None => std::env::temp_dir().join(STAGING_DIR_NAME),
    }
}

/// 单个条目的降级规则：stat 失败时大小为 0。
pub fn entry_from_stat(name: String, stat: io::Result<u64>) -> FileEntry {
    let size = stat.unwrap_or_else(|err| {
        debug!(name, error = %err, "stat failed during listing");
        0
    });
    FileEntry { name, size }
}

#[derive(Debug)]
pub enum StorageError {
    InvalidPath,
    NotFound,
    TooLarge(u64),
    Interrupted(String),
    Io(io::Error),
}

impl From<io::Error> for StorageError {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            ErrorKind::NotFound => StorageError::NotFound,
            _ => StorageError::Io(err),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileEntry {
    pub name: String,
    pub size: u64,
}

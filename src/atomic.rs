//! 暂存写入与原子替换的辅助方法。

use std::io;
use std::path::{Path, PathBuf};
use tokio::fs::{self, File};
use uuid::Uuid;

use crate::storage::StorageError;

pub const STAGING_SUFFIX: &str = ".part";

/// 暂存目录中的临时文件；未 `finalize` 即被丢弃时自动删除。
pub struct StagedFile {
    target: PathBuf,
    temp_path: PathBuf,
    file: Option<File>,
    committed: bool,
}

impl StagedFile {
    /// 在暂存目录中为目标文件创建临时文件。
    ///
    /// 临时文件名只由 UUID 构成，不受目标文件名长度影响。
    pub async fn new(staging_dir: &Path, target: &Path) -> Result<Self, StorageError> {
        let temp_name = format!("{}{STAGING_SUFFIX}", Uuid::new_v4());
        let temp_path = staging_dir.join(temp_name);
        let file = File::create(&temp_path).await?;
        Ok(Self {
            target: target.to_path_buf(),
            temp_path,
            file: Some(file),
            committed: false,
        })
    }

    /// 返回临时文件的可写句柄。
    pub fn file_mut(&mut self) -> io::Result<&mut File> {
        self.file
            .as_mut()
            .ok_or_else(|| io::Error::other("staged file already closed"))
    }

    /// 同步并以 rename 覆盖目标文件。
    pub async fn finalize(mut self) -> Result<(), StorageError> {
        if let Some(file) = self.file.take() {
            file.sync_all().await?;
        }

        if let Err(err) = fs::rename(&self.temp_path, &self.target).await {
            #[cfg(windows)]
            {
                if fs::remove_file(&self.target).await.is_ok() {
                    fs::rename(&self.temp_path, &self.target).await?;
                } else {
                    return Err(StorageError::Io(err));
                }
            }
            #[cfg(not(windows))]
            {
                return Err(StorageError::Io(err));
            }
        }
        self.committed = true;

        if let Some(parent) = self.target.parent() {
            let _ = sync_dir(parent).await;
        }

        Ok(())
    }
}

impl Drop for StagedFile {
    fn drop(&mut self) {
        if !self.committed {
            drop(self.file.take());
            let _ = std::fs::remove_file(&self.temp_path);
        }
    }
}

#[cfg(unix)]
async fn sync_dir(path: &Path) -> io::Result<()> {
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || {
        let dir = std::fs::File::open(path)?;
        dir.sync_all()
    })
    .await
    .map_err(|err| io::Error::other(err.to_string()))?
}

#[cfg(not(unix))]
async fn sync_dir(_path: &Path) -> io::Result<()> {
    Ok(())
}

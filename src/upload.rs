//! multipart 上传处理器。

use axum::extract::multipart::MultipartRejection;
use axum::extract::{Extension, Multipart};
use std::sync::Arc;
use tracing::{info, warn};

use crate::error::ApiError;
use crate::storage::Storage;

pub const UPLOAD_FIELD: &str = "file";

#[derive(Debug)]
pub struct UploadConfig {
    /// 0 表示不限制。
    pub max_size: u64,
}

/// 接收名为 `file` 的文件字段，按原始文件名的最后一段保存，覆盖同名文件。
pub async fn upload_file(
    Extension(storage): Extension<Arc<Storage>>,
    Extension(upload): Extension<Arc<UploadConfig>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<&'static str, ApiError> {
    let mut multipart = multipart.map_err(|rejection| {
        warn!(error = %rejection, "upload without multipart body");
        ApiError::BadRequest("No file uploaded.")
    })?;
    while let Some(field) = multipart.next_field().await.map_err(|err| {
        warn!(error = %err, "malformed multipart body");
        ApiError::BadRequest("No file uploaded.")
    })? {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }
        let Some(original_name) = field.file_name().map(str::to_owned) else {
            continue;
        };

        let target = storage
            .sandbox()
            .resolve_upload_name(&original_name)
            .map_err(|_| {
                warn!(name = original_name, "rejected upload file name");
                ApiError::BadRequest("Invalid file name.")
            })?;
        let size = storage
            .write_upload(&target, field, upload.max_size)
            .await
            .map_err(|err| ApiError::from_storage(err, "Error saving file."))?;

        info!(name = target.file_name(), size, "upload file");
        return Ok("File uploaded successfully.");
    }

    Err(ApiError::BadRequest("No file uploaded."))
}

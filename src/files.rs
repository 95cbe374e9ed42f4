//! 文件列表、下载与删除处理器。

use axum::body::Body as AxumBody;
use axum::extract::{Extension, Path};
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Json as JsonResponse, Response};
use httpdate::fmt_http_date;
use std::io::SeekFrom;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio_util::io::ReaderStream;
use tracing::{debug, info, warn};

use crate::error::ApiError;
use crate::etag::{etag_from_metadata, is_not_modified};
use crate::storage::{FileEntry, Storage, StorageError};

/// 列出共享目录中的文件。
pub async fn list_files(
    Extension(storage): Extension<Arc<Storage>>,
) -> Result<JsonResponse<Vec<FileEntry>>, ApiError> {
    let entries = storage.list_entries().await.map_err(|err| {
        warn!(error = ?err, "list files failed");
        ApiError::Internal("Error reading files.")
    })?;
    info!(count = entries.len(), "list files");
    Ok(JsonResponse(entries))
}

/// 下载文件，支持 Range 请求与缓存相关头。越出共享目录的名称一律 404。
pub async fn download_file(
    Path(name): Path<String>,
    request_headers: HeaderMap,
    Extension(storage): Extension<Arc<Storage>>,
) -> Result<Response, ApiError> {
    let not_found = || ApiError::NotFound("File not found");
    let Ok(target) = storage.sandbox().resolve(&name) else {
        warn!(name, "download outside shared directory");
        return Err(not_found());
    };
    let (file, metadata) = match storage.open_entry(&target).await {
        Ok(opened) => opened,
        Err(StorageError::InvalidPath | StorageError::NotFound) => return Err(not_found()),
        Err(err) => return Err(ApiError::from_storage(err, "Error reading file")),
    };

    let file_size = metadata.len();
    let etag = etag_from_metadata(&metadata);
    let mime = mime_guess::from_path(target.as_path()).first_or_octet_stream();

    let mut response_headers = HeaderMap::new();
    response_headers.insert(
        header::ETAG,
        HeaderValue::from_str(&etag).map_err(|_| ApiError::Internal("响应头构建失败"))?,
    );
    if let Ok(modified) = metadata.modified() {
        response_headers.insert(
            header::LAST_MODIFIED,
            HeaderValue::from_str(&fmt_http_date(modified))
                .map_err(|_| ApiError::Internal("响应头构建失败"))?,
        );
    }
    if is_not_modified(&request_headers, &etag) {
        return Ok((StatusCode::NOT_MODIFIED, response_headers).into_response());
    }

    response_headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(mime.essence_str())
            .map_err(|_| ApiError::Internal("无效的 MIME 类型"))?,
    );
    response_headers.insert(header::ACCEPT_RANGES, HeaderValue::from_static("bytes"));

    let if_range_matches = match request_headers
        .get(header::IF_RANGE)
        .and_then(|value| value.to_str().ok())
    {
        Some(value) => value.trim() == etag,
        None => true,
    };
    let range = if if_range_matches {
        parse_range(request_headers.get(header::RANGE), file_size)?
    } else {
        None
    };

    if let Some((start, end)) = range {
        let length = end - start + 1;
        debug!(name, start, end, length, "download range request accepted");
        let mut file = file;
        file.seek(SeekFrom::Start(start))
            .await
            .map_err(|err| ApiError::from_storage(err.into(), "Error reading file"))?;
        let stream = ReaderStream::new(file.take(length));
        response_headers.insert(
            header::CONTENT_RANGE,
            HeaderValue::from_str(&format!("bytes {}-{}/{}", start, end, file_size))
                .map_err(|_| ApiError::Internal("响应头构建失败"))?,
        );
        response_headers.insert(header::CONTENT_LENGTH, HeaderValue::from(length));
        return Ok((
            StatusCode::PARTIAL_CONTENT,
            response_headers,
            AxumBody::from_stream(stream),
        )
            .into_response());
    }

    response_headers.insert(header::CONTENT_LENGTH, HeaderValue::from(file_size));
    info!(name, size = file_size, "download full file");
    let stream = ReaderStream::new(file);
    Ok((
        StatusCode::OK,
        response_headers,
        AxumBody::from_stream(stream),
    )
        .into_response())
}

/// 删除文件。令牌已由 `require_admin` 校验。
pub async fn delete_file(
    Path(name): Path<String>,
    Extension(storage): Extension<Arc<Storage>>,
) -> Result<&'static str, ApiError> {
    let target = storage.sandbox().resolve(&name).map_err(|_| {
        warn!(name, "delete outside shared directory");
        ApiError::BadRequest("Invalid file path")
    })?;
    storage
        .delete_entry(&target)
        .await
        .map_err(|err| ApiError::from_storage(err, "Error deleting file"))?;
    info!(name = target.file_name(), "delete file");
    Ok("File deleted successfully")
}

/// 解析 Range 头，返回可读取的范围。
fn parse_range(
    value: Option<&HeaderValue>,
    file_size: u64,
) -> Result<Option<(u64, u64)>, ApiError> {
    let Some(value) = value else {
        return Ok(None);
    };
    if file_size == 0 {
        return Err(ApiError::RangeNotSatisfiable(file_size));
    }
    let value = value
        .to_str()
        .map_err(|_| ApiError::BadRequest("invalid Range header"))?;
    let Some(range) = value.strip_prefix("bytes=") else {
        return Err(ApiError::BadRequest("invalid Range header"));
    };
    if range.contains(',') {
        return Err(ApiError::BadRequest("multiple ranges not supported"));
    }

    let mut parts = range.splitn(2, '-');
    let start_part = parts.next().unwrap_or_default();
    let end_part = parts.next().unwrap_or_default();

    let (start, end) = if start_part.is_empty() {
        let suffix: u64 = end_part
            .parse()
            .map_err(|_| ApiError::BadRequest("invalid Range header"))?;
        if suffix == 0 {
            return Ok(None);
        }
        let start = file_size.saturating_sub(suffix);
        (start, file_size.saturating_sub(1))
    } else {
        let start: u64 = start_part
            .parse()
            .map_err(|_| ApiError::BadRequest("invalid Range header"))?;
        let end: u64 = if end_part.is_empty() {
            file_size.saturating_sub(1)
        } else {
            end_part
                .parse::<u64>()
                .map_err(|_| ApiError::BadRequest("invalid Range header"))?
                .min(file_size.saturating_sub(1))
        };
        (start, end)
    };

    if start > end || start >= file_size {
        return Err(ApiError::RangeNotSatisfiable(file_size));
    }

    Ok(Some((start, end)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    async fn make_storage() -> (tempfile::TempDir, Arc<Storage>) {
        let temp = tempdir().expect("tempdir");
        let storage = Storage::open(temp.path().join("shared"), None)
            .await
            .expect("open storage");
        (temp, Arc::new(storage))
    }

    #[test]
    fn parse_range_variants() {
        let header = |s: &'static str| HeaderValue::from_static(s);
        assert_eq!(parse_range(None, 10).ok().flatten(), None);
        assert_eq!(
            parse_range(Some(&header("bytes=0-3")), 10).ok().flatten(),
            Some((0, 3))
        );
        assert_eq!(
            parse_range(Some(&header("bytes=4-")), 10).ok().flatten(),
            Some((4, 9))
        );
        assert_eq!(
            parse_range(Some(&header("bytes=-3")), 10).ok().flatten(),
            Some((7, 9))
        );
        assert_eq!(
            parse_range(Some(&header("bytes=5-100")), 10).ok().flatten(),
            Some((5, 9))
        );
        assert!(matches!(
            parse_range(Some(&header("bytes=10-12")), 10),
            Err(ApiError::RangeNotSatisfiable(10))
        ));
        assert!(matches!(
            parse_range(Some(&header("items=0-1")), 10),
            Err(ApiError::BadRequest(_))
        ));
    }

    #[tokio::test]
    async fn download_traversal_is_not_found() {
        let (_temp, storage) = make_storage().await;
        let result = download_file(
            Path("../../etc/passwd".to_string()),
            HeaderMap::new(),
            Extension(storage),
        )
        .await;
        assert!(matches!(result, Err(ApiError::NotFound(_))));
    }

    #[tokio::test]
    async fn delete_traversal_is_bad_request() {
        let (temp, storage) = make_storage().await;
        let outside = temp.path().join("keep.txt");
        std::fs::write(&outside, b"keep").expect("seed outside");

        let result = delete_file(Path("../keep.txt".to_string()), Extension(storage)).await;
        assert!(matches!(result, Err(ApiError::BadRequest(_))));
        assert!(outside.exists());
    }

    #[tokio::test]
    async fn delete_missing_is_not_found() {
        let (_temp, storage) = make_storage().await;
        let result = delete_file(Path("ghost.txt".to_string()), Extension(storage)).await;
        assert!(matches!(result, Err(ApiError::NotFound(_))));
    }

    #[tokio::test]
    async fn list_reports_name_and_size() {
        let (_temp, storage) = make_storage().await;
        std::fs::write(storage.root_path().join("a.txt"), b"12345").expect("seed");

        let JsonResponse(entries) = list_files(Extension(storage))
            .await
            .unwrap_or_else(|_| panic!("list failed"));
        assert_eq!(
            entries,
            vec![FileEntry {
                name: "a.txt".into(),
                size: 5
            }]
        );
    }
}

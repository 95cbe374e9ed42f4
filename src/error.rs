//! 统一的 API 错误类型与转换。

use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use tracing::error;

use crate::storage::StorageError;

#[derive(Debug)]
pub enum ApiError {
    BadRequest(&'static str),
    Forbidden,
    NotFound(&'static str),
    PayloadTooLarge(u64),
    RangeNotSatisfiable(u64),
    Internal(&'static str),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg).into_response(),
            ApiError::Forbidden => (
                StatusCode::FORBIDDEN,
                "Forbidden: Admin access required",
            )
                .into_response(),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg).into_response(),
            ApiError::PayloadTooLarge(limit) => (
                StatusCode::PAYLOAD_TOO_LARGE,
                format!("File exceeds the {limit} byte upload limit."),
            )
                .into_response(),
            ApiError::RangeNotSatisfiable(size) => {
                let mut headers = HeaderMap::new();
                if let Ok(value) = HeaderValue::from_str(&format!("bytes */{size}")) {
                    headers.insert(header::CONTENT_RANGE, value);
                }
                (
                    StatusCode::RANGE_NOT_SATISFIABLE,
                    headers,
                    "range not satisfiable",
                )
                    .into_response()
            }
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg).into_response(),
        }
    }
}

impl ApiError {
    /// 按存储错误分类，`internal` 为 I/O 错误时返回给客户端的固定文案。
    pub fn from_storage(error: StorageError, internal: &'static str) -> Self {
        match error {
            StorageError::InvalidPath => ApiError::BadRequest("Invalid file path"),
            StorageError::NotFound => ApiError::NotFound("File not found"),
            StorageError::TooLarge(limit) => ApiError::PayloadTooLarge(limit),
            StorageError::Interrupted(reason) => {
                error!(reason, "request body interrupted");
                ApiError::BadRequest("Upload interrupted.")
            }
            StorageError::Io(err) => {
                error!(error = %err, "storage i/o failure");
                ApiError::Internal(internal)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn storage_errors_map_to_statuses() {
        let cases = [
            (StorageError::InvalidPath, StatusCode::BAD_REQUEST),
            (StorageError::NotFound, StatusCode::NOT_FOUND),
            (StorageError::TooLarge(1), StatusCode::PAYLOAD_TOO_LARGE),
            (
                StorageError::Interrupted("reset".into()),
                StatusCode::BAD_REQUEST,
            ),
            (
                StorageError::Io(io::Error::from(io::ErrorKind::PermissionDenied)),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (error, status) in cases {
            assert_eq!(
                ApiError::from_storage(error, "Error reading file")
                    .into_response()
                    .status(),
                status
            );
        }
    }

    #[test]
    fn forbidden_is_403() {
        assert_eq!(
            ApiError::Forbidden.into_response().status(),
            StatusCode::FORBIDDEN
        );
    }
}

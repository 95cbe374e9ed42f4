//! 管理员令牌校验：仅删除操作需要。

use axum::extract::Extension;
use axum::http::Request;
use axum::{body::Body as AxumBody, middleware};
use std::sync::Arc;
use tracing::warn;

use crate::config::ADMIN_TOKEN_HEADER;
use crate::error::ApiError;

/// 进程生命周期内固定的管理员令牌。未配置时拒绝所有特权操作。
#[derive(Clone)]
pub struct AuthGate {
    expected: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthDecision {
    Allowed,
    Denied,
}

impl AuthGate {
    /// 空字符串与 `None` 一样视为未配置。
    pub fn new(expected: Option<String>) -> Self {
        Self {
            expected: expected.filter(|token| !token.is_empty()),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.expected.is_some()
    }

    /// 区分大小写的完整字符串比较。
    pub fn authorize(&self, supplied: Option<&str>) -> AuthDecision {
        let (Some(expected), Some(supplied)) = (self.expected.as_deref(), supplied) else {
            return AuthDecision::Denied;
        };
        if constant_time_eq(expected.as_bytes(), supplied.as_bytes()) {
            AuthDecision::Allowed
        } else {
            AuthDecision::Denied
        }
    }
}

impl std::fmt::Debug for AuthGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthGate")
            .field("enabled", &self.is_enabled())
            .finish()
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// 删除路由的前置中间件：在解析路径之前校验令牌。
pub async fn require_admin(
    Extension(gate): Extension<Arc<AuthGate>>,
    req: Request<AxumBody>,
    next: middleware::Next,
) -> Result<axum::response::Response, ApiError> {
    let supplied = req
        .headers()
        .get(ADMIN_TOKEN_HEADER)
        .and_then(|value| value.to_str().ok());

    match gate.authorize(supplied) {
        AuthDecision::Allowed => Ok(next.run(req).await),
        AuthDecision::Denied => {
            warn!(
                path = req.uri().path(),
                token_present = supplied.is_some(),
                "admin token rejected"
            );
            Err(ApiError::Forbidden)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_token_is_allowed() {
        let gate = AuthGate::new(Some("Tok-123".into()));
        assert_eq!(gate.authorize(Some("Tok-123")), AuthDecision::Allowed);
    }

    #[test]
    fn mismatched_tokens_are_denied() {
        let gate = AuthGate::new(Some("Tok-123".into()));
        for supplied in [None, Some(""), Some("tok-123"), Some("Tok-1234"), Some("Tok-12")] {
            assert_eq!(gate.authorize(supplied), AuthDecision::Denied, "{supplied:?}");
        }
    }

    #[test]
    fn missing_configuration_fails_closed() {
        for gate in [AuthGate::new(None), AuthGate::new(Some(String::new()))] {
            assert!(!gate.is_enabled());
            assert_eq!(gate.authorize(Some("")), AuthDecision::Denied);
            assert_eq!(gate.authorize(Some("anything")), AuthDecision::Denied);
            assert_eq!(gate.authorize(None), AuthDecision::Denied);
        }
    }
}

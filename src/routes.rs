//! 路由装配：端点、中间件与共享状态。

use axum::extract::{DefaultBodyLimit, Extension, connect_info::ConnectInfo};
use axum::http::Request;
use axum::routing::{delete, get, post};
use axum::{Router, middleware};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::{DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::{Level, info_span};

use crate::auth::{AuthGate, require_admin};
use crate::http::{CorsPolicy, add_security_headers, cors_headers, resolve_client_ip};
use crate::storage::Storage;
use crate::upload::UploadConfig;
use crate::{files, frontend, upload, version};

/// 构建完整的应用路由。
pub fn build_router(
    storage: Arc<Storage>,
    auth_gate: Arc<AuthGate>,
    upload_config: Arc<UploadConfig>,
    cors_policy: Arc<CorsPolicy>,
) -> Router {
    Router::new()
        .route(
            "/upload",
            post(upload::upload_file).layer(DefaultBodyLimit::disable()),
        )
        .route("/list", get(files::list_files))
        .route("/files/{name}", get(files::download_file))
        .route(
            "/delete/{name}",
            delete(files::delete_file).route_layer(middleware::from_fn(require_admin)),
        )
        .route("/version", get(version::get_version_info))
        .fallback(frontend::serve_frontend)
        .layer(middleware::from_fn(cors_headers))
        .layer(middleware::from_fn(add_security_headers))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &Request<_>| {
                    let connect_ip = request
                        .extensions()
                        .get::<ConnectInfo<SocketAddr>>()
                        .map(|ConnectInfo(addr)| addr.ip());
                    let client_ip = resolve_client_ip(request.headers(), connect_ip)
                        .map(|ip| ip.to_string())
                        .unwrap_or_else(|| "unknown".to_string());

                    info_span!(
                        env!("CARGO_CRATE_NAME"),
                        client_ip,
                        method = ?request.method(),
                        path = ?request.uri().path(),
                    )
                })
                .on_request(DefaultOnRequest::new().level(Level::DEBUG))
                .on_response(DefaultOnResponse::new().level(Level::DEBUG)),
        )
        .layer(Extension(storage))
        .layer(Extension(auth_gate))
        .layer(Extension(upload_config))
        .layer(Extension(cors_policy))
}

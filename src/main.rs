//! drop-share server binary.
//!
//! Exposes one shared directory over HTTP for anonymous upload, listing and
//! download, with delete guarded by a per-run admin token. The main entry
//! point loads configuration, prepares the directory, builds the Axum router
//! and serves it until a shutdown signal arrives.

mod atomic;
mod auth;
mod background;
mod config;
mod error;
mod etag;
mod files;
mod frontend;
mod http;
mod logging;
mod routes;
mod sandbox;
mod storage;
mod upload;
mod version;

use axum_server::Handle;
use clap::Parser;
use shadow_rs::shadow;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::AuthGate;
use crate::background::spawn_background_tasks;
use crate::config::{ADMIN_TOKEN_HEADER, Args, SHUTDOWN_GRACE_SECS};
use crate::http::CorsPolicy;
use crate::storage::Storage;
use crate::upload::UploadConfig;

shadow!(build);

/// Starts the drop-share server and blocks until shutdown.
#[tokio::main]
async fn main() -> Result<(), std::io::Error> {
    logging::init_logging();

    let args = Args::parse();
    let storage = Arc::new(
        Storage::open(args.shared_dir.clone(), args.staging_dir.clone()).await?,
    );
    let auth_gate = Arc::new(AuthGate::new(resolve_admin_token(&args)));
    let upload_config = Arc::new(UploadConfig {
        max_size: args.upload_max_size,
    });
    let cors_policy = Arc::new(CorsPolicy::new(&args.cors_origin));

    if !auth_gate.is_enabled() {
        warn!("no admin token configured, delete requests will be rejected");
    }

    let app = routes::build_router(storage.clone(), auth_gate, upload_config, cors_policy);

    let host = args
        .host
        .parse::<IpAddr>()
        .map_err(|err| std::io::Error::new(std::io::ErrorKind::InvalidInput, err.to_string()))?;
    let addr = SocketAddr::new(host, args.port);
    let handle = Handle::new();

    info!("🚀 Starting HTTP server at http://{}", addr);
    info!(
        shared_dir = ?storage.root_path(),
        staging_dir = ?storage.staging_path(),
        "shared directory ready"
    );

    let server = axum_server::bind(addr)
        .handle(handle.clone())
        .serve(app.into_make_service_with_connect_info::<SocketAddr>());

    spawn_background_tasks(storage, Duration::from_secs(args.staging_ttl_secs));
    tokio::select! {
        result = server => result?,
        _ = shutdown_signal(handle) => {}
    }

    Ok(())
}

/// 优先使用配置的令牌；未配置且允许时为本次运行生成一个，仅输出到 stdout。
fn resolve_admin_token(args: &Args) -> Option<String> {
    let configured = args
        .admin_token
        .clone()
        .filter(|token| !token.is_empty());
    if configured.is_some() || !args.mint_admin_token {
        return configured;
    }
    let token = Uuid::new_v4().simple().to_string();
    println!("admin token ({ADMIN_TOKEN_HEADER}): {token}");
    Some(token)
}

async fn shutdown_signal(handle: Handle) {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            warn!(error = %err, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Received termination signal shutting down");
    handle.graceful_shutdown(Some(Duration::from_secs(SHUTDOWN_GRACE_SECS)));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configured_token_wins_over_minting() {
        let args = Args::try_parse_from([
            "drop-share",
            "--admin-token",
            "fixed",
            "--mint-admin-token",
        ])
        .expect("parse");
        assert_eq!(resolve_admin_token(&args).as_deref(), Some("fixed"));
    }

    #[test]
    fn minted_token_is_random_per_call() {
        let args = Args::try_parse_from(["drop-share", "--mint-admin-token"]).expect("parse");
        let first = resolve_admin_token(&args).expect("minted");
        let second = resolve_admin_token(&args).expect("minted");
        assert_eq!(first.len(), 32);
        assert_ne!(first, second);
    }

    #[test]
    fn missing_token_without_minting_disables_delete() {
        let args = Args::try_parse_from(["drop-share"]).expect("parse");
        assert!(resolve_admin_token(&args).is_none());
    }
}

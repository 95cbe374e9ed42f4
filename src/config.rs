//! CLI arguments and server configuration defaults.

use clap::Parser;
use shadow_rs::formatcp;
use std::path::PathBuf;

use crate::build;

const VERSION_INFO: &str = formatcp!(
    r#"{}\ncommit_hash: {}\nbuild_time: {}\nbuild_env: {},{}"#,
    build::PKG_VERSION,
    build::SHORT_COMMIT,
    build::BUILD_TIME,
    build::RUST_VERSION,
    build::RUST_CHANNEL
);

pub const ADMIN_TOKEN_HEADER: &str = "x-admin-token";
pub const STAGING_DIR_NAME: &str = ".drop-share-staging";
pub const DEFAULT_UPLOAD_MAX_SIZE: u64 = 100 * 1024 * 1024 * 1024;
pub const DEFAULT_STAGING_TTL_SECS: u64 = 24 * 60 * 60;
pub const STAGING_SWEEP_INTERVAL_SECS: u64 = 900;
pub const SHUTDOWN_GRACE_SECS: u64 = 10;

/// CLI arguments and environment configuration for the server.
#[derive(Parser, Debug)]
#[command(name = "drop-share", version = VERSION_INFO, about = "Local network file drop server")]
pub struct Args {
    #[arg(
        short = 's',
        long,
        env = "DROP_SHARE_DIR",
        default_value = "uploads",
        help = "Shared directory exposed for upload/list/download/delete"
    )]
    pub shared_dir: PathBuf,
    /// 完成的上传通过 rename 移入共享目录，因此暂存目录必须与共享目录
    /// 位于同一文件系统。默认的同级目录需要对共享目录的父目录有写权限；
    /// 共享目录是挂载点（容器卷、U 盘）时应显式指定挂载内的其他目录。
    #[arg(
        long,
        env = "DROP_SHARE_STAGING_DIR",
        help = "Directory for in-flight uploads, must be on the same filesystem as the shared directory \
                (defaults to a sibling of the shared directory, which needs write access to its parent; \
                set this when the shared directory is a mount point)"
    )]
    pub staging_dir: Option<PathBuf>,
    #[arg(
        long,
        env = "DROP_SHARE_ADMIN_TOKEN",
        hide_env_values = true,
        help = "Admin token required for delete (delete is disabled when unset)"
    )]
    pub admin_token: Option<String>,
    #[arg(
        long,
        env = "DROP_SHARE_MINT_ADMIN_TOKEN",
        help = "Generate a random admin token for this run and print it to stdout"
    )]
    pub mint_admin_token: bool,
    #[arg(
        short = 'b',
        long,
        env = "DROP_SHARE_BIND",
        default_value = "127.0.0.1",
        help = "Bind address"
    )]
    pub host: String,
    #[arg(
        short = 'p',
        long,
        env = "DROP_SHARE_PORT",
        default_value_t = 3000,
        help = "HTTP port"
    )]
    pub port: u16,
    #[arg(
        long,
        env = "DROP_SHARE_CORS_ORIGIN",
        default_value = "*",
        help = "Value sent as Access-Control-Allow-Origin"
    )]
    pub cors_origin: String,
    #[arg(
        long,
        env = "DROP_SHARE_UPLOAD_MAX_SIZE",
        default_value_t = DEFAULT_UPLOAD_MAX_SIZE,
        help = "Max upload size in bytes (0 to disable)"
    )]
    pub upload_max_size: u64,
    #[arg(
        long,
        env = "DROP_SHARE_STAGING_TTL_SECS",
        default_value_t = DEFAULT_STAGING_TTL_SECS,
        help = "Age after which leftover staging files are removed (0 to disable)"
    )]
    pub staging_ttl_secs: u64,
}

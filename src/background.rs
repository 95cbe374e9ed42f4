//! 暂存目录残留文件的后台清理任务。

use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::STAGING_SWEEP_INTERVAL_SECS;
use crate::storage::Storage;

/// 启动暂存目录清理任务；`ttl` 为零时不启动。
pub fn spawn_background_tasks(storage: Arc<Storage>, ttl: Duration) {
    if ttl.is_zero() {
        return;
    }

    tokio::spawn(async move {
        let mut interval =
            tokio::time::interval(Duration::from_secs(STAGING_SWEEP_INTERVAL_SECS));
        loop {
            interval.tick().await;
            match storage.sweep_staging(ttl).await {
                Ok(0) => {}
                Ok(removed) => info!(removed, "removed stale staging files"),
                Err(err) => warn!(error = %err, "staging cleanup failed"),
            }
        }
    });
}

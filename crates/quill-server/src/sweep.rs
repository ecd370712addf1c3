use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{info, warn};

use quill_api::auth::AppStateInner;
use quill_db::format_timestamp;

/// Background task that prunes expired sessions.
pub async fn run_session_sweep(state: Arc<AppStateInner>, interval_secs: u64) {
    let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));

    loop {
        interval.tick().await;

        let db_state = state.clone();
        let swept = tokio::task::spawn_blocking(move || {
            db_state.db.delete_expired_sessions(&format_timestamp(Utc::now()))
        })
        .await;

        match swept {
            Ok(Ok(count)) => {
                if count > 0 {
                    info!("Session sweep: pruned {} expired sessions", count);
                }
            }
            Ok(Err(e)) => warn!("Session sweep error: {}", e),
            Err(e) => warn!("Session sweep task failed: {}", e),
        }
    }
}

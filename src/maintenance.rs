use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::engine::Engine;

/// Background task that rewrites the WAL once enough appends have
/// accumulated since the last compaction.
pub async fn run_compactor(engine: Arc<Engine>, threshold: u64) {
    let mut interval = tokio::time::interval(Duration::from_secs(30));
    loop {
        interval.tick().await;
        let appends = engine.wal_appends_since_compact().await;
        if appends < threshold {
            continue;
        }
        match engine.compact_wal().await {
            Ok(()) => info!("compacted WAL after {appends} appends"),
            Err(e) => tracing::warn!("WAL compaction failed: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::path::PathBuf;

    fn test_wal_path(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join("venued_test_maintenance");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        let _ = std::fs::remove_file(&path);
        path
    }

    #[tokio::test]
    async fn append_counter_tracks_and_resets_on_compaction() {
        let path = test_wal_path("compact_counter.wal");
        let engine = Arc::new(Engine::new(path).unwrap());

        let venue = engine
            .create_venue("Hall".into(), "Oslo".into(), 80, 50.0, "ops@example.com".into())
            .await
            .unwrap();
        for day in 1..=5 {
            engine
                .create_booking(
                    venue.id,
                    "Guest".into(),
                    "guest@example.com".into(),
                    NaiveDate::from_ymd_opt(2025, 6, day).unwrap(),
                    2,
                )
                .await
                .unwrap();
        }

        assert!(engine.wal_appends_since_compact().await >= 6);
        engine.compact_wal().await.unwrap();
        assert_eq!(engine.wal_appends_since_compact().await, 0);
    }
}

use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::api::health::HealthState;
use crate::api::latency::LatencyStats;
use crate::error::Result;
use crate::fetcher::{PollOutcome, SnapshotFetcher};
use crate::view::ViewState;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// Remote content unchanged; the current snapshot was kept.
    Unchanged,
    /// A new snapshot with this many records was published.
    Published { records: usize },
}

/// Polls the remote dataset on a fixed interval and publishes new snapshots.
pub struct SnapshotRefresher {
    poll_interval: Duration,
    fetcher: SnapshotFetcher,
    views: Arc<ViewState>,
    health: Arc<HealthState>,
    latency: Arc<LatencyStats>,
}

impl SnapshotRefresher {
    pub fn new(
        poll_interval: Duration,
        fetcher: SnapshotFetcher,
        views: Arc<ViewState>,
        health: Arc<HealthState>,
        latency: Arc<LatencyStats>,
    ) -> Self {
        Self { poll_interval, fetcher, views, health, latency }
    }

    pub async fn run(self) {
        // First tick fires immediately: that is the initial load.
        let mut ticker = interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            self.cycle().await;
        }
    }

    /// One refresh with bookkeeping. Failures keep the previous snapshot.
    pub async fn cycle(&self) -> Option<RefreshOutcome> {
        let started = Instant::now();
        let result = self.refresh().await;
        self.latency.record(started.elapsed());

        let now = now_secs();
        match result {
            Ok(outcome) => {
                match &outcome {
                    RefreshOutcome::Unchanged => self.health.record_cache_hit(now),
                    RefreshOutcome::Published { .. } => self.health.record_publish(now),
                }
                Some(outcome)
            }
            Err(e) => {
                self.health.record_failure(now);
                warn!(
                    consecutive_failures = self.health.consecutive_failures(),
                    "Snapshot refresh failed, keeping previous snapshot: {e}"
                );
                None
            }
        }
    }

    async fn refresh(&self) -> Result<RefreshOutcome> {
        let previous = self.views.current().await;
        let outcome = self
            .fetcher
            .poll(previous.as_ref().map(|s| &s.descriptor))
            .await?;

        match outcome {
            PollOutcome::Unchanged => {
                debug!("Snapshot refresh: content unchanged");
                Ok(RefreshOutcome::Unchanged)
            }
            PollOutcome::Updated(descriptor) => {
                let snapshot = self.views.publish(descriptor).await?;
                let records = snapshot.table().len();
                info!(
                    content_id = %snapshot.content_id(),
                    records,
                    winners = snapshot.leaderboard.len(),
                    "Snapshot published: {records} records, {} ranked participants",
                    snapshot.leaderboard.len(),
                );
                Ok(RefreshOutcome::Published { records })
            }
        }
    }
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use axum::{extract::State, http::StatusCode, routing::get, Router};
    use serde_json::json;

    use crate::config::Config;
    use crate::view::ViewSettings;

    #[derive(Default)]
    struct Remote {
        sha: Mutex<String>,
        body: Mutex<String>,
        down: Mutex<bool>,
    }

    async fn data(State(r): State<Arc<Remote>>) -> (StatusCode, String) {
        if *r.down.lock().unwrap() {
            return (StatusCode::NOT_FOUND, String::new());
        }
        (StatusCode::OK, r.body.lock().unwrap().clone())
    }

    async fn meta(State(r): State<Arc<Remote>>) -> (StatusCode, String) {
        if *r.down.lock().unwrap() {
            return (StatusCode::NOT_FOUND, String::new());
        }
        let sha = r.sha.lock().unwrap().clone();
        (StatusCode::OK, json!({ "sha": sha }).to_string())
    }

    async fn refresher_for(remote: Arc<Remote>) -> (SnapshotRefresher, Arc<ViewState>, Arc<HealthState>) {
        let app = Router::new()
            .route("/db.json", get(data))
            .route("/meta", get(meta))
            .with_state(remote);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let cfg = Config {
            data_url: format!("http://{addr}/db.json"),
            meta_url: Some(format!("http://{addr}/meta")),
            verify_blob_sha: false,
            retry_backoff: Vec::new(),
            ..Config::default()
        };
        let views = ViewState::new(ViewSettings {
            guess_bin_width: cfg.guess_bin_width,
            kde_grid_points: cfg.kde_grid_points,
        });
        let health = Arc::new(HealthState::new());
        let refresher = SnapshotRefresher::new(
            cfg.poll_interval,
            SnapshotFetcher::new(cfg).unwrap(),
            Arc::clone(&views),
            Arc::clone(&health),
            Arc::new(LatencyStats::new()),
        );
        (refresher, views, health)
    }

    fn body() -> String {
        json!({ "_default": {
            "1": { "date": "2024-01-01", "time": "093000", "name": "A", "guess": 1000, "casket": 1200, "win": "yes" },
            "2": { "date": "2024-01-01", "time": "094500", "name": "A", "guess": 5000, "casket": 1200, "win": "no" },
            "3": { "date": "2024-01-02", "time": "100000", "name": "B", "guess": 1200, "casket": 1200, "win": "yes" },
        }})
        .to_string()
    }

    #[tokio::test]
    async fn unchanged_content_keeps_the_same_table() {
        let remote = Arc::new(Remote::default());
        *remote.sha.lock().unwrap() = "abc".to_string();
        *remote.body.lock().unwrap() = body();
        let (refresher, views, health) = refresher_for(Arc::clone(&remote)).await;

        assert_eq!(refresher.cycle().await, Some(RefreshOutcome::Published { records: 3 }));
        let first = views.current().await.unwrap();

        assert_eq!(refresher.cycle().await, Some(RefreshOutcome::Unchanged));
        let second = views.current().await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert!(first.table().shares_rows_with(second.table()));
        assert_eq!(health.publishes(), 1);
        assert_eq!(health.cache_hits(), 1);

        let board: Vec<(&str, f64)> = first
            .leaderboard
            .iter()
            .map(|e| (e.participant.as_str(), e.closest_win_error))
            .collect();
        assert_eq!(board, vec![("A", 200.0), ("B", 0.0)]);
    }

    #[tokio::test]
    async fn failed_cycle_keeps_last_good_snapshot() {
        let remote = Arc::new(Remote::default());
        *remote.sha.lock().unwrap() = "abc".to_string();
        *remote.body.lock().unwrap() = body();
        let (refresher, views, health) = refresher_for(Arc::clone(&remote)).await;

        refresher.cycle().await.unwrap();
        let good = views.current().await.unwrap();

        *remote.down.lock().unwrap() = true;
        assert_eq!(refresher.cycle().await, None);
        assert_eq!(health.consecutive_failures(), 1);
        assert!(Arc::ptr_eq(&good, &views.current().await.unwrap()));

        // A changed but malformed dataset is rejected as a whole.
        *remote.down.lock().unwrap() = false;
        *remote.sha.lock().unwrap() = "def".to_string();
        *remote.body.lock().unwrap() = json!({ "_default": { "1": ["2024-01-01", "9am", "A", 1, 1, "yes"] } }).to_string();
        assert_eq!(refresher.cycle().await, None);
        assert_eq!(health.consecutive_failures(), 2);
        assert_eq!(views.current().await.unwrap().content_id().0, "abc");
    }
}

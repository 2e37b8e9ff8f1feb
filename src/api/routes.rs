use std::sync::Arc;

use axum::{
    extract::{Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::aggregate::{DateHistogram, DistributionChart, GuessHistogram, SummaryStats, TimeHistogram};
use crate::api::health::HealthState;
use crate::api::latency::LatencyStats;
use crate::error::AppError;
use crate::types::{ContentId, LeaderboardEntry, RecordRow};
use crate::view::{ViewState, ViewStatus};

#[derive(Clone)]
pub struct ApiState {
    pub views: Arc<ViewState>,
    pub health: Arc<HealthState>,
    pub latency: Arc<LatencyStats>,
    pub leaderboard_size: usize,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(get_health))
        .route("/leaderboard", get(get_leaderboard))
        .route("/records", get(get_records).post(post_records))
        .route("/summary", get(get_summary).post(post_summary))
        .route("/charts/dates", get(get_date_chart))
        .route("/charts/distribution", get(get_distribution_chart))
        .route("/charts/times", get(get_time_chart))
        .route("/charts/guesses", get(get_guess_chart))
        .route("/select/primary", post(post_select_primary))
        .route("/select/drilldown", post(post_select_drilldown))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct LeaderboardQuery {
    pub limit: Option<usize>,
}

/// Row indices as carried by chart and table selections. `content_id` names the
/// snapshot the indices were read from; a mismatch is answered with 409.
#[derive(Debug, Deserialize)]
pub struct Selection {
    #[serde(default)]
    pub indices: Vec<usize>,
    #[serde(default)]
    pub content_id: Option<ContentId>,
}

#[derive(Serialize)]
pub struct HealthResponse {
    #[serde(flatten)]
    pub status: ViewStatus,
    pub last_success_at: u64,
    pub last_failure_at: u64,
    pub consecutive_failures: u64,
    pub publishes: u64,
    pub cache_hits: u64,
    pub refresh_cycles: u64,
    pub refresh_p50_ms: Option<u64>,
    pub refresh_p95_ms: Option<u64>,
    pub refresh_p99_ms: Option<u64>,
}

#[derive(Serialize)]
pub struct SummaryResponse {
    #[serde(flatten)]
    pub stats: SummaryStats,
    pub actual_text: String,
    pub guess_text: String,
}

impl From<SummaryStats> for SummaryResponse {
    fn from(stats: SummaryStats) -> Self {
        Self {
            actual_text: stats.actual_text(),
            guess_text: stats.guess_text(),
            stats,
        }
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn get_health(State(state): State<ApiState>) -> Json<HealthResponse> {
    let (p50, p95, p99) = state.latency.percentiles();
    Json(HealthResponse {
        status: state.views.status().await,
        last_success_at: state.health.last_success_at(),
        last_failure_at: state.health.last_failure_at(),
        consecutive_failures: state.health.consecutive_failures(),
        publishes: state.health.publishes(),
        cache_hits: state.health.cache_hits(),
        refresh_cycles: state.latency.len(),
        refresh_p50_ms: p50,
        refresh_p95_ms: p95,
        refresh_p99_ms: p99,
    })
}

async fn get_leaderboard(
    State(state): State<ApiState>,
    Query(params): Query<LeaderboardQuery>,
) -> Result<Json<Vec<LeaderboardEntry>>, AppError> {
    let snapshot = state.views.loaded().await?;
    let limit = params.limit.unwrap_or(state.leaderboard_size);
    Ok(Json(snapshot.leaderboard.iter().take(limit).cloned().collect()))
}

async fn get_records(State(state): State<ApiState>) -> Result<Json<Vec<RecordRow>>, AppError> {
    Ok(Json(state.views.records(None, None).await?))
}

async fn post_records(
    State(state): State<ApiState>,
    Json(selection): Json<Selection>,
) -> Result<Json<Vec<RecordRow>>, AppError> {
    Ok(Json(state
        .views
        .records(Some(&selection.indices), selection.content_id.as_ref())
        .await?))
}

async fn get_summary(State(state): State<ApiState>) -> Result<Json<SummaryResponse>, AppError> {
    let snapshot = state.views.loaded().await?;
    Ok(Json(snapshot.summary.clone().into()))
}

async fn post_summary(
    State(state): State<ApiState>,
    Json(selection): Json<Selection>,
) -> Result<Json<SummaryResponse>, AppError> {
    let stats = state
        .views
        .selection_summary(&selection.indices, selection.content_id.as_ref())
        .await?;
    Ok(Json(stats.into()))
}

async fn get_date_chart(State(state): State<ApiState>) -> Result<Json<DateHistogram>, AppError> {
    Ok(Json(state.views.loaded().await?.date_chart.clone()))
}

async fn get_distribution_chart(
    State(state): State<ApiState>,
) -> Result<Json<DistributionChart>, AppError> {
    Ok(Json(state.views.loaded().await?.distribution.clone()))
}

async fn get_time_chart(State(state): State<ApiState>) -> Result<Json<TimeHistogram>, AppError> {
    Ok(Json(state.views.time_drilldown().await?))
}

async fn get_guess_chart(State(state): State<ApiState>) -> Result<Json<GuessHistogram>, AppError> {
    Ok(Json(state.views.guess_drilldown().await?))
}

async fn post_select_primary(
    State(state): State<ApiState>,
    Json(selection): Json<Selection>,
) -> Result<Json<TimeHistogram>, AppError> {
    let chart = state
        .views
        .select_primary(&selection.indices, selection.content_id.as_ref())
        .await?;
    Ok(Json(chart))
}

async fn post_select_drilldown(
    State(state): State<ApiState>,
    Json(selection): Json<Selection>,
) -> Result<Json<GuessHistogram>, AppError> {
    let chart = state
        .views
        .select_drilldown(&selection.indices, selection.content_id.as_ref())
        .await?;
    Ok(Json(chart))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Method, Request, StatusCode};
    use chrono::{NaiveDate, NaiveTime};
    use tower::ServiceExt;

    use crate::types::{GuessRecord, GuessTable, SnapshotDescriptor};
    use crate::view::ViewSettings;

    fn api_state() -> ApiState {
        ApiState {
            views: ViewState::new(ViewSettings {
                guess_bin_width: 1000.0,
                kde_grid_points: 16,
            }),
            health: Arc::new(HealthState::new()),
            latency: Arc::new(LatencyStats::new()),
            leaderboard_size: 1,
        }
    }

    async fn load(state: &ApiState) {
        let rec = |name: &str, guess: f64, win: bool| {
            GuessRecord::new(
                NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
                NaiveTime::from_hms_opt(9, 30, 0).unwrap(),
                name.to_string(),
                guess,
                1200.0,
                win,
            )
        };
        state
            .views
            .publish(SnapshotDescriptor {
                content_id: ContentId("abc".to_string()),
                table: GuessTable::new(vec![
                    rec("A", 1000.0, true),
                    rec("A", 5000.0, false),
                    rec("B", 1200.0, true),
                ]),
            })
            .await
            .unwrap();
    }

    async fn call(state: &ApiState, method: Method, uri: &str, body: Option<&str>) -> (StatusCode, serde_json::Value) {
        let mut req = Request::builder().method(method).uri(uri);
        if body.is_some() {
            req = req.header(header::CONTENT_TYPE, "application/json");
        }
        let req = req
            .body(body.map(|b| Body::from(b.to_string())).unwrap_or_else(Body::empty))
            .unwrap();
        let resp = router(state.clone()).oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (status, json)
    }

    #[tokio::test]
    async fn views_are_unavailable_before_first_load() {
        let state = api_state();
        let (status, _) = call(&state, Method::GET, "/leaderboard", None).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

        let (status, body) = call(&state, Method::GET, "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["state"], "empty");
    }

    #[tokio::test]
    async fn leaderboard_is_truncated_to_configured_size() {
        let state = api_state();
        load(&state).await;

        let (status, body) = call(&state, Method::GET, "/leaderboard", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 1);
        assert_eq!(body[0]["participant"], "A");

        let (_, body) = call(&state, Method::GET, "/leaderboard?limit=5", None).await;
        assert_eq!(body.as_array().unwrap().len(), 2);
        assert_eq!(body[1]["win_rate"], 1.0);
    }

    #[tokio::test]
    async fn empty_selection_is_a_bad_request() {
        let state = api_state();
        load(&state).await;

        let (status, _) = call(&state, Method::POST, "/select/primary", Some(r#"{"indices":[]}"#)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = call(&state, Method::POST, "/select/primary", Some(r#"{"indices":[0,1]}"#)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total"], 2);

        let (_, body) = call(&state, Method::GET, "/charts/times", None).await;
        assert_eq!(body["counts"][9], 2);
    }

    #[tokio::test]
    async fn selection_for_another_snapshot_is_a_conflict() {
        let state = api_state();
        load(&state).await;

        let (status, _) = call(
            &state,
            Method::POST,
            "/select/primary",
            Some(r#"{"indices":[0],"content_id":"older"}"#),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, body) = call(
            &state,
            Method::POST,
            "/select/primary",
            Some(r#"{"indices":[0],"content_id":"abc"}"#),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total"], 1);

        let (_, body) = call(&state, Method::GET, "/health", None).await;
        assert_eq!(body["content_id"], "abc");
    }

    #[tokio::test]
    async fn summary_carries_text_blocks() {
        let state = api_state();
        load(&state).await;

        let (status, body) = call(&state, Method::GET, "/summary", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["guess_count"], 3);
        assert!(body["guess_text"].as_str().unwrap().starts_with("Guesses made: 3"));

        let (_, body) = call(&state, Method::POST, "/summary", Some(r#"{"indices":[2]}"#)).await;
        assert_eq!(body["guess_count"], 1);
    }

    #[tokio::test]
    async fn records_carry_their_table_index() {
        let state = api_state();
        load(&state).await;

        let (_, body) = call(&state, Method::POST, "/records", Some(r#"{"indices":[2]}"#)).await;
        assert_eq!(body[0]["index"], 2);
        assert_eq!(body[0]["participant"], "B");
        assert_eq!(body[0]["date"], "2024-01-01");
        assert_eq!(body[0]["time"], "09:30:00");
    }
}

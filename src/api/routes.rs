use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::State,
    response::{Html, IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::DateTime;
use chrono_tz::Tz;
use serde::Serialize;
use tower_http::services::ServeDir;
use tracing::{error, info};

use crate::api::health::{HealthReport, HealthState};
use crate::api::latency::{LatencyReport, LatencyStats};
use crate::dashboard::{DashboardView, Renderer};
use crate::error::Result;
use crate::snapshot::session::{format_updated_at, market_status, now_ist};
use crate::snapshot::{BuildOutcome, SnapshotBuilder};
use crate::types::MarketStatus;

#[derive(Clone)]
pub struct ApiState {
    pub builder: SnapshotBuilder,
    pub renderer: Arc<Renderer>,
    pub health: Arc<HealthState>,
    pub latency: Arc<LatencyStats>,
}

impl ApiState {
    pub fn new(builder: SnapshotBuilder, renderer: Renderer) -> Self {
        Self {
            builder,
            renderer: Arc::new(renderer),
            health: Arc::new(HealthState::new()),
            latency: Arc::new(LatencyStats::new()),
        }
    }

    /// One build, timed and counted.
    async fn build_snapshot(&self, now: DateTime<Tz>) -> BuildOutcome {
        let started = Instant::now();
        let outcome = self.builder.build(now).await;
        let elapsed = started.elapsed();

        self.latency.record(elapsed);
        self.health.record_build(outcome.is_degraded(), now.timestamp_millis());
        info!(
            effective_date = %outcome.effective_date,
            failed_steps = outcome.failures.len(),
            elapsed_ms = elapsed.as_millis() as u64,
            "snapshot built"
        );
        outcome
    }
}

pub fn router(state: ApiState, static_dir: &str) -> Router {
    Router::new()
        .route("/", get(dashboard))
        .route("/api/snapshot", get(get_snapshot))
        .route("/health", get(get_health))
        .route("/stats/latency", get(get_stats_latency))
        .nest_service("/static", ServeDir::new(static_dir))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct SnapshotResponse {
    #[serde(flatten)]
    pub outcome: BuildOutcome,
    pub updated_at: String,
    pub market_status: MarketStatus,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn dashboard(State(state): State<ApiState>) -> Response {
    match render_dashboard(&state, now_ist()).await {
        Ok(html) => Html(html).into_response(),
        Err(e) => {
            error!("Dashboard error: {e}");
            e.into_response()
        }
    }
}

pub async fn render_dashboard(state: &ApiState, now: DateTime<Tz>) -> Result<String> {
    let outcome = state.build_snapshot(now).await;
    state.renderer.render(&DashboardView::new(&outcome, &now))
}

async fn get_snapshot(State(state): State<ApiState>) -> Json<SnapshotResponse> {
    let now = now_ist();
    let outcome = state.build_snapshot(now).await;
    Json(SnapshotResponse {
        outcome,
        updated_at: format_updated_at(&now),
        market_status: market_status(&now),
    })
}

async fn get_health(State(state): State<ApiState>) -> Json<HealthReport> {
    Json(state.health.report())
}

async fn get_stats_latency(State(state): State<ApiState>) -> Json<LatencyReport> {
    Json(state.latency.report())
}

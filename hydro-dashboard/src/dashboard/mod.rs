pub mod render;

use std::{net::SocketAddr, sync::Arc};

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use usage_client::{aggregate, Metric, TimeBin, UsageBucket, UsageSummary};

use crate::config::{AppConfig, Credentials};
use crate::load::load_dataset;
use crate::pipeline::PipelineError;
use crate::sinks::Dataset;
use render::View;

/// Shared by all handlers. The dataset is fetched on first use and kept
/// until a refresh is requested; failed fetches are not cached.
pub struct DashboardState {
    config: AppConfig,
    credentials: Option<Credentials>,
    dataset: Mutex<Option<Arc<Dataset>>>,
}

impl DashboardState {
    pub fn new(config: AppConfig, credentials: Option<Credentials>) -> Self {
        Self {
            config,
            credentials,
            dataset: Mutex::new(None),
        }
    }

    /// The lock is held across the fetch so concurrent page loads share one login.
    pub async fn dataset(&self, refresh: bool) -> Result<Arc<Dataset>, PipelineError> {
        let mut guard = self.dataset.lock().await;
        if refresh {
            tracing::info!("dropping cached usage dataset");
            *guard = None;
        }

        if let Some(ds) = guard.as_ref() {
            return Ok(ds.clone());
        }

        let ds = Arc::new(load_dataset(&self.config, self.credentials.as_ref()).await?);
        *guard = Some(ds.clone());
        Ok(ds)
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ViewParams {
    metric: Option<String>,
    bin: Option<String>,
    #[serde(default)]
    table: bool,
    #[serde(default)]
    refresh: bool,
}

impl ViewParams {
    fn view(&self) -> Result<View, String> {
        let metric = match &self.metric {
            Some(m) => m.parse::<Metric>().map_err(|e| e.to_string())?,
            None => Metric::default(),
        };
        let bin = match &self.bin {
            Some(b) => b.parse::<TimeBin>().map_err(|e| e.to_string())?,
            None => TimeBin::default(),
        };
        Ok(View {
            metric,
            bin,
            show_table: self.table,
        })
    }
}

pub fn router(state: Arc<DashboardState>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/api/usage", get(api_usage))
        .route("/healthz", get(|| async { "ok" }))
        .with_state(state)
}

pub async fn serve(config: AppConfig, credentials: Option<Credentials>) -> anyhow::Result<()> {
    let addr: SocketAddr = config
        .dashboard
        .bind_addr
        .parse()
        .map_err(|e| anyhow::anyhow!("invalid dashboard.bind_addr: {e}"))?;

    let app = router(Arc::new(DashboardState::new(config, credentials)));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "dashboard listening on http://{addr}/");
    axum::serve(listener, app.into_make_service()).await?;
    Ok(())
}

async fn index(State(state): State<Arc<DashboardState>>, Query(params): Query<ViewParams>) -> Response {
    let title = state.config.dashboard.title.clone();

    let view = match params.view() {
        Ok(v) => v,
        Err(msg) => {
            let page = render::error_page(&title, &msg, View::default());
            return (StatusCode::BAD_REQUEST, Html(page)).into_response();
        }
    };

    metrics::counter!("dashboard_renders_total").increment(1);
    match state.dataset(params.refresh).await {
        Ok(ds) => Html(render::dashboard_page(&title, &ds, view)).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "failed to load usage data");
            (StatusCode::BAD_GATEWAY, Html(render::error_page(&title, &e.to_string(), view))).into_response()
        }
    }
}

#[derive(Debug, Serialize)]
pub struct UsageResponse {
    pub bin: TimeBin,
    pub summary: UsageSummary,
    pub buckets: Vec<UsageBucket>,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

async fn api_usage(State(state): State<Arc<DashboardState>>, Query(params): Query<ViewParams>) -> Response {
    let view = match params.view() {
        Ok(v) => v,
        Err(error) => return (StatusCode::BAD_REQUEST, Json(ErrorBody { error })).into_response(),
    };

    match state.dataset(params.refresh).await {
        Ok(ds) => Json(UsageResponse {
            bin: view.bin,
            summary: ds.summary(),
            buckets: aggregate(&ds.records, view.bin),
        })
        .into_response(),
        Err(e) => (StatusCode::BAD_GATEWAY, Json(ErrorBody { error: e.to_string() })).into_response(),
    }
}

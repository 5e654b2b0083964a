#![cfg(feature = "web")]
use axum::{
    Json, Router,
    body::Bytes,
    extract::{Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::net::TcpListener;
use tower_http::services::ServeDir;

use crate::config::Config;
use crate::controller::{App, Tracked};
use crate::dataset::View;
use crate::error::TribesError;
use crate::graph::{ChartOptions, render_bar_chart};
use crate::record::{ConnectionRecord, PointsRecord, parse_date};

pub struct AppState {
    app: Mutex<App>,
}

impl AppState {
    pub fn new(app: App) -> Arc<Self> {
        Arc::new(AppState {
            app: Mutex::new(app),
        })
    }

    // A handler that panicked mid-request leaves the data on disk intact,
    // so a poisoned lock is still usable.
    fn lock(&self) -> MutexGuard<'_, App> {
        self.app.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[derive(Deserialize)]
struct LoginForm {
    code: String,
}

#[derive(Deserialize)]
struct PointsForm {
    tribe: String,
    #[serde(default)]
    game: String,
    points: i64,
    date: String,
}

#[derive(Deserialize)]
struct ConnectionForm {
    tribe: String,
    #[serde(alias = "jovens")]
    youth_count: i64,
    date: String,
}

#[derive(Deserialize)]
struct ViewQuery {
    tribe: Option<String>,
    start: Option<String>,
    end: Option<String>,
}

#[derive(Serialize)]
struct OpResponse {
    success: bool,
    error: Option<String>,
}

impl OpResponse {
    fn ok() -> Json<OpResponse> {
        Json(OpResponse {
            success: true,
            error: None,
        })
    }
}

impl IntoResponse for TribesError {
    fn into_response(self) -> Response {
        let status = match &self {
            TribesError::AuthenticationFailed | TribesError::NotAuthenticated => {
                StatusCode::UNAUTHORIZED
            }
            TribesError::Validation { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            TribesError::Snapshot(_) => StatusCode::BAD_REQUEST,
            TribesError::CorruptData { .. } | TribesError::Io(_) | TribesError::Export(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            log::error!("request failed: {}", self);
        }
        let body = OpResponse {
            success: false,
            error: Some(self.to_string()),
        };
        (status, Json(body)).into_response()
    }
}

/// Build the HTTP routes over a shared app.
pub fn router(state: Arc<AppState>, static_dir: &std::path::Path) -> Router {
    Router::new()
        .route("/api/login", post(login))
        .route("/api/tribes", get(tribes))
        .route("/api/points", post(record_points).get(query::<PointsRecord>))
        .route("/api/points/edits", post(apply_edits::<PointsRecord>))
        .route("/api/points/delete", post(delete_rows::<PointsRecord>))
        .route("/api/points/summary", post(summary::<PointsRecord>))
        .route("/api/points/chart", get(chart::<PointsRecord>))
        .route("/api/points/export.csv", get(export_csv::<PointsRecord>))
        .route("/api/points/export.xlsx", get(export_xlsx::<PointsRecord>))
        .route(
            "/api/connection",
            post(record_connection).get(query::<ConnectionRecord>),
        )
        .route("/api/connection/edits", post(apply_edits::<ConnectionRecord>))
        .route("/api/connection/delete", post(delete_rows::<ConnectionRecord>))
        .route("/api/connection/summary", post(summary::<ConnectionRecord>))
        .route("/api/connection/chart", get(chart::<ConnectionRecord>))
        .route(
            "/api/connection/export.csv",
            get(export_csv::<ConnectionRecord>),
        )
        .route(
            "/api/connection/export.xlsx",
            get(export_xlsx::<ConnectionRecord>),
        )
        .route("/api/snapshot", get(export_snapshot).post(restore_snapshot))
        .nest_service("/static", ServeDir::new(static_dir))
        .with_state(state)
}

pub async fn run(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let addr = config.bind_addr();
    let static_dir = config.static_dir.clone();
    log::info!("data directory: {}", config.data_dir.display());

    let state = AppState::new(App::new(config));
    let app = router(state, &static_dir);

    let listener = TcpListener::bind(&addr).await?;
    log::info!("Listening on http://{}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}

async fn login(State(state): State<Arc<AppState>>, Json(form): Json<LoginForm>) -> Response {
    match state.lock().authenticate(&form.code) {
        Ok(()) => OpResponse::ok().into_response(),
        Err(e) => e.into_response(),
    }
}

async fn tribes(State(state): State<Arc<AppState>>) -> Response {
    let app = state.lock();
    let response = match app.tribes() {
        Ok(tribes) => Json(serde_json::json!({ "success": true, "tribes": tribes })).into_response(),
        Err(e) => e.into_response(),
    };
    response
}

async fn record_points(State(state): State<Arc<AppState>>, Json(form): Json<PointsForm>) -> Response {
    let result = state
        .lock()
        .record_points(&form.tribe, &form.game, form.points, &form.date);
    saved(result)
}

async fn record_connection(
    State(state): State<Arc<AppState>>,
    Json(form): Json<ConnectionForm>,
) -> Response {
    let result = state
        .lock()
        .record_connection(&form.tribe, form.youth_count, &form.date);
    saved(result)
}

fn saved(result: Result<usize, TribesError>) -> Response {
    match result {
        Ok(index) => Json(serde_json::json!({ "success": true, "index": index })).into_response(),
        Err(e) => e.into_response(),
    }
}

async fn query<R: Tracked>(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ViewQuery>,
) -> Response {
    let start = match optional_date(params.start.as_deref(), "start") {
        Ok(date) => date,
        Err(e) => return e.into_response(),
    };
    let end = match optional_date(params.end.as_deref(), "end") {
        Ok(date) => date,
        Err(e) => return e.into_response(),
    };
    let category = params.tribe.unwrap_or_default();

    match state.lock().query::<R>(&category, start, end) {
        Ok(view) => Json(serde_json::json!({ "success": true, "rows": view.rows })).into_response(),
        Err(e) => e.into_response(),
    }
}

async fn apply_edits<R: Tracked>(
    State(state): State<Arc<AppState>>,
    Json(edited): Json<View<R>>,
) -> Response {
    match state.lock().apply_edits(&edited) {
        Ok(outcome) => Json(serde_json::json!({
            "success": true,
            "updated": outcome.updated,
            "appended": outcome.appended,
        }))
        .into_response(),
        Err(e) => e.into_response(),
    }
}

async fn delete_rows<R: Tracked>(
    State(state): State<Arc<AppState>>,
    Json(surviving): Json<View<R>>,
) -> Response {
    match state.lock().delete_rows(&surviving) {
        Ok(removed) => {
            Json(serde_json::json!({ "success": true, "removed": removed })).into_response()
        }
        Err(e) => e.into_response(),
    }
}

async fn summary<R: Tracked>(
    State(state): State<Arc<AppState>>,
    Json(view): Json<View<R>>,
) -> Response {
    match state.lock().summary(&view) {
        Ok(summary) => {
            Json(serde_json::json!({ "success": true, "totals": summary.totals })).into_response()
        }
        Err(e) => e.into_response(),
    }
}

/// PNG bar chart of the current view; 204 when there is nothing to draw.
async fn chart<R: Tracked>(State(state): State<Arc<AppState>>) -> Response {
    let summary = {
        let app = state.lock();
        let view = match app.current_view::<R>() {
            Ok(Some(view)) => view.clone(),
            Ok(None) => return StatusCode::NO_CONTENT.into_response(),
            Err(e) => return e.into_response(),
        };
        match app.summary(&view) {
            Ok(summary) => summary,
            Err(e) => return e.into_response(),
        }
    };
    if summary.is_empty() {
        return StatusCode::NO_CONTENT.into_response();
    }

    match render_bar_chart(&summary, &ChartOptions::for_kind(R::KIND)) {
        Ok(png) => ([(header::CONTENT_TYPE, "image/png")], png).into_response(),
        Err(e) => TribesError::Export(e.to_string()).into_response(),
    }
}

async fn export_csv<R: Tracked>(State(state): State<Arc<AppState>>) -> Response {
    match state.lock().export_csv::<R>() {
        Ok(csv) => ([(header::CONTENT_TYPE, "text/csv; charset=utf-8")], csv).into_response(),
        Err(e) => e.into_response(),
    }
}

async fn export_xlsx<R: Tracked>(State(state): State<Arc<AppState>>) -> Response {
    match state.lock().export_xlsx::<R>() {
        Ok(bytes) => (
            [(
                header::CONTENT_TYPE,
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
            )],
            bytes,
        )
            .into_response(),
        Err(e) => e.into_response(),
    }
}

async fn export_snapshot(State(state): State<Arc<AppState>>) -> Response {
    match state.lock().export_snapshot() {
        Ok(bytes) => ([(header::CONTENT_TYPE, "application/gzip")], bytes).into_response(),
        Err(e) => e.into_response(),
    }
}

async fn restore_snapshot(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    if body.is_empty() {
        return TribesError::validation("snapshot", "no file data received").into_response();
    }
    match state.lock().restore_snapshot(&body) {
        Ok(()) => OpResponse::ok().into_response(),
        Err(e) => e.into_response(),
    }
}

fn optional_date(text: Option<&str>, field: &str) -> Result<Option<chrono::NaiveDate>, TribesError> {
    match text.map(str::trim).filter(|t| !t.is_empty()) {
        None => Ok(None),
        Some(t) => parse_date(t)
            .map(Some)
            .ok_or_else(|| TribesError::validation(field, format!("'{}' is not a date", t))),
    }
}

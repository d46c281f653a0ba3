//! REST API handlers for the weekly rota.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::error;

use crate::commands;
use crate::config::AppConfig;
use crate::domain::Day;
use crate::dto::{DayAssignmentDto, GeneratedWeekDto, HistoryRecord, StateDto, WeekDto};
use crate::format;
use crate::jobs::{Announcement, Announcements, Notifier};
use crate::solver::GenerationError;
use crate::store::{Change, DayList, Store, StoreError};

/// Application state shared across handlers.
pub struct AppState {
    pub store: Arc<Store>,
    pub config: Arc<AppConfig>,
    pub announcements: Arc<Announcements>,
}

impl AppState {
    pub fn new(store: Arc<Store>, config: Arc<AppConfig>, announcements: Arc<Announcements>) -> Self {
        Self {
            store,
            config,
            announcements,
        }
    }
}

/// Creates the API router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        // Health & Info
        .route("/health", get(health))
        .route("/info", get(info))
        .route("/roster", get(roster))
        // Weeks
        .route("/week", get(get_week))
        .route("/today", get(get_today))
        .route("/history", get(list_history))
        .route("/regenerate", post(regenerate))
        // Absences & preferences
        .route("/state", get(get_state))
        .route("/absences", post(add_absence))
        .route("/absences/{worker}/{day}", delete(remove_absence))
        .route("/preferences", post(add_preference))
        .route("/preferences/{worker}/{day}", delete(remove_preference))
        // Chat-style commands and announcements
        .route("/commands", post(run_command))
        .route("/announcements", get(list_announcements))
        .with_state(state)
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blocked: Option<Vec<String>>,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
            blocked: None,
        }),
    )
}

impl From<StoreError> for ErrorResponse {
    fn from(e: StoreError) -> Self {
        let blocked = match &e {
            StoreError::Generation(GenerationError::NoFeasibleAssignment { blocked }) => {
                Some(blocked.clone())
            }
            _ => None,
        };
        Self {
            error: e.to_string(),
            blocked,
        }
    }
}

fn store_error(e: StoreError) -> ApiError {
    let status = match &e {
        StoreError::UnknownWorker(_) => StatusCode::BAD_REQUEST,
        StoreError::Generation(GenerationError::NoFeasibleAssignment { .. }) => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        StoreError::Generation(GenerationError::GenerationExhausted { .. }) => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        StoreError::Io { .. } | StoreError::Json { .. } => {
            error!(error = %e, "Storage failure");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    (status, Json(ErrorResponse::from(e)))
}

fn join_error(e: tokio::task::JoinError) -> ApiError {
    error!(error = %e, "Blocking task failed");
    api_error(StatusCode::INTERNAL_SERVER_ERROR, "internal error")
}

// ============================================================================
// Health & Info
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// GET /health - Health check endpoint.
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "UP" })
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InfoResponse {
    pub name: &'static str,
    pub version: &'static str,
    pub solver_engine: &'static str,
}

/// GET /info - Application info endpoint.
async fn info() -> Json<InfoResponse> {
    Json(InfoResponse {
        name: "Weekly Rota",
        version: env!("CARGO_PKG_VERSION"),
        solver_engine: "randomized-restart",
    })
}

/// GET /roster - Worker names in roster order.
async fn roster(State(state): State<Arc<AppState>>) -> Json<Vec<String>> {
    Json(state.store.roster().to_vec())
}

// ============================================================================
// Weeks
// ============================================================================

/// GET /week - The most recent generated week.
async fn get_week(State(state): State<Arc<AppState>>) -> Result<Json<WeekDto>, StatusCode> {
    state
        .store
        .latest()
        .map(|record| Json(WeekDto::from(&record)))
        .ok_or(StatusCode::NOT_FOUND)
}

/// GET /today - Who is on shift today, in the configured offset.
async fn get_today(
    State(state): State<Arc<AppState>>,
) -> Result<Json<DayAssignmentDto>, StatusCode> {
    let record = state.store.latest().ok_or(StatusCode::NOT_FOUND)?;
    let offset = state
        .config
        .offset()
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    let day = format::today(Utc::now(), offset);
    Ok(Json(DayAssignmentDto {
        day,
        name: day.name(),
        workers: record.workers_on(day).to_vec(),
    }))
}

/// GET /history - All stored weeks, oldest first.
async fn list_history(State(state): State<Arc<AppState>>) -> Json<Vec<HistoryRecord>> {
    Json(state.store.history())
}

/// POST /regenerate - Generate, store and announce a new week.
async fn regenerate(
    State(state): State<Arc<AppState>>,
) -> Result<Json<GeneratedWeekDto>, ApiError> {
    let store = state.store.clone();
    let config = state.config.clone();
    let (record, accepted) = tokio::task::spawn_blocking(move || store.regenerate(&config.solver))
        .await
        .map_err(join_error)?
        .map_err(store_error)?;

    state.announcements.announce(&format!(
        "*New week generated:*\n\n{}",
        format::format_week(&record)
    ));
    Ok(Json(GeneratedWeekDto::new(&record, &accepted)))
}

// ============================================================================
// Absences & preferences
// ============================================================================

/// GET /state - Absences, preferences and stored week count.
async fn get_state(State(state): State<Arc<AppState>>) -> Json<StateDto> {
    Json(state.store.state())
}

/// A day given by index or by name.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum DayInput {
    Index(u8),
    Name(String),
}

impl DayInput {
    fn parse(&self) -> Result<Day, ApiError> {
        let parsed = match self {
            DayInput::Index(i) => Day::try_from(*i),
            DayInput::Name(name) => name.parse(),
        };
        parsed.map_err(|e| api_error(StatusCode::BAD_REQUEST, e.to_string()))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DayEditRequest {
    pub worker: String,
    pub day: DayInput,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DayEditResponse {
    pub worker: String,
    pub day: Day,
    pub change: Change,
}

fn edit(
    state: &AppState,
    list: DayList,
    remove: bool,
    worker: &str,
    day: &DayInput,
) -> Result<Json<DayEditResponse>, ApiError> {
    let day = day.parse()?;
    let store = &state.store;
    let change = if remove {
        store.remove_day(list, worker, day)
    } else {
        store.add_day(list, worker, day)
    }
    .map_err(store_error)?;

    let worker = store.resolve_worker(worker).map_err(store_error)?.to_string();
    Ok(Json(DayEditResponse {
        worker,
        day,
        change,
    }))
}

/// POST /absences - Record an absence.
async fn add_absence(
    State(state): State<Arc<AppState>>,
    Json(req): Json<DayEditRequest>,
) -> Result<Json<DayEditResponse>, ApiError> {
    edit(&state, DayList::Absences, false, &req.worker, &req.day)
}

/// DELETE /absences/{worker}/{day} - Remove an absence.
async fn remove_absence(
    State(state): State<Arc<AppState>>,
    Path((worker, day)): Path<(String, String)>,
) -> Result<Json<DayEditResponse>, ApiError> {
    edit(&state, DayList::Absences, true, &worker, &DayInput::Name(day))
}

/// POST /preferences - Record a preferred day.
async fn add_preference(
    State(state): State<Arc<AppState>>,
    Json(req): Json<DayEditRequest>,
) -> Result<Json<DayEditResponse>, ApiError> {
    edit(&state, DayList::Preferences, false, &req.worker, &req.day)
}

/// DELETE /preferences/{worker}/{day} - Remove a preferred day.
async fn remove_preference(
    State(state): State<Arc<AppState>>,
    Path((worker, day)): Path<(String, String)>,
) -> Result<Json<DayEditResponse>, ApiError> {
    edit(&state, DayList::Preferences, true, &worker, &DayInput::Name(day))
}

// ============================================================================
// Commands & announcements
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct CommandRequest {
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct CommandResponse {
    pub reply: String,
}

/// POST /commands - Run a slash command and return its reply.
async fn run_command(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CommandRequest>,
) -> Result<Json<CommandResponse>, ApiError> {
    let store = state.store.clone();
    let config = state.config.clone();
    let announcements = state.announcements.clone();
    let reply = tokio::task::spawn_blocking(move || {
        commands::handle(&store, &config, announcements.as_ref(), &req.text, Utc::now())
    })
    .await
    .map_err(join_error)?;
    Ok(Json(CommandResponse { reply }))
}

/// GET /announcements - Recent announcements, oldest first.
async fn list_announcements(State(state): State<Arc<AppState>>) -> Json<Vec<Announcement>> {
    Json(state.announcements.recent())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request};
    use serde_json::{json, Value};
    use std::path::PathBuf;
    use tower::ServiceExt;

    fn test_app() -> (Router, Arc<AppState>, PathBuf) {
        let dir = std::env::temp_dir().join(format!("rota-api-{}", uuid::Uuid::new_v4()));
        let config = AppConfig {
            data_dir: dir.clone(),
            seed: Some(23),
            ..AppConfig::default()
        };
        let store = Store::open(&dir, config.roster.clone(), config.seed).unwrap();
        let state = Arc::new(AppState::new(
            Arc::new(store),
            Arc::new(config),
            Arc::new(Announcements::new()),
        ));
        (router(state.clone()), state, dir)
    }

    async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    #[tokio::test]
    async fn test_health() {
        let (app, _, _) = test_app();

        let (status, body) = send(&app, "GET", "/health", None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"status": "UP"}));
    }

    #[tokio::test]
    async fn test_week_is_404_before_generation() {
        let (app, _, _) = test_app();

        let (status, _) = send(&app, "GET", "/week", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = send(&app, "GET", "/today", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_regenerate_and_read_back() {
        let (app, state, dir) = test_app();

        let (status, body) = send(&app, "POST", "/regenerate", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["tier"], "OPTIMAL");
        assert_eq!(body["repeats"], 0);
        let days = body["week"]["days"].as_array().unwrap();
        assert_eq!(days.len(), 7);
        assert!(days.iter().all(|d| d["workers"].as_array().unwrap().len() == 2));

        let (status, week) = send(&app, "GET", "/week", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(week["id"], body["week"]["id"]);

        let (status, today) = send(&app, "GET", "/today", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(today["workers"].as_array().unwrap().len(), 2);

        let (_, history) = send(&app, "GET", "/history", None).await;
        assert_eq!(history.as_array().unwrap().len(), 1);

        assert_eq!(state.announcements.recent().len(), 1);
        std::fs::remove_dir_all(dir).unwrap();
    }

    #[tokio::test]
    async fn test_absence_endpoints() {
        let (app, _, dir) = test_app();

        let (status, body) = send(
            &app,
            "POST",
            "/absences",
            Some(json!({"worker": "stefi", "day": "venerdì"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"worker": "Stefi", "day": 4, "change": "ADDED"}));

        let (_, body) = send(&app, "POST", "/absences", Some(json!({"worker": "Stefi", "day": 4}))).await;
        assert_eq!(body["change"], "ALREADY_PRESENT");

        let (_, state) = send(&app, "GET", "/state", None).await;
        assert_eq!(state["absences"]["Stefi"], json!([4]));

        let (status, body) = send(&app, "DELETE", "/absences/Stefi/fri", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["change"], "REMOVED");
        std::fs::remove_dir_all(dir).unwrap();
    }

    #[tokio::test]
    async fn test_bad_edit_requests() {
        let (app, _, _) = test_app();

        let (status, body) = send(
            &app,
            "POST",
            "/preferences",
            Some(json!({"worker": "Nobody", "day": 1})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "unknown worker: Nobody");

        let (status, _) = send(
            &app,
            "POST",
            "/preferences",
            Some(json!({"worker": "Fede", "day": 9})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_blocked_worker_is_422() {
        let (app, _, dir) = test_app();
        for day in 0..6 {
            send(&app, "POST", "/absences", Some(json!({"worker": "Ros", "day": day}))).await;
        }

        let (status, body) = send(&app, "POST", "/regenerate", None).await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["blocked"], json!(["Ros"]));
        std::fs::remove_dir_all(dir).unwrap();
    }

    #[tokio::test]
    async fn test_command_endpoint() {
        let (app, _, _) = test_app();

        let (status, body) = send(&app, "POST", "/commands", Some(json!({"text": "/help"}))).await;

        assert_eq!(status, StatusCode::OK);
        assert!(body["reply"].as_str().unwrap().contains("/regenerate"));
    }

    #[tokio::test]
    async fn test_command_regenerate_is_announced() {
        let (app, state, dir) = test_app();

        let (status, body) =
            send(&app, "POST", "/commands", Some(json!({"text": "/regenerate"}))).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(state.store.state().weeks_stored, 1);
        let announced = state.announcements.recent();
        assert_eq!(announced.len(), 1);
        assert_eq!(announced[0].text, body["reply"].as_str().unwrap());
        std::fs::remove_dir_all(dir).unwrap();
    }
}

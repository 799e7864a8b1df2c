//! HTTP route definitions

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Path, Query, State},
    http::{header, Method, StatusCode},
    response::{IntoResponse, Json},
    routing::{delete, get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{debug, info};
use uuid::Uuid;

use crate::app::AppState;
use crate::capture::{CaptureStatus, FrameSource};
use crate::game::{CalibrationError, Difficulty, GameError};
use crate::util::time::uptime_secs;
use crate::vision::{FrameError, Rgb};
use crate::ws::handler::ws_handler;
use crate::ws::protocol::{GameSnapshot, PlayerSnapshot};

/// Build the application router
pub fn build_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.client_origin);

    // Raw RGBA frames exceed the default body limit
    let (width, height) = state.game.frames().expected_size();
    let frame_limit = (width as usize * height as usize * 4).max(1024 * 1024) * 2;

    let capture_routes = Router::new()
        .route("/frames", post(frame_ingest_handler))
        .route("/capture/status", post(capture_status_handler))
        .layer(DefaultBodyLimit::max(frame_limit));

    let game_routes = Router::new()
        .route("/health", get(health_handler))
        .route("/state", get(state_handler))
        .route("/ws", get(ws_handler))
        .route("/players", post(add_player_handler))
        .route("/players/:id", delete(remove_player_handler))
        .route("/players/:id/calibrate", post(calibrate_handler))
        .route("/players/:id/threshold", post(player_threshold_handler))
        .route("/settings/difficulty", post(difficulty_handler))
        .route("/settings/threshold", post(threshold_handler))
        .route("/game/start", post(start_game_handler))
        .route("/game/reset", post(reset_game_handler))
        .route("/tracking/start", post(tracking_start_handler))
        .route("/tracking/stop", post(tracking_stop_handler));

    Router::new()
        .merge(game_routes)
        .merge(capture_routes)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// CORS for the UI; `*` allows any origin, otherwise a comma-separated list
fn cors_layer(client_origin: &str) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    if client_origin.trim() == "*" {
        return cors.allow_origin(Any);
    }

    let allowed_origins: Vec<header::HeaderValue> = client_origin
        .split(',')
        .filter_map(|s| s.trim().parse::<header::HeaderValue>().ok())
        .collect();
    cors.allow_origin(allowed_origins)
}

// ============================================================================
// Health and state
// ============================================================================

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    uptime_secs: u64,
    players: usize,
    capture: CaptureStatus,
    tracking_enabled: bool,
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let players = state.game.state().read().players().len();

    Json(HealthResponse {
        status: "ok",
        uptime_secs: uptime_secs(),
        players,
        capture: state.game.frames().status(),
        tracking_enabled: state.game.tracking().is_enabled(),
    })
}

async fn state_handler(State(state): State<AppState>) -> Json<GameSnapshot> {
    Json(state.game.snapshot())
}

// ============================================================================
// Player registry
// ============================================================================

#[derive(Deserialize)]
struct AddPlayerRequest {
    name: String,
    /// Reference color as `#rrggbb`
    color: String,
    #[serde(default)]
    match_threshold: Option<f32>,
}

async fn add_player_handler(
    State(state): State<AppState>,
    Json(req): Json<AddPlayerRequest>,
) -> Result<(StatusCode, Json<PlayerSnapshot>), AppError> {
    let name = req.name.trim().to_string();
    if name.is_empty() {
        return Err(AppError::BadRequest("Player name must not be empty".to_string()));
    }
    let color = Rgb::from_hex(&req.color)
        .ok_or_else(|| AppError::BadRequest(format!("Invalid color '{}'", req.color)))?;

    let id = Uuid::new_v4();
    let player = state
        .game
        .register_player(id, name, color, req.match_threshold)?;

    info!(player_id = %id, name = %player.name, color = %color.to_hex(), "Player registered");
    Ok((StatusCode::CREATED, Json(PlayerSnapshot::from(&player))))
}

async fn remove_player_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.game.remove_player(&id)?;
    info!(player_id = %id, "Player removed");
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
struct CalibrateRequest {
    x: u32,
    y: u32,
    #[serde(default)]
    radius: Option<u32>,
}

#[derive(Serialize)]
struct CalibrateResponse {
    color: String,
}

async fn calibrate_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<CalibrateRequest>,
) -> Result<Json<CalibrateResponse>, AppError> {
    let color = state.game.calibrate_player(&id, req.x, req.y, req.radius)?;
    Ok(Json(CalibrateResponse {
        color: color.to_hex(),
    }))
}

#[derive(Deserialize)]
struct PlayerThresholdRequest {
    /// `null` restores the global color threshold
    threshold: Option<f32>,
}

async fn player_threshold_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<PlayerThresholdRequest>,
) -> Result<StatusCode, AppError> {
    state.game.set_player_match_threshold(&id, req.threshold)?;
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Settings
// ============================================================================

#[derive(Deserialize)]
struct DifficultyRequest {
    difficulty: Difficulty,
}

#[derive(Serialize)]
struct ThresholdResponse {
    detection_threshold: f32,
}

async fn difficulty_handler(
    State(state): State<AppState>,
    Json(req): Json<DifficultyRequest>,
) -> Result<Json<ThresholdResponse>, AppError> {
    state.game.set_difficulty(req.difficulty)?;
    info!(difficulty = ?req.difficulty, "Difficulty changed");
    Ok(Json(ThresholdResponse {
        detection_threshold: state.game.state().read().detection_threshold(),
    }))
}

#[derive(Deserialize)]
struct ThresholdRequest {
    threshold: f32,
}

async fn threshold_handler(
    State(state): State<AppState>,
    Json(req): Json<ThresholdRequest>,
) -> Result<Json<ThresholdResponse>, AppError> {
    state.game.set_detection_threshold(req.threshold)?;
    Ok(Json(ThresholdResponse {
        detection_threshold: state.game.state().read().detection_threshold(),
    }))
}

// ============================================================================
// Game control
// ============================================================================

async fn start_game_handler(State(state): State<AppState>) -> Result<Json<GameSnapshot>, AppError> {
    state.game.start_game()?;
    Ok(Json(state.game.snapshot()))
}

async fn reset_game_handler(State(state): State<AppState>) -> Json<GameSnapshot> {
    state.game.reset_game();
    Json(state.game.snapshot())
}

#[derive(Serialize)]
struct TrackingResponse {
    tracking_enabled: bool,
}

async fn tracking_start_handler(State(state): State<AppState>) -> Json<TrackingResponse> {
    state.game.tracking().start();
    Json(TrackingResponse {
        tracking_enabled: true,
    })
}

async fn tracking_stop_handler(State(state): State<AppState>) -> Json<TrackingResponse> {
    state.game.tracking().stop();
    Json(TrackingResponse {
        tracking_enabled: false,
    })
}

// ============================================================================
// Capture ingest
// ============================================================================

#[derive(Deserialize)]
struct FrameQuery {
    width: u32,
    height: u32,
}

#[derive(Serialize)]
struct FrameAccepted {
    seq: u64,
}

async fn frame_ingest_handler(
    State(state): State<AppState>,
    Query(query): Query<FrameQuery>,
    body: Bytes,
) -> Result<(StatusCode, Json<FrameAccepted>), AppError> {
    if state.frame_limiter.check().is_err() {
        debug!("Frame ingest rate limited");
        return Err(AppError::TooManyRequests);
    }

    let seq = state
        .game
        .frames()
        .push_rgba(query.width, query.height, body)?;
    Ok((StatusCode::ACCEPTED, Json(FrameAccepted { seq })))
}

#[derive(Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
enum CaptureStatusRequest {
    Pending,
    Unavailable { reason: String },
}

async fn capture_status_handler(
    State(state): State<AppState>,
    Json(req): Json<CaptureStatusRequest>,
) -> Json<CaptureStatus> {
    let frames = state.game.frames();
    match req {
        CaptureStatusRequest::Pending => frames.mark_pending(),
        CaptureStatusRequest::Unavailable { reason } => frames.mark_unavailable(reason),
    }
    Json(frames.status())
}

// ============================================================================
// Error handling
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Too many requests")]
    TooManyRequests,
}

impl From<GameError> for AppError {
    fn from(e: GameError) -> Self {
        match e {
            GameError::WrongPhase(_) | GameError::NoPlayers | GameError::DuplicatePlayer(_) => {
                AppError::Conflict(e.to_string())
            }
            GameError::PlayerNotFound(_) => AppError::NotFound(e.to_string()),
            GameError::InvalidThreshold(_) => AppError::BadRequest(e.to_string()),
        }
    }
}

impl From<CalibrationError> for AppError {
    fn from(e: CalibrationError) -> Self {
        match e {
            CalibrationError::Game(e) => e.into(),
            CalibrationError::NoFrame => AppError::Conflict(e.to_string()),
            CalibrationError::OutOfFrame { .. } => AppError::BadRequest(e.to_string()),
        }
    }
}

impl From<FrameError> for AppError {
    fn from(e: FrameError) -> Self {
        AppError::BadRequest(e.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match &self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            AppError::TooManyRequests => {
                (StatusCode::TOO_MANY_REQUESTS, "Too many requests".to_string())
            }
        };

        let body = serde_json::json!({
            "error": message
        });

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::game::GamePhase;
    use crate::vision::FrameBuilder;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use tower::ServiceExt;

    fn app_state() -> AppState {
        let config = Config::from_lookup(|key| match key {
            "FRAME_WIDTH" => Some("64".to_string()),
            "FRAME_HEIGHT" => Some("48".to_string()),
            "FRAME_INGEST_RATE" => Some("2".to_string()),
            _ => None,
        })
        .unwrap();
        AppState::new(config)
    }

    fn json_request(method: Method, uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn empty_request(method: Method, uri: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn register(state: &AppState, name: &str, color: &str) -> Uuid {
        let response = build_router(state.clone())
            .oneshot(json_request(
                Method::POST,
                "/players",
                serde_json::json!({ "name": name, "color": color }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let body = body_json(response).await;
        body["id"].as_str().unwrap().parse().unwrap()
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let response = build_router(app_state())
            .oneshot(empty_request(Method::GET, "/health"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["capture"]["state"], "pending");
    }

    #[tokio::test]
    async fn register_start_and_reject_registry_changes() {
        let state = app_state();
        let id = register(&state, "alice", "#dc1e28").await;
        register(&state, "bob", "#1e28dc").await;

        let response = build_router(state.clone())
            .oneshot(empty_request(Method::POST, "/game/start"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["phase"], "MOVE");
        assert_eq!(body["round"], 1);

        let response = build_router(state.clone())
            .oneshot(json_request(
                Method::POST,
                "/players",
                serde_json::json!({ "name": "late", "color": "#00ff00" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let response = build_router(state.clone())
            .oneshot(empty_request(Method::DELETE, &format!("/players/{}", id)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);
        assert_eq!(state.game.state().read().players().len(), 2);
    }

    #[tokio::test]
    async fn start_without_players_conflicts() {
        let response = build_router(app_state())
            .oneshot(empty_request(Method::POST, "/game/start"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);
        let body = body_json(response).await;
        assert!(body["error"].as_str().unwrap().contains("without players"));
    }

    #[tokio::test]
    async fn invalid_color_and_unknown_player() {
        let state = app_state();
        let response = build_router(state.clone())
            .oneshot(json_request(
                Method::POST,
                "/players",
                serde_json::json!({ "name": "x", "color": "red" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = build_router(state)
            .oneshot(empty_request(
                Method::DELETE,
                &format!("/players/{}", Uuid::new_v4()),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn bad_match_threshold_registers_nobody() {
        let state = app_state();
        let mut rx = state.game.subscribe();
        let response = build_router(state.clone())
            .oneshot(json_request(
                Method::POST,
                "/players",
                serde_json::json!({ "name": "x", "color": "#dc1e28", "match_threshold": -1.0 }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(state.game.state().read().players().is_empty());
        assert!(rx.try_recv().is_err());

        let response = build_router(state.clone())
            .oneshot(json_request(
                Method::POST,
                "/players",
                serde_json::json!({ "name": "y", "color": "#dc1e28", "match_threshold": 40.0 }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let state = state.game.state().read();
        assert_eq!(state.players().len(), 1);
        assert_eq!(state.players()[0].match_threshold, Some(40.0));
    }

    #[tokio::test]
    async fn settings_update_threshold() {
        let state = app_state();
        let response = build_router(state.clone())
            .oneshot(json_request(
                Method::POST,
                "/settings/difficulty",
                serde_json::json!({ "difficulty": "hard" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["detection_threshold"], 15.0);

        let response = build_router(state.clone())
            .oneshot(json_request(
                Method::POST,
                "/settings/threshold",
                serde_json::json!({ "threshold": -3.0 }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(state.game.state().read().detection_threshold(), 15.0);
    }

    #[tokio::test]
    async fn frame_ingest_validates_and_rate_limits() {
        let state = app_state();
        let frame = FrameBuilder::new(64, 48, Rgb::new(90, 90, 90)).build(0).unwrap();
        let raw = frame.as_bytes().to_vec();

        let response = build_router(state.clone())
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri("/frames?width=64&height=48")
                    .body(Body::from(raw.clone()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        assert!(state.game.frames().status().is_ready());

        // Wrong buffer size for the declared dimensions
        let response = build_router(state.clone())
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri("/frames?width=64&height=40")
                    .body(Body::from(raw.clone()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        // Quota of two per second is spent
        let response = build_router(state)
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri("/frames?width=64&height=48")
                    .body(Body::from(raw))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[tokio::test]
    async fn capture_failure_is_reported() {
        let state = app_state();
        let response = build_router(state.clone())
            .oneshot(json_request(
                Method::POST,
                "/capture/status",
                serde_json::json!({ "state": "unavailable", "reason": "permission denied" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = build_router(state)
            .oneshot(empty_request(Method::GET, "/state"))
            .await
            .unwrap();
        let body = body_json(response).await;
        assert_eq!(body["capture"]["state"], "unavailable");
        assert_eq!(body["capture"]["reason"], "permission denied");
        assert_eq!(body["phase"], "SETUP");
    }

    #[tokio::test]
    async fn tracking_toggle_and_reset() {
        let state = app_state();
        register(&state, "alice", "#dc1e28").await;
        state.game.start_game().unwrap();

        let response = build_router(state.clone())
            .oneshot(empty_request(Method::POST, "/tracking/stop"))
            .await
            .unwrap();
        assert_eq!(body_json(response).await["tracking_enabled"], false);
        assert!(!state.game.tracking().is_enabled());

        let response = build_router(state.clone())
            .oneshot(empty_request(Method::POST, "/game/reset"))
            .await
            .unwrap();
        assert_eq!(body_json(response).await["phase"], "SETUP");
        assert_eq!(state.game.state().read().phase(), GamePhase::Setup);
    }
}

use std::sync::{Arc, Mutex, MutexGuard};

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crate::analytics::{FramePipeline, NormRect};

/// Shared with the frame thread; every handler holds the lock only briefly.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<Mutex<FramePipeline>>,
}

impl AppState {
    pub fn new(pipeline: Arc<Mutex<FramePipeline>>) -> Self {
        Self { pipeline }
    }

    fn lock(&self) -> Result<MutexGuard<'_, FramePipeline>, Response> {
        self.pipeline
            .lock()
            .map_err(|_| (StatusCode::INTERNAL_SERVER_ERROR, "pipeline lock poisoned").into_response())
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ControlRequest {
    pub active: Option<bool>,
    pub logging_enabled: Option<bool>,
    pub face_detection_enabled: Option<bool>,
    pub object_detection_enabled: Option<bool>,
}

#[derive(Serialize)]
struct DetectionItem {
    rect: NormRect,
    label: String,
    class_id: i64,
    confidence: f32,
}

pub async fn start_server(state: AppState, port: u16) -> Result<(), std::io::Error> {
    let app = Router::new()
        .route("/api/signals", get(signals_handler))
        .route("/api/detections", get(detections_handler))
        .route("/api/control", post(control_handler))
        .route("/api/reload", post(reload_handler))
        .with_state(state);

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("starting HTTP server on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await
}

/// Feature flags are applied before `active` so that one request enabling
/// both loads each model once, on activation.
pub fn apply_control(pipeline: &mut FramePipeline, request: &ControlRequest) {
    if let Some(enabled) = request.logging_enabled {
        pipeline.set_logging_enabled(enabled);
    }
    if let Some(enabled) = request.face_detection_enabled {
        pipeline.set_face_detection_enabled(enabled);
    }
    if let Some(enabled) = request.object_detection_enabled {
        pipeline.set_object_detection_enabled(enabled);
    }
    if let Some(active) = request.active {
        pipeline.set_active(active);
    }
}

async fn signals_handler(State(state): State<AppState>) -> Response {
    match state.lock() {
        Ok(pipeline) => Json(pipeline.snapshot()).into_response(),
        Err(resp) => resp,
    }
}

async fn detections_handler(State(state): State<AppState>) -> Response {
    let pipeline = match state.lock() {
        Ok(p) => p,
        Err(resp) => return resp,
    };
    let items: Vec<DetectionItem> = pipeline
        .detections()
        .iter()
        .map(|d| DetectionItem {
            rect: d.rect,
            label: d.label.clone(),
            class_id: d.class_id,
            confidence: d.confidence,
        })
        .collect();
    Json(items).into_response()
}

async fn control_handler(
    State(state): State<AppState>,
    Json(request): Json<ControlRequest>,
) -> Response {
    let mut pipeline = match state.lock() {
        Ok(p) => p,
        Err(resp) => return resp,
    };
    tracing::debug!(?request, "control request");
    apply_control(&mut pipeline, &request);
    Json(pipeline.snapshot()).into_response()
}

async fn reload_handler(State(state): State<AppState>) -> Response {
    let mut pipeline = match state.lock() {
        Ok(p) => p,
        Err(resp) => return resp,
    };
    pipeline.reload_models();
    Json(serde_json::json!({
        "face_model": pipeline.face_model_state(),
        "object_model": pipeline.object_model_state(),
    }))
    .into_response()
}

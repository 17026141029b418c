use axum::{
    extract::{Query, Request, State},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tower::ServiceExt; // For oneshot
use tower_http::cors::CorsLayer;
use tracing::{error, info};
use uuid::Uuid;

use crate::state::{DashboardStatus, JobSummary, KernelState};
use crate::timeline::assembly::{cues_manifest, subtitle_cues, to_webvtt, transcript};
use crate::timeline::edit::{apply_edit, EditOp};
use crate::timeline::sync::check_sync;
use crate::timeline::validate::collect_violations;
use crate::timeline::VideoSpec;

pub type AppState = Arc<KernelState>;

#[derive(Serialize)]
pub struct ValidateResponse {
    pub valid: bool,
    pub errors: Vec<String>,
}

#[derive(Deserialize)]
pub struct NarrateRequest {
    pub voice: Option<String>,
    pub speed: Option<f64>,
}

#[derive(Serialize)]
pub struct NarrateResponse {
    pub job_id: String,
}

#[derive(Deserialize)]
struct JobParams {
    id: Uuid,
}

#[derive(Deserialize)]
struct AudioParams {
    path: String,
}

pub async fn start_server(port: u16, state: Arc<KernelState>) {
    let app = Router::new()
        .route("/api/status", get(get_status))
        .route("/api/spec", get(get_spec).post(put_spec))
        .route("/api/validate", post(validate_spec))
        .route("/api/edit", post(edit_spec))
        .route("/api/narrate", post(start_narration))
        .route("/api/job", get(get_job))
        .route("/api/sync", get(get_sync))
        .route("/api/export", post(export_artifacts))
        .route("/api/audio", get(stream_audio))
        .with_state(state)
        .layer(CorsLayer::permissive());

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("🚀 REELFORGE Dashboard Server running on http://127.0.0.1:{}", port);

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}

async fn get_status(State(state): State<AppState>) -> Json<DashboardStatus> {
    let spec = state.spec.lock().await;
    let segments = state.segments.lock().await;
    let jobs = state
        .queue
        .list()
        .await
        .into_iter()
        .map(|(id, status)| JobSummary {
            id: id.to_string(),
            status: format!("{:?}", status),
        })
        .collect();

    Json(DashboardStatus {
        spec_loaded: spec.is_some(),
        scene_count: spec.as_ref().map(|s| s.scenes.len()).unwrap_or(0),
        chunk_count: spec.as_ref().map(|s| s.chunk_count()).unwrap_or(0),
        segments_resolved: segments.is_some(),
        jobs,
    })
}

async fn get_spec(State(state): State<AppState>) -> impl IntoResponse {
    match state.spec.lock().await.clone() {
        Some(spec) => Json(spec).into_response(),
        None => axum::http::StatusCode::NOT_FOUND.into_response(),
    }
}

/// Replace the working spec. Rejected wholesale if invalid, so the stored
/// spec is always structurally sound.
async fn put_spec(
    State(state): State<AppState>,
    Json(spec): Json<VideoSpec>,
) -> impl IntoResponse {
    let errors = collect_violations(&spec);
    if !errors.is_empty() {
        let body = ValidateResponse {
            valid: false,
            errors: errors.iter().map(|e| e.to_string()).collect(),
        };
        return (axum::http::StatusCode::UNPROCESSABLE_ENTITY, Json(body)).into_response();
    }
    *state.spec.lock().await = Some(spec);
    Json(ValidateResponse {
        valid: true,
        errors: vec![],
    })
    .into_response()
}

async fn validate_spec(Json(spec): Json<VideoSpec>) -> Json<ValidateResponse> {
    let errors = collect_violations(&spec);
    Json(ValidateResponse {
        valid: errors.is_empty(),
        errors: errors.iter().map(|e| e.to_string()).collect(),
    })
}

/// Apply one editing operation to the working spec. The edit layer
/// re-validates; a rejected edit leaves the stored spec untouched.
async fn edit_spec(State(state): State<AppState>, Json(op): Json<EditOp>) -> impl IntoResponse {
    let invalidates_audio = !matches!(op, EditOp::AddEvent { .. });
    let mut spec_slot = state.spec.lock().await;
    let Some(current) = spec_slot.as_ref() else {
        return (axum::http::StatusCode::CONFLICT, "No spec loaded").into_response();
    };

    match apply_edit(current, op) {
        Ok(next) => {
            *spec_slot = Some(next);
            if invalidates_audio {
                *state.segments.lock().await = None;
            }
            Json(ValidateResponse {
                valid: true,
                errors: vec![],
            })
            .into_response()
        }
        Err(e) => (
            axum::http::StatusCode::UNPROCESSABLE_ENTITY,
            Json(ValidateResponse {
                valid: false,
                errors: vec![e.to_string()],
            }),
        )
            .into_response(),
    }
}

async fn start_narration(
    State(state): State<AppState>,
    Json(req): Json<NarrateRequest>,
) -> impl IntoResponse {
    let spec = state.spec.lock().await;
    let Some(spec) = spec.as_ref() else {
        return (axum::http::StatusCode::CONFLICT, "No spec loaded").into_response();
    };

    let voice = req.voice.unwrap_or_else(|| spec.style.voice.clone());
    let speed = req.speed.unwrap_or(1.0);
    let job_id = state
        .queue
        .enqueue(spec.scenes.clone(), voice, speed)
        .await;

    Json(NarrateResponse {
        job_id: job_id.to_string(),
    })
    .into_response()
}

async fn get_job(
    State(state): State<AppState>,
    Query(params): Query<JobParams>,
) -> impl IntoResponse {
    match state.queue.status(params.id).await {
        Some(status) => Json(status).into_response(),
        None => axum::http::StatusCode::NOT_FOUND.into_response(),
    }
}

async fn get_sync(State(state): State<AppState>) -> impl IntoResponse {
    let segments = state.segments.lock().await;
    let Some(segments) = segments.as_ref() else {
        return (axum::http::StatusCode::CONFLICT, "No segments resolved").into_response();
    };
    let report = check_sync(segments);
    Json(serde_json::json!({
        "valid": report.valid,
        "errors": report.errors,
        "warnings": report.warnings,
    }))
    .into_response()
}

async fn export_artifacts(State(state): State<AppState>) -> impl IntoResponse {
    let spec = state.spec.lock().await;
    let Some(spec) = spec.as_ref() else {
        return (axum::http::StatusCode::CONFLICT, "No spec loaded").into_response();
    };

    // Export reads the spec as stored; segment-aware cue timing applies when
    // a narration job already swapped its map in.
    let mut spec = spec.clone();
    if spec.audio_segments.is_none() {
        spec.audio_segments = state.segments.lock().await.clone();
    }

    let generated_at = chrono::Utc::now().format("%Y-%m-%d %H:%M:%S UTC").to_string();
    let cues = subtitle_cues(&spec);
    Json(serde_json::json!({
        "webvtt": to_webvtt(&cues),
        "transcript": transcript(&spec, &generated_at),
        "manifest": cues_manifest(&spec),
    }))
    .into_response()
}

/// Only rendered narration audio may be streamed out.
fn validate_audio_path(raw_path: &str) -> Result<PathBuf, String> {
    let path = PathBuf::from(raw_path);

    for component in path.components() {
        if let Component::ParentDir = component {
            return Err("Access denied: Path traversal detected".to_string());
        }
    }

    let allowed_extensions = ["wav", "mp3", "ogg"];
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase());

    match ext {
        Some(e) if allowed_extensions.contains(&e.as_str()) => Ok(path),
        Some(e) => Err(format!("Access denied: Invalid file extension '.{}'", e)),
        None => Err("Access denied: No file extension provided".to_string()),
    }
}

async fn stream_audio(Query(params): Query<AudioParams>, req: Request) -> impl IntoResponse {
    let path = match validate_audio_path(&params.path) {
        Ok(p) => p,
        Err(e) => {
            error!("Audio access denied: {}", e);
            return (axum::http::StatusCode::FORBIDDEN, e).into_response();
        }
    };

    if !Path::new(&path).exists() {
        return axum::http::StatusCode::NOT_FOUND.into_response();
    }

    let service = tower_http::services::ServeFile::new(path);
    match service.oneshot(req).await {
        Ok(res) => res.into_response(),
        Err(err) => {
            error!("ServeFile error: {}", err);
            axum::http::StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_audio_path() {
        // Valid cases
        assert!(validate_audio_path("chunk.wav").is_ok());
        assert!(validate_audio_path("/abs/path/to/chunk.wav").is_ok());
        assert!(validate_audio_path("nested/folder/voice.mp3").is_ok());

        // Invalid cases
        assert!(validate_audio_path("../secret.txt").is_err());
        assert!(validate_audio_path("../../etc/passwd").is_err());
        assert!(validate_audio_path("/etc/passwd").is_err()); // No extension
        assert!(validate_audio_path("video.mp4").is_err()); // Not audio
        assert!(validate_audio_path("script.sh").is_err());
        assert!(validate_audio_path("..").is_err());
        assert!(validate_audio_path("").is_err());
    }
}

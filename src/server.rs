//! HTTP surface for the emotion mirror.
//!
//! One endpoint accepts webcam frames and returns the smoothed emotion. All
//! failures on the analysis path degrade to a neutral observation so the
//! smoother always advances and the caller always gets a valid answer.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use base64::Engine;
use serde::Deserialize;
use serde_json::Value;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info, warn};

use crate::classifier::GeminiClassifier;
use crate::emotion::{self, NEUTRAL};
use crate::frames;
use crate::smoother::{EmotionSmoother, Observation, DEFAULT_CONFIDENCE};

/// Shared state for the analysis endpoint
#[derive(Clone)]
pub struct AppState {
    pub smoother: Arc<Mutex<EmotionSmoother>>,
    pub classifier: Arc<GeminiClassifier>,
    pub temp_dir: PathBuf,
}

/// Start the HTTP server on the given port. Runs until the process exits.
pub async fn run_server(state: AppState, port: u16) {
    let app = Router::new()
        .route("/analyze_emotion", post(analyze_handler))
        .route("/health", get(health_endpoint))
        .with_state(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("Emotion mirror listening on {}", addr);

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(e) => {
            error!("Failed to bind to {}: {}", addr, e);
            return;
        }
    };

    let shutdown = async {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutting down");
        }
    };
    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
    {
        error!("Server error: {}", e);
    }
}

async fn health_endpoint(State(state): State<AppState>) -> Json<Value> {
    let healthy = state.smoother.lock().is_ok();
    Json(serde_json::json!({
        "healthy": healthy,
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

#[derive(Debug, Deserialize)]
struct AnalyzeRequest {
    image: Option<String>,
}

/// Analyze one webcam frame and return the smoothed emotion.
async fn analyze_handler(
    State(state): State<AppState>,
    Json(req): Json<AnalyzeRequest>,
) -> Json<Value> {
    let observation = match req.image.as_deref() {
        Some(image) => classify_frame(&state, image).await,
        None => {
            warn!("Analyze request without image data");
            neutral_observation()
        }
    };

    // Whole read-modify-write under one lock so eviction stays exact under
    // concurrent requests.
    let smoothed = {
        let mut smoother = match state.smoother.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        smoother.update(&observation.label, observation.confidence)
    };

    info!(
        "Raw ({}, {}) -> smoothed ({}, {:.2})",
        observation.label, observation.confidence, smoothed.emotion, smoothed.confidence
    );

    Json(serde_json::json!({
        "emotion": smoothed.emotion,
        "confidence": smoothed.confidence,
    }))
}

/// Decode, persist, and classify one frame. Any failure degrades to the
/// neutral default so the smoother's precondition always holds.
async fn classify_frame(state: &AppState, image: &str) -> Observation {
    let jpeg_bytes = match decode_data_url(image) {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!("Rejecting frame: {}", e);
            return neutral_observation();
        }
    };

    let frame_path = match frames::save_frame(&state.temp_dir, &jpeg_bytes) {
        Ok(path) => Some(path),
        Err(e) => {
            // Classification works off the in-memory bytes; the temp file is
            // only for debugging, so carry on without it.
            warn!("Failed to persist frame: {}", e);
            None
        }
    };

    let payload = base64::engine::general_purpose::STANDARD.encode(&jpeg_bytes);
    let observation = match state.classifier.classify(&payload).await {
        Ok(obs) if emotion::is_allowed(&obs.label) => obs,
        Ok(obs) => {
            warn!("Classifier returned unknown label {:?}", obs.label);
            neutral_observation()
        }
        Err(e) => {
            warn!("Classification failed: {}", e);
            neutral_observation()
        }
    };

    if let Some(path) = frame_path {
        frames::remove_frame(&path);
    }

    observation
}

fn neutral_observation() -> Observation {
    Observation::new(NEUTRAL, DEFAULT_CONFIDENCE)
}

/// Errors produced while decoding an incoming frame
#[derive(Debug, thiserror::Error)]
enum FrameError {
    #[error("empty image payload")]
    Empty,

    #[error("invalid base64 image data: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("undecodable image: {0}")]
    Decode(#[from] image::ImageError),
}

/// Turn a `data:image/jpeg;base64,...` payload (or bare base64) into JPEG
/// bytes, verifying they decode as an image.
fn decode_data_url(image: &str) -> Result<Vec<u8>, FrameError> {
    // Browsers send a data URL; keep only the payload after the comma.
    let payload = match image.split_once(',') {
        Some((_, payload)) => payload,
        None => image,
    };
    if payload.trim().is_empty() {
        return Err(FrameError::Empty);
    }

    let bytes = base64::engine::general_purpose::STANDARD.decode(payload.trim())?;
    image::load_from_memory(&bytes)?;
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    // Smallest valid JPEG-ish fixture: a 1x1 image encoded with the image
    // crate so load_from_memory accepts it.
    fn tiny_jpeg() -> Vec<u8> {
        let img = image::RgbImage::from_pixel(1, 1, image::Rgb([128, 128, 128]));
        let mut out = Vec::new();
        img.write_to(
            &mut std::io::Cursor::new(&mut out),
            image::ImageFormat::Jpeg,
        )
        .unwrap();
        out
    }

    #[test]
    fn test_decode_data_url_with_prefix() {
        let jpeg = tiny_jpeg();
        let encoded = base64::engine::general_purpose::STANDARD.encode(&jpeg);
        let url = format!("data:image/jpeg;base64,{}", encoded);
        assert_eq!(decode_data_url(&url).unwrap(), jpeg);
    }

    #[test]
    fn test_decode_bare_base64() {
        let jpeg = tiny_jpeg();
        let encoded = base64::engine::general_purpose::STANDARD.encode(&jpeg);
        assert_eq!(decode_data_url(&encoded).unwrap(), jpeg);
    }

    #[test]
    fn test_decode_empty_payload() {
        assert!(matches!(
            decode_data_url("data:image/jpeg;base64,"),
            Err(FrameError::Empty)
        ));
    }

    #[test]
    fn test_decode_bad_base64() {
        assert!(matches!(
            decode_data_url("data:image/jpeg;base64,!!!not-base64!!!"),
            Err(FrameError::Base64(_))
        ));
    }

    #[test]
    fn test_decode_non_image_bytes() {
        let encoded = base64::engine::general_purpose::STANDARD.encode(b"plain text");
        assert!(matches!(
            decode_data_url(&encoded),
            Err(FrameError::Decode(_))
        ));
    }

    #[test]
    fn test_neutral_observation() {
        let obs = neutral_observation();
        assert_eq!(obs.label, "neutral");
        assert_eq!(obs.confidence, 5.0);
    }
}

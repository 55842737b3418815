//! HTTP surface: multipart uploads in, JPEG out.

use crate::config::Config;
use crate::engine::{EngineError, EngineHandle, ProcessRequest};
use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, Multipart, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use image::RgbImage;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use toonswap_core::Preset;

#[derive(Clone)]
pub struct AppState {
    pub engine: EngineHandle,
    pub config: Arc<Config>,
}

pub fn router(state: AppState) -> Router {
    let body_limit = state.config.max_upload_bytes;
    Router::new()
        .route("/", get(index))
        .route("/status", get(status))
        .route("/process", post(process))
        .route("/filter", post(filter_only))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("missing multipart part {0:?}")]
    MissingPart(&'static str),
    #[error("could not decode part {part:?} as an image: {reason}")]
    Decode { part: &'static str, reason: String },
    #[error("invalid value for {param:?}: expected on/off")]
    BadSwitch { param: &'static str },
    #[error("unknown preset {0:?}")]
    UnknownPreset(String),
    #[error("multipart: {0}")]
    Multipart(#[from] axum::extract::multipart::MultipartError),
    #[error("response encoding failed: {0}")]
    Encode(String),
    #[error(transparent)]
    Engine(#[from] EngineError),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::MissingPart(_)
            | ApiError::Decode { .. }
            | ApiError::BadSwitch { .. }
            | ApiError::UnknownPreset(_)
            | ApiError::Multipart(_) => StatusCode::BAD_REQUEST,
            ApiError::Encode(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Engine(e) if e.is_client_error() => StatusCode::BAD_REQUEST,
            ApiError::Engine(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::debug!(error = %self, "rejected request");
        }
        (status, self.to_string()).into_response()
    }
}

#[derive(Deserialize)]
struct ProcessQuery {
    preset: Option<String>,
    filters: Option<String>,
    swap: Option<String>,
    seed: Option<u64>,
}

async fn index() -> &'static str {
    "toonswap server online"
}

async fn status(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "version": env!("CARGO_PKG_VERSION"),
        "models_loaded": true,
        "default_preset": state.config.default_preset,
        "presets": Preset::builtin().iter().map(|p| p.name.clone()).collect::<Vec<_>>(),
    }))
}

/// Full pipeline: swap the face from `image` onto `base`, then filter.
/// `swap=off` keeps the base untouched; `filters=off` returns the bare swap.
async fn process(
    State(state): State<AppState>,
    Query(query): Query<ProcessQuery>,
    multipart: Multipart,
) -> Result<Response, ApiError> {
    let parts = read_parts(multipart).await?;
    let base = decode_image(&parts, "base")?;

    let swap_enabled = switch(query.swap.as_deref(), "swap", true)?;
    let source = if swap_enabled {
        Some(decode_image(&parts, "image")?)
    } else {
        None
    };

    run_request(&state, query, source, base).await
}

/// Filter-only variant: one `image` part, no face swap.
async fn filter_only(
    State(state): State<AppState>,
    Query(query): Query<ProcessQuery>,
    multipart: Multipart,
) -> Result<Response, ApiError> {
    let parts = read_parts(multipart).await?;
    let image = decode_image(&parts, "image")?;
    run_request(&state, query, None, image).await
}

async fn run_request(
    state: &AppState,
    query: ProcessQuery,
    source: Option<RgbImage>,
    base: RgbImage,
) -> Result<Response, ApiError> {
    let apply_filters = switch(query.filters.as_deref(), "filters", true)?;
    let preset_name = query
        .preset
        .as_deref()
        .unwrap_or(&state.config.default_preset);
    let preset = Preset::by_name(preset_name)
        .map_err(|_| ApiError::UnknownPreset(preset_name.to_string()))?;
    let seed = query.seed.unwrap_or_else(rand::random);

    tracing::info!(
        width = base.width(),
        height = base.height(),
        swap = source.is_some(),
        filters = apply_filters,
        preset = preset_name,
        seed,
        "processing upload"
    );

    let output = state
        .engine
        .process(ProcessRequest {
            source,
            base,
            preset,
            apply_filters,
            seed,
        })
        .await?;

    jpeg_response(&output, state.config.jpeg_quality)
}

/// Drain the multipart stream into named byte buffers; unknown parts are
/// ignored rather than rejected.
async fn read_parts(mut multipart: Multipart) -> Result<HashMap<String, Bytes>, ApiError> {
    let mut parts = HashMap::new();
    while let Some(field) = multipart.next_field().await? {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };
        let bytes = field.bytes().await?;
        parts.insert(name, bytes);
    }
    Ok(parts)
}

fn decode_image(parts: &HashMap<String, Bytes>, part: &'static str) -> Result<RgbImage, ApiError> {
    let bytes = parts.get(part).ok_or(ApiError::MissingPart(part))?;
    let img = image::load_from_memory(bytes).map_err(|e| ApiError::Decode {
        part,
        reason: e.to_string(),
    })?;
    Ok(img.to_rgb8())
}

fn switch(value: Option<&str>, param: &'static str, default: bool) -> Result<bool, ApiError> {
    match value {
        None => Ok(default),
        Some("on") | Some("true") | Some("1") => Ok(true),
        Some("off") | Some("false") | Some("0") => Ok(false),
        Some(_) => Err(ApiError::BadSwitch { param }),
    }
}

fn jpeg_response(img: &RgbImage, quality: u8) -> Result<Response, ApiError> {
    let mut buf = Vec::new();
    let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buf, quality);
    img.write_with_encoder(encoder)
        .map_err(|e| ApiError::Encode(e.to_string()))?;
    Ok(([(header::CONTENT_TYPE, "image/jpeg")], buf).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use toonswap_face::SwapError;

    #[test]
    fn switch_defaults_and_parses() {
        assert!(switch(None, "filters", true).unwrap());
        assert!(!switch(None, "filters", false).unwrap());
        assert!(switch(Some("on"), "filters", false).unwrap());
        assert!(!switch(Some("off"), "filters", true).unwrap());
        assert!(switch(Some("1"), "swap", false).unwrap());
        assert!(!switch(Some("0"), "swap", true).unwrap());
        assert!(switch(Some("maybe"), "swap", true).is_err());
    }

    #[test]
    fn missing_part_is_bad_request() {
        let parts = HashMap::new();
        let err = decode_image(&parts, "base").unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn undecodable_part_is_bad_request() {
        let mut parts = HashMap::new();
        parts.insert("image".to_string(), Bytes::from_static(b"not an image"));
        let err = decode_image(&parts, "image").unwrap_err();
        assert!(matches!(err, ApiError::Decode { part: "image", .. }));
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn no_face_maps_to_bad_request() {
        let err = ApiError::Engine(EngineError::Swap(SwapError::NoBaseFace));
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn engine_loss_maps_to_server_error() {
        let err = ApiError::Engine(EngineError::ChannelClosed);
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn jpeg_response_sets_content_type() {
        let img = RgbImage::from_pixel(8, 8, image::Rgb([100, 150, 200]));
        let resp = jpeg_response(&img, 90).unwrap();
        assert_eq!(
            resp.headers().get(header::CONTENT_TYPE).unwrap(),
            "image/jpeg"
        );
    }
}

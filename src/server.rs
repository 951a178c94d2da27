//! HTTP generation proxy.
//!
//! `POST /api/generate-image` generates a single image server-side, applying
//! the model's tuned parameters, and answers with a `data:` URL so callers
//! never see the API key.

use crate::ai::huggingface::types::upstream_hint;
use crate::ai::ImageGenerationService;
use crate::dimensions::{snap_dimensions, Dimensions, Granularity};
use crate::models::{Credential, GenerationRequest, ModelId};
use crate::{Error, Result};
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};

pub const GENERATE_IMAGE_PATH: &str = "/api/generate-image";

const DEFAULT_SIDE: u32 = 768;

#[derive(Clone)]
pub struct ServerState {
    pub service: Arc<dyn ImageGenerationService>,
    pub credential: Option<Credential>,
    pub granularity: Granularity,
}

#[derive(Debug, Deserialize)]
pub struct GenerateImageBody {
    #[serde(default)]
    pub prompt: String,
    #[serde(default = "default_side")]
    pub width: u32,
    #[serde(default = "default_side")]
    pub height: u32,
    #[serde(default)]
    pub model: Option<String>,
}

fn default_side() -> u32 {
    DEFAULT_SIDE
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateImageResponse {
    pub image_url: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn generation_failed(detail: &str) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: format!("Failed to generate image: {}", detail),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorResponse {
                error: self.message,
            }),
        )
            .into_response()
    }
}

pub fn router(state: ServerState) -> Router {
    Router::new()
        .route(GENERATE_IMAGE_PATH, post(generate_image))
        .with_state(state)
}

pub async fn serve(listener: TcpListener, state: ServerState) -> Result<()> {
    info!("Generation proxy listening on {}", listener.local_addr()?);
    axum::serve(listener, router(state)).await?;
    Ok(())
}

async fn generate_image(
    State(state): State<ServerState>,
    body: std::result::Result<Json<GenerateImageBody>, JsonRejection>,
) -> std::result::Result<Json<GenerateImageResponse>, ApiError> {
    let Json(body) = body.map_err(|rejection| ApiError::bad_request(rejection.body_text()))?;

    if body.prompt.trim().is_empty() {
        return Err(ApiError::bad_request("Prompt is required"));
    }

    let Some(credential) = state.credential.as_ref() else {
        error!("HUGGINGFACE_API_KEY is not configured");
        return Err(ApiError::generation_failed(
            "HUGGINGFACE_API_KEY is not configured",
        ));
    };

    let model = match body.model.as_deref() {
        None | Some("") => ModelId::PROXY_DEFAULT,
        Some(raw) => raw
            .parse::<ModelId>()
            .map_err(|e| ApiError::bad_request(validation_detail(e)))?,
    };

    let dimensions = snap_dimensions(
        Dimensions::new(body.width, body.height),
        state.granularity,
    );

    info!(
        "Starting image generation with {} at {} (requested {}x{})",
        model, dimensions, body.width, body.height
    );

    let request = GenerationRequest::new(body.prompt, Some(model), dimensions)
        .map_err(|e| ApiError::bad_request(validation_detail(e)))?
        .with_preset(model.preset());

    match state.service.generate_image(&request, credential, 0).await {
        Ok(image) => Ok(Json(GenerateImageResponse {
            image_url: image.data_url(),
        })),
        Err(e) => {
            error!("Proxy generation failed: {}", e);
            Err(ApiError::generation_failed(&describe_failure(&e)))
        }
    }
}

fn validation_detail(error: Error) -> String {
    match error {
        Error::Validation(message) => message,
        other => other.to_string(),
    }
}

fn describe_failure(error: &Error) -> String {
    match error {
        Error::Upstream { message, .. } => match upstream_hint(message) {
            Some(hint) => hint.to_string(),
            None => format!("API error: {}", message),
        },
        other => other.to_string(),
    }
}

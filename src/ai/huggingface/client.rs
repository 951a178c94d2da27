use super::types::parse_error_message;
use crate::image::ImageFormat;
use crate::models::{Credential, ModelId, DEFAULT_INFERENCE_BASE_URL};
use crate::{Error, Result};
use bytes::Bytes;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;

const UNKNOWN_UPSTREAM_ERROR: &str = "Unknown error";
const UNRECOGNIZED_PAYLOAD: &str = "Unrecognized image payload";

/// Thin REST client for `POST /models/{model}` on the Inference API.
pub struct HuggingFaceHttpClient {
    pub(crate) client: Client,
    pub(crate) base_url: String,
}

impl HuggingFaceHttpClient {
    /// `timeout` of `None` leaves reqwest's default (no overall timeout).
    pub fn new(timeout: Option<Duration>) -> Result<Self> {
        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self::new_with_client(builder.build()?))
    }

    pub fn new_with_client(client: Client) -> Self {
        Self {
            client,
            base_url: DEFAULT_INFERENCE_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn model_url(&self, model: ModelId) -> String {
        format!("{}/models/{}", self.base_url, model.as_str())
    }

    /// Run inference and return the image payload.
    ///
    /// A 2xx answer only counts when its body starts with known image magic
    /// bytes; JSON bodies are read as upstream error envelopes.
    pub async fn infer<Req: Serialize>(
        &self,
        model: ModelId,
        credential: &Credential,
        request: &Req,
    ) -> Result<Bytes> {
        let url = self.model_url(model);
        let response = self
            .client
            .post(&url)
            .header(AUTHORIZATION, format!("Bearer {}", credential.expose()))
            .header(CONTENT_TYPE, "application/json")
            .header("X-use-cache", "false")
            .json(request)
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Failed to send request to inference API: {}", e);
                Error::Transport(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = parse_error_message(&body)
                .unwrap_or_else(|| UNKNOWN_UPSTREAM_ERROR.to_string());
            tracing::error!(
                "Inference API error (status {}) for {}: {}",
                status,
                model,
                message
            );
            return Err(Error::Upstream {
                status: Some(status.as_u16()),
                message,
            });
        }

        let is_json = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.starts_with("application/json"));

        let payload = response.bytes().await?;
        if payload.is_empty() {
            return Err(Error::Upstream {
                status: Some(status.as_u16()),
                message: "Empty image payload".to_string(),
            });
        }

        if is_json {
            let message = std::str::from_utf8(&payload)
                .ok()
                .and_then(parse_error_message)
                .unwrap_or_else(|| UNRECOGNIZED_PAYLOAD.to_string());
            tracing::error!(
                "Inference API answered {} with JSON for {}: {}",
                status,
                model,
                message
            );
            return Err(Error::Upstream {
                status: Some(status.as_u16()),
                message,
            });
        }

        if ImageFormat::try_detect(&payload).is_none() {
            tracing::error!(
                "Inference API answered {} for {} with {} bytes that are not an image",
                status,
                model,
                payload.len()
            );
            return Err(Error::Upstream {
                status: Some(status.as_u16()),
                message: UNRECOGNIZED_PAYLOAD.to_string(),
            });
        }

        Ok(payload)
    }
}

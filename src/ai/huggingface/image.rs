use super::client::HuggingFaceHttpClient;
use super::types::InferenceRequest;
use crate::ai::ImageGenerationService;
use crate::image::ImageRef;
use crate::models::{Credential, GenerationRequest};
use crate::Result;
use async_trait::async_trait;
use std::time::Duration;

pub struct HuggingFaceImageClient {
    http: HuggingFaceHttpClient,
}

impl HuggingFaceImageClient {
    pub fn new(timeout: Option<Duration>) -> Result<Self> {
        Ok(Self {
            http: HuggingFaceHttpClient::new(timeout)?,
        })
    }

    pub fn new_with_client(client: reqwest::Client) -> Self {
        Self {
            http: HuggingFaceHttpClient::new_with_client(client),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.http = self.http.with_base_url(base_url);
        self
    }
}

#[async_trait]
impl ImageGenerationService for HuggingFaceImageClient {
    async fn generate_image(
        &self,
        request: &GenerationRequest,
        credential: &Credential,
        slot: usize,
    ) -> Result<ImageRef> {
        tracing::debug!(
            "Requesting image for slot {} from {} at {}",
            slot,
            request.model(),
            request.dimensions()
        );

        let body = InferenceRequest::from_generation(request);
        let payload = self.http.infer(request.model(), credential, &body).await?;

        let image = ImageRef::new(payload);
        tracing::debug!(
            "Slot {} received {} bytes ({})",
            slot,
            image.len(),
            image.format().mime()
        );
        Ok(image)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dimensions::Dimensions;
    use crate::image::ImageFormat;
    use crate::models::ModelId;
    use crate::Error;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const PNG_BYTES: [u8; 8] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];

    fn make_client(server: &MockServer) -> HuggingFaceImageClient {
        HuggingFaceImageClient::new(None)
            .unwrap()
            .with_base_url(server.uri())
    }

    fn credential() -> Credential {
        Credential::new("test-key").unwrap()
    }

    fn request(model: ModelId) -> GenerationRequest {
        GenerationRequest::new("a quiet harbor", Some(model), Dimensions::new(512, 512)).unwrap()
    }

    #[tokio::test]
    async fn test_generate_image_sends_expected_request() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/models/black-forest-labs/FLUX.1-schnell"))
            .and(header("Authorization", "Bearer test-key"))
            .and(header("X-use-cache", "false"))
            .and(header("Content-Type", "application/json"))
            .and(body_partial_json(serde_json::json!({
                "inputs": "a quiet harbor",
                "parameters": { "width": 512, "height": 512 },
                "options": { "wait_for_model": true, "use_cache": false }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(PNG_BYTES.to_vec()))
            .expect(1)
            .mount(&server)
            .await;

        let image = make_client(&server)
            .generate_image(&request(ModelId::FluxSchnell), &credential(), 0)
            .await
            .unwrap();

        assert_eq!(image.bytes().as_ref(), PNG_BYTES.as_slice());
        assert_eq!(image.format(), ImageFormat::Png);
    }

    #[tokio::test]
    async fn test_generate_image_surfaces_upstream_message() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_json(serde_json::json!({
                "error": "Model black-forest-labs/FLUX.1-dev is currently loading",
                "estimated_time": 42.0
            })))
            .mount(&server)
            .await;

        let err = make_client(&server)
            .generate_image(&request(ModelId::FluxDev), &credential(), 0)
            .await
            .unwrap_err();

        match err {
            Error::Upstream { status, message } => {
                assert_eq!(status, Some(503));
                assert!(message.contains("currently loading"));
            }
            other => panic!("expected upstream error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_generate_image_uses_generic_message_for_non_json_errors() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(502).set_body_string("Bad Gateway"))
            .mount(&server)
            .await;

        let err = make_client(&server)
            .generate_image(&request(ModelId::FluxDev), &credential(), 0)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            Error::Upstream { status: Some(502), ref message } if message == "Unknown error"
        ));
    }

    #[tokio::test]
    async fn test_generate_image_rejects_empty_payload() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let err = make_client(&server)
            .generate_image(&request(ModelId::FluxDev), &credential(), 0)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Upstream { .. }));
    }

    #[tokio::test]
    async fn test_generate_image_rejects_json_error_with_success_status() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "error": "Model too busy"
            })))
            .mount(&server)
            .await;

        let err = make_client(&server)
            .generate_image(&request(ModelId::FluxDev), &credential(), 0)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            Error::Upstream { status: Some(200), ref message } if message == "Model too busy"
        ));
    }

    #[tokio::test]
    async fn test_generate_image_rejects_non_image_payload() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>busy</html>"))
            .mount(&server)
            .await;

        let err = make_client(&server)
            .generate_image(&request(ModelId::FluxDev), &credential(), 0)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            Error::Upstream { ref message, .. } if message == "Unrecognized image payload"
        ));
    }

    #[tokio::test]
    async fn test_generate_image_sends_preset_parameters() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/models/runwayml/stable-diffusion-v1-5"))
            .and(body_partial_json(serde_json::json!({
                "parameters": { "negative_prompt": "blurry", "num_inference_steps": 20 }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(PNG_BYTES.to_vec()))
            .expect(1)
            .mount(&server)
            .await;

        let model = ModelId::StableDiffusion15;
        let request = request(model).with_preset(model.preset());

        make_client(&server)
            .generate_image(&request, &credential(), 0)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_unreachable_host_is_transport_error() {
        // Port 9 (discard) on localhost is not listening in test environments.
        let client = HuggingFaceImageClient::new(Some(Duration::from_secs(2)))
            .unwrap()
            .with_base_url("http://127.0.0.1:9");

        let err = client
            .generate_image(&request(ModelId::FluxDev), &credential(), 0)
            .await
            .unwrap_err();

        assert!(err.is_transport());
    }
}

//! Hugging Face Inference API payloads.

use crate::models::{GenerationRequest, ModelPreset};
use serde::{Deserialize, Serialize};

/// Request body for text-to-image inference.
#[derive(Debug, Serialize)]
pub struct InferenceRequest<'a> {
    pub inputs: &'a str,
    pub parameters: InferenceParameters,
    pub options: InferenceOptions,
}

impl<'a> InferenceRequest<'a> {
    pub fn from_generation(request: &'a GenerationRequest) -> Self {
        let dimensions = request.dimensions();
        Self {
            inputs: request.prompt(),
            parameters: InferenceParameters {
                preset: request.preset().copied(),
                width: dimensions.width,
                height: dimensions.height,
            },
            options: InferenceOptions::default(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct InferenceParameters {
    #[serde(flatten)]
    pub preset: Option<ModelPreset>,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Serialize)]
pub struct InferenceOptions {
    pub wait_for_model: bool,
    pub use_cache: bool,
}

impl Default for InferenceOptions {
    fn default() -> Self {
        Self {
            wait_for_model: true,
            use_cache: false,
        }
    }
}

/// Error envelope. `error` is usually a string but some endpoints return a list.
#[derive(Debug, Deserialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ErrorDetail {
    Message(String),
    Messages(Vec<String>),
}

/// Extract the upstream error message from a response body, if it has one.
pub fn parse_error_message(body: &str) -> Option<String> {
    let parsed: ErrorBody = serde_json::from_str(body).ok()?;
    let message = match parsed.error {
        ErrorDetail::Message(message) => message,
        ErrorDetail::Messages(messages) => messages.join("; "),
    };
    let message = message.trim().to_string();
    (!message.is_empty()).then_some(message)
}

/// Friendlier wording for well-known upstream failure messages. Matching is
/// case-sensitive.
pub fn upstream_hint(message: &str) -> Option<&'static str> {
    if message.contains("loading") {
        Some("Model is loading, please try again in a few seconds")
    } else if message.contains("permission") {
        Some("Please check your API key and model permissions")
    } else if message.contains("timeout") {
        Some("Request timed out, please try again")
    } else if message.contains("memory") {
        Some("Model is out of memory, please try again later")
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dimensions::Dimensions;
    use crate::models::ModelId;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_request_body_shape_without_preset() {
        let request = GenerationRequest::new(
            "a lighthouse",
            Some(ModelId::FluxDev),
            Dimensions::new(672, 384),
        )
        .unwrap();

        let body = serde_json::to_value(InferenceRequest::from_generation(&request)).unwrap();

        assert_eq!(
            body,
            serde_json::json!({
                "inputs": "a lighthouse",
                "parameters": { "width": 672, "height": 384 },
                "options": { "wait_for_model": true, "use_cache": false }
            })
        );
    }

    #[test]
    fn test_request_body_flattens_preset() {
        let model = ModelId::StableDiffusion21;
        let request =
            GenerationRequest::new("a lighthouse", Some(model), Dimensions::new(768, 768))
                .unwrap()
                .with_preset(model.preset());

        let body = serde_json::to_value(InferenceRequest::from_generation(&request)).unwrap();
        let parameters = &body["parameters"];

        assert_eq!(parameters["width"], 768);
        assert_eq!(parameters["num_inference_steps"], 25);
        assert_eq!(parameters["scheduler"], "DPMSolverMultistep");
        assert_eq!(
            parameters["negative_prompt"],
            "blurry, bad quality, distorted, low resolution, ugly"
        );
    }

    #[test]
    fn test_parse_error_message_variants() {
        assert_eq!(
            parse_error_message(r#"{"error":"Model is currently loading","estimated_time":20}"#),
            Some("Model is currently loading".to_string())
        );
        assert_eq!(
            parse_error_message(r#"{"error":["bad width","bad height"]}"#),
            Some("bad width; bad height".to_string())
        );
        assert_eq!(parse_error_message("<html>502</html>"), None);
        assert_eq!(parse_error_message(r#"{"error":""}"#), None);
    }

    #[test]
    fn test_upstream_hints() {
        assert_eq!(
            upstream_hint("Model stabilityai/x is currently loading"),
            Some("Model is loading, please try again in a few seconds")
        );
        assert_eq!(
            upstream_hint("CUDA out of memory"),
            Some("Model is out of memory, please try again later")
        );
        assert_eq!(upstream_hint("Input is too long"), None);
        assert_eq!(upstream_hint("Loading weights failed"), None);
    }
}

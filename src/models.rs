//! Data models and structures
//!
//! Defines the upstream model catalogue, validated generation requests, the
//! shared credential, and environment configuration.

use crate::dimensions::{Dimensions, Granularity};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModelId {
    #[serde(rename = "black-forest-labs/FLUX.1-dev")]
    FluxDev,
    #[serde(rename = "stabilityai/stable-diffusion-3.5-large")]
    StableDiffusion35Large,
    #[serde(rename = "black-forest-labs/FLUX.1-schnell")]
    FluxSchnell,
    #[serde(rename = "stabilityai/stable-diffusion-xl-base-1.0")]
    StableDiffusionXlBase,
    #[serde(rename = "stabilityai/stable-diffusion-xl-refiner-1.0")]
    StableDiffusionXlRefiner,
    #[serde(rename = "stabilityai/stable-diffusion-2-1")]
    StableDiffusion21,
    #[serde(rename = "runwayml/stable-diffusion-v1-5")]
    StableDiffusion15,
}

impl ModelId {
    pub const ALL: [ModelId; 7] = [
        ModelId::FluxDev,
        ModelId::StableDiffusion35Large,
        ModelId::FluxSchnell,
        ModelId::StableDiffusionXlBase,
        ModelId::StableDiffusionXlRefiner,
        ModelId::StableDiffusion21,
        ModelId::StableDiffusion15,
    ];

    /// Model used by the proxy when the caller does not name one.
    pub const PROXY_DEFAULT: ModelId = ModelId::StableDiffusionXlBase;

    pub fn as_str(&self) -> &'static str {
        match self {
            ModelId::FluxDev => "black-forest-labs/FLUX.1-dev",
            ModelId::StableDiffusion35Large => "stabilityai/stable-diffusion-3.5-large",
            ModelId::FluxSchnell => "black-forest-labs/FLUX.1-schnell",
            ModelId::StableDiffusionXlBase => "stabilityai/stable-diffusion-xl-base-1.0",
            ModelId::StableDiffusionXlRefiner => "stabilityai/stable-diffusion-xl-refiner-1.0",
            ModelId::StableDiffusion21 => "stabilityai/stable-diffusion-2-1",
            ModelId::StableDiffusion15 => "runwayml/stable-diffusion-v1-5",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ModelId::FluxDev => "High Quality",
            ModelId::StableDiffusion35Large => "Smart Design",
            ModelId::FluxSchnell => "Fast Generation",
            ModelId::StableDiffusionXlBase => "SDXL Base",
            ModelId::StableDiffusionXlRefiner => "SDXL Refiner",
            ModelId::StableDiffusion21 => "Stable Diffusion 2.1",
            ModelId::StableDiffusion15 => "Stable Diffusion 1.5",
        }
    }

    /// Tuned inference parameters, when this model has any.
    pub fn preset(&self) -> Option<ModelPreset> {
        match self {
            ModelId::StableDiffusionXlBase => Some(ModelPreset {
                negative_prompt: "blurry, bad quality, distorted",
                num_inference_steps: 30,
                guidance_scale: 7.5,
                scheduler: None,
            }),
            ModelId::StableDiffusionXlRefiner => Some(ModelPreset {
                negative_prompt: "blurry, bad quality, distorted, low resolution",
                num_inference_steps: 20,
                guidance_scale: 7.0,
                scheduler: Some("DPMSolverMultistep"),
            }),
            ModelId::StableDiffusion21 => Some(ModelPreset {
                negative_prompt: "blurry, bad quality, distorted, low resolution, ugly",
                num_inference_steps: 25,
                guidance_scale: 7.5,
                scheduler: Some("DPMSolverMultistep"),
            }),
            ModelId::StableDiffusion15 => Some(ModelPreset {
                negative_prompt: "blurry",
                num_inference_steps: 20,
                guidance_scale: 7.0,
                scheduler: None,
            }),
            ModelId::FluxDev | ModelId::StableDiffusion35Large | ModelId::FluxSchnell => None,
        }
    }
}

impl FromStr for ModelId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        ModelId::ALL
            .into_iter()
            .find(|model| model.as_str() == s)
            .ok_or_else(|| Error::Validation(format!("Unsupported model: {}", s)))
    }
}

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Extra diffusion parameters sent alongside width and height.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ModelPreset {
    pub negative_prompt: &'static str,
    pub num_inference_steps: u32,
    pub guidance_scale: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheduler: Option<&'static str>,
}

/// Number of images in one batch (1..=4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageCount(u8);

impl ImageCount {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 4;

    pub fn new(count: u8) -> Result<Self> {
        if (Self::MIN..=Self::MAX).contains(&count) {
            Ok(Self(count))
        } else {
            Err(Error::Validation(format!(
                "Image count must be between {} and {}, got {}",
                Self::MIN,
                Self::MAX,
                count
            )))
        }
    }

    pub fn get(&self) -> usize {
        usize::from(self.0)
    }
}

impl Default for ImageCount {
    fn default() -> Self {
        Self(1)
    }
}

impl FromStr for ImageCount {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let count = s
            .trim()
            .parse::<u8>()
            .map_err(|_| Error::Validation(format!("Invalid image count '{}'", s)))?;
        Self::new(count)
    }
}

/// Bearer token shared read-only by every request in a batch.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(Arc<str>);

impl Credential {
    /// Blank tokens count as missing.
    pub fn new(token: &str) -> Option<Self> {
        let token = token.trim();
        if token.is_empty() {
            None
        } else {
            Some(Self(Arc::from(token)))
        }
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

/// Validated input for one image generation call.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    prompt: String,
    model: ModelId,
    dimensions: Dimensions,
    preset: Option<ModelPreset>,
}

impl GenerationRequest {
    pub fn new(
        prompt: impl Into<String>,
        model: Option<ModelId>,
        dimensions: Dimensions,
    ) -> Result<Self> {
        let prompt = prompt.into();
        let model = model.ok_or_else(|| Error::Validation("No model selected".to_string()))?;

        if prompt.trim().is_empty() {
            return Err(Error::Validation("Prompt is required".to_string()));
        }

        Ok(Self {
            prompt,
            model,
            dimensions: dimensions.ensure_positive()?,
            preset: None,
        })
    }

    pub fn with_preset(mut self, preset: Option<ModelPreset>) -> Self {
        self.preset = preset;
        self
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn model(&self) -> ModelId {
        self.model
    }

    pub fn dimensions(&self) -> Dimensions {
        self.dimensions
    }

    pub fn preset(&self) -> Option<&ModelPreset> {
        self.preset.as_ref()
    }
}

pub const DEFAULT_INFERENCE_BASE_URL: &str = "https://api-inference.huggingface.co";

// Configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub api_key: Option<String>,
    pub inference_base_url: String,
    pub base_size: u32,
    pub client_granularity: Granularity,
    pub proxy_granularity: Granularity,
    pub request_timeout: Option<Duration>,
    pub bind_addr: String,
    pub output_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: None,
            inference_base_url: DEFAULT_INFERENCE_BASE_URL.to_string(),
            base_size: 512,
            client_granularity: Granularity::CLIENT,
            proxy_granularity: Granularity::PROXY,
            request_timeout: None,
            bind_addr: "127.0.0.1:3000".to_string(),
            output_dir: PathBuf::from("output"),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let base_size: u32 = parse_var(&lookup, "IMAGE_BASE_SIZE")?.unwrap_or(defaults.base_size);
        if base_size == 0 {
            return Err(Error::Configuration(
                "IMAGE_BASE_SIZE must be positive".to_string(),
            ));
        }

        Ok(Self {
            api_key: lookup("HUGGINGFACE_API_KEY").filter(|key| !key.trim().is_empty()),
            inference_base_url: lookup("INFERENCE_BASE_URL")
                .unwrap_or(defaults.inference_base_url),
            base_size,
            client_granularity: parse_var(&lookup, "DIMENSION_GRANULARITY")?
                .unwrap_or(defaults.client_granularity),
            proxy_granularity: parse_var(&lookup, "PROXY_DIMENSION_GRANULARITY")?
                .unwrap_or(defaults.proxy_granularity),
            request_timeout: parse_var::<u64, _>(&lookup, "REQUEST_TIMEOUT_SECS")?
                .map(Duration::from_secs),
            bind_addr: lookup("BIND_ADDR").unwrap_or(defaults.bind_addr),
            output_dir: lookup("OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.output_dir),
        })
    }

    pub fn credential(&self) -> Option<Credential> {
        self.api_key.as_deref().and_then(Credential::new)
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| Error::Configuration(format!("{} has an invalid value: {}", key, raw))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_model_id_serialization_uses_upstream_ids() {
        let json = serde_json::to_string(&ModelId::FluxSchnell).unwrap();
        assert_eq!(json, "\"black-forest-labs/FLUX.1-schnell\"");

        let parsed: ModelId =
            serde_json::from_str("\"stabilityai/stable-diffusion-3.5-large\"").unwrap();
        assert_eq!(parsed, ModelId::StableDiffusion35Large);
    }

    #[test]
    fn test_model_id_from_str_round_trips_catalogue() {
        for model in ModelId::ALL {
            assert_eq!(model.as_str().parse::<ModelId>().unwrap(), model);
        }
        assert!(matches!(
            "acme/unknown".parse::<ModelId>(),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn test_presets_match_tuned_models() {
        let refiner = ModelId::StableDiffusionXlRefiner.preset().unwrap();
        assert_eq!(refiner.num_inference_steps, 20);
        assert_eq!(refiner.scheduler, Some("DPMSolverMultistep"));
        assert!(ModelId::FluxDev.preset().is_none());
    }

    #[test]
    fn test_image_count_bounds() {
        assert!(ImageCount::new(0).is_err());
        assert_eq!(ImageCount::new(4).unwrap().get(), 4);
        assert!(ImageCount::new(5).is_err());
        assert_eq!("3".parse::<ImageCount>().unwrap().get(), 3);
    }

    #[test]
    fn test_generation_request_validation() {
        let dims = Dimensions::new(512, 512);

        let missing_model = GenerationRequest::new("a castle", None, dims).unwrap_err();
        assert!(matches!(missing_model, Error::Validation(_)));

        let blank_prompt =
            GenerationRequest::new("   \n", Some(ModelId::FluxDev), dims).unwrap_err();
        assert!(matches!(blank_prompt, Error::Validation(_)));

        let zero_side =
            GenerationRequest::new("a castle", Some(ModelId::FluxDev), Dimensions::new(0, 512))
                .unwrap_err();
        assert!(matches!(zero_side, Error::InvalidDimensions { .. }));

        let ok = GenerationRequest::new(" a castle ", Some(ModelId::FluxDev), dims).unwrap();
        assert_eq!(ok.prompt(), " a castle ");
        assert!(ok.preset().is_none());
    }

    #[test]
    fn test_credential_redacts_and_rejects_blank() {
        assert!(Credential::new("  ").is_none());
        let credential = Credential::new("hf_secret").unwrap();
        assert_eq!(credential.expose(), "hf_secret");
        assert_eq!(format!("{:?}", credential), "Credential(***)");
    }

    #[test]
    fn test_config_defaults() {
        let config = Config::from_lookup(lookup_from(&[])).unwrap();
        assert!(config.credential().is_none());
        assert_eq!(config.base_size, 512);
        assert_eq!(config.client_granularity, Granularity::CLIENT);
        assert_eq!(config.proxy_granularity, Granularity::PROXY);
        assert_eq!(config.inference_base_url, DEFAULT_INFERENCE_BASE_URL);
        assert!(config.request_timeout.is_none());
    }

    #[test]
    fn test_config_overrides() {
        let config = Config::from_lookup(lookup_from(&[
            ("HUGGINGFACE_API_KEY", "hf_abc"),
            ("IMAGE_BASE_SIZE", "768"),
            ("DIMENSION_GRANULARITY", "8"),
            ("PROXY_DIMENSION_GRANULARITY", "128"),
            ("REQUEST_TIMEOUT_SECS", "90"),
            ("OUTPUT_DIR", "/tmp/images"),
        ]))
        .unwrap();

        assert_eq!(config.credential().unwrap().expose(), "hf_abc");
        assert_eq!(config.base_size, 768);
        assert_eq!(config.client_granularity.get(), 8);
        assert_eq!(config.proxy_granularity.get(), 128);
        assert_eq!(config.request_timeout, Some(Duration::from_secs(90)));
        assert_eq!(config.output_dir, PathBuf::from("/tmp/images"));
    }

    #[test]
    fn test_config_rejects_bad_numbers() {
        let err = Config::from_lookup(lookup_from(&[("IMAGE_BASE_SIZE", "big")])).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));

        let err =
            Config::from_lookup(lookup_from(&[("DIMENSION_GRANULARITY", "0")])).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn test_config_treats_blank_key_as_missing() {
        let config = Config::from_lookup(lookup_from(&[("HUGGINGFACE_API_KEY", " ")])).unwrap();
        assert!(config.api_key.is_none());
    }
}

use super::ImageGenerationService;
use crate::image::ImageRef;
use crate::models::{Credential, GenerationRequest};
use crate::{Error, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Tiny valid PNG returned when no custom image is configured.
pub const MOCK_PNG: &[u8] = &[
    0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, // PNG signature
    0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44, 0x52, // IHDR chunk
    0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, // 1x1 pixel
    0x08, 0x02, 0x00, 0x00, 0x00, 0x90, 0x77, 0x53, 0xDE, 0x00, 0x00, 0x00, 0x0C, 0x49, 0x44,
    0x41, // IDAT chunk
    0x54, 0x08, 0x99, 0x63, 0xF8, 0xCF, 0xC0, 0x00, 0x00, 0x00, 0x01, 0x00, 0x01, 0xE2, 0x25,
    0x00, 0xBC, 0x00, 0x00, 0x00, 0x00, 0x49, 0x45, 0x4E, // IEND chunk
    0x44, 0xAE, 0x42, 0x60, 0x82,
];

#[derive(Debug, Clone)]
enum MockFailure {
    Upstream(String),
    Transport,
}

/// Scripted [`ImageGenerationService`] with per-slot failures and delays.
#[derive(Clone)]
pub struct MockImageGenerationClient {
    image: Arc<Mutex<Vec<u8>>>,
    failures: Arc<Mutex<HashMap<usize, MockFailure>>>,
    delays: Arc<Mutex<HashMap<usize, Duration>>>,
    calls: Arc<Mutex<Vec<usize>>>,
}

impl MockImageGenerationClient {
    pub fn new() -> Self {
        Self {
            image: Arc::new(Mutex::new(MOCK_PNG.to_vec())),
            failures: Arc::new(Mutex::new(HashMap::new())),
            delays: Arc::new(Mutex::new(HashMap::new())),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_image_response(self, image: Vec<u8>) -> Self {
        *self.image.lock().unwrap() = image;
        self
    }

    /// Fail `slot` as if the endpoint answered with `{ "error": message }`.
    pub fn with_upstream_failure(self, slot: usize, message: &str) -> Self {
        self.failures
            .lock()
            .unwrap()
            .insert(slot, MockFailure::Upstream(message.to_string()));
        self
    }

    /// Fail `slot` as if the connection dropped.
    pub fn with_transport_failure(self, slot: usize) -> Self {
        self.failures
            .lock()
            .unwrap()
            .insert(slot, MockFailure::Transport);
        self
    }

    pub fn with_delay(self, slot: usize, delay: Duration) -> Self {
        self.delays.lock().unwrap().insert(slot, delay);
        self
    }

    pub fn get_call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Slots in the order their calls started.
    pub fn get_called_slots(&self) -> Vec<usize> {
        self.calls.lock().unwrap().clone()
    }
}

impl Default for MockImageGenerationClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ImageGenerationService for MockImageGenerationClient {
    async fn generate_image(
        &self,
        _request: &GenerationRequest,
        _credential: &Credential,
        slot: usize,
    ) -> Result<ImageRef> {
        self.calls.lock().unwrap().push(slot);

        let delay = self.delays.lock().unwrap().get(&slot).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let failure = self.failures.lock().unwrap().get(&slot).cloned();
        match failure {
            Some(MockFailure::Upstream(message)) => Err(Error::Upstream {
                status: Some(500),
                message,
            }),
            Some(MockFailure::Transport) => {
                Err(Error::Transport("mock connection reset".to_string()))
            }
            None => Ok(ImageRef::new(self.image.lock().unwrap().clone())),
        }
    }
}

//! Text-to-image inference integration
//!
//! Provides the interface to the hosted inference API that turns a prompt
//! into image bytes, plus a scripted mock for tests.

pub mod huggingface;
pub mod mock;

pub use huggingface::HuggingFaceImageClient;
pub use mock::MockImageGenerationClient;

use crate::image::ImageRef;
use crate::models::{Credential, GenerationRequest};
use crate::Result;
use async_trait::async_trait;

#[async_trait]
pub trait ImageGenerationService: Send + Sync {
    /// Generate one image. `slot` is the card position the result belongs to.
    async fn generate_image(
        &self,
        request: &GenerationRequest,
        credential: &Credential,
        slot: usize,
    ) -> Result<ImageRef>;
}

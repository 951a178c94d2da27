//! Application wiring for the CLI: batch generation and the proxy server.

use crate::ai::{HuggingFaceImageClient, ImageGenerationService};
use crate::batch::{Batch, BatchOrchestrator, CardStatus, CardUpdate};
use crate::dimensions::{compute_dimensions, AspectRatio};
use crate::gallery::Session;
use crate::models::{Config, GenerationRequest, ImageCount, ModelId};
use crate::server::{self, ServerState};
use crate::{Error, Result};
use chrono::{Local, Utc};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

/// User input for one batch.
#[derive(Debug, Clone)]
pub struct GenerateOptions {
    pub prompt: String,
    pub model: Option<ModelId>,
    pub count: ImageCount,
    pub ratio: AspectRatio,
    /// Directory to write succeeded images into; `None` keeps them in memory.
    pub output_dir: Option<PathBuf>,
}

pub struct App {
    service: Arc<dyn ImageGenerationService>,
    config: Config,
}

impl App {
    /// Build an app from a concrete service, e.g. a mock in tests.
    pub fn with_services(service: Arc<dyn ImageGenerationService>, config: Config) -> Self {
        Self { service, config }
    }

    /// Construct an app from environment configuration (`Config::from_env`).
    pub fn new() -> Result<Self> {
        let config = Config::from_env()?;

        if config.credential().is_none() {
            warn!("HUGGINGFACE_API_KEY is not set; generation requests will fail");
        }

        let client = HuggingFaceImageClient::new(config.request_timeout)?
            .with_base_url(config.inference_base_url.clone());
        info!("Inference endpoint: {}", config.inference_base_url);

        Ok(Self::with_services(Arc::new(client), config))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Size the request, run one batch to completion, and save what succeeded.
    pub async fn generate(&self, options: GenerateOptions) -> Result<Batch> {
        let dimensions = compute_dimensions(
            &options.ratio,
            self.config.base_size,
            self.config.client_granularity,
        )
        .ensure_positive()?;
        let request = GenerationRequest::new(options.prompt, options.model, dimensions)?;

        let orchestrator = BatchOrchestrator::new(self.service.clone(), self.config.credential());
        let mut session = Session::new(orchestrator);
        let batch_id = session.submit(request, options.count);

        let batch_dir = options.output_dir.as_ref().map(|dir| {
            let date = Local::now().format("%Y-%m-%d");
            dir.join(format!("{}_{}", date, batch_id))
        });

        for card in session.gallery().cards() {
            info!("[card {}] {}", card.id, card.status.label());
        }

        while let Some(update) = session.next_update().await {
            self.report(&update, batch_dir.as_deref()).await;
        }

        let batch = session
            .gallery()
            .batch()
            .cloned()
            .ok_or_else(|| Error::Invariant("Gallery lost its batch".to_string()))?;

        info!(
            "Batch {} finished: {} succeeded, {} failed",
            batch.id(),
            batch.succeeded_count(),
            batch.failed_count()
        );
        Ok(batch)
    }

    async fn report(&self, update: &CardUpdate, batch_dir: Option<&Path>) {
        let card = &update.card;
        match &card.status {
            CardStatus::Succeeded(image) => {
                info!("[card {}] succeeded ({} bytes)", card.id, image.len());
                if let Some(dir) = batch_dir {
                    let stem = format!("card-{}-{}", card.id, Utc::now().timestamp_millis());
                    match image.save_to(dir, &stem).await {
                        Ok(path) => info!("[card {}] saved to {}", card.id, path.display()),
                        Err(e) => error!("[card {}] could not be saved: {}", card.id, e),
                    }
                }
            }
            CardStatus::Failed(failure) => {
                warn!("[card {}] failed: {}", card.id, failure.message);
            }
            CardStatus::Pending => {}
        }
    }

    pub fn server_state(&self) -> ServerState {
        ServerState {
            service: self.service.clone(),
            credential: self.config.credential(),
            granularity: self.config.proxy_granularity,
        }
    }

    /// Run the generation proxy until the process is stopped.
    pub async fn serve(&self, bind_addr: Option<&str>) -> Result<()> {
        let addr = bind_addr.unwrap_or(&self.config.bind_addr);
        let listener = TcpListener::bind(addr).await?;
        server::serve(listener, self.server_state()).await
    }
}

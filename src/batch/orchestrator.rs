//! Fan-out of one generation request per card.

use super::{Batch, BatchId, CardFailure, CardUpdate, FailureKind, ImageCard};
use crate::ai::ImageGenerationService;
use crate::models::{Credential, GenerationRequest, ImageCount};
use futures::Stream;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{info, info_span, warn, Instrument};

pub const MISSING_CREDENTIAL_MESSAGE: &str =
    "API key is missing. Set HUGGINGFACE_API_KEY in your environment or .env file";

pub const CANCELLED_MESSAGE: &str = "Generation was cancelled";

/// Launches batches against an inference service.
#[derive(Clone)]
pub struct BatchOrchestrator {
    service: Arc<dyn ImageGenerationService>,
    credential: Option<Credential>,
}

impl BatchOrchestrator {
    pub fn new(service: Arc<dyn ImageGenerationService>, credential: Option<Credential>) -> Self {
        Self {
            service,
            credential,
        }
    }

    /// Start one request per card and return immediately.
    ///
    /// Must be called from within a tokio runtime. Without a credential the
    /// returned batch is a single failed card and nothing is spawned.
    pub fn generate_batch(&self, request: GenerationRequest, count: ImageCount) -> BatchHandle {
        let batch_id = BatchId::new();

        let Some(credential) = self.credential.clone() else {
            warn!("[{}] {}", batch_id, MISSING_CREDENTIAL_MESSAGE);
            let failure = CardFailure::new(FailureKind::Configuration, MISSING_CREDENTIAL_MESSAGE);
            return BatchHandle::finished(Batch::rejected(batch_id, failure));
        };

        info!(
            "[{}] Generating {} image(s) with {} at {}",
            batch_id,
            count.get(),
            request.model(),
            request.dimensions()
        );

        let request = Arc::new(request);
        let (tx, rx) = mpsc::unbounded_channel();
        let mut tasks = JoinSet::new();

        for slot in 0..count.get() {
            let service = Arc::clone(&self.service);
            let request = Arc::clone(&request);
            let credential = credential.clone();
            let tx = tx.clone();
            let span = info_span!("card", batch = %batch_id, card = slot);

            tasks.spawn(
                async move {
                    let card = match service.generate_image(&request, &credential, slot).await {
                        Ok(image) => {
                            info!("Image ready ({} bytes)", image.len());
                            ImageCard::succeeded(slot, image)
                        }
                        Err(e) => {
                            warn!("Image generation failed: {}", e);
                            ImageCard::failed(slot, CardFailure::from_error(&e))
                        }
                    };
                    // The receiver is gone once the handle is dropped; nothing to report to.
                    let _ = tx.send(CardUpdate { batch_id, card });
                }
                .instrument(span),
            );
        }

        BatchHandle {
            batch: Batch::pending(batch_id, count.get()),
            updates: Some(rx),
            tasks,
        }
    }
}

/// A running batch: its current cards plus the stream of card updates.
///
/// Dropping the handle aborts any requests still in flight.
pub struct BatchHandle {
    batch: Batch,
    updates: Option<mpsc::UnboundedReceiver<CardUpdate>>,
    tasks: JoinSet<()>,
}

impl BatchHandle {
    fn finished(batch: Batch) -> Self {
        Self {
            batch,
            updates: None,
            tasks: JoinSet::new(),
        }
    }

    pub fn id(&self) -> BatchId {
        self.batch.id()
    }

    /// Cards as known so far; all pending right after `generate_batch`.
    pub fn snapshot(&self) -> &Batch {
        &self.batch
    }

    /// Next card transition in completion order, or `None` once every card
    /// has reported (or the batch was aborted).
    pub async fn next_update(&mut self) -> Option<CardUpdate> {
        loop {
            let update = self.updates.as_mut()?.recv().await;
            match update {
                Some(update) => {
                    if self.batch.apply(update.card.clone()) {
                        return Some(update);
                    }
                    warn!(
                        "[{}] Ignoring duplicate update for card {}",
                        self.batch.id(),
                        update.card.id
                    );
                }
                None => {
                    self.updates = None;
                    return None;
                }
            }
        }
    }

    /// Stop every in-flight request. Cards that have not reported stay
    /// pending until [`BatchHandle::join`] marks them failed.
    pub fn abort(&mut self) {
        if !self.tasks.is_empty() {
            info!("[{}] Aborting {} request(s)", self.batch.id(), self.tasks.len());
        }
        self.tasks.abort_all();
    }

    /// Wait for every card to finish and return the final batch.
    pub async fn join(mut self) -> Batch {
        while self.next_update().await.is_some() {}

        while let Some(result) = self.tasks.join_next().await {
            if let Err(e) = result {
                if e.is_panic() {
                    warn!("[{}] Card task panicked: {}", self.batch.id(), e);
                }
            }
        }

        if !self.batch.is_complete() {
            self.batch.fail_pending(&CardFailure::cancelled());
        }

        info!(
            "[{}] Batch complete: {} succeeded, {} failed",
            self.batch.id(),
            self.batch.succeeded_count(),
            self.batch.failed_count()
        );
        self.batch
    }

    /// Card updates as a stream; the stream owns the handle and its tasks.
    pub fn into_stream(self) -> impl Stream<Item = CardUpdate> {
        futures::stream::unfold(self, |mut handle| async move {
            handle.next_update().await.map(|update| (update, handle))
        })
    }
}

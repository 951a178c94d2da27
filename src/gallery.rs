//! Presentation state for generated batches.
//!
//! The gallery shows exactly one batch. Updates are matched by batch id and
//! card id, so results that arrive late from a replaced batch are dropped.

use crate::batch::{
    Batch, BatchHandle, BatchId, BatchOrchestrator, CardFailure, CardUpdate, ImageCard,
};
use crate::models::{GenerationRequest, ImageCount};
use tracing::debug;

#[derive(Debug, Default)]
pub struct Gallery {
    batch: Option<Batch>,
}

impl Gallery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace whatever is shown with `batch`.
    pub fn begin(&mut self, batch: Batch) {
        self.batch = Some(batch);
    }

    /// Apply an update if it belongs to the current batch and its card is
    /// still pending.
    pub fn apply(&mut self, update: &CardUpdate) -> bool {
        match self.batch.as_mut() {
            Some(batch) if batch.id() == update.batch_id => batch.apply(update.card.clone()),
            _ => {
                debug!(
                    "Dropping update for card {} of stale batch {}",
                    update.card.id, update.batch_id
                );
                false
            }
        }
    }

    /// Fail every card of the current batch that has not reported yet.
    pub fn cancel_pending(&mut self) {
        if let Some(batch) = self.batch.as_mut() {
            batch.fail_pending(&CardFailure::cancelled());
        }
    }

    pub fn clear(&mut self) {
        self.batch = None;
    }

    pub fn batch(&self) -> Option<&Batch> {
        self.batch.as_ref()
    }

    pub fn current_batch_id(&self) -> Option<BatchId> {
        self.batch.as_ref().map(Batch::id)
    }

    pub fn cards(&self) -> &[ImageCard] {
        self.batch.as_ref().map(Batch::cards).unwrap_or_default()
    }

    pub fn is_generating(&self) -> bool {
        self.batch.as_ref().is_some_and(|batch| !batch.is_complete())
    }
}

/// Couples an orchestrator with the gallery it feeds.
///
/// Submitting a new batch aborts the one in flight, if any.
pub struct Session {
    orchestrator: BatchOrchestrator,
    gallery: Gallery,
    active: Option<BatchHandle>,
}

impl Session {
    pub fn new(orchestrator: BatchOrchestrator) -> Self {
        Self {
            orchestrator,
            gallery: Gallery::new(),
            active: None,
        }
    }

    pub fn submit(&mut self, request: GenerationRequest, count: ImageCount) -> BatchId {
        self.cancel();

        let handle = self.orchestrator.generate_batch(request, count);
        let id = handle.id();
        self.gallery.begin(handle.snapshot().clone());
        self.active = Some(handle);
        id
    }

    /// Abort the in-flight batch; its unreported cards become failed.
    pub fn cancel(&mut self) {
        if let Some(mut previous) = self.active.take() {
            previous.abort();
            self.gallery.cancel_pending();
        }
    }

    /// Wait for the next card of the active batch and show it.
    pub async fn next_update(&mut self) -> Option<CardUpdate> {
        let handle = self.active.as_mut()?;
        match handle.next_update().await {
            Some(update) => {
                self.gallery.apply(&update);
                Some(update)
            }
            None => {
                self.active = None;
                None
            }
        }
    }

    /// Drain the active batch.
    pub async fn wait(&mut self) -> &Gallery {
        while self.next_update().await.is_some() {}
        &self.gallery
    }

    pub fn gallery(&self) -> &Gallery {
        &self.gallery
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }
}

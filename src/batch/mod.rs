//! Per-request image cards and batch bookkeeping
//!
//! A batch holds one card per requested image. Every card starts `Pending`
//! and moves exactly once to `Succeeded` or `Failed`.

pub mod orchestrator;

pub use orchestrator::{BatchHandle, BatchOrchestrator, CANCELLED_MESSAGE};

use crate::image::ImageRef;
use crate::Error;
use std::fmt;
use uuid::Uuid;

/// Position of a card inside its batch.
pub type CardId = usize;

/// Message shown for failures that carry no upstream detail.
pub const GENERIC_FAILURE_MESSAGE: &str = "Generation failed! Check logs for details.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BatchId(Uuid);

impl BatchId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for BatchId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for BatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Configuration,
    Upstream,
    Transport,
    Internal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CardFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl CardFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Failure recorded for cards whose request was aborted.
    pub fn cancelled() -> Self {
        Self::new(FailureKind::Internal, CANCELLED_MESSAGE)
    }

    /// Map a generation error to what the card displays.
    pub fn from_error(error: &Error) -> Self {
        match error {
            Error::Upstream { message, .. } => Self::new(FailureKind::Upstream, message.clone()),
            Error::Transport(_) | Error::Http(_) => {
                Self::new(FailureKind::Transport, GENERIC_FAILURE_MESSAGE)
            }
            Error::Configuration(message) => {
                Self::new(FailureKind::Configuration, message.clone())
            }
            other => Self::new(FailureKind::Internal, other.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CardStatus {
    Pending,
    Succeeded(ImageRef),
    Failed(CardFailure),
}

impl CardStatus {
    pub fn label(&self) -> &'static str {
        match self {
            CardStatus::Pending => "pending",
            CardStatus::Succeeded(_) => "succeeded",
            CardStatus::Failed(_) => "failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImageCard {
    pub id: CardId,
    pub status: CardStatus,
}

impl ImageCard {
    pub fn pending(id: CardId) -> Self {
        Self {
            id,
            status: CardStatus::Pending,
        }
    }

    pub fn succeeded(id: CardId, image: ImageRef) -> Self {
        Self {
            id,
            status: CardStatus::Succeeded(image),
        }
    }

    pub fn failed(id: CardId, failure: CardFailure) -> Self {
        Self {
            id,
            status: CardStatus::Failed(failure),
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self.status, CardStatus::Pending)
    }

    pub fn result_ref(&self) -> Option<&ImageRef> {
        match &self.status {
            CardStatus::Succeeded(image) => Some(image),
            _ => None,
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match &self.status {
            CardStatus::Failed(failure) => Some(&failure.message),
            _ => None,
        }
    }
}

/// One terminal transition reported by a running batch.
#[derive(Debug, Clone, PartialEq)]
pub struct CardUpdate {
    pub batch_id: BatchId,
    pub card: ImageCard,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    id: BatchId,
    cards: Vec<ImageCard>,
}

impl Batch {
    /// `count` pending cards with ids `0..count`.
    pub fn pending(id: BatchId, count: usize) -> Self {
        Self {
            id,
            cards: (0..count).map(ImageCard::pending).collect(),
        }
    }

    /// A batch that failed before any request: one failed card with id 0.
    pub fn rejected(id: BatchId, failure: CardFailure) -> Self {
        Self {
            id,
            cards: vec![ImageCard::failed(0, failure)],
        }
    }

    pub fn id(&self) -> BatchId {
        self.id
    }

    pub fn cards(&self) -> &[ImageCard] {
        &self.cards
    }

    pub fn card(&self, id: CardId) -> Option<&ImageCard> {
        self.cards.get(id)
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    /// Record a terminal card. Returns false (and changes nothing) when the
    /// card is pending, the slot is unknown, or the slot already finished.
    pub fn apply(&mut self, card: ImageCard) -> bool {
        if !card.is_terminal() {
            return false;
        }
        match self.cards.get_mut(card.id) {
            Some(slot) if !slot.is_terminal() => {
                *slot = card;
                true
            }
            _ => false,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.cards.iter().all(ImageCard::is_terminal)
    }

    pub fn pending_count(&self) -> usize {
        self.cards.iter().filter(|c| !c.is_terminal()).count()
    }

    pub fn succeeded_count(&self) -> usize {
        self.cards
            .iter()
            .filter(|c| matches!(c.status, CardStatus::Succeeded(_)))
            .count()
    }

    pub fn failed_count(&self) -> usize {
        self.cards
            .iter()
            .filter(|c| matches!(c.status, CardStatus::Failed(_)))
            .count()
    }

    /// Fail every card that is still pending, e.g. after an abort.
    pub(crate) fn fail_pending(&mut self, failure: &CardFailure) {
        for card in self.cards.iter_mut().filter(|c| !c.is_terminal()) {
            card.status = CardStatus::Failed(failure.clone());
        }
    }
}

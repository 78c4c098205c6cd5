use std::collections::VecDeque;

use folio_logging::{folio_error, folio_trace};
use serde::{Deserialize, Serialize};

use crate::snippet::Snippet;

/// Upper bound on delivery rounds in one `dispatch` call; guards against
/// components that keep re-emitting in response to each other.
pub const MAX_DISPATCH_ROUNDS: usize = 64;

/// Cross-component notifications. Every event is a success notification;
/// failures are handled where they occur and never travel on the bus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum BusEvent {
    /// The answer stream referenced pages of a document.
    RagMeta {
        pages: Vec<u32>,
        pdf_url: String,
        first_page: u32,
        doc_label: String,
    },
    /// Request to show a specific page of the loaded document.
    JumpToPage { page: u32 },
    /// A snippet was cropped from the rendered page.
    SnippetCreated {
        id: String,
        name: String,
        #[serde(rename = "dataUrl")]
        data_url: String,
        page: u32,
    },
    /// A bookmarked snippet became active.
    AddToCanvas { snippet: Snippet },
    /// A bookmarked snippet became inactive or was deleted.
    RemoveFromCanvas { id: String },
}

impl BusEvent {
    /// Contract name of the event.
    pub fn name(&self) -> &'static str {
        match self {
            BusEvent::RagMeta { .. } => "rag-meta",
            BusEvent::JumpToPage { .. } => "jump-to-page",
            BusEvent::SnippetCreated { .. } => "snippet-created",
            BusEvent::AddToCanvas { .. } => "add-to-canvas",
            BusEvent::RemoveFromCanvas { .. } => "remove-from-canvas",
        }
    }
}

/// A component that reacts to broadcast events.
pub trait Subscriber {
    fn on_event(&mut self, event: &BusEvent, bus: &mut EventBus);
}

/// FIFO outbox of broadcast events.
#[derive(Debug, Default)]
pub struct EventBus {
    queue: VecDeque<BusEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn emit(&mut self, event: BusEvent) {
        folio_trace!("bus emit {}", event.name());
        self.queue.push_back(event);
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Removes and returns every queued event without delivering it.
    pub fn drain(&mut self) -> Vec<BusEvent> {
        self.queue.drain(..).collect()
    }

    /// Delivers queued events, in order, to every subscriber. Events emitted
    /// during delivery are delivered in a following round. Returns the
    /// delivered events.
    pub fn dispatch(&mut self, subscribers: &mut [&mut dyn Subscriber]) -> Vec<BusEvent> {
        let mut delivered = Vec::new();
        for _ in 0..MAX_DISPATCH_ROUNDS {
            if self.queue.is_empty() {
                return delivered;
            }
            let round: Vec<BusEvent> = self.queue.drain(..).collect();
            for event in round {
                for subscriber in subscribers.iter_mut() {
                    subscriber.on_event(&event, self);
                }
                delivered.push(event);
            }
        }
        if !self.queue.is_empty() {
            folio_error!(
                "bus dispatch exceeded {} rounds; dropping {} events",
                MAX_DISPATCH_ROUNDS,
                self.queue.len()
            );
            self.queue.clear();
        }
        delivered
    }
}

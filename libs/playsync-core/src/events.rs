use serde::Serialize;
use tokio::sync::broadcast::{channel, Receiver, Sender};

use crate::{debug, MediaCategory};

/// Local notifications consumed by the surrounding application.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum EngineEvent {
    VideoEnded {
        id: String,
        category: MediaCategory,
    },
    /// `time` is the number of whole seconds left.
    VideoTimeUpdate {
        id: String,
        category: MediaCategory,
        time: u64,
    },
    SourceMetadataUpdate {
        id: String,
        time: u64,
        owner: String,
    },
}

/// One-to-many fan-out of engine events, emitting never blocks.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: Sender<EngineEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = channel(capacity);
        Self { tx }
    }

    pub fn emit(&self, event: EngineEvent) {
        if self.tx.send(event).is_err() {
            debug!("no subscriber for engine events");
        }
    }

    pub fn subscribe(&self) -> Receiver<EngineEvent> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

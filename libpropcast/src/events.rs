//! Progress events for publish operations
//!
//! The orchestrator and adapters emit events on an in-process broadcast bus so
//! that front ends (CLI spinners, HTTP handlers streaming progress) can follow
//! a multi-step publish without polling.
//!
//! If no subscribers exist, events are dropped without blocking. Subscribers
//! that lag lose the oldest events first.
//!
//! # Example
//!
//! ```no_run
//! use libpropcast::events::{Event, EventBus};
//!
//! # async fn example() {
//! let event_bus = EventBus::new(100);
//! let mut receiver = event_bus.subscribe();
//!
//! event_bus.emit(Event::PublishProgress {
//!     publish_id: "abc123".to_string(),
//!     step: "uploaded image 1/3".to_string(),
//! });
//!
//! if let Ok(event) = receiver.recv().await {
//!     println!("Received: {:?}", event);
//! }
//! # }
//! ```

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::error::ErrorKind;
use crate::types::{Platform, PostType};

/// Event receiver type alias
pub type EventReceiver = broadcast::Receiver<Event>;

/// Broadcast bus for publish events
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<Event>,
}

impl EventBus {
    /// Create a new event bus buffering `capacity` events per subscriber
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to events emitted after this call
    pub fn subscribe(&self) -> EventReceiver {
        self.sender.subscribe()
    }

    /// Emit an event to all subscribers (non-blocking)
    pub fn emit(&self, event: Event) {
        // Err only means nobody is listening
        let _ = self.sender.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(100)
    }
}

/// Events emitted during a publish
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Validation passed and the adapter is about to run
    PublishStarted {
        publish_id: String,
        platform: Platform,
        post_type: PostType,
        image_count: usize,
    },

    /// One protocol step finished (e.g. "created container 2/4")
    PublishProgress { publish_id: String, step: String },

    /// Remote post confirmed
    PublishCompleted {
        publish_id: String,
        remote_post_id: String,
    },

    PublishFailed {
        publish_id: String,
        kind: ErrorKind,
        message: String,
    },

    /// An aborted publish left uploaded media unpublished on the platform
    MediaOrphaned {
        publish_id: String,
        platform: Platform,
        media_ids: Vec<String>,
    },
}

impl Event {
    pub fn publish_id(&self) -> &str {
        match self {
            Event::PublishStarted { publish_id, .. }
            | Event::PublishProgress { publish_id, .. }
            | Event::PublishCompleted { publish_id, .. }
            | Event::PublishFailed { publish_id, .. }
            | Event::MediaOrphaned { publish_id, .. } => publish_id,
        }
    }
}

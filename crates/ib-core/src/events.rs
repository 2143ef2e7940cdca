//! Model lifecycle events.
//!
//! [`EventBus`] routes `save` and `delete` requests from a [`Model`] to
//! whatever handlers were registered for them, so the model never holds a
//! reference to the writer. Handlers run synchronously in registration order.
//! A bounded ring buffer of recent events is kept for inspection.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use uuid::Uuid;

use crate::error::Result;
use crate::ids::RecordId;
use crate::model::Model;

/// Maximum number of events retained in the ring buffer.
const MAX_RECENT_EVENTS: usize = 100;

// ---------------------------------------------------------------------------
// EventKind
// ---------------------------------------------------------------------------

/// What is being asked of the handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Save,
    Delete,
}

// ---------------------------------------------------------------------------
// ModelEvent / EventRecord
// ---------------------------------------------------------------------------

/// An event in flight: handlers may mutate the model.
pub struct ModelEvent<'a> {
    pub kind: EventKind,
    pub model: &'a mut Model,
}

/// A timestamped record of a published event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventRecord {
    /// Unique event identifier.
    pub id: Uuid,
    /// When the event was published.
    pub timestamp: DateTime<Utc>,
    pub kind: EventKind,
    /// Table of the model the event was about.
    pub table: String,
    /// Id of the model once all handlers ran, if it has one.
    pub record_id: Option<RecordId>,
    /// Whether every handler succeeded.
    pub ok: bool,
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// A registered handler.
pub type Handler = Box<dyn Fn(&mut ModelEvent<'_>) -> Result<()> + Send + Sync>;

/// Synchronous publish/subscribe for model events.
#[derive(Default)]
pub struct EventBus {
    handlers: RwLock<Vec<(EventKind, Handler)>>,
    recent: RwLock<VecDeque<EventRecord>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for `kind`. Handlers run in registration order.
    pub fn subscribe<F>(&self, kind: EventKind, handler: F)
    where
        F: Fn(&mut ModelEvent<'_>) -> Result<()> + Send + Sync + 'static,
    {
        self.handlers.write().push((kind, Box::new(handler)));
    }

    /// Number of handlers registered for `kind`.
    pub fn handler_count(&self, kind: EventKind) -> usize {
        self.handlers.read().iter().filter(|(k, _)| *k == kind).count()
    }

    /// Deliver `kind` for `model` to every matching handler.
    ///
    /// The first handler error stops delivery and is returned unchanged.
    pub fn publish(&self, kind: EventKind, model: &mut Model) -> Result<()> {
        let mut event = ModelEvent { kind, model };
        let result = {
            let handlers = self.handlers.read();
            handlers
                .iter()
                .filter(|(k, _)| *k == kind)
                .try_for_each(|(_, handler)| handler(&mut event))
        };

        let record = EventRecord {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            kind,
            table: event.model.table().to_string(),
            record_id: event.model.id().cloned(),
            ok: result.is_ok(),
        };
        {
            let mut recent = self.recent.write();
            if recent.len() >= MAX_RECENT_EVENTS {
                recent.pop_back();
            }
            recent.push_front(record);
        }

        if let Err(ref e) = result {
            tracing::debug!(table = %event.model.table(), ?kind, "event handler failed: {e}");
        }
        result
    }

    /// Return the `n` most recent events (newest first).
    pub fn recent_events(&self, n: usize) -> Vec<EventRecord> {
        let recent = self.recent.read();
        recent.iter().take(n).cloned().collect()
    }
}

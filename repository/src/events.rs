//! Entry change notifications.
//!
//! Events are delivered synchronously to registered handlers and pushed to
//! any number of channel subscribers. Handlers may call back into the
//! repository; no internal borrow is held while they run.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::debug;

/// Kind of entry event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryEventKind {
    /// An entry was saved.
    Modified,

    /// An entry was removed.
    Deleted,
}

/// A change to one entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EntryEvent {
    Modified { label: String },
    Deleted { label: String },
}

impl EntryEvent {
    pub fn modified(label: impl Into<String>) -> Self {
        Self::Modified {
            label: label.into(),
        }
    }

    pub fn deleted(label: impl Into<String>) -> Self {
        Self::Deleted {
            label: label.into(),
        }
    }

    pub fn kind(&self) -> EntryEventKind {
        match self {
            Self::Modified { .. } => EntryEventKind::Modified,
            Self::Deleted { .. } => EntryEventKind::Deleted,
        }
    }

    /// Display label of the affected entry.
    pub fn label(&self) -> &str {
        match self {
            Self::Modified { label } | Self::Deleted { label } => label,
        }
    }
}

/// Callback invoked for every event.
pub type EntryEventHandler = Rc<dyn Fn(&EntryEvent)>;

/// Fan-out of entry events.
#[derive(Default)]
pub struct EventBus {
    handlers: RefCell<Vec<EntryEventHandler>>,
    subscribers: RefCell<Vec<mpsc::UnboundedSender<EntryEvent>>>,
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("handlers", &self.handlers.borrow().len())
            .field("subscribers", &self.subscribers.borrow().len())
            .finish()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a synchronous handler.
    pub fn on_entry_event(&self, handler: impl Fn(&EntryEvent) + 'static) {
        self.handlers.borrow_mut().push(Rc::new(handler));
    }

    /// Open a channel that receives every later event.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<EntryEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.borrow_mut().push(tx);
        rx
    }

    /// Deliver an event to handlers, then to subscribers.
    pub fn emit(&self, event: &EntryEvent) {
        // Handlers may register further handlers while running.
        let handlers: Vec<EntryEventHandler> = self.handlers.borrow().clone();
        for handler in &handlers {
            handler(event);
        }

        let mut subscribers = self.subscribers.borrow_mut();
        let before = subscribers.len();
        subscribers.retain(|tx| tx.send(event.clone()).is_ok());
        if subscribers.len() < before {
            debug!(
                "Dropped {} closed event subscribers",
                before - subscribers.len()
            );
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.borrow().len()
    }
}

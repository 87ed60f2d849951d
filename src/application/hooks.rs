//! Content lifecycle notifications.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};

use serde::Serialize;
use tracing::debug;

use crate::cache::RecoverLock;
use crate::domain::types::ContentId;

const SOURCE: &str = "application::hooks";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "event", content = "content_id", rename_all = "snake_case")]
pub enum ContentEvent {
    NewContent(ContentId),
    UpdateContent(ContentId),
    DeleteContent(ContentId),
}

impl ContentEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::NewContent(_) => "new_content",
            Self::UpdateContent(_) => "update_content",
            Self::DeleteContent(_) => "delete_content",
        }
    }

    pub fn content_id(&self) -> ContentId {
        match self {
            Self::NewContent(id) | Self::UpdateContent(id) | Self::DeleteContent(id) => *id,
        }
    }
}

impl fmt::Display for ContentEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name(), self.content_id())
    }
}

/// Fire-and-forget sink for lifecycle events.
pub trait EventNotifier: Send + Sync {
    fn emit(&self, event: ContentEvent);
}

pub type Listener = Arc<dyn Fn(&ContentEvent) + Send + Sync>;

/// Dispatches events to listeners registered by event name.
#[derive(Default)]
pub struct HookDispatcher {
    listeners: RwLock<HashMap<&'static str, Vec<Listener>>>,
}

impl HookDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `listener` for events named `event` (`new_content`, ...).
    pub fn on<F>(&self, event: &'static str, listener: F)
    where
        F: Fn(&ContentEvent) + Send + Sync + 'static,
    {
        self.listeners.write_or_recover(SOURCE, "on")
            .entry(event)
            .or_default()
            .push(Arc::new(listener));
    }
}

impl EventNotifier for HookDispatcher {
    fn emit(&self, event: ContentEvent) {
        let listeners: Vec<Listener> = self.listeners.read_or_recover(SOURCE, "emit")
            .get(event.name())
            .cloned()
            .unwrap_or_default();

        debug!(
            event = event.name(),
            content_id = event.content_id(),
            listeners = listeners.len(),
            "dispatching content event"
        );

        for listener in listeners {
            listener(&event);
        }
    }
}

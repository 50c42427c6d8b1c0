//! Append-only display log

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Update published to presentation contexts after each append
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DisplayUpdate {
    /// A line was appended at `index`
    Appended { index: usize, line: String },
    /// The view should scroll to the element at `index`
    ScrollToLast { index: usize },
}

/// Ordered, append-only list of display lines
///
/// Owned by the bridge actor. Presentation contexts never touch the lines
/// directly; they receive [`DisplayUpdate`]s through a broadcast channel.
#[derive(Debug)]
pub struct DisplayLog {
    lines: Vec<String>,
    updates: broadcast::Sender<DisplayUpdate>,
}

impl DisplayLog {
    /// Create a log whose update channel buffers `capacity` updates per subscriber
    pub fn new(capacity: usize) -> Self {
        let (updates, _) = broadcast::channel(capacity.max(1));
        Self {
            lines: Vec::new(),
            updates,
        }
    }

    /// Append a line and notify presentation contexts
    ///
    /// Returns the index of the new line.
    pub fn append(&mut self, line: impl Into<String>) -> usize {
        let line = line.into();
        let index = self.lines.len();
        self.lines.push(line.clone());

        // No subscribers is fine
        let _ = self.updates.send(DisplayUpdate::Appended { index, line });
        let _ = self.updates.send(DisplayUpdate::ScrollToLast { index });

        index
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Subscribe to updates published after this call
    pub fn subscribe(&self) -> broadcast::Receiver<DisplayUpdate> {
        self.updates.subscribe()
    }

    /// Sender handle for contexts that subscribe later (e.g. socket clients)
    pub fn updates(&self) -> broadcast::Sender<DisplayUpdate> {
        self.updates.clone()
    }
}

impl Default for DisplayLog {
    fn default() -> Self {
        Self::new(256)
    }
}

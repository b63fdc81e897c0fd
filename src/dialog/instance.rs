//! Dialog instances and the per-conversation stack

use super::prompt::PendingPrompt;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One running dialog, addressed by its position in the stack
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DialogInstance {
    pub dialog_id: String,
    /// Serialized dialog state; decoded with the dialog's state type on each step
    pub state: Value,
    /// Step that last ran (or is about to run)
    pub step: usize,
    /// Set while the instance waits for prompt input
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending: Option<PendingPrompt>,
}

impl DialogInstance {
    #[must_use]
    pub fn new(dialog_id: impl Into<String>, state: Value) -> Self {
        Self {
            dialog_id: dialog_id.into(),
            state,
            step: 0,
            pending: None,
        }
    }

    #[must_use]
    pub fn is_waiting(&self) -> bool {
        self.pending.is_some()
    }
}

/// Call stack of active dialogs; the last element is the active one
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DialogStack {
    #[serde(default)]
    instances: Vec<DialogInstance>,
}

impl DialogStack {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn depth(&self) -> usize {
        self.instances.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    #[must_use]
    pub fn top(&self) -> Option<&DialogInstance> {
        self.instances.last()
    }

    pub fn top_mut(&mut self) -> Option<&mut DialogInstance> {
        self.instances.last_mut()
    }

    pub fn push(&mut self, instance: DialogInstance) {
        self.instances.push(instance);
    }

    pub fn pop(&mut self) -> Option<DialogInstance> {
        self.instances.pop()
    }

    /// Drop every instance, returning how many were removed
    pub fn clear(&mut self) -> usize {
        let removed = self.instances.len();
        self.instances.clear();
        removed
    }

    /// Bottom-to-top iteration
    pub fn iter(&self) -> impl Iterator<Item = &DialogInstance> {
        self.instances.iter()
    }

    /// Dialog ids from bottom to top
    #[must_use]
    pub fn dialog_ids(&self) -> Vec<&str> {
        self.instances.iter().map(|i| i.dialog_id.as_str()).collect()
    }
}

//! Error taxonomy for the dialog runtime

use crate::state::StateError;
use std::time::Duration;
use thiserror::Error;

/// Errors raised while processing a turn
#[derive(Debug, Error)]
pub enum DialogError {
    #[error("Unknown dialog: {0}")]
    UnknownDialog(String),

    #[error("Dialog id registered twice: {0}")]
    DuplicateDialog(String),

    /// A dialog definition broke the step contract. Always a programming error.
    #[error("Invalid step result in {dialog_id} step {step}: {reason}")]
    InvalidStepResult {
        dialog_id: String,
        step: usize,
        reason: String,
    },

    #[error("Classifier unavailable: {0}")]
    ClassifierUnavailable(String),

    #[error("Classification timed out after {0:?}")]
    ClassificationTimeout(Duration),

    #[error("State for dialog {dialog_id} could not be encoded or decoded: {source}")]
    StateCodec {
        dialog_id: String,
        #[source]
        source: serde_json::Error,
    },

    /// Failure reported by a step function itself
    #[error("Step failed in {dialog_id}: {message}")]
    Step { dialog_id: String, message: String },

    #[error(transparent)]
    Store(#[from] StateError),
}

impl DialogError {
    #[must_use]
    pub fn invalid_step(dialog_id: &str, step: usize, reason: impl Into<String>) -> Self {
        Self::InvalidStepResult {
            dialog_id: dialog_id.to_string(),
            step,
            reason: reason.into(),
        }
    }

    #[must_use]
    pub fn step(dialog_id: &str, message: impl Into<String>) -> Self {
        Self::Step {
            dialog_id: dialog_id.to_string(),
            message: message.into(),
        }
    }

    /// Recoverable errors degrade the turn to the fallback message instead of failing it
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::ClassifierUnavailable(_) | Self::ClassificationTimeout(_)
        )
    }
}

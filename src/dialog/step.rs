//! Waterfall step contract
//!
//! Each step returns exactly one continuation as a `StepResult` value.

use super::prompt::PromptOptions;
use crate::error::DialogError;
use crate::state::PropertyBag;
use crate::turn::{OutboundMessage, TurnContext};
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Continuation chosen by a step
#[derive(Debug, Clone, PartialEq)]
pub enum StepResult {
    /// Advance to the next step, handing it this value
    Next(Value),
    /// Send the prompt and suspend until the next turn
    Prompt(PromptOptions),
    /// Push a child dialog; its result resumes this dialog at the next step
    Begin { dialog_id: String, options: Value },
    /// End this instance and start another in its place
    Replace { dialog_id: String, options: Value },
    /// End this instance, returning a value to the parent
    Complete(Value),
    /// End this instance without a result
    Cancel,
}

impl StepResult {
    #[must_use]
    pub fn next() -> Self {
        StepResult::Next(Value::Null)
    }

    #[must_use]
    pub fn next_with(value: impl Into<Value>) -> Self {
        StepResult::Next(value.into())
    }

    #[must_use]
    pub fn prompt(options: PromptOptions) -> Self {
        StepResult::Prompt(options)
    }

    #[must_use]
    pub fn begin(dialog_id: impl Into<String>, options: impl Into<Value>) -> Self {
        StepResult::Begin {
            dialog_id: dialog_id.into(),
            options: options.into(),
        }
    }

    #[must_use]
    pub fn replace(dialog_id: impl Into<String>, options: impl Into<Value>) -> Self {
        StepResult::Replace {
            dialog_id: dialog_id.into(),
            options: options.into(),
        }
    }

    #[must_use]
    pub fn complete() -> Self {
        StepResult::Complete(Value::Null)
    }

    #[must_use]
    pub fn complete_with(value: impl Into<Value>) -> Self {
        StepResult::Complete(value.into())
    }

    #[must_use]
    pub fn cancel() -> Self {
        StepResult::Cancel
    }

    /// Short name for logging
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            StepResult::Next(_) => "next",
            StepResult::Prompt(_) => "prompt",
            StepResult::Begin { .. } => "begin",
            StepResult::Replace { .. } => "replace",
            StepResult::Complete(_) => "complete",
            StepResult::Cancel => "cancel",
        }
    }
}

/// What a step sees while it runs
pub struct StepContext<'a, S> {
    /// Typed instance state, written back after the step returns
    pub state: &'a mut S,
    input: Value,
    turn: &'a mut TurnContext,
    dialog_id: &'a str,
    index: usize,
}

impl<'a, S> StepContext<'a, S> {
    pub(crate) fn new(
        state: &'a mut S,
        input: Value,
        turn: &'a mut TurnContext,
        dialog_id: &'a str,
        index: usize,
    ) -> Self {
        Self {
            state,
            input,
            turn,
            dialog_id,
            index,
        }
    }

    /// Initiating options on step 0, otherwise the previous step's result
    #[must_use]
    pub fn input(&self) -> &Value {
        &self.input
    }

    #[must_use]
    pub fn input_str(&self) -> Option<&str> {
        self.input.as_str()
    }

    /// Decode the input into a concrete type
    ///
    /// # Errors
    ///
    /// `Step` when the input does not decode into `T`.
    pub fn input_as<T: DeserializeOwned>(&self) -> Result<T, DialogError> {
        serde_json::from_value(self.input.clone()).map_err(|e| {
            DialogError::step(self.dialog_id, format!("unexpected step input: {e}"))
        })
    }

    #[must_use]
    pub fn dialog_id(&self) -> &str {
        self.dialog_id
    }

    #[must_use]
    pub fn step_index(&self) -> usize {
        self.index
    }

    pub fn send(&mut self, message: impl Into<OutboundMessage>) {
        self.turn.send(message);
    }

    #[must_use]
    pub fn turn(&self) -> &TurnContext {
        &*self.turn
    }

    pub fn turn_mut(&mut self) -> &mut TurnContext {
        &mut *self.turn
    }

    pub fn user_state(&mut self) -> &mut PropertyBag {
        self.turn.user_state_mut()
    }

    pub fn conversation_state(&mut self) -> &mut PropertyBag {
        self.turn.conversation_state_mut()
    }
}

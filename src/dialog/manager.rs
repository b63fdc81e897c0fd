//! Dialog stack manager and waterfall executor
//!
//! Drives the top of a `DialogStack` until it suspends on a prompt or the
//! stack empties. Nested completions resume their parent within the same
//! turn; only prompts end a turn early.

use super::definition::DialogSet;
use super::instance::{DialogInstance, DialogStack};
use super::prompt::{PendingPrompt, PromptInput};
use super::step::StepResult;
use crate::error::DialogError;
use crate::turn::TurnContext;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Upper bound on step transitions in one turn. A dialog that keeps
/// replacing itself without prompting trips this.
pub const MAX_TRANSITIONS_PER_TURN: usize = 256;

/// Outcome of a stack operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DialogTurnStatus {
    /// No dialog was active
    Empty,
    /// The active dialog is waiting on a prompt
    Waiting,
    /// The root dialog finished and the stack is empty
    Complete,
    /// The stack was cancelled or the root dialog cancelled itself
    Cancelled,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DialogTurnResult {
    pub status: DialogTurnStatus,
    /// Result of the completed root dialog
    pub result: Option<Value>,
}

impl DialogTurnResult {
    #[must_use]
    pub fn empty() -> Self {
        Self {
            status: DialogTurnStatus::Empty,
            result: None,
        }
    }

    #[must_use]
    pub fn waiting() -> Self {
        Self {
            status: DialogTurnStatus::Waiting,
            result: None,
        }
    }

    #[must_use]
    pub fn complete(result: Value) -> Self {
        Self {
            status: DialogTurnStatus::Complete,
            result: Some(result),
        }
    }

    #[must_use]
    pub fn cancelled() -> Self {
        Self {
            status: DialogTurnStatus::Cancelled,
            result: None,
        }
    }
}

/// Stack operations for one conversation during one turn
pub struct DialogContext<'a> {
    dialogs: &'a DialogSet,
    stack: &'a mut DialogStack,
    turn: &'a mut TurnContext,
}

impl<'a> DialogContext<'a> {
    #[must_use]
    pub fn new(dialogs: &'a DialogSet, stack: &'a mut DialogStack, turn: &'a mut TurnContext) -> Self {
        Self {
            dialogs,
            stack,
            turn,
        }
    }

    #[must_use]
    pub fn stack(&self) -> &DialogStack {
        &*self.stack
    }

    #[must_use]
    pub fn turn(&self) -> &TurnContext {
        &*self.turn
    }

    pub fn turn_mut(&mut self) -> &mut TurnContext {
        &mut *self.turn
    }

    /// Push a new instance of `dialog_id` and run its first step with `options`
    ///
    /// # Errors
    ///
    /// Fails with `UnknownDialog` for an unregistered id, and with any error
    /// raised while running the new instance's steps.
    pub fn begin(&mut self, dialog_id: &str, options: Value) -> Result<DialogTurnResult, DialogError> {
        self.push_instance(dialog_id)?;
        self.run(options)
    }

    /// Deliver this turn's input to the waiting top instance
    ///
    /// # Errors
    ///
    /// `InvalidStepResult` when the top instance has no outstanding prompt or
    /// its prompt is not registered, plus any error from the resumed steps.
    pub fn continue_dialog(&mut self) -> Result<DialogTurnResult, DialogError> {
        let dialogs = self.dialogs;
        let Some(top) = self.stack.top_mut() else {
            return Ok(DialogTurnResult::empty());
        };
        let dialog = dialogs.find(&top.dialog_id)?;

        let Some(pending) = top.pending.as_mut() else {
            return Err(DialogError::invalid_step(
                &top.dialog_id,
                top.step,
                "resumed without an outstanding prompt",
            ));
        };
        let config = dialog
            .prompt_config(&pending.options.prompt_id)
            .ok_or_else(|| {
                DialogError::invalid_step(
                    &top.dialog_id,
                    top.step,
                    format!("prompt `{}` is not registered", pending.options.prompt_id),
                )
            })?;

        let input = PromptInput::from_activity(self.turn.activity(), pending.attempts);
        let verdict = config.validate(&input);

        if !verdict.valid {
            pending.attempts += 1;
            tracing::debug!(
                dialog_id = %top.dialog_id,
                step = top.step,
                attempts = pending.attempts,
                "Prompt input rejected, re-prompting"
            );
            let retry = verdict
                .retry
                .unwrap_or_else(|| pending.options.retry_message().clone());
            self.turn.send(retry);
            return Ok(DialogTurnResult::waiting());
        }

        top.pending = None;
        top.step += 1;
        self.run(verdict.value)
    }

    /// End the top instance and begin `dialog_id` in its place
    ///
    /// # Errors
    ///
    /// Fails with `UnknownDialog` before touching the stack, or with any error
    /// raised by the new instance's steps.
    pub fn replace(&mut self, dialog_id: &str, options: Value) -> Result<DialogTurnResult, DialogError> {
        // Resolve first so a bad id leaves the stack untouched
        self.dialogs.find(dialog_id)?;
        if let Some(replaced) = self.stack.pop() {
            tracing::debug!(from = %replaced.dialog_id, to = %dialog_id, "Replacing dialog");
        }
        self.begin(dialog_id, options)
    }

    /// Pop the top instance; a parent underneath resumes with `result`
    ///
    /// # Errors
    ///
    /// Any error raised while the parent resumes.
    pub fn end_dialog(&mut self, result: Value) -> Result<DialogTurnResult, DialogError> {
        let Some(ended) = self.stack.pop() else {
            return Ok(DialogTurnResult::empty());
        };
        tracing::debug!(dialog_id = %ended.dialog_id, "Ended dialog");
        if self.advance_parent() {
            self.run(result)
        } else {
            Ok(DialogTurnResult::complete(result))
        }
    }

    /// Clear the whole stack. Safe on an empty stack.
    pub fn cancel_all(&mut self) -> DialogTurnResult {
        let removed = self.stack.clear();
        if removed == 0 {
            DialogTurnResult::empty()
        } else {
            tracing::info!(removed, "Cancelled all dialogs");
            DialogTurnResult::cancelled()
        }
    }

    fn push_instance(&mut self, dialog_id: &str) -> Result<(), DialogError> {
        let dialog = self.dialogs.find(dialog_id)?;
        let state = dialog.initial_state()?;
        self.stack.push(DialogInstance::new(dialog_id, state));
        tracing::info!(dialog_id = %dialog_id, depth = self.stack.depth(), "Began dialog");
        Ok(())
    }

    /// Move the new top past the step that started its finished child
    fn advance_parent(&mut self) -> bool {
        match self.stack.top_mut() {
            Some(parent) => {
                parent.step += 1;
                true
            }
            None => false,
        }
    }

    /// Run steps from the top instance until something suspends or the stack empties
    fn run(&mut self, mut input: Value) -> Result<DialogTurnResult, DialogError> {
        let dialogs = self.dialogs;

        for _ in 0..MAX_TRANSITIONS_PER_TURN {
            let Some(top) = self.stack.top_mut() else {
                return Ok(DialogTurnResult::empty());
            };
            let dialog = dialogs.find(&top.dialog_id)?;

            let outcome = if top.step == dialog.step_count() {
                // Last step finished with Next
                StepResult::Complete(input)
            } else {
                dialog.run_step(top.step, &mut top.state, input, &mut *self.turn)?
            };

            tracing::debug!(
                dialog_id = %top.dialog_id,
                step = top.step,
                result = outcome.kind(),
                "Step finished"
            );

            match outcome {
                StepResult::Next(value) => {
                    top.step += 1;
                    input = value;
                }
                StepResult::Prompt(options) => {
                    if dialog.prompt_config(&options.prompt_id).is_none() {
                        return Err(DialogError::invalid_step(
                            &top.dialog_id,
                            top.step,
                            format!("prompt `{}` is not registered", options.prompt_id),
                        ));
                    }
                    self.turn.send(options.prompt.clone());
                    top.pending = Some(PendingPrompt::new(options));
                    return Ok(DialogTurnResult::waiting());
                }
                StepResult::Begin { dialog_id, options } => {
                    self.push_instance(&dialog_id)?;
                    input = options;
                }
                StepResult::Replace { dialog_id, options } => {
                    self.dialogs.find(&dialog_id)?;
                    self.stack.pop();
                    self.push_instance(&dialog_id)?;
                    input = options;
                }
                StepResult::Complete(value) => {
                    if let Some(done) = self.stack.pop() {
                        tracing::info!(dialog_id = %done.dialog_id, "Dialog complete");
                    }
                    if !self.advance_parent() {
                        return Ok(DialogTurnResult::complete(value));
                    }
                    input = value;
                }
                StepResult::Cancel => {
                    if let Some(done) = self.stack.pop() {
                        tracing::info!(dialog_id = %done.dialog_id, "Dialog cancelled");
                    }
                    if !self.advance_parent() {
                        return Ok(DialogTurnResult::cancelled());
                    }
                    input = Value::Null;
                }
            }
        }

        let (dialog_id, step) = self
            .stack
            .top()
            .map_or(("<empty>", 0), |top| (top.dialog_id.as_str(), top.step));
        Err(DialogError::invalid_step(
            dialog_id,
            step,
            format!("no suspension after {MAX_TRANSITIONS_PER_TURN} transitions"),
        ))
    }
}

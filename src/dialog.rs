//! Dialog engine
//!
//! Waterfall dialogs with typed per-instance state, a persistent stack of
//! running instances, and validated prompts that suspend across turns.

mod definition;
mod instance;
mod manager;
pub mod prompt;
mod step;

#[cfg(test)]
mod proptests;

pub use definition::{Dialog, DialogDefinition, DialogSet};
pub use instance::{DialogInstance, DialogStack};
pub use manager::{DialogContext, DialogTurnResult, DialogTurnStatus, MAX_TRANSITIONS_PER_TURN};
pub use prompt::{
    exact_match, validator, PromptConfig, PromptInput, PromptOptions, Validation, Validator,
};
pub use step::{StepContext, StepResult};

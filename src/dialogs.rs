//! Built-in dialogs
//!
//! The question dialogs the router targets by default, a scratch dialog
//! for the fixed routing policy, and an echo dialog used as a nested child.

mod echo;
mod questions;
mod scratch;

pub use echo::child_dialog;
pub use questions::{angry_questions, nice_questions, AngryState};
pub use scratch::scratch_dialog;

use crate::dialog::DialogSet;
use crate::error::DialogError;
use serde::{Deserialize, Serialize};

pub const NICE_QUESTIONS: &str = "NiceQuestions";
pub const ANGRY_QUESTIONS: &str = "AngryQuestions";
pub const SCRATCH_DIALOG: &str = "ScratchDialog";
pub const CHILD_DIALOG: &str = "ChildDialog";

/// User property shared by the question dialogs
pub const QUESTIONS_STATE_PROPERTY: &str = "QuestionsState";

/// Per-user record of the topic that started the last question dialog
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionsState {
    #[serde(default)]
    pub original_intent: Option<String>,
}

/// Registry with every built-in dialog
pub fn builtin_dialogs() -> Result<DialogSet, DialogError> {
    DialogSet::new()
        .with(nice_questions())?
        .with(angry_questions())?
        .with(scratch_dialog())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_set_registers_children_and_properties() {
        let dialogs = builtin_dialogs().unwrap();
        assert_eq!(
            dialogs.ids(),
            vec![ANGRY_QUESTIONS, CHILD_DIALOG, NICE_QUESTIONS, SCRATCH_DIALOG]
        );
        assert_eq!(
            dialogs.user_properties().collect::<Vec<_>>(),
            vec![QUESTIONS_STATE_PROPERTY]
        );
    }
}

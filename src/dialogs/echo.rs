//! Echo dialog used as a nested child

use crate::dialog::{DialogDefinition, PromptConfig, PromptOptions, StepResult};

const TEXT_PROMPT: &str = "AskForText";

/// Greets, echoes one message, and completes with the echoed text
#[must_use]
pub fn child_dialog(id: &str) -> DialogDefinition<()> {
    DialogDefinition::<()>::new(id)
        .prompt(TEXT_PROMPT, PromptConfig::text())
        .step(|ctx| {
            let greeting = format!("Hi from {}", ctx.dialog_id());
            ctx.send(greeting);
            Ok(StepResult::prompt(PromptOptions::new(TEXT_PROMPT, "I'll echo what you type")))
        })
        .step(|ctx| {
            let echoed = ctx.input_str().unwrap_or_default().to_owned();
            let reply = format!("Echo from {}: {echoed}", ctx.dialog_id());
            ctx.send(reply);
            Ok(StepResult::complete_with(echoed))
        })
}

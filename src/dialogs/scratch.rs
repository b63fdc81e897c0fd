//! Scratch dialog
//!
//! Loops on a direction-or-colour prompt until the user says `quit`.
//! `child` runs the echo dialog nested underneath it.

use super::{child_dialog, QuestionsState, CHILD_DIALOG, QUESTIONS_STATE_PROPERTY, SCRATCH_DIALOG};
use crate::dialog::{DialogDefinition, PromptConfig, PromptOptions, StepResult, Validation};
use crate::turn::OutboundMessage;
use chrono::{Local, Timelike};
use serde_json::Value;

const TEXT_PROMPT: &str = "AskForText";

/// Free text, or a card/postback payload when no text came with it
fn text_or_payload() -> PromptConfig {
    PromptConfig::validated(|input| {
        Ok(match input.value {
            Some(value) if input.text.trim().is_empty() => Validation::accept(value.clone()),
            _ => Validation::accept(input.text),
        })
    })
}

#[must_use]
pub fn scratch_dialog() -> DialogDefinition<()> {
    DialogDefinition::<()>::new(SCRATCH_DIALOG)
        .uses_user_property(QUESTIONS_STATE_PROPERTY)
        .prompt(TEXT_PROMPT, text_or_payload())
        .child(child_dialog(CHILD_DIALOG))
        .step(|ctx| {
            if let Some(intent) = ctx.input_str().map(str::to_owned) {
                let profile = ctx.user_state();
                let mut questions: QuestionsState = profile.get_or_default(QUESTIONS_STATE_PROPERTY)?;
                questions.original_intent = Some(intent);
                profile.set(QUESTIONS_STATE_PROPERTY, &questions)?;
            }
            Ok(StepResult::next())
        })
        .step(|_| {
            let second = Local::now().second();
            let prompt = OutboundMessage::text("Please enter a direction or color")
                .with_suggestions([format!("North {second}"), "South".to_string()]);
            Ok(StepResult::prompt(PromptOptions::new(TEXT_PROMPT, prompt)))
        })
        .step(|ctx| {
            let said = match ctx.input() {
                Value::String(text) => text.clone(),
                Value::Null => String::new(),
                other => other.to_string(),
            };
            match said.as_str() {
                "" => Ok(StepResult::complete()),
                "quit" => {
                    ctx.send("finished");
                    Ok(StepResult::complete())
                }
                "child" => Ok(StepResult::begin(CHILD_DIALOG, Value::Null)),
                _ => {
                    ctx.send(format!("you said {said}, looping... "));
                    Ok(StepResult::replace(SCRATCH_DIALOG, Value::Null))
                }
            }
        })
        // Back from the echo child
        .step(|_| Ok(StepResult::replace(SCRATCH_DIALOG, Value::Null)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialog::{DialogSet, DialogTurnStatus};
    use crate::testing::DialogHarness;
    use crate::turn::Activity;
    use serde_json::json;

    fn harness() -> DialogHarness {
        DialogHarness::new(DialogSet::new().with(scratch_dialog()).unwrap())
    }

    #[test]
    fn loops_until_quit() {
        let mut h = harness();
        let (result, replies) = h.begin(SCRATCH_DIALOG, Value::Null);
        assert_eq!(result.status, DialogTurnStatus::Waiting);
        assert_eq!(replies, vec!["Please enter a direction or color"]);
        let suggestions = &h.last_replies()[0].suggestions;
        assert!(suggestions[0].starts_with("North "));
        assert_eq!(suggestions[1], "South");

        let (result, replies) = h.say("Blue");
        assert_eq!(result.status, DialogTurnStatus::Waiting);
        assert_eq!(
            replies,
            vec!["you said Blue, looping... ", "Please enter a direction or color"]
        );
        assert_eq!(h.stack.depth(), 1);

        let (result, replies) = h.say("quit");
        assert_eq!(result.status, DialogTurnStatus::Complete);
        assert_eq!(replies, vec!["finished"]);
    }

    #[test]
    fn child_runs_nested_then_scratch_resumes() {
        let mut h = harness();
        h.begin(SCRATCH_DIALOG, Value::Null);

        let (_, replies) = h.say("child");
        assert_eq!(replies, vec!["Hi from ChildDialog", "I'll echo what you type"]);
        assert_eq!(h.stack.dialog_ids(), vec![SCRATCH_DIALOG, CHILD_DIALOG]);

        let (result, replies) = h.say("hello");
        assert_eq!(result.status, DialogTurnStatus::Waiting);
        assert_eq!(
            replies,
            vec!["Echo from ChildDialog: hello", "Please enter a direction or color"]
        );
        assert_eq!(h.stack.dialog_ids(), vec![SCRATCH_DIALOG]);
    }

    #[test]
    fn card_payload_counts_as_input() {
        let mut h = harness();
        h.begin(SCRATCH_DIALOG, Value::Null);

        let activity = Activity::message("conv", "user", "").with_value(json!({"color": "red"}));
        let (result, replies) = h.send(activity);
        assert_eq!(result.status, DialogTurnStatus::Waiting);
        assert_eq!(replies[0], r#"you said {"color":"red"}, looping... "#);
    }

    #[test]
    fn options_are_recorded_in_the_user_profile() {
        let mut h = harness();
        h.begin(SCRATCH_DIALOG, json!("Defence"));
        let questions: QuestionsState = h
            .user_state()
            .get_or_default(QUESTIONS_STATE_PROPERTY)
            .unwrap();
        assert_eq!(questions.original_intent.as_deref(), Some("Defence"));
    }
}

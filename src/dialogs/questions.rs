//! Question dialogs started by intent routing
//!
//! `NiceQuestions` keeps the topic in the user profile and asks a validated
//! yes/no question. `AngryQuestions` keeps the topic in its own instance
//! state and takes any answer.

use super::{QuestionsState, ANGRY_QUESTIONS, NICE_QUESTIONS, QUESTIONS_STATE_PROPERTY};
use crate::dialog::{
    exact_match, validator, DialogDefinition, PromptConfig, PromptOptions, StepResult,
    Validation, Validator,
};
use crate::turn::OutboundMessage;
use chrono::{DateTime, Local};
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

const YES_NO_PROMPT: &str = "YesNoPrompt";
const TEXT_PROMPT: &str = "AskForText";

const EXPAND_QUESTION: &str = "Shall I expand on that?";
const RETRY_PREFIXES: [&str; 3] = [
    "Sorry I didn't understand that response. ",
    "Can you try again? ",
    "What? ",
];

fn yes_no_message(text: impl Into<String>) -> OutboundMessage {
    OutboundMessage::text(text).with_suggestions(["yes", "no"])
}

fn retry_message(prefix: &str) -> OutboundMessage {
    yes_no_message(format!("{prefix}{EXPAND_QUESTION} (yes or no)"))
}

/// Exact yes/no match with a randomly worded retry
fn yes_no_validator() -> Validator {
    let choices = exact_match(["yes", "no"]);
    validator(move |input| {
        let verdict = choices(input)?;
        if verdict.valid {
            return Ok(verdict);
        }
        let prefix = RETRY_PREFIXES
            .choose(&mut rand::thread_rng())
            .copied()
            .unwrap_or_default();
        Ok(Validation::reject_with_retry(retry_message(prefix)))
    })
}

#[must_use]
pub fn nice_questions() -> DialogDefinition<()> {
    DialogDefinition::<()>::new(NICE_QUESTIONS)
        .uses_user_property(QUESTIONS_STATE_PROPERTY)
        .prompt(YES_NO_PROMPT, PromptConfig::with_validator(yes_no_validator()))
        .step(|ctx| {
            if let Some(intent) = ctx.input_str().map(str::to_owned) {
                let profile = ctx.user_state();
                let mut questions: QuestionsState = profile.get_or_default(QUESTIONS_STATE_PROPERTY)?;
                questions.original_intent = Some(intent);
                profile.set(QUESTIONS_STATE_PROPERTY, &questions)?;
            }
            Ok(StepResult::next())
        })
        .step(|ctx| {
            let questions: QuestionsState =
                ctx.user_state().get_or_default(QUESTIONS_STATE_PROPERTY)?;
            let topic = questions.original_intent.unwrap_or_default();
            ctx.send(format!("Thanks for asking about {topic} "));
            Ok(StepResult::next())
        })
        .step(|_| {
            Ok(StepResult::prompt(
                PromptOptions::new(YES_NO_PROMPT, yes_no_message(EXPAND_QUESTION))
                    .with_retry(retry_message(RETRY_PREFIXES[0])),
            ))
        })
        .step(|ctx| {
            let answer = ctx.input_str().unwrap_or_default().to_owned();
            if answer.eq_ignore_ascii_case("yes") {
                ctx.send("Thanks, I will");
                return Ok(StepResult::replace(NICE_QUESTIONS, serde_json::Value::Null));
            }
            if !answer.is_empty() {
                ctx.send("oh well...");
            }
            Ok(StepResult::complete())
        })
}

/// Instance state of `AngryQuestions`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AngryState {
    pub intent: Option<String>,
    /// When the follow-up question was last asked
    pub time_answered: Option<DateTime<Local>>,
}

#[must_use]
pub fn angry_questions() -> DialogDefinition<AngryState> {
    DialogDefinition::<AngryState>::new(ANGRY_QUESTIONS)
        .prompt(TEXT_PROMPT, PromptConfig::text())
        .step(|ctx| {
            if let Some(intent) = ctx.input_str().map(str::to_owned) {
                ctx.state.intent = Some(intent);
            }
            Ok(StepResult::next())
        })
        .step(|ctx| {
            let topic = ctx.state.intent.clone().unwrap_or_default();
            ctx.send(format!("I'm glad you asked me about {topic} "));
            Ok(StepResult::next())
        })
        .step(|ctx| {
            ctx.state.time_answered = Some(Local::now());
            Ok(StepResult::prompt(PromptOptions::new(
                TEXT_PROMPT,
                "Will you allow me to expand on that?",
            )))
        })
        .step(|ctx| {
            let asked = ctx
                .state
                .time_answered
                .map(|t| t.format("%d/%m/%Y %H:%M:%S").to_string())
                .unwrap_or_default();
            ctx.send(format!("Last time changed {asked}"));

            let answer = ctx.input_str().unwrap_or_default().to_owned();
            if answer == "yes" {
                ctx.send("Good, it's important to clarify this");
                // A fresh instance starts empty, so hand the topic over
                return Ok(StepResult::replace(ANGRY_QUESTIONS, ctx.state.intent.clone()));
            }
            if !answer.is_empty() {
                ctx.send("Let me just say, with our policies we will be strong and stable");
            }
            Ok(StepResult::complete())
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialog::{DialogSet, DialogTurnStatus};
    use crate::testing::DialogHarness;
    use serde_json::json;

    fn harness() -> DialogHarness {
        let dialogs = DialogSet::new()
            .with(nice_questions())
            .unwrap()
            .with(angry_questions())
            .unwrap();
        DialogHarness::new(dialogs)
    }

    #[test]
    fn nice_questions_records_topic_and_asks() {
        let mut h = harness();
        let (result, replies) = h.begin(NICE_QUESTIONS, json!("Health"));

        assert_eq!(result.status, DialogTurnStatus::Waiting);
        assert_eq!(replies, vec!["Thanks for asking about Health ", EXPAND_QUESTION]);
        let questions: QuestionsState = h
            .user_state()
            .get_or_default(QUESTIONS_STATE_PROPERTY)
            .unwrap();
        assert_eq!(questions.original_intent.as_deref(), Some("Health"));
        assert_eq!(h.last_replies()[1].suggestions, vec!["yes", "no"]);
    }

    #[test]
    fn nice_questions_yes_loops_with_stored_topic() {
        let mut h = harness();
        h.begin(NICE_QUESTIONS, json!("Power"));

        let (result, replies) = h.say("YES");
        assert_eq!(result.status, DialogTurnStatus::Waiting);
        assert_eq!(
            replies,
            vec!["Thanks, I will", "Thanks for asking about Power ", EXPAND_QUESTION]
        );
        assert_eq!(h.stack.depth(), 1);

        let (result, replies) = h.say("no");
        assert_eq!(result.status, DialogTurnStatus::Complete);
        assert_eq!(replies, vec!["oh well..."]);
        assert!(h.stack.is_empty());
    }

    #[test]
    fn nice_questions_retries_with_varied_wording() {
        let mut h = harness();
        h.begin(NICE_QUESTIONS, json!("Defence"));

        for _ in 0..5 {
            let (result, replies) = h.say("maybe");
            assert_eq!(result.status, DialogTurnStatus::Waiting);
            assert_eq!(replies.len(), 1);
            assert!(
                RETRY_PREFIXES.iter().any(|p| replies[0] == format!("{p}{EXPAND_QUESTION} (yes or no)")),
                "unexpected retry: {}",
                replies[0]
            );
        }
        assert_eq!(h.stack.top().unwrap().step, 2);
    }

    #[test]
    fn angry_questions_keeps_topic_in_instance_state() {
        let mut h = harness();
        let (result, replies) = h.begin(ANGRY_QUESTIONS, json!("Health"));
        assert_eq!(result.status, DialogTurnStatus::Waiting);
        assert_eq!(
            replies,
            vec!["I'm glad you asked me about Health ", "Will you allow me to expand on that?"]
        );

        let state: AngryState = serde_json::from_value(h.stack.top().unwrap().state.clone()).unwrap();
        assert_eq!(state.intent.as_deref(), Some("Health"));
        assert!(state.time_answered.is_some());
        // Nothing leaks into the user profile
        assert!(h.user_state().get_raw(QUESTIONS_STATE_PROPERTY).is_none());
    }

    #[test]
    fn angry_questions_yes_loops_and_anything_else_ends() {
        let mut h = harness();
        h.begin(ANGRY_QUESTIONS, json!("Defence"));

        let (result, replies) = h.say("yes");
        assert_eq!(result.status, DialogTurnStatus::Waiting);
        assert!(replies[0].starts_with("Last time changed "));
        assert_eq!(replies[1], "Good, it's important to clarify this");
        assert_eq!(replies[2], "I'm glad you asked me about Defence ");

        let (result, replies) = h.say("not really");
        assert_eq!(result.status, DialogTurnStatus::Complete);
        assert_eq!(
            replies[1],
            "Let me just say, with our policies we will be strong and stable"
        );
    }
}

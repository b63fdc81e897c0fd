//! Property-based tests for the dialog stack
//!
//! These tests verify stack invariants across generated dialogs and inputs.

use super::*;
use crate::error::DialogError;
use crate::turn::{Activity, TurnContext};
use proptest::prelude::*;
use serde_json::{json, Value};

// ============================================================================
// Test Helpers
// ============================================================================

/// Dialog that asks `prompts` free-text questions and then completes
fn questionnaire(prompts: usize) -> DialogDefinition<Vec<String>> {
    let mut dialog = DialogDefinition::<Vec<String>>::new("questionnaire")
        .prompt("text", PromptConfig::text());
    for i in 0..prompts {
        dialog = dialog.step(move |ctx| {
            if i > 0 {
                let answer = ctx.input_str().unwrap_or_default().to_string();
                ctx.state.push(answer);
            }
            Ok(StepResult::prompt(PromptOptions::new("text", format!("Question {i}"))))
        });
    }
    dialog.step(|ctx| {
        let answer = ctx.input_str().unwrap_or_default().to_string();
        ctx.state.push(answer);
        Ok(StepResult::complete_with(ctx.state.clone()))
    })
}

fn yes_no() -> DialogDefinition<()> {
    DialogDefinition::<()>::new("yes_no")
        .prompt("YesNoPrompt", PromptConfig::with_validator(exact_match(["yes", "no"])))
        .step(|_| Ok(StepResult::prompt(PromptOptions::new("YesNoPrompt", "yes or no?"))))
        .step(|ctx| Ok(StepResult::complete_with(ctx.input().clone())))
}

fn looping() -> DialogDefinition<()> {
    DialogDefinition::<()>::new("loop")
        .prompt("text", PromptConfig::text())
        .step(|_| Ok(StepResult::prompt(PromptOptions::new("text", "again?"))))
        .step(|_| Ok(StepResult::replace("loop", Value::Null)))
}

fn run<F>(dialogs: &DialogSet, stack: &mut DialogStack, text: &str, op: F) -> Result<DialogTurnResult, DialogError>
where
    F: FnOnce(&mut DialogContext<'_>) -> Result<DialogTurnResult, DialogError>,
{
    let mut turn = TurnContext::new(Activity::message("conv", "user", text));
    let mut dc = DialogContext::new(dialogs, stack, &mut turn);
    op(&mut dc)
}

/// Stack of `depth` waiting loop instances
fn waiting_stack(dialogs: &DialogSet, depth: usize) -> DialogStack {
    let mut stack = DialogStack::new();
    for _ in 0..depth {
        let result = run(dialogs, &mut stack, "", |dc| dc.begin("loop", Value::Null));
        assert_eq!(result.unwrap().status, DialogTurnStatus::Waiting);
    }
    stack
}

// ============================================================================
// Arbitrary Generators
// ============================================================================

fn arb_answer() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 ]{0,20}"
}

fn arb_not_yes_no() -> impl Strategy<Value = String> {
    "[a-zA-Z ]{0,12}".prop_filter("must not be a valid answer", |s| {
        let t = s.trim();
        !t.eq_ignore_ascii_case("yes") && !t.eq_ignore_ascii_case("no")
    })
}

// ============================================================================
// Property Tests
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    // Begin plus one valid answer per prompt empties the stack
    #[test]
    fn prop_answering_every_prompt_empties_stack(
        answers in proptest::collection::vec(arb_answer(), 1..8)
    ) {
        let dialogs = DialogSet::new().with(questionnaire(answers.len())).unwrap();
        let mut stack = DialogStack::new();

        let started = run(&dialogs, &mut stack, "", |dc| dc.begin("questionnaire", Value::Null)).unwrap();
        prop_assert_eq!(started.status, DialogTurnStatus::Waiting);

        let mut last = started;
        for answer in &answers {
            prop_assert_eq!(stack.depth(), 1);
            last = run(&dialogs, &mut stack, answer, |dc| dc.continue_dialog()).unwrap();
        }

        prop_assert!(stack.is_empty());
        prop_assert_eq!(last, DialogTurnResult::complete(json!(answers)));
    }

    // Invalid input never advances the step index, however many times it arrives
    #[test]
    fn prop_invalid_input_never_advances(
        inputs in proptest::collection::vec(arb_not_yes_no(), 1..30)
    ) {
        let dialogs = DialogSet::new().with(yes_no()).unwrap();
        let mut stack = DialogStack::new();
        run(&dialogs, &mut stack, "", |dc| dc.begin("yes_no", Value::Null)).unwrap();

        for (i, input) in inputs.iter().enumerate() {
            let result = run(&dialogs, &mut stack, input, |dc| dc.continue_dialog()).unwrap();
            prop_assert_eq!(result.status, DialogTurnStatus::Waiting);
            let top = stack.top().unwrap();
            prop_assert_eq!(top.step, 0);
            prop_assert_eq!(top.pending.as_ref().unwrap().attempts as usize, i + 1);
        }

        let done = run(&dialogs, &mut stack, "yes", |dc| dc.continue_dialog()).unwrap();
        prop_assert_eq!(done, DialogTurnResult::complete(json!("yes")));
    }

    // Replace leaves depth unchanged
    #[test]
    fn prop_replace_preserves_depth(depth in 1usize..6, turns in 1usize..5) {
        let dialogs = DialogSet::new().with(looping()).unwrap();
        let mut stack = waiting_stack(&dialogs, depth);

        for _ in 0..turns {
            run(&dialogs, &mut stack, "", |dc| dc.replace("loop", Value::Null)).unwrap();
            prop_assert_eq!(stack.depth(), depth);

            // The step-driven replace behaves the same
            run(&dialogs, &mut stack, "go", |dc| dc.continue_dialog()).unwrap();
            prop_assert_eq!(stack.depth(), depth);
        }
    }

    // CancelAll always empties the stack and is idempotent
    #[test]
    fn prop_cancel_all_idempotent(depth in 0usize..6) {
        let dialogs = DialogSet::new().with(looping()).unwrap();
        let mut stack = waiting_stack(&dialogs, depth);

        let first = run(&dialogs, &mut stack, "", |dc| Ok(dc.cancel_all())).unwrap();
        prop_assert!(stack.is_empty());
        let expected = if depth == 0 { DialogTurnStatus::Empty } else { DialogTurnStatus::Cancelled };
        prop_assert_eq!(first.status, expected);

        let after_once = stack.clone();
        let second = run(&dialogs, &mut stack, "", |dc| Ok(dc.cancel_all())).unwrap();
        prop_assert_eq!(second.status, DialogTurnStatus::Empty);
        prop_assert_eq!(stack, after_once);
    }

    // A persisted stack resumes exactly where it left off
    #[test]
    fn prop_stack_survives_serialization(
        answers in proptest::collection::vec(arb_answer(), 2..6),
        split in 0usize..6
    ) {
        let dialogs = DialogSet::new().with(questionnaire(answers.len())).unwrap();
        let mut stack = DialogStack::new();
        run(&dialogs, &mut stack, "", |dc| dc.begin("questionnaire", Value::Null)).unwrap();

        let split = split.min(answers.len() - 1);
        for answer in &answers[..split] {
            run(&dialogs, &mut stack, answer, |dc| dc.continue_dialog()).unwrap();
        }

        let persisted = serde_json::to_value(&stack).unwrap();
        let mut stack: DialogStack = serde_json::from_value(persisted).unwrap();

        let mut last = None;
        for answer in &answers[split..] {
            last = Some(run(&dialogs, &mut stack, answer, |dc| dc.continue_dialog()).unwrap());
        }
        prop_assert!(stack.is_empty());
        prop_assert_eq!(last, Some(DialogTurnResult::complete(json!(answers))));
    }
}

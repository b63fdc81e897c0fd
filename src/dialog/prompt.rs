//! Prompts and input validation
//!
//! A prompt suspends the active step. The next turn's raw input is run
//! through the prompt's validator; invalid input re-sends the retry content
//! and keeps waiting, with no bound on the number of attempts.

use crate::turn::{Activity, OutboundMessage};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Validator over raw prompt input
pub type Validator = Arc<dyn Fn(&PromptInput<'_>) -> Result<Validation, BoxError> + Send + Sync>;

/// Per-call prompt content; the validator is looked up by `prompt_id`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptOptions {
    pub prompt_id: String,
    pub prompt: OutboundMessage,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry: Option<OutboundMessage>,
}

impl PromptOptions {
    #[must_use]
    pub fn new(prompt_id: impl Into<String>, prompt: impl Into<OutboundMessage>) -> Self {
        Self {
            prompt_id: prompt_id.into(),
            prompt: prompt.into(),
            retry: None,
        }
    }

    #[must_use]
    pub fn with_retry(mut self, retry: impl Into<OutboundMessage>) -> Self {
        self.retry = Some(retry.into());
        self
    }

    /// Content re-sent after invalid input
    #[must_use]
    pub fn retry_message(&self) -> &OutboundMessage {
        self.retry.as_ref().unwrap_or(&self.prompt)
    }
}

/// Outstanding prompt recorded on a waiting instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingPrompt {
    pub options: PromptOptions,
    /// Invalid answers received so far
    #[serde(default)]
    pub attempts: u32,
}

impl PendingPrompt {
    #[must_use]
    pub fn new(options: PromptOptions) -> Self {
        Self {
            options,
            attempts: 0,
        }
    }
}

/// Raw input handed to a validator
#[derive(Debug, Clone, Copy)]
pub struct PromptInput<'a> {
    pub text: &'a str,
    pub value: Option<&'a Value>,
    /// Zero-based attempt number
    pub attempt: u32,
}

impl<'a> PromptInput<'a> {
    #[must_use]
    pub fn from_activity(activity: &'a Activity, attempt: u32) -> Self {
        Self {
            text: &activity.text,
            value: activity.value.as_ref(),
            attempt,
        }
    }
}

/// Validator verdict
#[derive(Debug, Clone, PartialEq)]
pub struct Validation {
    pub valid: bool,
    /// Transformed result delivered to the waiting step when valid
    pub value: Value,
    /// Replaces the configured retry content for this attempt
    pub retry: Option<OutboundMessage>,
}

impl Validation {
    #[must_use]
    pub fn accept(value: impl Into<Value>) -> Self {
        Self {
            valid: true,
            value: value.into(),
            retry: None,
        }
    }

    #[must_use]
    pub fn reject() -> Self {
        Self {
            valid: false,
            value: Value::Null,
            retry: None,
        }
    }

    #[must_use]
    pub fn reject_with_retry(retry: impl Into<OutboundMessage>) -> Self {
        Self {
            retry: Some(retry.into()),
            ..Self::reject()
        }
    }
}

/// Named prompt configuration registered on a dialog
#[derive(Clone, Default)]
pub struct PromptConfig {
    validator: Option<Validator>,
}

impl fmt::Debug for PromptConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PromptConfig")
            .field("validated", &self.validator.is_some())
            .finish()
    }
}

impl PromptConfig {
    /// Free text prompt: every input is valid
    #[must_use]
    pub fn text() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn validated<F>(f: F) -> Self
    where
        F: Fn(&PromptInput<'_>) -> Result<Validation, BoxError> + Send + Sync + 'static,
    {
        Self {
            validator: Some(validator(f)),
        }
    }

    #[must_use]
    pub fn with_validator(validator: Validator) -> Self {
        Self {
            validator: Some(validator),
        }
    }

    /// Run the validator. Errors and panics count as invalid input.
    #[must_use]
    pub fn validate(&self, input: &PromptInput<'_>) -> Validation {
        let Some(validator) = &self.validator else {
            return Validation::accept(input.text);
        };

        match catch_unwind(AssertUnwindSafe(|| validator(input))) {
            Ok(Ok(validation)) => validation,
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "Prompt validator failed, treating input as invalid");
                Validation::reject()
            }
            Err(_) => {
                tracing::warn!("Prompt validator panicked, treating input as invalid");
                Validation::reject()
            }
        }
    }
}

/// Wrap a closure as a shareable validator
#[must_use]
pub fn validator<F>(f: F) -> Validator
where
    F: Fn(&PromptInput<'_>) -> Result<Validation, BoxError> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Case-insensitive match against fixed choices; yields the matching choice
#[must_use]
pub fn exact_match<I, S>(choices: I) -> Validator
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let choices: Vec<String> = choices.into_iter().map(Into::into).collect();
    validator(move |input| {
        let answer = input.text.trim();
        Ok(choices
            .iter()
            .find(|choice| choice.eq_ignore_ascii_case(answer))
            .map_or_else(Validation::reject, |choice| {
                Validation::accept(choice.clone())
            }))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn input(text: &str) -> PromptInput<'_> {
        PromptInput {
            text,
            value: None,
            attempt: 0,
        }
    }

    #[test]
    fn text_prompt_accepts_anything() {
        let config = PromptConfig::text();
        assert_eq!(config.validate(&input("whatever")), Validation::accept("whatever"));
        assert_eq!(config.validate(&input("")), Validation::accept(""));
    }

    #[test]
    fn exact_match_returns_canonical_choice() {
        let config = PromptConfig::with_validator(exact_match(["yes", "no"]));
        assert_eq!(config.validate(&input("yes")), Validation::accept("yes"));
        assert_eq!(config.validate(&input(" YES ")), Validation::accept("yes"));
        assert_eq!(config.validate(&input("No")), Validation::accept("no"));
        assert!(!config.validate(&input("maybe")).valid);
    }

    #[test]
    fn validator_error_is_invalid_input() {
        let config = PromptConfig::validated(|_| Err("backend exploded".into()));
        let verdict = config.validate(&input("yes"));
        assert!(!verdict.valid);
    }

    #[test]
    fn validator_panic_is_invalid_input() {
        let config = PromptConfig::validated(|_| panic!("bad validator"));
        assert!(!config.validate(&input("yes")).valid);
    }

    #[test]
    fn validator_sees_attempt_and_value() {
        let config = PromptConfig::validated(|input| {
            Ok(match input.value {
                Some(v) => Validation::accept(v.clone()),
                None => Validation::reject_with_retry(format!("attempt {}", input.attempt)),
            })
        });
        let activity = Activity::message("c", "u", "").with_value(json!({"color": "red"}));
        let verdict = config.validate(&PromptInput::from_activity(&activity, 0));
        assert_eq!(verdict.value, json!({"color": "red"}));

        let verdict = config.validate(&PromptInput {
            text: "x",
            value: None,
            attempt: 3,
        });
        assert_eq!(verdict.retry, Some(OutboundMessage::text("attempt 3")));
    }

    #[test]
    fn retry_falls_back_to_prompt() {
        let options = PromptOptions::new("ask", "Shall I expand on that?");
        assert_eq!(options.retry_message().text, "Shall I expand on that?");

        let options = options.with_retry("Please answer yes or no");
        assert_eq!(options.retry_message().text, "Please answer yes or no");
    }
}

//! Offline keyword classifier
//!
//! Regex rules stand in for a hosted recognizer. Used by the console host
//! and handy for local demos.

use super::{ClassificationResult, Classifier, ServiceError};
use async_trait::async_trait;
use regex::{Regex, RegexBuilder};

const MATCH_SCORE: f64 = 0.9;
const NEGATIVE_SENTIMENT: f64 = 0.2;
const NEUTRAL_SENTIMENT: f64 = 0.7;

#[derive(Debug, Clone)]
struct IntentRule {
    intent: String,
    pattern: Regex,
}

/// First matching rule wins; no match yields `None` with zero confidence
#[derive(Debug, Clone, Default)]
pub struct KeywordClassifier {
    rules: Vec<IntentRule>,
    negative: Option<Regex>,
}

fn compile(pattern: &str) -> Result<Regex, regex::Error> {
    RegexBuilder::new(pattern).case_insensitive(true).build()
}

impl KeywordClassifier {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rules for the stock question topics plus `Quit`
    ///
    /// # Errors
    ///
    /// Only if a built-in pattern fails to compile.
    pub fn with_default_rules() -> Result<Self, regex::Error> {
        Self::new()
            .intent("Quit", r"\b(quit|exit|bye|goodbye|stop)\b")?
            .intent("Defence", r"\b(defen[cs]e|army|navy|military|nato|security)\b")?
            .intent("Power", r"\b(power|energy|electricity|nuclear|grid)\b")?
            .intent("Health", r"\b(health|nhs|hospitals?|doctors?|nurses?)\b")?
            .negative_words(r"\b(hate|awful|terrible|useless|rubbish|liar|angry|worst)\b")
    }

    /// Add a rule; `pattern` is matched case-insensitively
    ///
    /// # Errors
    ///
    /// When `pattern` is not a valid regex.
    pub fn intent(mut self, intent: impl Into<String>, pattern: &str) -> Result<Self, regex::Error> {
        self.rules.push(IntentRule {
            intent: intent.into(),
            pattern: compile(pattern)?,
        });
        Ok(self)
    }

    /// Words that mark a message as negative
    ///
    /// # Errors
    ///
    /// When `pattern` is not a valid regex.
    pub fn negative_words(mut self, pattern: &str) -> Result<Self, regex::Error> {
        self.negative = Some(compile(pattern)?);
        Ok(self)
    }

    /// Synchronous classification
    #[must_use]
    pub fn classify_text(&self, text: &str) -> ClassificationResult {
        let sentiment = match &self.negative {
            Some(negative) if negative.is_match(text) => NEGATIVE_SENTIMENT,
            _ => NEUTRAL_SENTIMENT,
        };

        let matched = self
            .rules
            .iter()
            .find_map(|rule| rule.pattern.find(text).map(|m| (rule, m.as_str())));

        match matched {
            Some((rule, keyword)) => ClassificationResult::new(rule.intent.clone(), MATCH_SCORE)
                .with_sentiment(sentiment)
                .with_entity("keyword", keyword.to_lowercase()),
            None => ClassificationResult::new("None", 0.0).with_sentiment(sentiment),
        }
    }
}

#[async_trait]
impl Classifier for KeywordClassifier {
    async fn classify(&self, text: &str) -> Result<ClassificationResult, ServiceError> {
        Ok(self.classify_text(text))
    }
}

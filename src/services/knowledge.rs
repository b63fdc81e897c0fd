//! In-process knowledge base of canned answers

use super::{Answer, KnowledgeBase, ServiceError};
use async_trait::async_trait;
use regex::{Regex, RegexBuilder};

/// One question pattern and the answer it produces
#[derive(Debug, Clone)]
pub struct KnowledgeEntry {
    pattern: Regex,
    answer: Answer,
}

impl KnowledgeEntry {
    /// Entry answering messages that match `pattern`, case-insensitively
    ///
    /// # Errors
    ///
    /// When `pattern` is not a valid regex.
    pub fn new(pattern: &str, answer: Answer) -> Result<Self, regex::Error> {
        Ok(Self {
            pattern: RegexBuilder::new(pattern).case_insensitive(true).build()?,
            answer,
        })
    }
}

/// Returns the highest-confidence entry whose pattern matches the text
#[derive(Debug, Clone, Default)]
pub struct StaticKnowledgeBase {
    entries: Vec<KnowledgeEntry>,
}

impl StaticKnowledgeBase {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_entry(mut self, entry: KnowledgeEntry) -> Self {
        self.entries.push(entry);
        self
    }

    /// Small talk answers used by the console host
    ///
    /// # Errors
    ///
    /// Only if a built-in pattern fails to compile.
    pub fn with_default_entries() -> Result<Self, regex::Error> {
        Ok(Self::new()
            .with_entry(KnowledgeEntry::new(
                r"\b(date|marry|love you|fancy)\b",
                Answer::new(
                    "I think it's best if we stick to a professional relationship.",
                    0.9,
                )
                .with_alternatives([
                    "I, erm, thank you but I'm already married",
                    "No thank you, I'm happily married",
                ]),
            )?)
            .with_entry(KnowledgeEntry::new(
                r"\b(who are you|your name)\b",
                Answer::new("I'm a bot. Ask me about defence, power or health.", 0.8),
            )?))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn lookup(&self, text: &str) -> Option<&Answer> {
        self.entries
            .iter()
            .filter(|entry| entry.pattern.is_match(text))
            .map(|entry| &entry.answer)
            .max_by(|a, b| a.confidence.total_cmp(&b.confidence))
    }
}

#[async_trait]
impl KnowledgeBase for StaticKnowledgeBase {
    async fn query(&self, text: &str) -> Result<Option<Answer>, ServiceError> {
        Ok(self.lookup(text).cloned())
    }
}

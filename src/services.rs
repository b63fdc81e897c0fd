//! External collaborators: classifier, knowledge base, outbound channel
//!
//! The router only sees these traits. Hosts inject concrete clients at
//! construction time.

mod keyword;
mod knowledge;

pub use keyword::KeywordClassifier;
pub use knowledge::{KnowledgeEntry, StaticKnowledgeBase};

use crate::turn::OutboundMessage;
use async_trait::async_trait;
use rand::Rng;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

// ============================================================================
// Errors
// ============================================================================

/// Collaborator failure with classification
#[derive(Debug, Error)]
#[error("{message}")]
pub struct ServiceError {
    pub kind: ServiceErrorKind,
    pub message: String,
}

impl ServiceError {
    #[must_use]
    pub fn new(kind: ServiceErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(ServiceErrorKind::Unavailable, message)
    }

    #[must_use]
    pub fn delivery(message: impl Into<String>) -> Self {
        Self::new(ServiceErrorKind::Delivery, message)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceErrorKind {
    /// Service could not be reached
    Unavailable,
    /// Outbound content could not be handed to the transport
    Delivery,
}

// ============================================================================
// Classifier
// ============================================================================

/// Intent recognizer result
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub top_intent: String,
    /// Confidence in `top_intent`, 0..=1
    pub score: f64,
    /// Polarity, 0 negative .. 1 positive
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sentiment: Option<f64>,
    #[serde(default)]
    pub entities: HashMap<String, Value>,
}

impl ClassificationResult {
    #[must_use]
    pub fn new(top_intent: impl Into<String>, score: f64) -> Self {
        Self {
            top_intent: top_intent.into(),
            score,
            sentiment: None,
            entities: HashMap::new(),
        }
    }

    #[must_use]
    pub fn with_sentiment(mut self, sentiment: f64) -> Self {
        self.sentiment = Some(sentiment);
        self
    }

    #[must_use]
    pub fn with_entity(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.entities.insert(name.into(), value.into());
        self
    }

    /// Typed entity lookup; missing or mistyped entities read as `None`
    #[must_use]
    pub fn entity<T: DeserializeOwned>(&self, name: &str) -> Option<T> {
        self.entities
            .get(name)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }
}

#[async_trait]
pub trait Classifier: Send + Sync {
    async fn classify(&self, text: &str) -> Result<ClassificationResult, ServiceError>;
}

/// Logging wrapper for classifiers
pub struct LoggingClassifier {
    inner: Arc<dyn Classifier>,
}

impl LoggingClassifier {
    #[must_use]
    pub fn new(inner: Arc<dyn Classifier>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl Classifier for LoggingClassifier {
    async fn classify(&self, text: &str) -> Result<ClassificationResult, ServiceError> {
        let start = std::time::Instant::now();
        let result = self.inner.classify(text).await;
        let duration = start.elapsed();

        match &result {
            Ok(classification) => {
                tracing::debug!(
                    duration_ms = %duration.as_millis(),
                    intent = %classification.top_intent,
                    score = classification.score,
                    sentiment = ?classification.sentiment,
                    "Classification completed"
                );
            }
            Err(e) => {
                tracing::warn!(
                    duration_ms = %duration.as_millis(),
                    error = %e.message,
                    kind = ?e.kind,
                    "Classification failed"
                );
            }
        }

        result
    }
}

// ============================================================================
// Knowledge Base
// ============================================================================

/// Knowledge base match
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    pub answer: String,
    pub confidence: f64,
    /// Variants that may be sent instead of the canonical answer
    #[serde(default)]
    pub alternatives: Vec<String>,
}

impl Answer {
    #[must_use]
    pub fn new(answer: impl Into<String>, confidence: f64) -> Self {
        Self {
            answer: answer.into(),
            confidence,
            alternatives: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_alternatives<I, S>(mut self, alternatives: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.alternatives = alternatives.into_iter().map(Into::into).collect();
        self
    }

    /// Pick uniformly among the alternatives and the canonical answer
    pub fn pick<R: Rng + ?Sized>(&self, rng: &mut R) -> &str {
        let choice = rng.gen_range(0..=self.alternatives.len());
        self.alternatives
            .get(choice)
            .map_or(self.answer.as_str(), String::as_str)
    }
}

#[async_trait]
pub trait KnowledgeBase: Send + Sync {
    async fn query(&self, text: &str) -> Result<Option<Answer>, ServiceError>;
}

// ============================================================================
// Outbound Channel
// ============================================================================

/// Transport that delivers replies. Fire-and-forget from the router's side.
#[async_trait]
pub trait OutboundChannel: Send + Sync {
    async fn send(&self, conversation_id: &str, message: &OutboundMessage) -> Result<(), ServiceError>;
}

// ============================================================================
// Arc implementations for trait objects
// ============================================================================

#[async_trait]
impl<T: Classifier + ?Sized> Classifier for Arc<T> {
    async fn classify(&self, text: &str) -> Result<ClassificationResult, ServiceError> {
        (**self).classify(text).await
    }
}

#[async_trait]
impl<T: KnowledgeBase + ?Sized> KnowledgeBase for Arc<T> {
    async fn query(&self, text: &str) -> Result<Option<Answer>, ServiceError> {
        (**self).query(text).await
    }
}

#[async_trait]
impl<T: OutboundChannel + ?Sized> OutboundChannel for Arc<T> {
    async fn send(&self, conversation_id: &str, message: &OutboundMessage) -> Result<(), ServiceError> {
        (**self).send(conversation_id, message).await
    }
}

//! Routing policies
//!
//! A policy turns an optional classification into a routing decision when
//! no dialog is active.

use crate::config::{RouterConfig, RoutingStrategy};
use crate::services::ClassificationResult;
use serde_json::Value;
use std::sync::Arc;

const NONE_INTENT: &str = "None";

/// What the router should do with an unclaimed message
#[derive(Debug, Clone, PartialEq)]
pub enum RouteDecision {
    Begin { dialog_id: String, options: Value },
    CancelAll,
    /// No dialog applies; fall back to the knowledge base or help
    Unrecognized,
}

pub trait RoutingPolicy: Send + Sync {
    /// Whether `route` wants a classification of the message
    fn needs_classification(&self) -> bool {
        true
    }

    /// `classification` is `None` for empty messages
    fn route(&self, classification: Option<&ClassificationResult>) -> RouteDecision;
}

/// Route by top intent, picking the dialog variant by sentiment
#[derive(Debug, Clone)]
pub struct IntentRouting {
    config: RouterConfig,
}

impl IntentRouting {
    #[must_use]
    pub fn new(config: &RouterConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    /// Effective intent after the confidence cut-off
    fn intent<'a>(&self, classification: &'a ClassificationResult) -> &'a str {
        if classification.score < self.config.score_threshold {
            NONE_INTENT
        } else {
            &classification.top_intent
        }
    }
}

impl RoutingPolicy for IntentRouting {
    fn route(&self, classification: Option<&ClassificationResult>) -> RouteDecision {
        let Some(classification) = classification else {
            return RouteDecision::Unrecognized;
        };
        let intent = self.intent(classification);

        if self.config.is_quit(intent) {
            return RouteDecision::CancelAll;
        }
        let Some(route) = self.config.route_for(intent) else {
            return RouteDecision::Unrecognized;
        };

        let negative = classification
            .sentiment
            .is_some_and(|sentiment| sentiment < self.config.sentiment_threshold);
        let dialog_id = if negative {
            &route.negative_dialog
        } else {
            &route.neutral_dialog
        };

        RouteDecision::Begin {
            dialog_id: dialog_id.clone(),
            options: Value::String(intent.to_string()),
        }
    }
}

/// Always begin one dialog, without classifying
#[derive(Debug, Clone)]
pub struct FixedDialogRouting {
    dialog_id: String,
}

impl FixedDialogRouting {
    #[must_use]
    pub fn new(dialog_id: impl Into<String>) -> Self {
        Self {
            dialog_id: dialog_id.into(),
        }
    }
}

impl RoutingPolicy for FixedDialogRouting {
    fn needs_classification(&self) -> bool {
        false
    }

    fn route(&self, _classification: Option<&ClassificationResult>) -> RouteDecision {
        RouteDecision::Begin {
            dialog_id: self.dialog_id.clone(),
            options: Value::Null,
        }
    }
}

/// Build the policy selected by `config.strategy`
#[must_use]
pub fn policy_for(config: &RouterConfig) -> Arc<dyn RoutingPolicy> {
    match &config.strategy {
        RoutingStrategy::Intent => Arc::new(IntentRouting::new(config)),
        RoutingStrategy::Fixed(dialog_id) => Arc::new(FixedDialogRouting::new(dialog_id.clone())),
    }
}

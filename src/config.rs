//! Router configuration

use std::time::Duration;

pub const DEFAULT_HELP_MESSAGE: &str = "I didn't understand what you just said to me.";
pub const DEFAULT_APOLOGY_MESSAGE: &str = "Sorry, something went wrong. Please try again.";

/// Intent that begins a dialog, with a variant for negative sentiment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntentRoute {
    pub intent: String,
    pub neutral_dialog: String,
    pub negative_dialog: String,
}

impl IntentRoute {
    #[must_use]
    pub fn new(
        intent: impl Into<String>,
        neutral_dialog: impl Into<String>,
        negative_dialog: impl Into<String>,
    ) -> Self {
        Self {
            intent: intent.into(),
            neutral_dialog: neutral_dialog.into(),
            negative_dialog: negative_dialog.into(),
        }
    }
}

/// Which routing policy the router builds
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoutingStrategy {
    /// Classify and route by intent and sentiment
    Intent,
    /// Always begin this dialog; classification is skipped
    Fixed(String),
}

impl RoutingStrategy {
    /// Parses `intent` or `fixed:<dialog id>`
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        if value.eq_ignore_ascii_case("intent") {
            return Some(Self::Intent);
        }
        value
            .strip_prefix("fixed:")
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(|id| Self::Fixed(id.to_string()))
    }
}

/// Configuration for the turn router
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Top intents scoring below this are treated as `None`
    pub score_threshold: f64,
    /// Sentiment below this selects the negative dialog variant
    pub sentiment_threshold: f64,
    /// Knowledge base answers below this are ignored
    pub answer_threshold: f64,
    pub classifier_timeout: Duration,
    pub strategy: RoutingStrategy,
    pub routes: Vec<IntentRoute>,
    /// Intents that cancel the whole stack
    pub quit_intents: Vec<String>,
    pub help_message: String,
    pub apology_message: String,
}

impl Default for RouterConfig {
    fn default() -> Self {
        let routes = ["Defence", "Power", "Health"]
            .into_iter()
            .map(|intent| IntentRoute::new(intent, "NiceQuestions", "AngryQuestions"))
            .collect();

        Self {
            score_threshold: 0.5,
            sentiment_threshold: 0.5,
            answer_threshold: 0.5,
            classifier_timeout: Duration::from_millis(5000),
            strategy: RoutingStrategy::Intent,
            routes,
            quit_intents: vec!["Quit".to_string()],
            help_message: DEFAULT_HELP_MESSAGE.to_string(),
            apology_message: DEFAULT_APOLOGY_MESSAGE.to_string(),
        }
    }
}

impl RouterConfig {
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source. Unparseable values keep the default.
    #[must_use]
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        let float = |key: &str, default: f64| -> f64 {
            match lookup(key).map(|v| v.trim().parse::<f64>()) {
                Some(Ok(value)) if (0.0..=1.0).contains(&value) => value,
                Some(_) => {
                    tracing::warn!(key, default, "Ignoring invalid threshold");
                    default
                }
                None => default,
            }
        };
        config.score_threshold = float("DIALOG_SCORE_THRESHOLD", config.score_threshold);
        config.sentiment_threshold =
            float("DIALOG_SENTIMENT_THRESHOLD", config.sentiment_threshold);
        config.answer_threshold = float("DIALOG_ANSWER_THRESHOLD", config.answer_threshold);

        if let Some(raw) = lookup("DIALOG_CLASSIFIER_TIMEOUT_MS") {
            match raw.trim().parse::<u64>() {
                Ok(ms) if ms > 0 => config.classifier_timeout = Duration::from_millis(ms),
                _ => tracing::warn!(value = %raw, "Ignoring invalid classifier timeout"),
            }
        }

        if let Some(raw) = lookup("DIALOG_ROUTING") {
            match RoutingStrategy::parse(&raw) {
                Some(strategy) => config.strategy = strategy,
                None => tracing::warn!(value = %raw, "Ignoring unknown routing strategy"),
            }
        }

        if let Some(message) = lookup("DIALOG_HELP_MESSAGE").filter(|m| !m.trim().is_empty()) {
            config.help_message = message;
        }
        if let Some(message) = lookup("DIALOG_APOLOGY_MESSAGE").filter(|m| !m.trim().is_empty()) {
            config.apology_message = message;
        }

        config
    }

    #[must_use]
    pub fn route_for(&self, intent: &str) -> Option<&IntentRoute> {
        self.routes.iter().find(|route| route.intent == intent)
    }

    #[must_use]
    pub fn is_quit(&self, intent: &str) -> bool {
        self.quit_intents.iter().any(|quit| quit == intent)
    }
}

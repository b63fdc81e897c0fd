//! Per-turn context: the inbound message, outbound replies, and loaded state

use crate::state::{EntityKind, PropertyBag, StateWrite};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Inbound user message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    pub conversation_id: String,
    pub user_id: String,
    #[serde(default)]
    pub text: String,
    /// Structured payload, e.g. a postback value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

impl Activity {
    #[must_use]
    pub fn message(
        conversation_id: impl Into<String>,
        user_id: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            user_id: user_id.into(),
            text: text.into(),
            value: None,
        }
    }

    #[must_use]
    pub fn with_value(mut self, value: Value) -> Self {
        self.value = Some(value);
        self
    }
}

/// Outbound content sent back to the user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundMessage {
    pub text: String,
    /// Quick replies offered alongside the text
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub suggestions: Vec<String>,
}

impl OutboundMessage {
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            suggestions: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_suggestions<I, S>(mut self, suggestions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.suggestions = suggestions.into_iter().map(Into::into).collect();
        self
    }
}

impl From<&str> for OutboundMessage {
    fn from(text: &str) -> Self {
        Self::text(text)
    }
}

impl From<String> for OutboundMessage {
    fn from(text: String) -> Self {
        Self::text(text)
    }
}

/// Everything one turn reads and produces. Never persisted itself.
#[derive(Debug)]
pub struct TurnContext {
    activity: Activity,
    replies: Vec<OutboundMessage>,
    responded: bool,
    user_state: PropertyBag,
    conversation_state: PropertyBag,
}

impl TurnContext {
    #[must_use]
    pub fn new(activity: Activity) -> Self {
        let user_state = PropertyBag::new(EntityKind::User, activity.user_id.clone());
        let conversation_state =
            PropertyBag::new(EntityKind::Conversation, activity.conversation_id.clone());
        Self::with_state(activity, user_state, conversation_state)
    }

    #[must_use]
    pub fn with_state(
        activity: Activity,
        user_state: PropertyBag,
        conversation_state: PropertyBag,
    ) -> Self {
        Self {
            activity,
            replies: Vec::new(),
            responded: false,
            user_state,
            conversation_state,
        }
    }

    #[must_use]
    pub fn activity(&self) -> &Activity {
        &self.activity
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.activity.text
    }

    #[must_use]
    pub fn conversation_id(&self) -> &str {
        &self.activity.conversation_id
    }

    /// Queue a reply and mark the turn as responded
    pub fn send(&mut self, message: impl Into<OutboundMessage>) {
        self.replies.push(message.into());
        self.responded = true;
    }

    #[must_use]
    pub fn responded(&self) -> bool {
        self.responded
    }

    #[must_use]
    pub fn replies(&self) -> &[OutboundMessage] {
        &self.replies
    }

    #[must_use]
    pub fn user_state(&self) -> &PropertyBag {
        &self.user_state
    }

    pub fn user_state_mut(&mut self) -> &mut PropertyBag {
        &mut self.user_state
    }

    #[must_use]
    pub fn conversation_state(&self) -> &PropertyBag {
        &self.conversation_state
    }

    pub fn conversation_state_mut(&mut self) -> &mut PropertyBag {
        &mut self.conversation_state
    }

    /// Dirty user and conversation properties
    #[must_use]
    pub fn pending_writes(&self) -> Vec<StateWrite> {
        let mut writes = self.user_state.pending_writes();
        writes.extend(self.conversation_state.pending_writes());
        writes
    }

    #[must_use]
    pub fn into_replies(self) -> Vec<OutboundMessage> {
        self.replies
    }
}

//! Turn router
//!
//! Entry point for each inbound message: serializes turns per conversation,
//! loads the dialog stack, continues the active dialog, routes unclaimed
//! messages, persists all-or-nothing, and hands replies to the channel.

mod locks;
mod policy;

pub use locks::{ConversationGuard, ConversationLocks};
pub use policy::{policy_for, FixedDialogRouting, IntentRouting, RouteDecision, RoutingPolicy};

use crate::config::RouterConfig;
use crate::dialog::{DialogContext, DialogSet, DialogStack, DialogTurnStatus};
use crate::error::DialogError;
use crate::services::{ClassificationResult, Classifier, KnowledgeBase, OutboundChannel};
use crate::state::{EntityKind, PropertyBag, ScopeKey, StateError, StateStore, StateWrite};
use crate::turn::{Activity, OutboundMessage, TurnContext};
use serde::Serialize;
use std::sync::Arc;
use tracing::Instrument;

/// Conversation property holding the serialized dialog stack
pub const DIALOG_STATE_PROPERTY: &str = "DialogState";

/// What a turn ended up doing
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TurnAction {
    /// The active dialog is waiting on a prompt
    Waiting,
    /// The active dialog finished and replied
    Completed,
    /// The active dialog cancelled itself and replied
    Cancelled,
    /// Routing began a dialog
    Began { dialog_id: String },
    /// Routing cancelled every dialog
    CancelledAll,
    /// The knowledge base answered
    Answered,
    /// Nothing matched; the help message was sent
    Helped,
    /// Classification failed; the fallback was sent and nothing was persisted
    Degraded { reason: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct TurnOutcome {
    pub action: TurnAction,
    pub replies: Vec<OutboundMessage>,
}

/// Processes turns against injected collaborators
pub struct TurnRouter {
    dialogs: DialogSet,
    store: Arc<dyn StateStore>,
    classifier: Arc<dyn Classifier>,
    knowledge: Option<Arc<dyn KnowledgeBase>>,
    channel: Arc<dyn OutboundChannel>,
    policy: Arc<dyn RoutingPolicy>,
    config: RouterConfig,
    locks: ConversationLocks,
}

impl TurnRouter {
    #[must_use]
    pub fn new(
        dialogs: DialogSet,
        store: Arc<dyn StateStore>,
        classifier: Arc<dyn Classifier>,
        channel: Arc<dyn OutboundChannel>,
        config: RouterConfig,
    ) -> Self {
        Self {
            dialogs,
            store,
            classifier,
            knowledge: None,
            channel,
            policy: policy_for(&config),
            config,
            locks: ConversationLocks::new(),
        }
    }

    #[must_use]
    pub fn with_knowledge_base(mut self, knowledge: Arc<dyn KnowledgeBase>) -> Self {
        self.knowledge = Some(knowledge);
        self
    }

    /// Replace the policy chosen from the config
    #[must_use]
    pub fn with_policy(mut self, policy: Arc<dyn RoutingPolicy>) -> Self {
        self.policy = policy;
        self
    }

    #[must_use]
    pub fn dialogs(&self) -> &DialogSet {
        &self.dialogs
    }

    #[must_use]
    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    /// Conversations with a turn in flight
    #[must_use]
    pub fn active_conversations(&self) -> usize {
        self.locks.active()
    }

    /// Process one inbound message as a turn.
    ///
    /// Recoverable classifier failures produce a `Degraded` outcome. Fatal
    /// failures send the apology message, persist nothing, and return the error.
    ///
    /// # Errors
    ///
    /// Unknown dialogs, invalid step results and state store failures.
    pub async fn process_turn(&self, activity: Activity) -> Result<TurnOutcome, DialogError> {
        let conversation_id = activity.conversation_id.clone();
        let span = tracing::info_span!("turn", conv_id = %conversation_id);

        async move {
            let _guard = self.locks.acquire(&conversation_id).await;

            let outcome = match self.run_turn(activity).await {
                Ok(outcome) => outcome,
                Err(e) if e.is_recoverable() => {
                    tracing::warn!(error = %e, "Turn degraded, sending fallback");
                    TurnOutcome {
                        action: TurnAction::Degraded {
                            reason: e.to_string(),
                        },
                        replies: vec![OutboundMessage::text(self.config.help_message.clone())],
                    }
                }
                Err(e) => {
                    tracing::error!(error = %e, "Turn failed");
                    let apology = OutboundMessage::text(self.config.apology_message.clone());
                    self.deliver(&conversation_id, std::slice::from_ref(&apology))
                        .await;
                    return Err(e);
                }
            };

            self.deliver(&conversation_id, &outcome.replies).await;
            tracing::info!(
                action = ?outcome.action,
                replies = outcome.replies.len(),
                "Turn complete"
            );
            Ok(outcome)
        }
        .instrument(span)
        .await
    }

    /// Drop a conversation's dialog stack, e.g. when the conversation ends.
    /// Returns whether a stack existed.
    ///
    /// # Errors
    ///
    /// State store failures.
    pub async fn end_conversation(&self, conversation_id: &str) -> Result<bool, DialogError> {
        let _guard = self.locks.acquire(conversation_id).await;
        let key = ScopeKey::conversation(conversation_id, DIALOG_STATE_PROPERTY);
        let existed = self.store.load(&key).await?.is_some();
        if existed {
            self.store.delete(&key).await?;
            tracing::info!(conv_id = %conversation_id, "Conversation ended, dialog stack cleared");
        }
        Ok(existed)
    }

    async fn run_turn(&self, activity: Activity) -> Result<TurnOutcome, DialogError> {
        let stack_key = ScopeKey::conversation(&activity.conversation_id, DIALOG_STATE_PROPERTY);
        let mut stack: DialogStack = match self.store.load(&stack_key).await? {
            Some(value) => serde_json::from_value(value).map_err(StateError::from)?,
            None => DialogStack::new(),
        };
        let loaded = stack.clone();

        let user_state = PropertyBag::load(
            &*self.store,
            EntityKind::User,
            &activity.user_id,
            self.dialogs.user_properties(),
        )
        .await?;
        let conversation_state = PropertyBag::load(
            &*self.store,
            EntityKind::Conversation,
            &activity.conversation_id,
            self.dialogs.conversation_properties(),
        )
        .await?;
        let mut turn = TurnContext::with_state(activity, user_state, conversation_state);

        tracing::debug!(depth = stack.depth(), "Dialog stack loaded");

        let continued = DialogContext::new(&self.dialogs, &mut stack, &mut turn).continue_dialog()?;
        let action = match continued.status {
            DialogTurnStatus::Waiting => TurnAction::Waiting,
            // A step's own reply takes priority over top-level routing
            DialogTurnStatus::Complete if turn.responded() => TurnAction::Completed,
            DialogTurnStatus::Cancelled if turn.responded() => TurnAction::Cancelled,
            DialogTurnStatus::Empty | DialogTurnStatus::Complete | DialogTurnStatus::Cancelled => {
                self.route(&mut stack, &mut turn).await?
            }
        };

        let mut writes = turn.pending_writes();
        if stack != loaded {
            writes.push(if stack.is_empty() {
                StateWrite::delete(stack_key)
            } else {
                StateWrite::save(stack_key, serde_json::to_value(&stack).map_err(StateError::from)?)
            });
        }
        if !writes.is_empty() {
            self.store.commit(&writes).await?;
            tracing::debug!(writes = writes.len(), "Turn state committed");
        }

        Ok(TurnOutcome {
            action,
            replies: turn.into_replies(),
        })
    }

    async fn route(
        &self,
        stack: &mut DialogStack,
        turn: &mut TurnContext,
    ) -> Result<TurnAction, DialogError> {
        let text = turn.text().trim().to_string();
        let classification = if self.policy.needs_classification() && !text.is_empty() {
            Some(self.classify(&text).await?)
        } else {
            None
        };

        match self.policy.route(classification.as_ref()) {
            RouteDecision::Begin { dialog_id, options } => {
                tracing::info!(dialog_id = %dialog_id, "Routing to dialog");
                DialogContext::new(&self.dialogs, stack, turn).begin(&dialog_id, options)?;
                Ok(TurnAction::Began { dialog_id })
            }
            RouteDecision::CancelAll => {
                DialogContext::new(&self.dialogs, stack, turn).cancel_all();
                Ok(TurnAction::CancelledAll)
            }
            RouteDecision::Unrecognized => {
                if let Some(answer) = self.answer(&text).await {
                    turn.send(answer);
                    return Ok(TurnAction::Answered);
                }
                turn.send(self.config.help_message.clone());
                Ok(TurnAction::Helped)
            }
        }
    }

    async fn classify(&self, text: &str) -> Result<ClassificationResult, DialogError> {
        let timeout = self.config.classifier_timeout;
        match tokio::time::timeout(timeout, self.classifier.classify(text)).await {
            Ok(Ok(result)) => {
                tracing::info!(
                    intent = %result.top_intent,
                    score = result.score,
                    sentiment = ?result.sentiment,
                    "Message classified"
                );
                Ok(result)
            }
            Ok(Err(e)) => Err(DialogError::ClassifierUnavailable(e.message)),
            Err(_) => Err(DialogError::ClassificationTimeout(timeout)),
        }
    }

    /// Knowledge base answer at or above the threshold, if any
    async fn answer(&self, text: &str) -> Option<String> {
        let knowledge = self.knowledge.as_ref()?;
        if text.is_empty() {
            return None;
        }

        let answer = match tokio::time::timeout(self.config.classifier_timeout, knowledge.query(text)).await {
            Ok(Ok(answer)) => answer?,
            Ok(Err(e)) => {
                tracing::warn!(error = %e.message, "Knowledge base query failed");
                return None;
            }
            Err(_) => {
                tracing::warn!("Knowledge base query timed out");
                return None;
            }
        };

        if answer.confidence < self.config.answer_threshold {
            tracing::debug!(confidence = answer.confidence, "Knowledge base answer below threshold");
            return None;
        }
        Some(answer.pick(&mut rand::thread_rng()).to_string())
    }

    async fn deliver(&self, conversation_id: &str, replies: &[OutboundMessage]) {
        for reply in replies {
            if let Err(e) = self.channel.send(conversation_id, reply).await {
                tracing::warn!(error = %e.message, kind = ?e.kind, "Failed to deliver reply");
            }
        }
    }
}

//! Mock collaborators and harnesses for tests
//!
//! These mocks let router and dialog tests run without a real classifier,
//! transport, or database.

use crate::dialog::{DialogContext, DialogSet, DialogStack, DialogTurnResult};
use crate::error::DialogError;
use crate::services::{ClassificationResult, Classifier, OutboundChannel, ServiceError};
use crate::state::{
    EntityKind, MemoryStore, PropertyBag, ScopeKey, StateError, StateResult, StateStore,
    StateWrite,
};
use crate::turn::{Activity, OutboundMessage, TurnContext};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

// ============================================================================
// Mock Classifier
// ============================================================================

/// Classifier that returns queued results, failing once the queue is empty
pub struct MockClassifier {
    results: Mutex<VecDeque<Result<ClassificationResult, ServiceError>>>,
    /// Texts passed to `classify`
    calls: Mutex<Vec<String>>,
}

impl MockClassifier {
    pub fn new() -> Self {
        Self {
            results: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn queue(&self, result: Result<ClassificationResult, ServiceError>) {
        self.results.lock().unwrap().push_back(result);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl Default for MockClassifier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Classifier for MockClassifier {
    async fn classify(&self, text: &str) -> Result<ClassificationResult, ServiceError> {
        self.calls.lock().unwrap().push(text.to_string());
        self.results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ServiceError::unavailable("No mock classification queued")))
    }
}

/// Classifier that answers only after a delay
pub struct DelayedClassifier {
    delay: Duration,
    result: ClassificationResult,
}

impl DelayedClassifier {
    pub fn new(delay: Duration, result: ClassificationResult) -> Self {
        Self { delay, result }
    }
}

#[async_trait]
impl Classifier for DelayedClassifier {
    async fn classify(&self, _text: &str) -> Result<ClassificationResult, ServiceError> {
        tokio::time::sleep(self.delay).await;
        Ok(self.result.clone())
    }
}

// ============================================================================
// Recording Channel
// ============================================================================

/// Outbound channel that records every delivery
#[derive(Default)]
pub struct RecordingChannel {
    sent: Mutex<Vec<(String, OutboundMessage)>>,
    failing: AtomicBool,
}

impl RecordingChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent send fail
    pub fn fail_sends(&self) {
        self.failing.store(true, Ordering::SeqCst);
    }

    /// Texts delivered to one conversation, in order
    pub fn texts_for(&self, conversation_id: &str) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|(id, _)| id == conversation_id)
            .map(|(_, message)| message.text.clone())
            .collect()
    }
}

#[async_trait]
impl OutboundChannel for RecordingChannel {
    async fn send(&self, conversation_id: &str, message: &OutboundMessage) -> Result<(), ServiceError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(ServiceError::delivery("transport closed"));
        }
        self.sent
            .lock()
            .unwrap()
            .push((conversation_id.to_string(), message.clone()));
        Ok(())
    }
}

// ============================================================================
// Store Wrappers
// ============================================================================

/// Memory store whose loads are slow, widening read-modify-write race windows
pub struct SlowStore {
    inner: MemoryStore,
    delay: Duration,
}

impl SlowStore {
    pub fn new(delay: Duration) -> Self {
        Self {
            inner: MemoryStore::new(),
            delay,
        }
    }

    pub fn inner(&self) -> &MemoryStore {
        &self.inner
    }
}

#[async_trait]
impl StateStore for SlowStore {
    async fn load(&self, key: &ScopeKey) -> StateResult<Option<Value>> {
        tokio::time::sleep(self.delay).await;
        self.inner.load(key).await
    }

    async fn save(&self, key: &ScopeKey, value: &Value) -> StateResult<()> {
        self.inner.save(key, value).await
    }

    async fn delete(&self, key: &ScopeKey) -> StateResult<()> {
        self.inner.delete(key).await
    }

    async fn commit(&self, writes: &[StateWrite]) -> StateResult<()> {
        tokio::time::sleep(self.delay).await;
        self.inner.commit(writes).await
    }
}

/// Memory store that can be switched to reject commits
#[derive(Default)]
pub struct FlakyStore {
    inner: MemoryStore,
    reject_commits: AtomicBool,
    commits: AtomicUsize,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reject_commits(&self) {
        self.reject_commits.store(true, Ordering::SeqCst);
    }

    /// Successful commits so far
    pub fn commits(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }

    pub fn inner(&self) -> &MemoryStore {
        &self.inner
    }
}

#[async_trait]
impl StateStore for FlakyStore {
    async fn load(&self, key: &ScopeKey) -> StateResult<Option<Value>> {
        self.inner.load(key).await
    }

    async fn save(&self, key: &ScopeKey, value: &Value) -> StateResult<()> {
        self.inner.save(key, value).await
    }

    async fn delete(&self, key: &ScopeKey) -> StateResult<()> {
        self.inner.delete(key).await
    }

    async fn commit(&self, writes: &[StateWrite]) -> StateResult<()> {
        if self.reject_commits.load(Ordering::SeqCst) {
            return Err(StateError::Unavailable("disk full".to_string()));
        }
        self.inner.commit(writes).await?;
        self.commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// ============================================================================
// Dialog Harness
// ============================================================================

/// Drives a dialog set turn by turn, keeping stack and property bags between turns
pub struct DialogHarness {
    dialogs: DialogSet,
    pub stack: DialogStack,
    user_state: PropertyBag,
    conversation_state: PropertyBag,
    last_replies: Vec<OutboundMessage>,
}

impl DialogHarness {
    pub fn new(dialogs: DialogSet) -> Self {
        Self {
            dialogs,
            stack: DialogStack::new(),
            user_state: PropertyBag::new(EntityKind::User, "user"),
            conversation_state: PropertyBag::new(EntityKind::Conversation, "conv"),
            last_replies: Vec::new(),
        }
    }

    pub fn turn<F>(&mut self, activity: Activity, op: F) -> Result<DialogTurnResult, DialogError>
    where
        F: FnOnce(&mut DialogContext<'_>) -> Result<DialogTurnResult, DialogError>,
    {
        let mut turn = TurnContext::with_state(
            activity,
            self.user_state.clone(),
            self.conversation_state.clone(),
        );
        let result = op(&mut DialogContext::new(&self.dialogs, &mut self.stack, &mut turn));
        self.user_state = turn.user_state().clone();
        self.conversation_state = turn.conversation_state().clone();
        self.last_replies = turn.into_replies();
        result
    }

    pub fn begin(&mut self, dialog_id: &str, options: Value) -> (DialogTurnResult, Vec<String>) {
        let result = self
            .turn(Activity::message("conv", "user", ""), |dc| dc.begin(dialog_id, options))
            .unwrap();
        (result, self.reply_texts())
    }

    pub fn say(&mut self, text: &str) -> (DialogTurnResult, Vec<String>) {
        self.send(Activity::message("conv", "user", text))
    }

    pub fn send(&mut self, activity: Activity) -> (DialogTurnResult, Vec<String>) {
        let result = self.turn(activity, |dc| dc.continue_dialog()).unwrap();
        (result, self.reply_texts())
    }

    pub fn last_replies(&self) -> &[OutboundMessage] {
        &self.last_replies
    }

    pub fn user_state(&self) -> &PropertyBag {
        &self.user_state
    }

    fn reply_texts(&self) -> Vec<String> {
        self.last_replies.iter().map(|m| m.text.clone()).collect()
    }
}

//! Dialog definitions and the registry they are resolved from

use super::prompt::PromptConfig;
use super::step::{StepContext, StepResult};
use crate::error::DialogError;
use crate::turn::TurnContext;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

/// Type-erased view of a dialog definition used by the stack manager
pub trait Dialog: Send + Sync {
    fn id(&self) -> &str;

    fn step_count(&self) -> usize;

    /// Fresh state for a new instance
    ///
    /// # Errors
    ///
    /// `StateCodec` when the default state cannot be serialized.
    fn initial_state(&self) -> Result<Value, DialogError>;

    /// Run one step against the instance's serialized state.
    /// The state is only written back when the step succeeds.
    ///
    /// # Errors
    ///
    /// `InvalidStepResult` for an index past the last step, `StateCodec` when
    /// the stored state does not decode, or the step's own error.
    fn run_step(
        &self,
        index: usize,
        state: &mut Value,
        input: Value,
        turn: &mut TurnContext,
    ) -> Result<StepResult, DialogError>;

    fn prompt_config(&self, prompt_id: &str) -> Option<&PromptConfig>;

    fn children(&self) -> &[Arc<dyn Dialog>];

    /// User properties the dialog reads, loaded before each turn
    fn user_properties(&self) -> &[String] {
        &[]
    }

    /// Conversation properties the dialog reads, loaded before each turn
    fn conversation_properties(&self) -> &[String] {
        &[]
    }
}

type StepFn<S> =
    Box<dyn Fn(&mut StepContext<'_, S>) -> Result<StepResult, DialogError> + Send + Sync>;

/// Waterfall dialog with typed per-instance state `S`
pub struct DialogDefinition<S> {
    id: String,
    steps: Vec<StepFn<S>>,
    prompts: HashMap<String, PromptConfig>,
    children: Vec<Arc<dyn Dialog>>,
    user_properties: Vec<String>,
    conversation_properties: Vec<String>,
    _state: PhantomData<fn() -> S>,
}

impl<S> fmt::Debug for DialogDefinition<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DialogDefinition")
            .field("id", &self.id)
            .field("steps", &self.steps.len())
            .field("prompts", &self.prompts.keys().collect::<Vec<_>>())
            .field("children", &self.children.len())
            .finish_non_exhaustive()
    }
}

impl<S> DialogDefinition<S>
where
    S: Serialize + DeserializeOwned + Default + 'static,
{
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            steps: Vec::new(),
            prompts: HashMap::new(),
            children: Vec::new(),
            user_properties: Vec::new(),
            conversation_properties: Vec::new(),
            _state: PhantomData,
        }
    }

    /// Append a step
    #[must_use]
    pub fn step<F>(mut self, step: F) -> Self
    where
        F: Fn(&mut StepContext<'_, S>) -> Result<StepResult, DialogError> + Send + Sync + 'static,
    {
        self.steps.push(Box::new(step));
        self
    }

    /// Register a named prompt configuration
    #[must_use]
    pub fn prompt(mut self, prompt_id: impl Into<String>, config: PromptConfig) -> Self {
        self.prompts.insert(prompt_id.into(), config);
        self
    }

    /// Nest a child dialog that this dialog may begin
    #[must_use]
    pub fn child(mut self, dialog: impl Dialog + 'static) -> Self {
        self.children.push(Arc::new(dialog));
        self
    }

    #[must_use]
    pub fn uses_user_property(mut self, property: impl Into<String>) -> Self {
        self.user_properties.push(property.into());
        self
    }

    #[must_use]
    pub fn uses_conversation_property(mut self, property: impl Into<String>) -> Self {
        self.conversation_properties.push(property.into());
        self
    }

    fn codec_error(&self, source: serde_json::Error) -> DialogError {
        DialogError::StateCodec {
            dialog_id: self.id.clone(),
            source,
        }
    }
}

impl<S> Dialog for DialogDefinition<S>
where
    S: Serialize + DeserializeOwned + Default + 'static,
{
    fn id(&self) -> &str {
        &self.id
    }

    fn step_count(&self) -> usize {
        self.steps.len()
    }

    fn initial_state(&self) -> Result<Value, DialogError> {
        serde_json::to_value(S::default()).map_err(|e| self.codec_error(e))
    }

    fn run_step(
        &self,
        index: usize,
        state: &mut Value,
        input: Value,
        turn: &mut TurnContext,
    ) -> Result<StepResult, DialogError> {
        let step = self.steps.get(index).ok_or_else(|| {
            DialogError::invalid_step(
                &self.id,
                index,
                format!("dialog only has {} steps", self.steps.len()),
            )
        })?;

        let mut typed: S = serde_json::from_value(state.clone()).map_err(|e| self.codec_error(e))?;
        let result = {
            let mut ctx = StepContext::new(&mut typed, input, turn, &self.id, index);
            step(&mut ctx)?
        };
        *state = serde_json::to_value(&typed).map_err(|e| self.codec_error(e))?;
        Ok(result)
    }

    fn prompt_config(&self, prompt_id: &str) -> Option<&PromptConfig> {
        self.prompts.get(prompt_id)
    }

    fn children(&self) -> &[Arc<dyn Dialog>] {
        &self.children
    }

    fn user_properties(&self) -> &[String] {
        &self.user_properties
    }

    fn conversation_properties(&self) -> &[String] {
        &self.conversation_properties
    }
}

// ============================================================================
// Dialog Set
// ============================================================================

/// Registry of dialogs by id, including nested children
#[derive(Clone, Default)]
pub struct DialogSet {
    dialogs: HashMap<String, Arc<dyn Dialog>>,
    user_properties: BTreeSet<String>,
    conversation_properties: BTreeSet<String>,
}

impl fmt::Debug for DialogSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DialogSet")
            .field("dialogs", &self.ids())
            .field("user_properties", &self.user_properties)
            .field("conversation_properties", &self.conversation_properties)
            .finish()
    }
}

impl DialogSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a dialog and, recursively, its children
    ///
    /// # Errors
    ///
    /// `DuplicateDialog` when the dialog or one of its children reuses an id.
    pub fn add(&mut self, dialog: impl Dialog + 'static) -> Result<(), DialogError> {
        self.add_shared(Arc::new(dialog))
    }

    /// Register an already shared dialog
    ///
    /// # Errors
    ///
    /// `DuplicateDialog` when the dialog or one of its children reuses an id.
    pub fn add_shared(&mut self, dialog: Arc<dyn Dialog>) -> Result<(), DialogError> {
        if let Some(existing) = self.dialogs.get(dialog.id()) {
            // The same definition reachable through two parents is fine
            if std::ptr::addr_eq(Arc::as_ptr(existing), Arc::as_ptr(&dialog)) {
                return Ok(());
            }
            return Err(DialogError::DuplicateDialog(dialog.id().to_string()));
        }

        self.user_properties
            .extend(dialog.user_properties().iter().cloned());
        self.conversation_properties
            .extend(dialog.conversation_properties().iter().cloned());
        self.dialogs.insert(dialog.id().to_string(), Arc::clone(&dialog));

        for child in dialog.children() {
            self.add_shared(Arc::clone(child))?;
        }
        Ok(())
    }

    /// Builder form of [`DialogSet::add`]
    ///
    /// # Errors
    ///
    /// `DuplicateDialog` when the dialog or one of its children reuses an id.
    pub fn with(mut self, dialog: impl Dialog + 'static) -> Result<Self, DialogError> {
        self.add(dialog)?;
        Ok(self)
    }

    #[must_use]
    pub fn get(&self, dialog_id: &str) -> Option<&Arc<dyn Dialog>> {
        self.dialogs.get(dialog_id)
    }

    /// Lookup that fails with `UnknownDialog`
    ///
    /// # Errors
    ///
    /// `UnknownDialog` when nothing is registered under `dialog_id`.
    pub fn find(&self, dialog_id: &str) -> Result<&Arc<dyn Dialog>, DialogError> {
        self.get(dialog_id)
            .ok_or_else(|| DialogError::UnknownDialog(dialog_id.to_string()))
    }

    #[must_use]
    pub fn contains(&self, dialog_id: &str) -> bool {
        self.dialogs.contains_key(dialog_id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.dialogs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.dialogs.is_empty()
    }

    /// Registered ids, sorted
    #[must_use]
    pub fn ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.dialogs.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    /// Track a user property outside of any dialog declaration
    pub fn track_user_property(&mut self, property: impl Into<String>) {
        self.user_properties.insert(property.into());
    }

    pub fn track_conversation_property(&mut self, property: impl Into<String>) {
        self.conversation_properties.insert(property.into());
    }

    pub fn user_properties(&self) -> impl Iterator<Item = &str> {
        self.user_properties.iter().map(String::as_str)
    }

    pub fn conversation_properties(&self) -> impl Iterator<Item = &str> {
        self.conversation_properties.iter().map(String::as_str)
    }
}

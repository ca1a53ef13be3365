//! # State Model Definitions
//!
//! A [`StateModelDefinition`] is an immutable table of states and `(from, to)`
//! transitions, each bound to a [`TransitionHandler`]. It is assembled through
//! [`StateModelDefinitionBuilder`], which rejects inconsistent tables before any
//! message is processed.
//!
//! ```rust,ignore
//! let model = StateModelDefinition::builder("MasterSlave")
//!     .initial_state("OFFLINE")
//!     .states(["OFFLINE", "SLAVE", "MASTER"])
//!     .transition_fn("OFFLINE", "SLAVE", |msg, _ctx| Ok(()))
//!     .transition_fn("SLAVE", "MASTER", |msg, _ctx| Ok(()))
//!     .build()?;
//! ```

use super::error::{BoxError, DefinitionError};
use crate::model::{Message, NotificationContext};
use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::fmt;
use std::sync::Arc;

/// Terminal state every instance can reach from any state.
pub const DROPPED: &str = "DROPPED";

/// `fromState` of a drop that applies whatever the current state is.
pub const ANY_STATE: &str = "*";

/// Work performed when an instance moves along one declared edge.
#[async_trait]
pub trait TransitionHandler: Send + Sync {
    async fn on_transition(
        &self,
        message: &Message,
        context: &NotificationContext,
    ) -> Result<(), BoxError>;
}

/// Adapts a synchronous closure into a [`TransitionHandler`].
pub struct FnHandler<F>(F);

pub fn handler_fn<F>(f: F) -> FnHandler<F>
where
    F: Fn(&Message, &NotificationContext) -> Result<(), BoxError> + Send + Sync + 'static,
{
    FnHandler(f)
}

#[async_trait]
impl<F> TransitionHandler for FnHandler<F>
where
    F: Fn(&Message, &NotificationContext) -> Result<(), BoxError> + Send + Sync + 'static,
{
    async fn on_transition(
        &self,
        message: &Message,
        context: &NotificationContext,
    ) -> Result<(), BoxError> {
        (self.0)(message, context)
    }
}

/// Used for the implicit `(*, DROPPED)` edge when no handler was declared.
pub struct NoopHandler;

#[async_trait]
impl TransitionHandler for NoopHandler {
    async fn on_transition(&self, _: &Message, _: &NotificationContext) -> Result<(), BoxError> {
        Ok(())
    }
}

pub struct StateModelDefinition {
    name: String,
    initial_state: String,
    valid_states: BTreeSet<String>,
    transitions: HashMap<(String, String), Arc<dyn TransitionHandler>>,
}

impl StateModelDefinition {
    pub fn builder(name: impl Into<String>) -> StateModelDefinitionBuilder {
        StateModelDefinitionBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn initial_state(&self) -> &str {
        &self.initial_state
    }

    pub fn valid_states(&self) -> impl Iterator<Item = &str> {
        self.valid_states.iter().map(String::as_str)
    }

    pub fn is_valid_state(&self, state: &str) -> bool {
        state == DROPPED || self.valid_states.contains(state)
    }

    /// Handler for `(from, to)`. Dropping is always permitted and falls back to a
    /// no-op when no handler was declared for it.
    pub fn handler(&self, from: &str, to: &str) -> Option<Arc<dyn TransitionHandler>> {
        match self.transitions.get(&(from.to_string(), to.to_string())) {
            Some(handler) => Some(handler.clone()),
            None if to == DROPPED => Some(Arc::new(NoopHandler)),
            None => None,
        }
    }

    pub fn transitions(&self) -> Vec<(&str, &str)> {
        let mut edges: Vec<(&str, &str)> = self
            .transitions
            .keys()
            .map(|(from, to)| (from.as_str(), to.as_str()))
            .collect();
        edges.sort();
        edges
    }
}

impl fmt::Debug for StateModelDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateModelDefinition")
            .field("name", &self.name)
            .field("initial_state", &self.initial_state)
            .field("valid_states", &self.valid_states)
            .field("transitions", &self.transitions())
            .finish()
    }
}

pub struct StateModelDefinitionBuilder {
    name: String,
    initial_state: Option<String>,
    valid_states: BTreeSet<String>,
    transitions: Vec<(String, String, Arc<dyn TransitionHandler>)>,
}

impl StateModelDefinitionBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            initial_state: None,
            valid_states: BTreeSet::new(),
            transitions: Vec::new(),
        }
    }

    /// Sets the initial state and adds it to the valid states.
    pub fn initial_state(mut self, state: impl Into<String>) -> Self {
        let state = state.into();
        self.valid_states.insert(state.clone());
        self.initial_state = Some(state);
        self
    }

    pub fn states<I, S>(mut self, states: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.valid_states.extend(states.into_iter().map(Into::into));
        self
    }

    pub fn transition(
        mut self,
        from: impl Into<String>,
        to: impl Into<String>,
        handler: Arc<dyn TransitionHandler>,
    ) -> Self {
        self.transitions.push((from.into(), to.into(), handler));
        self
    }

    pub fn transition_fn<F>(self, from: impl Into<String>, to: impl Into<String>, f: F) -> Self
    where
        F: Fn(&Message, &NotificationContext) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.transition(from, to, Arc::new(handler_fn(f)))
    }

    pub fn build(self) -> Result<StateModelDefinition, DefinitionError> {
        let initial_state = self
            .initial_state
            .ok_or_else(|| DefinitionError::MissingInitialState(self.name.clone()))?;
        // DROPPED is implicit and may not be declared as a regular state.
        if initial_state == DROPPED {
            return Err(DefinitionError::InvalidInitialState {
                model: self.name,
                state: initial_state,
            });
        }
        let mut valid_states = self.valid_states;
        valid_states.remove(DROPPED);

        let mut transitions = HashMap::with_capacity(self.transitions.len());
        for (from, to, handler) in self.transitions {
            if from == DROPPED {
                return Err(DefinitionError::TransitionFromDropped { from, to });
            }
            for state in [&from, &to] {
                if state != DROPPED && !valid_states.contains(state.as_str()) {
                    return Err(DefinitionError::UnknownState {
                        state: state.clone(),
                        from: from.clone(),
                        to: to.clone(),
                    });
                }
            }
            if transitions.contains_key(&(from.clone(), to.clone())) {
                return Err(DefinitionError::DuplicateTransition { from, to });
            }
            transitions.insert((from, to), handler);
        }

        check_reachable(&initial_state, &valid_states, &transitions)?;

        Ok(StateModelDefinition {
            name: self.name,
            initial_state,
            valid_states,
            transitions,
        })
    }
}

fn check_reachable(
    initial: &str,
    states: &BTreeSet<String>,
    transitions: &HashMap<(String, String), Arc<dyn TransitionHandler>>,
) -> Result<(), DefinitionError> {
    let mut seen: HashSet<&str> = HashSet::from([initial]);
    let mut queue = VecDeque::from([initial]);
    while let Some(state) = queue.pop_front() {
        for (from, to) in transitions.keys() {
            if from == state && seen.insert(to.as_str()) {
                queue.push_back(to.as_str());
            }
        }
    }
    match states.iter().find(|s| !seen.contains(s.as_str())) {
        Some(unreachable) => Err(DefinitionError::UnreachableState(unreachable.clone())),
        None => Ok(()),
    }
}

//! The partial-model storage contract and a dense in-memory backend.
//!
//! A model stores, per explored state, an ordered list of actions. Action
//! positions are structural: they are assigned when the state is explored and
//! never reordered. Only the distribution content of an action evolves
//! afterwards (the statistical engines rewrite it as evidence accumulates).

use crate::distribution::Distribution;
use serde::{Deserialize, Serialize};
use sw_common::{Error, Result, StateId};

/// One choice of a state: a distribution over successors plus an optional
/// opaque label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    pub distribution: Distribution,
    pub label: Option<String>,
}

impl Action {
    pub fn new(distribution: Distribution, label: Option<String>) -> Self {
        Self {
            distribution,
            label,
        }
    }

    pub fn unlabelled(distribution: Distribution) -> Self {
        Self {
            distribution,
            label: None,
        }
    }
}

/// Storage backend for a partial model.
///
/// All state-addressed operations are checked: an out-of-range id is the
/// [`Error::UnknownState`] contract violation. Mutators may additionally be
/// rejected by read-only implementations such as the collapse view.
pub trait Model {
    /// Number of states the model knows about (explored or not).
    fn num_states(&self) -> usize;

    /// Allocate the next state id.
    fn add_state(&mut self) -> Result<StateId>;

    /// Append an action to a state's choice list.
    fn add_choice(&mut self, state: StateId, action: Action) -> Result<()>;

    /// The ordered action list of a state.
    fn actions(&self, state: StateId) -> Result<Vec<Action>>;

    /// Replace the ordered action list of a state.
    fn set_actions(&mut self, state: StateId, actions: Vec<Action>) -> Result<()>;

    /// The distributions of a state's actions, in action order.
    fn choices(&self, state: StateId) -> Result<Vec<Distribution>> {
        Ok(self
            .actions(state)?
            .into_iter()
            .map(|action| action.distribution)
            .collect())
    }

    fn num_choices(&self, state: StateId) -> Result<usize> {
        Ok(self.actions(state)?.len())
    }

    fn initial_states(&self) -> Vec<StateId>;

    fn set_initial_states(&mut self, states: Vec<StateId>) -> Result<()>;

    fn add_initial_state(&mut self, state: StateId) -> Result<()>;
}

/// Vector-arena model: per-state ordered action lists indexed by id.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DenseModel {
    states: Vec<Vec<Action>>,
    initial: Vec<StateId>,
}

impl DenseModel {
    pub fn new() -> Self {
        Self::default()
    }

    fn check(&self, state: StateId) -> Result<()> {
        if state < self.states.len() {
            Ok(())
        } else {
            Err(Error::UnknownState(state))
        }
    }
}

impl Model for DenseModel {
    fn num_states(&self) -> usize {
        self.states.len()
    }

    fn add_state(&mut self) -> Result<StateId> {
        let id = self.states.len();
        self.states.push(Vec::new());
        Ok(id)
    }

    fn add_choice(&mut self, state: StateId, action: Action) -> Result<()> {
        self.check(state)?;
        self.states[state].push(action);
        Ok(())
    }

    fn actions(&self, state: StateId) -> Result<Vec<Action>> {
        self.check(state)?;
        Ok(self.states[state].clone())
    }

    fn set_actions(&mut self, state: StateId, actions: Vec<Action>) -> Result<()> {
        self.check(state)?;
        self.states[state] = actions;
        Ok(())
    }

    fn initial_states(&self) -> Vec<StateId> {
        self.initial.clone()
    }

    fn set_initial_states(&mut self, states: Vec<StateId>) -> Result<()> {
        for &state in &states {
            self.check(state)?;
        }
        self.initial = states;
        Ok(())
    }

    fn add_initial_state(&mut self, state: StateId) -> Result<()> {
        self.check(state)?;
        self.initial.push(state);
        Ok(())
    }
}

//! Bijection between external state objects and dense ids.

use std::collections::HashMap;
use std::hash::Hash;
use sw_common::{Error, Result, StateId};

/// Maps opaque external states to dense 0-based ids, assigned in first-seen
/// order and never reused or renumbered. No deletions.
#[derive(Debug, Clone, Default)]
pub struct StateIndex<S> {
    ids: HashMap<S, StateId>,
    states: Vec<S>,
}

impl<S: Eq + Hash + Clone> StateIndex<S> {
    pub fn new() -> Self {
        Self {
            ids: HashMap::new(),
            states: Vec::new(),
        }
    }

    /// Number of known states.
    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn contains(&self, state: &S) -> bool {
        self.ids.contains_key(state)
    }

    /// The id of `state`, if it has been seen.
    pub fn id_of(&self, state: &S) -> Option<StateId> {
        self.ids.get(state).copied()
    }

    /// Return the existing id of `state`, or allocate the next sequential id
    /// and record the mapping.
    pub fn get_or_insert(&mut self, state: S) -> StateId {
        if let Some(&id) = self.ids.get(&state) {
            return id;
        }
        let id = self.states.len();
        self.states.push(state.clone());
        self.ids.insert(state, id);
        id
    }

    /// The external state behind `id`. Unknown ids are a contract violation.
    pub fn state_of(&self, id: StateId) -> Result<&S> {
        self.states.get(id).ok_or(Error::UnknownState(id))
    }
}

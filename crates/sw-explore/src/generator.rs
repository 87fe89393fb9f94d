//! State-space oracle interface.
//!
//! A [`Generator`] supplies, on demand, the initial states and the outgoing
//! choices of any state. It is the only source of structural information the
//! engines have; nothing is materialized until a state is explored.
//!
//! Generator failures are domain-specific and propagate unchanged through
//! exploration, wrapped as [`sw_common::Error::Oracle`].

use sw_common::Result;

/// One nondeterministic choice of a state: an optional opaque label and a
/// weighted successor list. Weights are probabilities for discrete-time
/// models and rates for the continuous-time engine; duplicate successors are
/// summed when the engine builds the distribution.
#[derive(Debug, Clone, PartialEq)]
pub struct Choice<S> {
    pub label: Option<String>,
    pub transitions: Vec<(S, f64)>,
}

impl<S> Choice<S> {
    pub fn new(label: Option<String>, transitions: Vec<(S, f64)>) -> Self {
        Self { label, transitions }
    }

    pub fn unlabelled(transitions: Vec<(S, f64)>) -> Self {
        Self {
            label: None,
            transitions,
        }
    }
}

/// External oracle producing the state space on demand.
pub trait Generator<S> {
    /// The initial states of the model.
    fn initial_states(&self) -> Result<Vec<S>>;

    /// The outgoing choices of `state`.
    fn choices(&self, state: &S) -> Result<Vec<Choice<S>>>;
}

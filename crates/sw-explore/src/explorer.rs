//! Common exploration contract and the full-information engine.
//!
//! Every engine wraps a model, a generator, and the self-loop policy, and
//! materializes states lazily: `state_id` allocates a dense id in lockstep
//! with the model, `explore_state` queries the oracle exactly once for a
//! state's choices and freezes its action structure. Exploring an unknown or
//! already-explored state is a contract violation.

use crate::generator::{Choice, Generator};
use sw_common::{Error, InformationLevel, Result, StateId};
use sw_model::{Action, Distribution, DistributionBuilder, Model, StateIndex};

use crate::evidence::{BlackExplorer, GreyExplorer};
use crate::sample::SamplingSource;
use std::hash::Hash;
use sw_common::ExploreConfig;
use tracing::trace;

/// Common contract of the exploration engines.
pub trait Explorer<S, M: Model> {
    /// The partial model being populated.
    fn model(&self) -> &M;

    /// Materialize a known, not-yet-explored state: query the oracle for its
    /// choices and register one action per choice.
    fn explore_state(&mut self, state: StateId) -> Result<()>;

    fn is_explored(&self, state: StateId) -> bool;

    /// The id of `state`, allocating the next dense id (and the model state)
    /// on first sight.
    fn state_id(&mut self, state: S) -> Result<StateId>;

    /// The external state behind an id.
    fn state(&self, id: StateId) -> Option<&S>;

    /// Explored state ids in ascending order.
    fn explored_states(&self) -> Vec<StateId>;

    fn explored_state_count(&self) -> usize;

    fn initial_states(&self) -> Vec<StateId>;

    /// The distributions currently visible for an explored state.
    fn choices(&self, state: StateId) -> Result<Vec<Distribution>>;

    /// The actions currently visible for an explored state.
    fn actions(&self, state: StateId) -> Result<Vec<Action>>;
}

/// State shared by every engine: the index bijection, the explored set, the
/// model, and the self-loop policy.
pub(crate) struct ExplorationCore<S, M> {
    pub(crate) index: StateIndex<S>,
    explored: Vec<bool>,
    explored_count: usize,
    pub(crate) model: M,
    pub(crate) remove_self_loops: bool,
}

impl<S, M> ExplorationCore<S, M>
where
    S: Eq + Hash + Clone,
    M: Model,
{
    pub(crate) fn new(model: M, remove_self_loops: bool) -> Result<Self> {
        if model.num_states() != 0 {
            return Err(Error::NonEmptyTarget);
        }
        Ok(Self {
            index: StateIndex::new(),
            explored: Vec::new(),
            explored_count: 0,
            model,
            remove_self_loops,
        })
    }

    pub(crate) fn state_id(&mut self, state: S) -> Result<StateId> {
        if let Some(id) = self.index.id_of(&state) {
            return Ok(id);
        }
        let id = self.model.add_state()?;
        let assigned = self.index.get_or_insert(state);
        debug_assert_eq!(assigned, id);
        Ok(assigned)
    }

    pub(crate) fn is_explored(&self, state: StateId) -> bool {
        self.explored.get(state).copied().unwrap_or(false)
    }

    /// Check the `explore_state` precondition.
    pub(crate) fn begin_explore(&self, state: StateId) -> Result<()> {
        if state >= self.index.len() {
            return Err(Error::UnknownState(state));
        }
        if self.is_explored(state) {
            return Err(Error::AlreadyExplored(state));
        }
        Ok(())
    }

    pub(crate) fn mark_explored(&mut self, state: StateId) {
        if self.explored.len() <= state {
            self.explored.resize(state + 1, false);
        }
        debug_assert!(!self.explored[state]);
        self.explored[state] = true;
        self.explored_count += 1;
    }

    pub(crate) fn ensure_explored(&self, state: StateId) -> Result<()> {
        if self.is_explored(state) {
            Ok(())
        } else if state >= self.index.len() {
            Err(Error::UnknownState(state))
        } else {
            Err(Error::NotExplored(state))
        }
    }

    pub(crate) fn explored_states(&self) -> Vec<StateId> {
        self.explored
            .iter()
            .enumerate()
            .filter_map(|(state, &explored)| explored.then_some(state))
            .collect()
    }

    pub(crate) fn explored_count(&self) -> usize {
        self.explored_count
    }

    /// Build a distribution over successor ids from oracle transitions,
    /// applying the self-loop policy: a dropped self-transition rescales the
    /// remaining mass to sum to 1.
    pub(crate) fn build_distribution(
        &mut self,
        source: StateId,
        transitions: Vec<(S, f64)>,
    ) -> Result<Distribution> {
        let mut builder = DistributionBuilder::new();
        let mut skipped_any = false;
        for (successor, probability) in transitions {
            let target = self.state_id(successor)?;
            if self.remove_self_loops && target == source {
                skipped_any = true;
            } else {
                builder.add(target, probability);
            }
        }
        let distribution = if skipped_any {
            builder.scaled()
        } else {
            builder.build()
        };
        debug_assert!(distribution.is_normalized(), "{distribution:?}");
        Ok(distribution)
    }
}

/// Full-information engine: the distribution written at exploration time is
/// the true oracle distribution, and no learning happens afterwards. This is
/// the baseline the statistical engines are validated against.
pub struct DefaultExplorer<S, M, G> {
    core: ExplorationCore<S, M>,
    generator: G,
}

impl<S, M, G> DefaultExplorer<S, M, G>
where
    S: Eq + Hash + Clone,
    M: Model,
    G: Generator<S>,
{
    /// Create an engine over an empty model and explore all oracle initial
    /// states.
    pub fn of(model: M, generator: G, remove_self_loops: bool) -> Result<Self> {
        let mut explorer = Self {
            core: ExplorationCore::new(model, remove_self_loops)?,
            generator,
        };
        let mut initial = Vec::new();
        for state in explorer.generator.initial_states()? {
            let id = explorer.core.state_id(state)?;
            explorer.explore(id)?;
            initial.push(id);
        }
        explorer.core.model.set_initial_states(initial)?;
        Ok(explorer)
    }

    fn explore(&mut self, state: StateId) -> Result<()> {
        self.core.begin_explore(state)?;
        let external = self.core.index.state_of(state)?.clone();
        let choices = self.generator.choices(&external)?;
        trace!(state, choices = choices.len(), "exploring state");

        for Choice { label, transitions } in choices {
            let distribution = self.core.build_distribution(state, transitions)?;
            self.core.model.add_choice(state, Action::new(distribution, label))?;
        }
        self.core.mark_explored(state);
        Ok(())
    }
}

impl<S, M, G> Explorer<S, M> for DefaultExplorer<S, M, G>
where
    S: Eq + Hash + Clone,
    M: Model,
    G: Generator<S>,
{
    fn model(&self) -> &M {
        &self.core.model
    }

    fn explore_state(&mut self, state: StateId) -> Result<()> {
        self.explore(state)
    }

    fn is_explored(&self, state: StateId) -> bool {
        self.core.is_explored(state)
    }

    fn state_id(&mut self, state: S) -> Result<StateId> {
        self.core.state_id(state)
    }

    fn state(&self, id: StateId) -> Option<&S> {
        self.core.index.state_of(id).ok()
    }

    fn explored_states(&self) -> Vec<StateId> {
        self.core.explored_states()
    }

    fn explored_state_count(&self) -> usize {
        self.core.explored_count()
    }

    fn initial_states(&self) -> Vec<StateId> {
        self.core.model.initial_states()
    }

    fn choices(&self, state: StateId) -> Result<Vec<Distribution>> {
        self.core.ensure_explored(state)?;
        self.core.model.choices(state)
    }

    fn actions(&self, state: StateId) -> Result<Vec<Action>> {
        self.core.ensure_explored(state)?;
        self.core.model.actions(state)
    }
}

/// An engine of any information level, for callers wiring the choice from
/// configuration.
pub enum AnyExplorer<S, M, G> {
    Whitebox(DefaultExplorer<S, M, G>),
    Blackbox(BlackExplorer<S, M, G>),
    Greybox(GreyExplorer<S, M, G>),
}

/// Construct the engine matching `level` and explore the oracle's initial
/// states. The sampler is unused for the whitebox level.
pub fn explorer_for<S, M, G>(
    level: InformationLevel,
    model: M,
    generator: G,
    config: &ExploreConfig,
    sampler: Box<dyn SamplingSource>,
) -> Result<AnyExplorer<S, M, G>>
where
    S: Eq + Hash + Clone,
    M: Model,
    G: Generator<S>,
{
    config.validate()?;
    Ok(match level {
        InformationLevel::Whitebox => AnyExplorer::Whitebox(DefaultExplorer::of(
            model,
            generator,
            config.remove_self_loops,
        )?),
        InformationLevel::Blackbox => {
            AnyExplorer::Blackbox(BlackExplorer::of(model, generator, config, sampler)?)
        }
        InformationLevel::Greybox => {
            AnyExplorer::Greybox(GreyExplorer::of(model, generator, config, sampler)?)
        }
    })
}

macro_rules! delegate {
    ($self:ident, $inner:ident => $body:expr) => {
        match $self {
            AnyExplorer::Whitebox($inner) => $body,
            AnyExplorer::Blackbox($inner) => $body,
            AnyExplorer::Greybox($inner) => $body,
        }
    };
}

impl<S, M, G> Explorer<S, M> for AnyExplorer<S, M, G>
where
    S: Eq + Hash + Clone,
    M: Model,
    G: Generator<S>,
{
    fn model(&self) -> &M {
        delegate!(self, inner => inner.model())
    }

    fn explore_state(&mut self, state: StateId) -> Result<()> {
        delegate!(self, inner => inner.explore_state(state))
    }

    fn is_explored(&self, state: StateId) -> bool {
        delegate!(self, inner => inner.is_explored(state))
    }

    fn state_id(&mut self, state: S) -> Result<StateId> {
        delegate!(self, inner => inner.state_id(state))
    }

    fn state(&self, id: StateId) -> Option<&S> {
        delegate!(self, inner => inner.state(id))
    }

    fn explored_states(&self) -> Vec<StateId> {
        delegate!(self, inner => inner.explored_states())
    }

    fn explored_state_count(&self) -> usize {
        delegate!(self, inner => inner.explored_state_count())
    }

    fn initial_states(&self) -> Vec<StateId> {
        delegate!(self, inner => inner.initial_states())
    }

    fn choices(&self, state: StateId) -> Result<Vec<Distribution>> {
        delegate!(self, inner => inner.choices(state))
    }

    fn actions(&self, state: StateId) -> Result<Vec<Action>> {
        delegate!(self, inner => inner.actions(state))
    }
}

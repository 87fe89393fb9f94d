//! Statistical exploration engine.
//!
//! One engine backs both sampling regimes. At exploration time the model
//! receives a *placeholder empty distribution* per action — the true oracle
//! distribution is retained privately for sampling only, and analysis code
//! never reads it. Evidence arrives as per-(state, action, successor) visit
//! counts; learned distributions are recomputed from the counts (weights =
//! count / total, with the configured self-loop skip + rescale rule) and
//! pushed into the model either immediately or in batches.
//!
//! The regimes differ only in when an action is *trusted* enough to be shown
//! while the action filter is active, so that variance is a
//! [`TrustCriterion`] type parameter:
//! - [`SampleCountTrust`] (black-box): total count exceeds the threshold
//!   τ = ln(confidence) / ln(1 − p_min)
//! - [`SupportTrust`] (grey-box): every true successor has been observed
//!
//! The continuous-time capability is composed in, not inherited: engines
//! built with [`CtmdpExplorer::of_ctmdp`] capture per-successor rates, derive
//! the sampling distribution by normalizing them, and draw an exponential
//! sojourn time (rate = the action's summed successor rates) for every
//! counted sample.

use crate::explorer::{ExplorationCore, Explorer};
use crate::generator::{Choice, Generator};
use crate::sample::SamplingSource;
use std::collections::HashMap;
use std::hash::Hash;
use sw_common::{Error, ExploreConfig, Result, StateId};
use sw_model::{Action, Distribution, DistributionBuilder, Model};
use tracing::{debug, trace};

/// Evidence snapshot of one (state, action) pair, as seen by a trust
/// criterion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionEvidence {
    /// Total visits (sum of per-successor counts).
    pub total_count: u64,
    /// Distinct successors observed, after the self-loop policy.
    pub observed_support: usize,
    /// True support size of the hidden distribution.
    pub true_support: usize,
}

/// Decides whether an action carries enough evidence to stay visible while
/// the action filter is active.
pub trait TrustCriterion {
    fn trusted(&self, evidence: &ActionEvidence, threshold: f64) -> bool;
}

/// Black-box trust: the total sample count exceeds τ.
#[derive(Debug, Clone, Copy, Default)]
pub struct SampleCountTrust;

impl TrustCriterion for SampleCountTrust {
    fn trusted(&self, evidence: &ActionEvidence, threshold: f64) -> bool {
        evidence.total_count as f64 > threshold
    }
}

/// Grey-box trust: the observed support equals the true support. Actions
/// with no observed successor are never shown.
#[derive(Debug, Clone, Copy, Default)]
pub struct SupportTrust;

impl TrustCriterion for SupportTrust {
    fn trusted(&self, evidence: &ActionEvidence, _threshold: f64) -> bool {
        evidence.observed_support > 0 && evidence.observed_support == evidence.true_support
    }
}

/// Per-state learning tables, allocated when the state is explored.
struct StateEvidence {
    /// True oracle actions, used for sampling only.
    hidden: Vec<Action>,
    /// Per action, successor → visit count.
    counts: Vec<HashMap<StateId, u64>>,
    /// Per action, whether counts changed since the last model write.
    dirty: Vec<bool>,
}

/// Snapshot taken by `activate_filter`, dropped as a unit on deactivation.
struct FilterState {
    /// Unfiltered model action lists, restored verbatim on deactivation.
    snapshot: HashMap<StateId, Vec<Action>>,
    /// Per state, filtered index → true index.
    index_map: HashMap<StateId, Vec<usize>>,
}

/// Continuous-time evidence, present only for engines built with
/// [`CtmdpExplorer::of_ctmdp`].
#[derive(Default)]
struct TimingTable {
    per_state: Vec<Option<StateTiming>>,
}

#[derive(Default)]
struct StateTiming {
    /// Per action, successor → rate as reported by the oracle.
    rates: Vec<HashMap<StateId, f64>>,
    /// Per action, the summed successor rates (the exit rate).
    exit_rates: Vec<f64>,
    /// Per action, the recorded sojourn times.
    sojourns: Vec<Vec<f64>>,
}

/// Sampling-based exploration engine, parameterized by trust criterion.
pub struct EvidenceExplorer<S, M, G, T> {
    core: ExplorationCore<S, M>,
    generator: G,
    trust: T,
    threshold: f64,
    sampler: Box<dyn SamplingSource>,
    evidence: Vec<Option<StateEvidence>>,
    filter: Option<FilterState>,
    explored_actions: usize,
    distinct_transitions: usize,
    new_fully_explored: bool,
    timing: Option<TimingTable>,
}

/// Black-box engine: actions are trusted once sampled more than τ times.
pub type BlackExplorer<S, M, G> = EvidenceExplorer<S, M, G, SampleCountTrust>;

/// Grey-box engine: actions are trusted once fully explored.
pub type GreyExplorer<S, M, G> = EvidenceExplorer<S, M, G, SupportTrust>;

/// Continuous-time black-box engine; construct with
/// [`CtmdpExplorer::of_ctmdp`].
pub type CtmdpExplorer<S, M, G> = EvidenceExplorer<S, M, G, SampleCountTrust>;

fn sum_counts(counts: &HashMap<StateId, u64>) -> u64 {
    counts.values().sum()
}

fn observed_support(
    counts: &HashMap<StateId, u64>,
    source: StateId,
    remove_self_loops: bool,
) -> usize {
    counts
        .keys()
        .filter(|&&target| !(remove_self_loops && target == source))
        .count()
}

/// Learned distribution of one action: weights = count / total, with the
/// self-loop skip + rescale rule. Zero total yields the empty distribution.
fn distribution_from_counts(
    counts: &HashMap<StateId, u64>,
    source: StateId,
    remove_self_loops: bool,
) -> Distribution {
    let total = sum_counts(counts);
    if total == 0 {
        return Distribution::empty();
    }
    let mut builder = DistributionBuilder::new();
    let mut skipped_any = false;
    for (&target, &count) in counts {
        let probability = count as f64 / total as f64;
        if remove_self_loops && target == source {
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
    distribution
}

fn action_evidence(
    entry: &StateEvidence,
    index: usize,
    source: StateId,
    remove_self_loops: bool,
) -> ActionEvidence {
    ActionEvidence {
        total_count: sum_counts(&entry.counts[index]),
        observed_support: observed_support(&entry.counts[index], source, remove_self_loops),
        true_support: entry.hidden[index].distribution.len(),
    }
}

impl<S, M, G, T> EvidenceExplorer<S, M, G, T>
where
    S: Eq + Hash + Clone,
    M: Model,
    G: Generator<S>,
    T: TrustCriterion + Default,
{
    /// Create an engine over an empty model and explore all oracle initial
    /// states.
    pub fn of(
        model: M,
        generator: G,
        config: &ExploreConfig,
        sampler: Box<dyn SamplingSource>,
    ) -> Result<Self> {
        Self::with_timing(model, generator, config, sampler, false)
    }

    fn with_timing(
        model: M,
        generator: G,
        config: &ExploreConfig,
        sampler: Box<dyn SamplingSource>,
        timed: bool,
    ) -> Result<Self> {
        config.validate()?;
        let mut explorer = Self {
            core: ExplorationCore::new(model, config.remove_self_loops)?,
            generator,
            trust: T::default(),
            threshold: config.action_trust_threshold(),
            sampler,
            evidence: Vec::new(),
            filter: None,
            explored_actions: 0,
            distinct_transitions: 0,
            new_fully_explored: false,
            timing: timed.then(TimingTable::default),
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
        if self.filter.is_some() {
            return Err(Error::FilterAlreadyActive);
        }
        self.core.begin_explore(state)?;
        let external = self.core.index.state_of(state)?.clone();
        let oracle_choices = self.generator.choices(&external)?;
        trace!(state, choices = oracle_choices.len(), "exploring state");

        let timed = self.timing.is_some();
        let mut hidden = Vec::with_capacity(oracle_choices.len());
        let mut counts = Vec::with_capacity(oracle_choices.len());
        let mut dirty = Vec::with_capacity(oracle_choices.len());
        let mut state_timing = timed.then(StateTiming::default);

        for Choice { label, transitions } in oracle_choices {
            let distribution = if let Some(state_timing) = &mut state_timing {
                // Weights are rates; the sampling distribution is their
                // normalization, self-loops retained.
                let mut rates: HashMap<StateId, f64> = HashMap::new();
                for (successor, rate) in transitions {
                    let target = self.core.state_id(successor)?;
                    *rates.entry(target).or_insert(0.0) += rate;
                }
                let exit_rate = rates.values().sum();
                let mut builder = DistributionBuilder::new();
                for (&target, &rate) in &rates {
                    builder.add(target, rate);
                }
                state_timing.rates.push(rates);
                state_timing.exit_rates.push(exit_rate);
                state_timing.sojourns.push(Vec::new());
                builder.scaled()
            } else {
                self.core.build_distribution(state, transitions)?
            };
            debug_assert!(distribution.is_normalized(), "{distribution:?}");

            // The model only sees an empty placeholder.
            self.core
                .model
                .add_choice(state, Action::new(Distribution::empty(), label.clone()))?;
            hidden.push(Action::new(distribution, label));
            counts.push(HashMap::new());
            dirty.push(false);
        }

        self.explored_actions += hidden.len();
        if self.evidence.len() <= state {
            self.evidence.resize_with(state + 1, || None);
        }
        self.evidence[state] = Some(StateEvidence {
            hidden,
            counts,
            dirty,
        });
        if let Some(timing) = &mut self.timing {
            if timing.per_state.len() <= state {
                timing.per_state.resize_with(state + 1, || None);
            }
            timing.per_state[state] = Some(state_timing.unwrap_or_default());
        }
        self.core.mark_explored(state);
        Ok(())
    }

    fn evidence_of(&self, state: StateId) -> Result<&StateEvidence> {
        self.evidence
            .get(state)
            .and_then(Option::as_ref)
            .ok_or_else(|| {
                if state >= self.core.index.len() {
                    Error::UnknownState(state)
                } else {
                    Error::NotExplored(state)
                }
            })
    }

    /// Translate an externally supplied action index into the true index.
    /// While the filter is active every public operation is expressed in
    /// filtered-index space; evidence storage is keyed by true index.
    fn true_index(&self, state: StateId, action: usize) -> Result<usize> {
        let entry = self.evidence_of(state)?;
        match &self.filter {
            Some(filter) => filter
                .index_map
                .get(&state)
                .and_then(|map| map.get(action))
                .copied()
                .ok_or(Error::UnknownAction { state, action }),
            None => {
                if action < entry.counts.len() {
                    Ok(action)
                } else {
                    Err(Error::UnknownAction { state, action })
                }
            }
        }
    }

    /// Record one observed transition.
    ///
    /// Increments the (state, action, successor) count, bumps the distinct
    /// transition counter on a first observation, and returns `true` exactly
    /// when the action's total count crosses the trust threshold from ≤ τ
    /// to > τ. With `apply_immediately` the learned distribution is written
    /// into the model at once; otherwise the pair is flagged dirty for a
    /// later [`Self::update_model_counts`].
    pub fn update_counts(
        &mut self,
        state: StateId,
        action: usize,
        successor: StateId,
        apply_immediately: bool,
    ) -> Result<bool> {
        let index = self.true_index(state, action)?;
        let threshold = self.threshold;
        let remove_self_loops = self.core.remove_self_loops;

        let Some(entry) = self.evidence.get_mut(state).and_then(Option::as_mut) else {
            return Err(Error::NotExplored(state));
        };
        let count = entry.counts[index].entry(successor).or_insert(0);
        *count += 1;
        let first_observation = *count == 1;

        let total = sum_counts(&entry.counts[index]);
        let crossed = total as f64 > threshold && (total - 1) as f64 <= threshold;

        if first_observation {
            self.distinct_transitions += 1;
            let evidence = action_evidence(entry, index, state, remove_self_loops);
            if evidence.observed_support == evidence.true_support {
                self.new_fully_explored = true;
            }
        }

        if apply_immediately {
            let distribution =
                distribution_from_counts(&entry.counts[index], state, remove_self_loops);
            entry.dirty[index] = false;
            let mut actions = self.core.model.actions(state)?;
            let slot = actions
                .get_mut(action)
                .ok_or(Error::UnknownAction { state, action })?;
            *slot = Action::new(distribution, slot.label.clone());
            self.core.model.set_actions(state, actions)?;
        } else {
            entry.dirty[index] = true;
        }

        if let Some(timing) = &mut self.timing {
            if let Some(state_timing) = timing.per_state.get_mut(state).and_then(Option::as_mut) {
                let stay = self
                    .sampler
                    .sample_exponential(state_timing.exit_rates[index]);
                state_timing.sojourns[index].push(stay);
            }
        }

        Ok(crossed)
    }

    /// Total visits of a (state, action) pair.
    pub fn action_counts(&self, state: StateId, action: usize) -> Result<u64> {
        let index = self.true_index(state, action)?;
        let entry = self.evidence_of(state)?;
        Ok(sum_counts(&entry.counts[index]))
    }

    /// Push recomputed distributions into the model for every (state, action)
    /// the predicate selects. Dirty flags are left untouched; requires the
    /// filter to be inactive so indices are unambiguous.
    pub fn update_model(
        &mut self,
        mut selected: impl FnMut(StateId, usize) -> bool,
    ) -> Result<()> {
        if self.filter.is_some() {
            return Err(Error::FilterAlreadyActive);
        }
        let remove_self_loops = self.core.remove_self_loops;
        for state in self.core.explored_states() {
            let Some(entry) = self.evidence.get(state).and_then(Option::as_ref) else {
                continue;
            };
            let mut actions = self.core.model.actions(state)?;
            let mut changed = false;
            for index in 0..entry.counts.len() {
                if selected(state, index) {
                    let distribution =
                        distribution_from_counts(&entry.counts[index], state, remove_self_loops);
                    let label = actions[index].label.clone();
                    actions[index] = Action::new(distribution, label);
                    changed = true;
                }
            }
            if changed {
                self.core.model.set_actions(state, actions)?;
            }
        }
        Ok(())
    }

    /// Push recomputed distributions for every dirty (state, action) pair
    /// and clear the dirtiness. Calling this twice in a row without new
    /// evidence leaves the model unchanged the second time.
    pub fn update_model_counts(&mut self) -> Result<()> {
        if self.filter.is_some() {
            return Err(Error::FilterAlreadyActive);
        }
        let remove_self_loops = self.core.remove_self_loops;
        for state in self.core.explored_states() {
            let dirty_indices: Vec<usize> = {
                let Some(entry) = self.evidence.get(state).and_then(Option::as_ref) else {
                    continue;
                };
                entry
                    .dirty
                    .iter()
                    .enumerate()
                    .filter_map(|(index, &dirty)| dirty.then_some(index))
                    .collect()
            };
            if dirty_indices.is_empty() {
                continue;
            }
            let mut actions = self.core.model.actions(state)?;
            if let Some(entry) = self.evidence.get_mut(state).and_then(Option::as_mut) {
                for &index in &dirty_indices {
                    let distribution =
                        distribution_from_counts(&entry.counts[index], state, remove_self_loops);
                    let label = actions[index].label.clone();
                    actions[index] = Action::new(distribution, label);
                    entry.dirty[index] = false;
                }
            }
            self.core.model.set_actions(state, actions)?;
        }
        Ok(())
    }

    /// Draw an action index uniformly among the state's currently visible
    /// actions. `None` when the state has no visible action.
    pub fn sample_next_action(&mut self, state: StateId) -> Result<Option<usize>> {
        self.core.ensure_explored(state)?;
        let visible = self.core.model.num_choices(state)?;
        if visible == 0 {
            return Ok(None);
        }
        Ok(Some(self.sampler.sample_uniform(visible)))
    }

    /// Draw a successor from the **hidden** true distribution — the sampling
    /// oracle, not the learned view. `None` when the hidden distribution is
    /// empty (callers guard).
    pub fn sample_successor(&mut self, state: StateId, action: usize) -> Result<Option<StateId>> {
        let index = self.true_index(state, action)?;
        let unit = self.sampler.sample_unit();
        let entry = self.evidence_of(state)?;
        Ok(entry.hidden[index].distribution.sample(unit))
    }

    /// Sample the hidden distribution until the action's total count reaches
    /// `required_count`, accumulate all draws as one batch of evidence, and
    /// write the learned distribution into the model once.
    pub fn simulate_action_repeatedly(
        &mut self,
        state: StateId,
        action: usize,
        required_count: u64,
    ) -> Result<()> {
        let index = self.true_index(state, action)?;
        let (hidden, mut total) = {
            let entry = self.evidence_of(state)?;
            (
                entry.hidden[index].distribution.clone(),
                sum_counts(&entry.counts[index]),
            )
        };
        if hidden.is_empty() {
            if total < required_count {
                debug!(state, action, "action has no sampleable successors");
            }
            return Ok(());
        }
        let exit_rate = self.timing.as_ref().and_then(|timing| {
            timing
                .per_state
                .get(state)
                .and_then(Option::as_ref)
                .map(|state_timing| state_timing.exit_rates[index])
        });

        let mut batch: HashMap<StateId, u64> = HashMap::new();
        let mut sojourns = Vec::new();
        while total < required_count {
            let unit = self.sampler.sample_unit();
            let Some(successor) = hidden.sample(unit) else {
                break;
            };
            *batch.entry(successor).or_insert(0) += 1;
            if let Some(rate) = exit_rate {
                sojourns.push(self.sampler.sample_exponential(rate));
            }
            total += 1;
        }

        let remove_self_loops = self.core.remove_self_loops;
        let Some(entry) = self.evidence.get_mut(state).and_then(Option::as_mut) else {
            return Err(Error::NotExplored(state));
        };
        for (successor, count) in batch {
            *entry.counts[index].entry(successor).or_insert(0) += count;
        }
        let distribution = distribution_from_counts(&entry.counts[index], state, remove_self_loops);
        entry.dirty[index] = false;

        let mut actions = self.core.model.actions(state)?;
        let slot = actions
            .get_mut(action)
            .ok_or(Error::UnknownAction { state, action })?;
        *slot = Action::new(distribution, slot.label.clone());
        self.core.model.set_actions(state, actions)?;

        if let Some(timing) = &mut self.timing {
            if let Some(state_timing) = timing.per_state.get_mut(state).and_then(Option::as_mut) {
                state_timing.sojourns[index].extend(sojourns);
            }
        }
        Ok(())
    }

    /// Replace each explored state's model actions with only the trusted
    /// ones, snapshotting the full lists and recording the filtered → true
    /// index mapping. While active, every index-taking operation translates
    /// through the mapping.
    pub fn activate_filter(&mut self) -> Result<()> {
        if self.filter.is_some() {
            return Err(Error::FilterAlreadyActive);
        }
        let remove_self_loops = self.core.remove_self_loops;
        let threshold = self.threshold;
        let mut snapshot = HashMap::new();
        let mut index_map = HashMap::new();

        for state in self.core.explored_states() {
            let actions = self.core.model.actions(state)?;
            let Some(entry) = self.evidence.get(state).and_then(Option::as_ref) else {
                continue;
            };
            let mut kept = Vec::new();
            let mut map = Vec::new();
            for (index, action) in actions.iter().enumerate() {
                let evidence = action_evidence(entry, index, state, remove_self_loops);
                if self.trust.trusted(&evidence, threshold) {
                    map.push(index);
                    kept.push(action.clone());
                }
            }
            self.core.model.set_actions(state, kept)?;
            snapshot.insert(state, actions);
            index_map.insert(state, map);
        }

        self.filter = Some(FilterState {
            snapshot,
            index_map,
        });
        trace!("action trust filter activated");
        Ok(())
    }

    /// Restore the full action lists bit-identically and drop the index
    /// mapping. The mapping's lifetime exactly matches the activation span.
    pub fn deactivate_filter(&mut self) -> Result<()> {
        let Some(filter) = self.filter.take() else {
            return Err(Error::FilterNotActive);
        };
        for (state, actions) in filter.snapshot {
            self.core.model.set_actions(state, actions)?;
        }
        trace!("action trust filter deactivated");
        Ok(())
    }

    pub fn is_filter_active(&self) -> bool {
        self.filter.is_some()
    }

    /// Number of actions registered across all explored states.
    pub fn num_explored_actions(&self) -> usize {
        self.explored_actions
    }

    /// Number of distinct (state, action, successor) triplets observed.
    pub fn num_transitions(&self) -> usize {
        self.distinct_transitions
    }

    pub fn trust_threshold(&self) -> f64 {
        self.threshold
    }

    /// Recompute τ from fresh confidence / p_min parameters.
    pub fn set_trust_params(&mut self, confidence: f64, p_min: f64) -> Result<()> {
        let config = ExploreConfig {
            remove_self_loops: self.core.remove_self_loops,
            confidence,
            p_min,
        };
        config.validate()?;
        self.threshold = config.action_trust_threshold();
        Ok(())
    }
}

impl<S, M, G> EvidenceExplorer<S, M, G, SupportTrust>
where
    S: Eq + Hash + Clone,
    M: Model,
    G: Generator<S>,
{
    /// Whether every true successor of the action has been observed.
    pub fn is_action_fully_explored(&self, state: StateId, action: usize) -> Result<bool> {
        let index = self.true_index(state, action)?;
        let entry = self.evidence_of(state)?;
        let evidence = action_evidence(entry, index, state, self.core.remove_self_loops);
        Ok(evidence.observed_support == evidence.true_support)
    }

    /// True support size of the action, known from the oracle.
    pub fn true_successor_count(&self, state: StateId, action: usize) -> Result<usize> {
        let index = self.true_index(state, action)?;
        let entry = self.evidence_of(state)?;
        Ok(entry.hidden[index].distribution.len())
    }

    /// Whether any action became fully explored since the last reset. Set by
    /// [`Self::update_counts`] on first-time observations, so callers can
    /// re-run analysis only when new exact information appeared.
    pub fn has_new_fully_explored_action(&self) -> bool {
        self.new_fully_explored
    }

    pub fn reset_fully_explored_flag(&mut self) {
        self.new_fully_explored = false;
    }
}

impl<S, M, G> EvidenceExplorer<S, M, G, SampleCountTrust>
where
    S: Eq + Hash + Clone,
    M: Model,
    G: Generator<S>,
{
    /// Create a continuous-time engine: oracle weights are rates, sampling
    /// distributions are their normalization, and every counted sample draws
    /// a sojourn time.
    pub fn of_ctmdp(
        model: M,
        generator: G,
        config: &ExploreConfig,
        sampler: Box<dyn SamplingSource>,
    ) -> Result<Self> {
        Self::with_timing(model, generator, config, sampler, true)
    }

    fn timing_of(&self, state: StateId) -> Result<&StateTiming> {
        let timing = self.timing.as_ref().ok_or(Error::TimingUnavailable)?;
        timing
            .per_state
            .get(state)
            .and_then(Option::as_ref)
            .ok_or_else(|| {
                if state >= self.core.index.len() {
                    Error::UnknownState(state)
                } else {
                    Error::NotExplored(state)
                }
            })
    }

    /// Sojourn times recorded for a (state, action) pair.
    pub fn transition_times(&self, state: StateId, action: usize) -> Result<&[f64]> {
        let index = self.true_index(state, action)?;
        Ok(&self.timing_of(state)?.sojourns[index])
    }

    /// The action's exit rate: the sum of its successor rates.
    pub fn exit_rate(&self, state: StateId, action: usize) -> Result<f64> {
        let index = self.true_index(state, action)?;
        Ok(self.timing_of(state)?.exit_rates[index])
    }

    /// The action's successor rates, in ascending successor order.
    pub fn successor_rates(&self, state: StateId, action: usize) -> Result<Vec<(StateId, f64)>> {
        let index = self.true_index(state, action)?;
        let mut rates: Vec<(StateId, f64)> = self.timing_of(state)?.rates[index]
            .iter()
            .map(|(&target, &rate)| (target, rate))
            .collect();
        rates.sort_by_key(|&(target, _)| target);
        Ok(rates)
    }
}

impl<S, M, G, T> Explorer<S, M> for EvidenceExplorer<S, M, G, T>
where
    S: Eq + Hash + Clone,
    M: Model,
    G: Generator<S>,
    T: TrustCriterion + Default,
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample::{ScriptedSampler, StdSampler};
    use sw_model::DenseModel;

    struct TableGenerator {
        initial: Vec<u32>,
        choices: HashMap<u32, Vec<Choice<u32>>>,
    }

    impl Generator<u32> for TableGenerator {
        fn initial_states(&self) -> Result<Vec<u32>> {
            Ok(self.initial.clone())
        }

        fn choices(&self, state: &u32) -> Result<Vec<Choice<u32>>> {
            Ok(self.choices.get(state).cloned().unwrap_or_default())
        }
    }

    fn approx_eq(a: f64, b: f64, tol: f64) -> bool {
        (a - b).abs() <= tol
    }

    /// 10 with two actions: "left" → {20: 0.5, 30: 0.5}, "right" → {20: 1.0}.
    /// Ids after exploration: 10 → 0, 20 → 1, 30 → 2.
    fn two_action_generator() -> TableGenerator {
        let mut choices = HashMap::new();
        choices.insert(
            10,
            vec![
                Choice::new(Some("left".into()), vec![(20, 0.5), (30, 0.5)]),
                Choice::new(Some("right".into()), vec![(20, 1.0)]),
            ],
        );
        TableGenerator {
            initial: vec![10],
            choices,
        }
    }

    fn black(config: &ExploreConfig) -> BlackExplorer<u32, DenseModel, TableGenerator> {
        BlackExplorer::of(
            DenseModel::new(),
            two_action_generator(),
            config,
            Box::new(StdSampler::seeded(1)),
        )
        .unwrap()
    }

    #[test]
    fn exploration_registers_empty_placeholders() {
        let explorer = black(&ExploreConfig::default());

        let choices = explorer.choices(0).unwrap();
        assert_eq!(choices.len(), 2);
        assert!(choices.iter().all(Distribution::is_empty));
        // Labels survive on the placeholders.
        let actions = explorer.actions(0).unwrap();
        assert_eq!(actions[0].label.as_deref(), Some("left"));
        assert_eq!(actions[1].label.as_deref(), Some("right"));

        assert_eq!(explorer.num_explored_actions(), 2);
        assert_eq!(explorer.num_transitions(), 0);
    }

    #[test]
    fn action_counts_equal_the_sum_of_updates() {
        let mut explorer = black(&ExploreConfig::default());

        explorer.update_counts(0, 0, 1, false).unwrap();
        explorer.update_counts(0, 0, 1, false).unwrap();
        explorer.update_counts(0, 0, 2, false).unwrap();
        explorer.update_counts(0, 1, 1, false).unwrap();

        assert_eq!(explorer.action_counts(0, 0).unwrap(), 3);
        assert_eq!(explorer.action_counts(0, 1).unwrap(), 1);
        // Three distinct (state, action, successor) triplets.
        assert_eq!(explorer.num_transitions(), 3);
    }

    #[test]
    fn threshold_crossing_is_reported_exactly_once() {
        // τ = ln(0.9)/ln(0.96) ≈ 2.58: the third sample crosses.
        let mut explorer = black(&ExploreConfig::default());
        explorer.set_trust_params(0.9, 0.04).unwrap();
        assert!(approx_eq(explorer.trust_threshold(), 2.58, 0.01));

        assert!(!explorer.update_counts(0, 0, 1, false).unwrap());
        assert!(!explorer.update_counts(0, 0, 1, false).unwrap());
        assert!(explorer.update_counts(0, 0, 2, false).unwrap());
        assert!(!explorer.update_counts(0, 0, 1, false).unwrap());
    }

    #[test]
    fn sub_one_threshold_crosses_on_the_first_sample() {
        // τ ≈ 0.196 with the default confidence/p_min.
        let mut explorer = black(&ExploreConfig::default());
        assert!(explorer.update_counts(0, 0, 1, false).unwrap());
        assert!(!explorer.update_counts(0, 0, 1, false).unwrap());
    }

    #[test]
    fn immediate_application_writes_the_learned_distribution() {
        let mut explorer = black(&ExploreConfig::default());

        explorer.update_counts(0, 0, 1, true).unwrap();
        explorer.update_counts(0, 0, 1, true).unwrap();
        explorer.update_counts(0, 0, 2, true).unwrap();

        let actions = explorer.actions(0).unwrap();
        assert!(approx_eq(actions[0].distribution.get(1).unwrap(), 2.0 / 3.0, 1e-12));
        assert!(approx_eq(actions[0].distribution.get(2).unwrap(), 1.0 / 3.0, 1e-12));
        assert_eq!(actions[0].label.as_deref(), Some("left"));
        // The sibling action is untouched.
        assert!(actions[1].distribution.is_empty());
    }

    #[test]
    fn learned_self_loops_are_skipped_and_rescaled() {
        let mut choices = HashMap::new();
        choices.insert(
            10,
            vec![Choice::unlabelled(vec![(10, 0.5), (20, 0.5)])],
        );
        let generator = TableGenerator {
            initial: vec![10],
            choices,
        };
        let config = ExploreConfig {
            remove_self_loops: true,
            ..ExploreConfig::default()
        };
        let mut explorer = BlackExplorer::of(
            DenseModel::new(),
            generator,
            &config,
            Box::new(StdSampler::seeded(3)),
        )
        .unwrap();

        // The hidden sampling distribution has already dropped the self-loop.
        for _ in 0..10 {
            assert_eq!(explorer.sample_successor(0, 0).unwrap(), Some(1));
        }
        // Even caller-fed self-loop evidence is skipped when learning.
        explorer.update_counts(0, 0, 0, false).unwrap();
        explorer.update_counts(0, 0, 1, false).unwrap();
        explorer.update_model_counts().unwrap();

        let learned = &explorer.choices(0).unwrap()[0];
        assert_eq!(learned.len(), 1);
        assert!(approx_eq(learned.get(1).unwrap(), 1.0, 1e-12));
    }

    #[test]
    fn deferred_updates_are_flushed_once() {
        let mut explorer = black(&ExploreConfig::default());

        explorer.update_counts(0, 0, 1, false).unwrap();
        explorer.update_counts(0, 1, 1, false).unwrap();
        // Nothing written yet.
        assert!(explorer.choices(0).unwrap()[0].is_empty());

        explorer.update_model_counts().unwrap();
        let after_first = explorer.actions(0).unwrap();
        assert!(approx_eq(after_first[0].distribution.get(1).unwrap(), 1.0, 1e-12));

        // Idempotent without new evidence.
        explorer.update_model_counts().unwrap();
        assert_eq!(explorer.actions(0).unwrap(), after_first);
    }

    #[test]
    fn update_model_respects_the_predicate() {
        let mut explorer = black(&ExploreConfig::default());
        explorer.update_counts(0, 0, 1, false).unwrap();
        explorer.update_counts(0, 1, 1, false).unwrap();

        explorer.update_model(|_, action| action == 1).unwrap();
        let actions = explorer.actions(0).unwrap();
        assert!(actions[0].distribution.is_empty());
        assert!(!actions[1].distribution.is_empty());
    }

    #[test]
    fn filter_round_trip_restores_actions_bit_identically() {
        let mut explorer = black(&ExploreConfig::default());
        explorer.update_counts(0, 1, 1, true).unwrap();
        let before = explorer.actions(0).unwrap();

        explorer.activate_filter().unwrap();
        assert!(explorer.is_filter_active());
        // Only the sampled action is trusted (τ < 1).
        let visible = explorer.actions(0).unwrap();
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].label.as_deref(), Some("right"));

        explorer.deactivate_filter().unwrap();
        assert!(!explorer.is_filter_active());
        assert_eq!(explorer.actions(0).unwrap(), before);
    }

    #[test]
    fn filtered_indices_are_translated_to_true_indices() {
        let mut explorer = black(&ExploreConfig::default());
        explorer.update_counts(0, 1, 1, true).unwrap();
        explorer.activate_filter().unwrap();

        // Filtered index 0 is true action 1.
        assert_eq!(explorer.action_counts(0, 0).unwrap(), 1);
        assert!(matches!(
            explorer.action_counts(0, 1),
            Err(Error::UnknownAction { state: 0, action: 1 })
        ));

        // Evidence lands on the true action; the write targets the visible slot.
        explorer.update_counts(0, 0, 1, true).unwrap();
        let visible = explorer.actions(0).unwrap();
        assert_eq!(visible.len(), 1);
        assert!(approx_eq(visible[0].distribution.get(1).unwrap(), 1.0, 1e-12));

        explorer.deactivate_filter().unwrap();
        assert_eq!(explorer.action_counts(0, 1).unwrap(), 2);
    }

    #[test]
    fn filter_activation_is_not_reentrant() {
        let mut explorer = black(&ExploreConfig::default());
        explorer.activate_filter().unwrap();
        assert!(matches!(
            explorer.activate_filter(),
            Err(Error::FilterAlreadyActive)
        ));
        explorer.deactivate_filter().unwrap();
        assert!(matches!(
            explorer.deactivate_filter(),
            Err(Error::FilterNotActive)
        ));
    }

    #[test]
    fn exploring_while_filtered_is_rejected() {
        let mut explorer = black(&ExploreConfig::default());
        explorer.activate_filter().unwrap();
        assert!(matches!(
            explorer.explore_state(1),
            Err(Error::FilterAlreadyActive)
        ));
    }

    #[test]
    fn sampling_uses_the_hidden_distribution() {
        let mut sampler = ScriptedSampler::new();
        sampler
            .push_unit(0.25) // below 0.5 → first support element
            .push_unit(0.75); // above → second
        let mut explorer = BlackExplorer::of(
            DenseModel::new(),
            two_action_generator(),
            &ExploreConfig::default(),
            Box::new(sampler),
        )
        .unwrap();

        assert_eq!(explorer.sample_successor(0, 0).unwrap(), Some(1));
        assert_eq!(explorer.sample_successor(0, 0).unwrap(), Some(2));
    }

    #[test]
    fn next_action_is_drawn_uniformly_over_visible_actions() {
        let mut sampler = ScriptedSampler::new();
        sampler.push_uniform(1);
        let mut explorer = BlackExplorer::of(
            DenseModel::new(),
            two_action_generator(),
            &ExploreConfig::default(),
            Box::new(sampler),
        )
        .unwrap();

        assert_eq!(explorer.sample_next_action(0).unwrap(), Some(1));
    }

    #[test]
    fn next_action_of_a_terminal_state_is_none() {
        let mut choices = HashMap::new();
        choices.insert(10, Vec::new());
        let generator = TableGenerator {
            initial: vec![10],
            choices,
        };
        let mut explorer = BlackExplorer::of(
            DenseModel::new(),
            generator,
            &ExploreConfig::default(),
            Box::new(StdSampler::seeded(5)),
        )
        .unwrap();

        assert_eq!(explorer.sample_next_action(0).unwrap(), None);
    }

    #[test]
    fn simulate_action_repeatedly_reaches_the_target_in_one_batch() {
        let mut sampler = ScriptedSampler::new();
        for unit in [0.1, 0.9, 0.1, 0.9, 0.1] {
            sampler.push_unit(unit);
        }
        let mut explorer = BlackExplorer::of(
            DenseModel::new(),
            two_action_generator(),
            &ExploreConfig::default(),
            Box::new(sampler),
        )
        .unwrap();

        explorer.simulate_action_repeatedly(0, 0, 5).unwrap();

        assert_eq!(explorer.action_counts(0, 0).unwrap(), 5);
        let learned = &explorer.choices(0).unwrap()[0];
        assert!(approx_eq(learned.get(1).unwrap(), 0.6, 1e-12));
        assert!(approx_eq(learned.get(2).unwrap(), 0.4, 1e-12));

        // Target already met: no further draws, script is untouched.
        explorer.simulate_action_repeatedly(0, 0, 5).unwrap();
        assert_eq!(explorer.action_counts(0, 0).unwrap(), 5);
    }

    #[test]
    fn querying_unexplored_states_is_a_contract_violation() {
        let mut explorer = black(&ExploreConfig::default());
        assert!(matches!(
            explorer.action_counts(1, 0),
            Err(Error::NotExplored(1))
        ));
        assert!(matches!(
            explorer.update_counts(9, 0, 1, false),
            Err(Error::UnknownState(9))
        ));
        assert!(matches!(
            explorer.sample_next_action(1),
            Err(Error::NotExplored(1))
        ));
    }

    #[test]
    fn grey_tracks_full_exploration() {
        let mut explorer = GreyExplorer::of(
            DenseModel::new(),
            two_action_generator(),
            &ExploreConfig::default(),
            Box::new(StdSampler::seeded(2)),
        )
        .unwrap();

        assert_eq!(explorer.true_successor_count(0, 0).unwrap(), 2);
        assert!(!explorer.is_action_fully_explored(0, 0).unwrap());
        assert!(!explorer.has_new_fully_explored_action());

        explorer.update_counts(0, 0, 1, true).unwrap();
        assert!(!explorer.is_action_fully_explored(0, 0).unwrap());
        assert!(!explorer.has_new_fully_explored_action());

        explorer.update_counts(0, 0, 2, true).unwrap();
        assert!(explorer.is_action_fully_explored(0, 0).unwrap());
        assert!(explorer.has_new_fully_explored_action());

        explorer.reset_fully_explored_flag();
        assert!(!explorer.has_new_fully_explored_action());
        // Repeat visits of known successors do not raise the flag again.
        explorer.update_counts(0, 0, 1, true).unwrap();
        assert!(!explorer.has_new_fully_explored_action());
    }

    #[test]
    fn grey_filter_shows_only_fully_explored_actions() {
        let mut explorer = GreyExplorer::of(
            DenseModel::new(),
            two_action_generator(),
            &ExploreConfig::default(),
            Box::new(StdSampler::seeded(2)),
        )
        .unwrap();

        // Action 0 fully explored; action 1 has plenty of samples but that
        // is irrelevant for grey trust — it is fully explored too once its
        // single successor is seen. Leave action 1 unobserved instead.
        explorer.update_counts(0, 0, 1, true).unwrap();
        explorer.update_counts(0, 0, 2, true).unwrap();

        explorer.activate_filter().unwrap();
        let visible = explorer.actions(0).unwrap();
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].label.as_deref(), Some("left"));
        assert!(explorer.is_action_fully_explored(0, 0).unwrap());

        explorer.deactivate_filter().unwrap();
        assert_eq!(explorer.actions(0).unwrap().len(), 2);
    }

    #[test]
    fn ctmdp_normalizes_rates_and_keeps_self_loops() {
        // Rates: back to 10 at 1.0, on to 20 at 3.0. Ids: 10 → 0, 20 → 1.
        let mut choices = HashMap::new();
        choices.insert(
            10,
            vec![Choice::unlabelled(vec![(20, 3.0), (10, 1.0)])],
        );
        let generator = TableGenerator {
            initial: vec![10],
            choices,
        };

        let mut sampler = ScriptedSampler::new();
        sampler.push_unit(0.1).push_exponential(0.5);
        let mut explorer = CtmdpExplorer::of_ctmdp(
            DenseModel::new(),
            generator,
            &ExploreConfig::default(),
            Box::new(sampler),
        )
        .unwrap();

        assert!(approx_eq(explorer.exit_rate(0, 0).unwrap(), 4.0, 1e-12));
        assert_eq!(
            explorer.successor_rates(0, 0).unwrap(),
            vec![(0, 1.0), (1, 3.0)]
        );

        // Sampling distribution is the normalization: {0: 0.25, 1: 0.75};
        // unit 0.1 lands on the self-loop.
        assert_eq!(explorer.sample_successor(0, 0).unwrap(), Some(0));

        // Every counted sample records a sojourn drawn at the exit rate.
        explorer.update_counts(0, 0, 1, true).unwrap();
        assert_eq!(explorer.transition_times(0, 0).unwrap(), &[0.5]);
    }

    #[test]
    fn ctmdp_batch_simulation_records_sojourns() {
        let mut choices = HashMap::new();
        choices.insert(10, vec![Choice::unlabelled(vec![(20, 2.0)])]);
        let generator = TableGenerator {
            initial: vec![10],
            choices,
        };

        let mut sampler = ScriptedSampler::new();
        sampler
            .push_unit(0.3)
            .push_exponential(0.25)
            .push_unit(0.6)
            .push_exponential(0.75);
        let mut explorer = CtmdpExplorer::of_ctmdp(
            DenseModel::new(),
            generator,
            &ExploreConfig::default(),
            Box::new(sampler),
        )
        .unwrap();

        explorer.simulate_action_repeatedly(0, 0, 2).unwrap();
        assert_eq!(explorer.action_counts(0, 0).unwrap(), 2);
        assert_eq!(explorer.transition_times(0, 0).unwrap(), &[0.25, 0.75]);
    }

    #[test]
    fn timing_queries_require_the_capability() {
        let explorer = black(&ExploreConfig::default());
        assert!(matches!(
            explorer.transition_times(0, 0),
            Err(Error::TimingUnavailable)
        ));
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn learned_distributions_are_normalized(
                counts in prop::collection::hash_map(0usize..6, 1u64..50, 1..5),
                remove_self_loops in any::<bool>(),
            ) {
                let distribution = distribution_from_counts(&counts, 0, remove_self_loops);
                prop_assert!(distribution.is_normalized());

                // Without the self-loop policy the weights are exact ratios.
                if !remove_self_loops {
                    let total: u64 = counts.values().sum();
                    for (&target, &count) in &counts {
                        let weight = distribution.get(target).unwrap();
                        prop_assert!((weight - count as f64 / total as f64).abs() <= 1e-12);
                    }
                }
            }
        }
    }
}

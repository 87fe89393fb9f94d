//! Union-find quotient view over a model.
//!
//! [`CollapseView`] wraps an already-built model and exposes the same
//! choice-query contract over a quotient graph: groups of states (typically
//! detected end components) are merged into single representatives, the
//! merged states' outgoing distributions are rewritten (transitions that
//! become internal are dropped and the remaining mass rescaled), and
//! identical resulting distributions are deduplicated.
//!
//! Reads are cached per state with a generation counter: every `collapse`
//! call bumps the global generation, a cache entry remembers the generation
//! it was computed at, and a stale entry is recomputed on access. Entries
//! written by the collapse itself are stamped current. States the quotient
//! has never rewritten keep reading through to the live model.
//!
//! The view is read-only: every structural mutator of the [`Model`] contract
//! fails with [`Error::ViewImmutable`].

use crate::distribution::Distribution;
use crate::model::{Action, Model};
use crate::union_find::UnionFind;
use std::cell::{Cell, RefCell};
use std::collections::{BTreeSet, HashMap, HashSet};
use sw_common::{Error, Result, StateId};
use tracing::{debug, enabled, trace, Level};

#[derive(Debug, Clone)]
struct CacheEntry {
    /// Rewritten distribution list, or `None` when the state was only
    /// validated and still reads through to the model.
    distributions: Option<Vec<Distribution>>,
    generation: u64,
}

/// Mutable quotient overlay on top of a model.
#[derive(Debug)]
pub struct CollapseView<M: Model> {
    model: M,
    uf: UnionFind,
    removed: BTreeSet<StateId>,
    representatives: BTreeSet<StateId>,
    cache: RefCell<HashMap<StateId, CacheEntry>>,
    generation: Cell<u64>,
}

impl<M: Model> CollapseView<M> {
    pub fn new(model: M) -> Self {
        Self {
            model,
            uf: UnionFind::new(),
            removed: BTreeSet::new(),
            representatives: BTreeSet::new(),
            cache: RefCell::new(HashMap::new()),
            generation: Cell::new(0),
        }
    }

    /// The wrapped model.
    pub fn model(&self) -> &M {
        &self.model
    }

    /// Mutable access to the wrapped model, for exploration continuing on
    /// the base graph. States the quotient has already rewritten keep their
    /// merged distributions; untouched states read through live.
    pub fn model_mut(&mut self) -> &mut M {
        &mut self.model
    }

    pub fn into_inner(self) -> M {
        self.model
    }

    /// Current representative of `state`. States never merged are their own
    /// representative, including ids beyond the union-find arena.
    pub fn representative(&self, state: StateId) -> StateId {
        self.uf.find(state)
    }

    /// Whether `state` was merged away (is not its own representative).
    pub fn is_removed(&self, state: StateId) -> bool {
        self.representative(state) != state
    }

    /// States merged away so far, in ascending order.
    pub fn removed_states(&self) -> &BTreeSet<StateId> {
        &self.removed
    }

    /// Merge each group of `groups` into a single representative.
    ///
    /// Groups must be non-empty, pairwise disjoint, and consist of live
    /// model states; violations are contract errors and leave the view
    /// unchanged. Returns one representative per group, in group order.
    pub fn collapse(&mut self, groups: &[BTreeSet<StateId>]) -> Result<Vec<StateId>> {
        if groups.is_empty() {
            return Ok(Vec::new());
        }

        let mut all = BTreeSet::new();
        for group in groups {
            if group.is_empty() {
                return Err(Error::EmptyGroup);
            }
            for &state in group {
                if state >= self.model.num_states() {
                    return Err(Error::UnknownState(state));
                }
                if self.is_removed(state) {
                    return Err(Error::RemovedState(state));
                }
                if !all.insert(state) {
                    return Err(Error::OverlappingGroups);
                }
            }
        }

        trace!(groups = groups.len(), states = all.len(), "collapsing state groups");

        let generation = self.generation.get() + 1;
        self.generation.set(generation);

        // Union every group first so remapping below sees the final
        // representatives of this call.
        let mut representatives = Vec::with_capacity(groups.len());
        for group in groups {
            representatives.push(self.merge_group(group));
        }

        // Merge each group's outgoing distributions into its representative.
        {
            let mut cache = self.cache.borrow_mut();
            for (group, &representative) in groups.iter().zip(&representatives) {
                // Only a real merge turns intra-group transitions into
                // self-loops; a singleton's own self-loop is not induced by
                // this collapse and survives.
                let merging = (group.len() > 1).then_some(group);
                let mut merged = Vec::new();
                let mut seen = HashSet::new();
                for &state in group {
                    let base = match cache.remove(&state) {
                        Some(CacheEntry {
                            distributions: Some(distributions),
                            ..
                        }) => distributions,
                        _ => self.model.choices(state)?,
                    };
                    let (rewritten, _) = self.requotient(representative, base, merging);
                    for distribution in rewritten {
                        if seen.insert(distribution.clone()) {
                            merged.push(distribution);
                        }
                    }
                }
                debug_assert!(
                    merging.is_none()
                        || merged
                            .iter()
                            .flat_map(|d| d.support())
                            .all(|s| !group.contains(&s))
                );
                cache.insert(
                    representative,
                    CacheEntry {
                        distributions: Some(merged),
                        generation,
                    },
                );
            }
        }

        if enabled!(Level::DEBUG) {
            let mut actions = 0usize;
            let mut transitions = 0usize;
            let mut max_actions = 0usize;
            let mut max_transitions = 0usize;
            for &representative in &representatives {
                let distributions = self.choices(representative)?;
                actions += distributions.len();
                max_actions = max_actions.max(distributions.len());
                for distribution in &distributions {
                    transitions += distribution.len();
                    max_transitions = max_transitions.max(distribution.len());
                }
            }
            debug!(
                collapsed = representatives.len(),
                actions,
                max_actions,
                transitions,
                max_transitions,
                "collapsed state groups"
            );
        }

        Ok(representatives)
    }

    fn merge_group(&mut self, group: &BTreeSet<StateId>) -> StateId {
        let mut members = group.iter().copied();
        let Some(first) = members.next() else {
            // Validated non-empty by collapse().
            unreachable!("collapse groups are validated non-empty");
        };
        if group.len() == 1 {
            self.representatives.insert(first);
            return first;
        }

        self.uf.ensure(self.model.num_states());
        let mut root = first;
        for state in members {
            root = self.uf.union(root, state);
        }
        let root = self.uf.find_compress(root);

        for &state in group {
            if state != root {
                self.removed.insert(state);
            }
        }
        self.representatives.insert(root);
        root
    }

    /// Rewrite `distributions` of a state represented by `representative`:
    /// remap successors to their current representatives, drop entries that
    /// resolve to `representative` itself, rescale, and drop distributions
    /// that empty out. Distributions untouched by any merge are kept
    /// verbatim (a plain self-loop in the base model survives). The result
    /// is deduplicated only when something changed, so an untouched state
    /// returns its model list bit-identically.
    fn requotient(
        &self,
        representative: StateId,
        distributions: Vec<Distribution>,
        merging: Option<&BTreeSet<StateId>>,
    ) -> (Vec<Distribution>, bool) {
        let mut changed = false;
        let mut result = Vec::with_capacity(distributions.len());

        for distribution in distributions {
            let touched = distribution.support().any(|successor| {
                self.uf.find(successor) != successor
                    || merging.is_some_and(|group| group.contains(&successor))
            });
            if !touched {
                result.push(distribution);
                continue;
            }

            let builder = distribution.map_support(|successor| {
                let target = self.uf.find(successor);
                if target == representative {
                    None
                } else {
                    Some(target)
                }
            });
            if builder.is_empty() {
                changed = true;
                continue;
            }
            let rescaled = builder.scaled();
            changed = changed || rescaled != distribution;
            result.push(rescaled);
        }

        if changed {
            let mut seen = HashSet::new();
            result.retain(|distribution| seen.insert(distribution.clone()));
        }
        (result, changed)
    }
}

impl<M: Model> Model for CollapseView<M> {
    fn num_states(&self) -> usize {
        self.model.num_states() - self.removed.len()
    }

    fn add_state(&mut self) -> Result<StateId> {
        Err(Error::ViewImmutable("add_state"))
    }

    fn add_choice(&mut self, _state: StateId, _action: Action) -> Result<()> {
        Err(Error::ViewImmutable("add_choice"))
    }

    fn actions(&self, state: StateId) -> Result<Vec<Action>> {
        Ok(self
            .choices(state)?
            .into_iter()
            .map(Action::unlabelled)
            .collect())
    }

    fn set_actions(&mut self, _state: StateId, _actions: Vec<Action>) -> Result<()> {
        Err(Error::ViewImmutable("set_actions"))
    }

    fn choices(&self, state: StateId) -> Result<Vec<Distribution>> {
        if self.is_removed(state) {
            return Err(Error::RemovedState(state));
        }
        let generation = self.generation.get();

        let base = {
            let cache = self.cache.borrow();
            match cache.get(&state) {
                Some(entry) if entry.generation == generation => {
                    return match &entry.distributions {
                        Some(distributions) => Ok(distributions.clone()),
                        None => self.model.choices(state),
                    };
                }
                Some(CacheEntry {
                    distributions: Some(distributions),
                    ..
                }) => Some(distributions.clone()),
                _ => None,
            }
        };

        let had_overwrite = base.is_some();
        let base = match base {
            Some(distributions) => distributions,
            None => self.model.choices(state)?,
        };

        let (result, changed) = self.requotient(state, base, None);
        debug_assert!(result
            .iter()
            .flat_map(|d| d.support())
            .all(|s| self.representative(s) == s));

        let distributions = if changed || had_overwrite {
            Some(result.clone())
        } else {
            None
        };
        self.cache.borrow_mut().insert(
            state,
            CacheEntry {
                distributions,
                generation,
            },
        );
        Ok(result)
    }

    fn num_choices(&self, state: StateId) -> Result<usize> {
        Ok(self.choices(state)?.len())
    }

    fn initial_states(&self) -> Vec<StateId> {
        let quotiented: BTreeSet<StateId> = self
            .model
            .initial_states()
            .into_iter()
            .map(|state| self.representative(state))
            .collect();
        quotiented.into_iter().collect()
    }

    fn set_initial_states(&mut self, _states: Vec<StateId>) -> Result<()> {
        Err(Error::ViewImmutable("set_initial_states"))
    }

    fn add_initial_state(&mut self, _state: StateId) -> Result<()> {
        Err(Error::ViewImmutable("add_initial_state"))
    }
}

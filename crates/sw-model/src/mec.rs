//! End-component fixpoint over an explored model fragment.
//!
//! [`Mec::compute`] restricts a candidate state set to the maximal subset
//! that is closed under a subset of its actions: every retained action's
//! support stays inside the set, and no retained state is left without an
//! action. Finding *maximal* end components inside a larger graph is the
//! caller's job (an SCC decomposition consuming this as its closure
//! primitive); this module only computes the fixpoint.

use crate::model::Model;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use sw_common::{Result, StateId};

/// A state set together with, per state, the retained action indices.
///
/// Two values compare equal iff their state sets are equal: the action sets
/// are a deterministic function of the state set and the model.
#[derive(Debug, Clone, Serialize)]
pub struct Mec {
    pub states: BTreeSet<StateId>,
    pub actions: BTreeMap<StateId, BTreeSet<usize>>,
}

impl Mec {
    /// Shrink `states` to the maximal action-closed subset.
    ///
    /// Fixpoint loop: drop states with zero choices, drop actions whose
    /// support leaves the candidate set, drop states left without actions,
    /// repeat until a full pass removes nothing.
    pub fn compute(model: &impl Model, mut states: BTreeSet<StateId>) -> Result<Mec> {
        let mut actions: BTreeMap<StateId, BTreeSet<usize>> = BTreeMap::new();
        let mut changed = true;

        while changed {
            changed = false;
            let mut to_remove = BTreeSet::new();

            for &state in &states {
                let distributions = model.choices(state)?;
                if distributions.is_empty() {
                    to_remove.insert(state);
                    changed = true;
                    continue;
                }

                let retained = actions
                    .entry(state)
                    .or_insert_with(|| (0..distributions.len()).collect());
                let before = retained.len();
                retained.retain(|&action| {
                    distributions[action]
                        .support()
                        .all(|successor| states.contains(&successor))
                });
                changed |= retained.len() != before;

                if retained.is_empty() {
                    to_remove.insert(state);
                    changed = true;
                }
            }

            for state in &to_remove {
                states.remove(state);
                actions.remove(state);
            }
        }

        Ok(Mec { states, actions })
    }

    pub fn size(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}

impl PartialEq for Mec {
    fn eq(&self, other: &Self) -> bool {
        self.states == other.states
    }
}

impl Eq for Mec {}

impl std::hash::Hash for Mec {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.states.hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distribution::Distribution;
    use crate::model::{Action, DenseModel};

    fn dist(entries: &[(StateId, f64)]) -> Distribution {
        entries.iter().copied().collect()
    }

    fn add_action(model: &mut DenseModel, state: StateId, entries: &[(StateId, f64)]) {
        model
            .add_choice(state, Action::unlabelled(dist(entries)))
            .unwrap();
    }

    /// 0 ↔ 1 closed cycle; 2's only action escapes to 3.
    fn cycle_with_escape() -> DenseModel {
        let mut model = DenseModel::new();
        for _ in 0..4 {
            model.add_state().unwrap();
        }
        add_action(&mut model, 0, &[(1, 1.0)]);
        add_action(&mut model, 1, &[(0, 1.0)]);
        add_action(&mut model, 2, &[(3, 1.0)]);
        add_action(&mut model, 3, &[(3, 1.0)]);
        model
    }

    #[test]
    fn escaping_states_are_removed() {
        let model = cycle_with_escape();
        let mec = Mec::compute(&model, [0, 1, 2].into_iter().collect()).unwrap();

        assert_eq!(mec.states, [0, 1].into_iter().collect());
        assert_eq!(mec.actions[&0], [0].into_iter().collect());
        assert_eq!(mec.actions[&1], [0].into_iter().collect());
        assert!(!mec.actions.contains_key(&2));
    }

    #[test]
    fn removal_cascades_transitively() {
        // 0 → 1 → 2 → outside; once 2 goes, 1 goes, then 0.
        let mut model = DenseModel::new();
        for _ in 0..4 {
            model.add_state().unwrap();
        }
        add_action(&mut model, 0, &[(1, 1.0)]);
        add_action(&mut model, 1, &[(2, 1.0)]);
        add_action(&mut model, 2, &[(3, 1.0)]);

        let mec = Mec::compute(&model, [0, 1, 2].into_iter().collect()).unwrap();
        assert!(mec.is_empty());
    }

    #[test]
    fn zero_choice_states_are_removed() {
        let mut model = DenseModel::new();
        for _ in 0..2 {
            model.add_state().unwrap();
        }
        add_action(&mut model, 0, &[(0, 1.0)]);
        // State 1 is explored but has no choices.

        let mec = Mec::compute(&model, [0, 1].into_iter().collect()).unwrap();
        assert_eq!(mec.states, [0].into_iter().collect());
    }

    #[test]
    fn only_escaping_actions_are_dropped() {
        // State 0 has one internal and one escaping action.
        let mut model = DenseModel::new();
        for _ in 0..3 {
            model.add_state().unwrap();
        }
        add_action(&mut model, 0, &[(1, 1.0)]);
        add_action(&mut model, 0, &[(2, 1.0)]);
        add_action(&mut model, 1, &[(0, 0.5), (1, 0.5)]);

        let mec = Mec::compute(&model, [0, 1].into_iter().collect()).unwrap();
        assert_eq!(mec.states, [0, 1].into_iter().collect());
        assert_eq!(mec.actions[&0], [0].into_iter().collect());
        assert_eq!(mec.actions[&1], [0].into_iter().collect());
    }

    #[test]
    fn equality_ignores_action_sets() {
        let model = cycle_with_escape();
        let a = Mec::compute(&model, [0, 1].into_iter().collect()).unwrap();
        let mut b = Mec::compute(&model, [0, 1, 2].into_iter().collect()).unwrap();
        assert_eq!(a, b);
        b.actions.clear();
        assert_eq!(a, b);
    }
}

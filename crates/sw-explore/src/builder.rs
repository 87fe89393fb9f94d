//! Exhaustive breadth-first model construction.
//!
//! The eager counterpart of the lazy engines: materialize the entire
//! reachable state space through the oracle in one pass. Distributions are
//! written verbatim (no self-loop policy), which makes the result a baseline
//! to validate lazy exploration against.

use crate::generator::Generator;
use std::collections::VecDeque;
use std::hash::Hash;
use sw_common::{Error, Result};
use sw_model::{Action, DistributionBuilder, Model, StateIndex};

/// Breadth-first build of the full reachable model. Returns the state index.
pub fn build_complete<S, M, G>(model: &mut M, generator: &G) -> Result<StateIndex<S>>
where
    S: Eq + Hash + Clone,
    M: Model,
    G: Generator<S>,
{
    if model.num_states() != 0 {
        return Err(Error::NonEmptyTarget);
    }

    let mut index = StateIndex::new();
    let mut queue = VecDeque::new();

    for state in generator.initial_states()? {
        if index.contains(&state) {
            continue;
        }
        let id = model.add_state()?;
        debug_assert_eq!(id, index.len());
        index.get_or_insert(state.clone());
        model.add_initial_state(id)?;
        queue.push_back(state);
    }

    while let Some(state) = queue.pop_front() {
        let Some(id) = index.id_of(&state) else {
            continue;
        };
        for choice in generator.choices(&state)? {
            let mut builder = DistributionBuilder::new();
            for (successor, weight) in choice.transitions {
                let target = match index.id_of(&successor) {
                    Some(existing) => existing,
                    None => {
                        let allocated = model.add_state()?;
                        debug_assert_eq!(allocated, index.len());
                        index.get_or_insert(successor.clone());
                        queue.push_back(successor);
                        allocated
                    }
                };
                builder.add(target, weight);
            }
            model.add_choice(id, Action::new(builder.build(), choice.label))?;
        }
    }

    Ok(index)
}

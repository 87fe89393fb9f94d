//! Compaction of a model onto a state subset.
//!
//! Builds a fresh model containing only the allowed states, densely
//! renumbered in id order. Transition mass leaving the subset (and,
//! optionally, self-loop mass) is dropped and the remainder rescaled;
//! actions whose distribution empties out are omitted and recorded so the
//! caller can map results back to original action indices.

use crate::distribution::DistributionBuilder;
use crate::model::{Action, Model};
use std::collections::BTreeSet;
use sw_common::{Error, Result, StateId};

/// A compacted model plus the bookkeeping to translate back.
#[derive(Debug)]
pub struct RestrictedModel<M> {
    pub model: M,
    /// Restricted id → original id.
    pub to_original: Vec<StateId>,
    /// Per restricted state, the original action indices that survived.
    pub kept_actions: Vec<Vec<usize>>,
}

/// Restrict `source` to `allowed`, writing into the empty model `target`.
pub fn restrict<M: Model>(
    source: &impl Model,
    allowed: &BTreeSet<StateId>,
    mut target: M,
    omit_self_loops: bool,
) -> Result<RestrictedModel<M>> {
    if target.num_states() != 0 {
        return Err(Error::NonEmptyTarget);
    }

    let mut original_to_restricted = vec![None; source.num_states()];
    for &state in allowed {
        if state >= source.num_states() {
            return Err(Error::UnknownState(state));
        }
        original_to_restricted[state] = Some(target.add_state()?);
    }

    let mut to_original = vec![0; allowed.len()];
    let mut kept_actions = vec![Vec::new(); allowed.len()];

    for &original in allowed {
        let Some(restricted) = original_to_restricted[original] else {
            continue;
        };
        to_original[restricted] = original;

        for (index, action) in source.actions(original)?.into_iter().enumerate() {
            let mut builder = DistributionBuilder::new();
            for (successor, weight) in action.distribution.iter() {
                if omit_self_loops && successor == original {
                    continue;
                }
                if let Some(target_id) = original_to_restricted[successor] {
                    builder.add(target_id, weight);
                }
            }
            if builder.is_empty() {
                continue;
            }
            target.add_choice(restricted, Action::new(builder.scaled(), action.label))?;
            kept_actions[restricted].push(index);
        }
    }

    for initial in source.initial_states() {
        if let Some(restricted) = original_to_restricted[initial] {
            target.add_initial_state(restricted)?;
        }
    }

    Ok(RestrictedModel {
        model: target,
        to_original,
        kept_actions,
    })
}

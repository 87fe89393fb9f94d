//! Sparse distributions over dense state ids.
//!
//! A [`Distribution`] is an immutable sparse map from successor id to a
//! non-negative weight, with the support kept sorted by id. A non-empty
//! distribution's weights sum to 1 within [`WEIGHT_SUM_TOLERANCE`]; the empty
//! distribution is a valid value in its own right — it represents an action
//! with no evidence yet, or one whose entire mass was removed as self-loops.
//!
//! Equality and hashing are structural and exact (weights compared by bit
//! pattern), so identical distributions deduplicate in hash sets. That is
//! what the collapsing view relies on when it merges action lists.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};
use sw_common::StateId;

/// Tolerance for "weights sum to 1" checks.
pub const WEIGHT_SUM_TOLERANCE: f64 = 1e-9;

/// Immutable sparse weight map over successor ids.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Distribution {
    entries: Vec<(StateId, f64)>,
}

impl Distribution {
    /// The empty distribution.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Number of support elements.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over `(successor, weight)` pairs in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = (StateId, f64)> + '_ {
        self.entries.iter().copied()
    }

    /// Iterate over the support in ascending id order.
    pub fn support(&self) -> impl Iterator<Item = StateId> + '_ {
        self.entries.iter().map(|&(state, _)| state)
    }

    pub fn contains(&self, state: StateId) -> bool {
        self.entries
            .binary_search_by_key(&state, |&(s, _)| s)
            .is_ok()
    }

    /// Weight of `state`, if it is in the support.
    pub fn get(&self, state: StateId) -> Option<f64> {
        self.entries
            .binary_search_by_key(&state, |&(s, _)| s)
            .ok()
            .map(|i| self.entries[i].1)
    }

    /// Sum of all weights.
    pub fn sum(&self) -> f64 {
        self.entries.iter().map(|&(_, w)| w).sum()
    }

    /// Whether this is empty or sums to 1 within tolerance.
    pub fn is_normalized(&self) -> bool {
        self.is_empty() || (self.sum() - 1.0).abs() <= WEIGHT_SUM_TOLERANCE
    }

    /// Map a uniform draw in `[0, 1)` to a support element.
    ///
    /// Walks the cumulative weights; the final element absorbs floating-point
    /// slack. Returns `None` for the empty distribution — sampling it is a
    /// caller-guarded condition, not an error.
    pub fn sample(&self, unit: f64) -> Option<StateId> {
        let (&(last, _), rest) = self.entries.split_last()?;
        let mut cumulative = 0.0;
        for &(state, weight) in rest {
            cumulative += weight;
            if unit < cumulative {
                return Some(state);
            }
        }
        Some(last)
    }

    /// Remap every support element through `f`, dropping entries mapped to
    /// `None` and summing entries that land on the same target.
    ///
    /// Returns the builder so the caller chooses between [`DistributionBuilder::build`]
    /// and [`DistributionBuilder::scaled`].
    pub fn map_support<F>(&self, mut f: F) -> DistributionBuilder
    where
        F: FnMut(StateId) -> Option<StateId>,
    {
        let mut builder = DistributionBuilder::new();
        for &(state, weight) in &self.entries {
            if let Some(target) = f(state) {
                builder.add(target, weight);
            }
        }
        builder
    }
}

impl PartialEq for Distribution {
    fn eq(&self, other: &Self) -> bool {
        self.entries.len() == other.entries.len()
            && self
                .entries
                .iter()
                .zip(&other.entries)
                .all(|(&(s, w), &(t, v))| s == t && w.to_bits() == v.to_bits())
    }
}

impl Eq for Distribution {}

impl Hash for Distribution {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for &(s, w) in &self.entries {
            s.hash(state);
            w.to_bits().hash(state);
        }
    }
}

impl FromIterator<(StateId, f64)> for Distribution {
    fn from_iter<I: IntoIterator<Item = (StateId, f64)>>(iter: I) -> Self {
        let mut builder = DistributionBuilder::new();
        for (state, weight) in iter {
            builder.add(state, weight);
        }
        builder.build()
    }
}

/// Accumulates `(target, weight)` pairs into a [`Distribution`].
///
/// Adding the same target twice sums the weights.
#[derive(Debug, Default)]
pub struct DistributionBuilder {
    entries: BTreeMap<StateId, f64>,
}

impl DistributionBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `weight` to `target`, summing with any prior weight.
    pub fn add(&mut self, target: StateId, weight: f64) {
        *self.entries.entry(target).or_insert(0.0) += weight;
    }

    /// Overwrite the weight of `target`.
    pub fn set(&mut self, target: StateId, weight: f64) {
        self.entries.insert(target, weight);
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Finish with the weights exactly as accumulated.
    pub fn build(self) -> Distribution {
        Distribution {
            entries: self.entries.into_iter().collect(),
        }
    }

    /// Finish, rescaling the weights to sum to 1. The empty builder yields
    /// the empty distribution.
    pub fn scaled(self) -> Distribution {
        let total: f64 = self.entries.values().sum();
        if total == 0.0 {
            return Distribution::empty();
        }
        Distribution {
            entries: self
                .entries
                .into_iter()
                .map(|(state, weight)| (state, weight / total))
                .collect(),
        }
    }
}

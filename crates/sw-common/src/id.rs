//! Dense state identifiers.

/// Identifier of a state in a partial model.
///
/// Ids are dense, 0-based, assigned in first-seen order, and never reused or
/// renumbered. They double as indices into the per-state arenas kept by the
/// model and the exploration engines, so an out-of-range id is a checked
/// contract violation rather than a missing hash-map key.
pub type StateId = usize;

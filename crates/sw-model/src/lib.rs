//! Statewalk partial-model storage and analyses.
//!
//! The model side of statewalk:
//! - Sparse probability/rate distributions and their builder
//! - The dense state index (external state ↔ id bijection)
//! - The `Model` storage contract and an in-memory arena implementation
//! - The end-component fixpoint (`Mec`)
//! - The union-find collapsing view (`CollapseView`) exposing a quotient graph
//! - Model restriction onto a state subset

pub mod collapse;
pub mod distribution;
pub mod index;
pub mod mec;
pub mod model;
pub mod restrict;
pub mod union_find;

pub use collapse::CollapseView;
pub use distribution::{Distribution, DistributionBuilder, WEIGHT_SUM_TOLERANCE};
pub use index::StateIndex;
pub use mec::Mec;
pub use model::{Action, DenseModel, Model};
pub use restrict::{restrict, RestrictedModel};
pub use union_find::UnionFind;

//! Statewalk exploration engines.
//!
//! Lazy, on-demand unfolding of a probabilistic model from an external
//! state-space oracle, under three information regimes:
//! - [`DefaultExplorer`]: full information, the oracle's distributions are
//!   written into the partial model at exploration time
//! - [`BlackExplorer`]: nothing but samples; distributions are learned from
//!   per-successor visit counts and gated by the action trust threshold
//! - [`GreyExplorer`]: support sizes are known in advance; an action becomes
//!   exact once every true successor has been observed
//!
//! The continuous-time capability ([`CtmdpExplorer`]) additionally captures
//! per-successor rates and records exponentially distributed sojourn times
//! alongside every counted sample.

pub mod builder;
pub mod evidence;
pub mod explorer;
pub mod generator;
pub mod sample;

pub use builder::build_complete;
pub use evidence::{
    ActionEvidence, BlackExplorer, CtmdpExplorer, EvidenceExplorer, GreyExplorer, SampleCountTrust,
    SupportTrust, TrustCriterion,
};
pub use explorer::{explorer_for, AnyExplorer, DefaultExplorer, Explorer};
pub use generator::{Choice, Generator};
pub use sample::{SamplingSource, ScriptedSampler, StdSampler};

//! Exploration configuration.
//!
//! The recognized options mirror what the engines actually consume:
//! - `remove_self_loops`: drop self-transitions when building or learning a
//!   distribution, rescaling the remaining mass to sum to 1
//! - `confidence` and `p_min`: together determine the action trust threshold
//!   τ = ln(confidence) / ln(1 − p_min); an action is statistically trusted
//!   once its sample count exceeds τ

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// How much the exploration engine is allowed to know about the oracle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InformationLevel {
    /// Full information: the oracle's distributions are written verbatim.
    Whitebox,
    /// No distribution information: everything is learned from samples.
    Blackbox,
    /// Support sizes are known in advance, probabilities are learned.
    Greybox,
}

/// Configuration for the exploration engines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExploreConfig {
    /// Drop self-transitions and rescale the remaining mass.
    pub remove_self_loops: bool,
    /// Desired statistical confidence, in (0, 1).
    pub confidence: f64,
    /// Minimum transition probability of interest, in (0, 1).
    pub p_min: f64,
}

impl Default for ExploreConfig {
    fn default() -> Self {
        Self {
            remove_self_loops: false,
            confidence: 0.99,
            p_min: 0.05,
        }
    }
}

impl ExploreConfig {
    pub fn new(remove_self_loops: bool, confidence: f64, p_min: f64) -> Result<Self> {
        let config = Self {
            remove_self_loops,
            confidence,
            p_min,
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject parameters outside their open intervals.
    pub fn validate(&self) -> Result<()> {
        if !(self.confidence > 0.0 && self.confidence < 1.0) {
            return Err(Error::InvalidConfig(format!(
                "confidence must lie in (0, 1), got {}",
                self.confidence
            )));
        }
        if !(self.p_min > 0.0 && self.p_min < 1.0) {
            return Err(Error::InvalidConfig(format!(
                "p_min must lie in (0, 1), got {}",
                self.p_min
            )));
        }
        Ok(())
    }

    /// The action trust threshold τ = ln(confidence) / ln(1 − p_min).
    ///
    /// An action whose total sample count exceeds τ carries enough evidence
    /// to be shown to downstream analysis.
    pub fn action_trust_threshold(&self) -> f64 {
        self.confidence.ln() / (1.0 - self.p_min).ln()
    }
}

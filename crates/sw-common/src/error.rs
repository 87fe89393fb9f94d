//! Error types for statewalk.
//!
//! Two failure families live here:
//! - *Contract violations*: caller bugs such as exploring a state twice,
//!   addressing an unknown id, or mutating the read-only collapse view. These
//!   are answered fail-fast and must not be swallowed.
//! - *Oracle failures*: errors raised by the external state-space generator.
//!   They pass through exploration unchanged, carried as the boxed source.

use crate::id::StateId;
use thiserror::Error;

/// Result type alias for statewalk operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for statewalk.
#[derive(Error, Debug)]
pub enum Error {
    // Contract violations
    #[error("state {0} is not known to the model")]
    UnknownState(StateId),

    #[error("state {0} has already been explored")]
    AlreadyExplored(StateId),

    #[error("state {0} has not been explored")]
    NotExplored(StateId),

    #[error("action {action} is out of range for state {state}")]
    UnknownAction { state: StateId, action: usize },

    #[error("state {0} has been collapsed away")]
    RemovedState(StateId),

    #[error("collapse groups are not pairwise disjoint")]
    OverlappingGroups,

    #[error("collapse group is empty")]
    EmptyGroup,

    #[error("the collapse view is read-only: {0} is not supported")]
    ViewImmutable(&'static str),

    #[error("target model must be empty")]
    NonEmptyTarget,

    #[error("the action trust filter is already active")]
    FilterAlreadyActive,

    #[error("the action trust filter is not active")]
    FilterNotActive,

    #[error("continuous-time evidence is not enabled for this engine")]
    TimingUnavailable,

    // Configuration
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    // Oracle failures propagate unchanged
    #[error("state-space oracle failure: {0}")]
    Oracle(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
    /// Wrap a domain-specific generator error.
    pub fn oracle<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Error::Oracle(Box::new(err))
    }

    /// Wrap a plain message as an oracle failure, for generators without a
    /// structured error type of their own.
    pub fn oracle_msg(msg: impl Into<String>) -> Self {
        Error::Oracle(msg.into().into())
    }

    /// Whether this error indicates a caller bug rather than an external or
    /// configuration failure.
    ///
    /// Contract violations should surface immediately in tests and never be
    /// retried; oracle failures belong to the embedding application.
    pub fn is_contract_violation(&self) -> bool {
        !matches!(self, Error::Oracle(_) | Error::InvalidConfig(_))
    }
}

//! Statewalk shared ids, errors, and configuration.
//!
//! This crate provides the types every statewalk crate agrees on:
//! - Dense state identifiers
//! - The unified error taxonomy (caller-contract violations vs oracle failures)
//! - The exploration configuration surface and the action-trust threshold

pub mod config;
pub mod error;
pub mod id;

pub use config::{ExploreConfig, InformationLevel};
pub use error::{Error, Result};
pub use id::StateId;

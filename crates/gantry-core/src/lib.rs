//! Gantry Core
//!
//! Core domain types, traits, and error handling for Gantry.
//! This crate has minimal dependencies and defines the shared vocabulary
//! used across all other crates.

pub mod cache;
pub mod error;
pub mod events;
pub mod ids;
pub mod pipeline;
pub mod ports;
pub mod run;
pub mod trigger;

pub use error::{Error, GraphError, Result};
pub use ids::*;

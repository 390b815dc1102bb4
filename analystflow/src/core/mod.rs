//! Core domain model types for analystflow.
//!
//! This module contains the fundamental types used throughout the engine:
//! - Stage status enum
//! - Stage output type with factory methods

mod output;
#[cfg(test)]
mod output_tests;
mod status;

pub use output::StageOutput;
pub use status::StageStatus;

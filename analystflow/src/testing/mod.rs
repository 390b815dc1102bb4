//! Testing utilities for analysis pipelines.
//!
//! This module provides:
//! - Call-counting stub stages and a scripted model client
//! - Sample records, documents and contexts
//! - Assertions for stage outputs and run reports

mod assertions;
pub mod fixtures;
mod mocks;

pub use assertions::{
    assert_output_error_kind, assert_output_failed, assert_output_status,
    assert_output_succeeded, assert_stage_status,
};
pub use mocks::{ScriptedLlm, StubStage};

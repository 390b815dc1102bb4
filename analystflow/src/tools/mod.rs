//! Uniform results for user-facing operations.
//!
//! Every coordinator operation answers with a [`ToolResult`]: a status tag,
//! a human-readable message and a machine-readable detail payload.

mod result;

pub use result::ToolResult;

//! Test assertions for stage outputs and run reports.

use crate::core::{StageOutput, StageStatus};
use crate::errors::ErrorKind;
use crate::pipeline::RunReport;

/// Asserts that the output indicates success.
pub fn assert_output_succeeded(output: &StageOutput) {
    assert!(
        output.is_success(),
        "Expected success, got status: {:?}",
        output.status
    );
}

/// Asserts that the output indicates failure.
pub fn assert_output_failed(output: &StageOutput) {
    assert!(
        output.is_failure(),
        "Expected failure, got status: {:?}",
        output.status
    );
}

/// Asserts that the output has the expected status.
pub fn assert_output_status(output: &StageOutput, expected: StageStatus) {
    assert_eq!(
        output.status, expected,
        "Expected status {:?}, got {:?}",
        expected, output.status
    );
}

/// Asserts that the output failed with the given error kind.
pub fn assert_output_error_kind(output: &StageOutput, expected: ErrorKind) {
    assert_eq!(
        output.error_kind(),
        Some(expected),
        "Expected error kind {expected}, got {:?} ({})",
        output.error_kind(),
        output.describe()
    );
}

/// Asserts that a named stage in the report has the expected status.
pub fn assert_stage_status(report: &RunReport, stage: &str, expected: StageStatus) {
    let actual = report.stage(stage).map(|s| s.status());
    assert_eq!(
        actual,
        Some(expected),
        "Expected stage '{stage}' to be {expected}, got {actual:?}\n{}",
        report.summary()
    );
}

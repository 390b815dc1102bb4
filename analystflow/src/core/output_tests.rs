//! Tests for StageOutput.

#[cfg(test)]
mod tests {
    use crate::core::{StageOutput, StageStatus};
    use crate::errors::{ErrorKind, StageError};
    use crate::records::{DataObject, DataObjectsOutput, StageValue};

    fn data_objects() -> StageValue {
        StageValue::DataObjects(DataObjectsOutput {
            data_objects: vec![DataObject {
                id: "DO-1".to_string(),
                name: "Invoice".to_string(),
                description: "A bill sent to a customer".to_string(),
            }],
        })
    }

    #[test]
    fn test_output_ok() {
        let output = StageOutput::ok(data_objects());
        assert!(output.is_success());
        assert!(!output.is_failure());
        assert_eq!(output.status, StageStatus::Ok);
        assert!(output.error_kind().is_none());
        assert_eq!(output.describe(), "completed with 1 record(s)");
    }

    #[test]
    fn test_output_skip_keeps_existing_value() {
        let output = StageOutput::skip("output already present", Some(data_objects()));
        assert!(output.is_success());
        assert_eq!(output.value, Some(data_objects()));
        assert_eq!(output.skip_reason.as_deref(), Some("output already present"));
    }

    #[test]
    fn test_output_fail() {
        let output = StageOutput::fail(StageError::execution("do_agent", "quota exceeded"));
        assert!(output.is_failure());
        assert!(output.value.is_none());
        assert_eq!(output.error_kind(), Some(ErrorKind::ExecutionError));
        assert!(output.describe().contains("quota exceeded"));
    }

    #[test]
    fn test_output_cancel() {
        let output = StageOutput::cancel("user aborted");
        assert_eq!(output.status, StageStatus::Cancel);
        assert_eq!(output.error_kind(), Some(ErrorKind::Cancelled));
    }

    #[test]
    fn test_output_blocked() {
        let output = StageOutput::blocked(vec!["actors".to_string()]);
        assert_eq!(output.status, StageStatus::Blocked);
        assert_eq!(output.describe(), "blocked on actors");
        assert_eq!(output.error_kind(), Some(ErrorKind::MissingDependency));
    }

    #[test]
    fn test_output_with_duration() {
        let output = StageOutput::ok(data_objects()).with_duration(12.5);
        assert!((output.duration_ms - 12.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_output_serialization() {
        let output = StageOutput::fail(StageError::schema_violation("uc_agent", "unknown field `x`"));
        let json = serde_json::to_value(&output).unwrap();
        assert_eq!(json["status"], "fail");
        assert_eq!(json["error"]["kind"], "schema_violation");
        assert!(json.get("value").is_none());
    }
}
